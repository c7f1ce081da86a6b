//! Correlating message handler
//!
//! Accumulates messages into groups by correlation key and releases a group
//! once its release strategy says it is complete. Every operation on a key
//! runs under that key's lock; the inline path (`handle`), group timeouts and
//! store expiry sweeps all end in the same completion logic.
//!
//! ```text
//! ABSENT -> ACCUMULATING -> RELEASED | DISCARDED | EXPIRED
//! ```
//!
//! With `expire_groups_upon_completion` disabled a released key stays
//! closed: later messages for it go to the discard channel until an expiry
//! sweep removes the closed group.

use crate::aggregator::config::{AggregatorConfig, ConfigError};
use crate::aggregator::error::{AggregatorError, AggregatorResult, MessagingError};
use crate::aggregator::events::{AggregationEvent, AggregationEventType, EventPublisher};
use crate::aggregator::locks::{KeyState, LockRegistry};
use crate::aggregator::reaper::Reaper;
use crate::aggregator::scheduler::{ScheduledTask, TaskId, TaskScheduler};
use crate::aggregator::stats::{HandlerCounters, HandlerStatistics};
use crate::aggregator::timeout::GroupTimeout;
use crate::channel::{ChannelError, MessageChannel};
use crate::message::{CorrelationKey, Message};
use crate::store::{MessageGroup, MessageGroupStore, SimpleMessageGroupStore};
use crate::strategy::{
    CorrelationStrategy, DefaultAggregatingProcessor, HeaderCorrelationStrategy,
    MessageGroupProcessor, PassThroughProcessor, ReleaseStrategy, ResequencingProcessor,
};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// What happens to a group after its output was delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseMode {
    /// The whole group is consumed by one release
    Aggregate,
    /// Only the released messages leave the group; the rest keep waiting
    Resequence,
}

/// Why a group is being completed outside the inline path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timeout,
    Sweep,
}

pub(crate) struct HandlerCore {
    name: String,
    mode: ReleaseMode,
    store: Arc<dyn MessageGroupStore>,
    correlation: Arc<dyn CorrelationStrategy>,
    release: ReleaseStrategy,
    processor: Arc<dyn MessageGroupProcessor>,
    output: Arc<dyn MessageChannel>,
    discard: Option<Arc<dyn MessageChannel>>,
    group_timeout: Option<GroupTimeout>,
    scheduler: Option<TaskScheduler>,
    // Cancelled when the last handler reference is dropped
    reaper: Option<Reaper>,
    config: AggregatorConfig,
    locks: LockRegistry,
    events: EventPublisher,
    counters: HandlerCounters,
    this: Weak<HandlerCore>,
}

impl HandlerCore {
    fn handle(&self, message: Arc<Message>) -> Result<(), MessagingError> {
        self.counters.message_handled();

        let key = match self.correlation.correlation_key(&message) {
            Some(key) => key,
            None => {
                let source = AggregatorError::MissingCorrelationKey {
                    message_id: message.id(),
                };
                return Err(MessagingError::new(message, source));
            }
        };

        match self
            .locks
            .with_lock(&key, |state| self.accept(&key, &message, state))
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) | Err(source) => Err(MessagingError::new(message, source)),
        }
    }

    fn accept(
        &self,
        key: &CorrelationKey,
        message: &Arc<Message>,
        state: &mut KeyState,
    ) -> AggregatorResult<()> {
        let current = self.store.get_message_group(key);

        if current.is_complete() {
            log::debug!(
                "Group [{}] is already complete; discarding late message {}",
                key,
                message.id()
            );
            return self.discard_late(key, message);
        }
        if self.release.is_sequence_aware() && !current.can_add(message) {
            log::debug!(
                "Message {} does not fit the sequence of group [{}]; discarding",
                message.id(),
                key
            );
            return self.discard_late(key, message);
        }

        let group = self.store.add_message_to_group(key, Arc::clone(message))?;
        if group.key() != key || !group.messages().iter().any(|m| Arc::ptr_eq(m, message)) {
            return Err(AggregatorError::InvariantViolation {
                key: key.clone(),
                detail: format!("message {} missing from the stored group", message.id()),
            });
        }

        let releasable = self
            .release
            .can_release(&group)
            .map_err(|source| AggregatorError::ReleaseStrategy {
                key: key.clone(),
                source,
            })?;

        if !releasable {
            self.schedule_group_timeout(key, &group, state);
            return Ok(());
        }

        state.cancel_pending();
        match self.release_group(key, &group) {
            Ok(remaining) => {
                state.failed_attempts = 0;
                if let Some(remaining) = remaining {
                    self.schedule_group_timeout(key, &remaining, state);
                }
                Ok(())
            }
            Err(e @ AggregatorError::Delivery { .. }) => {
                log::warn!("{}; group [{}] is kept for another attempt", e, key);
                let retry = self.config.force_complete_retry.delay;
                state.replace_pending(self.schedule_force_complete(key, retry));
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Process `group` and deliver the result to the output channel
    ///
    /// Returns the group left behind when the release consumed only part of
    /// it.
    fn release_group(
        &self,
        key: &CorrelationKey,
        group: &MessageGroup,
    ) -> AggregatorResult<Option<MessageGroup>> {
        let outputs = self.outputs(key, group, false)?;

        log::debug!(
            "Completing group with correlation key [{}] ({} message(s) -> {} output(s))",
            key,
            group.size(),
            outputs.len()
        );

        let (delivered, failure) = self.deliver(&outputs);
        match failure {
            None => {
                let remaining = self.after_release(key, &delivered);
                self.counters.group_released();
                self.events.publish(AggregationEvent::new(
                    AggregationEventType::GroupReleased,
                    &self.name,
                    key.clone(),
                    delivered.len(),
                ));
                Ok(remaining)
            }
            Some(source) => {
                if self.mode == ReleaseMode::Resequence && !delivered.is_empty() {
                    self.after_release(key, &delivered);
                }
                Err(AggregatorError::Delivery {
                    key: key.clone(),
                    source,
                })
            }
        }
    }

    /// Messages to deliver for `group`
    ///
    /// Resequenced output shares the held entries so that exactly the
    /// delivered entries leave the group.
    fn outputs(
        &self,
        key: &CorrelationKey,
        group: &MessageGroup,
        partial: bool,
    ) -> AggregatorResult<Vec<Arc<Message>>> {
        match (self.mode, partial) {
            (ReleaseMode::Resequence, false) => Ok(ResequencingProcessor.select(group)),
            (ReleaseMode::Resequence, true) => Ok(PassThroughProcessor.select(group)),
            (ReleaseMode::Aggregate, _) => self
                .processor
                .process(group)
                .map(|outputs| outputs.into_iter().map(Arc::new).collect())
                .map_err(|source| AggregatorError::Processor {
                    key: key.clone(),
                    source,
                }),
        }
    }

    fn deliver(&self, outputs: &[Arc<Message>]) -> (Vec<Arc<Message>>, Option<ChannelError>) {
        let mut delivered = Vec::with_capacity(outputs.len());
        for output in outputs {
            if let Err(e) = self.output.send(Arc::clone(output), self.config.send_timeout) {
                return (delivered, Some(e));
            }
            delivered.push(Arc::clone(output));
        }
        (delivered, None)
    }

    fn after_release(
        &self,
        key: &CorrelationKey,
        delivered: &[Arc<Message>],
    ) -> Option<MessageGroup> {
        match self.mode {
            ReleaseMode::Aggregate => {
                self.finish_group(key);
                None
            }
            ReleaseMode::Resequence => {
                let remaining = self.store.remove_messages_from_group(key, delivered);
                let last_released = delivered
                    .iter()
                    .filter_map(|m| m.sequence_number())
                    .fold(remaining.last_released_sequence(), u32::max);
                if last_released > remaining.last_released_sequence() {
                    self.store.set_last_released_sequence(key, last_released);
                }

                let sequence_size = remaining
                    .sequence_size()
                    .or_else(|| delivered.iter().find_map(|m| m.sequence_size()));
                let sequence_done = match sequence_size {
                    Some(size) => last_released >= size,
                    None => remaining.is_empty(),
                };
                if sequence_done {
                    log::trace!("Sequence of group [{}] fully released", key);
                    self.finish_group(key);
                    None
                } else if remaining.is_empty() {
                    None
                } else {
                    Some(remaining)
                }
            }
        }
    }

    /// Remove a released group, or close it when keys stay reserved
    fn finish_group(&self, key: &CorrelationKey) {
        if self.config.expire_groups_upon_completion {
            self.store.remove_message_group(key);
        } else {
            self.store.complete_group(key);
        }
    }

    fn schedule_group_timeout(
        &self,
        key: &CorrelationKey,
        group: &MessageGroup,
        state: &mut KeyState,
    ) {
        let timeout = match &self.group_timeout {
            Some(timeout) => timeout.timeout_for(group),
            None => return,
        };
        match timeout {
            Some(delay) => {
                log::trace!("Group [{}] times out in {:?}", key, delay);
                state.replace_pending(self.schedule_force_complete(key, delay));
            }
            None => state.cancel_pending(),
        }
    }

    fn schedule_force_complete(&self, key: &CorrelationKey, delay: Duration) -> Option<ScheduledTask> {
        let scheduler = match &self.scheduler {
            Some(scheduler) => scheduler,
            None => {
                log::debug!(
                    "No scheduler; group [{}] waits for the next message or expiry sweep",
                    key
                );
                return None;
            }
        };
        let handler = Weak::clone(&self.this);
        let key = key.clone();
        Some(scheduler.schedule(delay, move |task_id| {
            if let Some(handler) = handler.upgrade() {
                handler.force_complete_task(&key, task_id);
            }
        }))
    }

    fn force_complete_task(&self, key: &CorrelationKey, task_id: TaskId) {
        let result = self.locks.with_lock(key, |state| {
            if !state.claim(task_id) {
                log::trace!("Task {} for group [{}] is stale; skipping", task_id, key);
                return;
            }
            let group = self.store.get_message_group(key);
            self.complete_or_expire(key, &group, state, Trigger::Timeout);
        });
        if let Err(e) = result {
            log::warn!("Group timeout for [{}] not processed: {}", key, e);
        }
    }

    /// Force completion of the group for `key` now
    pub(crate) fn force_complete(&self, key: &CorrelationKey) -> AggregatorResult<()> {
        self.locks.with_lock(key, |state| {
            state.cancel_pending();
            let group = self.store.get_message_group(key);
            self.complete_or_expire(key, &group, state, Trigger::Timeout);
        })
    }

    fn expire_from_sweep(&self, swept: &MessageGroup) {
        let key = swept.key();
        let result = self.locks.with_lock(key, |state| {
            let group = self.store.get_message_group(key);
            if !group.is_unchanged_since(swept) {
                // Modified after the sweep selected it; a later sweep reconsiders it
                log::debug!("Group [{}] changed since the expiry sweep; skipping", key);
                return;
            }
            state.cancel_pending();
            self.complete_or_expire(key, &group, state, Trigger::Sweep);
        });
        if let Err(e) = result {
            log::warn!("Expiry of group [{}] skipped: {}", key, e);
        }
    }

    /// Shared completion logic of group timeouts, retries and expiry sweeps
    ///
    /// A group that has become releasable is released normally. Otherwise it
    /// is released partially or discarded, depending on
    /// `send_partial_result_on_timeout`, and removed. Delivery failures keep
    /// the group and schedule another attempt.
    fn complete_or_expire(
        &self,
        key: &CorrelationKey,
        group: &MessageGroup,
        state: &mut KeyState,
        trigger: Trigger,
    ) {
        if group.is_empty() {
            if trigger == Trigger::Sweep {
                log::debug!("Removing empty group [{}]", key);
                self.store.remove_message_group(key);
                state.failed_attempts = 0;
            }
            return;
        }

        let releasable = self.release.can_release(group).unwrap_or_else(|e| {
            log::warn!("Release strategy failed for group [{}]: {}", key, e);
            false
        });

        let outcome = if releasable {
            self.release_group(key, group).map(|remaining| {
                if let Some(remaining) = remaining {
                    self.schedule_group_timeout(key, &remaining, state);
                }
            })
        } else if self.config.send_partial_result_on_timeout {
            log::debug!(
                "Releasing partial group [{}] with {} message(s)",
                key,
                group.size()
            );
            self.release_partial(key, group)
        } else {
            self.expire_group(key, group)
        };

        match outcome {
            Ok(()) => state.failed_attempts = 0,
            Err(e) => self.retry_or_abandon(key, state, e),
        }
    }

    fn release_partial(&self, key: &CorrelationKey, group: &MessageGroup) -> AggregatorResult<()> {
        let outputs = self.outputs(key, group, true)?;

        let (delivered, failure) = self.deliver(&outputs);
        if let Some(source) = failure {
            if self.mode == ReleaseMode::Resequence {
                self.store.remove_messages_from_group(key, &delivered);
            }
            return Err(AggregatorError::Delivery {
                key: key.clone(),
                source,
            });
        }

        self.store.remove_message_group(key);
        self.counters.group_expired();
        self.events.publish(
            AggregationEvent::new(
                AggregationEventType::GroupExpired,
                &self.name,
                key.clone(),
                delivered.len(),
            )
            .with_message("partial result released"),
        );
        Ok(())
    }

    fn expire_group(&self, key: &CorrelationKey, group: &MessageGroup) -> AggregatorResult<()> {
        log::debug!(
            "Expiring group [{}]; discarding {} message(s)",
            key,
            group.size()
        );
        if let Err(source) = self.discard_messages(key, group.messages(), true) {
            return Err(AggregatorError::Delivery { key: key.clone(), source });
        }

        self.store.remove_message_group(key);
        self.counters.group_expired();
        self.events.publish(AggregationEvent::new(
            AggregationEventType::GroupExpired,
            &self.name,
            key.clone(),
            group.size(),
        ));
        Ok(())
    }

    fn retry_or_abandon(&self, key: &CorrelationKey, state: &mut KeyState, error: AggregatorError) {
        state.failed_attempts += 1;
        let policy = &self.config.force_complete_retry;
        let group = self.store.get_message_group(key);

        if policy.allows_retry(state.failed_attempts) && self.scheduler.is_some() {
            let delay = self
                .group_timeout
                .as_ref()
                .and_then(|timeout| timeout.timeout_for(&group))
                .unwrap_or(policy.delay);
            log::warn!(
                "Completing group [{}] failed (attempt {}): {}; retrying in {:?}",
                key,
                state.failed_attempts,
                error,
                delay
            );
            state.replace_pending(self.schedule_force_complete(key, delay));
            self.counters.force_complete_retried();
            self.events.publish(
                AggregationEvent::new(
                    AggregationEventType::ForceCompleteRescheduled,
                    &self.name,
                    key.clone(),
                    group.size(),
                )
                .with_message(error.to_string()),
            );
            return;
        }

        if !policy.allows_retry(state.failed_attempts) {
            log::error!(
                "Giving up on group [{}] after {} failed attempt(s): {}",
                key,
                state.failed_attempts,
                error
            );
            if let Err(e) = self.discard_messages(key, group.messages(), true) {
                log::error!(
                    "{} message(s) of group [{}] lost: {}",
                    group.size(),
                    key,
                    e
                );
            }
            self.store.remove_message_group(key);
            state.cancel_pending();
            state.failed_attempts = 0;
            self.counters.force_complete_abandoned();
            self.events.publish(
                AggregationEvent::new(
                    AggregationEventType::ForceCompleteAbandoned,
                    &self.name,
                    key.clone(),
                    group.size(),
                )
                .with_message(error.to_string()),
            );
            return;
        }

        log::warn!(
            "Completing group [{}] failed: {}; kept until the next expiry sweep",
            key,
            error
        );
    }

    /// Route a message that is not admitted to its group to the discard
    /// channel
    fn discard_late(&self, key: &CorrelationKey, message: &Arc<Message>) -> AggregatorResult<()> {
        self.discard_messages(key, &[Arc::clone(message)], false)
            .map_err(|source| AggregatorError::Delivery {
                key: key.clone(),
                source,
            })
    }

    /// Send `messages` to the discard channel, dropping them when none is
    /// configured
    ///
    /// Held messages that reached the discard channel are taken out of the
    /// stored group so that a retry does not discard them twice.
    fn discard_messages(
        &self,
        key: &CorrelationKey,
        messages: &[Arc<Message>],
        held: bool,
    ) -> Result<(), ChannelError> {
        if messages.is_empty() {
            return Ok(());
        }
        let discard = match &self.discard {
            Some(discard) => discard,
            None => {
                log::debug!(
                    "No discard channel; dropping {} message(s) of group [{}]",
                    messages.len(),
                    key
                );
                self.counters.messages_discarded(messages.len());
                return Ok(());
            }
        };

        let mut sent = Vec::with_capacity(messages.len());
        let mut failure = None;
        for message in messages {
            match discard.send(Arc::clone(message), self.config.send_timeout) {
                Ok(()) => sent.push(Arc::clone(message)),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if !sent.is_empty() {
            if held {
                self.store.remove_messages_from_group(key, &sent);
            }
            self.counters.messages_discarded(sent.len());
            self.events.publish(AggregationEvent::new(
                AggregationEventType::MessageDiscarded,
                &self.name,
                key.clone(),
                sent.len(),
            ));
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Aggregator endpoint
///
/// Cheap to clone; clones share the same groups, timers and counters.
///
/// # Example
///
/// ```rust
/// use correlator::aggregator::CorrelatingMessageHandler;
/// use correlator::channel::QueueChannel;
/// use correlator::message::Message;
/// use std::sync::Arc;
///
/// let output = Arc::new(QueueChannel::unbounded("output"));
/// let handler = CorrelatingMessageHandler::builder()
///     .output_channel(output.clone())
///     .build()
///     .unwrap();
///
/// for n in 1..=3 {
///     handler
///         .handle(Message::new(n).with_correlation_id("order-1").with_sequence(n, 3))
///         .unwrap();
/// }
///
/// let released = output.try_receive().unwrap();
/// assert_eq!(released.payload, serde_json::json!([1, 2, 3]));
/// ```
#[derive(Clone)]
pub struct CorrelatingMessageHandler {
    core: Arc<HandlerCore>,
}

impl CorrelatingMessageHandler {
    pub fn builder() -> AggregatorBuilder {
        AggregatorBuilder::new(ReleaseMode::Aggregate)
    }

    pub(crate) fn resequencer_builder() -> AggregatorBuilder {
        AggregatorBuilder::new(ReleaseMode::Resequence).config(AggregatorConfig::resequencer())
    }

    /// Add `message` to its group and release the group if it is complete
    pub fn handle(&self, message: impl Into<Arc<Message>>) -> Result<(), MessagingError> {
        self.core.handle(message.into())
    }

    /// Complete the group for `key` as if its group timeout had fired
    pub fn force_complete(&self, key: &CorrelationKey) -> AggregatorResult<()> {
        self.core.force_complete(key)
    }

    /// Run an expiry sweep on the backing store
    pub fn expire_message_groups(&self, older_than: Duration) -> usize {
        self.core.store.expire_message_groups(older_than)
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn store(&self) -> &Arc<dyn MessageGroupStore> {
        &self.core.store
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.core.config
    }

    /// The periodic sweep started from `reaper_interval_ms`, if configured
    pub fn reaper(&self) -> Option<&Reaper> {
        self.core.reaper.as_ref()
    }

    pub fn statistics(&self) -> HandlerStatistics {
        self.core.counters.snapshot()
    }

    pub fn subscribe(&self, subscriber_id: impl Into<String>) -> UnboundedReceiver<AggregationEvent> {
        self.core.events.subscribe(subscriber_id)
    }

    /// Whether a group timeout or retry is currently scheduled for `key`
    pub fn has_pending_timeout(&self, key: &CorrelationKey) -> bool {
        self.core
            .locks
            .with_lock(key, |state| state.has_pending())
            .unwrap_or(false)
    }
}

pub struct AggregatorBuilder {
    mode: ReleaseMode,
    name: Option<String>,
    output: Option<Arc<dyn MessageChannel>>,
    discard: Option<Arc<dyn MessageChannel>>,
    store: Option<Arc<dyn MessageGroupStore>>,
    correlation: Option<Arc<dyn CorrelationStrategy>>,
    release: Option<ReleaseStrategy>,
    processor: Option<Arc<dyn MessageGroupProcessor>>,
    group_timeout: Option<GroupTimeout>,
    scheduler: Option<TaskScheduler>,
    config: AggregatorConfig,
}

impl AggregatorBuilder {
    fn new(mode: ReleaseMode) -> Self {
        Self {
            mode,
            name: None,
            output: None,
            discard: None,
            store: None,
            correlation: None,
            release: None,
            processor: None,
            group_timeout: None,
            scheduler: None,
            config: AggregatorConfig::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn output_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.output = Some(channel);
        self
    }

    pub fn discard_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.discard = Some(channel);
        self
    }

    pub fn store(mut self, store: Arc<dyn MessageGroupStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn correlation_strategy(mut self, strategy: impl CorrelationStrategy + 'static) -> Self {
        self.correlation = Some(Arc::new(strategy));
        self
    }

    pub fn release_strategy(mut self, strategy: ReleaseStrategy) -> Self {
        self.release = Some(strategy);
        self
    }

    pub fn processor(mut self, processor: impl MessageGroupProcessor + 'static) -> Self {
        self.processor = Some(Arc::new(processor));
        self
    }

    /// Group timeout given in code; conflicts with one set in the config
    pub fn group_timeout(mut self, timeout: GroupTimeout) -> Self {
        self.group_timeout = Some(timeout);
        self
    }

    pub fn scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn config(mut self, config: AggregatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<CorrelatingMessageHandler, ConfigError> {
        let config = self.config;
        config.validate()?;

        let output = self
            .output
            .ok_or_else(|| ConfigError::invalid("An output channel is required"))?;

        let release = match self.release {
            Some(release) if config.release_partial_sequences => {
                if !release.is_sequence_aware() {
                    return Err(ConfigError::invalid(
                        "release_partial_sequences requires the sequence size release strategy",
                    ));
                }
                ReleaseStrategy::partial_sequences()
            }
            Some(release) => release,
            None if config.release_partial_sequences => ReleaseStrategy::partial_sequences(),
            None => ReleaseStrategy::sequence_size(),
        };
        if self.mode == ReleaseMode::Resequence && !release.is_sequence_aware() {
            return Err(ConfigError::invalid(
                "A resequencer requires the sequence size release strategy",
            ));
        }

        let group_timeout = match (self.group_timeout, config.group_timeout()?) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid(
                    "Group timeout is configured both in code and in the configuration",
                ))
            }
            (explicit, configured) => explicit.or(configured),
        };

        let scheduler = self.scheduler.or_else(TaskScheduler::try_current);
        if group_timeout.is_some() && scheduler.is_none() {
            return Err(ConfigError::invalid(
                "A group timeout requires a task scheduler or a running tokio runtime",
            ));
        }
        if config.reaper_interval.is_some() && scheduler.is_none() {
            return Err(ConfigError::invalid(
                "A reaper interval requires a task scheduler or a running tokio runtime",
            ));
        }

        let correlation: Arc<dyn CorrelationStrategy> = match self.correlation {
            Some(correlation) => correlation,
            None => Arc::new(HeaderCorrelationStrategy::new(
                config.correlation_header.clone(),
            )),
        };
        let processor: Arc<dyn MessageGroupProcessor> = match (self.processor, self.mode) {
            (Some(processor), _) => processor,
            (None, ReleaseMode::Aggregate) => Arc::new(DefaultAggregatingProcessor),
            (None, ReleaseMode::Resequence) => Arc::new(ResequencingProcessor),
        };
        let store: Arc<dyn MessageGroupStore> = match self.store {
            Some(store) => store,
            None => Arc::new(SimpleMessageGroupStore::new()),
        };
        let name = self.name.unwrap_or_else(|| match self.mode {
            ReleaseMode::Aggregate => "aggregator".to_string(),
            ReleaseMode::Resequence => "resequencer".to_string(),
        });

        log::debug!(
            "Building {} '{}' (release: {:?}, group timeout: {:?}, output: '{}')",
            match self.mode {
                ReleaseMode::Aggregate => "aggregator",
                ReleaseMode::Resequence => "resequencer",
            },
            name,
            release,
            group_timeout,
            output.name()
        );

        let reaper = match (config.reaper_interval, &scheduler) {
            (Some(interval), Some(scheduler)) => {
                let group_age = config.effective_reaper_group_age().unwrap_or(interval);
                Some(Reaper::start(Arc::clone(&store), scheduler, interval, group_age))
            }
            _ => None,
        };

        let core = Arc::new_cyclic(|this| HandlerCore {
            name,
            mode: self.mode,
            store: Arc::clone(&store),
            correlation,
            release,
            processor,
            output,
            discard: self.discard,
            group_timeout,
            scheduler,
            reaper,
            locks: LockRegistry::new(config.lock_timeout),
            events: EventPublisher::new(),
            counters: HandlerCounters::default(),
            config,
            this: Weak::clone(this),
        });

        let handler = Arc::downgrade(&core);
        store.register_expiry_callback(Arc::new(move |group: &MessageGroup| {
            if let Some(handler) = handler.upgrade() {
                handler.expire_from_sweep(group);
            }
        }));

        Ok(CorrelatingMessageHandler { core })
    }
}

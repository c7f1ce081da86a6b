//! Resequencing handler
//!
//! Same group accumulation as the aggregator, but releases are partial: the
//! contiguous run following the last released sequence number leaves the
//! group and the rest keeps waiting for the gap to be filled. With
//! `release_partial_sequences` disabled nothing is released until the whole
//! sequence has arrived.

use crate::aggregator::config::{AggregatorConfig, ConfigError};
use crate::aggregator::error::{AggregatorResult, MessagingError};
use crate::aggregator::events::AggregationEvent;
use crate::aggregator::reaper::Reaper;
use crate::aggregator::handler::CorrelatingMessageHandler;
use crate::aggregator::scheduler::TaskScheduler;
use crate::aggregator::stats::HandlerStatistics;
use crate::aggregator::timeout::GroupTimeout;
use crate::channel::MessageChannel;
use crate::message::{CorrelationKey, Message};
use crate::store::MessageGroupStore;
use crate::strategy::CorrelationStrategy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Clone)]
pub struct ResequencingMessageHandler {
    inner: CorrelatingMessageHandler,
}

impl ResequencingMessageHandler {
    pub fn builder() -> ResequencerBuilder {
        ResequencerBuilder {
            inner: CorrelatingMessageHandler::resequencer_builder(),
        }
    }

    pub fn handle(&self, message: impl Into<Arc<Message>>) -> Result<(), MessagingError> {
        self.inner.handle(message)
    }

    pub fn force_complete(&self, key: &CorrelationKey) -> AggregatorResult<()> {
        self.inner.force_complete(key)
    }

    pub fn expire_message_groups(&self, older_than: Duration) -> usize {
        self.inner.expire_message_groups(older_than)
    }

    pub fn store(&self) -> &Arc<dyn MessageGroupStore> {
        self.inner.store()
    }

    pub fn config(&self) -> &AggregatorConfig {
        self.inner.config()
    }

    pub fn reaper(&self) -> Option<&Reaper> {
        self.inner.reaper()
    }

    pub fn statistics(&self) -> HandlerStatistics {
        self.inner.statistics()
    }

    pub fn subscribe(&self, subscriber_id: impl Into<String>) -> UnboundedReceiver<AggregationEvent> {
        self.inner.subscribe(subscriber_id)
    }
}

/// Builder restricted to what a resequencer can vary
///
/// The release strategy and processor are fixed; the configuration defaults
/// to `AggregatorConfig::resequencer()`.
pub struct ResequencerBuilder {
    inner: crate::aggregator::handler::AggregatorBuilder,
}

impl ResequencerBuilder {
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            inner: self.inner.name(name),
        }
    }

    pub fn output_channel(self, channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            inner: self.inner.output_channel(channel),
        }
    }

    pub fn discard_channel(self, channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            inner: self.inner.discard_channel(channel),
        }
    }

    pub fn store(self, store: Arc<dyn MessageGroupStore>) -> Self {
        Self {
            inner: self.inner.store(store),
        }
    }

    pub fn correlation_strategy(self, strategy: impl CorrelationStrategy + 'static) -> Self {
        Self {
            inner: self.inner.correlation_strategy(strategy),
        }
    }

    pub fn group_timeout(self, timeout: GroupTimeout) -> Self {
        Self {
            inner: self.inner.group_timeout(timeout),
        }
    }

    pub fn scheduler(self, scheduler: TaskScheduler) -> Self {
        Self {
            inner: self.inner.scheduler(scheduler),
        }
    }

    pub fn config(self, config: AggregatorConfig) -> Self {
        Self {
            inner: self.inner.config(config),
        }
    }

    pub fn build(self) -> Result<ResequencingMessageHandler, ConfigError> {
        Ok(ResequencingMessageHandler {
            inner: self.inner.build()?,
        })
    }
}

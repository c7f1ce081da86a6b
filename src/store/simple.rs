//! In-memory message group store
//!
//! All groups live in one map behind a read/write lock. Every operation
//! takes the lock for a short, non-blocking critical section; expiry
//! callbacks always run after the lock has been released so that they may
//! call back into the store.

use crate::core::time::{elapsed_between, SystemTimeProvider, TimeProvider};
use crate::message::{CorrelationKey, Message};
use crate::store::{
    ExpiryCallback, MessageGroup, MessageGroupStore, StoreError, StoreResult,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct StoreState {
    groups: HashMap<CorrelationKey, MessageGroup>,
    total_messages: usize,
    next_generation: u64,
}

/// Map-backed `MessageGroupStore` with an optional message capacity
///
/// # Example
///
/// ```rust
/// use correlator::message::{CorrelationKey, Message};
/// use correlator::store::{MessageGroupStore, SimpleMessageGroupStore};
/// use std::sync::Arc;
///
/// let store = SimpleMessageGroupStore::new();
/// let key = CorrelationKey::from("order-1");
///
/// store.add_message_to_group(&key, Arc::new(Message::new(1))).unwrap();
/// assert_eq!(store.get_message_group(&key).size(), 1);
/// assert_eq!(store.message_group_count(), 1);
/// ```
pub struct SimpleMessageGroupStore {
    state: RwLock<StoreState>,
    callbacks: RwLock<Vec<ExpiryCallback>>,
    capacity: Option<usize>,
    clock: Arc<dyn TimeProvider>,
}

impl Default for SimpleMessageGroupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleMessageGroupStore {
    pub fn new() -> Self {
        Self::with_time_provider(None, Arc::new(SystemTimeProvider))
    }

    /// Store refusing additions once `capacity` messages are held in total
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_time_provider(Some(capacity), Arc::new(SystemTimeProvider))
    }

    pub fn with_time_provider(capacity: Option<usize>, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            callbacks: RwLock::new(Vec::new()),
            capacity,
            clock,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn empty_group(&self, key: &CorrelationKey) -> MessageGroup {
        MessageGroup::new(key.clone(), self.clock.system_time(), 0)
    }

    fn clear_removal_mark(&self, group: &MessageGroup) {
        let mut state = self.state.write();
        if let Some(current) = state.groups.get_mut(group.key()) {
            if current.generation() == group.generation() {
                current.set_marked_for_removal(false);
            }
        }
    }
}

impl MessageGroupStore for SimpleMessageGroupStore {
    fn get_message_group(&self, key: &CorrelationKey) -> MessageGroup {
        self.state
            .read()
            .groups
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.empty_group(key))
    }

    fn add_message_to_group(
        &self,
        key: &CorrelationKey,
        message: Arc<Message>,
    ) -> StoreResult<MessageGroup> {
        let now = self.clock.system_time();
        let mut state = self.state.write();

        if let Some(capacity) = self.capacity {
            if state.total_messages >= capacity {
                return Err(StoreError::CapacityExceeded { capacity });
            }
        }

        let StoreState {
            groups,
            total_messages,
            next_generation,
        } = &mut *state;

        let group = groups.entry(key.clone()).or_insert_with(|| {
            *next_generation += 1;
            MessageGroup::new(key.clone(), now, *next_generation)
        });
        if group.is_complete() {
            return Err(StoreError::GroupComplete { key: key.clone() });
        }
        group.push(message, now);
        *total_messages += 1;
        let group = group.clone();

        log::trace!(
            "Added message to group [{}] (size: {})",
            key,
            group.size()
        );
        Ok(group)
    }

    fn remove_messages_from_group(
        &self,
        key: &CorrelationKey,
        messages: &[Arc<Message>],
    ) -> MessageGroup {
        let now = self.clock.system_time();
        let mut state = self.state.write();

        let (group, removed) = match state.groups.get_mut(key) {
            Some(group) => {
                let removed = group.remove_messages(messages, now);
                (group.clone(), removed)
            }
            None => return self.empty_group(key),
        };
        state.total_messages -= removed;
        group
    }

    fn complete_group(&self, key: &CorrelationKey) {
        let now = self.clock.system_time();
        let mut state = self.state.write();

        let removed = match state.groups.get_mut(key) {
            Some(group) => {
                let held = group.size();
                group.close(now);
                held
            }
            None => {
                state.next_generation += 1;
                let mut group = MessageGroup::new(key.clone(), now, state.next_generation);
                group.close(now);
                state.groups.insert(key.clone(), group);
                0
            }
        };
        state.total_messages -= removed;
    }

    fn set_last_released_sequence(&self, key: &CorrelationKey, sequence: u32) {
        if let Some(group) = self.state.write().groups.get_mut(key) {
            group.set_last_released_sequence(sequence);
        }
    }

    fn remove_message_group(&self, key: &CorrelationKey) {
        let mut state = self.state.write();
        if let Some(group) = state.groups.remove(key) {
            state.total_messages -= group.size();
            log::trace!("Removed group [{}]", key);
        }
    }

    fn register_expiry_callback(&self, callback: ExpiryCallback) {
        self.callbacks.write().push(callback);
    }

    fn expire_message_groups(&self, older_than: Duration) -> usize {
        let now = self.clock.system_time();

        let mut expired: Vec<MessageGroup> = {
            let mut state = self.state.write();
            state
                .groups
                .values_mut()
                .filter(|group| {
                    !group.is_marked_for_removal()
                        && elapsed_between(group.last_modified(), now) >= older_than
                })
                .map(|group| {
                    group.set_marked_for_removal(true);
                    group.clone()
                })
                .collect()
        };
        expired.sort_by_key(|group| group.last_modified());

        if !expired.is_empty() {
            log::debug!(
                "Expiring {} message group(s) older than {:?}",
                expired.len(),
                older_than
            );
        }

        let callbacks = self.callbacks.read().clone();
        for group in &expired {
            if callbacks.is_empty() {
                self.remove_message_group(group.key());
                continue;
            }
            for callback in &callbacks {
                callback(group);
            }
            self.clear_removal_mark(group);
        }

        expired.len()
    }

    fn message_group_count(&self) -> usize {
        self.state.read().groups.len()
    }

    fn message_count(&self) -> usize {
        self.state.read().total_messages
    }
}

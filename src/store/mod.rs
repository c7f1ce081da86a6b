//! Message group storage
//!
//! A `MessageGroupStore` holds at most one `MessageGroup` per correlation
//! key. Stores hand out snapshots; all mutation goes through the store so
//! that per-key read-modify-write is atomic. `SimpleMessageGroupStore` is the
//! in-memory implementation; durable stores implement the same trait.

mod error;
mod group;
mod simple;

pub use error::{StoreError, StoreResult};
pub use group::MessageGroup;
pub use simple::SimpleMessageGroupStore;

use crate::message::{CorrelationKey, Message};
use std::sync::Arc;
use std::time::Duration;

/// Invoked by `expire_message_groups` for every group selected by the sweep
pub type ExpiryCallback = Arc<dyn Fn(&MessageGroup) + Send + Sync>;

pub trait MessageGroupStore: Send + Sync {
    /// Existing group for `key`, or an empty group that is not yet stored
    fn get_message_group(&self, key: &CorrelationKey) -> MessageGroup;

    /// Append `message` to the group for `key`, creating the group if needed
    fn add_message_to_group(
        &self,
        key: &CorrelationKey,
        message: Arc<Message>,
    ) -> StoreResult<MessageGroup>;

    /// Drop the given messages from the group, keeping the group itself
    ///
    /// Entries are matched by `Arc` identity; one entry is removed per
    /// given message.
    fn remove_messages_from_group(&self, key: &CorrelationKey, messages: &[Arc<Message>])
        -> MessageGroup;

    /// Clear the group's messages and close it to further additions
    fn complete_group(&self, key: &CorrelationKey);

    /// Record the highest sequence number already released from the group
    fn set_last_released_sequence(&self, key: &CorrelationKey, sequence: u32);

    /// Delete the group and its messages. No-op when absent.
    fn remove_message_group(&self, key: &CorrelationKey);

    fn register_expiry_callback(&self, callback: ExpiryCallback);

    /// Sweep groups not modified for at least `older_than`, oldest first
    ///
    /// Registered callbacks decide what happens to each group; without any
    /// callbacks the store removes the groups itself. Returns the number of
    /// groups swept.
    fn expire_message_groups(&self, older_than: Duration) -> usize;

    fn message_group_count(&self) -> usize;

    /// Total number of messages held across all groups
    fn message_count(&self) -> usize;
}

//! Message group snapshot

use crate::message::{CorrelationKey, Message};
use std::sync::Arc;
use std::time::SystemTime;

/// Messages currently held under one correlation key
///
/// Values handed out by a store are snapshots: mutating the store does not
/// change a snapshot already taken. Members are kept in insertion order,
/// which is not necessarily sequence-number order.
#[derive(Debug, Clone)]
pub struct MessageGroup {
    key: CorrelationKey,
    messages: Vec<Arc<Message>>,
    created_at: SystemTime,
    last_modified: SystemTime,
    complete: bool,
    last_released_sequence: u32,
    marked_for_removal: bool,
    generation: u64,
}

impl MessageGroup {
    pub(crate) fn new(key: CorrelationKey, now: SystemTime, generation: u64) -> Self {
        Self {
            key,
            messages: Vec::new(),
            created_at: now,
            last_modified: now,
            complete: false,
            last_released_sequence: 0,
            marked_for_removal: false,
            generation,
        }
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    pub fn size(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Closed groups reject additions until they are removed
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    /// First message added to the group
    pub fn first(&self) -> Option<&Arc<Message>> {
        self.messages.first()
    }

    /// Sequence size announced by the first message, if any
    pub fn sequence_size(&self) -> Option<u32> {
        self.first().and_then(|m| m.sequence_size())
    }

    pub fn last_released_sequence(&self) -> u32 {
        self.last_released_sequence
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.marked_for_removal
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains_sequence_number(&self, sequence_number: u32) -> bool {
        self.messages
            .iter()
            .any(|m| m.sequence_number() == Some(sequence_number))
    }

    /// Sequence-aware admission check
    ///
    /// A message is refused when it repeats a sequence number already held or
    /// released, or announces a different sequence size than the group.
    /// Messages without a positive sequence number are always admissible.
    pub fn can_add(&self, message: &Message) -> bool {
        if self.complete {
            return false;
        }
        match message.sequence_number() {
            Some(number) if number > 0 => {
                if number <= self.last_released_sequence {
                    return false;
                }
                self.is_empty()
                    || (message.sequence_size() == self.sequence_size()
                        && !self.contains_sequence_number(number))
            }
            _ => true,
        }
    }

    /// Members sorted by sequence number; unnumbered messages keep their
    /// relative insertion order after the numbered ones
    pub fn messages_by_sequence(&self) -> Vec<Arc<Message>> {
        let mut sorted = self.messages.clone();
        sorted.sort_by_key(|m| m.sequence_number().unwrap_or(u32::MAX));
        sorted
    }

    pub(crate) fn push(&mut self, message: Arc<Message>, now: SystemTime) {
        self.messages.push(message);
        self.last_modified = now;
    }

    /// Remove one held entry per given message, matched by identity
    ///
    /// Message ids come from headers and may repeat, so only the stored
    /// `Arc` identifies an entry. Returns the number of entries removed.
    pub(crate) fn remove_messages(&mut self, messages: &[Arc<Message>], now: SystemTime) -> usize {
        let mut pending: Vec<&Arc<Message>> = messages.iter().collect();
        let before = self.messages.len();
        self.messages.retain(|held| {
            match pending.iter().position(|m| Arc::ptr_eq(m, held)) {
                Some(index) => {
                    pending.swap_remove(index);
                    false
                }
                None => true,
            }
        });
        self.last_modified = now;
        before - self.messages.len()
    }

    /// Whether `other` is a snapshot of this very group with the same
    /// members and modification time
    pub(crate) fn is_unchanged_since(&self, other: &MessageGroup) -> bool {
        self.generation == other.generation
            && self.last_modified == other.last_modified
            && self.messages.len() == other.messages.len()
            && self
                .messages
                .iter()
                .zip(&other.messages)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    pub(crate) fn close(&mut self, now: SystemTime) {
        self.messages.clear();
        self.complete = true;
        self.last_modified = now;
    }

    pub(crate) fn set_last_released_sequence(&mut self, sequence: u32) {
        self.last_released_sequence = sequence;
    }

    pub(crate) fn set_marked_for_removal(&mut self, marked: bool) {
        self.marked_for_removal = marked;
    }
}

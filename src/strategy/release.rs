//! Release strategies
//!
//! A closed set of variants behind a single `can_release` entry point.
//! Strategies are constructed explicitly and passed to a handler; they must
//! be side-effect free and give the same answer for the same snapshot.

use crate::message::Message;
use crate::store::MessageGroup;
use crate::strategy::BoxError;
use std::fmt;
use std::sync::Arc;

pub type GroupPredicate = Arc<dyn Fn(&MessageGroup) -> Result<bool, BoxError> + Send + Sync>;
pub type MessagePredicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum ReleaseStrategy {
    /// Complete once the group holds as many messages as the sequence size
    /// announced by its first message. Groups without a sequence size are
    /// released immediately.
    ///
    /// With `release_partial_sequences`, the group is releasable as soon as
    /// the next expected sequence number is present.
    SequenceSize { release_partial_sequences: bool },
    /// Complete once the group holds at least this many messages
    SizeThreshold(usize),
    /// Complete as soon as any held message satisfies the predicate
    FirstMatch(MessagePredicate),
    /// Arbitrary business rule over the whole group
    Predicate(GroupPredicate),
}

impl Default for ReleaseStrategy {
    fn default() -> Self {
        Self::sequence_size()
    }
}

impl fmt::Debug for ReleaseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SequenceSize {
                release_partial_sequences,
            } => f
                .debug_struct("SequenceSize")
                .field("release_partial_sequences", release_partial_sequences)
                .finish(),
            Self::SizeThreshold(size) => f.debug_tuple("SizeThreshold").field(size).finish(),
            Self::FirstMatch(_) => f.write_str("FirstMatch(..)"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl ReleaseStrategy {
    pub fn sequence_size() -> Self {
        Self::SequenceSize {
            release_partial_sequences: false,
        }
    }

    pub fn partial_sequences() -> Self {
        Self::SequenceSize {
            release_partial_sequences: true,
        }
    }

    pub fn size_threshold(size: usize) -> Self {
        Self::SizeThreshold(size.max(1))
    }

    pub fn first_match(predicate: impl Fn(&Message) -> bool + Send + Sync + 'static) -> Self {
        Self::FirstMatch(Arc::new(predicate))
    }

    pub fn predicate(
        predicate: impl Fn(&MessageGroup) -> Result<bool, BoxError> + Send + Sync + 'static,
    ) -> Self {
        Self::Predicate(Arc::new(predicate))
    }

    /// Whether admission into groups should apply sequence checks
    pub fn is_sequence_aware(&self) -> bool {
        matches!(self, Self::SequenceSize { .. })
    }

    pub fn releases_partial_sequences(&self) -> bool {
        matches!(
            self,
            Self::SequenceSize {
                release_partial_sequences: true
            }
        )
    }

    pub fn can_release(&self, group: &MessageGroup) -> Result<bool, BoxError> {
        if group.is_empty() {
            return Ok(false);
        }
        match self {
            Self::SequenceSize {
                release_partial_sequences,
            } => Ok(sequence_complete(group, *release_partial_sequences)),
            Self::SizeThreshold(size) => Ok(group.size() >= *size),
            Self::FirstMatch(predicate) => Ok(group.messages().iter().any(|m| predicate(m))),
            Self::Predicate(predicate) => predicate(group),
        }
    }
}

fn sequence_complete(group: &MessageGroup, release_partial_sequences: bool) -> bool {
    let released = group.last_released_sequence();

    if release_partial_sequences {
        let next = released + 1;
        return group.contains_sequence_number(next)
            || group
                .messages()
                .iter()
                .any(|m| !matches!(m.sequence_number(), Some(n) if n > 0));
    }

    match group.sequence_size() {
        Some(size) if size > 0 => group.size() as u64 + released as u64 >= size as u64,
        _ => true,
    }
}

use std::collections::VecDeque;

use thiserror::Error;

use crate::{sequence_greater_than, PacketIndex};

/// Errors that can occur during SentCache operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentCacheError {
    /// Delivery was reported for a packet while nothing is awaiting a report
    #[error("No sent packet is awaiting a delivery report, but one was reported for packet {reported}")]
    Empty { reported: PacketIndex },

    /// Delivery reports arrived in a different order than packets were sent
    #[error("Delivery reported for packet {reported}, but the oldest unreported packet is {expected}")]
    SequenceMismatch {
        expected: PacketIndex,
        reported: PacketIndex,
    },
}

/// FIFO of what was sent in each outer packet.
///
/// Entries are pushed in sending order and each one is taken exactly once, when
/// the transport reports that packet as delivered or lost.
pub struct SentCache<T> {
    list: VecDeque<(PacketIndex, T)>,
}

impl<T> SentCache<T> {
    pub fn new() -> Self {
        Self {
            list: VecDeque::new(),
        }
    }

    pub fn push(&mut self, packet_index: PacketIndex, item: T) {
        if let Some((newest, _)) = self.list.back() {
            debug_assert!(
                sequence_greater_than(packet_index, *newest),
                "SentCache packets must be pushed in increasing order: {} after {}",
                packet_index,
                newest
            );
        }
        self.list.push_back((packet_index, item));
    }

    pub fn front_index(&self) -> Option<PacketIndex> {
        self.list.front().map(|(index, _)| *index)
    }

    /// Takes the oldest entry, which must belong to `packet_index`.
    /// On mismatch the cache is left untouched.
    pub fn try_take(&mut self, packet_index: PacketIndex) -> Result<T, SentCacheError> {
        let Some(expected) = self.front_index() else {
            return Err(SentCacheError::Empty {
                reported: packet_index,
            });
        };
        if expected != packet_index {
            return Err(SentCacheError::SequenceMismatch {
                expected,
                reported: packet_index,
            });
        }
        let Some((_, item)) = self.list.pop_front() else {
            return Err(SentCacheError::Empty {
                reported: packet_index,
            });
        };
        Ok(item)
    }

    /// Takes the oldest entry for `packet_index`.
    ///
    /// # Panics
    ///
    /// Panics if reports arrive out of sending order.
    pub fn take(&mut self, packet_index: PacketIndex) -> T {
        self.try_take(packet_index)
            .unwrap_or_else(|e| panic!("SentCache error: {}", e))
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PacketIndex, T)> {
        self.list.iter()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }
}

impl<T> Default for SentCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

use thiserror::Error;

use crate::world::entity::Entity;

/// Errors that can occur while issuing or releasing entity ids
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityIdError {
    /// Both the fresh range and the recycle queue are exhausted
    #[error("No entity ids left in range {start_id}..={end_id}")]
    OutOfIds { start_id: u16, end_id: u16 },

    /// The released entity's index lies outside this generator's range
    #[error("Entity {entity:?} is outside of the generator range {start_id}..={end_id}")]
    OutOfRange {
        entity: Entity,
        start_id: u16,
        end_id: u16,
    },

    /// The released entity was never handed out by this generator
    #[error("Entity {entity:?} was never issued")]
    NotIssued { entity: Entity },

    /// The released entity already waits in the recycle queue
    #[error("Entity {entity:?} was already released")]
    AlreadyReleased { entity: Entity },

    /// Absolute entities can't be released into a relative generator and vice versa
    #[error("Entity {entity:?} has the wrong absolute/relative kind for this generator")]
    WrongKind { entity: Entity },
}

/// Errors that can occur while accessing the shared set of known entities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KnownEntitiesError {
    /// A thread panicked while holding the lock
    #[error("Lock on known entities is poisoned")]
    LockPoisoned,
}

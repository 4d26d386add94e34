use std::{
    collections::HashSet,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::world::{entity::Entity, error::KnownEntitiesError};

/// Entities the receiving side has seen created and not yet destroyed.
///
/// Cloning yields another handle to the same set, so every inbound lane of a
/// connection agrees on which entities exist no matter which lane carried the
/// create.
#[derive(Clone, Default)]
pub struct KnownEntities {
    entities: Arc<RwLock<HashSet<Entity>>>,
}

impl KnownEntities {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_read(&self) -> Result<RwLockReadGuard<'_, HashSet<Entity>>, KnownEntitiesError> {
        self.entities
            .read()
            .map_err(|_| KnownEntitiesError::LockPoisoned)
    }

    fn try_write(&self) -> Result<RwLockWriteGuard<'_, HashSet<Entity>>, KnownEntitiesError> {
        self.entities
            .write()
            .map_err(|_| KnownEntitiesError::LockPoisoned)
    }

    pub fn try_contains(&self, entity: &Entity) -> Result<bool, KnownEntitiesError> {
        Ok(self.try_read()?.contains(entity))
    }

    /// Panicking form of `try_contains`
    pub fn contains(&self, entity: &Entity) -> bool {
        self.try_contains(entity)
            .unwrap_or_else(|e| panic!("KnownEntities error: {}", e))
    }

    /// Returns `true` if the entity wasn't known before
    pub fn try_insert(&self, entity: Entity) -> Result<bool, KnownEntitiesError> {
        Ok(self.try_write()?.insert(entity))
    }

    pub fn insert(&self, entity: Entity) -> bool {
        self.try_insert(entity)
            .unwrap_or_else(|e| panic!("KnownEntities error: {}", e))
    }

    /// Returns `true` if the entity was known
    pub fn try_remove(&self, entity: &Entity) -> Result<bool, KnownEntitiesError> {
        Ok(self.try_write()?.remove(entity))
    }

    pub fn remove(&self, entity: &Entity) -> bool {
        self.try_remove(entity)
            .unwrap_or_else(|e| panic!("KnownEntities error: {}", e))
    }

    pub fn len(&self) -> usize {
        self.try_read()
            .map(|entities| entities.len())
            .unwrap_or_else(|e| panic!("KnownEntities error: {}", e))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.try_write()
            .map(|mut entities| entities.clear())
            .unwrap_or_else(|e| panic!("KnownEntities error: {}", e))
    }
}

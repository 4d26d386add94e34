use std::collections::{HashMap, HashSet, VecDeque};

use log::trace;

use crate::world::{
    entity::{Entity, MAX_RELATIVE_INDICES},
    error::EntityIdError,
};

/// Hands out unique, versioned entity ids from a fixed inclusive range.
///
/// Fresh indices are used up first, then released ones are reissued strictly
/// in release order with their version bumped.
pub struct EntityIdGenerator {
    start_id: u16,
    end_id: u16,
    is_absolute: bool,
    running_id: u32,
    recycled: VecDeque<Entity>,
    recycled_indices: HashSet<u16>,
    issued: HashMap<u16, u8>,
}

impl EntityIdGenerator {
    pub fn new(start_id: u16, end_id: u16, is_absolute: bool) -> Self {
        assert!(start_id > 0, "entity index 0 is reserved as invalid");
        assert!(start_id <= end_id, "entity id range is empty");
        if !is_absolute {
            assert!(
                end_id <= MAX_RELATIVE_INDICES,
                "relative entity ids are bounded by {}",
                MAX_RELATIVE_INDICES
            );
        }
        Self {
            start_id,
            end_id,
            is_absolute,
            running_id: u32::from(start_id),
            recycled: VecDeque::new(),
            recycled_indices: HashSet::new(),
            issued: HashMap::new(),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.is_absolute
    }

    /// Number of ids currently live
    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    pub fn get_entity(&mut self) -> Result<Entity, EntityIdError> {
        let entity = if self.running_id <= u32::from(self.end_id) {
            let entity = Entity::new(self.running_id as u16, 0, self.is_absolute);
            self.running_id += 1;
            entity
        } else if let Some(entity) = self.recycled.pop_front() {
            self.recycled_indices.remove(&entity.index());
            trace!("reissuing recycled {:?}", entity);
            entity
        } else {
            return Err(EntityIdError::OutOfIds {
                start_id: self.start_id,
                end_id: self.end_id,
            });
        };

        self.issued.insert(entity.index(), entity.version());
        Ok(entity)
    }

    pub fn try_release_entity(&mut self, entity: Entity) -> Result<(), EntityIdError> {
        if entity.index() < self.start_id || entity.index() > self.end_id {
            return Err(EntityIdError::OutOfRange {
                entity,
                start_id: self.start_id,
                end_id: self.end_id,
            });
        }
        if entity.is_absolute() != self.is_absolute {
            return Err(EntityIdError::WrongKind { entity });
        }
        if self.recycled_indices.contains(&entity.index()) {
            return Err(EntityIdError::AlreadyReleased { entity });
        }
        if self.issued.get(&entity.index()) != Some(&entity.version()) {
            return Err(EntityIdError::NotIssued { entity });
        }

        self.issued.remove(&entity.index());
        self.recycled_indices.insert(entity.index());
        self.recycled.push_back(entity.next_version());
        Ok(())
    }

    /// Releases `entity` for reuse.
    ///
    /// # Panics
    ///
    /// Panics if `entity` wasn't issued by this generator or is already released.
    pub fn release_entity(&mut self, entity: Entity) {
        self.try_release_entity(entity)
            .unwrap_or_else(|e| panic!("EntityIdGenerator error: {}", e));
    }

    /// Back to the state right after construction
    pub fn reset(&mut self) {
        self.running_id = u32::from(self.start_id);
        self.recycled.clear();
        self.recycled_indices.clear();
        self.issued.clear();
    }
}

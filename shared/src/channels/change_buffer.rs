use std::{
    cmp::Ordering,
    collections::{btree_map::Entry, BTreeMap, BTreeSet, VecDeque},
};

use crate::{
    channels::channel::ChannelMessage,
    sequence_less_than,
    world::{
        component::{ComponentId, ComponentUpdate},
        entity::Entity,
    },
};

/// Send order weight. Higher goes first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub i32);

impl Priority {
    pub const NORMAL: Priority = Priority(0);
    /// Carried by sent snapshots, so lost state is resent before anything else
    pub const MAX: Priority = Priority(i32::MAX);
    /// Left behind by a packet that had no room for it. New changes go first.
    pub const HELD_BACK: Priority = Priority(-1);
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Destroy,
}

/// All pending changes of one entity, merged
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityChange {
    pub entity: Entity,
    pub kind: ChangeKind,
    pub updates: BTreeMap<ComponentId, ComponentUpdate>,
    pub removals: BTreeSet<ComponentId>,
    pub priority: Priority,
}

impl EntityChange {
    pub fn new(entity: Entity, kind: ChangeKind, priority: Priority) -> Self {
        Self {
            entity,
            kind,
            updates: BTreeMap::new(),
            removals: BTreeSet::new(),
            priority,
        }
    }

    /// Create or Destroy
    pub fn is_existence(&self) -> bool {
        self.kind != ChangeKind::Update
    }

    pub fn component_ids(&self) -> BTreeSet<ComponentId> {
        self.updates
            .keys()
            .chain(self.removals.iter())
            .copied()
            .collect()
    }

    fn merge_update(&mut self, update: ComponentUpdate) {
        self.removals.remove(&update.component_id);
        match self.updates.entry(update.component_id) {
            Entry::Occupied(mut entry) => entry.get_mut().merge_newer(update),
            Entry::Vacant(entry) => {
                entry.insert(update);
            }
        }
    }

    fn merge_removal(&mut self, component_id: ComponentId) {
        self.updates.remove(&component_id);
        self.removals.insert(component_id);
    }

    /// Folds a lost snapshot of this entity back in. Live state wins.
    pub fn merge_older(&mut self, older: EntityChange) {
        match (self.kind, older.kind) {
            (ChangeKind::Destroy, _) => return,
            (ChangeKind::Update, ChangeKind::Destroy) => {
                *self = EntityChange {
                    priority: self.priority.max(older.priority),
                    ..older
                };
                return;
            }
            // Recreated since; the old destroy no longer applies
            (ChangeKind::Create, ChangeKind::Destroy) => return,
            (ChangeKind::Update, ChangeKind::Create) => self.kind = ChangeKind::Create,
            _ => {}
        }

        for (component_id, update) in older.updates {
            if self.removals.contains(&component_id) {
                continue;
            }
            match self.updates.entry(component_id) {
                Entry::Occupied(mut entry) => entry.get_mut().merge_older(update),
                Entry::Vacant(entry) => {
                    entry.insert(update);
                }
            }
        }
        for component_id in older.removals {
            if !self.updates.contains_key(&component_id) {
                self.removals.insert(component_id);
            }
        }
        self.priority = self.priority.max(older.priority);
    }
}

/// Entity changes and messages waiting to be sent, or snapshotted as sent.
#[derive(Clone, Debug, Default)]
pub struct ChangeBuffer {
    entities: BTreeMap<Entity, EntityChange>,
    messages: VecDeque<ChannelMessage>,
}

impl ChangeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.messages.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn get(&self, entity: &Entity) -> Option<&EntityChange> {
        self.entities.get(entity)
    }

    pub fn changes(&self) -> impl Iterator<Item = &EntityChange> {
        self.entities.values()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChannelMessage> {
        self.messages.iter()
    }

    pub fn push_create(&mut self, entity: Entity, components: Vec<ComponentUpdate>, priority: Priority) {
        let change = self
            .entities
            .entry(entity)
            .or_insert_with(|| EntityChange::new(entity, ChangeKind::Create, priority));
        if change.kind == ChangeKind::Destroy {
            *change = EntityChange::new(entity, ChangeKind::Create, priority);
        }
        change.kind = ChangeKind::Create;
        change.priority = change.priority.max(priority);
        for update in components {
            change.merge_update(update);
        }
    }

    pub fn push_update(&mut self, entity: Entity, update: ComponentUpdate, priority: Priority) {
        let change = self
            .entities
            .entry(entity)
            .or_insert_with(|| EntityChange::new(entity, ChangeKind::Update, priority));
        if change.kind == ChangeKind::Destroy {
            return;
        }
        change.priority = change.priority.max(priority);
        change.merge_update(update);
    }

    pub fn push_removal(&mut self, entity: Entity, component_id: ComponentId, priority: Priority) {
        let change = self
            .entities
            .entry(entity)
            .or_insert_with(|| EntityChange::new(entity, ChangeKind::Update, priority));
        if change.kind == ChangeKind::Destroy {
            return;
        }
        change.priority = change.priority.max(priority);
        change.merge_removal(component_id);
    }

    pub fn push_destroy(&mut self, entity: Entity, priority: Priority) {
        let priority = self
            .entities
            .get(&entity)
            .map_or(priority, |change| change.priority.max(priority));
        self.entities
            .insert(entity, EntityChange::new(entity, ChangeKind::Destroy, priority));
    }

    pub fn push_message(&mut self, message: ChannelMessage) {
        self.messages.push_back(message);
    }

    /// Puts a whole change in, as the newest state of its entity
    pub fn insert_change(&mut self, change: EntityChange) {
        match self.entities.entry(change.entity) {
            Entry::Vacant(entry) => {
                entry.insert(change);
            }
            Entry::Occupied(mut entry) => {
                let mut newer = change;
                let older = entry.get().clone();
                newer.merge_older(older);
                entry.insert(newer);
            }
        }
    }

    pub fn take_change(&mut self, entity: &Entity) -> Option<EntityChange> {
        self.entities.remove(entity)
    }

    pub fn message(&self, position: usize) -> Option<&ChannelMessage> {
        self.messages.get(position)
    }

    pub fn take_message(&mut self, position: usize) -> Option<ChannelMessage> {
        self.messages.remove(position)
    }

    /// Entities in send order: priority first, then entity order
    pub fn prioritized_entities(&self) -> Vec<Entity> {
        let mut output: Vec<&EntityChange> = self.entities.values().collect();
        output.sort_by(|a, b| match b.priority.cmp(&a.priority) {
            Ordering::Equal => a.entity.cmp(&b.entity),
            other => other,
        });
        output.into_iter().map(|change| change.entity).collect()
    }

    /// Drops everything still queued to at most `Priority::HELD_BACK`
    pub fn hold_back(&mut self) {
        for change in self.entities.values_mut() {
            change.priority = change.priority.min(Priority::HELD_BACK);
        }
    }

    pub fn set_priority(&mut self, priority: Priority) {
        for change in self.entities.values_mut() {
            change.priority = priority;
        }
    }

    /// Merges a lost snapshot back in front of the live state.
    /// With `ordered`, messages are kept sorted by their wrapping index.
    pub fn merge_lost(&mut self, lost: ChangeBuffer, ordered: bool) {
        for (entity, change) in lost.entities {
            match self.entities.entry(entity) {
                Entry::Vacant(entry) => {
                    entry.insert(change);
                }
                Entry::Occupied(mut entry) => entry.get_mut().merge_older(change),
            }
        }

        let mut messages: Vec<ChannelMessage> = lost.messages.into_iter().collect();
        messages.extend(self.messages.drain(..));
        if ordered {
            messages.sort_by(|a, b| match (a.index, b.index) {
                (Some(a), Some(b)) if a == b => Ordering::Equal,
                (Some(a), Some(b)) if sequence_less_than(a, b) => Ordering::Less,
                (Some(_), Some(_)) => Ordering::Greater,
                _ => Ordering::Equal,
            });
        }
        self.messages = messages.into();
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.messages.clear();
    }
}

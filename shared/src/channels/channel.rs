use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    time::Instant,
};

use tessera_serde::{BitReader, BitWriter, SerdeErr};

use crate::{
    world::{
        component::{ComponentId, ComponentUpdate},
        entity::Entity,
    },
    FloatingOrigin, MessageIndex, PacketIndex, SimulationFrame,
};

/// Components of each entity carried by one sent packet
pub type SentUpdates = BTreeMap<Entity, BTreeSet<ComponentId>>;

/// What the remote side has confirmed receiving
#[derive(Clone, Debug, Default)]
pub struct AckedState {
    entities: HashSet<Entity>,
    components: HashSet<(Entity, ComponentId)>,
}

impl AckedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_entity_acked(&self, entity: &Entity) -> bool {
        self.entities.contains(entity)
    }

    pub fn is_component_acked(&self, entity: &Entity, component_id: &ComponentId) -> bool {
        self.components.contains(&(*entity, *component_id))
    }

    pub fn ack_entity(&mut self, entity: Entity) {
        self.entities.insert(entity);
    }

    pub fn ack_component(&mut self, entity: Entity, component_id: ComponentId) {
        self.components.insert((entity, component_id));
    }

    pub fn remove_component(&mut self, entity: &Entity, component_id: &ComponentId) {
        self.components.remove(&(*entity, *component_id));
    }

    /// Forgets a destroyed entity and all of its components
    pub fn remove_entity(&mut self, entity: &Entity) {
        self.entities.remove(entity);
        self.components.retain(|(owner, _)| owner != entity);
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.components.clear();
    }
}

/// Per-call inputs of `OutChannel::serialize`
#[derive(Clone, Copy)]
pub struct SerializeContext<'a> {
    /// Simulation frame the payload's timestamps are relative to, if it changed
    pub reference_simulation_frame: Option<SimulationFrame>,
    /// Origin offset, if it changed since the last packet
    pub floating_origin: Option<FloatingOrigin>,
    /// Leave commands and inputs queued for a later packet
    pub hold_on_to_commands: bool,
    pub acked: &'a AckedState,
}

impl<'a> SerializeContext<'a> {
    pub fn new(acked: &'a AckedState) -> Self {
        Self {
            reference_simulation_frame: None,
            floating_origin: None,
            hold_on_to_commands: false,
            acked,
        }
    }
}

/// Outbound half of a delivery lane
pub trait OutChannel {
    /// Writes as much pending state as fits. Returns whether anything was written.
    fn serialize(&mut self, writer: &mut BitWriter, context: SerializeContext) -> bool;

    /// Records what the last `serialize` calls wrote as sent in `packet_index`
    fn mark_as_sent(&mut self, packet_index: PacketIndex) -> SentUpdates;

    /// Transport verdict for a packet previously passed to `mark_as_sent`
    fn on_delivery_info(&mut self, packet_index: PacketIndex, delivered: bool, acked: &mut AckedState);

    fn has_changes(&self, acked: &AckedState) -> bool;

    /// Drops all queued and in-flight state
    fn clear(&mut self);

    /// `clear`, plus restarting every sequence
    fn reset(&mut self);
}

/// Inbound half of a delivery lane
pub trait InChannel {
    /// Reads one channel payload. Returns whether an entity was created or updated.
    fn deserialize(
        &mut self,
        reader: &mut BitReader,
        simulation_frame: Option<SimulationFrame>,
        floating_origin: Option<FloatingOrigin>,
    ) -> Result<bool, SerdeErr>;

    /// Releases buffered messages that became deliverable
    fn flush_buffer(&mut self, now: Instant);

    fn take_events(&mut self) -> Vec<ChannelEvent>;

    fn clear(&mut self);

    fn reset(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Command,
    Input,
}

/// A command or input addressed to an entity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    pub kind: MessageKind,
    pub target: Entity,
    pub payload: Vec<u8>,
    /// Assigned at enqueue time on ordered lanes
    pub index: Option<MessageIndex>,
}

/// Received state, handed to the replication layer
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    EntityCreated {
        entity: Entity,
        components: Vec<ComponentUpdate>,
        simulation_frame: Option<SimulationFrame>,
    },
    EntityUpdated {
        entity: Entity,
        updates: Vec<ComponentUpdate>,
        simulation_frame: Option<SimulationFrame>,
    },
    ComponentsRemoved {
        entity: Entity,
        components: Vec<ComponentId>,
    },
    EntityDestroyed {
        entity: Entity,
    },
    Command {
        target: Entity,
        payload: Vec<u8>,
        index: Option<MessageIndex>,
    },
    Input {
        target: Entity,
        payload: Vec<u8>,
        index: Option<MessageIndex>,
    },
}

impl From<ChannelMessage> for ChannelEvent {
    fn from(message: ChannelMessage) -> Self {
        let ChannelMessage {
            kind,
            target,
            payload,
            index,
        } = message;
        match kind {
            MessageKind::Command => ChannelEvent::Command {
                target,
                payload,
                index,
            },
            MessageKind::Input => ChannelEvent::Input {
                target,
                payload,
                index,
            },
        }
    }
}

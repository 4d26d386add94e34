use std::time::Instant;

use log::debug;
use tessera_serde::{BitReader, Serde, SerdeErr};

use crate::{
    channels::{
        channel::{ChannelEvent, ChannelMessage, InChannel},
        wire::{self, ExistenceItem},
    },
    world::{component::ComponentSerializer, entity::Entity, known_entities::KnownEntities},
    FloatingOrigin, SimulationFrame,
};

/// Reliable inbound lane. Turns channel payloads into `ChannelEvent`s.
///
/// Unordered: commands and inputs are emitted as soon as they are read, and a
/// retransmission after a lost ack may emit them again.
///
/// Lanes of one connection share their `KnownEntities`, so an entity created on
/// one lane can be updated or targeted on another.
pub struct InNetworkChannel {
    serializer: Box<dyn ComponentSerializer>,
    ordered: bool,
    known_entities: KnownEntities,
    events: Vec<ChannelEvent>,
    received_messages: Vec<ChannelMessage>,
    floating_origin: Option<FloatingOrigin>,
}

impl InNetworkChannel {
    pub fn new(serializer: Box<dyn ComponentSerializer>) -> Self {
        Self::with_known_entities(serializer, KnownEntities::new())
    }

    pub fn with_known_entities(
        serializer: Box<dyn ComponentSerializer>,
        known_entities: KnownEntities,
    ) -> Self {
        Self::with_ordering(serializer, false, known_entities)
    }

    pub(crate) fn with_ordering(
        serializer: Box<dyn ComponentSerializer>,
        ordered: bool,
        known_entities: KnownEntities,
    ) -> Self {
        Self {
            serializer,
            ordered,
            known_entities,
            events: Vec::new(),
            received_messages: Vec::new(),
            floating_origin: None,
        }
    }

    pub fn is_entity_known(&self, entity: &Entity) -> bool {
        self.known_entities.contains(entity)
    }

    pub fn known_entity_count(&self) -> usize {
        self.known_entities.len()
    }

    pub fn known_entities(&self) -> &KnownEntities {
        &self.known_entities
    }

    /// Latest origin offset received on this lane
    pub fn floating_origin(&self) -> Option<FloatingOrigin> {
        self.floating_origin
    }

    /// Messages read on an ordered lane, awaiting sequencing
    pub(crate) fn take_received_messages(&mut self) -> Vec<ChannelMessage> {
        std::mem::take(&mut self.received_messages)
    }

    fn read_existence(
        &mut self,
        reader: &mut BitReader,
        simulation_frame: Option<SimulationFrame>,
    ) -> Result<bool, SerdeErr> {
        let mut got_entity_update = false;
        while bool::de(reader)? {
            match wire::read_existence(reader, self.serializer.as_ref())? {
                ExistenceItem::Create {
                    entity,
                    components,
                    removals,
                } => {
                    got_entity_update = true;
                    if self.known_entities.insert(entity) {
                        self.events.push(ChannelEvent::EntityCreated {
                            entity,
                            components,
                            simulation_frame,
                        });
                    } else if !components.is_empty() {
                        // retransmitted create whose ack was lost
                        self.events.push(ChannelEvent::EntityUpdated {
                            entity,
                            updates: components,
                            simulation_frame,
                        });
                    }
                    if !removals.is_empty() {
                        self.events.push(ChannelEvent::ComponentsRemoved {
                            entity,
                            components: removals,
                        });
                    }
                }
                ExistenceItem::Destroy(entity) => {
                    if self.known_entities.remove(&entity) {
                        self.events.push(ChannelEvent::EntityDestroyed { entity });
                    } else {
                        debug!("ignoring destroy of unknown {:?}", entity);
                    }
                }
            }
        }
        Ok(got_entity_update)
    }

    fn read_messages(&mut self, reader: &mut BitReader) -> Result<(), SerdeErr> {
        while bool::de(reader)? {
            let message = wire::read_message(reader, self.ordered)?;
            if self.ordered {
                self.received_messages.push(message);
            } else {
                self.events.push(message.into());
            }
        }
        Ok(())
    }

    fn read_updates(
        &mut self,
        reader: &mut BitReader,
        simulation_frame: Option<SimulationFrame>,
    ) -> Result<bool, SerdeErr> {
        let mut got_entity_update = false;
        while bool::de(reader)? {
            let entity = Entity::de(reader)?;
            let (updates, removals) = wire::read_component_list(reader, self.serializer.as_ref())?;
            if !self.known_entities.contains(&entity) {
                debug!("ignoring update of unknown {:?}", entity);
                continue;
            }
            if !updates.is_empty() {
                got_entity_update = true;
                self.events.push(ChannelEvent::EntityUpdated {
                    entity,
                    updates,
                    simulation_frame,
                });
            }
            if !removals.is_empty() {
                self.events.push(ChannelEvent::ComponentsRemoved {
                    entity,
                    components: removals,
                });
            }
        }
        Ok(got_entity_update)
    }
}

impl InChannel for InNetworkChannel {
    fn deserialize(
        &mut self,
        reader: &mut BitReader,
        simulation_frame: Option<SimulationFrame>,
        floating_origin: Option<FloatingOrigin>,
    ) -> Result<bool, SerdeErr> {
        let simulation_frame = Option::<SimulationFrame>::de(reader)?.or(simulation_frame);
        if let Some(floating_origin) = Option::<FloatingOrigin>::de(reader)?.or(floating_origin) {
            self.floating_origin = Some(floating_origin);
        }

        let created = self.read_existence(reader, simulation_frame)?;
        self.read_messages(reader)?;
        let updated = self.read_updates(reader, simulation_frame)?;

        Ok(created || updated)
    }

    fn flush_buffer(&mut self, _now: Instant) {}

    fn take_events(&mut self) -> Vec<ChannelEvent> {
        std::mem::take(&mut self.events)
    }

    fn clear(&mut self) {
        self.events.clear();
        self.received_messages.clear();
    }

    fn reset(&mut self) {
        self.clear();
        self.known_entities.clear();
        self.floating_origin = None;
    }
}

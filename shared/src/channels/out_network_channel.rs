use std::collections::HashSet;

use log::{error, warn};
use tessera_serde::{BitWriter, Serde};

use crate::{
    channels::{
        change_buffer::{ChangeBuffer, ChangeKind, Priority},
        channel::{
            AckedState, ChannelMessage, MessageKind, OutChannel, SentUpdates, SerializeContext,
        },
        wire::{self, ItemFit, END_MARKER_BITS},
    },
    world::{
        component::{ComponentId, ComponentSerializer, ComponentUpdate},
        entity::Entity,
    },
    ChannelConfig, MessageIndex, PacketIndex, SentCache,
};

/// Reliable outbound lane for entity changes, commands and inputs.
///
/// Everything written to a packet is snapshotted under that packet's index.
/// A lost snapshot is merged back into the live buffer, so retransmissions
/// always carry the newest state. In ordered mode every command and input gets
/// a `MessageIndex` when it is queued.
pub struct OutNetworkChannel {
    serializer: Box<dyn ComponentSerializer>,
    ordered: bool,
    buffer: ChangeBuffer,
    serialized: ChangeBuffer,
    sent_cache: SentCache<ChangeBuffer>,
    next_message_index: MessageIndex,
    acked_entities: Vec<Entity>,
}

impl OutNetworkChannel {
    pub fn new(serializer: Box<dyn ComponentSerializer>, ordered: bool) -> Self {
        Self {
            serializer,
            ordered,
            buffer: ChangeBuffer::new(),
            serialized: ChangeBuffer::new(),
            sent_cache: SentCache::new(),
            next_message_index: 0,
            acked_entities: Vec::new(),
        }
    }

    pub fn from_config(config: &ChannelConfig, serializer: Box<dyn ComponentSerializer>) -> Self {
        Self::new(serializer, config.is_ordered())
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    // Queueing

    pub fn create_entity(&mut self, entity: Entity, components: Vec<ComponentUpdate>, priority: Priority) {
        self.buffer.push_create(entity, components, priority);
    }

    pub fn update_component(&mut self, entity: Entity, update: ComponentUpdate, priority: Priority) {
        self.buffer.push_update(entity, update, priority);
    }

    pub fn remove_component(&mut self, entity: Entity, component_id: ComponentId, priority: Priority) {
        self.buffer.push_removal(entity, component_id, priority);
    }

    pub fn destroy_entity(&mut self, entity: Entity, priority: Priority) {
        self.buffer.push_destroy(entity, priority);
    }

    /// Queues a command or input. Returns the assigned index on ordered lanes.
    pub fn send_message(&mut self, kind: MessageKind, target: Entity, payload: Vec<u8>) -> Option<MessageIndex> {
        let index = if self.ordered {
            let index = self.next_message_index;
            self.next_message_index = self.next_message_index.wrapping_add(1);
            Some(index)
        } else {
            None
        };
        self.buffer.push_message(ChannelMessage {
            kind,
            target,
            payload,
            index,
        });
        index
    }

    pub fn send_command(&mut self, target: Entity, payload: Vec<u8>) -> Option<MessageIndex> {
        self.send_message(MessageKind::Command, target, payload)
    }

    pub fn send_input(&mut self, target: Entity, payload: Vec<u8>) -> Option<MessageIndex> {
        self.send_message(MessageKind::Input, target, payload)
    }

    /// Entities with a change acknowledged since the last call
    pub fn take_acked_entities(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.acked_entities)
    }

    pub fn pending(&self) -> &ChangeBuffer {
        &self.buffer
    }

    /// Packets awaiting a delivery report
    pub fn in_flight_count(&self) -> usize {
        self.sent_cache.len()
    }

    fn in_flight_creates(&self) -> HashSet<Entity> {
        self.sent_cache
            .iter()
            .flat_map(|(_, sent)| sent.changes())
            .chain(self.serialized.changes())
            .filter(|change| change.kind == ChangeKind::Create)
            .map(|change| change.entity)
            .collect()
    }

    fn serialize_existence(&mut self, writer: &mut BitWriter, context: &SerializeContext) -> bool {
        let in_flight_creates = self.in_flight_creates();
        let mut wrote_any = false;

        for entity in self.buffer.prioritized_entities() {
            let Some(change) = self.buffer.get(&entity) else {
                continue;
            };
            if !change.is_existence() {
                continue;
            }
            // a destroy must not overtake its own create
            if change.kind == ChangeKind::Destroy
                && !context.acked.is_entity_acked(&entity)
                && in_flight_creates.contains(&entity)
            {
                continue;
            }

            let serializer = self.serializer.as_ref();
            match wire::write_item(writer, END_MARKER_BITS, |w| {
                wire::write_existence(w, change, serializer)
            }) {
                ItemFit::Written => {
                    if let Some(change) = self.buffer.take_change(&entity) {
                        self.serialized.insert_change(change);
                    }
                    wrote_any = true;
                }
                ItemFit::NoSpace => {}
                ItemFit::TooLarge { bits } => {
                    warn!(
                        "Packet Write Error: existence change of {:?} requires {} bits, but an empty packet only has {} bits available! Skipping it.",
                        entity,
                        bits,
                        writer.max_bits()
                    );
                }
            }
        }

        false.ser(writer);
        wrote_any
    }

    fn serialize_messages(&mut self, writer: &mut BitWriter, context: &SerializeContext) -> bool {
        let mut wrote_any = false;

        if !context.hold_on_to_commands {
            let ordered = self.ordered;
            let mut position = 0;
            while let Some(message) = self.buffer.message(position) {
                match wire::write_item(writer, END_MARKER_BITS - 1, |w| {
                    wire::write_message(w, message, ordered)
                }) {
                    ItemFit::Written => {
                        if let Some(message) = self.buffer.take_message(position) {
                            self.serialized.push_message(message);
                        }
                        wrote_any = true;
                        continue;
                    }
                    ItemFit::NoSpace => {}
                    ItemFit::TooLarge { bits } => {
                        warn!(
                            "Packet Write Error: {:?} message for {:?} requires {} bits, but an empty packet only has {} bits available! Dropping it.",
                            message.kind,
                            message.target,
                            bits,
                            writer.max_bits()
                        );
                        self.buffer.take_message(position);
                        continue;
                    }
                }
                if ordered {
                    break;
                }
                position += 1;
            }
        }

        false.ser(writer);
        wrote_any
    }

    fn serialize_updates(&mut self, writer: &mut BitWriter, context: &SerializeContext) -> bool {
        let mut wrote_any = false;

        for entity in self.buffer.prioritized_entities() {
            let Some(change) = self.buffer.get(&entity) else {
                continue;
            };
            if change.kind != ChangeKind::Update {
                continue;
            }
            let created_in_packet = self
                .serialized
                .get(&entity)
                .is_some_and(|sent| sent.kind == ChangeKind::Create);
            if !context.acked.is_entity_acked(&entity) && !created_in_packet {
                continue;
            }

            let serializer = self.serializer.as_ref();
            match wire::write_item(writer, END_MARKER_BITS - 2, |w| {
                wire::write_update(w, change, serializer)
            }) {
                ItemFit::Written => {
                    if let Some(change) = self.buffer.take_change(&entity) {
                        self.serialized.insert_change(change);
                    }
                    wrote_any = true;
                }
                ItemFit::NoSpace => {}
                ItemFit::TooLarge { bits } => {
                    warn!(
                        "Packet Write Error: update of {:?} requires {} bits, but an empty packet only has {} bits available! Skipping it.",
                        entity,
                        bits,
                        writer.max_bits()
                    );
                }
            }
        }

        false.ser(writer);
        wrote_any
    }
}

impl OutChannel for OutNetworkChannel {
    fn serialize(&mut self, writer: &mut BitWriter, context: SerializeContext) -> bool {
        let start = writer.bits_written();
        context.reference_simulation_frame.ser(writer);
        context.floating_origin.ser(writer);

        let wrote_existence = self.serialize_existence(writer, &context);
        let wrote_messages = self.serialize_messages(writer, &context);
        let wrote_updates = self.serialize_updates(writer, &context);

        let wrote_any = wrote_existence || wrote_messages || wrote_updates;
        if !wrote_any {
            writer.truncate(start);
        }
        wrote_any
    }

    fn mark_as_sent(&mut self, packet_index: PacketIndex) -> SentUpdates {
        let mut sent = std::mem::take(&mut self.serialized);

        let mut output = SentUpdates::new();
        for change in sent.changes() {
            output.insert(change.entity, change.component_ids());
        }

        sent.set_priority(Priority::MAX);
        self.buffer.hold_back();
        self.sent_cache.push(packet_index, sent);

        output
    }

    fn on_delivery_info(&mut self, packet_index: PacketIndex, delivered: bool, acked: &mut AckedState) {
        let sent = match self.sent_cache.try_take(packet_index) {
            Ok(sent) => sent,
            Err(err) => {
                error!("OutNetworkChannel: {}", err);
                return;
            }
        };

        if !delivered {
            self.buffer.merge_lost(sent, self.ordered);
            return;
        }

        for change in sent.changes() {
            let entity = change.entity;
            match change.kind {
                ChangeKind::Destroy => acked.remove_entity(&entity),
                ChangeKind::Create | ChangeKind::Update => {
                    if change.kind == ChangeKind::Create {
                        acked.ack_entity(entity);
                    }
                    if !acked.is_entity_acked(&entity) {
                        continue;
                    }
                    for component_id in change.updates.keys() {
                        acked.ack_component(entity, *component_id);
                    }
                    for component_id in &change.removals {
                        acked.remove_component(&entity, component_id);
                    }
                }
            }
            self.acked_entities.push(entity);
        }
    }

    fn has_changes(&self, acked: &AckedState) -> bool {
        self.buffer.message_count() > 0
            || self
                .buffer
                .changes()
                .any(|change| change.is_existence() || acked.is_entity_acked(&change.entity))
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.serialized.clear();
        self.sent_cache.clear();
        self.acked_entities.clear();
    }

    fn reset(&mut self) {
        self.clear();
        self.next_message_index = 0;
    }
}

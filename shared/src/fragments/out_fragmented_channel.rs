use std::collections::VecDeque;

use log::{debug, error, trace};
use tessera_serde::BitWriter;

use crate::{
    buffer_pool::BufferPool,
    channels::channel::{AckedState, OutChannel, SentUpdates, SerializeContext},
    fragments::{
        channel_packet_id::ChannelPacketId,
        error::FragmentationError,
        fragment_map::{FragmentMap, FragmentSection},
        fragmentation_serializer::FragmentationSerializer,
    },
    FloatingOrigin, FragmentationConfig, PacketIndex, SentCache, SimulationFrame,
};

struct OutChannelPacket {
    id: ChannelPacketId,
    /// Sequence the wrapped channel knows this payload by
    inner_sequence: PacketIndex,
    data: Vec<u8>,
    fragment_count: u32,
    pending: FragmentMap,
    acked: FragmentMap,
    simulation_frame: Option<SimulationFrame>,
    floating_origin: Option<FloatingOrigin>,
}

impl OutChannelPacket {
    fn is_fully_acked(&self) -> bool {
        self.acked.covers(self.fragment_count)
    }
}

/// Fragments of one channel packet carried by one outer packet
struct SentFragments {
    id: ChannelPacketId,
    inner_sequence: PacketIndex,
    sections: Vec<FragmentSection>,
}

/// Wraps an outbound lane so its payloads may be larger than an outer packet.
///
/// Each payload of the wrapped channel becomes a channel packet, split into
/// fragments that are sent, acked and resent individually. The wrapped channel
/// hears about a payload only once all of its fragments are acked, or once a
/// newer channel packet completes first, in which case the older one is
/// reported lost.
pub struct OutFragmentedChannel<C: OutChannel> {
    inner: C,
    config: FragmentationConfig,
    serializer: FragmentationSerializer,
    packets: Vec<Option<OutChannelPacket>>,
    queue: VecDeque<ChannelPacketId>,
    next_id: ChannelPacketId,
    next_inner_sequence: PacketIndex,
    buffer_pool: BufferPool,
    serialized_sections: Vec<(ChannelPacketId, FragmentSection)>,
    sent_cache: SentCache<Vec<SentFragments>>,
    queued_sent_updates: VecDeque<SentUpdates>,
}

impl<C: OutChannel> OutFragmentedChannel<C> {
    pub fn new(inner: C, config: FragmentationConfig) -> Self {
        let serializer = FragmentationSerializer::new(&config);
        let slot_count = config.max_channel_packet_id() as usize;
        let mut packets = Vec::with_capacity(slot_count);
        packets.resize_with(slot_count, || None);

        Self {
            inner,
            next_id: ChannelPacketId::new(1, config.channel_packet_id_bits),
            buffer_pool: BufferPool::new(config.max_pooled_buffers),
            config,
            serializer,
            packets,
            queue: VecDeque::new(),
            next_inner_sequence: 0,
            serialized_sections: Vec::new(),
            sent_cache: SentCache::new(),
            queued_sent_updates: VecDeque::new(),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn in_flight_channel_packets(&self) -> usize {
        self.queue.len()
    }

    pub fn pooled_buffers(&self) -> usize {
        self.buffer_pool.pooled()
    }

    /// Bit budget for a new channel packet given `available_bits` left in the
    /// outer packet. Zero when there isn't room for a full-size run header plus
    /// one fragment, so the new channel packet starts in the next outer packet.
    pub fn preferred_max_bit_count(&self, available_bits: u32, context: &SerializeContext) -> u32 {
        let max_bytes = self.config.max_channel_packet_bytes;
        let max_fragments = self.serializer.number_of_fragments(max_bytes as usize);
        let max_fragments = u32::try_from(max_fragments).unwrap_or(u32::MAX);
        let header_bits = self.serializer.header_size_in_bits(
            0,
            max_fragments,
            true,
            context.reference_simulation_frame.is_some(),
            context.floating_origin.is_some(),
        );
        if available_bits > header_bits + self.config.fragment_size_in_bits() {
            max_bytes.saturating_mul(8)
        } else {
            0
        }
    }

    fn try_fragment_count(&self, len: usize) -> Result<u32, FragmentationError> {
        let fragments = self.serializer.number_of_fragments(len);
        if len > self.config.max_channel_packet_bytes as usize || fragments > u64::from(u32::MAX) {
            return Err(FragmentationError::ChannelPacketTooLarge {
                bytes: len,
                fragments,
                max_bytes: self.config.max_channel_packet_bytes,
            });
        }
        Ok(fragments as u32)
    }

    /// Asks the wrapped channel for a new payload and queues it as a channel
    /// packet. Returns the new id, if one was created.
    fn create_channel_packet(
        &mut self,
        writer: &BitWriter,
        reserved_bits: u32,
        context: &SerializeContext,
    ) -> Option<ChannelPacketId> {
        let available_bits = writer.bits_free().saturating_sub(reserved_bits);
        let max_bits = self.preferred_max_bit_count(available_bits, context);
        if max_bits == 0 {
            return None;
        }

        let mut inner_writer = BitWriter::from_buffer(self.buffer_pool.checkout(), max_bits);
        let inner_context = SerializeContext {
            reference_simulation_frame: None,
            floating_origin: None,
            ..*context
        };
        if !self.inner.serialize(&mut inner_writer, inner_context) {
            self.buffer_pool.release(inner_writer.to_bytes());
            return None;
        }
        let data = inner_writer.to_bytes();
        let fragment_count = self
            .try_fragment_count(data.len())
            .unwrap_or_else(|e| panic!("OutFragmentedChannel error: {}", e));

        let id = self.next_id;
        self.next_id = id.next();
        let inner_sequence = self.next_inner_sequence;
        self.next_inner_sequence = self.next_inner_sequence.wrapping_add(1);

        let sent_updates = self.inner.mark_as_sent(inner_sequence);
        self.queued_sent_updates.push_back(sent_updates);

        debug!(
            "created channel packet {:?}: {} bytes in {} fragments",
            id,
            data.len(),
            fragment_count
        );

        let slot = &mut self.packets[id.value() as usize];
        debug_assert!(slot.is_none(), "channel packet slot {:?} still in use", id);
        *slot = Some(OutChannelPacket {
            id,
            inner_sequence,
            data,
            fragment_count,
            pending: FragmentMap::with_range(fragment_count),
            acked: FragmentMap::new(),
            simulation_frame: context.reference_simulation_frame,
            floating_origin: context.floating_origin,
        });
        self.queue.push_back(id);

        Some(id)
    }

    fn serialize_pending(&mut self, writer: &mut BitWriter, reserved_bits: u32, id: ChannelPacketId) -> bool {
        let Some(packet) = self.packets[id.value() as usize].as_ref() else {
            return true;
        };
        if packet.pending.is_empty() {
            return true;
        }
        self.serializer.serialize_channel_packet_fragments(
            writer,
            reserved_bits,
            packet.simulation_frame,
            packet.floating_origin,
            packet.id,
            &packet.data,
            &packet.pending,
            &mut self.serialized_sections,
        )
    }

    fn try_drop_oldest(&mut self, delivered: bool, acked: &mut AckedState) -> Result<(), FragmentationError> {
        let id = self
            .queue
            .pop_front()
            .ok_or(FragmentationError::NothingInFlight)?;
        let packet = self.packets[id.value() as usize]
            .take()
            .ok_or(FragmentationError::NothingInFlight)?;

        if delivered {
            debug!("channel packet {:?} fully acked", id);
        } else {
            debug!("dropping channel packet {:?}, superseded by a newer one", id);
        }
        self.inner
            .on_delivery_info(packet.inner_sequence, delivered, acked);
        self.buffer_pool.release(packet.data);
        Ok(())
    }

    fn drop_oldest(&mut self, delivered: bool, acked: &mut AckedState) {
        self.try_drop_oldest(delivered, acked)
            .unwrap_or_else(|e| panic!("OutFragmentedChannel error: {}", e));
    }

    fn is_fully_acked(&self, id: &ChannelPacketId) -> bool {
        self.packets[id.value() as usize]
            .as_ref()
            .is_some_and(|packet| packet.is_fully_acked())
    }

    /// Delivers every fully acked channel packet, dropping all older ones first
    fn process_acked_packets(&mut self, acked: &mut AckedState) {
        while let Some(position) = self.queue.iter().position(|id| self.is_fully_acked(id)) {
            for _ in 0..position {
                self.drop_oldest(false, acked);
            }
            self.drop_oldest(true, acked);
        }
    }

    fn release_all(&mut self) {
        for slot in self.packets.iter_mut() {
            if let Some(packet) = slot.take() {
                self.buffer_pool.release(packet.data);
            }
        }
        self.queue.clear();
        self.serialized_sections.clear();
        self.sent_cache.clear();
        self.queued_sent_updates.clear();
    }
}

impl<C: OutChannel> OutChannel for OutFragmentedChannel<C> {
    fn serialize(&mut self, writer: &mut BitWriter, context: SerializeContext) -> bool {
        self.serialized_sections.clear();
        let bits = self.config.channel_packet_id_bits;
        let reserved_bits = u32::from(bits);

        let mut has_more_space = true;
        let queued: Vec<ChannelPacketId> = self.queue.iter().copied().collect();
        for id in queued {
            has_more_space = self.serialize_pending(writer, reserved_bits, id);
            if !has_more_space {
                break;
            }
        }

        if has_more_space
            && self.queue.len() < self.config.max_in_flight_channel_packets()
            && self.inner.has_changes(context.acked)
        {
            if let Some(id) = self.create_channel_packet(writer, reserved_bits, &context) {
                self.serialize_pending(writer, reserved_bits, id);
            }
        }

        if self.serialized_sections.is_empty() {
            return false;
        }
        ChannelPacketId::end_of_channel_packets(bits).ser(writer);
        true
    }

    fn mark_as_sent(&mut self, packet_index: PacketIndex) -> SentUpdates {
        let mut sent: Vec<SentFragments> = Vec::new();
        for (id, section) in self.serialized_sections.drain(..) {
            let Some(packet) = self.packets[id.value() as usize].as_mut() else {
                continue;
            };
            packet.pending.remove_section(section);
            match sent.iter_mut().find(|fragments| fragments.id == id) {
                Some(fragments) => fragments.sections.push(section),
                None => sent.push(SentFragments {
                    id,
                    inner_sequence: packet.inner_sequence,
                    sections: vec![section],
                }),
            }
        }
        self.sent_cache.push(packet_index, sent);

        self.queued_sent_updates.pop_front().unwrap_or_default()
    }

    fn on_delivery_info(&mut self, packet_index: PacketIndex, delivered: bool, acked: &mut AckedState) {
        let sent = match self.sent_cache.try_take(packet_index) {
            Ok(sent) => sent,
            Err(err) => {
                error!("OutFragmentedChannel: {}", err);
                return;
            }
        };

        for fragments in sent {
            let packet = self.packets[fragments.id.value() as usize]
                .as_mut()
                .filter(|packet| packet.inner_sequence == fragments.inner_sequence);
            let Some(packet) = packet else {
                trace!("channel packet {:?} already dropped", fragments.id);
                continue;
            };
            for section in fragments.sections {
                if delivered {
                    packet.acked.add_section(section);
                } else {
                    packet.pending.add_section(section);
                }
            }
        }

        self.process_acked_packets(acked);
    }

    fn has_changes(&self, acked: &AckedState) -> bool {
        let has_pending = self.queue.iter().any(|id| {
            self.packets[id.value() as usize]
                .as_ref()
                .is_some_and(|packet| !packet.pending.is_empty())
        });
        has_pending || self.inner.has_changes(acked)
    }

    fn clear(&mut self) {
        self.release_all();
        self.inner.clear();
    }

    fn reset(&mut self) {
        self.release_all();
        self.next_id = ChannelPacketId::new(1, self.config.channel_packet_id_bits);
        self.next_inner_sequence = 0;
        self.inner.reset();
    }
}

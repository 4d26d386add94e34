use std::{collections::VecDeque, time::Instant};

use log::{debug, warn};
use tessera_serde::{BitReader, SerdeErr};

use crate::{
    buffer_pool::BufferPool,
    channels::channel::{ChannelEvent, InChannel},
    fragments::{
        channel_packet_id::ChannelPacketId,
        error::FragmentationError,
        fragment_map::FragmentMap,
        fragmentation_serializer::{FragmentHeader, FragmentationSerializer},
    },
    FloatingOrigin, FragmentationConfig, SimulationFrame,
};

struct InChannelPacket {
    data: Vec<u8>,
    received: FragmentMap,
    /// Known once the run carrying the final fragment arrived
    fragment_count: Option<u32>,
    data_len: Option<usize>,
    has_first_fragment: bool,
    simulation_frame: Option<SimulationFrame>,
    floating_origin: Option<FloatingOrigin>,
}

impl InChannelPacket {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            received: FragmentMap::new(),
            fragment_count: None,
            data_len: None,
            has_first_fragment: false,
            simulation_frame: None,
            floating_origin: None,
        }
    }

    fn is_fully_received(&self) -> bool {
        self.fragment_count
            .is_some_and(|count| self.received.covers(count))
    }

    fn apply(&mut self, header: &FragmentHeader, fragment_size_in_bytes: u16) {
        for gap in self
            .received
            .gaps(header.fragment_index, header.fragment_count)
        {
            self.received.add_section(gap);
        }
        if header.is_last {
            self.fragment_count = Some(header.fragment_index + header.fragment_count);
            self.data_len = header.channel_packet_len(fragment_size_in_bytes);
        }
        if header.fragment_index == 0 && !self.has_first_fragment {
            self.has_first_fragment = true;
            self.simulation_frame = header.simulation_frame;
            self.floating_origin = header.floating_origin;
        }
    }
}

/// Inbound counterpart of `OutFragmentedChannel`.
///
/// Reassembles channel packets from fragment runs arriving in any order and
/// hands each complete one to the wrapped channel. Completing a channel packet
/// drops every older incomplete one, mirroring the sender.
pub struct InFragmentedChannel<C: InChannel> {
    inner: C,
    config: FragmentationConfig,
    serializer: FragmentationSerializer,
    packets: Vec<Option<InChannelPacket>>,
    queue: VecDeque<ChannelPacketId>,
    last_acked: ChannelPacketId,
    buffer_pool: BufferPool,
}

impl<C: InChannel> InFragmentedChannel<C> {
    pub fn new(inner: C, config: FragmentationConfig) -> Self {
        let serializer = FragmentationSerializer::new(&config);
        let slot_count = config.max_channel_packet_id() as usize;
        let mut packets = Vec::with_capacity(slot_count);
        packets.resize_with(slot_count, || None);

        Self {
            inner,
            last_acked: ChannelPacketId::new(0, config.channel_packet_id_bits),
            buffer_pool: BufferPool::new(config.max_pooled_buffers),
            config,
            serializer,
            packets,
            queue: VecDeque::new(),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Channel packets currently being reassembled, including placeholders
    pub fn pending_channel_packets(&self) -> usize {
        self.queue.len()
    }

    /// Id of the most recently delivered or dropped channel packet
    pub fn last_acked_channel_packet_id(&self) -> ChannelPacketId {
        self.last_acked
    }

    /// Slot for `id`, creating it and every id before it that isn't tracked
    /// yet. Stale ids, and ids too far ahead, yield `None`.
    fn try_get_channel_packet(&mut self, id: ChannelPacketId) -> Option<&mut InChannelPacket> {
        if !self.last_acked.is_valid_successor(&id) {
            warn!(
                "ignoring fragments of channel packet {:?}, last completed was {:?}",
                id, self.last_acked
            );
            return None;
        }

        if self.packets[id.value() as usize].is_none() {
            let mut next = self.queue.back().copied().unwrap_or(self.last_acked).next();
            loop {
                let buffer = self.buffer_pool.checkout();
                self.packets[next.value() as usize] = Some(InChannelPacket::new(buffer));
                self.queue.push_back(next);
                if next == id {
                    break;
                }
                next = next.next();
            }
        }

        self.packets[id.value() as usize].as_mut()
    }

    fn max_fragments(&self) -> u64 {
        self.serializer
            .number_of_fragments(self.config.max_channel_packet_bytes as usize)
    }

    fn try_take_oldest(&mut self) -> Result<(ChannelPacketId, InChannelPacket), FragmentationError> {
        let id = self
            .queue
            .pop_front()
            .ok_or(FragmentationError::NothingInFlight)?;
        let packet = self.packets[id.value() as usize]
            .take()
            .ok_or(FragmentationError::NothingInFlight)?;
        self.last_acked = id;
        Ok((id, packet))
    }

    fn take_oldest(&mut self) -> (ChannelPacketId, InChannelPacket) {
        self.try_take_oldest()
            .unwrap_or_else(|e| panic!("InFragmentedChannel error: {}", e))
    }

    fn is_fully_received(&self, id: &ChannelPacketId) -> bool {
        self.packets[id.value() as usize]
            .as_ref()
            .is_some_and(|packet| packet.is_fully_received())
    }

    /// Delivers every complete channel packet, dropping all older ones first
    fn process_received_packets(&mut self) -> Result<bool, SerdeErr> {
        let mut got_entity_update = false;

        while let Some(position) = self.queue.iter().position(|id| self.is_fully_received(id)) {
            for _ in 0..position {
                let (id, packet) = self.take_oldest();
                debug!("dropping incomplete channel packet {:?}, superseded by a newer one", id);
                self.buffer_pool.release(packet.data);
            }

            let (id, mut packet) = self.take_oldest();
            if let Some(len) = packet.data_len {
                packet.data.truncate(len);
            }
            debug!("channel packet {:?} complete: {} bytes", id, packet.data.len());

            let result = self.inner.deserialize(
                &mut BitReader::new(&packet.data),
                packet.simulation_frame,
                packet.floating_origin,
            );
            self.buffer_pool.release(packet.data);
            got_entity_update |= result?;
        }

        Ok(got_entity_update)
    }

    fn release_all(&mut self) {
        for slot in self.packets.iter_mut() {
            if let Some(packet) = slot.take() {
                self.buffer_pool.release(packet.data);
            }
        }
        self.queue.clear();
    }
}

impl<C: InChannel> InChannel for InFragmentedChannel<C> {
    /// Reads fragment runs up to the end-of-channel-packets sentinel. Metadata
    /// travels in the fragment headers, so the arguments are unused.
    fn deserialize(
        &mut self,
        reader: &mut BitReader,
        _simulation_frame: Option<SimulationFrame>,
        _floating_origin: Option<FloatingOrigin>,
    ) -> Result<bool, SerdeErr> {
        let bits = self.config.channel_packet_id_bits;
        let fragment_size = self.config.fragment_size_in_bytes;
        let max_fragments = self.max_fragments();
        let serializer = self.serializer.clone();

        loop {
            let id = ChannelPacketId::de(reader, bits)?;
            if id.is_end_of_channel_packets() {
                break;
            }

            let header = serializer.read_header(reader, id)?;
            if u64::from(header.fragment_index) + u64::from(header.fragment_count) > max_fragments {
                warn!("fragment run {:?} exceeds {} fragments", id, max_fragments);
                return Err(SerdeErr);
            }

            match self.try_get_channel_packet(id) {
                Some(packet) => {
                    serializer.read_payload(reader, &header, Some(&mut packet.data))?;
                    packet.apply(&header, fragment_size);
                }
                None => serializer.read_payload(reader, &header, None)?,
            }
        }

        self.process_received_packets()
    }

    fn flush_buffer(&mut self, now: Instant) {
        self.inner.flush_buffer(now);
    }

    fn take_events(&mut self) -> Vec<ChannelEvent> {
        self.inner.take_events()
    }

    fn clear(&mut self) {
        self.release_all();
        self.inner.clear();
    }

    fn reset(&mut self) {
        self.release_all();
        self.last_acked = ChannelPacketId::new(0, self.config.channel_packet_id_bits);
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tessera_serde::{BitReader, BitWrite, BitWriter, SerdeErr};

    use super::InFragmentedChannel;
    use crate::{
        channels::channel::{ChannelEvent, InChannel},
        fragments::{
            channel_packet_id::ChannelPacketId, fragment_map::FragmentMap,
            fragmentation_serializer::FragmentationSerializer,
        },
        FloatingOrigin, FragmentationConfig,
    };

    #[derive(Default)]
    struct CollectingChannel {
        received: Vec<(Vec<u8>, Option<u64>, Option<FloatingOrigin>)>,
    }

    impl InChannel for CollectingChannel {
        fn deserialize(
            &mut self,
            reader: &mut BitReader,
            simulation_frame: Option<u64>,
            floating_origin: Option<FloatingOrigin>,
        ) -> Result<bool, SerdeErr> {
            let len = (reader.remaining_bits() / 8) as usize;
            let data = reader.read_bytes_unaligned(len)?;
            self.received.push((data, simulation_frame, floating_origin));
            Ok(true)
        }

        fn flush_buffer(&mut self, _now: Instant) {}

        fn take_events(&mut self) -> Vec<ChannelEvent> {
            Vec::new()
        }

        fn clear(&mut self) {}

        fn reset(&mut self) {
            self.received.clear();
        }
    }

    fn channel() -> InFragmentedChannel<CollectingChannel> {
        InFragmentedChannel::new(CollectingChannel::default(), FragmentationConfig::default())
    }

    /// Outer payload carrying `[index, index + count)` of each listed channel packet
    fn runs(runs: &[(u32, &[u8], u32, u32, Option<u64>)]) -> Vec<u8> {
        let serializer = FragmentationSerializer::new(&FragmentationConfig::default());
        let mut writer = BitWriter::new();
        let mut sections = Vec::new();
        for (id, data, index, count, simulation_frame) in runs {
            let mut pending = FragmentMap::new();
            pending.add(*index, *count);
            serializer.serialize_channel_packet_fragments(
                &mut writer,
                0,
                *simulation_frame,
                None,
                ChannelPacketId::new(*id, 5),
                data,
                &pending,
                &mut sections,
            );
        }
        writer.write_bits(31, 5);
        writer.to_bytes()
    }

    fn receive(channel: &mut InFragmentedChannel<CollectingChannel>, bytes: &[u8]) -> bool {
        channel
            .deserialize(&mut BitReader::new(bytes), None, None)
            .unwrap()
    }

    #[test]
    fn reassembles_out_of_order_fragments() {
        let data: Vec<u8> = (0..10).collect();
        let mut channel = channel();

        assert!(!receive(&mut channel, &runs(&[(1, &data, 6, 4, None)])));
        assert!(!receive(&mut channel, &runs(&[(1, &data, 0, 3, Some(77))])));
        assert!(receive(&mut channel, &runs(&[(1, &data, 3, 3, None)])));

        assert_eq!(channel.inner().received, vec![(data, Some(77), None)]);
        assert_eq!(channel.last_acked_channel_packet_id().value(), 1);
        assert_eq!(channel.pending_channel_packets(), 0);
    }

    #[test]
    fn duplicate_ranges_are_tolerated() {
        let data = [9u8; 6];
        let mut channel = channel();

        receive(&mut channel, &runs(&[(1, &data, 0, 4, None)]));
        receive(&mut channel, &runs(&[(1, &data, 2, 4, None)]));

        assert_eq!(channel.inner().received.len(), 1);
        assert_eq!(channel.inner().received[0].0, data.to_vec());
    }

    #[test]
    fn newer_completion_drops_older() {
        let older = [1u8; 8];
        let newer = [2u8; 3];
        let mut channel = channel();

        receive(&mut channel, &runs(&[(1, &older, 0, 4, None), (2, &newer, 0, 3, None)]));

        assert_eq!(channel.inner().received.len(), 1);
        assert_eq!(channel.inner().received[0].0, newer.to_vec());
        assert_eq!(channel.last_acked_channel_packet_id().value(), 2);

        // the rest of the dropped packet is stale now
        receive(&mut channel, &runs(&[(1, &older, 4, 4, None)]));
        assert_eq!(channel.inner().received.len(), 1);
        assert_eq!(channel.pending_channel_packets(), 0);
    }

    #[test]
    fn future_ids_create_placeholders() {
        let data = [5u8; 2];
        let mut channel = channel();

        receive(&mut channel, &runs(&[(4, &data, 0, 1, None)]));
        assert_eq!(channel.pending_channel_packets(), 4);
    }

    #[test]
    fn ids_beyond_window_are_ignored() {
        let data = [5u8; 1];
        let mut channel = channel();

        receive(&mut channel, &runs(&[(16, &data, 0, 1, None)]));
        assert_eq!(channel.pending_channel_packets(), 0);
        assert!(channel.inner().received.is_empty());
    }

    #[test]
    fn missing_sentinel_is_an_error() {
        let mut channel = channel();
        let mut writer = BitWriter::new();
        writer.write_bits(1, 5);
        let bytes = writer.to_bytes();
        assert!(channel
            .deserialize(&mut BitReader::with_bit_length(&bytes, 5), None, None)
            .is_err());
    }
}

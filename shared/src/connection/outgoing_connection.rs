use log::{debug, trace};
use tessera_serde::{BitWriter, Serde};

use crate::{
    channels::{
        channel::{AckedState, OutChannel, SerializeContext},
        error::ChannelError,
        out_network_channel::OutNetworkChannel,
    },
    connection::{lane::OutLane, transport::PacketTransport},
    world::component::ComponentSerializer,
    ConnectionConfig, FloatingOrigin, PacketIndex, SimulationFrame,
};

/// Sending half of a connection.
///
/// Every outer packet carries, per lane in configuration order, a presence bit
/// followed by that lane's payload. All lanes are marked as sent under every
/// packet index, so their sent caches stay aligned with the transport.
pub struct OutgoingConnection {
    lanes: Vec<OutLane>,
    acked: AckedState,
    next_packet_index: PacketIndex,
    max_packet_bytes: u32,
    simulation_frame: Option<SimulationFrame>,
    floating_origin: Option<FloatingOrigin>,
    hold_on_to_commands: bool,
}

impl OutgoingConnection {
    pub fn new(
        config: &ConnectionConfig,
        serializer_factory: impl Fn() -> Box<dyn ComponentSerializer>,
    ) -> Self {
        Self {
            lanes: config
                .channels
                .iter()
                .map(|channel| OutLane::new(channel, serializer_factory()))
                .collect(),
            acked: AckedState::new(),
            next_packet_index: 0,
            max_packet_bytes: config.max_packet_bytes,
            simulation_frame: None,
            floating_origin: None,
            hold_on_to_commands: false,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn try_channel(&self, index: usize) -> Result<&OutNetworkChannel, ChannelError> {
        let channel_count = self.lanes.len();
        self.lanes
            .get(index)
            .map(OutLane::network)
            .ok_or(ChannelError::UnknownChannel {
                index,
                channel_count,
            })
    }

    pub fn try_channel_mut(&mut self, index: usize) -> Result<&mut OutNetworkChannel, ChannelError> {
        let channel_count = self.lanes.len();
        self.lanes
            .get_mut(index)
            .map(OutLane::network_mut)
            .ok_or(ChannelError::UnknownChannel {
                index,
                channel_count,
            })
    }

    /// Panicking form of `try_channel_mut`
    pub fn channel_mut(&mut self, index: usize) -> &mut OutNetworkChannel {
        self.try_channel_mut(index)
            .unwrap_or_else(|e| panic!("OutgoingConnection error: {}", e))
    }

    pub fn lane(&self, index: usize) -> Option<&OutLane> {
        self.lanes.get(index)
    }

    /// What the remote side has confirmed so far
    pub fn acked_state(&self) -> &AckedState {
        &self.acked
    }

    pub fn next_packet_index(&self) -> PacketIndex {
        self.next_packet_index
    }

    /// Reference frame stamped on the next packets
    pub fn set_simulation_frame(&mut self, simulation_frame: Option<SimulationFrame>) {
        self.simulation_frame = simulation_frame;
    }

    pub fn set_floating_origin(&mut self, floating_origin: Option<FloatingOrigin>) {
        self.floating_origin = floating_origin;
    }

    /// While set, commands and inputs stay queued; entity changes are still sent
    pub fn set_hold_on_to_commands(&mut self, hold_on_to_commands: bool) {
        self.hold_on_to_commands = hold_on_to_commands;
    }

    pub fn has_changes(&self) -> bool {
        self.lanes.iter().any(|lane| match lane {
            OutLane::Plain(channel) => channel.has_changes(&self.acked),
            OutLane::Fragmented(channel) => channel.has_changes(&self.acked),
        })
    }

    /// Writes one outer packet and hands it to `transport`. Returns the index
    /// it was sent under, or `None` if no lane had anything to send.
    pub fn send_packet(&mut self, transport: &mut dyn PacketTransport) -> Option<PacketIndex> {
        let packet_index = self.next_packet_index;
        let mut writer = BitWriter::with_max_bytes(self.max_packet_bytes);
        // presence bits of all lanes
        writer.reserve_bits(self.lanes.len() as u32);

        let context = SerializeContext {
            reference_simulation_frame: self.simulation_frame,
            floating_origin: self.floating_origin,
            hold_on_to_commands: self.hold_on_to_commands,
            acked: &self.acked,
        };

        let mut wrote_any = false;
        for (index, lane) in self.lanes.iter_mut().enumerate() {
            writer.release_bits(1);
            let start = writer.bits_written();
            true.ser(&mut writer);
            if lane.channel_mut().serialize(&mut writer, context) {
                trace!(
                    "channel {} wrote {} bits into packet {}",
                    index,
                    writer.bits_written() - start - 1,
                    packet_index
                );
                wrote_any = true;
            } else {
                writer.truncate(start);
                false.ser(&mut writer);
            }
        }

        if !wrote_any {
            return None;
        }

        for lane in self.lanes.iter_mut() {
            lane.channel_mut().mark_as_sent(packet_index);
        }
        self.next_packet_index = self.next_packet_index.wrapping_add(1);

        let payload = writer.to_bytes();
        debug!("sending packet {}: {} bytes", packet_index, payload.len());
        transport.send(packet_index, payload.into_boxed_slice());

        Some(packet_index)
    }

    /// Forwards every pending delivery report to all lanes
    pub fn process_delivery_reports(&mut self, transport: &mut dyn PacketTransport) {
        for (packet_index, delivered) in transport.take_delivery_reports() {
            self.on_delivery_info(packet_index, delivered);
        }
    }

    pub fn on_delivery_info(&mut self, packet_index: PacketIndex, delivered: bool) {
        trace!(
            "packet {} {}",
            packet_index,
            if delivered { "delivered" } else { "lost" }
        );
        for lane in self.lanes.iter_mut() {
            lane.channel_mut()
                .on_delivery_info(packet_index, delivered, &mut self.acked);
        }
    }

    pub fn reset(&mut self) {
        for lane in self.lanes.iter_mut() {
            lane.channel_mut().reset();
        }
        self.acked.clear();
        self.next_packet_index = 0;
    }
}

use log::trace;
use tessera_serde::{BitReader, BitWriter, SerdeErr};
use tessera_shared::{
    AckedState, FloatingOrigin, InChannel, OutChannel, PacketIndex, PacketTransport,
    SerializeContext, SimulationFrame,
};

use crate::local_link::LossyLink;

/// Drives one outbound channel and its inbound counterpart over a `LossyLink`
pub struct ChannelHarness<O: OutChannel, I: InChannel> {
    pub sender: O,
    pub receiver: I,
    pub acked: AckedState,
    pub link: LossyLink,
    pub simulation_frame: Option<SimulationFrame>,
    pub floating_origin: Option<FloatingOrigin>,
    packet_bytes: u32,
    next_packet_index: PacketIndex,
}

impl<O: OutChannel, I: InChannel> ChannelHarness<O, I> {
    pub fn new(sender: O, receiver: I, link: LossyLink, packet_bytes: u32) -> Self {
        Self {
            sender,
            receiver,
            acked: AckedState::new(),
            link,
            simulation_frame: None,
            floating_origin: None,
            packet_bytes,
            next_packet_index: 0,
        }
    }

    /// Serializes one outer packet and puts it on the link
    pub fn send_packet(&mut self) -> Option<PacketIndex> {
        let mut writer = BitWriter::with_max_bytes(self.packet_bytes);
        let context = SerializeContext {
            reference_simulation_frame: self.simulation_frame,
            floating_origin: self.floating_origin,
            ..SerializeContext::new(&self.acked)
        };
        if !self.sender.serialize(&mut writer, context) {
            return None;
        }
        assert!(
            !writer.overflowed(),
            "packet of {} bits exceeds the {} byte budget",
            writer.bits_written(),
            self.packet_bytes
        );

        let packet_index = self.next_packet_index;
        self.next_packet_index = self.next_packet_index.wrapping_add(1);
        self.sender.mark_as_sent(packet_index);
        trace!("harness sending packet {}", packet_index);
        self.link
            .send(packet_index, writer.to_bytes().into_boxed_slice());
        Some(packet_index)
    }

    /// Sends packets until the sender has nothing left to put on the wire
    pub fn send_all(&mut self) -> usize {
        let mut sent = 0;
        while self.send_packet().is_some() {
            sent += 1;
        }
        sent
    }

    /// Hands the next packet on the link to the receiver
    pub fn deliver_one(&mut self) -> Option<Result<bool, SerdeErr>> {
        let payload = self.link.receive()?;
        Some(self.receiver.deserialize(&mut BitReader::new(&payload), None, None))
    }

    pub fn deliver_all(&mut self) -> Result<usize, SerdeErr> {
        let mut delivered = 0;
        while let Some(result) = self.deliver_one() {
            result?;
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Forwards the link's delivery reports to the sender
    pub fn process_reports(&mut self) {
        for (packet_index, delivered) in self.link.take_delivery_reports() {
            self.sender
                .on_delivery_info(packet_index, delivered, &mut self.acked);
        }
    }

    /// Send, deliver and acknowledge until the sender is idle
    pub fn run_until_idle(&mut self, max_rounds: usize) -> Result<usize, SerdeErr> {
        for round in 0..max_rounds {
            if !self.sender.has_changes(&self.acked) && self.link.in_flight_count() == 0 {
                return Ok(round);
            }
            self.send_all();
            self.deliver_all()?;
            self.process_reports();
        }
        Ok(max_rounds)
    }
}

use std::{collections::VecDeque, time::Instant};

use tessera_serde::{BitReader, BitWrite, BitWriter, SerdeErr};
use tessera_shared::{
    AckedState, ChannelEvent, FloatingOrigin, InChannel, OutChannel, PacketIndex, SentUpdates,
    SerializeContext, SimulationFrame,
};

/// Outbound channel that emits queued byte payloads verbatim, one per
/// `serialize` call, and records the delivery reports it hears about
#[derive(Default)]
pub struct QueueOutChannel {
    payloads: VecDeque<Vec<u8>>,
    pub reports: Vec<(PacketIndex, bool)>,
}

impl QueueOutChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, payload: Vec<u8>) {
        self.payloads.push_back(payload);
    }

    pub fn queued(&self) -> usize {
        self.payloads.len()
    }
}

impl OutChannel for QueueOutChannel {
    fn serialize(&mut self, writer: &mut BitWriter, _context: SerializeContext) -> bool {
        let Some(payload) = self.payloads.pop_front() else {
            return false;
        };
        writer.write_bytes_unaligned(&payload);
        true
    }

    fn mark_as_sent(&mut self, _packet_index: PacketIndex) -> SentUpdates {
        SentUpdates::new()
    }

    fn on_delivery_info(&mut self, packet_index: PacketIndex, delivered: bool, _acked: &mut AckedState) {
        self.reports.push((packet_index, delivered));
    }

    fn has_changes(&self, _acked: &AckedState) -> bool {
        !self.payloads.is_empty()
    }

    fn clear(&mut self) {
        self.payloads.clear();
    }

    fn reset(&mut self) {
        self.payloads.clear();
        self.reports.clear();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedPayload {
    pub data: Vec<u8>,
    pub simulation_frame: Option<SimulationFrame>,
    pub floating_origin: Option<FloatingOrigin>,
}

/// Inbound channel that keeps every payload handed to it
#[derive(Default)]
pub struct CollectingInChannel {
    pub received: Vec<ReceivedPayload>,
}

impl CollectingInChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InChannel for CollectingInChannel {
    fn deserialize(
        &mut self,
        reader: &mut BitReader,
        simulation_frame: Option<SimulationFrame>,
        floating_origin: Option<FloatingOrigin>,
    ) -> Result<bool, SerdeErr> {
        let len = (reader.remaining_bits() / 8) as usize;
        let data = reader.read_bytes_unaligned(len)?;
        self.received.push(ReceivedPayload {
            data,
            simulation_frame,
            floating_origin,
        });
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

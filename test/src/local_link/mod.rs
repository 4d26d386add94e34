//! In-memory packet link for end-to-end tests.
//! Loses and reorders packets on request, without any network I/O

use std::collections::{HashSet, VecDeque};

use log::trace;
use tessera_shared::{PacketIndex, PacketTransport};

pub struct LossyLink {
    in_flight: VecDeque<Box<[u8]>>,
    reports: Vec<(PacketIndex, bool)>,
    dropped: HashSet<PacketIndex>,
    newest_first: bool,
}

impl LossyLink {
    /// Delivers everything, in sending order
    pub fn reliable() -> Self {
        Self {
            in_flight: VecDeque::new(),
            reports: Vec::new(),
            dropped: HashSet::new(),
            newest_first: false,
        }
    }

    /// Loses the packets sent under `packet_indices`
    pub fn dropping(packet_indices: impl IntoIterator<Item = PacketIndex>) -> Self {
        let mut link = Self::reliable();
        link.dropped.extend(packet_indices);
        link
    }

    /// Delivers the most recently sent packet first
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn drop_packet(&mut self, packet_index: PacketIndex) {
        self.dropped.insert(packet_index);
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl PacketTransport for LossyLink {
    fn send(&mut self, packet_index: PacketIndex, payload: Box<[u8]>) {
        let delivered = !self.dropped.contains(&packet_index);
        trace!(
            "link: packet {} ({} bytes) {}",
            packet_index,
            payload.len(),
            if delivered { "in flight" } else { "lost" }
        );
        if delivered {
            self.in_flight.push_back(payload);
        }
        self.reports.push((packet_index, delivered));
    }

    fn receive(&mut self) -> Option<Box<[u8]>> {
        if self.newest_first {
            self.in_flight.pop_back()
        } else {
            self.in_flight.pop_front()
        }
    }

    fn take_delivery_reports(&mut self) -> Vec<(PacketIndex, bool)> {
        std::mem::take(&mut self.reports)
    }
}

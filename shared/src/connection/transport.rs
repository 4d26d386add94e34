use crate::PacketIndex;

/// The raw unreliable transport underneath a connection.
///
/// Packets may be lost, duplicated or reordered. Each sent packet is eventually
/// reported back exactly once as delivered or lost, in sending order.
pub trait PacketTransport {
    fn send(&mut self, packet_index: PacketIndex, payload: Box<[u8]>);

    fn receive(&mut self) -> Option<Box<[u8]>>;

    /// Drains the delivery reports gathered since the last call
    fn take_delivery_reports(&mut self) -> Vec<(PacketIndex, bool)>;
}

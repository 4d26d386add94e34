use std::time::Instant;

use log::warn;
use tessera_serde::{BitReader, Serde};

use crate::{
    channels::{channel::ChannelEvent, error::ChannelError, in_network_channel::InNetworkChannel},
    connection::{error::ConnectionError, lane::InLane, transport::PacketTransport},
    world::{component::ComponentSerializer, known_entities::KnownEntities},
    ConnectionConfig,
};

/// Receiving half of a connection. Mirrors the lane list of the sender.
///
/// All lanes share one registry of known entities, matching the sender's
/// single acknowledged state.
pub struct IncomingConnection {
    lanes: Vec<InLane>,
    known_entities: KnownEntities,
}

impl IncomingConnection {
    pub fn new(
        config: &ConnectionConfig,
        serializer_factory: impl Fn() -> Box<dyn ComponentSerializer>,
    ) -> Self {
        let known_entities = KnownEntities::new();
        Self {
            lanes: config
                .channels
                .iter()
                .map(|channel| InLane::new(channel, serializer_factory(), known_entities.clone()))
                .collect(),
            known_entities,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn try_channel(&self, index: usize) -> Result<&InNetworkChannel, ChannelError> {
        let channel_count = self.lanes.len();
        self.lanes
            .get(index)
            .map(InLane::network)
            .ok_or(ChannelError::UnknownChannel {
                index,
                channel_count,
            })
    }

    pub fn lane(&self, index: usize) -> Option<&InLane> {
        self.lanes.get(index)
    }

    /// Entities created and not yet destroyed, whichever lane carried them
    pub fn known_entities(&self) -> &KnownEntities {
        &self.known_entities
    }

    /// Routes each channel payload in `payload` to its lane, then flushes every
    /// lane. A payload that fails to decode discards the rest of the packet.
    pub fn receive_packet(&mut self, payload: &[u8], now: Instant) -> Result<(), ConnectionError> {
        let result = self.read_packet(payload);
        self.flush(now);
        result
    }

    fn read_packet(&mut self, payload: &[u8]) -> Result<(), ConnectionError> {
        let mut reader = BitReader::new(payload);
        for (channel, lane) in self.lanes.iter_mut().enumerate() {
            let decode_error = ConnectionError::Decode {
                channel,
                packet_bytes: payload.len(),
            };
            if !bool::de(&mut reader).map_err(|_| decode_error.clone())? {
                continue;
            }
            lane.channel_mut()
                .deserialize(&mut reader, None, None)
                .map_err(|_| decode_error)?;
        }
        Ok(())
    }

    /// Drains the transport, logging and skipping packets that fail to decode
    pub fn receive_all(&mut self, transport: &mut dyn PacketTransport, now: Instant) {
        while let Some(payload) = transport.receive() {
            if let Err(err) = self.read_packet(&payload) {
                warn!("IncomingConnection: {}", err);
            }
        }
        self.flush(now);
    }

    /// Releases buffered ordered messages whose turn has come or whose TTL ran out
    pub fn flush(&mut self, now: Instant) {
        for lane in self.lanes.iter_mut() {
            lane.channel_mut().flush_buffer(now);
        }
    }

    /// Received events, tagged with the index of the lane they arrived on
    pub fn take_events(&mut self) -> Vec<(usize, ChannelEvent)> {
        let mut output = Vec::new();
        for (channel, lane) in self.lanes.iter_mut().enumerate() {
            output.extend(
                lane.channel_mut()
                    .take_events()
                    .into_iter()
                    .map(|event| (channel, event)),
            );
        }
        output
    }

    pub fn reset(&mut self) {
        for lane in self.lanes.iter_mut() {
            lane.channel_mut().reset();
        }
    }
}

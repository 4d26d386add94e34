use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use log::{debug, trace};
use tessera_serde::{BitReader, SerdeErr};

use crate::{
    channels::{
        channel::{ChannelEvent, ChannelMessage, InChannel},
        in_network_channel::InNetworkChannel,
    },
    sequence_less_than,
    world::{component::ComponentSerializer, known_entities::KnownEntities},
    ChannelConfig, FloatingOrigin, MessageIndex, SimulationFrame,
};

struct BufferedMessage {
    message: ChannelMessage,
    blocked_since: Option<Instant>,
}

/// Inbound lane that releases commands and inputs strictly in sending order.
///
/// A message whose target entity isn't known yet blocks the sequence until the
/// entity shows up, or until it has been blocked for the message TTL, after
/// which it is expired and the sequence moves on. A missing message that later
/// ones wait behind is given up on after the same TTL.
pub struct InOrderedNetworkChannel {
    channel: InNetworkChannel,
    sequence: HashMap<MessageIndex, BufferedMessage>,
    next_index: MessageIndex,
    message_ttl: Duration,
    missing_since: Option<Instant>,
    released: Vec<ChannelEvent>,
    expired_message_count: u64,
}

impl InOrderedNetworkChannel {
    pub fn new(serializer: Box<dyn ComponentSerializer>, message_ttl: Duration) -> Self {
        Self::with_known_entities(serializer, message_ttl, KnownEntities::new())
    }

    pub fn with_known_entities(
        serializer: Box<dyn ComponentSerializer>,
        message_ttl: Duration,
        known_entities: KnownEntities,
    ) -> Self {
        Self {
            channel: InNetworkChannel::with_ordering(serializer, true, known_entities),
            sequence: HashMap::new(),
            next_index: 0,
            message_ttl,
            missing_since: None,
            released: Vec::new(),
            expired_message_count: 0,
        }
    }

    pub fn from_config(config: &ChannelConfig, serializer: Box<dyn ComponentSerializer>) -> Self {
        Self::new(serializer, config.message_ttl)
    }

    /// Messages dropped after blocking for longer than the TTL, or never
    /// received within it
    pub fn expired_message_count(&self) -> u64 {
        self.expired_message_count
    }

    /// Messages received but not yet released
    pub fn buffered_message_count(&self) -> usize {
        self.sequence.len()
    }

    pub fn network_channel(&self) -> &InNetworkChannel {
        &self.channel
    }

    fn buffer_received(&mut self) {
        for message in self.channel.take_received_messages() {
            let Some(index) = message.index else {
                continue;
            };
            if sequence_less_than(index, self.next_index) || self.sequence.contains_key(&index) {
                trace!("dropping duplicate message {}", index);
                continue;
            }
            self.sequence.insert(
                index,
                BufferedMessage {
                    message,
                    blocked_since: None,
                },
            );
        }
    }
}

impl InChannel for InOrderedNetworkChannel {
    fn deserialize(
        &mut self,
        reader: &mut BitReader,
        simulation_frame: Option<SimulationFrame>,
        floating_origin: Option<FloatingOrigin>,
    ) -> Result<bool, SerdeErr> {
        let result = self.channel.deserialize(reader, simulation_frame, floating_origin);
        self.buffer_received();
        result
    }

    fn flush_buffer(&mut self, now: Instant) {
        loop {
            let Some(buffered) = self.sequence.get_mut(&self.next_index) else {
                if self.sequence.is_empty() {
                    self.missing_since = None;
                    break;
                }
                let missing_since = *self.missing_since.get_or_insert(now);
                if now.saturating_duration_since(missing_since) < self.message_ttl {
                    break;
                }
                debug!(
                    "expiring message {}: not received within {:?}",
                    self.next_index, self.message_ttl
                );
                self.expired_message_count += 1;
                self.next_index = self.next_index.wrapping_add(1);
                continue;
            };
            self.missing_since = None;

            if !self.channel.is_entity_known(&buffered.message.target) {
                let blocked_since = *buffered.blocked_since.get_or_insert(now);
                if now.saturating_duration_since(blocked_since) < self.message_ttl {
                    break;
                }
                debug!(
                    "expiring message {} for {:?}: target unknown for {:?}",
                    self.next_index, buffered.message.target, self.message_ttl
                );
                self.sequence.remove(&self.next_index);
                self.expired_message_count += 1;
                self.next_index = self.next_index.wrapping_add(1);
                continue;
            }

            if let Some(buffered) = self.sequence.remove(&self.next_index) {
                self.released.push(buffered.message.into());
            }
            self.next_index = self.next_index.wrapping_add(1);
        }
    }

    fn take_events(&mut self) -> Vec<ChannelEvent> {
        let mut output = self.channel.take_events();
        output.append(&mut self.released);
        output
    }

    fn clear(&mut self) {
        self.channel.clear();
        self.sequence.clear();
        self.missing_since = None;
        self.released.clear();
    }

    fn reset(&mut self) {
        self.clear();
        self.channel.reset();
        self.next_index = 0;
        self.expired_message_count = 0;
    }
}

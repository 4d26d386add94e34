use std::time::Duration;

/// Default time an ordered message may stay blocked before it is expired
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_millis(5000);
/// Default outer packet size handed to the transport
pub const DEFAULT_MAX_PACKET_BYTES: u32 = 1200;

/// Tunables of the fragmentation layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentationConfig {
    /// Size of the smallest individually tracked slice of a channel packet
    pub fragment_size_in_bytes: u16,
    /// Width of the channel packet id on the wire
    pub channel_packet_id_bits: u8,
    /// Upper bound on the payload a wrapped channel may produce in one channel packet
    pub max_channel_packet_bytes: u32,
    /// How many released channel-packet buffers are kept for reuse
    pub max_pooled_buffers: usize,
}

impl FragmentationConfig {
    /// Largest id value; also the `EndOfChannelPackets` sentinel
    pub fn max_channel_packet_id(&self) -> u32 {
        (1u32 << self.channel_packet_id_bits) - 1
    }

    pub fn end_of_channel_packets(&self) -> u32 {
        self.max_channel_packet_id()
    }

    /// Half of the id cycle, so old and new ids can always be told apart
    pub fn max_in_flight_channel_packets(&self) -> usize {
        (self.max_channel_packet_id() / 2) as usize
    }

    pub fn fragment_size_in_bits(&self) -> u32 {
        u32::from(self.fragment_size_in_bytes) * 8
    }
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            fragment_size_in_bytes: 1,
            channel_packet_id_bits: 5,
            max_channel_packet_bytes: 65_536,
            max_pooled_buffers: 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelMode {
    /// Reliable, commands/inputs delivered as they arrive
    Unordered,
    /// Reliable, commands/inputs delivered strictly in sending order
    Ordered,
}

/// Settings of one delivery lane
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub mode: ChannelMode,
    /// How long an ordered message may block its sequence before it is dropped
    pub message_ttl: Duration,
    /// When set, the lane is wrapped in the fragmentation layer
    pub fragmentation: Option<FragmentationConfig>,
}

impl ChannelConfig {
    pub fn default_channel() -> Self {
        Self {
            mode: ChannelMode::Unordered,
            message_ttl: DEFAULT_MESSAGE_TTL,
            fragmentation: None,
        }
    }

    pub fn ordered() -> Self {
        Self {
            mode: ChannelMode::Ordered,
            ..Self::default_channel()
        }
    }

    pub fn fragmented() -> Self {
        Self {
            fragmentation: Some(FragmentationConfig::default()),
            ..Self::default_channel()
        }
    }

    pub fn fragmented_ordered() -> Self {
        Self {
            fragmentation: Some(FragmentationConfig::default()),
            ..Self::ordered()
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.mode == ChannelMode::Ordered
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::default_channel()
    }
}

/// Settings shared by both ends of a connection. Both sides must use the same
/// channel list, in the same order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Maximum size of an outer packet
    pub max_packet_bytes: u32,
    pub channels: Vec<ChannelConfig>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
            channels: vec![
                ChannelConfig::default_channel(),
                ChannelConfig::ordered(),
                ChannelConfig::fragmented(),
                ChannelConfig::fragmented_ordered(),
            ],
        }
    }
}

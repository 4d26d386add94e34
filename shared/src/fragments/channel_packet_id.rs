use std::fmt;

use tessera_serde::{BitReader, BitWrite, SerdeErr};

use crate::wrapping_number::is_forward_within;

/// Identifies an in-flight fragmented channel packet.
///
/// Values live in `[0, max_value)`; `max_value` itself (`2^bits - 1`) is the
/// `EndOfChannelPackets` sentinel and never takes part in the id cycle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelPacketId {
    value: u32,
    bits: u8,
}

impl ChannelPacketId {
    pub fn new(value: u32, bits: u8) -> Self {
        debug_assert!(bits > 0 && bits < 32, "channel packet id needs 1..=31 bits");
        debug_assert!(value <= max_value(bits), "channel packet id out of range");
        Self { value, bits }
    }

    pub fn end_of_channel_packets(bits: u8) -> Self {
        Self::new(max_value(bits), bits)
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn max_value(&self) -> u32 {
        max_value(self.bits)
    }

    pub fn is_end_of_channel_packets(&self) -> bool {
        self.value == self.max_value()
    }

    /// Successor on the id cycle, skipping the sentinel
    pub fn next(&self) -> Self {
        Self::new((self.value + 1) % self.max_value(), self.bits)
    }

    /// Number of ids that can be told apart from stale ones
    pub fn window(&self) -> u32 {
        self.max_value() / 2
    }

    /// Whether `other` is at most half a cycle ahead of `self`.
    /// Equal ids, older ids and the sentinel are all rejected.
    pub fn is_valid_successor(&self, other: &ChannelPacketId) -> bool {
        if other.is_end_of_channel_packets() {
            return false;
        }
        is_forward_within(self.value, other.value, self.max_value(), self.window())
    }

    pub fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(u64::from(self.value), self.bits);
    }

    pub fn de(reader: &mut BitReader, bits: u8) -> Result<Self, SerdeErr> {
        let value = reader.read_bits(bits)?;
        let value = u32::try_from(value).map_err(|_| SerdeErr)?;
        Ok(Self::new(value, bits))
    }

    pub fn bit_length(&self) -> u32 {
        u32::from(self.bits)
    }
}

fn max_value(bits: u8) -> u32 {
    (1u32 << bits) - 1
}

impl fmt::Debug for ChannelPacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end_of_channel_packets() {
            write!(f, "ChannelPacketId(End)")
        } else {
            write!(f, "ChannelPacketId({})", self.value)
        }
    }
}

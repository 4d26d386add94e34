use tessera_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

/// Outer transport sequence number
pub type PacketIndex = u16;
/// Per-channel sequence number of a command or input in ordered mode
pub type MessageIndex = u16;
/// Monotonically increasing logical tick, used as delta reference for timestamps
pub type SimulationFrame = u64;

/// World-space offset resynchronized periodically to keep coordinates precise
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FloatingOrigin {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl FloatingOrigin {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Serde for FloatingOrigin {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.x.ser(writer);
        self.y.ser(writer);
        self.z.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            x: f64::de(reader)?,
            y: f64::de(reader)?,
            z: f64::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        Self::const_bit_length()
    }
}

impl ConstBitLength for FloatingOrigin {
    fn const_bit_length() -> u32 {
        3 * 64
    }
}

use std::fmt;

use tessera_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

/// Number of distinct versions an entity index cycles through
pub const MAX_VERSIONS: u8 = 8;
/// Upper bound of indices handed out by a relative (client-local) generator
pub const MAX_RELATIVE_INDICES: u16 = 4096;

const VERSION_BITS: u8 = 3;

/// A replicated entity reference.
///
/// The version is bumped every time an index is recycled, so a reference to a
/// destroyed entity never aliases its successor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u16,
    version: u8,
    is_absolute: bool,
}

impl Entity {
    pub const INVALID: Entity = Entity {
        index: 0,
        version: 0,
        is_absolute: false,
    };

    pub fn new(index: u16, version: u8, is_absolute: bool) -> Self {
        Self {
            index,
            version: version % MAX_VERSIONS,
            is_absolute,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn is_absolute(&self) -> bool {
        self.is_absolute
    }

    pub fn is_valid(&self) -> bool {
        self.index != 0
    }

    /// Same index, next version
    pub fn next_version(&self) -> Self {
        Self::new(self.index, (self.version + 1) % MAX_VERSIONS, self.is_absolute)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_absolute { "abs" } else { "rel" };
        write!(f, "Entity({}v{} {})", self.index, self.version, kind)
    }
}

impl Serde for Entity {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.index.ser(writer);
        writer.write_bits(u64::from(self.version), VERSION_BITS);
        self.is_absolute.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let index = u16::de(reader)?;
        let version = reader.read_bits(VERSION_BITS)? as u8;
        let is_absolute = bool::de(reader)?;
        Ok(Self::new(index, version, is_absolute))
    }

    fn bit_length(&self) -> u32 {
        Self::const_bit_length()
    }
}

impl ConstBitLength for Entity {
    fn const_bit_length() -> u32 {
        16 + VERSION_BITS as u32 + 1
    }
}

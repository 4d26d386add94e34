use crate::{bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr};

/// A type that can be written to, and read back from, a bit stream
pub trait Serde: Sized {
    fn ser(&self, writer: &mut dyn BitWrite);

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;

    /// Exact number of bits `ser` will write for this value
    fn bit_length(&self) -> u32;
}

/// Implemented by types whose encoded size doesn't depend on their value
pub trait ConstBitLength {
    fn const_bit_length() -> u32;
}

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        1
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

macro_rules! impl_serde_for_unsigned {
    ($ty:ty, $bits:expr) => {
        impl Serde for $ty {
            fn ser(&self, writer: &mut dyn BitWrite) {
                writer.write_bits(u64::from(*self), $bits);
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                let value = reader.read_bits($bits)?;
                <$ty>::try_from(value).map_err(|_| SerdeErr)
            }

            fn bit_length(&self) -> u32 {
                $bits
            }
        }

        impl ConstBitLength for $ty {
            fn const_bit_length() -> u32 {
                $bits
            }
        }
    };
}

impl_serde_for_unsigned!(u8, 8);
impl_serde_for_unsigned!(u16, 16);
impl_serde_for_unsigned!(u32, 32);
impl_serde_for_unsigned!(u64, 64);

impl Serde for f64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(self.to_bits(), 64);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f64::from_bits(reader.read_bits(64)?))
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

impl ConstBitLength for f64 {
    fn const_bit_length() -> u32 {
        64
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => writer.write_bit(false),
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_length(&self) -> u32 {
        match self {
            Some(value) => 1 + value.bit_length(),
            None => 1,
        }
    }
}

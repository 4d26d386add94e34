use crate::{
    bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr, serde::Serde, ConstBitLength,
};

pub trait SerdeIntegerConversion<const VARIABLE: bool, const BITS: u8> {
    fn from(value: &SerdeInteger<VARIABLE, BITS>) -> Self;
}

/// Fixed-width unsigned integer, always `BITS` bits on the wire
pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, BITS>;
/// Unsigned varint: groups of `BITS` value bits, each preceded by a "proceed" bit
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<true, BITS>;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const VARIABLE: bool, const BITS: u8> {
    inner: SerdeIntegerInner,
}

impl<const VARIABLE: bool, const BITS: u8> SerdeInteger<VARIABLE, BITS> {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        Self {
            inner: SerdeIntegerInner::new(VARIABLE, BITS, value.into()),
        }
    }

    pub fn get(&self) -> u64 {
        self.inner.value
    }

    pub fn to<T: SerdeIntegerConversion<VARIABLE, BITS>>(&self) -> T {
        T::from(self)
    }
}

impl<const VARIABLE: bool, const BITS: u8> Serde for SerdeInteger<VARIABLE, BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.inner.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let inner = SerdeIntegerInner::de(reader, VARIABLE, BITS)?;
        Ok(Self { inner })
    }

    fn bit_length(&self) -> u32 {
        self.inner.bit_length()
    }
}

impl<const BITS: u8> ConstBitLength for SerdeInteger<false, BITS> {
    fn const_bit_length() -> u32 {
        BITS as u32
    }
}

impl<const VARIABLE: bool, const BITS: u8, T: TryFrom<u64>> SerdeIntegerConversion<VARIABLE, BITS>
    for T
{
    fn from(value: &SerdeInteger<VARIABLE, BITS>) -> Self {
        let Ok(t_value) = T::try_from(value.get()) else {
            panic!("SerdeInteger's value is out of range to convert to this type.");
        };
        t_value
    }
}

// Inner type that is not generic, to keep monomorphization small

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct SerdeIntegerInner {
    value: u64,
    variable: bool,
    bits: u8,
}

impl SerdeIntegerInner {
    fn new(variable: bool, bits: u8, value: u64) -> Self {
        if bits == 0 {
            panic!("can't create an integer with 0 bits...");
        }
        if bits > 64 {
            panic!("can't create an integer with more than 64 bits...");
        }
        if !variable && bits < 64 && value >= (1u64 << bits) {
            panic!(
                "value `{}` is too high! (with `{}` bits, can't encode number greater than `{}`)",
                value,
                bits,
                (1u64 << bits) - 1
            );
        }

        Self {
            value,
            variable,
            bits,
        }
    }

    fn group_limit(&self) -> u64 {
        if self.bits >= 64 {
            u64::MAX
        } else {
            1u64 << self.bits
        }
    }

    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut value = self.value;

        if self.variable {
            loop {
                let proceed = self.bits < 64 && value >= self.group_limit();
                writer.write_bit(proceed);
                writer.write_bits(value, self.bits);
                if self.bits >= 64 {
                    return;
                }
                value >>= self.bits;
                if !proceed {
                    return;
                }
            }
        } else {
            writer.write_bits(value, self.bits);
        }
    }

    fn de(reader: &mut BitReader, variable: bool, bits: u8) -> Result<Self, SerdeErr> {
        if !variable {
            let value = reader.read_bits(bits)?;
            return Ok(Self {
                value,
                variable,
                bits,
            });
        }

        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let proceed = reader.read_bit()?;
            let group = reader.read_bits(bits)?;
            if shift >= 64 {
                return Err(SerdeErr);
            }
            value |= group << shift;
            shift += bits as u32;
            if !proceed {
                return Ok(Self {
                    value,
                    variable,
                    bits,
                });
            }
        }
    }

    fn bit_length(&self) -> u32 {
        if !self.variable {
            return self.bits as u32;
        }

        let mut output: u32 = 0;
        let mut value = self.value;
        loop {
            output += 1 + self.bits as u32;
            if self.bits >= 64 || value < self.group_limit() {
                return output;
            }
            value >>= self.bits;
        }
    }
}

// Tests

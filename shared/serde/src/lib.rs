//! # Tessera Serde
//! Bit-level reading & writing used by every tessera channel.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bit_reader;
mod bit_writer;
mod error;
mod number;
mod serde;

pub use bit_reader::BitReader;
pub use bit_writer::{BitWrite, BitWriter};
pub use error::SerdeErr;
pub use number::{SerdeIntegerConversion, SerdeInteger, UnsignedInteger, UnsignedVariableInteger};
pub use serde::{ConstBitLength, Serde};

/// Bits needed to address `value` distinct states (`ceil(log2(value))`).
pub fn bits_required(value: u32) -> u8 {
    if value <= 1 {
        return 0;
    }
    (32 - (value - 1).leading_zeros()) as u8
}

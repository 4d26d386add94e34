use crate::error::SerdeErr;

/// Reads bits in the same order `BitWriter` writes them
pub struct BitReader<'b> {
    buffer: &'b [u8],
    bit_length: u32,
    position: u32,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        let bit_length = u32::try_from(buffer.len())
            .unwrap_or(u32::MAX / 8)
            .saturating_mul(8);
        Self {
            buffer,
            bit_length,
            position: 0,
        }
    }

    /// Restricts the readable range to the first `bit_length` bits of `buffer`
    pub fn with_bit_length(buffer: &'b [u8], bit_length: u32) -> Self {
        let mut reader = Self::new(buffer);
        reader.bit_length = reader.bit_length.min(bit_length);
        reader
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn remaining_bits(&self) -> u32 {
        self.bit_length - self.position
    }

    pub fn seek(&mut self, position: u32) -> Result<(), SerdeErr> {
        if position > self.bit_length {
            return Err(SerdeErr);
        }
        self.position = position;
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.position >= self.bit_length {
            return Err(SerdeErr);
        }
        let byte = self.buffer[(self.position / 8) as usize];
        let bit = (byte >> (self.position % 8)) & 1 != 0;
        self.position += 1;
        Ok(bit)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        if self.remaining_bits() < 8 {
            return Err(SerdeErr);
        }
        let byte_index = (self.position / 8) as usize;
        let bit_index = self.position % 8;
        let output = if bit_index == 0 {
            self.buffer[byte_index]
        } else {
            (self.buffer[byte_index] >> bit_index) | (self.buffer[byte_index + 1] << (8 - bit_index))
        };
        self.position += 8;
        Ok(output)
    }

    /// Reads `count` bits into the low end of a u64, least significant bit first
    pub fn read_bits(&mut self, count: u8) -> Result<u64, SerdeErr> {
        if count > 64 || u32::from(count) > self.remaining_bits() {
            return Err(SerdeErr);
        }
        let mut output: u64 = 0;
        for i in 0..count {
            if self.read_bit()? {
                output |= 1 << i;
            }
        }
        Ok(output)
    }

    pub fn read_bytes_unaligned(&mut self, len: usize) -> Result<Vec<u8>, SerdeErr> {
        let mut output = Vec::with_capacity(len);
        self.read_bytes_into(len, &mut output)?;
        Ok(output)
    }

    /// Appends `len` octets to `output`
    pub fn read_bytes_into(&mut self, len: usize, output: &mut Vec<u8>) -> Result<(), SerdeErr> {
        if (len as u64) * 8 > u64::from(self.remaining_bits()) {
            return Err(SerdeErr);
        }
        for _ in 0..len {
            output.push(self.read_byte()?);
        }
        Ok(())
    }

    /// Consumes `len` octets without storing them
    pub fn skip_bytes(&mut self, len: usize) -> Result<(), SerdeErr> {
        let bits = (len as u64) * 8;
        if bits > u64::from(self.remaining_bits()) {
            return Err(SerdeErr);
        }
        self.position += bits as u32;
        Ok(())
    }
}

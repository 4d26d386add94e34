/// Sink for individual bits. Implemented by `BitWriter`, and usable as a
/// trait object so component serializers don't need to know the concrete
/// writer.
pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);

    fn write_byte(&mut self, byte: u8) {
        let mut temp = byte;
        for _ in 0..8 {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }

    /// Writes the lowest `count` bits of `value`, least significant bit first
    fn write_bits(&mut self, value: u64, count: u8) {
        debug_assert!(count <= 64, "can't write more than 64 bits at once");
        let mut temp = value;
        for _ in 0..count {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }

    /// Writes whole octets without requiring byte alignment
    fn write_bytes_unaligned(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.write_byte(*byte);
        }
    }
}

/// Growable bit buffer with a soft capacity.
///
/// Writing past `max_bits` is allowed (the buffer keeps growing) but the writer
/// then reports itself as overflowed. Channels use this to write an item
/// optimistically and `truncate` back to the previous position if it didn't fit.
pub struct BitWriter {
    buffer: Vec<u8>,
    bits_written: u32,
    max_bits: u32,
}

impl BitWriter {
    /// Creates a writer with effectively unlimited capacity
    pub fn new() -> Self {
        Self::with_max_bits(u32::MAX)
    }

    pub fn with_max_bits(max_bits: u32) -> Self {
        Self {
            buffer: Vec::new(),
            bits_written: 0,
            max_bits,
        }
    }

    pub fn with_max_bytes(max_bytes: u32) -> Self {
        Self::with_max_bits(max_bytes.saturating_mul(8))
    }

    /// Reuses an existing allocation, clearing any previous content
    pub fn from_buffer(mut buffer: Vec<u8>, max_bits: u32) -> Self {
        buffer.clear();
        Self {
            buffer,
            bits_written: 0,
            max_bits,
        }
    }

    /// Position of the next bit to be written
    pub fn bits_written(&self) -> u32 {
        self.bits_written
    }

    pub fn max_bits(&self) -> u32 {
        self.max_bits
    }

    /// Remaining bit count before the soft capacity is reached
    pub fn bits_free(&self) -> u32 {
        self.max_bits.saturating_sub(self.bits_written)
    }

    /// Holds back `bits` of capacity for data written after the current item
    pub fn reserve_bits(&mut self, bits: u32) {
        self.max_bits = self.max_bits.saturating_sub(bits);
    }

    pub fn release_bits(&mut self, bits: u32) {
        self.max_bits = self.max_bits.saturating_add(bits);
    }

    pub fn is_full(&self) -> bool {
        self.bits_written >= self.max_bits
    }

    pub fn overflowed(&self) -> bool {
        self.bits_written > self.max_bits
    }

    /// Rewinds the writer to `bit_position`, discarding everything written after it
    pub fn truncate(&mut self, bit_position: u32) {
        if bit_position >= self.bits_written {
            return;
        }
        self.bits_written = bit_position;
        let byte_len = bit_position.div_ceil(8) as usize;
        self.buffer.truncate(byte_len);
        let tail_bits = bit_position % 8;
        if tail_bits != 0 {
            if let Some(last) = self.buffer.last_mut() {
                *last &= (1u8 << tail_bits) - 1;
            }
        }
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        let bit_index = self.bits_written % 8;
        if bit_index == 0 {
            self.buffer.push(0);
        }
        if bit {
            if let Some(last) = self.buffer.last_mut() {
                *last |= 1 << bit_index;
            }
        }
        self.bits_written += 1;
    }

    fn write_byte(&mut self, byte: u8) {
        let bit_index = self.bits_written % 8;
        if bit_index == 0 {
            self.buffer.push(byte);
        } else {
            if let Some(last) = self.buffer.last_mut() {
                *last |= byte << bit_index;
            }
            self.buffer.push(byte >> (8 - bit_index));
        }
        self.bits_written += 8;
    }
}

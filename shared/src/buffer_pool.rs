use log::{debug, trace};

/// Recycles the octet buffers that back in-flight channel packets.
///
/// A buffer checked out of the pool is owned by exactly one channel packet
/// until it is released back, so no buffer is ever shared.
pub struct BufferPool {
    buffers: Vec<Vec<u8>>,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_pooled),
            max_pooled,
        }
    }

    pub fn checkout(&mut self) -> Vec<u8> {
        if let Some(buffer) = self.buffers.pop() {
            trace!("returning buffer from pool");
            return buffer;
        }
        debug!("no buffer in pool: creating new buffer");
        Vec::new()
    }

    pub fn release(&mut self, mut buffer: Vec<u8>) {
        buffer.clear();
        if self.buffers.len() < self.max_pooled {
            trace!("returning buffer to pool");
            self.buffers.push(buffer);
        } else {
            debug!("pool is full: discarding returned buffer");
        }
    }

    pub fn pooled(&self) -> usize {
        self.buffers.len()
    }
}

use thiserror::Error;

use crate::channels::error::ChannelError;

/// General connection-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Channel addressing error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A channel payload inside an incoming packet could not be decoded. The
    /// rest of that packet is discarded.
    #[error("Failed to decode the payload of channel {channel} in an incoming packet of {packet_bytes} bytes")]
    Decode { channel: usize, packet_bytes: usize },
}

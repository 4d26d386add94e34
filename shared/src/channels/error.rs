use thiserror::Error;

/// Errors raised when addressing a lane of a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The lane index is past the configured channel list
    #[error("Channel index {index} is out of range, the connection has {channel_count} channels")]
    UnknownChannel { index: usize, channel_count: usize },
}

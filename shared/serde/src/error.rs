use thiserror::Error;

/// Returned whenever a read runs past the end of the stream or meets a value
/// that cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Serde error: stream exhausted or malformed")]
pub struct SerdeErr;

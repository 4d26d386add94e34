use thiserror::Error;

/// Contract violations of `FragmentMap` operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentMapError {
    /// A range must cover at least one fragment
    #[error("Fragment ranges must have a count greater than zero")]
    ZeroCount,

    /// The added range intersects a section already in the map
    #[error("Fragment range starting at {index} with count {count} overlaps an existing section")]
    Overlap { index: u32, count: u32 },

    /// The removed range isn't fully contained in one section
    #[error("Fragment range starting at {index} with count {count} is not contained in any single section")]
    NotFound { index: u32, count: u32 },

    /// `index + count` doesn't fit the fragment index space
    #[error("Fragment range starting at {index} with count {count} exceeds the fragment index space")]
    RangeOverflow { index: u32, count: u32 },
}

/// Internal state errors of the fragmented channels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentationError {
    /// A channel packet was dropped while none were in flight
    #[error("Attempted to drop a channel packet, but none are in flight")]
    NothingInFlight,

    /// A wrapped channel produced more than the fragment index space can address
    #[error("Channel packet of {bytes} bytes needs {fragments} fragments, more than the configured maximum of {max_bytes} bytes")]
    ChannelPacketTooLarge {
        bytes: usize,
        fragments: u64,
        max_bytes: u32,
    },
}

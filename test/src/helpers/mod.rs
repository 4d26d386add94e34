pub mod channel_harness;
pub mod mock_channels;

pub use channel_harness::ChannelHarness;
pub use mock_channels::{CollectingInChannel, QueueOutChannel, ReceivedPayload};

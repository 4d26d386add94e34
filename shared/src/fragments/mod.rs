pub mod channel_packet_id;
pub mod error;
pub mod fragment_map;
pub mod fragmentation_serializer;
pub mod in_fragmented_channel;
pub mod out_fragmented_channel;

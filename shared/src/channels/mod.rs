pub mod change_buffer;
pub mod channel;
pub mod error;
pub mod in_network_channel;
pub mod in_ordered_network_channel;
pub mod out_network_channel;
pub mod wire;

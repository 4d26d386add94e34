//! # Tessera Shared
//! Reliable multi-channel entity-replication transport core: fragmentation and
//! reassembly of oversized channel payloads, acknowledgement-driven
//! retransmission, priority and ordered delivery, multiplexed over one
//! unreliable packet transport.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

pub use tessera_serde::{
    bits_required, BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr,
    SerdeIntegerConversion, UnsignedInteger, UnsignedVariableInteger,
};

mod buffer_pool;
mod config;
mod sent_cache;
mod types;
mod wrapping_number;

pub mod channels;
pub mod connection;
pub mod fragments;
pub mod world;

pub use buffer_pool::BufferPool;
pub use channels::{
    change_buffer::{ChangeBuffer, ChangeKind, EntityChange, Priority},
    channel::{
        AckedState, ChannelEvent, ChannelMessage, InChannel, MessageKind, OutChannel,
        SentUpdates, SerializeContext,
    },
    error::ChannelError,
    in_network_channel::InNetworkChannel,
    in_ordered_network_channel::InOrderedNetworkChannel,
    out_network_channel::OutNetworkChannel,
};
pub use config::{
    ChannelConfig, ChannelMode, ConnectionConfig, FragmentationConfig, DEFAULT_MAX_PACKET_BYTES,
    DEFAULT_MESSAGE_TTL,
};
pub use connection::{
    error::ConnectionError,
    incoming_connection::IncomingConnection,
    lane::{InLane, OutLane},
    outgoing_connection::OutgoingConnection,
    transport::PacketTransport,
    Connection,
};
pub use fragments::{
    channel_packet_id::ChannelPacketId,
    error::{FragmentMapError, FragmentationError},
    fragment_map::{FragmentMap, FragmentSection},
    fragmentation_serializer::{FragmentHeader, FragmentationSerializer},
    in_fragmented_channel::InFragmentedChannel,
    out_fragmented_channel::OutFragmentedChannel,
};
pub use sent_cache::{SentCache, SentCacheError};
pub use types::{FloatingOrigin, MessageIndex, PacketIndex, SimulationFrame};
pub use world::{
    component::{BytesComponentSerializer, ComponentId, ComponentSerializer, ComponentUpdate},
    entity::{Entity, MAX_RELATIVE_INDICES, MAX_VERSIONS},
    entity_id_generator::EntityIdGenerator,
    error::{EntityIdError, KnownEntitiesError},
    known_entities::KnownEntities,
};
pub use wrapping_number::{
    is_forward_within, sequence_greater_than, sequence_less_than, try_forward_distance,
    wrapping_diff, WrappingNumberError,
};

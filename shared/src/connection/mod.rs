pub mod error;
pub mod incoming_connection;
pub mod lane;
pub mod outgoing_connection;
pub mod transport;

use crate::{
    connection::{incoming_connection::IncomingConnection, outgoing_connection::OutgoingConnection},
    world::component::{BytesComponentSerializer, ComponentSerializer},
    ConnectionConfig,
};

/// Both halves of a connection to one remote host
pub struct Connection {
    pub outgoing: OutgoingConnection,
    pub incoming: IncomingConnection,
}

impl Connection {
    pub fn new(
        config: &ConnectionConfig,
        serializer_factory: impl Fn() -> Box<dyn ComponentSerializer>,
    ) -> Self {
        Self {
            outgoing: OutgoingConnection::new(config, &serializer_factory),
            incoming: IncomingConnection::new(config, &serializer_factory),
        }
    }

    /// Builds a connection whose component payloads use `BytesComponentSerializer`
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config, || Box::new(BytesComponentSerializer))
    }
}

use crate::{
    channels::{
        channel::{InChannel, OutChannel},
        in_network_channel::InNetworkChannel,
        in_ordered_network_channel::InOrderedNetworkChannel,
        out_network_channel::OutNetworkChannel,
    },
    fragments::{
        in_fragmented_channel::InFragmentedChannel, out_fragmented_channel::OutFragmentedChannel,
    },
    world::{component::ComponentSerializer, known_entities::KnownEntities},
    ChannelConfig,
};

/// One outbound lane of a connection. Ordering lives in `OutNetworkChannel`
/// itself, so only fragmentation changes the shape.
pub enum OutLane {
    Plain(OutNetworkChannel),
    Fragmented(OutFragmentedChannel<OutNetworkChannel>),
}

impl OutLane {
    pub fn new(config: &ChannelConfig, serializer: Box<dyn ComponentSerializer>) -> Self {
        let channel = OutNetworkChannel::from_config(config, serializer);
        match &config.fragmentation {
            None => OutLane::Plain(channel),
            Some(fragmentation) => {
                OutLane::Fragmented(OutFragmentedChannel::new(channel, fragmentation.clone()))
            }
        }
    }

    pub fn channel_mut(&mut self) -> &mut dyn OutChannel {
        match self {
            OutLane::Plain(channel) => channel,
            OutLane::Fragmented(channel) => channel,
        }
    }

    pub fn network(&self) -> &OutNetworkChannel {
        match self {
            OutLane::Plain(channel) => channel,
            OutLane::Fragmented(channel) => channel.inner(),
        }
    }

    pub fn network_mut(&mut self) -> &mut OutNetworkChannel {
        match self {
            OutLane::Plain(channel) => channel,
            OutLane::Fragmented(channel) => channel.inner_mut(),
        }
    }

    pub fn is_fragmented(&self) -> bool {
        matches!(self, OutLane::Fragmented(_))
    }
}

/// One inbound lane of a connection
pub enum InLane {
    Plain(InNetworkChannel),
    Ordered(InOrderedNetworkChannel),
    Fragmented(InFragmentedChannel<InNetworkChannel>),
    FragmentedOrdered(InFragmentedChannel<InOrderedNetworkChannel>),
}

impl InLane {
    /// Builds the lane stack for `config`. Every lane of a connection gets a
    /// handle to the same `known_entities`.
    pub fn new(
        config: &ChannelConfig,
        serializer: Box<dyn ComponentSerializer>,
        known_entities: KnownEntities,
    ) -> Self {
        let plain = |serializer: Box<dyn ComponentSerializer>| {
            InNetworkChannel::with_known_entities(serializer, known_entities.clone())
        };
        let ordered = |serializer: Box<dyn ComponentSerializer>| {
            InOrderedNetworkChannel::with_known_entities(
                serializer,
                config.message_ttl,
                known_entities.clone(),
            )
        };
        match (&config.fragmentation, config.is_ordered()) {
            (None, false) => InLane::Plain(plain(serializer)),
            (None, true) => InLane::Ordered(ordered(serializer)),
            (Some(fragmentation), false) => {
                InLane::Fragmented(InFragmentedChannel::new(plain(serializer), fragmentation.clone()))
            }
            (Some(fragmentation), true) => InLane::FragmentedOrdered(InFragmentedChannel::new(
                ordered(serializer),
                fragmentation.clone(),
            )),
        }
    }

    pub fn channel_mut(&mut self) -> &mut dyn InChannel {
        match self {
            InLane::Plain(channel) => channel,
            InLane::Ordered(channel) => channel,
            InLane::Fragmented(channel) => channel,
            InLane::FragmentedOrdered(channel) => channel,
        }
    }

    pub fn network(&self) -> &InNetworkChannel {
        match self {
            InLane::Plain(channel) => channel,
            InLane::Ordered(channel) => channel.network_channel(),
            InLane::Fragmented(channel) => channel.inner(),
            InLane::FragmentedOrdered(channel) => channel.inner().network_channel(),
        }
    }

    /// Messages dropped by an ordered lane after blocking past their TTL
    pub fn expired_message_count(&self) -> u64 {
        match self {
            InLane::Ordered(channel) => channel.expired_message_count(),
            InLane::FragmentedOrdered(channel) => channel.inner().expired_message_count(),
            InLane::Plain(_) | InLane::Fragmented(_) => 0,
        }
    }
}

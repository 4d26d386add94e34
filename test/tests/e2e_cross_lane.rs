/// Lanes of one connection share what they know about entities, and every lane
/// carries the connection's reference frame

use std::time::{Duration, Instant};

use tessera_shared::{
    ChannelEvent, ComponentId, ComponentUpdate, Connection, ConnectionConfig, Entity,
    FloatingOrigin, Priority,
};
use tessera_test::LossyLink;

const DEFAULT: usize = 0;
const ORDERED: usize = 1;
const FRAGMENTED: usize = 2;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn connect(link: &mut LossyLink, entity: Entity) -> (Connection, Connection) {
    init_logger();
    let config = ConnectionConfig::default();
    let mut sender = Connection::from_config(&config);
    let mut receiver = Connection::from_config(&config);

    sender
        .outgoing
        .channel_mut(DEFAULT)
        .create_entity(entity, Vec::new(), Priority::NORMAL);
    while sender.outgoing.send_packet(link).is_some() {}
    receiver.incoming.receive_all(link, Instant::now());
    sender.outgoing.process_delivery_reports(link);
    receiver.incoming.take_events();

    (sender, receiver)
}

fn exchange(sender: &mut Connection, receiver: &mut Connection, link: &mut LossyLink, now: Instant) {
    while sender.outgoing.send_packet(link).is_some() {}
    receiver.incoming.receive_all(link, now);
    sender.outgoing.process_delivery_reports(link);
}

#[test]
fn update_on_another_lane_reaches_entity() {
    let mut link = LossyLink::reliable();
    let entity = Entity::new(21, 0, true);
    let (mut sender, mut receiver) = connect(&mut link, entity);
    assert!(sender.outgoing.acked_state().is_entity_acked(&entity));
    assert!(receiver.incoming.known_entities().contains(&entity));

    let armor = ComponentUpdate::new(ComponentId(7)).with_field(0, vec![3; 40]);
    sender
        .outgoing
        .channel_mut(FRAGMENTED)
        .update_component(entity, armor.clone(), Priority::NORMAL);
    exchange(&mut sender, &mut receiver, &mut link, Instant::now());

    assert_eq!(
        receiver.incoming.take_events(),
        vec![(
            FRAGMENTED,
            ChannelEvent::EntityUpdated {
                entity,
                updates: vec![armor],
                simulation_frame: None,
            }
        )]
    );
    assert!(!sender.outgoing.has_changes());
}

#[test]
fn ordered_command_targets_entity_created_elsewhere() {
    let mut link = LossyLink::reliable();
    let entity = Entity::new(22, 0, true);
    let (mut sender, mut receiver) = connect(&mut link, entity);

    sender.outgoing.channel_mut(ORDERED).send_command(entity, vec![9]);
    exchange(&mut sender, &mut receiver, &mut link, Instant::now());

    assert_eq!(
        receiver.incoming.take_events(),
        vec![(
            ORDERED,
            ChannelEvent::Command {
                target: entity,
                payload: vec![9],
                index: Some(0),
            }
        )]
    );
    assert_eq!(
        receiver.incoming.lane(ORDERED).map(|lane| lane.expired_message_count()),
        Some(0)
    );
}

#[test]
fn destroy_on_one_lane_is_seen_by_all() {
    let mut link = LossyLink::reliable();
    let entity = Entity::new(23, 0, true);
    let (mut sender, mut receiver) = connect(&mut link, entity);

    sender
        .outgoing
        .channel_mut(FRAGMENTED)
        .destroy_entity(entity, Priority::NORMAL);
    exchange(&mut sender, &mut receiver, &mut link, Instant::now());

    assert_eq!(
        receiver.incoming.take_events(),
        vec![(FRAGMENTED, ChannelEvent::EntityDestroyed { entity })]
    );
    assert!(!receiver.incoming.known_entities().contains(&entity));
}

#[test]
fn floating_origin_reaches_every_lane() {
    init_logger();
    let config = ConnectionConfig::default();
    let mut sender = Connection::from_config(&config);
    let mut receiver = Connection::from_config(&config);
    let mut link = LossyLink::reliable();
    let origin = FloatingOrigin::new(1.0, 2.0, 3.0);

    sender.outgoing.set_floating_origin(Some(origin));
    for lane in 0..sender.outgoing.channel_count() {
        let index = u16::try_from(lane + 1).unwrap();
        sender
            .outgoing
            .channel_mut(lane)
            .create_entity(Entity::new(index, 0, true), Vec::new(), Priority::NORMAL);
    }
    exchange(&mut sender, &mut receiver, &mut link, Instant::now());

    for lane in 0..receiver.incoming.channel_count() {
        assert_eq!(
            receiver.incoming.try_channel(lane).unwrap().floating_origin(),
            Some(origin),
            "lane {}",
            lane
        );
    }
}

#[test]
fn oversized_ordered_command_does_not_stall_lane() {
    let mut link = LossyLink::reliable();
    let entity = Entity::new(24, 0, true);
    let (mut sender, mut receiver) = connect(&mut link, entity);
    let start = Instant::now();

    let channel = sender.outgoing.channel_mut(ORDERED);
    channel.send_command(entity, vec![0; 2000]);
    channel.send_command(entity, vec![1]);
    exchange(&mut sender, &mut receiver, &mut link, start);

    assert_eq!(sender.outgoing.channel_mut(ORDERED).pending().message_count(), 0);
    assert!(receiver.incoming.take_events().is_empty());

    receiver.incoming.flush(start + Duration::from_millis(5000));
    assert_eq!(
        receiver.incoming.take_events(),
        vec![(
            ORDERED,
            ChannelEvent::Command {
                target: entity,
                payload: vec![1],
                index: Some(1),
            }
        )]
    );
    assert_eq!(
        receiver.incoming.lane(ORDERED).map(|lane| lane.expired_message_count()),
        Some(1)
    );
}

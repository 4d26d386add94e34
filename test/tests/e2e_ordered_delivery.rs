/// Ordered lanes release commands in sending order across loss, and expire
/// messages whose target never shows up

use std::time::{Duration, Instant};

use tessera_shared::{ChannelEvent, Connection, ConnectionConfig, Entity, Priority};
use tessera_test::LossyLink;

const ORDERED: usize = 1;
const FRAGMENTED_ORDERED: usize = 3;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn command_payloads(events: Vec<(usize, ChannelEvent)>) -> Vec<Vec<u8>> {
    events
        .into_iter()
        .filter_map(|(_, event)| match event {
            ChannelEvent::Command { payload, .. } => Some(payload),
            _ => None,
        })
        .collect()
}

fn connect(lane: usize, link: &mut LossyLink) -> (Connection, Connection, Entity) {
    let config = ConnectionConfig::default();
    let mut sender = Connection::from_config(&config);
    let mut receiver = Connection::from_config(&config);
    let entity = Entity::new(12, 0, true);

    sender
        .outgoing
        .channel_mut(lane)
        .create_entity(entity, Vec::new(), Priority::NORMAL);
    while sender.outgoing.send_packet(link).is_some() {}
    receiver.incoming.receive_all(link, Instant::now());
    sender.outgoing.process_delivery_reports(link);
    receiver.incoming.take_events();

    (sender, receiver, entity)
}

fn ordered_across_loss(lane: usize) {
    init_logger();
    // packet 0 carries the create, packet 2 the second command
    let mut link = LossyLink::dropping([2]);
    let (mut sender, mut receiver, entity) = connect(lane, &mut link);
    let now = Instant::now();

    for i in 0..4u8 {
        sender.outgoing.channel_mut(lane).send_command(entity, vec![i]);
        assert!(sender.outgoing.send_packet(&mut link).is_some());
    }
    receiver.incoming.receive_all(&mut link, now);
    assert_eq!(command_payloads(receiver.incoming.take_events()), vec![vec![0]]);

    sender.outgoing.process_delivery_reports(&mut link);
    while sender.outgoing.send_packet(&mut link).is_some() {}
    receiver.incoming.receive_all(&mut link, now);
    assert_eq!(
        command_payloads(receiver.incoming.take_events()),
        vec![vec![1], vec![2], vec![3]]
    );
}

#[test]
fn ordered_lane_releases_in_order_across_loss() {
    ordered_across_loss(ORDERED);
}

#[test]
fn fragmented_ordered_lane_releases_in_order_across_loss() {
    ordered_across_loss(FRAGMENTED_ORDERED);
}

#[test]
fn blocked_message_expires_after_ttl() {
    init_logger();
    let mut link = LossyLink::reliable();
    let (mut sender, mut receiver, entity) = connect(ORDERED, &mut link);
    let stranger = Entity::new(40, 0, true);
    let start = Instant::now();

    let channel = sender.outgoing.channel_mut(ORDERED);
    channel.send_command(stranger, vec![1]);
    channel.send_command(entity, vec![2]);
    while sender.outgoing.send_packet(&mut link).is_some() {}

    receiver.incoming.receive_all(&mut link, start);
    assert!(command_payloads(receiver.incoming.take_events()).is_empty());

    receiver.incoming.flush(start + Duration::from_millis(4999));
    assert!(command_payloads(receiver.incoming.take_events()).is_empty());

    receiver.incoming.flush(start + Duration::from_millis(5000));
    assert_eq!(command_payloads(receiver.incoming.take_events()), vec![vec![2]]);
    assert_eq!(
        receiver.incoming.lane(ORDERED).map(|lane| lane.expired_message_count()),
        Some(1)
    );
}

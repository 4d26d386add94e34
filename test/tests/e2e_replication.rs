/// Entity replication over a single reliable lane with packet loss

use tessera_shared::{
    BytesComponentSerializer, ChannelEvent, ComponentId, ComponentUpdate, Entity, InChannel,
    InNetworkChannel, OutChannel, OutNetworkChannel, Priority,
};
use tessera_test::{ChannelHarness, LossyLink};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn harness(link: LossyLink) -> ChannelHarness<OutNetworkChannel, InNetworkChannel> {
    init_logger();
    ChannelHarness::new(
        OutNetworkChannel::new(Box::new(BytesComponentSerializer), false),
        InNetworkChannel::new(Box::new(BytesComponentSerializer)),
        link,
        200,
    )
}

fn position(value: u8) -> ComponentUpdate {
    ComponentUpdate::new(ComponentId(1)).with_field(0, vec![value])
}

#[test]
fn lost_update_is_resent_with_live_state() {
    let mut harness = harness(LossyLink::dropping([1]));
    let entity = Entity::new(5, 0, true);

    harness
        .sender
        .create_entity(entity, vec![position(0)], Priority::NORMAL);
    harness.send_packet();
    harness.deliver_all().unwrap();
    harness.process_reports();
    assert!(harness.acked.is_entity_acked(&entity));
    harness.receiver.take_events();

    harness
        .sender
        .update_component(entity, position(1), Priority::NORMAL);
    assert_eq!(harness.send_packet(), Some(1));
    harness
        .sender
        .update_component(entity, position(2), Priority::NORMAL);

    harness.process_reports();
    assert_eq!(harness.send_packet(), Some(2));
    harness.deliver_all().unwrap();

    assert_eq!(
        harness.receiver.take_events(),
        vec![ChannelEvent::EntityUpdated {
            entity,
            updates: vec![position(2)],
            simulation_frame: None,
        }]
    );
}

#[test]
fn updates_wait_for_create_ack() {
    let mut harness = harness(LossyLink::dropping([0]));
    let entity = Entity::new(6, 0, true);

    harness
        .sender
        .create_entity(entity, Vec::new(), Priority::NORMAL);
    harness.send_packet();
    harness
        .sender
        .update_component(entity, position(9), Priority::NORMAL);

    // the create is in flight and not acked, so the update is held back
    assert!(!harness.sender.has_changes(&harness.acked));
    assert_eq!(harness.send_packet(), None);

    harness.process_reports();
    harness.run_until_idle(10).unwrap();

    assert!(harness.acked.is_entity_acked(&entity));
    assert!(harness.acked.is_component_acked(&entity, &ComponentId(1)));
    let events = harness.receiver.take_events();
    assert!(events.contains(&ChannelEvent::EntityCreated {
        entity,
        components: vec![position(9)],
        simulation_frame: None,
    }));
}

#[test]
fn destroy_waits_for_in_flight_create() {
    let mut harness = harness(LossyLink::reliable());
    let entity = Entity::new(7, 0, true);

    harness
        .sender
        .create_entity(entity, Vec::new(), Priority::NORMAL);
    harness.send_packet();
    harness.sender.destroy_entity(entity, Priority::NORMAL);
    assert_eq!(harness.send_packet(), None);

    harness.deliver_all().unwrap();
    harness.process_reports();
    harness.run_until_idle(10).unwrap();

    assert_eq!(
        harness.receiver.take_events(),
        vec![
            ChannelEvent::EntityCreated {
                entity,
                components: Vec::new(),
                simulation_frame: None,
            },
            ChannelEvent::EntityDestroyed { entity },
        ]
    );
    assert!(!harness.acked.is_entity_acked(&entity));
}

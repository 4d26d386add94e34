/// Entity id issue and recycling, replicated through a connection

use std::time::Instant;

use tessera_shared::{
    ChannelEvent, Connection, ConnectionConfig, EntityIdError, EntityIdGenerator, Priority,
};
use tessera_test::LossyLink;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn round_trip(sender: &mut Connection, receiver: &mut Connection, link: &mut LossyLink) -> Vec<ChannelEvent> {
    while sender.outgoing.send_packet(link).is_some() {}
    receiver.incoming.receive_all(link, Instant::now());
    sender.outgoing.process_delivery_reports(link);
    receiver
        .incoming
        .take_events()
        .into_iter()
        .map(|(_, event)| event)
        .collect()
}

#[test]
fn exhausted_generator_recovers_after_release() {
    init_logger();
    let config = ConnectionConfig::default();
    let mut sender = Connection::from_config(&config);
    let mut receiver = Connection::from_config(&config);
    let mut link = LossyLink::reliable();
    let mut generator = EntityIdGenerator::new(1, 2, true);

    let first = generator.get_entity().unwrap();
    let second = generator.get_entity().unwrap();
    assert_eq!(
        generator.get_entity(),
        Err(EntityIdError::OutOfIds {
            start_id: 1,
            end_id: 2
        })
    );

    for entity in [first, second] {
        sender
            .outgoing
            .channel_mut(0)
            .create_entity(entity, Vec::new(), Priority::NORMAL);
    }
    assert_eq!(round_trip(&mut sender, &mut receiver, &mut link).len(), 2);

    sender
        .outgoing
        .channel_mut(0)
        .destroy_entity(first, Priority::NORMAL);
    assert_eq!(
        round_trip(&mut sender, &mut receiver, &mut link),
        vec![ChannelEvent::EntityDestroyed { entity: first }]
    );
    assert!(!sender.outgoing.acked_state().is_entity_acked(&first));
    generator.release_entity(first);

    let reissued = generator.get_entity().unwrap();
    assert_eq!(reissued.index(), first.index());
    assert_eq!(reissued.version(), 1);
    assert_ne!(reissued, first);

    sender
        .outgoing
        .channel_mut(0)
        .create_entity(reissued, Vec::new(), Priority::NORMAL);
    assert_eq!(
        round_trip(&mut sender, &mut receiver, &mut link),
        vec![ChannelEvent::EntityCreated {
            entity: reissued,
            components: Vec::new(),
            simulation_frame: None,
        }]
    );
    assert!(receiver.incoming.try_channel(0).unwrap().is_entity_known(&reissued));
    assert!(!receiver.incoming.try_channel(0).unwrap().is_entity_known(&first));
}

#[test]
fn released_ids_are_reissued_first_in_first_out() {
    let mut generator = EntityIdGenerator::new(1, 3, false);
    let ids: Vec<_> = (0..3).map(|_| generator.get_entity().unwrap()).collect();

    generator.release_entity(ids[1]);
    generator.release_entity(ids[2]);
    generator.release_entity(ids[0]);

    assert_eq!(generator.get_entity().unwrap().index(), ids[1].index());
    assert_eq!(generator.get_entity().unwrap().index(), ids[2].index());
    assert_eq!(generator.get_entity().unwrap().index(), ids[0].index());
    assert!(generator.get_entity().is_err());
}

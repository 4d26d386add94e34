/// End-to-end tests of the fragmentation layer over a lossy link

use tessera_shared::{FloatingOrigin, FragmentationConfig, InFragmentedChannel, OutFragmentedChannel};
use tessera_test::{ChannelHarness, CollectingInChannel, LossyLink, QueueOutChannel};

type FragmentedHarness =
    ChannelHarness<OutFragmentedChannel<QueueOutChannel>, InFragmentedChannel<CollectingInChannel>>;

const PACKET_BYTES: u32 = 300;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn harness(link: LossyLink) -> FragmentedHarness {
    init_logger();
    ChannelHarness::new(
        OutFragmentedChannel::new(QueueOutChannel::new(), FragmentationConfig::default()),
        InFragmentedChannel::new(CollectingInChannel::new(), FragmentationConfig::default()),
        link,
        PACKET_BYTES,
    )
}

fn payload(len: u32) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn thousand_bytes_complete_on_fourth_arrival() {
    let mut harness = harness(LossyLink::reliable());
    let data = payload(1000);
    harness.sender.inner_mut().push(data.clone());

    assert_eq!(harness.send_all(), 4);

    for _ in 0..3 {
        assert_eq!(harness.deliver_one(), Some(Ok(false)));
        assert!(harness.receiver.inner().received.is_empty());
    }
    assert_eq!(harness.deliver_one(), Some(Ok(true)));
    assert_eq!(harness.receiver.inner().received.len(), 1);
    assert_eq!(harness.receiver.inner().received[0].data, data);

    // fully acked only once every fragment is confirmed
    assert!(harness.sender.inner().reports.is_empty());
    harness.process_reports();
    assert_eq!(harness.sender.inner().reports, vec![(0, true)]);
    assert_eq!(harness.sender.in_flight_channel_packets(), 0);
}

#[test]
fn lost_fragments_are_resent() {
    let mut harness = harness(LossyLink::dropping([1]));
    let data = payload(1000);
    harness.sender.inner_mut().push(data.clone());

    assert_eq!(harness.send_all(), 4);
    assert_eq!(harness.deliver_all(), Ok(3));
    assert!(harness.receiver.inner().received.is_empty());

    harness.process_reports();
    assert!(harness.sender.inner().reports.is_empty());

    assert_eq!(harness.send_all(), 1);
    assert_eq!(harness.deliver_all(), Ok(1));
    assert_eq!(harness.receiver.inner().received[0].data, data);

    harness.process_reports();
    assert_eq!(harness.sender.inner().reports, vec![(0, true)]);
}

#[test]
fn newer_completion_drops_older_on_both_sides() {
    let mut harness = harness(LossyLink::dropping([0]));
    let older = payload(1000);
    let newer = vec![7u8; 10];
    harness.sender.inner_mut().push(older);
    harness.sender.inner_mut().push(newer.clone());

    // the newer payload starts in the packet carrying the older one's tail
    assert_eq!(harness.send_all(), 4);
    assert_eq!(harness.sender.in_flight_channel_packets(), 2);

    assert_eq!(harness.deliver_all(), Ok(3));
    let received = &harness.receiver.inner().received;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].data, newer);
    assert_eq!(harness.receiver.pending_channel_packets(), 0);

    harness.process_reports();
    assert_eq!(harness.sender.inner().reports, vec![(0, false), (1, true)]);
    assert_eq!(harness.sender.in_flight_channel_packets(), 0);
    assert_eq!(harness.send_all(), 0);
}

#[test]
fn out_of_order_arrival_completes() {
    let mut harness = harness(LossyLink::reliable().newest_first());
    let data = payload(1000);
    harness.sender.inner_mut().push(data.clone());

    assert_eq!(harness.send_all(), 4);
    assert_eq!(harness.deliver_all(), Ok(4));
    assert_eq!(harness.receiver.inner().received.len(), 1);
    assert_eq!(harness.receiver.inner().received[0].data, data);
}

#[test]
fn simulation_frame_and_origin_survive_reassembly() {
    let mut harness = harness(LossyLink::reliable().newest_first());
    let origin = FloatingOrigin::new(1.5, -2.0, 3.25);
    harness.simulation_frame = Some(1234);
    harness.floating_origin = Some(origin);
    harness.sender.inner_mut().push(payload(700));

    harness.send_all();
    harness.deliver_all().unwrap();

    let received = &harness.receiver.inner().received;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].simulation_frame, Some(1234));
    assert_eq!(received[0].floating_origin, Some(origin));
}

#[test]
fn many_payloads_survive_periodic_loss() {
    let mut harness = harness(LossyLink::dropping((0..200).filter(|i| i % 3 == 1)));
    let payloads: Vec<Vec<u8>> = (1..=6).map(|i| payload(i * 150)).collect();
    for data in &payloads {
        harness.sender.inner_mut().push(data.clone());
    }

    harness.run_until_idle(100).unwrap();

    let delivered: Vec<(u16, bool)> = harness.sender.inner().reports.clone();
    let received: Vec<Vec<u8>> = harness
        .receiver
        .inner()
        .received
        .iter()
        .map(|payload| payload.data.clone())
        .collect();

    // every payload is either delivered, or reported lost to the sender
    assert_eq!(delivered.len(), payloads.len());
    for (sequence, was_delivered) in delivered {
        let data = &payloads[usize::from(sequence)];
        assert_eq!(received.contains(data), was_delivered);
    }
}

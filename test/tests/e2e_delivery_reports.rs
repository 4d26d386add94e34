/// Delivery reports that don't match the sending order are protocol anomalies:
/// they are logged and ignored, never fatal

use tessera_shared::{
    FragmentationConfig, InFragmentedChannel, OutChannel, OutFragmentedChannel,
};
use tessera_test::{ChannelHarness, CollectingInChannel, LossyLink, QueueOutChannel};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn harness() -> ChannelHarness<OutFragmentedChannel<QueueOutChannel>, InFragmentedChannel<CollectingInChannel>> {
    init_logger();
    ChannelHarness::new(
        OutFragmentedChannel::new(QueueOutChannel::new(), FragmentationConfig::default()),
        InFragmentedChannel::new(CollectingInChannel::new(), FragmentationConfig::default()),
        LossyLink::reliable(),
        300,
    )
}

#[test]
fn out_of_order_report_is_ignored() {
    let mut harness = harness();
    harness.sender.inner_mut().push(vec![3; 1000]);
    assert_eq!(harness.send_all(), 4);
    harness.deliver_all().unwrap();

    harness.sender.on_delivery_info(2, true, &mut harness.acked);
    assert!(harness.sender.inner().reports.is_empty());
    assert_eq!(harness.sender.in_flight_channel_packets(), 1);

    harness.process_reports();
    assert_eq!(harness.sender.inner().reports, vec![(0, true)]);
}

#[test]
fn repeated_report_is_ignored() {
    let mut harness = harness();
    harness.sender.inner_mut().push(vec![5; 40]);
    assert_eq!(harness.send_all(), 1);
    harness.deliver_all().unwrap();
    harness.process_reports();

    harness.sender.on_delivery_info(0, true, &mut harness.acked);
    harness.sender.on_delivery_info(0, false, &mut harness.acked);
    assert_eq!(harness.sender.inner().reports, vec![(0, true)]);
}

#[test]
fn reset_forgets_in_flight_payloads() {
    let mut harness = harness();
    harness.sender.inner_mut().push(vec![9; 1000]);
    harness.send_packet();
    harness.sender.reset();

    assert_eq!(harness.sender.in_flight_channel_packets(), 0);
    assert!(!harness.sender.has_changes(&harness.acked));
    harness.sender.on_delivery_info(0, true, &mut harness.acked);
    assert!(harness.sender.inner().reports.is_empty());
}

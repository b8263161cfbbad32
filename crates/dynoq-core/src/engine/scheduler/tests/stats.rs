use super::*;

#[test]
fn stats_track_every_store() {
    let (_tx, mut scheduler, clock) = test_setup();
    assert_eq!(scheduler.stats(), QueueStats::default());

    scheduler
        .handle_push(test_command("ready"), Duration::ZERO)
        .unwrap();
    scheduler
        .handle_push(test_command("leased"), Duration::ZERO)
        .unwrap();
    scheduler
        .handle_push(test_command("later"), Duration::from_secs(2))
        .unwrap();
    scheduler
        .handle_push(test_command("much_later"), Duration::from_secs(60))
        .unwrap();
    poll_one(&mut scheduler);

    let stats = scheduler.stats();
    assert_eq!(stats.ready, 1);
    assert_eq!(stats.delayed, 2);
    assert_eq!(stats.leased, 1);
    assert_eq!(stats.depth(), 4);
    assert_eq!(stats.next_delayed_at_ns, Some(START_NS + 2_000_000_000));
    assert_eq!(stats.next_lease_expiry_ns, Some(START_NS + 10_000_000_000));

    clock.advance(Duration::from_secs(2));
    scheduler.housekeeping();
    let stats = scheduler.stats();
    assert_eq!(stats.ready, 2);
    assert_eq!(stats.delayed, 1);
    assert_eq!(stats.next_delayed_at_ns, Some(START_NS + 60_000_000_000));
}

#[test]
fn completed_messages_leave_depth() {
    let (_tx, mut scheduler, _clock) = test_setup();

    let msg = test_command("a");
    scheduler.handle_push(msg.clone(), Duration::ZERO).unwrap();
    poll_one(&mut scheduler);
    assert_eq!(scheduler.stats().depth(), 1);

    scheduler.handle_ack(&msg.id()).unwrap();
    assert_eq!(scheduler.stats().depth(), 0);
}

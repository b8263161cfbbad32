use super::*;

/// Lease duration used by every scheduler test.
pub(super) const LEASE: Duration = Duration::from_secs(10);

/// Arbitrary non-zero start time for the manual clock.
pub(super) const START_NS: u64 = 1_000_000_000;

pub(super) type TestScheduler = Scheduler<Envelope>;

pub(super) fn test_config() -> (QueueConfig, SchedulerConfig) {
    let queue = QueueConfig::new("orca").with_lease_duration(LEASE);
    let scheduler = SchedulerConfig {
        command_channel_capacity: 256,
        tick_interval_ms: 10,
    };
    (queue, scheduler)
}

/// Fresh recovered scheduler on in-memory storage, with a manual clock at
/// `START_NS`.
pub(super) fn test_setup() -> (
    crossbeam_channel::Sender<SchedulerCommand<Envelope>>,
    TestScheduler,
    ManualClock,
) {
    let clock = ManualClock::new(START_NS);
    let (tx, scheduler) = test_setup_with_storage(Arc::new(MemoryStorage::new()), &clock);
    (tx, scheduler, clock)
}

/// Helper: create a recovered scheduler sharing an existing storage (for
/// restart and failure tests).
pub(super) fn test_setup_with_storage(
    storage: Arc<dyn Storage>,
    clock: &ManualClock,
) -> (crossbeam_channel::Sender<SchedulerCommand<Envelope>>, TestScheduler) {
    let (queue, config) = test_config();
    let (tx, rx) = crossbeam_channel::bounded(config.command_channel_capacity);
    let mut scheduler = Scheduler::new(storage, Arc::new(clock.clone()), rx, &queue, &config);
    scheduler.recover().unwrap();
    (tx, scheduler)
}

pub(super) fn test_command(kind: &str) -> Envelope {
    Envelope::Command(Command::new(kind, kind.as_bytes().to_vec()))
}

pub(super) fn test_event(kind: &str) -> Envelope {
    Envelope::Event(Event::new(kind, Vec::new()))
}

/// Helper: poll and unwrap a delivery, panicking if the queue is empty.
pub(super) fn poll_one(scheduler: &mut TestScheduler) -> Delivery<Envelope> {
    scheduler
        .handle_poll()
        .unwrap()
        .expect("expected a visible message")
}

/// Helper: poll until empty, returning the ids in delivery order.
pub(super) fn drain_ids(scheduler: &mut TestScheduler) -> Vec<MessageId> {
    let mut ids = Vec::new();
    while let Some(delivery) = scheduler.handle_poll().unwrap() {
        ids.push(delivery.message.id());
    }
    ids
}

/// Helper: number of entries stored for the test queue in `partition`.
pub(super) fn stored_count(scheduler: &TestScheduler, partition: Partition) -> usize {
    scheduler
        .storage()
        .list_prefix(partition, &keys::queue_prefix("orca"))
        .unwrap()
        .len()
}

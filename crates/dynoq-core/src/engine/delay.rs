use crate::engine::index::{ScheduledEntry, TimeIndex};
use crate::message::MessageId;

/// Messages whose scheduled visible time is still in the future.
#[derive(Debug, Default)]
pub struct DelaySchedule {
    index: TimeIndex,
}

impl DelaySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message. Returns false if it is already scheduled.
    pub fn insert(&mut self, id: MessageId, scheduled_at_ns: u64, seq: u64) -> bool {
        self.index.insert(ScheduledEntry {
            id,
            at_ns: scheduled_at_ns,
            seq,
        })
    }

    /// Entries whose scheduled time has arrived, in the order they must be
    /// promoted. Nothing is removed; call [`remove`](Self::remove) once the
    /// promotion has been persisted.
    pub fn due(&self, now_ns: u64) -> Vec<ScheduledEntry> {
        self.index.due(now_ns)
    }

    /// Scheduled time of the next entry to come due.
    pub fn next_due_at(&self) -> Option<u64> {
        self.index.first().map(|e| e.at_ns)
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<ScheduledEntry> {
        self.index.remove(id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.index.contains(id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.len() == 0
    }

    pub(crate) fn clear(&mut self) {
        self.index.clear();
    }
}

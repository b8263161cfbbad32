use crate::engine::index::{ScheduledEntry, TimeIndex};
use crate::message::MessageId;

/// Messages eligible for delivery, ordered by (visible time, sequence).
///
/// The sequence number breaks ties between messages that became visible at
/// the same instant, so delivery among them is FIFO.
#[derive(Debug, Default)]
pub struct ReadySet {
    index: TimeIndex,
}

impl ReadySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message. Returns false if it is already ready.
    pub fn insert(&mut self, id: MessageId, visible_at_ns: u64, seq: u64) -> bool {
        self.index.insert(ScheduledEntry {
            id,
            at_ns: visible_at_ns,
            seq,
        })
    }

    /// The earliest entry, if it is visible at `now_ns`.
    pub fn peek_visible(&self, now_ns: u64) -> Option<ScheduledEntry> {
        self.index.first().filter(|e| e.at_ns <= now_ns)
    }

    /// Remove and return the earliest entry visible at `now_ns`.
    pub fn pop_visible(&mut self, now_ns: u64) -> Option<ScheduledEntry> {
        let entry = self.peek_visible(now_ns)?;
        self.index.remove(&entry.id)
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

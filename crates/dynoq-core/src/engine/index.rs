use std::collections::{BTreeMap, HashMap};

use crate::message::MessageId;

/// A message positioned at `(at_ns, seq)` in a time-ordered store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEntry {
    pub id: MessageId,
    pub at_ns: u64,
    pub seq: u64,
}

/// Time-ordered index with O(log n) removal by id. Shared by the ready set
/// and the delay schedule, which differ only in how they are drained.
#[derive(Debug, Default)]
pub(crate) struct TimeIndex {
    by_key: BTreeMap<(u64, u64), MessageId>,
    by_id: HashMap<MessageId, (u64, u64)>,
}

impl TimeIndex {
    /// Returns false (and changes nothing) if `id` is already indexed.
    pub(crate) fn insert(&mut self, entry: ScheduledEntry) -> bool {
        if self.by_id.contains_key(&entry.id) {
            return false;
        }
        self.by_id.insert(entry.id, (entry.at_ns, entry.seq));
        self.by_key.insert((entry.at_ns, entry.seq), entry.id);
        true
    }

    pub(crate) fn remove(&mut self, id: &MessageId) -> Option<ScheduledEntry> {
        let (at_ns, seq) = self.by_id.remove(id)?;
        self.by_key.remove(&(at_ns, seq));
        Some(ScheduledEntry { id: *id, at_ns, seq })
    }

    pub(crate) fn contains(&self, id: &MessageId) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn first(&self) -> Option<ScheduledEntry> {
        self.by_key
            .iter()
            .next()
            .map(|(&(at_ns, seq), &id)| ScheduledEntry { id, at_ns, seq })
    }

    /// All entries with `at_ns <= now_ns`, in (time, seq) order.
    pub(crate) fn due(&self, now_ns: u64) -> Vec<ScheduledEntry> {
        self.by_key
            .range(..=(now_ns, u64::MAX))
            .map(|(&(at_ns, seq), &id)| ScheduledEntry { id, at_ns, seq })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_id.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_key.clear();
        self.by_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(at_ns: u64, seq: u64) -> ScheduledEntry {
        ScheduledEntry {
            id: MessageId::new(),
            at_ns,
            seq,
        }
    }

    #[test]
    fn insert_rejects_known_id() {
        let mut index = TimeIndex::default();
        let e = entry(1, 1);
        assert!(index.insert(e));
        assert!(!index.insert(ScheduledEntry { at_ns: 9, ..e }));
        assert_eq!(index.len(), 1);
        assert_eq!(index.first().unwrap().at_ns, 1);
    }

    #[test]
    fn due_includes_boundary() {
        let mut index = TimeIndex::default();
        let a = entry(10, 5);
        let b = entry(10, u64::MAX);
        let c = entry(11, 0);
        index.insert(c);
        index.insert(b);
        index.insert(a);
        let due: Vec<MessageId> = index.due(10).into_iter().map(|e| e.id).collect();
        assert_eq!(due, vec![a.id, b.id]);
    }

    #[test]
    fn remove_clears_both_maps() {
        let mut index = TimeIndex::default();
        let e = entry(3, 3);
        index.insert(e);
        assert_eq!(index.remove(&e.id), Some(e));
        assert!(!index.contains(&e.id));
        assert!(index.first().is_none());
        assert!(index.remove(&e.id).is_none());
    }
}

use std::collections::{BTreeSet, HashMap};

use crate::message::MessageId;

/// A temporary exclusive claim on a polled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    /// Minted per poll; identifies the holder for `abandon`.
    pub token: MessageId,
    pub expires_at_ns: u64,
}

/// Messages currently checked out by a consumer, with an expiry-ordered index
/// for the reaper.
#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: HashMap<MessageId, Lease>,
    by_expiry: BTreeSet<(u64, MessageId)>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a lease. At most one lease exists per id; returns false (and
    /// changes nothing) if `id` is already leased.
    pub fn insert(&mut self, id: MessageId, lease: Lease) -> bool {
        if self.leases.contains_key(&id) {
            return false;
        }
        self.by_expiry.insert((lease.expires_at_ns, id));
        self.leases.insert(id, lease);
        true
    }

    pub fn get(&self, id: &MessageId) -> Option<&Lease> {
        self.leases.get(id)
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Lease> {
        let lease = self.leases.remove(id)?;
        self.by_expiry.remove(&(lease.expires_at_ns, *id));
        Some(lease)
    }

    /// Leases with `expires_at_ns <= now_ns`, earliest first. Nothing is removed.
    pub fn expired(&self, now_ns: u64) -> Vec<(MessageId, Lease)> {
        self.by_expiry
            .iter()
            .take_while(|(expiry, _)| *expiry <= now_ns)
            .filter_map(|(_, id)| self.leases.get(id).map(|lease| (*id, *lease)))
            .collect()
    }

    pub fn next_expiry(&self) -> Option<u64> {
        self.by_expiry.iter().next().map(|(expiry, _)| *expiry)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.leases.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.leases.clear();
        self.by_expiry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease(expires_at_ns: u64) -> Lease {
        Lease {
            token: MessageId::new(),
            expires_at_ns,
        }
    }

    #[test]
    fn one_lease_per_message() {
        let mut table = LeaseTable::new();
        let id = MessageId::new();
        assert!(table.insert(id, lease(10)));
        assert!(!table.insert(id, lease(20)));
        assert_eq!(table.get(&id).unwrap().expires_at_ns, 10);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn expired_is_ordered_and_inclusive() {
        let mut table = LeaseTable::new();
        let a = MessageId::new();
        let b = MessageId::new();
        let c = MessageId::new();
        table.insert(c, lease(30));
        table.insert(b, lease(20));
        table.insert(a, lease(10));

        let expired: Vec<MessageId> = table.expired(20).into_iter().map(|(id, _)| id).collect();
        assert_eq!(expired, vec![a, b]);
        assert_eq!(table.next_expiry(), Some(10));
    }

    #[test]
    fn remove_drops_expiry_index() {
        let mut table = LeaseTable::new();
        let id = MessageId::new();
        table.insert(id, lease(5));
        assert!(table.remove(&id).is_some());
        assert!(table.expired(u64::MAX).is_empty());
        assert!(table.next_expiry().is_none());
        assert!(table.is_empty());
    }
}

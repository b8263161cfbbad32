use super::*;

use std::collections::HashSet;

impl<M> Scheduler<M>
where
    M: Message + Serialize + DeserializeOwned,
{
    /// Move every delayed message whose scheduled time has arrived into the
    /// ready set.
    ///
    /// Promoted entries keep their scheduled time as visible time and get
    /// fresh sequence numbers in (scheduled time, push order) order, so the
    /// relative order among messages due at the same instant is preserved.
    ///
    /// Returns the number of messages promoted.
    pub(super) fn promote_due(&mut self, now_ns: u64) -> StorageResult<usize> {
        let due = self.delayed.due(now_ns);
        if due.is_empty() {
            return Ok(0);
        }

        let mut seq = self.next_seq;
        let mut ops = Vec::with_capacity(due.len() * 2 + 1);
        let mut promoted = Vec::with_capacity(due.len());
        for entry in &due {
            ops.push(WriteBatchOp::delete(
                Partition::Delayed,
                keys::schedule_key(&self.queue, entry.at_ns, entry.seq),
            ));
            ops.push(WriteBatchOp::put(
                Partition::Ready,
                keys::schedule_key(&self.queue, entry.at_ns, seq),
                keys::encode_id(&entry.id),
            ));
            promoted.push((entry.id, entry.at_ns, seq));
            seq += 1;
        }
        ops.push(self.sequence_op(seq));

        self.storage.write_batch(ops)?;
        self.next_seq = seq;

        for (id, visible_at, seq) in &promoted {
            self.delayed.remove(id);
            self.ready.insert(*id, *visible_at, *seq);
        }

        debug!(promoted = promoted.len(), "promoted delayed messages");
        Ok(promoted.len())
    }

    /// Scan the lease table for expired leases and reclaim them.
    ///
    /// For each expired lease, in expiry order:
    /// 1. Delete the lease and lease_expiry entries
    /// 2. Re-admit the message to the ready set, visible now, with a new sequence
    ///
    /// Redelivery is immediate, never re-delayed. Returns the number of leases
    /// reclaimed.
    pub(super) fn reclaim_expired_leases(&mut self, now_ns: u64) -> StorageResult<usize> {
        let expired = self.leases.expired(now_ns);
        if expired.is_empty() {
            return Ok(0);
        }

        let mut seq = self.next_seq;
        let mut ops = Vec::with_capacity(expired.len() * 3 + 1);
        let mut reclaimed = Vec::with_capacity(expired.len());
        for (msg_id, lease) in &expired {
            ops.push(WriteBatchOp::delete(
                Partition::Leases,
                keys::message_key(&self.queue, msg_id),
            ));
            ops.push(WriteBatchOp::delete(
                Partition::LeaseExpiry,
                keys::lease_expiry_key(&self.queue, lease.expires_at_ns, msg_id),
            ));
            ops.push(WriteBatchOp::put(
                Partition::Ready,
                keys::schedule_key(&self.queue, now_ns, seq),
                keys::encode_id(msg_id),
            ));
            reclaimed.push((*msg_id, seq));
            seq += 1;
        }
        ops.push(self.sequence_op(seq));

        self.storage.write_batch(ops)?;
        self.next_seq = seq;

        for (msg_id, seq) in &reclaimed {
            self.leases.remove(msg_id);
            self.ready.insert(*msg_id, now_ns, *seq);
            debug!(%msg_id, seq, "reclaimed expired lease");
        }

        info!(reclaimed = reclaimed.len(), "reclaimed expired leases");
        Ok(reclaimed.len())
    }

    /// Rebuild the in-memory stores from storage after a crash or restart.
    ///
    /// Storage holds every message, lease and schedule entry, so recovery:
    /// 1. Restores the sequence counter
    /// 2. Rebuilds the lease table, ready set and delay schedule
    /// 3. Deletes stray entries for ids already placed (a lease wins over a
    ///    ready or delayed entry)
    /// 4. Reclaims leases that expired while the process was down
    pub fn recover(&mut self) -> StorageResult<()> {
        self.ready.clear();
        self.delayed.clear();
        self.leases.clear();

        let prefix = keys::queue_prefix(&self.queue);
        let mut stale = Vec::new();

        self.next_seq = match self
            .storage
            .get(Partition::State, &keys::sequence_key(&self.queue))?
        {
            Some(raw) => keys::parse_ts(&raw)?,
            None => 0,
        };
        let mut max_seq_seen: Option<u64> = None;

        for (key, value) in self.storage.list_prefix(Partition::Leases, &prefix)? {
            let msg_id = keys::parse_message_key(&self.queue, &key)?;
            let (token, expires_at_ns) = keys::parse_lease_value(&value)?;
            self.leases.insert(
                msg_id,
                Lease {
                    token,
                    expires_at_ns,
                },
            );
        }

        // Expiry index entries that no longer match a lease are leftovers.
        let mut expiry_keys = HashSet::new();
        for (key, _) in self.storage.list_prefix(Partition::LeaseExpiry, &prefix)? {
            let (expiry, msg_id) = keys::parse_lease_expiry_key(&self.queue, &key)?;
            if self.leases.get(&msg_id).map(|l| l.expires_at_ns) == Some(expiry) {
                expiry_keys.insert(msg_id);
            } else {
                stale.push(WriteBatchOp::delete(Partition::LeaseExpiry, key));
            }
        }
        // A lease without its expiry entry would never be found by a scan of
        // the expiry partition; restore it.
        for (msg_id, lease) in self.leases.expired(u64::MAX) {
            if !expiry_keys.contains(&msg_id) {
                stale.push(WriteBatchOp::put(
                    Partition::LeaseExpiry,
                    keys::lease_expiry_key(&self.queue, lease.expires_at_ns, &msg_id),
                    Vec::new(),
                ));
            }
        }

        for (key, value) in self.storage.list_prefix(Partition::Ready, &prefix)? {
            let (visible_at, seq) = keys::parse_schedule_key(&self.queue, &key)?;
            let msg_id = keys::parse_id(&value)?;
            max_seq_seen = max_seq_seen.max(Some(seq));
            if self.leases.contains(&msg_id) || !self.ready.insert(msg_id, visible_at, seq) {
                warn!(%msg_id, "stray ready entry for already placed message, removing");
                stale.push(WriteBatchOp::delete(Partition::Ready, key));
            }
        }

        for (key, value) in self.storage.list_prefix(Partition::Delayed, &prefix)? {
            let (scheduled_at, seq) = keys::parse_schedule_key(&self.queue, &key)?;
            let msg_id = keys::parse_id(&value)?;
            max_seq_seen = max_seq_seen.max(Some(seq));
            if self.leases.contains(&msg_id)
                || self.ready.contains(&msg_id)
                || !self.delayed.insert(msg_id, scheduled_at, seq)
            {
                warn!(%msg_id, "stray delayed entry for already placed message, removing");
                stale.push(WriteBatchOp::delete(Partition::Delayed, key));
            }
        }

        // Never reuse a sequence number that is still on disk.
        if let Some(max_seq) = max_seq_seen {
            self.next_seq = self.next_seq.max(max_seq.saturating_add(1));
        }

        if !stale.is_empty() {
            warn!(count = stale.len(), "repairing inconsistent queue entries");
            self.storage.write_batch(stale)?;
        }

        info!(
            queue = %self.queue,
            ready = self.ready.len(),
            delayed = self.delayed.len(),
            leased = self.leases.len(),
            next_seq = self.next_seq,
            "recovery: queue state restored"
        );

        self.reclaim_expired_leases(self.clock.now_ns())?;
        Ok(())
    }
}

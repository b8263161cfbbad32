use super::*;

use crate::error::PollError;

impl<M> Scheduler<M>
where
    M: Message + Serialize + DeserializeOwned,
{
    /// Hand out the earliest visible message under a fresh lease.
    ///
    /// Due delayed messages and expired leases are folded into the ready set
    /// first, so the answer reflects the clock at the moment of the call
    /// rather than the last housekeeping tick.
    pub(super) fn handle_poll(&mut self) -> Result<Option<Delivery<M>>, PollError> {
        let now = self.clock.now_ns();
        self.promote_due(now)?;
        self.reclaim_expired_leases(now)?;

        loop {
            let Some(entry) = self.ready.peek_visible(now) else {
                return Ok(None);
            };
            let ready_key = keys::schedule_key(&self.queue, entry.at_ns, entry.seq);

            let Some(mut stored) = self.load_stored(&entry.id)? else {
                // Ready entry without a body: drop it and look at the next one.
                warn!(msg_id = %entry.id, "ready message missing from storage, dropping entry");
                self.storage
                    .write_batch(vec![WriteBatchOp::delete(Partition::Ready, ready_key)])?;
                self.ready.remove(&entry.id);
                continue;
            };

            let message: M = match serde_json::from_value(stored.body.clone()) {
                Ok(message) => message,
                Err(e) => {
                    // Take it off the head of the queue so the entries behind it
                    // are still delivered. The body stays in storage.
                    error!(
                        msg_id = %entry.id,
                        error = %e,
                        "stored message cannot be decoded, removing it from the ready set"
                    );
                    self.storage
                        .write_batch(vec![WriteBatchOp::delete(Partition::Ready, ready_key)])?;
                    self.ready.remove(&entry.id);
                    continue;
                }
            };

            stored.attempt_count += 1;
            let lease = Lease {
                token: MessageId::new(),
                expires_at_ns: now.saturating_add(self.lease_duration_ns),
            };
            let msg_key = keys::message_key(&self.queue, &entry.id);

            // Pop and lease as one unit: a crash can never leave the message
            // both ready and leased, or neither.
            self.storage.write_batch(vec![
                WriteBatchOp::delete(Partition::Ready, ready_key),
                WriteBatchOp::put(Partition::Messages, msg_key.clone(), encode_stored(&stored)?),
                WriteBatchOp::put(
                    Partition::Leases,
                    msg_key,
                    keys::lease_value(&lease.token, lease.expires_at_ns),
                ),
                WriteBatchOp::put(
                    Partition::LeaseExpiry,
                    keys::lease_expiry_key(&self.queue, lease.expires_at_ns, &entry.id),
                    Vec::new(),
                ),
            ])?;

            self.ready.remove(&entry.id);
            self.leases.insert(entry.id, lease);

            debug!(
                msg_id = %entry.id,
                attempt = stored.attempt_count,
                expires_at = lease.expires_at_ns,
                "message leased"
            );

            return Ok(Some(Delivery {
                message,
                lease_token: lease.token,
                attempt: stored.attempt_count,
                lease_expires_at_ns: lease.expires_at_ns,
            }));
        }
    }
}

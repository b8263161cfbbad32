use super::*;

use crate::error::{AbandonError, AckError, PushError};

impl<M> Scheduler<M>
where
    M: Message + Serialize + DeserializeOwned,
{
    /// Admit a new message. A zero delay makes it visible now; anything else
    /// parks it in the delay schedule until `now + delay`.
    pub(super) fn handle_push(&mut self, message: M, delay: Duration) -> Result<(), PushError> {
        let msg_id = message.id();

        // Check-then-write is safe: the scheduler is single-threaded, so no
        // concurrent command can admit the same id in between.
        if let Some(state) = self.state_of(&msg_id)? {
            return Err(PushError::Duplicate { id: msg_id, state });
        }

        let now = self.clock.now_ns();
        let delay_ns = duration_to_ns(delay);
        let seq = self.next_seq;

        let body = serde_json::to_value(&message).map_err(StorageError::from)?;
        // Poll decodes the stored value back into `M`; refuse anything that
        // would fail there (non-finite floats serialize as null, for one).
        if let Err(e) = serde_json::from_value::<M>(body.clone()) {
            return Err(PushError::Undecodable {
                id: msg_id,
                reason: e.to_string(),
            });
        }

        let stored = StoredMessage {
            id: msg_id,
            body,
            enqueued_at: now,
            attempt_count: 0,
        };

        let mut ops = vec![
            WriteBatchOp::put(
                Partition::Messages,
                keys::message_key(&self.queue, &msg_id),
                encode_stored(&stored)?,
            ),
            self.sequence_op(seq + 1),
        ];

        let scheduled_at = now.saturating_add(delay_ns);
        let partition = if delay_ns == 0 {
            Partition::Ready
        } else {
            Partition::Delayed
        };
        ops.push(WriteBatchOp::put(
            partition,
            keys::schedule_key(&self.queue, scheduled_at, seq),
            keys::encode_id(&msg_id),
        ));

        self.storage.write_batch(ops)?;
        self.next_seq = seq + 1;

        if delay_ns == 0 {
            self.ready.insert(msg_id, now, seq);
            debug!(%msg_id, seq, "message ready");
        } else {
            self.delayed.insert(msg_id, scheduled_at, seq);
            debug!(%msg_id, seq, scheduled_at, "message delayed");
        }
        Ok(())
    }

    /// Complete a leased message. Acking an id without an active lease is a
    /// no-op: the consumer cannot tell an expired lease from an earlier ack.
    pub(super) fn handle_ack(&mut self, msg_id: &MessageId) -> Result<(), AckError> {
        let Some(lease) = self.leases.get(msg_id).copied() else {
            debug!(%msg_id, "ack without active lease, ignoring");
            return Ok(());
        };

        let msg_key = keys::message_key(&self.queue, msg_id);
        let now = self.clock.now_ns();

        // Atomically drop the lease and the message body, and remember the id
        // so it can never be pushed again.
        self.storage.write_batch(vec![
            WriteBatchOp::delete(Partition::Leases, msg_key.clone()),
            WriteBatchOp::delete(
                Partition::LeaseExpiry,
                keys::lease_expiry_key(&self.queue, lease.expires_at_ns, msg_id),
            ),
            WriteBatchOp::delete(Partition::Messages, msg_key.clone()),
            WriteBatchOp::put(Partition::Completed, msg_key, keys::encode_ts(now)),
        ])?;

        self.leases.remove(msg_id);
        debug!(%msg_id, "message completed");
        Ok(())
    }

    /// Give a lease back early. Only the holder of the current token can do
    /// so; a stale token (the lease already expired and was re-issued) is
    /// ignored.
    pub(super) fn handle_abandon(
        &mut self,
        msg_id: &MessageId,
        lease_token: &MessageId,
    ) -> Result<(), AbandonError> {
        let Some(lease) = self.leases.get(msg_id).copied() else {
            debug!(%msg_id, "abandon without active lease, ignoring");
            return Ok(());
        };
        if lease.token != *lease_token {
            debug!(%msg_id, "abandon with stale lease token, ignoring");
            return Ok(());
        }

        let now = self.clock.now_ns();
        let seq = self.next_seq;
        let msg_key = keys::message_key(&self.queue, msg_id);

        self.storage.write_batch(vec![
            WriteBatchOp::delete(Partition::Leases, msg_key),
            WriteBatchOp::delete(
                Partition::LeaseExpiry,
                keys::lease_expiry_key(&self.queue, lease.expires_at_ns, msg_id),
            ),
            WriteBatchOp::put(
                Partition::Ready,
                keys::schedule_key(&self.queue, now, seq),
                keys::encode_id(msg_id),
            ),
            self.sequence_op(seq + 1),
        ])?;

        self.next_seq = seq + 1;
        self.leases.remove(msg_id);
        self.ready.insert(*msg_id, now, seq);
        debug!(%msg_id, seq, "lease abandoned, message ready again");
        Ok(())
    }
}

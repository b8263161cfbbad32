use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::{duration_to_ns, Clock};
use crate::engine::command::{Delivery, SchedulerCommand};
use crate::engine::config::SchedulerConfig;
use crate::engine::delay::DelaySchedule;
use crate::engine::lease::{Lease, LeaseTable};
use crate::engine::ready::ReadySet;
use crate::engine::stats::QueueStats;
use crate::error::{MessageState, StorageError, StorageResult};
use crate::message::{Message, MessageId, StoredMessage};
use crate::queue::QueueConfig;
use crate::storage::{keys, Partition, Storage, WriteBatchOp};

mod delivery;
mod handlers;
mod recovery;

/// Single-threaded scheduler core. Owns the ready set, delay schedule and
/// lease table for one queue and processes commands from caller threads via
/// a crossbeam channel, so every state transition is serialized.
///
/// Each transition is written to storage as one batch before the in-memory
/// stores change; a failed batch leaves both untouched.
pub struct Scheduler<M> {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    inbound: Receiver<SchedulerCommand<M>>,
    queue: String,
    lease_duration_ns: u64,
    tick_interval: Duration,
    running: bool,
    ready: ReadySet,
    delayed: DelaySchedule,
    leases: LeaseTable,
    /// Next sequence number to hand out. Persisted in the state partition
    /// with every batch that consumes one.
    next_seq: u64,
}

impl<M> Scheduler<M>
where
    M: Message + Serialize + DeserializeOwned,
{
    pub fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        inbound: Receiver<SchedulerCommand<M>>,
        queue: &QueueConfig,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            clock,
            inbound,
            queue: queue.name.clone(),
            lease_duration_ns: duration_to_ns(queue.lease_duration()),
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            running: true,
            ready: ReadySet::new(),
            delayed: DelaySchedule::new(),
            leases: LeaseTable::new(),
            next_seq: 0,
        }
    }

    /// Run the scheduler event loop. This blocks the current thread until
    /// a `Shutdown` command is received or the inbound channel is disconnected.
    ///
    /// Promotion and lease reaping run at least once per tick, even while
    /// commands keep arriving.
    pub fn run(&mut self) {
        info!(queue = %self.queue, "scheduler started");
        let mut last_tick = Instant::now();

        while self.running {
            // Phase 1: Drain all buffered commands (non-blocking)
            let mut drained = 0;
            while let Ok(cmd) = self.inbound.try_recv() {
                self.handle_command(cmd);
                drained += 1;
                if !self.running {
                    break;
                }
            }

            if !self.running {
                break;
            }

            // Phase 2: Periodic housekeeping
            if last_tick.elapsed() >= self.tick_interval {
                self.housekeeping();
                last_tick = Instant::now();
            }

            // Phase 3: Park until next command or the next tick is due
            if drained == 0 {
                let wait = self.tick_interval.saturating_sub(last_tick.elapsed());
                match self.inbound.recv_timeout(wait) {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                        info!("inbound channel disconnected, shutting down");
                        self.running = false;
                    }
                }
            }
        }

        // Flush the WAL to ensure all writes are durable before exit
        if let Err(e) = self.storage.flush() {
            warn!(error = %e, "failed to flush storage during shutdown");
        }

        info!(queue = %self.queue, "scheduler stopped");
    }

    fn handle_command(&mut self, cmd: SchedulerCommand<M>) {
        match cmd {
            SchedulerCommand::Push {
                message,
                delay,
                reply,
            } => {
                debug!(msg_id = %message.id(), ?delay, "push command received");
                let result = self.handle_push(message, delay);
                let _ = reply.send(result);
            }
            SchedulerCommand::Poll { reply } => {
                let result = self.handle_poll();
                let _ = reply.send(result);
            }
            SchedulerCommand::Ack { msg_id, reply } => {
                debug!(%msg_id, "ack command received");
                let result = self.handle_ack(&msg_id);
                let _ = reply.send(result);
            }
            SchedulerCommand::Abandon {
                msg_id,
                lease_token,
                reply,
            } => {
                debug!(%msg_id, %lease_token, "abandon command received");
                let result = self.handle_abandon(&msg_id, &lease_token);
                let _ = reply.send(result);
            }
            SchedulerCommand::GetStats { reply } => {
                let _ = reply.send(self.stats());
            }
            SchedulerCommand::Shutdown => {
                info!("shutdown command received");
                self.running = false;
            }
        }
    }

    /// Promote due delayed messages and reclaim expired leases. Failures are
    /// logged; the next tick or poll retries them.
    pub(super) fn housekeeping(&mut self) {
        let now = self.clock.now_ns();
        if let Err(e) = self.promote_due(now) {
            warn!(error = %e, "failed to promote delayed messages");
        }
        if let Err(e) = self.reclaim_expired_leases(now) {
            warn!(error = %e, "failed to reclaim expired leases");
        }
    }

    pub(super) fn stats(&self) -> QueueStats {
        QueueStats {
            ready: self.ready.len() as u64,
            delayed: self.delayed.len() as u64,
            leased: self.leases.len() as u64,
            next_delayed_at_ns: self.delayed.next_due_at(),
            next_lease_expiry_ns: self.leases.next_expiry(),
        }
    }

    /// Current state of `id`, or `None` if the queue has never seen it.
    fn state_of(&self, id: &MessageId) -> StorageResult<Option<MessageState>> {
        if self.ready.contains(id) {
            return Ok(Some(MessageState::Ready));
        }
        if self.delayed.contains(id) {
            return Ok(Some(MessageState::Delayed));
        }
        if self.leases.contains(id) {
            return Ok(Some(MessageState::Leased));
        }
        let completed_key = keys::message_key(&self.queue, id);
        if self
            .storage
            .get(Partition::Completed, &completed_key)?
            .is_some()
        {
            return Ok(Some(MessageState::Completed));
        }
        Ok(None)
    }

    fn sequence_op(&self, next_seq: u64) -> WriteBatchOp {
        WriteBatchOp::put(
            Partition::State,
            keys::sequence_key(&self.queue),
            keys::encode_ts(next_seq),
        )
    }

    fn load_stored(&self, id: &MessageId) -> StorageResult<Option<StoredMessage>> {
        let key = keys::message_key(&self.queue, id);
        match self.storage.get(Partition::Messages, &key)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Access the storage layer (used by tests).
    #[cfg(test)]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }
}

fn encode_stored(stored: &StoredMessage) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(stored)?)
}

#[cfg(test)]
mod tests;

pub mod command;
pub mod config;
pub mod delay;
mod index;
pub mod lease;
pub mod ready;
mod scheduler;
pub mod stats;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::info;

use crate::clock::Clock;
use crate::error::{AbandonError, AckError, EngineError, EngineResult, PollError, PushError};
use crate::message::{Command, Event, Message, MessageId};
use crate::storage::Storage;

pub use command::{Delivery, SchedulerCommand};
pub use config::{EngineConfig, SchedulerConfig, StorageConfig};
pub use index::ScheduledEntry;
pub use stats::QueueStats;

pub use scheduler::Scheduler;

/// The four operations an orchestrator needs from a work queue.
///
/// Delivery is at-least-once: a polled message that is not acked before its
/// lease expires is handed out again.
pub trait Queue<M: Message> {
    /// Make `message` visible immediately.
    fn push(&self, message: M) -> Result<(), PushError>;

    /// Make `message` visible once `delay` has elapsed. A zero delay is the
    /// same as [`push`](Queue::push).
    fn push_delayed(&self, message: M, delay: Duration) -> Result<(), PushError>;

    /// Take the earliest visible message, if any, without blocking.
    fn poll(&self) -> Result<Option<Delivery<M>>, PollError>;

    /// Mark `message` as processed. Idempotent.
    fn ack(&self, message: &M) -> Result<(), AckError>;
}

pub type CommandQueue = QueueEngine<Command>;
pub type EventQueue = QueueEngine<Event>;

/// The engine owns the scheduler thread and the inbound command channel.
/// Caller threads send commands through `send_command()`, and the
/// single-threaded scheduler processes them sequentially.
///
/// The [`Queue`] methods block the calling thread until the scheduler
/// replies. Inside a tokio runtime they fail with
/// [`EngineError::BlockingInRuntime`]; use the `*_async` variants there.
pub struct QueueEngine<M> {
    queue: String,
    command_tx: crossbeam_channel::Sender<SchedulerCommand<M>>,
    scheduler_thread: Option<thread::JoinHandle<()>>,
}

impl<M> QueueEngine<M>
where
    M: Message + Serialize + DeserializeOwned,
{
    /// Recover queue state from `storage`, then spawn the scheduler on a
    /// dedicated OS thread. Recovery runs on the calling thread so that a
    /// storage failure is reported here instead of silently starting empty.
    #[tracing::instrument(skip_all, fields(queue = %config.queue.name))]
    pub fn start(
        config: EngineConfig,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::InvalidConfig)?;

        let (tx, rx) = crossbeam_channel::bounded::<SchedulerCommand<M>>(
            config.scheduler.command_channel_capacity,
        );

        let mut scheduler = Scheduler::new(storage, clock, rx, &config.queue, &config.scheduler);
        scheduler.recover().map_err(EngineError::Recovery)?;

        let handle = thread::Builder::new()
            .name(format!("dynoq-{}", config.queue.name))
            .spawn(move || scheduler.run())
            .map_err(|e| EngineError::SchedulerSpawn(e.to_string()))?;

        info!("queue engine started");

        Ok(Self {
            queue: config.queue.name,
            command_tx: tx,
            scheduler_thread: Some(handle),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    /// Acknowledge by id, for callers that no longer hold the message.
    pub fn ack_id(&self, msg_id: MessageId) -> Result<(), AckError> {
        self.request(|reply| SchedulerCommand::Ack { msg_id, reply })?
    }

    /// Return a delivery to the ready set immediately instead of waiting for
    /// its lease to expire.
    pub fn abandon(&self, delivery: &Delivery<M>) -> Result<(), AbandonError> {
        self.abandon_lease(delivery.message.id(), delivery.lease_token)
    }

    /// Like [`abandon`](Self::abandon), for callers that kept only the id and
    /// lease token.
    pub fn abandon_lease(
        &self,
        msg_id: MessageId,
        lease_token: MessageId,
    ) -> Result<(), AbandonError> {
        self.request(|reply| SchedulerCommand::Abandon {
            msg_id,
            lease_token,
            reply,
        })?
    }

    pub fn stats(&self) -> EngineResult<QueueStats> {
        self.request(|reply| SchedulerCommand::GetStats { reply })
    }

    /// Send a command to the scheduler. Returns an error if the channel is full
    /// or disconnected.
    pub fn send_command(&self, cmd: SchedulerCommand<M>) -> EngineResult<()> {
        self.command_tx.try_send(cmd).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => EngineError::ChannelFull,
            crossbeam_channel::TrySendError::Disconnected(_) => EngineError::ChannelDisconnected,
        })
    }

    fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand<M>,
    ) -> EngineResult<T> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(EngineError::BlockingInRuntime);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(make(reply_tx))?;
        reply_rx.blocking_recv().map_err(|_| EngineError::ReplyDropped)
    }

    async fn request_async<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SchedulerCommand<M>,
    ) -> EngineResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send_command(make(reply_tx))?;
        reply_rx.await.map_err(|_| EngineError::ReplyDropped)
    }

    pub async fn push_async(&self, message: M) -> Result<(), PushError> {
        self.push_delayed_async(message, Duration::ZERO).await
    }

    pub async fn push_delayed_async(&self, message: M, delay: Duration) -> Result<(), PushError> {
        self.request_async(|reply| SchedulerCommand::Push {
            message,
            delay,
            reply,
        })
        .await?
    }

    pub async fn poll_async(&self) -> Result<Option<Delivery<M>>, PollError> {
        self.request_async(|reply| SchedulerCommand::Poll { reply })
            .await?
    }

    pub async fn ack_async(&self, message: &M) -> Result<(), AckError> {
        self.ack_id_async(message.id()).await
    }

    pub async fn ack_id_async(&self, msg_id: MessageId) -> Result<(), AckError> {
        self.request_async(|reply| SchedulerCommand::Ack { msg_id, reply })
            .await?
    }

    pub async fn abandon_async(&self, delivery: &Delivery<M>) -> Result<(), AbandonError> {
        self.abandon_lease_async(delivery.message.id(), delivery.lease_token)
            .await
    }

    pub async fn abandon_lease_async(
        &self,
        msg_id: MessageId,
        lease_token: MessageId,
    ) -> Result<(), AbandonError> {
        self.request_async(|reply| SchedulerCommand::Abandon {
            msg_id,
            lease_token,
            reply,
        })
        .await?
    }

    pub async fn stats_async(&self) -> EngineResult<QueueStats> {
        self.request_async(|reply| SchedulerCommand::GetStats { reply })
            .await
    }

    /// Initiate graceful shutdown: send the shutdown command and wait for the
    /// scheduler thread to finish.
    #[tracing::instrument(skip_all, fields(queue = %self.queue))]
    pub fn shutdown(mut self) -> EngineResult<()> {
        info!("initiating queue engine shutdown");

        // Send shutdown command (ignore error if channel already closed)
        let _ = self.command_tx.send(SchedulerCommand::Shutdown);

        if let Some(handle) = self.scheduler_thread.take() {
            handle.join().map_err(|_| EngineError::SchedulerPanicked)?;
        }

        info!("queue engine shutdown complete");
        Ok(())
    }
}

impl<M> Queue<M> for QueueEngine<M>
where
    M: Message + Serialize + DeserializeOwned,
{
    fn push(&self, message: M) -> Result<(), PushError> {
        self.push_delayed(message, Duration::ZERO)
    }

    fn push_delayed(&self, message: M, delay: Duration) -> Result<(), PushError> {
        self.request(|reply| SchedulerCommand::Push {
            message,
            delay,
            reply,
        })?
    }

    fn poll(&self) -> Result<Option<Delivery<M>>, PollError> {
        self.request(|reply| SchedulerCommand::Poll { reply })?
    }

    fn ack(&self, message: &M) -> Result<(), AckError> {
        self.ack_id(message.id())
    }
}

impl<M> Drop for QueueEngine<M> {
    fn drop(&mut self) {
        // If shutdown wasn't called explicitly, attempt to stop the scheduler
        if let Some(handle) = self.scheduler_thread.take() {
            let _ = self.command_tx.send(SchedulerCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

use std::time::Duration;

use crate::engine::stats::QueueStats;
use crate::error::{AbandonError, AckError, PollError, PushError};
use crate::message::MessageId;

/// A message handed out by `poll`, together with the lease that now guards it.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<M> {
    pub message: M,
    /// Identifies this particular checkout. Only the holder of the current
    /// token can abandon the lease.
    pub lease_token: MessageId,
    /// How many times the message has been polled, this delivery included.
    pub attempt: u32,
    pub lease_expires_at_ns: u64,
}

impl<M> Delivery<M> {
    pub fn into_message(self) -> M {
        self.message
    }
}

/// Commands sent from caller threads to the single-threaded scheduler core.
///
/// Each variant that expects a response includes a `tokio::sync::oneshot::Sender`
/// for the reply.
pub enum SchedulerCommand<M> {
    Push {
        message: M,
        /// `Duration::ZERO` means visible immediately.
        delay: Duration,
        reply: tokio::sync::oneshot::Sender<Result<(), PushError>>,
    },
    Poll {
        reply: tokio::sync::oneshot::Sender<Result<Option<Delivery<M>>, PollError>>,
    },
    Ack {
        msg_id: MessageId,
        reply: tokio::sync::oneshot::Sender<Result<(), AckError>>,
    },
    Abandon {
        msg_id: MessageId,
        lease_token: MessageId,
        reply: tokio::sync::oneshot::Sender<Result<(), AbandonError>>,
    },
    GetStats {
        reply: tokio::sync::oneshot::Sender<QueueStats>,
    },
    Shutdown,
}

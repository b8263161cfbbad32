use crate::message::MessageId;

/// Low-level storage errors (RocksDB, serialization, corrupt keys).
/// This is the error type for the `Storage` trait: storage operations can only
/// fail with infrastructure errors, never domain errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("rocksdb error: {0}")]
    RocksDb(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        StorageError::RocksDb(err.into_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors talking to the scheduler thread itself, independent of the command.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to recover queue state: {0}")]
    Recovery(#[source] StorageError),

    #[error("failed to spawn scheduler thread: {0}")]
    SchedulerSpawn(String),

    #[error("scheduler command channel full")]
    ChannelFull,

    #[error("scheduler command channel disconnected")]
    ChannelDisconnected,

    #[error("scheduler dropped the reply channel")]
    ReplyDropped,

    /// A blocking method was called from inside a tokio runtime, where
    /// waiting on the reply would stall the executor.
    #[error("blocking queue call made inside an async runtime, use the async methods")]
    BlockingInRuntime,

    #[error("scheduler thread panicked")]
    SchedulerPanicked,
}

/// Where an already-known message id currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Ready,
    Delayed,
    Leased,
    Completed,
}

impl std::fmt::Display for MessageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageState::Ready => "ready",
            MessageState::Delayed => "delayed",
            MessageState::Leased => "leased",
            MessageState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Push rejects ids the queue has already seen, whatever state they are in.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("duplicate message {id}: already {state}")]
    Duplicate { id: MessageId, state: MessageState },

    /// The message serializes to a value it cannot be read back from, so it
    /// could never be delivered.
    #[error("message {id} does not round-trip through storage: {reason}")]
    Undecodable { id: MessageId, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// An empty queue is `Ok(None)`, never an error.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Acking an id without an active lease succeeds, so only infrastructure
/// failures are represented here.
#[derive(Debug, thiserror::Error)]
pub enum AckError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, thiserror::Error)]
pub enum AbandonError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;

//! Durable, delay-capable work queue with lease-based redelivery.
//!
//! Producers [`push`](Queue::push) messages for immediate or delayed
//! visibility; consumers [`poll`](Queue::poll) one at a time and must
//! [`ack`](Queue::ack) before their lease expires, otherwise the message is
//! handed out again.

pub mod clock;
pub mod engine;
pub mod error;
pub mod message;
pub mod queue;
pub mod storage;
pub mod telemetry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    CommandQueue, Delivery, EngineConfig, EventQueue, Queue, QueueEngine, QueueStats,
    SchedulerConfig, StorageConfig,
};
pub use error::{
    AbandonError, AckError, EngineError, MessageState, PollError, PushError, StorageError,
    StorageResult,
};
pub use message::{Command, Envelope, Event, Message, MessageId};
pub use queue::QueueConfig;
pub use storage::{MemoryStorage, Partition, RocksDbStorage, Storage, WriteBatchOp};

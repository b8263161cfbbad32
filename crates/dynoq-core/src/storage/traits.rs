use crate::error::StorageResult;

/// Named key/value partitions. Each maps to one RocksDB column family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    /// `{queue}:{msg_id}` → serialized `StoredMessage`.
    Messages,
    /// `{queue}:{visible_ts}:{seq}` → msg_id.
    Ready,
    /// `{queue}:{scheduled_ts}:{seq}` → msg_id.
    Delayed,
    /// `{queue}:{msg_id}` → `{token}:{expiry_ts}`.
    Leases,
    /// `{queue}:{expiry_ts}:{msg_id}` → empty. Expiry-ordered index over `Leases`.
    LeaseExpiry,
    /// `{queue}:{msg_id}` → completion timestamp.
    Completed,
    /// Free-form engine state such as the sequence counter.
    State,
}

impl Partition {
    pub const ALL: [Partition; 7] = [
        Partition::Messages,
        Partition::Ready,
        Partition::Delayed,
        Partition::Leases,
        Partition::LeaseExpiry,
        Partition::Completed,
        Partition::State,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Partition::Messages => "messages",
            Partition::Ready => "ready",
            Partition::Delayed => "delayed",
            Partition::Leases => "leases",
            Partition::LeaseExpiry => "lease_expiry",
            Partition::Completed => "completed",
            Partition::State => "state",
        }
    }
}

/// Represents a single operation in an atomic write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteBatchOp {
    Put {
        partition: Partition,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        partition: Partition,
        key: Vec<u8>,
    },
}

impl WriteBatchOp {
    pub fn put(partition: Partition, key: Vec<u8>, value: Vec<u8>) -> Self {
        WriteBatchOp::Put {
            partition,
            key,
            value,
        }
    }

    pub fn delete(partition: Partition, key: Vec<u8>) -> Self {
        WriteBatchOp::Delete { partition, key }
    }
}

/// Storage trait for all persistence operations. Implementations must be thread-safe.
///
/// Every state transition of the queue is expressed as one `write_batch`
/// that moves entries between partitions; a batch is applied completely or
/// not at all.
pub trait Storage: Send + Sync {
    /// Retrieve a value by key.
    fn get(&self, partition: Partition, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// List entries whose keys start with `prefix`, in lexicographic key order.
    fn list_prefix(&self, partition: Partition, prefix: &[u8])
        -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Atomically apply a batch of write operations across partitions.
    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()>;

    /// Make all previously written batches durable.
    fn flush(&self) -> StorageResult<()>;
}

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{Partition, Storage, WriteBatchOp};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-process storage. Nothing survives the process, but ordering and batch
/// atomicity match [`RocksDbStorage`](super::RocksDbStorage), so the engine
/// behaves identically on top of it.
#[derive(Default)]
pub struct MemoryStorage {
    partitions: Mutex<HashMap<Partition, Tree>>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every read and write fails with
    /// [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of entries currently stored in `partition`.
    pub fn len(&self, partition: Partition) -> usize {
        self.partitions
            .lock()
            .map(|p| p.get(&partition).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory storage offline".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<Partition, Tree>>> {
        self.partitions
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn get(&self, partition: Partition, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.check_available()?;
        let partitions = self.lock()?;
        Ok(partitions.get(&partition).and_then(|tree| tree.get(key).cloned()))
    }

    fn list_prefix(
        &self,
        partition: Partition,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_available()?;
        let partitions = self.lock()?;
        let Some(tree) = partitions.get(&partition) else {
            return Ok(Vec::new());
        };
        Ok(tree
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()> {
        self.check_available()?;
        let mut partitions = self.lock()?;
        for op in ops {
            match op {
                WriteBatchOp::Put {
                    partition,
                    key,
                    value,
                } => {
                    partitions.entry(partition).or_default().insert(key, value);
                }
                WriteBatchOp::Delete { partition, key } => {
                    if let Some(tree) = partitions.get_mut(&partition) {
                        tree.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.check_available()
    }
}

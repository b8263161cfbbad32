use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crate::error::{StorageError, StorageResult};
use crate::storage::traits::{Partition, Storage, WriteBatchOp};

type DB = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed storage implementation. One column family per [`Partition`].
pub struct RocksDbStorage {
    db: DB,
}

impl RocksDbStorage {
    /// Open or create a RocksDB database at the given path with all column families.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Partition::ALL
            .iter()
            .map(|partition| ColumnFamilyDescriptor::new(partition.name(), Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf(&self, partition: Partition) -> StorageResult<Arc<BoundColumnFamily<'_>>> {
        self.db.cf_handle(partition.name()).ok_or_else(|| {
            StorageError::RocksDb(format!("column family not found: {}", partition.name()))
        })
    }
}

impl Storage for RocksDbStorage {
    fn get(&self, partition: Partition, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let cf = self.cf(partition)?;
        Ok(self.db.get_cf(&cf, key)?)
    }

    fn list_prefix(
        &self,
        partition: Partition,
        prefix: &[u8],
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(partition)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()> {
        let mut batch = WriteBatch::default();

        for op in ops {
            match op {
                WriteBatchOp::Put {
                    partition,
                    key,
                    value,
                } => {
                    let cf = self.cf(partition)?;
                    batch.put_cf(&cf, &key, &value);
                }
                WriteBatchOp::Delete { partition, key } => {
                    let cf = self.cf(partition)?;
                    batch.delete_cf(&cf, &key);
                }
            }
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush_wal(true)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageId;
    use crate::storage::keys;

    fn test_storage() -> (RocksDbStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();
        (storage, dir)
    }

    #[test]
    fn open_creates_all_column_families() {
        let (storage, _dir) = test_storage();
        for partition in Partition::ALL {
            assert!(
                storage.db.cf_handle(partition.name()).is_some(),
                "column family '{}' should exist",
                partition.name()
            );
        }
    }

    #[test]
    fn put_get_delete() {
        let (storage, _dir) = test_storage();
        let id = MessageId::new();
        let key = keys::message_key("q1", &id);

        storage
            .write_batch(vec![WriteBatchOp::put(
                Partition::Messages,
                key.clone(),
                b"body".to_vec(),
            )])
            .unwrap();
        assert_eq!(
            storage.get(Partition::Messages, &key).unwrap(),
            Some(b"body".to_vec())
        );
        // Partitions are independent namespaces.
        assert!(storage.get(Partition::Leases, &key).unwrap().is_none());

        storage
            .write_batch(vec![WriteBatchOp::delete(Partition::Messages, key.clone())])
            .unwrap();
        assert!(storage.get(Partition::Messages, &key).unwrap().is_none());
    }

    #[test]
    fn list_prefix_stays_within_queue() {
        let (storage, _dir) = test_storage();
        storage
            .write_batch(vec![
                WriteBatchOp::put(Partition::Ready, keys::schedule_key("q1", 2, 1), vec![2]),
                WriteBatchOp::put(Partition::Ready, keys::schedule_key("q1", 1, 0), vec![1]),
                WriteBatchOp::put(Partition::Ready, keys::schedule_key("q2", 0, 0), vec![3]),
            ])
            .unwrap();

        let q1 = storage
            .list_prefix(Partition::Ready, &keys::queue_prefix("q1"))
            .unwrap();
        let values: Vec<Vec<u8>> = q1.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![vec![1], vec![2]], "sorted by timestamp");
    }

    #[test]
    fn lease_expiry_scan_is_expiry_ordered() {
        let (storage, _dir) = test_storage();
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        let id3 = MessageId::new();
        let ek1 = keys::lease_expiry_key("q1", 1000, &id1);
        let ek2 = keys::lease_expiry_key("q1", 2000, &id2);
        let ek3 = keys::lease_expiry_key("q1", 5000, &id3);

        storage
            .write_batch(vec![
                WriteBatchOp::put(Partition::LeaseExpiry, ek3.clone(), vec![]),
                WriteBatchOp::put(Partition::LeaseExpiry, ek1.clone(), vec![]),
                WriteBatchOp::put(Partition::LeaseExpiry, ek2.clone(), vec![]),
            ])
            .unwrap();

        let scanned: Vec<Vec<u8>> = storage
            .list_prefix(Partition::LeaseExpiry, &keys::queue_prefix("q1"))
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(scanned, vec![ek1, ek2, ek3]);
    }

    #[test]
    fn write_batch_moves_entry_between_partitions() {
        let (storage, _dir) = test_storage();
        let id = MessageId::new();
        let ready_key = keys::schedule_key("q1", 10, 0);
        let lease_key = keys::message_key("q1", &id);

        storage
            .write_batch(vec![WriteBatchOp::put(
                Partition::Ready,
                ready_key.clone(),
                keys::encode_id(&id),
            )])
            .unwrap();

        storage
            .write_batch(vec![
                WriteBatchOp::delete(Partition::Ready, ready_key.clone()),
                WriteBatchOp::put(
                    Partition::Leases,
                    lease_key.clone(),
                    keys::lease_value(&MessageId::new(), 99),
                ),
            ])
            .unwrap();

        assert!(storage.get(Partition::Ready, &ready_key).unwrap().is_none());
        assert!(storage.get(Partition::Leases, &lease_key).unwrap().is_some());
    }

    #[test]
    fn reopen_preserves_data() {
        let dir = tempfile::tempdir().unwrap();
        let key = keys::sequence_key("persistent");

        {
            let storage = RocksDbStorage::open(dir.path()).unwrap();
            storage
                .write_batch(vec![WriteBatchOp::put(
                    Partition::State,
                    key.clone(),
                    keys::encode_ts(41),
                )])
                .unwrap();
            storage.flush().unwrap();
        }

        {
            let storage = RocksDbStorage::open(dir.path()).unwrap();
            let value = storage.get(Partition::State, &key).unwrap().unwrap();
            assert_eq!(keys::parse_ts(&value).unwrap(), 41);
        }
    }
}

//! Key encoding for the storage partitions.
//!
//! All numeric values use big-endian encoding for correct lexicographic ordering.
//! Composite keys use `:` (0x3A) as separator.
//! The queue name is length-prefixed with a big-endian u16 so that one queue's
//! prefix can never be a prefix of another queue's keys.

use crate::error::{StorageError, StorageResult};
use crate::message::MessageId;

const SEPARATOR: u8 = b':';
const SEQUENCE_STATE: &[u8] = b"seq";

/// Encode a u64 as 8 big-endian bytes.
fn encode_u64(val: u64) -> [u8; 8] {
    val.to_be_bytes()
}

fn decode_u64(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(arr))
}

fn decode_id(bytes: &[u8]) -> Option<MessageId> {
    let arr: [u8; 16] = bytes.try_into().ok()?;
    Some(MessageId::from_bytes(arr))
}

/// Prefix shared by every key belonging to `queue`: `{len}{queue}:`.
///
/// Queue names are capped at 64 KiB by the u16 length prefix; longer names are
/// truncated, which config validation rules out in practice.
pub fn queue_prefix(queue: &str) -> Vec<u8> {
    let bytes = queue.as_bytes();
    let len = bytes.len().min(u16::MAX as usize);
    let mut prefix = Vec::with_capacity(3 + len);
    prefix.extend_from_slice(&(len as u16).to_be_bytes());
    prefix.extend_from_slice(&bytes[..len]);
    prefix.push(SEPARATOR);
    prefix
}

/// `{queue}:{msg_id}`, used by the messages, leases and completed partitions.
pub fn message_key(queue: &str, id: &MessageId) -> Vec<u8> {
    let mut key = queue_prefix(queue);
    key.extend_from_slice(id.as_bytes());
    key
}

/// `{queue}:{ts}:{seq}`, used by the ready and delayed partitions. Sorting by
/// key gives (visible time, sequence) order.
pub fn schedule_key(queue: &str, ts_ns: u64, seq: u64) -> Vec<u8> {
    let mut key = queue_prefix(queue);
    key.extend_from_slice(&encode_u64(ts_ns));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_u64(seq));
    key
}

/// `{queue}:{expiry_ts}:{msg_id}`, timestamp-first so the reaper can scan
/// from the earliest expiry.
pub fn lease_expiry_key(queue: &str, expiry_ns: u64, id: &MessageId) -> Vec<u8> {
    let mut key = queue_prefix(queue);
    key.extend_from_slice(&encode_u64(expiry_ns));
    key.push(SEPARATOR);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Key of the persisted sequence counter in the state partition.
pub fn sequence_key(queue: &str) -> Vec<u8> {
    let mut key = queue_prefix(queue);
    key.extend_from_slice(SEQUENCE_STATE);
    key
}

/// Encode a lease value: `{token}:{expiry_ts_ns}`.
pub fn lease_value(token: &MessageId, expiry_ns: u64) -> Vec<u8> {
    let mut val = Vec::with_capacity(25);
    val.extend_from_slice(token.as_bytes());
    val.push(SEPARATOR);
    val.extend_from_slice(&encode_u64(expiry_ns));
    val
}

pub fn encode_id(id: &MessageId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

pub fn encode_ts(ts_ns: u64) -> Vec<u8> {
    encode_u64(ts_ns).to_vec()
}

fn strip_queue<'a>(queue: &str, key: &'a [u8]) -> StorageResult<&'a [u8]> {
    let prefix = queue_prefix(queue);
    key.strip_prefix(prefix.as_slice())
        .ok_or_else(|| StorageError::CorruptData(format!("key outside queue {queue}")))
}

/// Split a schedule key into `(ts_ns, seq)`.
pub fn parse_schedule_key(queue: &str, key: &[u8]) -> StorageResult<(u64, u64)> {
    let rest = strip_queue(queue, key)?;
    if rest.len() != 17 || rest[8] != SEPARATOR {
        return Err(StorageError::CorruptData("malformed schedule key".to_string()));
    }
    match (decode_u64(&rest[..8]), decode_u64(&rest[9..])) {
        (Some(ts), Some(seq)) => Ok((ts, seq)),
        _ => Err(StorageError::CorruptData("malformed schedule key".to_string())),
    }
}

/// Split a lease expiry key into `(expiry_ns, msg_id)`.
pub fn parse_lease_expiry_key(queue: &str, key: &[u8]) -> StorageResult<(u64, MessageId)> {
    let rest = strip_queue(queue, key)?;
    if rest.len() != 25 || rest[8] != SEPARATOR {
        return Err(StorageError::CorruptData("malformed lease expiry key".to_string()));
    }
    match (decode_u64(&rest[..8]), decode_id(&rest[9..])) {
        (Some(expiry), Some(id)) => Ok((expiry, id)),
        _ => Err(StorageError::CorruptData("malformed lease expiry key".to_string())),
    }
}

/// Extract the message id from a `{queue}:{msg_id}` key.
pub fn parse_message_key(queue: &str, key: &[u8]) -> StorageResult<MessageId> {
    let rest = strip_queue(queue, key)?;
    decode_id(rest).ok_or_else(|| StorageError::CorruptData("malformed message key".to_string()))
}

/// Split a lease value into `(token, expiry_ns)`.
pub fn parse_lease_value(value: &[u8]) -> StorageResult<(MessageId, u64)> {
    if value.len() != 25 || value[16] != SEPARATOR {
        return Err(StorageError::CorruptData("malformed lease value".to_string()));
    }
    match (decode_id(&value[..16]), decode_u64(&value[17..])) {
        (Some(token), Some(expiry)) => Ok((token, expiry)),
        _ => Err(StorageError::CorruptData("malformed lease value".to_string())),
    }
}

pub fn parse_id(value: &[u8]) -> StorageResult<MessageId> {
    decode_id(value).ok_or_else(|| StorageError::CorruptData("malformed message id".to_string()))
}

pub fn parse_ts(value: &[u8]) -> StorageResult<u64> {
    decode_u64(value).ok_or_else(|| StorageError::CorruptData("malformed timestamp".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_u64_lexicographic_order() {
        assert!(encode_u64(100) < encode_u64(200));
        assert!(encode_u64(0) < encode_u64(u64::MAX));
        assert!(encode_u64(1_000_000_000) < encode_u64(1_000_000_001));
    }

    #[test]
    fn schedule_keys_sort_by_time_then_sequence() {
        let early = schedule_key("q", 1_000, 9);
        let late = schedule_key("q", 2_000, 1);
        assert!(early < late, "earlier timestamp should sort first");

        let first = schedule_key("q", 1_000, 1);
        let second = schedule_key("q", 1_000, 2);
        assert!(first < second, "sequence breaks timestamp ties");
    }

    #[test]
    fn schedule_key_parses_back() {
        let key = schedule_key("orca", 42, 7);
        assert_eq!(parse_schedule_key("orca", &key).unwrap(), (42, 7));
    }

    #[test]
    fn lease_expiry_keys_sort_by_timestamp() {
        let id = MessageId::new();
        let early = lease_expiry_key("q", 1_000, &id);
        let late = lease_expiry_key("q", 2_000, &id);
        assert!(early < late);
    }

    #[test]
    fn lease_expiry_key_parses_back() {
        let id = MessageId::new();
        let key = lease_expiry_key("q", 99, &id);
        assert_eq!(parse_lease_expiry_key("q", &key).unwrap(), (99, id));
    }

    #[test]
    fn lease_value_parses_back() {
        let token = MessageId::new();
        let value = lease_value(&token, 5_000_000_000);
        assert_eq!(parse_lease_value(&value).unwrap(), (token, 5_000_000_000));
    }

    #[test]
    fn queue_prefixes_dont_collide() {
        let id = MessageId::new();
        let short = message_key("q", &id);
        let long = message_key("qq", &id);
        assert!(!long.starts_with(&queue_prefix("q")));
        assert!(short.starts_with(&queue_prefix("q")));
    }

    #[test]
    fn parse_rejects_foreign_queue() {
        let key = schedule_key("commands", 1, 1);
        assert!(matches!(
            parse_schedule_key("events", &key),
            Err(StorageError::CorruptData(_))
        ));
    }

    #[test]
    fn parse_rejects_truncated_value() {
        assert!(parse_lease_value(&[0u8; 10]).is_err());
        assert!(parse_id(&[0u8; 3]).is_err());
    }
}

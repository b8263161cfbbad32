use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique, immutable message identifier.
///
/// Backed by a UUIDv7 so ids minted by one producer sort by creation time,
/// although the queue never relies on that for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new UUIDv7 message ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for MessageId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<MessageId> for Uuid {
    fn from(id: MessageId) -> Self {
        id.0
    }
}

impl std::str::FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Anything the queue can carry. The engine only ever looks at the id; the
/// rest of the value is serialized into storage untouched.
pub trait Message: Send + 'static {
    fn id(&self) -> MessageId;
}

/// A unit of work asking the orchestrator to perform an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    pub id: MessageId,
    pub kind: String,
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
}

impl Command {
    pub fn new(kind: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: MessageId::new(),
            kind: kind.into(),
            headers: HashMap::new(),
            payload: payload.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl Message for Command {
    fn id(&self) -> MessageId {
        self.id
    }
}

/// A report that some action has completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: MessageId,
    pub kind: String,
    pub headers: HashMap<String, String>,
    pub payload: Vec<u8>,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: MessageId::new(),
            kind: kind.into(),
            headers: HashMap::new(),
            payload: payload.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl Message for Event {
    fn id(&self) -> MessageId {
        self.id
    }
}

/// Either kind of message, for queues that carry both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Command(Command),
    Event(Event),
}

impl Envelope {
    pub fn kind(&self) -> &str {
        match self {
            Envelope::Command(c) => &c.kind,
            Envelope::Event(e) => &e.kind,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Envelope::Command(c) => &c.payload,
            Envelope::Event(e) => &e.payload,
        }
    }
}

impl Message for Envelope {
    fn id(&self) -> MessageId {
        match self {
            Envelope::Command(c) => c.id,
            Envelope::Event(e) => e.id,
        }
    }
}

impl From<Command> for Envelope {
    fn from(command: Command) -> Self {
        Envelope::Command(command)
    }
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        Envelope::Event(event)
    }
}

/// Per-message bookkeeping persisted next to the serialized body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct StoredMessage {
    pub id: MessageId,
    pub body: serde_json::Value,
    pub enqueued_at: u64,
    pub attempt_count: u32,
}

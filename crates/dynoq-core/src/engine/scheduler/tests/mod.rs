use super::*;
use crate::clock::ManualClock;
use crate::engine::config::SchedulerConfig;
use crate::error::{PushError, StorageError};
use crate::message::{Command, Envelope, Event};
use crate::storage::{MemoryStorage, RocksDbStorage};

mod common;
use common::*;

mod stats;

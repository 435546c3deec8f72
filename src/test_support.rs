//! Host doubles for the store, flash and action queue capabilities.

use std::{
    collections::BTreeMap,
    string::{String, ToString},
    vec,
    vec::Vec,
};

use embedded_storage::{ReadStorage, Storage};

use crate::{
    dispatch::{ActionEvent, ActionQueue, QueueError},
    error::PersistError,
    storage::KvStore,
};

#[derive(Default)]
pub struct MemoryStore {
    pub entries: BTreeMap<String, Vec<u8>>,
    pub saves: usize,
    pub fail_saves: bool,
    /// Fail every save after this many succeeded.
    pub fail_after: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, blob: &[u8]) -> Self {
        self.entries.insert(key.to_string(), blob.to_vec());
        self
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }
}

impl KvStore for MemoryStore {
    fn save(&mut self, key: &str, blob: &[u8]) -> Result<(), PersistError> {
        self.saves += 1;
        if self.fail_saves || self.fail_after.is_some_and(|limit| self.saves > limit) {
            return Err(PersistError::Store);
        }
        self.entries.insert(key.to_string(), blob.to_vec());
        Ok(())
    }

    fn load_all(&mut self, visit: &mut dyn FnMut(&str, &[u8])) -> Result<(), PersistError> {
        for (key, blob) in &self.entries {
            visit(key, blob);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RamFlashError;

/// Byte-addressed flash image that starts erased.
pub struct RamFlash {
    pub bytes: Vec<u8>,
}

impl RamFlash {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0xFF; capacity],
        }
    }
}

impl ReadStorage for RamFlash {
    type Error = RamFlashError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        let source = self.bytes.get(start..end).ok_or(RamFlashError)?;
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for RamFlash {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        let target = self.bytes.get_mut(start..end).ok_or(RamFlashError)?;
        target.copy_from_slice(bytes);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub events: Vec<ActionEvent>,
    /// Refuse every event once this many were accepted.
    pub accept_limit: Option<usize>,
    pub unresolved: bool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_after(limit: usize) -> Self {
        Self {
            accept_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn unresolved() -> Self {
        Self {
            unresolved: true,
            ..Self::default()
        }
    }

    pub fn presses(&self) -> usize {
        self.events.iter().filter(|event| event.pressed).count()
    }

    pub fn releases(&self) -> usize {
        self.events.iter().filter(|event| !event.pressed).count()
    }
}

impl ActionQueue for RecordingQueue {
    fn enqueue(&mut self, event: ActionEvent) -> Result<(), QueueError> {
        if self.unresolved {
            return Err(QueueError::UnresolvedAction);
        }
        if self
            .accept_limit
            .is_some_and(|limit| self.events.len() >= limit)
        {
            return Err(QueueError::Rejected);
        }
        self.events.push(event);
        Ok(())
    }
}

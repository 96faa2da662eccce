//! Process table
//!
//! Ordered set of the children believed to be alive. Position 0 is the most
//! recently launched child. Entries are owned here; callers get short-lived
//! borrows through `peek`/`iter` or take ownership through `remove_at`.

use super::models::TrackedProcess;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("position {position} is out of range for a table of {len} entries")]
    OutOfRange { position: usize, len: usize },
    #[error("no entry at position {0}")]
    NotFound(usize),
    #[error("pid {0} is already tracked")]
    DuplicatePid(u32),
}

#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: Vec<TrackedProcess>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` at `position` (0 = front)
    pub fn insert(&mut self, entry: TrackedProcess, position: usize) -> Result<(), TableError> {
        if position > self.entries.len() {
            return Err(TableError::OutOfRange {
                position,
                len: self.entries.len(),
            });
        }
        if self.position_of(entry.pid).is_some() {
            return Err(TableError::DuplicatePid(entry.pid));
        }
        self.entries.insert(position, entry);
        Ok(())
    }

    /// First position whose entry satisfies `predicate`
    pub fn find<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&TrackedProcess) -> bool,
    {
        self.entries.iter().position(predicate)
    }

    pub fn position_of(&self, pid: u32) -> Option<usize> {
        self.find(|entry| entry.pid == pid)
    }

    pub fn peek(&self, position: usize) -> Result<&TrackedProcess, TableError> {
        self.entries.get(position).ok_or(TableError::NotFound(position))
    }

    /// Detach the entry at `position` and hand it to the caller
    pub fn remove_at(&mut self, position: usize) -> Result<TrackedProcess, TableError> {
        if position >= self.entries.len() {
            return Err(TableError::NotFound(position));
        }
        Ok(self.entries.remove(position))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedProcess> {
        self.entries.iter()
    }

    pub fn pids(&self) -> Vec<u32> {
        self.entries.iter().map(|entry| entry.pid).collect()
    }
}

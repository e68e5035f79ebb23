use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::{Result, RsfsError};
use crate::node::InodeNumber;

/// Binds a name in the flat namespace to the inode holding its contents.
#[derive(Debug, PartialEq, Eq)]
pub struct DirEntry {
    name: String,
    inode: InodeNumber,
}

impl DirEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inode(&self) -> InodeNumber {
        self.inode
    }
}

/// The single root directory.
///
/// Entries are kept in insertion order for listings. Lookups by name go through
/// a separate name index. The directory does no locking of its own; the engine
/// keeps it behind one mutex so search-then-insert sequences are atomic.
#[derive(Debug, Default)]
pub struct Directory {
    /// Insertion sequence number to entry.
    entries: BTreeMap<u64, Arc<DirEntry>>,
    names: HashMap<String, u64>,
    next_seq: u64,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&self, name: &str) -> Option<Arc<DirEntry>> {
        self.names
            .get(name)
            .and_then(|seq| self.entries.get(seq))
            .cloned()
    }

    /// Appends a new entry.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if `name` is taken; the directory is unchanged.
    pub fn insert(&mut self, name: &str, inode: InodeNumber) -> Result<Arc<DirEntry>> {
        if self.names.contains_key(name) {
            return Err(RsfsError::AlreadyExists);
        }
        let entry = Arc::new(DirEntry {
            name: name.to_string(),
            inode,
        });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.names.insert(entry.name.clone(), seq);
        self.entries.insert(seq, Arc::clone(&entry));
        Ok(entry)
    }

    /// Removes the entry for `name` and hands it back.
    pub fn delete(&mut self, name: &str) -> Option<Arc<DirEntry>> {
        let seq = self.names.remove(name)?;
        self.entries.remove(&seq)
    }

    /// Entries in the order they were created.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DirEntry>> {
        self.entries.values()
    }
}

use std::convert::TryFrom;
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

use crate::alloc::{Bitmap, State};
use crate::dir::DirEntry;
use crate::error::{Result, RsfsError};
use crate::node::InodeNumber;

/// Index of a slot in the open file table.
pub type FileDescriptor = usize;

pub const RSFS_RDONLY: i32 = 0;
pub const RSFS_RDWR: i32 = 1;

pub const RSFS_SEEK_SET: i32 = 0;
pub const RSFS_SEEK_CUR: i32 = 1;
pub const RSFS_SEEK_END: i32 = 2;

// Encodes open call options http://man7.org/linux/man-pages/man2/open.2.html.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl TryFrom<i32> for AccessMode {
    type Error = RsfsError;

    fn try_from(flag: i32) -> Result<Self> {
        match flag {
            RSFS_RDONLY => Ok(AccessMode::ReadOnly),
            RSFS_RDWR => Ok(AccessMode::ReadWrite),
            _ => Err(RsfsError::invalid(format!("unknown access flag {}", flag))),
        }
    }
}

/// Base a seek offset is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl TryFrom<i32> for Whence {
    type Error = RsfsError;

    fn try_from(whence: i32) -> Result<Self> {
        match whence {
            RSFS_SEEK_SET => Ok(Whence::Set),
            RSFS_SEEK_CUR => Ok(Whence::Cur),
            RSFS_SEEK_END => Ok(Whence::End),
            _ => Err(RsfsError::invalid(format!("unknown whence {}", whence))),
        }
    }
}

/// An open session on a file.
#[derive(Debug)]
pub struct OpenFile {
    entry: Arc<DirEntry>,
    mode: AccessMode,
    /// Byte cursor. Never past the file's length.
    pub position: usize,
}

impl OpenFile {
    pub fn entry(&self) -> &DirEntry {
        &self.entry
    }

    pub fn inode(&self) -> InodeNumber {
        self.entry.inode()
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

/// Fixed array of descriptor slots.
///
/// Each slot has its own lock, held for the whole of a read, write or seek on
/// that descriptor. The `used` bitmap lock is taken for allocation and release
/// and is what makes the writer check and the slot claim one atomic step.
/// Lock order is always `used` then slot.
pub struct OpenFileTable {
    slots: Vec<Mutex<Option<OpenFile>>>,
    used: Mutex<Bitmap>,
}

impl OpenFileTable {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| Mutex::new(None)).collect(),
            used: Mutex::new(Bitmap::new(count)),
        }
    }

    /// Claims the lowest free slot for `entry` with its cursor at 0.
    ///
    /// A read-write request is refused with `Busy` if any open slot, in either
    /// mode, already refers to the same inode. Read-only requests are never
    /// refused on those grounds.
    pub fn allocate(&self, mode: AccessMode, entry: Arc<DirEntry>) -> Result<FileDescriptor> {
        let mut used = self.used.lock();

        if mode == AccessMode::ReadWrite && self.is_open_locked(&used, entry.inode()) {
            return Err(RsfsError::Busy);
        }

        let fd = match used.reserve_next() {
            Some(fd) => fd,
            None => {
                warn!("All {} open file slots are in use.", self.slots.len());
                return Err(RsfsError::TooManyOpenFiles);
            }
        };
        *self.slots[fd].lock() = Some(OpenFile {
            entry,
            mode,
            position: 0,
        });
        Ok(fd)
    }

    /// Releases the slot and drops its directory entry reference.
    pub fn free(&self, fd: FileDescriptor) -> Result<OpenFile> {
        let slot = self.slot(fd)?;
        let mut used = self.used.lock();
        if used.get(fd) == State::Free {
            return Err(RsfsError::invalid(format!("descriptor {} is not open", fd)));
        }
        let file = slot
            .lock()
            .take()
            .ok_or_else(|| RsfsError::invalid(format!("descriptor {} is not open", fd)))?;
        used.set_free(fd);
        Ok(file)
    }

    pub fn slot(&self, fd: FileDescriptor) -> Result<&Mutex<Option<OpenFile>>> {
        self.slots
            .get(fd)
            .ok_or_else(|| RsfsError::invalid(format!("descriptor {} out of range", fd)))
    }

    /// Whether any open descriptor refers to `inode`.
    pub fn is_open(&self, inode: InodeNumber) -> bool {
        let used = self.used.lock();
        self.is_open_locked(&used, inode)
    }

    fn is_open_locked(&self, used: &Bitmap, inode: InodeNumber) -> bool {
        used.used().any(|fd| {
            self.slots[fd]
                .lock()
                .as_ref()
                .map_or(false, |file| file.inode() == inode)
        })
    }

    pub fn open_count(&self) -> usize {
        self.used.lock().count_used()
    }
}

use std::cmp;
use std::convert::TryFrom;

use log::{debug, info, trace, warn};
use parking_lot::Mutex;

use crate::dir::Directory;
use crate::error::{Result, RsfsError};
use crate::file::{AccessMode, FileDescriptor, OpenFileTable, Whence};
use crate::geometry::Geometry;
use crate::io::{BlockStorage, MemoryBlockStore};
use crate::node::{InodeNumber, InodeTable};

/// One row of a status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub name: String,
    pub length: usize,
    pub inode: InodeNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub total: usize,
    pub used: usize,
}

impl Usage {
    pub fn unused(&self) -> usize {
        self.total - self.used
    }
}

/// Snapshot returned by [`Rsfs::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsStatus {
    /// Every file, in creation order.
    pub files: Vec<FileStatus>,
    pub blocks: Usage,
    pub inodes: Usage,
    pub open_files: usize,
}

/// An in-memory file system with a flat namespace.
///
/// # Layout
/// ===========================================================================
/// | Directory | Open file table | Inode table (+ bitmap) | Data blocks (+ bitmap) |
/// ===========================================================================
///
/// Every operation takes `&self`, so one instance is shared between threads
/// behind an `Arc`. Locks are taken in the order listed above (directory, then
/// open file table allocation, then a descriptor slot, then an inode, then the
/// block allocator or block contents) and never in reverse.
pub struct Rsfs<T: BlockStorage = MemoryBlockStore> {
    geometry: Geometry,
    dev: T,
    inodes: InodeTable,
    root_dir: Mutex<Directory>,
    open_files: OpenFileTable,
    /// Serializes status reports against each other only.
    stat_lock: Mutex<()>,
}

impl Rsfs<MemoryBlockStore> {
    /// Builds an empty file system with every block held in memory.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` if the geometry does not validate, and
    /// with `OutOfMemory` if a data block cannot be allocated. No file system
    /// is returned in either case.
    pub fn new(geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        let dev = MemoryBlockStore::new(geometry.block_size, geometry.data_blocks)?;
        Self::with_storage(dev, geometry)
    }
}

impl<T: BlockStorage> Rsfs<T> {
    /// Initializes the file system onto owned block storage. The storage must
    /// match the geometry and have nothing allocated.
    pub fn with_storage(dev: T, geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        if dev.block_size() != geometry.block_size || dev.block_count() != geometry.data_blocks {
            return Err(RsfsError::invalid(format!(
                "storage of {} x {} byte blocks does not match geometry of {} x {}",
                dev.block_count(),
                dev.block_size(),
                geometry.data_blocks,
                geometry.block_size
            )));
        }
        if dev.used_blocks() != 0 {
            return Err(RsfsError::invalid("storage already has allocated blocks"));
        }

        info!(
            "Initialized file system: {} blocks of {} bytes, {} inodes of {} pointers, {} open file slots.",
            geometry.data_blocks,
            geometry.block_size,
            geometry.inodes,
            geometry.pointers_per_inode,
            geometry.open_files
        );
        Ok(Rsfs {
            geometry,
            dev,
            inodes: InodeTable::new(geometry.inodes, geometry.pointers_per_inode),
            root_dir: Mutex::new(Directory::new()),
            open_files: OpenFileTable::new(geometry.open_files),
            stat_lock: Mutex::new(()),
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Creates an empty file.
    ///
    /// The inode is allocated before the name becomes visible, so running out
    /// of inodes leaves the directory exactly as it was.
    pub fn create(&self, name: &str) -> Result<()> {
        self.check_name(name)?;

        let mut root_dir = self.root_dir.lock();
        if root_dir.search(name).is_some() {
            debug!("File ({}) already exists.", name);
            return Err(RsfsError::AlreadyExists);
        }

        let inum = self.inodes.allocate()?;
        if let Err(err) = root_dir.insert(name, inum) {
            self.inodes.free(inum)?;
            return Err(err);
        }
        debug!("Created file ({}) with inode {}.", name, inum);
        Ok(())
    }

    /// Opens a descriptor on an existing file with its cursor at 0.
    ///
    /// Only one descriptor may open a file read-write, and only while no other
    /// descriptor has it open in any mode. Read-only opens are always allowed.
    pub fn open(&self, name: &str, mode: AccessMode) -> Result<FileDescriptor> {
        if name.is_empty() {
            return Err(RsfsError::invalid("file name is empty"));
        }

        // Held until the slot is claimed so a concurrent delete cannot slip in.
        let root_dir = self.root_dir.lock();
        let entry = root_dir.search(name).ok_or(RsfsError::NotFound)?;
        let fd = self.open_files.allocate(mode, entry)?;
        debug!("Opened file ({}) as descriptor {} ({:?}).", name, fd, mode);
        Ok(fd)
    }

    /// Reads up to `buf.len()` bytes from the descriptor's cursor and returns
    /// how many were copied. Reading at end of file returns 0.
    pub fn read(&self, fd: FileDescriptor, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(RsfsError::invalid("read size must be positive"));
        }

        let mut slot = self.open_files.slot(fd)?.lock();
        let file = slot.as_mut().ok_or_else(|| not_open(fd))?;
        let node = self.inodes.get(file.inode())?.read();

        let block_size = self.geometry.block_size;
        let mut bytes_read = 0;
        while bytes_read < buf.len() && file.position < node.length {
            let index = file.position / block_size;
            let offset = file.position % block_size;
            let blocknr = match node.block(index) {
                Some(blocknr) => blocknr,
                None => break,
            };
            let chunk = cmp::min(
                block_size - offset,
                cmp::min(buf.len() - bytes_read, node.length - file.position),
            );

            self.dev
                .read_block(blocknr, offset, &mut buf[bytes_read..bytes_read + chunk])?;
            trace!("Read {} bytes from block {} at offset {}.", chunk, blocknr, offset);
            file.position += chunk;
            bytes_read += chunk;
        }
        Ok(bytes_read)
    }

    /// Writes `buf` at the descriptor's cursor, binding new blocks as the file
    /// grows, and returns how many bytes were written.
    ///
    /// If blocks or index slots run out part way through, the bytes already
    /// copied stay written and the short count is returned. The call only
    /// fails for capacity when not a single byte could be written.
    pub fn write(&self, fd: FileDescriptor, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(RsfsError::invalid("write size must be positive"));
        }

        let mut slot = self.open_files.slot(fd)?.lock();
        let file = slot.as_mut().ok_or_else(|| not_open(fd))?;
        if file.mode() != AccessMode::ReadWrite {
            return Err(RsfsError::invalid(format!("descriptor {} is read-only", fd)));
        }
        let mut node = self.inodes.get(file.inode())?.write();

        let block_size = self.geometry.block_size;
        let mut bytes_written = 0;
        while bytes_written < buf.len() {
            let index = file.position / block_size;
            let offset = file.position % block_size;
            if index >= node.pointers() {
                if bytes_written == 0 {
                    return Err(RsfsError::FileTooLarge);
                }
                debug!("Short write on descriptor {}: file is full.", fd);
                break;
            }

            let blocknr = match node.block(index) {
                Some(blocknr) => blocknr,
                None => match self.dev.allocate_block() {
                    Ok(blocknr) => {
                        node.bind(index, blocknr);
                        blocknr
                    }
                    Err(_) if bytes_written > 0 => {
                        debug!("Short write on descriptor {}: out of blocks.", fd);
                        break;
                    }
                    Err(err) => return Err(err),
                },
            };
            let chunk = cmp::min(block_size - offset, buf.len() - bytes_written);

            self.dev
                .write_block(blocknr, offset, &buf[bytes_written..bytes_written + chunk])?;
            trace!("Wrote {} bytes to block {} at offset {}.", chunk, blocknr, offset);
            file.position += chunk;
            bytes_written += chunk;
            node.length = cmp::max(node.length, file.position);
        }
        Ok(bytes_written)
    }

    /// Moves the cursor and returns its new position.
    ///
    /// The result must land within `0..=length`; anything else is rejected and
    /// the cursor stays where it was.
    pub fn fseek(&self, fd: FileDescriptor, offset: i64, whence: Whence) -> Result<usize> {
        let mut slot = self.open_files.slot(fd)?.lock();
        let file = slot.as_mut().ok_or_else(|| not_open(fd))?;
        let length = self.inodes.get(file.inode())?.read().length;

        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => file.position,
            Whence::End => length,
        };
        let position = i64::try_from(base)
            .ok()
            .and_then(|base| base.checked_add(offset))
            .ok_or_else(|| RsfsError::invalid("seek position overflows"))?;
        let position = match usize::try_from(position) {
            Ok(position) if position <= length => position,
            _ => {
                return Err(RsfsError::invalid(format!(
                    "position {} outside file of {} bytes",
                    position, length
                )))
            }
        };

        file.position = position;
        Ok(position)
    }

    pub fn close(&self, fd: FileDescriptor) -> Result<()> {
        let file = self.open_files.free(fd)?;
        debug!("Closed descriptor {} on file ({}).", fd, file.entry().name());
        Ok(())
    }

    /// Removes a file and releases its blocks and inode.
    ///
    /// A file that still has an open descriptor is not deleted; the call fails
    /// with `Busy` and nothing changes.
    pub fn delete(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(RsfsError::invalid("file name is empty"));
        }

        let mut root_dir = self.root_dir.lock();
        let entry = root_dir.search(name).ok_or(RsfsError::NotFound)?;
        if self.open_files.is_open(entry.inode()) {
            debug!("File ({}) is open, refusing to delete.", name);
            return Err(RsfsError::Busy);
        }

        // Blocks go back before the inode so a recycled inode never points at them.
        let blocks = self.inodes.get(entry.inode())?.write().take_blocks();
        for blocknr in blocks {
            self.dev.free_block(blocknr)?;
        }
        self.inodes.free(entry.inode())?;
        root_dir.delete(name);
        debug!("Deleted file ({}), released inode {}.", name, entry.inode());
        Ok(())
    }

    /// Reports every file and how much of each pool is in use.
    pub fn stat(&self) -> FsStatus {
        let _guard = self.stat_lock.lock();

        let files = self
            .root_dir
            .lock()
            .iter()
            .map(|entry| {
                let length = match self.inodes.get(entry.inode()) {
                    Ok(node) => node.read().length,
                    Err(_) => {
                        warn!(
                            "Directory entry ({}) points at missing inode {}.",
                            entry.name(),
                            entry.inode()
                        );
                        0
                    }
                };
                FileStatus {
                    name: entry.name().to_string(),
                    length,
                    inode: entry.inode(),
                }
            })
            .collect();

        FsStatus {
            files,
            blocks: Usage {
                total: self.dev.block_count(),
                used: self.dev.used_blocks(),
            },
            inodes: Usage {
                total: self.inodes.total_nodes(),
                used: self.inodes.used_nodes(),
            },
            open_files: self.open_files.open_count(),
        }
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(RsfsError::invalid("file name is empty"));
        }
        if name.len() > self.geometry.max_name_len {
            return Err(RsfsError::invalid(format!(
                "file name longer than {} bytes",
                self.geometry.max_name_len
            )));
        }
        Ok(())
    }
}

fn not_open(fd: FileDescriptor) -> RsfsError {
    RsfsError::invalid(format!("descriptor {} is not open", fd))
}

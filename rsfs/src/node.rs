use log::{trace, warn};
use parking_lot::{Mutex, RwLock};

use crate::alloc::{Bitmap, State};
use crate::error::{Result, RsfsError};
use crate::io::BlockNumber;

/// Index of an inode record in the inode table.
pub type InodeNumber = usize;

/// Describes where a file's bytes live.
///
/// `blocks` is a single level index: slot `i` holds the data block storing
/// bytes `i * block_size .. (i + 1) * block_size`. Slots fill contiguously from
/// 0 as the file grows, so the first `None` marks the end of the file's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
  /// The total size of the file in bytes.
  pub length: usize,
  blocks: Box<[Option<BlockNumber>]>,
}

impl Inode {
  fn new(pointers: usize) -> Self {
    Self {
      length: 0,
      blocks: vec![None; pointers].into_boxed_slice(),
    }
  }

  /// The data block bound at index slot `index`, if any. Slots past the end
  /// of the array read as unbound.
  pub fn block(&self, index: usize) -> Option<BlockNumber> {
    self.blocks.get(index).copied().flatten()
  }

  /// Binds `blocknr` into slot `index`. The slot must be unbound and every
  /// slot before it bound.
  pub fn bind(&mut self, index: usize, blocknr: BlockNumber) {
    debug_assert!(self.blocks[index].is_none(), "slot {} already bound", index);
    debug_assert!(index == 0 || self.blocks[index - 1].is_some(), "gap before slot {}", index);
    self.blocks[index] = Some(blocknr);
  }

  /// Length of the index array.
  pub fn pointers(&self) -> usize {
    self.blocks.len()
  }

  /// Unbinds every data block, returning them in slot order. The length is
  /// left alone; releasing the blocks is the caller's job.
  pub fn take_blocks(&mut self) -> Vec<BlockNumber> {
    self.blocks.iter_mut().filter_map(Option::take).collect()
  }

  pub fn bound_blocks(&self) -> usize {
    self.blocks.iter().filter(|b| b.is_some()).count()
  }

  fn reset(&mut self) {
    self.length = 0;
    self.blocks.iter_mut().for_each(|b| *b = None);
  }
}

/// The fixed array of inode records plus the bitmap saying which are live.
///
/// Each record has its own reader-writer lock: readers of a file share it while
/// a writer growing the file holds it exclusively. The bitmap lock only guards
/// which records are handed out.
pub struct InodeTable {
  nodes: Vec<RwLock<Inode>>,
  alloc_tracker: Mutex<Bitmap>,
}

impl InodeTable {
  pub fn new(count: usize, pointers: usize) -> Self {
    Self {
      nodes: (0..count).map(|_| RwLock::new(Inode::new(pointers))).collect(),
      alloc_tracker: Mutex::new(Bitmap::new(count)),
    }
  }

  pub fn allocate(&self) -> Result<InodeNumber> {
    match self.alloc_tracker.lock().reserve_next() {
      Some(inum) => {
        trace!("Allocated inode {}.", inum);
        Ok(inum)
      }
      None => {
        warn!("All {} inodes are in use.", self.nodes.len());
        Err(RsfsError::InodeExhausted)
      }
    }
  }

  /// Resets the record and returns it to the free pool.
  ///
  /// This does not release data blocks. Callers must unbind and free them with
  /// [`Inode::take_blocks`] first, otherwise they leak.
  pub fn free(&self, inum: InodeNumber) -> Result<()> {
    let node = self.get(inum)?;
    {
      let mut node = node.write();
      debug_assert_eq!(node.bound_blocks(), 0, "inode {} freed with bound blocks", inum);
      node.reset();
    }
    let mut alloc_tracker = self.alloc_tracker.lock();
    if alloc_tracker.get(inum) == State::Free {
      warn!("Inode {} freed while already free.", inum);
    }
    alloc_tracker.set_free(inum);
    Ok(())
  }

  pub fn get(&self, inum: InodeNumber) -> Result<&RwLock<Inode>> {
    self
      .nodes
      .get(inum)
      .ok_or_else(|| RsfsError::invalid(format!("inode {} out of range", inum)))
  }

  pub fn total_nodes(&self) -> usize {
    self.nodes.len()
  }

  pub fn used_nodes(&self) -> usize {
    self.alloc_tracker.lock().count_used()
  }
}

use log::{trace, warn};
use parking_lot::{Mutex, RwLock};

use super::block::{BlockNumber, BlockStorage};
use crate::alloc::{Bitmap, State};
use crate::error::{Result, RsfsError};

/// Block storage held entirely in process memory. Nothing survives the value
/// being dropped.
pub struct MemoryBlockStore {
    /// Each buffer is exactly `block_size` bytes and has its own lock, so copies
    /// into different blocks proceed in parallel.
    blocks: Vec<RwLock<Box<[u8]>>>,
    block_size: usize,
    /// Guards allocation only; never held while bytes are copied.
    data_map: Mutex<Bitmap>,
}

impl MemoryBlockStore {
    /// Allocates `block_count` zeroed buffers of `block_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` naming the first block whose buffer could not be
    /// obtained. No partially built store is returned.
    pub fn new(block_size: usize, block_count: usize) -> Result<Self> {
        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(block_count)
            .map_err(|_| RsfsError::OutOfMemory(0))?;
        for blocknr in 0..block_count {
            let mut buf: Vec<u8> = Vec::new();
            buf.try_reserve_exact(block_size)
                .map_err(|_| RsfsError::OutOfMemory(blocknr))?;
            buf.resize(block_size, 0x00);
            blocks.push(RwLock::new(buf.into_boxed_slice()));
        }

        Ok(Self {
            blocks,
            block_size,
            data_map: Mutex::new(Bitmap::new(block_count)),
        })
    }

    fn block(&self, blocknr: BlockNumber) -> Result<&RwLock<Box<[u8]>>> {
        self.blocks
            .get(blocknr)
            .ok_or_else(|| RsfsError::invalid(format!("block {} out of range", blocknr)))
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.block_size => Ok(()),
            _ => Err(RsfsError::invalid(format!(
                "byte range {}+{} exceeds block size {}",
                offset, len, self.block_size
            ))),
        }
    }
}

impl BlockStorage for MemoryBlockStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn allocate_block(&self) -> Result<BlockNumber> {
        let blocknr = self.data_map.lock().reserve_next();
        match blocknr {
            Some(blocknr) => {
                trace!("Allocated data block {}.", blocknr);
                Ok(blocknr)
            }
            None => {
                warn!("All {} data blocks are in use.", self.blocks.len());
                Err(RsfsError::BlockExhausted)
            }
        }
    }

    fn free_block(&self, blocknr: BlockNumber) -> Result<()> {
        self.block(blocknr)?;
        let mut data_map = self.data_map.lock();
        if data_map.get(blocknr) == State::Free {
            warn!("Data block {} freed while already free.", blocknr);
            return Ok(());
        }
        data_map.set_free(blocknr);
        trace!("Freed data block {}.", blocknr);
        Ok(())
    }

    fn read_block(&self, blocknr: BlockNumber, offset: usize, buf: &mut [u8]) -> Result<()> {
        let block = self.block(blocknr)?;
        self.check_range(offset, buf.len())?;
        let data = block.read();
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_block(&self, blocknr: BlockNumber, offset: usize, buf: &[u8]) -> Result<()> {
        let block = self.block(blocknr)?;
        self.check_range(offset, buf.len())?;
        let mut data = block.write();
        data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn used_blocks(&self) -> usize {
        self.data_map.lock().count_used()
    }
}

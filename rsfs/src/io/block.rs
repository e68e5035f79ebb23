use crate::error::Result;

/// The block number to access ranging from 0 (the first block) to n - 1 (the last
/// block) where n is number of blocks available.
pub type BlockNumber = usize;

/// A fixed pool of equally sized blocks together with the allocation map that
/// tracks which of them belong to a file.
///
/// All methods take `&self`; implementations synchronize internally so the
/// store can be shared between threads. Allocation metadata and block contents
/// are guarded separately, so copying bytes never holds up an allocation.
pub trait BlockStorage: Send + Sync {
    /// Bytes held by each block.
    fn block_size(&self) -> usize;

    /// Total number of blocks, free or used.
    fn block_count(&self) -> usize;

    /// Reserves the lowest free block and returns its number.
    ///
    /// # Errors
    ///
    /// Returns `BlockExhausted` when every block is in use. Nothing is evicted.
    fn allocate_block(&self) -> Result<BlockNumber>;

    /// Returns a block to the free pool. The contents are not cleared; stale
    /// bytes stay in place until the block is next written.
    ///
    /// # Errors
    ///
    /// Freeing a block out of range will return an error.
    fn free_block(&self, blocknr: BlockNumber) -> Result<()>;

    /// Copies `buf.len()` bytes starting at `offset` within the block into `buf`.
    ///
    /// # Errors
    ///
    /// Attempting to read a block or a byte range out of range will return an error.
    fn read_block(&self, blocknr: BlockNumber, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Copies `buf` into the block starting at `offset`.
    ///
    /// # Errors
    ///
    /// Attempting to write a block or a byte range out of range will return an error.
    fn write_block(&self, blocknr: BlockNumber, offset: usize, buf: &[u8]) -> Result<()>;

    /// Number of blocks currently allocated.
    fn used_blocks(&self) -> usize;
}

use crate::error::{Result, RsfsError};

pub const DEFAULT_BLOCK_SIZE: usize = 32;
pub const DEFAULT_DATA_BLOCKS: usize = 50;
pub const DEFAULT_INODES: usize = 8;
pub const DEFAULT_POINTERS_PER_INODE: usize = 5;
pub const DEFAULT_OPEN_FILES: usize = 8;
pub const DEFAULT_MAX_NAME_LEN: usize = 32;

/// Sizes every fixed pool the file system is built from.
///
/// The number of inodes sets the upper bound on how many files can exist, and
/// `block_size * pointers_per_inode` bounds how large any one of them can grow.
/// Files with no data allocate an inode but no data blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes held by one data block.
    pub block_size: usize,
    /// Total data blocks in the block store.
    pub data_blocks: usize,
    /// Total inode records, and therefore files.
    pub inodes: usize,
    /// Length of each inode's block index array.
    pub pointers_per_inode: usize,
    /// Descriptor slots in the open file table.
    pub open_files: usize,
    /// Longest accepted file name, in bytes.
    pub max_name_len: usize,
}

impl Geometry {
    pub fn max_file_size(&self) -> usize {
        self.block_size * self.pointers_per_inode
    }

    /// Checks the settings. Every pool needs at least one member and the
    /// largest file size must fit in a `usize`.
    pub fn validate(&self) -> Result<()> {
        let settings = [
            ("block_size", self.block_size),
            ("data_blocks", self.data_blocks),
            ("inodes", self.inodes),
            ("pointers_per_inode", self.pointers_per_inode),
            ("open_files", self.open_files),
            ("max_name_len", self.max_name_len),
        ];
        if let Some((name, _)) = settings.iter().find(|(_, value)| *value == 0) {
            return Err(RsfsError::invalid(format!("{} must be non-zero", name)));
        }
        if self.block_size.checked_mul(self.pointers_per_inode).is_none() {
            return Err(RsfsError::invalid("maximum file size overflows"));
        }
        Ok(())
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            data_blocks: DEFAULT_DATA_BLOCKS,
            inodes: DEFAULT_INODES,
            pointers_per_inode: DEFAULT_POINTERS_PER_INODE,
            open_files: DEFAULT_OPEN_FILES,
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

#[derive(Debug, Default)]
pub struct GeometryBuilder {
    geometry: Geometry,
}

impl GeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_size(mut self, bytes: usize) -> Self {
        self.geometry.block_size = bytes;
        self
    }

    pub fn with_data_blocks(mut self, blocks: usize) -> Self {
        self.geometry.data_blocks = blocks;
        self
    }

    pub fn with_inodes(mut self, inodes: usize) -> Self {
        self.geometry.inodes = inodes;
        self
    }

    pub fn with_pointers_per_inode(mut self, pointers: usize) -> Self {
        self.geometry.pointers_per_inode = pointers;
        self
    }

    pub fn with_open_files(mut self, slots: usize) -> Self {
        self.geometry.open_files = slots;
        self
    }

    pub fn with_max_name_len(mut self, bytes: usize) -> Self {
        self.geometry.max_name_len = bytes;
        self
    }

    pub fn build(self) -> Result<Geometry> {
        self.geometry.validate()?;
        Ok(self.geometry)
    }
}

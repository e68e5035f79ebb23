//! A fixed capacity file system that lives entirely in process memory.
//!
//! Files are stored in a pool of equally sized data blocks, described by a
//! table of inodes, and named in a single flat directory. Descriptors handed
//! out by [`Rsfs::open`] carry their own cursor. The whole thing is safe to
//! share between threads.
//!
//! ```
//! use rsfs::{AccessMode, Geometry, Rsfs, Whence};
//!
//! let fs = Rsfs::new(Geometry::default()).unwrap();
//! fs.create("a").unwrap();
//! let fd = fs.open("a", AccessMode::ReadWrite).unwrap();
//! assert_eq!(fs.write(fd, b"hello").unwrap(), 5);
//! fs.fseek(fd, 0, Whence::Set).unwrap();
//! let mut buf = [0u8; 5];
//! assert_eq!(fs.read(fd, &mut buf).unwrap(), 5);
//! assert_eq!(&buf, b"hello");
//! ```
mod alloc;
mod dir;
mod error;
mod file;
mod fs;
mod geometry;
pub mod io;
mod node;

pub use crate::error::{Result, RsfsError};
pub use crate::file::{
    AccessMode, FileDescriptor, Whence, RSFS_RDONLY, RSFS_RDWR, RSFS_SEEK_CUR, RSFS_SEEK_END,
    RSFS_SEEK_SET,
};
pub use crate::fs::{FileStatus, FsStatus, Rsfs, Usage};
pub use crate::geometry::{Geometry, GeometryBuilder};
pub use crate::node::InodeNumber;

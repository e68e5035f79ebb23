use thiserror::Error;

/// Every way an engine operation can fail. None of these leave the engine
/// unusable; a failed call leaves other files and descriptors untouched.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RsfsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("found no file with that name")]
    NotFound,
    #[error("a file with that name already exists")]
    AlreadyExists,
    #[error("file is in use by another descriptor")]
    Busy,
    #[error("no free inodes left")]
    InodeExhausted,
    #[error("no free data blocks left")]
    BlockExhausted,
    #[error("open file table is full")]
    TooManyOpenFiles,
    #[error("file has reached its maximum size")]
    FileTooLarge,
    #[error("could not allocate memory for data block {0}")]
    OutOfMemory(usize),
}

impl RsfsError {
    pub(crate) fn invalid<S: Into<String>>(reason: S) -> Self {
        RsfsError::InvalidArgument(reason.into())
    }

    /// Maps the error onto the closest POSIX errno value.
    pub fn errno(&self) -> i32 {
        match self {
            RsfsError::InvalidArgument(_) => 22, // EINVAL
            RsfsError::NotFound => 2,            // ENOENT
            RsfsError::AlreadyExists => 17,      // EEXIST
            RsfsError::Busy => 16,               // EBUSY
            RsfsError::InodeExhausted => 28,     // ENOSPC
            RsfsError::BlockExhausted => 28,     // ENOSPC
            RsfsError::TooManyOpenFiles => 24,   // EMFILE
            RsfsError::FileTooLarge => 27,       // EFBIG
            RsfsError::OutOfMemory(_) => 12,     // ENOMEM
        }
    }
}

pub type Result<T> = std::result::Result<T, RsfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_errors_share_enospc() {
        assert_eq!(RsfsError::InodeExhausted.errno(), RsfsError::BlockExhausted.errno());
        assert_ne!(RsfsError::NotFound.errno(), RsfsError::Busy.errno());
    }

    #[test]
    fn invalid_argument_carries_reason() {
        let err = RsfsError::invalid("size must be positive");
        assert_eq!(err.to_string(), "invalid argument: size must be positive");
    }
}

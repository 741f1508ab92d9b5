use std::{fmt, io};

use shared_memory::ShmemError;

/// Error taxonomy for ring operations.
///
/// `Full` and `Empty` are ordinary steady-state signals that callers treat
/// as retry hints; the remaining variants are configuration or environment
/// problems.
#[derive(Debug)]
pub enum RingError {
    Full,
    Empty,
    CreateFailed(CreateError),
    AttachFailed(AttachError),
    RestoreFailed(String),
}

/// Cause of a failed `create_shm`.
#[derive(Debug)]
pub enum CreateError {
    Shmem(ShmemError),
    Unlink(io::Error),
}

/// Cause of a failed `attach_shm`.
#[derive(Debug)]
pub enum AttachError {
    Shmem(ShmemError),
    MagicMismatch { expected: u32, found: u32 },
    RegionTooSmall { needed: usize, actual: usize },
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::Full => write!(f, "ring buffer is full"),
            RingError::Empty => write!(f, "ring buffer is empty"),
            RingError::CreateFailed(e) => write!(f, "shared memory create failed: {}", e),
            RingError::AttachFailed(e) => write!(f, "shared memory attach failed: {}", e),
            RingError::RestoreFailed(s) => write!(f, "snapshot restore failed: {}", s),
        }
    }
}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateError::Shmem(e) => write!(f, "{}", e),
            CreateError::Unlink(e) => write!(f, "could not unlink stale object: {}", e),
        }
    }
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::Shmem(e) => write!(f, "{}", e),
            AttachError::MagicMismatch { expected, found } => write!(
                f,
                "magic mismatch: expected {:#010x}, found {:#010x}",
                expected, found
            ),
            AttachError::RegionTooSmall { needed, actual } => write!(
                f,
                "mapped region too small: need {} bytes, got {}",
                needed, actual
            ),
        }
    }
}

impl std::error::Error for RingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RingError::CreateFailed(e) => Some(e),
            RingError::AttachFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for CreateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CreateError::Shmem(e) => Some(e),
            CreateError::Unlink(e) => Some(e),
        }
    }
}

impl std::error::Error for AttachError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttachError::Shmem(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CreateError> for RingError {
    fn from(err: CreateError) -> Self {
        RingError::CreateFailed(err)
    }
}

impl From<AttachError> for RingError {
    fn from(err: AttachError) -> Self {
        RingError::AttachFailed(err)
    }
}

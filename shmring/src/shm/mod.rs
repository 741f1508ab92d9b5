use std::ffi::CString;
use std::io;

use shared_memory::{Shmem, ShmemConf, ShmemError};

use crate::errors::{AttachError, CreateError, RingError};

/// Creates the named object sized to `bytes` and maps it. A stale object
/// already registered under `name` is unlinked and the create retried
/// once, so a crashed previous owner does not wedge the name.
///
/// The returned mapping never owns the name: dropping it only unmaps, and
/// the name stays registered until [`shm_unlink`].
pub(crate) fn create(name: &str, bytes: usize) -> Result<Shmem, RingError> {
    match map_new(name, bytes) {
        Ok(mapping) => Ok(mapping),
        Err(ShmemError::MappingIdExists) => {
            shm_unlink(name).map_err(|e| RingError::CreateFailed(CreateError::Unlink(e)))?;
            map_new(name, bytes).map_err(|e| RingError::CreateFailed(CreateError::Shmem(e)))
        }
        Err(e) => Err(RingError::CreateFailed(CreateError::Shmem(e))),
    }
}

fn map_new(name: &str, bytes: usize) -> Result<Shmem, ShmemError> {
    let mut mapping = ShmemConf::new().os_id(name).size(bytes).create()?;
    // Drop must never remove the name out from under other processes.
    mapping.set_owner(false);
    Ok(mapping)
}

/// Opens and maps the existing named object. Header validation is the
/// caller's job; this layer only reports open/map failures.
pub(crate) fn open(name: &str) -> Result<Shmem, RingError> {
    ShmemConf::new()
        .os_id(name)
        .open()
        .map_err(|e| RingError::AttachFailed(AttachError::Shmem(e)))
}

/// Removes `name` from the shared-memory namespace.
///
/// Existing mappings remain valid for every process that already attached;
/// further attaches fail. No destructor calls this: the process that owns
/// the ring's lifetime unlinks exactly once.
pub fn shm_unlink(name: &str) -> io::Result<()> {
    let c_name = CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "shm name contains NUL"))?;
    // SAFETY: c_name is a valid NUL-terminated C string for the duration
    // of the call.
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

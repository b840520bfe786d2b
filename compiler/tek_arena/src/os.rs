//! Thin wrappers over the Unix virtual-memory calls.

use std::io;
use std::ptr::{self, NonNull};
use std::sync::OnceLock;

const PROT_RW: libc::c_int = libc::PROT_READ | libc::PROT_WRITE;
const MAP_RESERVE: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;

/// The OS page size, queried once.
#[allow(unsafe_code)]
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        usize::try_from(size).ok().filter(|&size| size > 0).unwrap_or(4096)
    })
}

/// Reserves `len` bytes of zeroed, lazily committed address space.
#[allow(unsafe_code)]
pub(crate) fn reserve(len: usize) -> io::Result<NonNull<u8>> {
    // SAFETY: anonymous mapping with no address hint; nothing existing is
    // replaced.
    let ptr = unsafe { libc::mmap(ptr::null_mut(), len, PROT_RW, MAP_RESERVE, -1, 0) };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
}

/// Makes `len` bytes at `addr` inaccessible.
///
/// # Safety
///
/// The range must lie inside a live reservation and nothing may reference
/// it.
#[allow(unsafe_code)]
pub(crate) unsafe fn protect_none(addr: NonNull<u8>, len: usize) -> io::Result<()> {
    // SAFETY: the caller guarantees the range is ours and unreferenced.
    let rc = unsafe { libc::mprotect(addr.as_ptr().cast(), len, libc::PROT_NONE) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Drops the physical pages behind a range by mapping fresh zero pages over
/// it. The address range itself stays reserved.
///
/// # Safety
///
/// The range must lie inside a live reservation and nothing may reference
/// it.
#[allow(unsafe_code)]
pub(crate) unsafe fn decommit(addr: NonNull<u8>, len: usize) -> io::Result<()> {
    // SAFETY: MAP_FIXED replaces exactly the caller's range, which the
    // caller guarantees is ours and unreferenced.
    let ptr = unsafe {
        libc::mmap(
            addr.as_ptr().cast(),
            len,
            PROT_RW,
            MAP_RESERVE | libc::MAP_FIXED,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Unmaps a whole reservation.
///
/// # Safety
///
/// `addr..addr + len` must be a reservation returned by [`reserve`] that
/// nothing references any more.
#[allow(unsafe_code)]
pub(crate) unsafe fn release(addr: NonNull<u8>, len: usize) -> io::Result<()> {
    // SAFETY: guaranteed by the caller.
    let rc = unsafe { libc::munmap(addr.as_ptr().cast(), len) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

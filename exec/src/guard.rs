//! Write-protection of translated x86 source pages.

use std::collections::BTreeSet;
use std::io;
use std::sync::Mutex;

use dynarec_backend::exec_mem::page_size;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("mprotect of {len:#x} bytes at {addr:#x} failed: {source}")]
    Protect {
        addr: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("guard state poisoned")]
    Poisoned,
}

/// Arranges for writes to translated source bytes to be noticed.
pub trait SourceGuard: Send + Sync {
    fn protect(&self, addr: u64, size: usize) -> Result<(), GuardError>;

    /// Make the pages covering `[addr, addr + size)` writable again.
    fn unprotect(&self, addr: u64, size: usize) -> Result<(), GuardError>;
}

/// Guard that does nothing; staleness is then only caught by the
/// content hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGuard;

impl SourceGuard for NoGuard {
    fn protect(&self, _addr: u64, _size: usize) -> Result<(), GuardError> {
        Ok(())
    }

    fn unprotect(&self, _addr: u64, _size: usize) -> Result<(), GuardError> {
        Ok(())
    }
}

/// Makes whole host pages read-only with `mprotect`.
///
/// Only meaningful when guest code is mapped at its own address in the
/// host process.
///
/// The runtime's fault handler is expected to call [`SourceGuard::unprotect`]
/// and invalidate the units overlapping the faulting page.
#[derive(Debug, Default)]
pub struct PageGuard {
    pages: Mutex<BTreeSet<u64>>,
}

impl PageGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn page_range(addr: u64, size: usize) -> impl Iterator<Item = u64> {
        let page = page_size() as u64;
        let first = addr & !(page - 1);
        let end = addr.saturating_add(size.max(1) as u64);
        (first..end).step_by(page as usize)
    }

    fn mprotect(page: u64, prot: libc::c_int) -> Result<(), GuardError> {
        let len = page_size();
        let ret = unsafe { libc::mprotect(page as *mut libc::c_void, len, prot) };
        if ret != 0 {
            return Err(GuardError::Protect {
                addr: page,
                len,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    pub fn is_protected(&self, addr: u64) -> bool {
        let page = addr & !(page_size() as u64 - 1);
        self.pages.lock().is_ok_and(|p| p.contains(&page))
    }
}

impl SourceGuard for PageGuard {
    fn protect(&self, addr: u64, size: usize) -> Result<(), GuardError> {
        let mut pages = self.pages.lock().map_err(|_| GuardError::Poisoned)?;
        for page in Self::page_range(addr, size) {
            if pages.contains(&page) {
                continue;
            }
            Self::mprotect(page, libc::PROT_READ | libc::PROT_EXEC)?;
            pages.insert(page);
        }
        Ok(())
    }

    fn unprotect(&self, addr: u64, size: usize) -> Result<(), GuardError> {
        let mut pages = self.pages.lock().map_err(|_| GuardError::Poisoned)?;
        for page in Self::page_range(addr, size) {
            if pages.remove(&page) {
                Self::mprotect(page, libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC)?;
            }
        }
        Ok(())
    }
}

//! Executable memory for translated code.

use std::io;
use std::ptr;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Default arena chunk size: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Alignment of every region handed out by the arena.
pub const CODE_ALIGN: usize = 16;

#[derive(Debug, Error)]
pub enum ExecMemError {
    #[error("mmap of {size} bytes failed: {source}")]
    Map {
        size: usize,
        #[source]
        source: io::Error,
    },

    #[error("mprotect failed: {0}")]
    Protect(#[source] io::Error),
}

/// An anonymous read/write/execute mapping.
pub struct Mapping {
    ptr: *mut u8,
    size: usize,
}

// SAFETY: Mapping owns its mmap'd memory exclusively; handing out
// disjoint sub-ranges is the job of the allocator.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    /// Map `size` bytes (rounded up to page size).
    pub fn new(size: usize) -> Result<Self, ExecMemError> {
        let page_size = page_size();
        let size = (size.max(1) + page_size - 1) & !(page_size - 1);

        // SAFETY: mmap with MAP_ANONYMOUS | MAP_PRIVATE, no file backing.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(ExecMemError::Map {
                size,
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            size,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn base_ptr(&self) -> *const u8 {
        self.ptr as *const u8
    }

    /// Make the mapping executable and non-writable.
    pub fn set_executable(&self) -> Result<(), ExecMemError> {
        let prot = libc::PROT_READ | libc::PROT_EXEC;
        let ret = unsafe { libc::mprotect(self.ptr as *mut libc::c_void, self.size, prot) };
        if ret != 0 {
            Err(ExecMemError::Protect(io::Error::last_os_error()))
        } else {
            Ok(())
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        }
    }
}

/// A byte range of executable memory owned by one translation.
///
/// Regions never overlap, so the owner may write through `&mut self`
/// while other regions of the same mapping are being executed.
pub struct CodeRegion {
    mapping: Arc<Mapping>,
    offset: usize,
    len: usize,
    dedicated: bool,
}

impl CodeRegion {
    /// Host address of the first byte.
    #[inline]
    pub fn addr(&self) -> u64 {
        self.as_ptr() as u64
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        // SAFETY: offset + len <= mapping size by construction.
        unsafe { self.mapping.base_ptr().add(self.offset) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the region has a mapping of its own (standalone units).
    #[inline]
    pub fn is_dedicated(&self) -> bool {
        self.dedicated
    }

    /// Drop write access once the code is final.
    ///
    /// Only dedicated regions are sealed; a shared chunk stays writable
    /// while later units are carved from it.
    pub fn seal(&self) -> Result<(), ExecMemError> {
        if self.dedicated {
            self.mapping.set_executable()
        } else {
            Ok(())
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the range is mapped and readable for the lifetime of
        // the mapping, which `self` keeps alive.
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; no other region aliases this range and the
        // region is not shared while `&mut self` is held.
        unsafe { std::slice::from_raw_parts_mut(self.as_ptr() as *mut u8, self.len) }
    }
}

impl std::fmt::Debug for CodeRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeRegion")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len)
            .field("dedicated", &self.dedicated)
            .finish()
    }
}

/// A sub-range of a shared region: the code of one unit or son.
#[derive(Debug, Clone)]
pub struct CodeSpan {
    region: Arc<CodeRegion>,
    offset: usize,
    len: usize,
}

impl CodeSpan {
    pub fn new(region: Arc<CodeRegion>, offset: usize, len: usize) -> Self {
        assert!(offset + len <= region.len(), "code span out of bounds");
        Self {
            region,
            offset,
            len,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        // SAFETY: bounds checked in `new`.
        unsafe { self.region.as_ptr().add(self.offset) }
    }

    #[inline]
    pub fn addr(&self) -> u64 {
        self.as_ptr() as u64
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.region.as_slice()[self.offset..self.offset + self.len]
    }

    pub fn region(&self) -> &Arc<CodeRegion> {
        &self.region
    }
}

/// Source of executable memory for translated units.
pub trait ExecAllocator: Send + Sync {
    /// Allocate `size` bytes, or `None` when no memory is available.
    ///
    /// Standalone units get memory that is not shared with other units.
    fn allocate(&self, size: usize, standalone: bool) -> Option<CodeRegion>;
}

struct ArenaInner {
    current: Option<Arc<Mapping>>,
    offset: usize,
    mapped: usize,
}

/// Bump allocator over mmap'd chunks.
///
/// Shared-mode regions are carved from the current chunk; standalone
/// regions get a mapping of their own. Chunks stay mapped as long as
/// any region carved from them is alive.
pub struct CodeArena {
    inner: Mutex<ArenaInner>,
    chunk_size: usize,
    limit: usize,
}

impl CodeArena {
    /// `limit` caps the total bytes ever mapped by this arena.
    pub fn new(chunk_size: usize, limit: usize) -> Self {
        Self {
            inner: Mutex::new(ArenaInner {
                current: None,
                offset: 0,
                mapped: 0,
            }),
            chunk_size: chunk_size.max(page_size()),
            limit,
        }
    }

    /// Total bytes mapped so far.
    pub fn mapped(&self) -> usize {
        self.inner.lock().map(|inner| inner.mapped).unwrap_or(0)
    }

    fn map(&self, inner: &mut ArenaInner, size: usize) -> Option<Arc<Mapping>> {
        if inner.mapped.saturating_add(size) > self.limit {
            tracing::debug!(size, mapped = inner.mapped, "code cache limit reached");
            return None;
        }
        match Mapping::new(size) {
            Ok(m) => {
                inner.mapped += m.len();
                Some(Arc::new(m))
            }
            Err(err) => {
                tracing::warn!("executable mapping failed: {err}");
                None
            }
        }
    }
}

impl Default for CodeArena {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, usize::MAX)
    }
}

impl ExecAllocator for CodeArena {
    fn allocate(&self, size: usize, standalone: bool) -> Option<CodeRegion> {
        let size = align_up(size.max(1), CODE_ALIGN);
        let mut inner = self.inner.lock().ok()?;

        if standalone {
            let mapping = self.map(&mut inner, size)?;
            return Some(CodeRegion {
                mapping,
                offset: 0,
                len: size,
                dedicated: true,
            });
        }

        let fits = inner
            .current
            .as_ref()
            .is_some_and(|m| inner.offset + size <= m.len());
        if !fits {
            let chunk = self.map(&mut inner, size.max(self.chunk_size))?;
            inner.current = Some(chunk);
            inner.offset = 0;
        }

        let mapping = inner.current.clone()?;
        let offset = inner.offset;
        inner.offset += size;
        Some(CodeRegion {
            mapping,
            offset,
            len: size,
            dedicated: false,
        })
    }
}

#[inline]
pub fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Make freshly written code visible to instruction fetch.
#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
pub fn flush_icache(ptr: *const u8, len: usize) {
    extern "C" {
        fn __clear_cache(begin: *mut libc::c_char, end: *mut libc::c_char);
    }
    // SAFETY: the range lies within a live mapping owned by the caller.
    unsafe {
        __clear_cache(
            ptr as *mut libc::c_char,
            ptr.add(len) as *mut libc::c_char,
        );
    }
}

/// Make freshly written code visible to instruction fetch.
#[cfg(all(target_arch = "aarch64", target_os = "macos"))]
pub fn flush_icache(ptr: *const u8, len: usize) {
    extern "C" {
        fn sys_icache_invalidate(start: *mut libc::c_void, len: libc::size_t);
    }
    // SAFETY: the range lies within a live mapping owned by the caller.
    unsafe { sys_icache_invalidate(ptr as *mut libc::c_void, len) };
}

/// Make freshly written code visible to instruction fetch.
///
/// Instruction fetch is coherent with data writes on this host; only
/// the compiler needs to be kept from sinking the stores.
#[cfg(not(all(target_arch = "aarch64", any(target_os = "linux", target_os = "macos"))))]
pub fn flush_icache(_ptr: *const u8, _len: usize) {
    std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
}

pub fn page_size() -> usize {
    // SAFETY: sysconf is always safe to call.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

use std::ptr;

use dynarec_backend::exec_mem::page_size;
use dynarec_exec::{NoGuard, PageGuard, SourceGuard};

/// An anonymous read/write page standing in for guest code.
struct Page {
    ptr: *mut u8,
    len: usize,
}

impl Page {
    fn new() -> Self {
        let len = page_size();
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        assert_ne!(ptr, libc::MAP_FAILED);
        Self {
            ptr: ptr as *mut u8,
            len,
        }
    }

    fn addr(&self) -> u64 {
        self.ptr as u64
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

#[test]
fn no_guard_accepts_anything() {
    assert!(NoGuard.protect(0, 0).is_ok());
    assert!(NoGuard.protect(0xdead_0000, 0x1000).is_ok());
}

#[test]
fn page_guard_round_trip() {
    let page = Page::new();
    let guard = PageGuard::new();

    guard.protect(page.addr() + 0x10, 8).unwrap();
    assert!(guard.is_protected(page.addr()));
    assert!(guard.is_protected(page.addr() + page.len as u64 - 1));
    // Already protected pages are skipped.
    guard.protect(page.addr(), 1).unwrap();

    guard.unprotect(page.addr(), 1).unwrap();
    assert!(!guard.is_protected(page.addr()));
    unsafe { page.ptr.write(0x90) };
    assert_eq!(unsafe { page.ptr.read() }, 0x90);
}

#[test]
fn unprotect_of_unknown_page_is_a_no_op() {
    let page = Page::new();
    let guard = PageGuard::new();
    guard.unprotect(page.addr(), 16).unwrap();
    assert!(!guard.is_protected(page.addr()));
}

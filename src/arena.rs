//! Page-aligned scan buffer with a read-only sentinel page.

use std::alloc::{self, Layout};
use std::io;
use std::ptr::NonNull;
use std::slice;

/// A working buffer of `bufsz` bytes whose upper bound is page aligned,
/// followed by one page holding a copy of the delimiter in its first byte.
///
/// The sentinel page is write-protected for the lifetime of the arena. A
/// forward delimiter scan started anywhere in the working buffer therefore
/// terminates at or before the sentinel without any bounds check, and stray
/// writes past the buffer fault instead of corrupting the sentinel.
pub(crate) struct Arena {
    /// Start of the working buffer. The sentinel byte sits at `buf + bufsz`.
    buf: NonNull<u8>,
    base: *mut u8,
    layout: Layout,
    bufsz: usize,
    pgsz: usize,
}

// The allocation is exclusively owned and never aliased between calls.
unsafe impl Send for Arena {}

impl Arena {
    /// Allocates the arena and write-protects the sentinel page.
    ///
    /// Fails with `OutOfMemory` if aligned memory cannot be obtained and
    /// with the OS error if the protection cannot be applied; in both cases
    /// nothing is leaked.
    pub fn new(bufsz: usize, delimiter: u8) -> io::Result<Arena> {
        assert!(bufsz >= 1);
        let pgsz = page_size();

        // Rnd(bufsz) working bytes plus one sentinel page.
        let arenasz = bufsz
            .checked_add(pgsz - 1)
            .map(|n| (n / pgsz) * pgsz)
            .and_then(|n| n.checked_add(pgsz))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "buffer size too large")
            })?;
        let layout = Layout::from_size_align(arenasz, pgsz).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "buffer size too large")
        })?;

        // Zeroed, not uninitialized: the buffer is handed to io::Read.
        let base = unsafe { alloc::alloc_zeroed(layout) };
        if base.is_null() {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "scan buffer allocation failed",
            ));
        }

        let sentinel = unsafe { base.add(arenasz - pgsz) };
        unsafe { *sentinel = delimiter };
        if let Err(e) = protect(sentinel, pgsz, Protection::ReadOnly) {
            unsafe { alloc::dealloc(base, layout) };
            return Err(e);
        }

        let buf = unsafe { sentinel.sub(bufsz) };
        Ok(Arena {
            buf: unsafe { NonNull::new_unchecked(buf) },
            base,
            layout,
            bufsz,
            pgsz,
        })
    }

    /// The whole working buffer, `[buf, buftop)`.
    #[inline]
    pub fn working_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.buf.as_ptr(), self.bufsz) }
    }

    /// The unread upper part of the working buffer, `[from, buftop)`.
    #[inline]
    pub fn tail_mut(&mut self, from: usize) -> &mut [u8] {
        debug_assert!(from <= self.bufsz);
        unsafe { slice::from_raw_parts_mut(self.buf.as_ptr().add(from), self.bufsz - from) }
    }

    /// `[from, buftop]` including the sentinel byte, for delimiter scans.
    /// Never empty, and its last byte is always the delimiter.
    #[inline]
    pub fn scan_span(&self, from: usize) -> &[u8] {
        debug_assert!(from <= self.bufsz);
        unsafe { slice::from_raw_parts(self.buf.as_ptr().add(from), self.bufsz - from + 1) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let sentinel = unsafe { self.buf.as_ptr().add(self.bufsz) };
        // Restore write permission so the allocator may reuse the page.
        let _ = protect(sentinel, self.pgsz, Protection::ReadWrite);
        unsafe { alloc::dealloc(self.base, self.layout) };
    }
}

enum Protection {
    ReadOnly,
    ReadWrite,
}

#[cfg(unix)]
fn protect(ptr: *mut u8, len: usize, prot: Protection) -> io::Result<()> {
    let flags = match prot {
        Protection::ReadOnly => libc::PROT_READ,
        Protection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
    };
    if unsafe { libc::mprotect(ptr as *mut libc::c_void, len, flags) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn protect(_ptr: *mut u8, _len: usize, _prot: Protection) -> io::Result<()> {
    // No hardware protection without mprotect. The sentinel byte is still
    // in place, which is all the scan termination contract needs.
    Ok(())
}

#[cfg(unix)]
fn page_size() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n > 0 {
        n as usize
    } else {
        4096
    }
}

#[cfg(not(unix))]
fn page_size() -> usize {
    4096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_follows_working_buffer() {
        for bufsz in [1, 7, 4096, 10_000] {
            let arena = Arena::new(bufsz, b'\n').unwrap();
            let span = arena.scan_span(0);
            assert_eq!(span.len(), bufsz + 1);
            assert_eq!(span[bufsz], b'\n');
        }
    }

    #[test]
    fn buftop_is_page_aligned() {
        let arena = Arena::new(100, b'\0').unwrap();
        let buftop = arena.scan_span(0).as_ptr() as usize + arena.bufsz;
        assert_eq!(buftop % arena.pgsz, 0);
    }

    #[test]
    fn working_region_is_writable() {
        let mut arena = Arena::new(64, b'\n').unwrap();
        for b in arena.working_mut().iter_mut() {
            *b = b'x';
        }
        assert_eq!(arena.tail_mut(60).len(), 4);
        assert_eq!(arena.scan_span(60), b"xxxx\n");
    }
}

use std::ffi::{CStr, OsStr, OsString};
use std::io;
use std::os::fd::{BorrowedFd, IntoRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;

// ---------------------------------------------------------------------------
// SeekLoc
// ---------------------------------------------------------------------------

/// Opaque position of a member within a directory.
///
/// Captured with [`DirStream::tell`] immediately before the member is read;
/// feeding it back to [`DirStream::seek`] makes that member the next one
/// read. Cookies stay valid across re-opened streams of the same directory,
/// provided the directory itself has not been modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SeekLoc(pub(crate) libc::c_long);

// ---------------------------------------------------------------------------
// DirStream
// ---------------------------------------------------------------------------

/// One member as it came off the stream, before any classification.
pub(crate) struct RawDirent {
    pub name: OsString,
    pub d_type: u8,
}

/// An open dirent stream over a directory descriptor.
///
/// Owns both the `DIR` object and the descriptor behind it; dropping the
/// stream closes the descriptor. This is the only module in the crate that
/// touches libc directly.
pub(crate) struct DirStream {
    dirp: *mut libc::DIR,
}

// The stream is confined to one context at a time; moving it between
// threads is fine, sharing it is not.
unsafe impl Send for DirStream {}

impl DirStream {
    /// Open a stream over `fd`, taking ownership of the descriptor.
    pub fn from_fd(fd: OwnedFd) -> io::Result<Self> {
        let raw = fd.into_raw_fd();
        // SAFETY: `raw` is a descriptor we own and have not closed.
        let dirp = unsafe { libc::fdopendir(raw) };
        if dirp.is_null() {
            let err = io::Error::last_os_error();
            // SAFETY: fdopendir does not take ownership on failure, so the
            // descriptor must be closed here or it leaks.
            unsafe { libc::close(raw) };
            return Err(err);
        }
        Ok(Self { dirp })
    }

    /// Borrow the descriptor backing this stream.
    pub fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: dirfd of an open stream is a valid descriptor that lives
        // as long as the stream; the borrow ties it to `self`.
        unsafe { BorrowedFd::borrow_raw(libc::dirfd(self.dirp)) }
    }

    /// Rewind to the start of the directory.
    ///
    /// A descriptor duplicated from the caller shares its file offset, so a
    /// fresh read pass must not trust wherever the shared offset points.
    pub fn rewind(&mut self) {
        // SAFETY: the stream is open.
        unsafe { libc::rewinddir(self.dirp) }
    }

    /// Current stream position, taken before reading the member it names.
    pub fn tell(&mut self) -> SeekLoc {
        // SAFETY: the stream is open.
        SeekLoc(unsafe { libc::telldir(self.dirp) })
    }

    /// Reposition the stream so the member at `loc` is the next one read.
    pub fn seek(&mut self, loc: SeekLoc) {
        // SAFETY: the stream is open; `loc` came from `tell` on a stream
        // over the same directory.
        unsafe { libc::seekdir(self.dirp, loc.0) }
    }

    /// Read the next member. `Ok(None)` is end of stream.
    ///
    /// `readdir` reports exhaustion and failure the same way, so `errno` is
    /// cleared beforehand and consulted afterwards to tell them apart.
    pub fn read(&mut self) -> io::Result<Option<RawDirent>> {
        clear_errno();
        // SAFETY: the stream is open. The returned dirent is only valid
        // until the next call on this stream; everything needed is copied
        // out before that.
        let entry = unsafe { libc::readdir(self.dirp) };
        if entry.is_null() {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(0) | None => Ok(None),
                Some(_) => Err(err),
            };
        }
        // SAFETY: `entry` points at a valid dirent whose d_name is
        // NUL-terminated.
        let name = unsafe { CStr::from_ptr((*entry).d_name.as_ptr()) };
        let name = OsStr::from_bytes(name.to_bytes()).to_os_string();
        // SAFETY: same dirent as above.
        let d_type = unsafe { (*entry).d_type };
        Ok(Some(RawDirent { name, d_type }))
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        // SAFETY: the stream is open and never touched again; closedir also
        // closes the descriptor it was built from.
        unsafe { libc::closedir(self.dirp) };
    }
}

// ---------------------------------------------------------------------------
// errno plumbing
// ---------------------------------------------------------------------------

fn clear_errno() {
    // SAFETY: the location is a valid thread-local owned by libc.
    unsafe { *errno_location() = 0 };
}

#[cfg(target_os = "linux")]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
unsafe fn errno_location() -> *mut libc::c_int {
    unsafe { libc::__error() }
}

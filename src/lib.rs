//! # fdwalk
//!
//! Resumable depth-first directory traversal yielding one open file handle
//! at a time.
//!
//! fdwalk walks the tree below a caller-supplied open directory descriptor
//! and produces each regular file as an open descriptor plus its name, one
//! per call, without ever materializing the tree. Directories are read
//! lazily: each level's member list is built once, ordered, and then
//! stripped down to stream positions, so memory stays bounded even for
//! huge directories. All opens are descriptor-relative (`openat`); the
//! walk never builds or touches a path after the root has been opened.
//!
//! Within every directory, members are visited in case-insensitive name
//! order with subdirectories (and symbolic links, which are never
//! followed) ordered ahead of regular files. Dot-prefixed names are
//! skipped at every level, which covers `.` and `..` and also suppresses
//! hidden files.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let root = fdwalk::open_root("/srv/data")?;
//!
//! let mut walk = fdwalk::walk(&root).build();
//! while let Some(file) = walk.next_file()? {
//!     println!("{} (depth {})", file.name.to_string_lossy(), file.depth);
//!     // `file.handle` is an OwnedFd the caller now owns.
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Or drive it as an iterator:
//!
//! ```rust,no_run
//! use std::io::Read;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let root = fdwalk::open_root("/srv/data")?;
//! for file in fdwalk::walk(&root).build() {
//!     let file = file?;
//!     let mut text = String::new();
//!     file.into_file().read_to_string(&mut text)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Contract
//!
//! - The traversal is a pull-based generator, synchronous and resumed by
//!   each call. A [`Traversal`] may be moved between threads but never
//!   shared.
//! - The root descriptor is borrowed; the engine duplicates it and never
//!   closes the caller's copy. Every descriptor the engine opens itself is
//!   released when the walk completes, fails, or is dropped. Yielded file
//!   descriptors belong to the caller from the moment they are returned.
//! - Errors are terminal: any failure tears the whole context down and the
//!   walk cannot be resumed. Run several independent traversals (of the
//!   same root if desired) by building one context each.
//! - The tree must not change while a traversal is live; member identity
//!   after concurrent modification is undefined.

mod builder;
mod engine;
mod entry;
mod error;
mod listing;
mod stream;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::WalkBuilder;
pub use engine::{FileEntry, Traversal};
pub use error::WalkError;

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::path::Path;

use rustix::fs::{Mode, OFlags};

// ── Entry points ──────────────────────────────────────────────────────────────

/// Create a [`WalkBuilder`] over an open directory descriptor.
///
/// The descriptor is borrowed for the lifetime of the builder and the
/// [`Traversal`] built from it; the caller keeps ownership.
///
/// # Example
///
/// ```rust,no_run
/// # fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let root = fdwalk::open_root(".")?;
/// let names: Vec<_> = fdwalk::walk(&root)
///     .build()
///     .collect::<Result<Vec<_>, _>>()?
///     .into_iter()
///     .map(|file| file.name)
///     .collect();
/// # Ok(())
/// # }
/// ```
pub fn walk<Fd: AsFd + ?Sized>(root: &Fd) -> WalkBuilder<'_> {
    WalkBuilder::new(root.as_fd())
}

/// Open a directory for use as a traversal root.
///
/// Thin convenience over `open`; the caller owns the descriptor and must
/// keep it open for as long as any traversal borrows it.
pub fn open_root<P: AsRef<Path>>(path: P) -> io::Result<OwnedFd> {
    let fd = rustix::fs::open(
        path.as_ref(),
        OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
        Mode::empty(),
    )?;
    Ok(fd)
}

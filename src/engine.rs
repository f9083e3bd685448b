use std::ffi::OsString;
use std::fs;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;

use rustix::fs::{Mode, OFlags};
use tracing::{debug, trace, warn};

use crate::entry::EntryKind;
use crate::error::WalkError;
use crate::listing::Listing;
use crate::stream::DirStream;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Capacity knobs resolved by the builder.
///
/// `pub(crate)`: not part of the public API. Callers configure these via
/// the builder methods (`.listing_capacity()`, `.stack_capacity()`).
pub(crate) struct Config {
    pub listing_capacity: usize,
    pub stack_capacity: usize,
}

fn dir_open_flags() -> OFlags {
    OFlags::RDONLY | OFlags::NONBLOCK | OFlags::DIRECTORY | OFlags::CLOEXEC
}

// ---------------------------------------------------------------------------
// FileEntry
// ---------------------------------------------------------------------------

/// A regular file produced by the traversal.
///
/// The descriptor belongs to the caller from the moment it is returned;
/// the traversal never touches it again.
#[derive(Debug)]
pub struct FileEntry {
    /// Open read-only descriptor for the file.
    pub handle: OwnedFd,

    /// The file's name within its directory.
    pub name: OsString,

    /// How deep below the root the file sits. Files directly under the
    /// root are at depth 0.
    pub depth: usize,
}

impl FileEntry {
    /// Wrap the descriptor for buffered reads.
    pub fn into_file(self) -> fs::File {
        fs::File::from(self.handle)
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// One level of the walk: the ordered listing of a directory.
///
/// The level's directory descriptor lives in the context's single active
/// stream, not here; an ancestor's descriptor is recovered through the
/// child's `..` when the walk returns to it.
struct Frame {
    listing: Listing,
}

/// Where a suspended traversal stands between calls.
enum State {
    /// Nothing built yet; the first call enters the root.
    Unstarted,
    /// Mid-walk; the cursor of the top frame points at the next member.
    Suspended,
    /// The stack emptied. Every further call reports the end.
    Finished,
    /// Torn down after an unrecoverable failure.
    Failed,
}

/// A resumable depth-first walk below one root directory.
///
/// Holds the whole live state of the walk: the frame stack, the dirent
/// stream positioned at the active directory, and the suspension point.
/// The root descriptor is borrowed; the caller keeps ownership and must
/// keep it open for the traversal's lifetime. Everything the context opens
/// itself is released when the walk completes, fails, or is dropped.
pub struct Traversal<'fd> {
    root: BorrowedFd<'fd>,
    frames: Vec<Frame>,
    stream: Option<DirStream>,
    state: State,
    config: Config,
}

impl<'fd> Traversal<'fd> {
    pub(crate) fn new(root: BorrowedFd<'fd>, config: Config) -> Self {
        let frames = Vec::with_capacity(config.stack_capacity);
        Self {
            root,
            frames,
            stream: None,
            state: State::Unstarted,
            config,
        }
    }

    /// Produce the next regular file, or `None` once the tree is exhausted.
    ///
    /// Resumes exactly where the previous call suspended. Any failure
    /// releases everything the context holds and is terminal: later calls
    /// return [`WalkError::Defunct`]. The end state is idempotent; once
    /// `None` is returned, every further call returns `None`.
    pub fn next_file(&mut self) -> Result<Option<FileEntry>, WalkError> {
        match self.drive() {
            Ok(item) => Ok(item),
            Err(err) => {
                if !matches!(err, WalkError::Defunct) {
                    warn!(error = %err, "traversal aborted");
                    self.teardown();
                }
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<Option<FileEntry>, WalkError> {
        match self.state {
            State::Unstarted => self.enter_root()?,
            State::Suspended => {}
            State::Finished => return Ok(None),
            State::Failed => return Err(WalkError::Defunct),
        }

        loop {
            if self.active_exhausted() {
                if self.frames.len() > 1 {
                    self.ascend()?;
                    continue;
                }
                self.finish();
                return Ok(None);
            }

            let (kind, name) = self.current_member()?;

            // `.` and `..` must be skipped; skipping every dot-prefixed
            // name with them also suppresses hidden files.
            if name.as_bytes().first() == Some(&b'.') {
                self.advance();
                continue;
            }

            match kind {
                EntryKind::Dir => {
                    self.advance();
                    self.descend(name)?;
                }
                EntryKind::File => {
                    self.advance();
                    return Ok(Some(self.produce(name)?));
                }
                EntryKind::Symlink | EntryKind::Other => {
                    trace!(name = ?name, "skipping non-regular member");
                    self.advance();
                }
            }
        }
    }

    /// Build the root frame. Runs once, on the first call.
    fn enter_root(&mut self) -> Result<(), WalkError> {
        let dup = self
            .root
            .try_clone_to_owned()
            .map_err(WalkError::invalid_root)?;
        let stream = DirStream::from_fd(dup).map_err(WalkError::invalid_root)?;
        let listing = Listing::build(stream.as_fd(), self.config.listing_capacity)?;
        debug!(members = listing.len(), "traversal started");
        self.frames.push(Frame { listing });
        self.stream = Some(stream);
        self.state = State::Suspended;
        Ok(())
    }

    /// Enter the subdirectory `name` of the active directory. The parent's
    /// cursor has already moved past it.
    fn descend(&mut self, name: OsString) -> Result<(), WalkError> {
        let Some(parent) = self.stream.as_ref() else {
            return Err(WalkError::Defunct);
        };
        let child = rustix::fs::openat(
            parent.as_fd(),
            name.as_os_str(),
            dir_open_flags(),
            Mode::empty(),
        )
        .map_err(|errno| WalkError::descend(name.clone(), errno.into()))?;
        let stream = DirStream::from_fd(child).map_err(|err| WalkError::descend(name.clone(), err))?;
        let listing = Listing::build(stream.as_fd(), self.config.listing_capacity)?;
        trace!(name = ?name, depth = self.frames.len(), members = listing.len(), "descending");
        self.frames.push(Frame { listing });
        // Replacing the stream closes the parent's descriptor.
        self.stream = Some(stream);
        Ok(())
    }

    /// Return to the parent after exhausting the active directory.
    ///
    /// The parent's descriptor was consumed when this level was entered,
    /// so it is reopened through the child's `..` before the child's
    /// stream is released.
    fn ascend(&mut self) -> Result<(), WalkError> {
        let Some(child) = self.stream.as_ref() else {
            return Err(WalkError::Defunct);
        };
        let parent_fd = rustix::fs::openat(child.as_fd(), "..", dir_open_flags(), Mode::empty())
            .map_err(|errno| WalkError::ascend(errno.into()))?;
        let parent = DirStream::from_fd(parent_fd).map_err(WalkError::ascend)?;
        self.frames.pop();
        self.stream = Some(parent);
        trace!(depth = self.frames.len().saturating_sub(1), "ascending");
        Ok(())
    }

    /// Open the regular file `name` in the active directory and hand it to
    /// the caller. The cursor has already moved past it.
    fn produce(&mut self, name: OsString) -> Result<FileEntry, WalkError> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(WalkError::Defunct);
        };
        let handle = rustix::fs::openat(
            stream.as_fd(),
            name.as_os_str(),
            OFlags::RDONLY | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(|errno| WalkError::open(name.clone(), errno.into()))?;
        let depth = self.frames.len() - 1;
        self.state = State::Suspended;
        trace!(name = ?name, depth, "produced file");
        Ok(FileEntry {
            handle,
            name,
            depth,
        })
    }

    /// Kind and name of the member under the active cursor, re-reading the
    /// name from the stream if it was scrubbed.
    fn current_member(&mut self) -> Result<(EntryKind, OsString), WalkError> {
        let (Some(frame), Some(stream)) = (self.frames.last_mut(), self.stream.as_mut()) else {
            return Err(WalkError::Defunct);
        };
        let kind = frame.listing.current_kind();
        let name = frame.listing.take_current_name(stream)?;
        Ok((kind, name))
    }

    fn active_exhausted(&self) -> bool {
        self.frames.last().map_or(true, |f| f.listing.exhausted())
    }

    fn advance(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.listing.advance();
        }
    }

    /// Natural completion: drop the root frame and the active stream.
    fn finish(&mut self) {
        trace!("traversal complete");
        self.stream = None;
        self.frames.clear();
        self.state = State::Finished;
    }

    /// Single exit path for every failure: release all descriptors and
    /// cached names, leave the context defunct.
    fn teardown(&mut self) {
        self.stream = None;
        self.frames.clear();
        self.state = State::Failed;
    }
}

impl Iterator for Traversal<'_> {
    type Item = Result<FileEntry, WalkError>;

    /// An error is yielded once; afterwards the iterator is fused.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_file() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(WalkError::Defunct) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

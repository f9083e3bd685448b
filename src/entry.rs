use std::ffi::OsString;

use rustix::fs::FileType;

use crate::stream::SeekLoc;

/// The kind of a directory member.
///
/// Recorded while the directory is first enumerated and retained for the
/// member's whole lifetime, even after its name has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    /// A regular file.
    File,

    /// A directory.
    Dir,

    /// A symbolic link.
    Symlink,

    /// Anything else (device files, pipes, sockets, etc.).
    Other,
}

impl EntryKind {
    /// Classify a `d_type` byte. `None` means the filesystem did not say
    /// and the member must be stat'ed instead.
    pub(crate) fn from_d_type(d_type: u8) -> Option<Self> {
        match d_type {
            libc::DT_DIR => Some(Self::Dir),
            libc::DT_REG => Some(Self::File),
            libc::DT_LNK => Some(Self::Symlink),
            libc::DT_UNKNOWN => None,
            _ => Some(Self::Other),
        }
    }

    pub(crate) fn from_file_type(file_type: FileType) -> Self {
        match file_type {
            FileType::Directory => Self::Dir,
            FileType::RegularFile => Self::File,
            FileType::Symlink => Self::Symlink,
            _ => Self::Other,
        }
    }

    /// Members visited ahead of regular files within one directory.
    pub(crate) fn descends_first(self) -> bool {
        matches!(self, Self::Dir | Self::Symlink)
    }
}

/// In-memory knowledge of a member's name.
///
/// A listing holds every name it read only until ordering has finished;
/// after that, all but the entry under the cursor are released and carried
/// as a stream position to be re-read on demand. The variant makes the
/// "reconstruct before use" obligation explicit instead of a null check.
pub(crate) enum Name {
    /// Name held in memory, plus where the member sits in the stream.
    Cached { name: OsString, pos: SeekLoc },

    /// Name released; only the stream position remains.
    Deferred { pos: SeekLoc },
}

/// One directory member: classification plus a cached-or-deferred name.
pub(crate) struct Entry {
    pub kind: EntryKind,
    pub name: Name,
}

impl Entry {
    pub(crate) fn pos(&self) -> SeekLoc {
        match self.name {
            Name::Cached { pos, .. } | Name::Deferred { pos } => pos,
        }
    }

    /// Drop the in-memory name, keeping kind and position.
    pub(crate) fn scrub(&mut self) {
        let pos = self.pos();
        self.name = Name::Deferred { pos };
    }

    /// Name bytes while still cached; empty once scrubbed. Ordering runs
    /// before any scrubbing, so the empty case is never compared.
    pub(crate) fn sort_key(&self) -> &[u8] {
        use std::os::unix::ffi::OsStrExt;
        match &self.name {
            Name::Cached { name, .. } => name.as_bytes(),
            Name::Deferred { .. } => &[],
        }
    }
}

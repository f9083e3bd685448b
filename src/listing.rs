use std::cmp::Ordering;
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::fd::BorrowedFd;

use rustix::fs::{AtFlags, FileType};

use crate::entry::{Entry, EntryKind, Name};
use crate::error::WalkError;
use crate::stream::DirStream;

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// The ordered members of one directory, with a cursor marking the next
/// unprocessed one.
///
/// Built once per directory visit. Every name past index 0 is released
/// right after ordering and re-read from the stream when the cursor reaches
/// it, so a huge directory costs one `Entry` per member, not one name.
pub(crate) struct Listing {
    entries: Vec<Entry>,
    cursor: usize,
}

impl Listing {
    /// Enumerate, order, and scrub one directory.
    ///
    /// Reads through a private duplicate of `dir`, so the caller's stream
    /// position survives. A directory that yields no members at all is
    /// reported as a failure, like any read error.
    pub fn build(dir: BorrowedFd<'_>, initial_capacity: usize) -> Result<Self, WalkError> {
        let mut entries = read_members(dir, initial_capacity)?;
        order(&mut entries);
        let mut listing = Self { entries, cursor: 0 };
        listing.scrub_from(1);
        Ok(listing)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn exhausted(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Kind of the entry under the cursor. Callers check `exhausted` first.
    pub fn current_kind(&self) -> EntryKind {
        self.entries[self.cursor].kind
    }

    /// Name of the entry under the cursor, re-read from `stream` if it was
    /// scrubbed. The in-memory copy is released either way; each entry is
    /// consumed exactly once as the cursor passes it.
    pub fn take_current_name(&mut self, stream: &mut DirStream) -> Result<OsString, WalkError> {
        let entry = &mut self.entries[self.cursor];
        let pos = entry.pos();
        match std::mem::replace(&mut entry.name, Name::Deferred { pos }) {
            Name::Cached { name, .. } => Ok(name),
            Name::Deferred { pos } => {
                stream.seek(pos);
                let raw = stream.read().map_err(WalkError::listing)?.ok_or_else(|| {
                    WalkError::listing(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "directory member vanished on re-read",
                    ))
                })?;
                Ok(raw.name)
            }
        }
    }

    fn scrub_from(&mut self, start: usize) {
        for entry in self.entries.iter_mut().skip(start) {
            entry.scrub();
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn read_members(dir: BorrowedFd<'_>, initial_capacity: usize) -> Result<Vec<Entry>, WalkError> {
    let dup = dir.try_clone_to_owned().map_err(WalkError::listing)?;
    let mut stream = DirStream::from_fd(dup).map_err(WalkError::listing)?;
    stream.rewind();

    let mut entries = Vec::with_capacity(initial_capacity);
    loop {
        // Position first, so the member can be re-located exactly later.
        let pos = stream.tell();
        let Some(raw) = stream.read().map_err(WalkError::listing)? else {
            break;
        };
        let kind = match EntryKind::from_d_type(raw.d_type) {
            Some(kind) => kind,
            None => stat_kind(dir, &raw.name)?,
        };
        entries.push(Entry {
            kind,
            name: Name::Cached {
                name: raw.name,
                pos,
            },
        });
    }

    if entries.is_empty() {
        return Err(WalkError::listing(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "directory stream yielded no members",
        )));
    }

    entries.shrink_to_fit();
    Ok(entries)
}

/// Fallback for filesystems that report `DT_UNKNOWN`: classify by stat,
/// without following symlinks.
fn stat_kind(dir: BorrowedFd<'_>, name: &OsStr) -> Result<EntryKind, WalkError> {
    let stat = rustix::fs::statat(dir, name, AtFlags::SYMLINK_NOFOLLOW)
        .map_err(|errno| WalkError::listing(errno.into()))?;
    Ok(EntryKind::from_file_type(FileType::from_raw_mode(
        stat.st_mode,
    )))
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Case-insensitive name order, then members that descend ahead of regular
/// files, stably within each group.
fn order(entries: &mut [Entry]) {
    entries.sort_by(|a, b| caseless_cmp(a.sort_key(), b.sort_key()));

    // Stable partition: each descending member found past the boundary is
    // rotated into place one slot at a time, shifting the run of regular
    // files between boundary and member without reordering it.
    let mut boundary = 0;
    for i in 0..entries.len() {
        if entries[i].kind.descends_first() {
            entries[boundary..=i].rotate_right(1);
            boundary += 1;
        }
    }
}

fn caseless_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let fold = |byte: &u8| byte.to_ascii_lowercase();
    a.iter().map(fold).cmp(b.iter().map(fold))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SeekLoc;

    fn entry(name: &str, kind: EntryKind) -> Entry {
        Entry {
            kind,
            name: Name::Cached {
                name: name.into(),
                pos: SeekLoc(0),
            },
        }
    }

    fn names(entries: &[Entry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| String::from_utf8_lossy(e.sort_key()).into_owned())
            .collect()
    }

    #[test]
    fn orders_caseless_with_directories_first() {
        let mut list = vec![
            entry("zeta.txt", EntryKind::File),
            entry("Beta", EntryKind::Dir),
            entry("alpha.txt", EntryKind::File),
            entry("Gamma.txt", EntryKind::File),
            entry("delta", EntryKind::Dir),
        ];
        order(&mut list);
        assert_eq!(
            names(&list),
            ["Beta", "delta", "alpha.txt", "Gamma.txt", "zeta.txt"]
        );
    }

    #[test]
    fn partition_is_stable_for_both_groups() {
        let mut list = vec![
            entry("a.txt", EntryKind::File),
            entry("b", EntryKind::Dir),
            entry("c.txt", EntryKind::File),
            entry("d", EntryKind::Symlink),
            entry("e.txt", EntryKind::File),
            entry("f", EntryKind::Dir),
        ];
        order(&mut list);
        assert_eq!(names(&list), ["b", "d", "f", "a.txt", "c.txt", "e.txt"]);
    }

    #[test]
    fn symlinks_group_with_directories() {
        let mut list = vec![
            entry("file.txt", EntryKind::File),
            entry("link", EntryKind::Symlink),
        ];
        order(&mut list);
        assert_eq!(names(&list), ["link", "file.txt"]);
    }

    #[test]
    fn scrub_keeps_kind_and_position() {
        let mut e = entry("name", EntryKind::File);
        let pos = e.pos();
        e.scrub();
        assert_eq!(e.pos(), pos);
        assert_eq!(e.kind, EntryKind::File);
        assert!(matches!(e.name, Name::Deferred { .. }));
        assert!(e.sort_key().is_empty());
    }
}

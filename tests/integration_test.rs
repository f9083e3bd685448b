use std::fs;
use std::io::Read;
use std::os::unix::fs::symlink;
use std::path::Path;

use fdwalk::{open_root, walk, WalkError};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Run a full traversal of `root` and collect the yielded names in order.
fn collect_names(root: &Path) -> Vec<String> {
    let fd = open_root(root).unwrap();
    walk(&fd)
        .build()
        .map(|file| file.unwrap().name.to_string_lossy().into_owned())
        .collect()
}

/// Create a temporary directory tree for the ordering tests.
///
/// Structure:
/// ```text
/// tmp/
///   notes.md
///   Readme.txt
///   archive/
///     2023.log
///     older/
///       a.log
///   build/
///     out.bin
/// ```
fn setup_ordering_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    fs::write(root.join("notes.md"), "notes").unwrap();
    fs::write(root.join("Readme.txt"), "readme").unwrap();

    let archive = root.join("archive");
    fs::create_dir(&archive).unwrap();
    fs::write(archive.join("2023.log"), "log").unwrap();
    let older = archive.join("older");
    fs::create_dir(&older).unwrap();
    fs::write(older.join("a.log"), "old log").unwrap();

    let build = root.join("build");
    fs::create_dir(&build).unwrap();
    fs::write(build.join("out.bin"), "bin").unwrap();

    dir
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[test]
fn empty_subdirectory_contributes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.txt"), "b").unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();

    assert_eq!(collect_names(dir.path()), ["a.txt", "b.txt"]);
}

#[test]
fn directories_come_before_sibling_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    let sub = dir.path().join("z");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("f.txt"), "f").unwrap();

    // `z/` is entered before `a.txt` is produced, despite sorting after it.
    assert_eq!(collect_names(dir.path()), ["f.txt", "a.txt"]);
}

#[test]
fn names_order_case_insensitively_within_groups() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("B.txt"), "").unwrap();
    fs::write(dir.path().join("a.txt"), "").unwrap();
    fs::write(dir.path().join("C.txt"), "").unwrap();

    assert_eq!(collect_names(dir.path()), ["a.txt", "B.txt", "C.txt"]);
}

#[test]
fn nested_traversal_is_depth_first() {
    let dir = setup_ordering_dir();

    // Within archive/, the subdirectory older/ is entered before 2023.log
    // is produced, even though "2023.log" sorts first by name.
    assert_eq!(
        collect_names(dir.path()),
        ["a.log", "2023.log", "out.bin", "notes.md", "Readme.txt"]
    );
}

#[test]
fn matches_walkdir_reference_order() {
    let dir = setup_ordering_dir();

    let reference: Vec<String> = walkdir::WalkDir::new(dir.path())
        .sort_by(|a, b| {
            let key = |e: &walkdir::DirEntry| {
                (
                    !e.file_type().is_dir(),
                    e.file_name().to_ascii_lowercase(),
                )
            };
            key(a).cmp(&key(b))
        })
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
        })
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();

    assert_eq!(collect_names(dir.path()), reference);
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

#[test]
fn dot_prefixed_names_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".hidden"), "secret").unwrap();
    fs::write(dir.path().join("x.txt"), "x").unwrap();

    assert_eq!(collect_names(dir.path()), ["x.txt"]);
}

#[test]
fn hidden_directories_are_not_entered() {
    let dir = tempfile::tempdir().unwrap();
    let hidden = dir.path().join(".git");
    fs::create_dir(&hidden).unwrap();
    fs::write(hidden.join("config"), "cfg").unwrap();
    fs::write(dir.path().join("visible.txt"), "v").unwrap();

    assert_eq!(collect_names(dir.path()), ["visible.txt"]);
}

#[test]
fn symlinks_are_skipped_not_followed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("target.txt"), "t").unwrap();
    symlink(dir.path().join("target.txt"), dir.path().join("link.txt")).unwrap();

    let sub = dir.path().join("real");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("inner.txt"), "i").unwrap();
    symlink(&sub, dir.path().join("alias")).unwrap();

    // Each file appears exactly once; neither link is yielded or entered.
    assert_eq!(collect_names(dir.path()), ["inner.txt", "target.txt"]);
}

// ---------------------------------------------------------------------------
// Termination and state
// ---------------------------------------------------------------------------

#[test]
fn deep_empty_tree_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut path = dir.path().to_path_buf();
    for level in 0..24 {
        path.push(format!("level{level}"));
    }
    fs::create_dir_all(&path).unwrap();

    assert!(collect_names(dir.path()).is_empty());
}

#[test]
fn depth_exceeding_initial_stack_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let mut path = dir.path().to_path_buf();
    for level in 0..40 {
        path.push(format!("d{level}"));
    }
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("leaf.txt"), "leaf").unwrap();

    let fd = open_root(dir.path()).unwrap();
    let mut traversal = walk(&fd).stack_capacity(4).build();

    let file = traversal.next_file().unwrap().unwrap();
    assert_eq!(file.name.to_string_lossy(), "leaf.txt");
    assert_eq!(file.depth, 40);
    assert!(traversal.next_file().unwrap().is_none());
}

#[test]
fn end_of_traversal_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("only.txt"), "only").unwrap();

    let fd = open_root(dir.path()).unwrap();
    let mut traversal = walk(&fd).build();

    assert!(traversal.next_file().unwrap().is_some());
    for _ in 0..3 {
        assert!(traversal.next_file().unwrap().is_none());
    }
}

#[test]
fn root_descriptor_stays_usable_after_traversal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("f.txt"), "f").unwrap();

    let fd = open_root(dir.path()).unwrap();
    for _ in 0..2 {
        let names: Vec<String> = walk(&fd)
            .build()
            .map(|file| file.unwrap().name.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["f.txt"]);
    }
}

#[test]
fn independent_traversals_interleave() {
    let dir = setup_ordering_dir();
    let fd = open_root(dir.path()).unwrap();

    let mut first = walk(&fd).build();
    let mut second = walk(&fd).build();

    let mut seen_first = Vec::new();
    let mut seen_second = Vec::new();
    loop {
        let a = first.next_file().unwrap();
        let b = second.next_file().unwrap();
        match (a, b) {
            (Some(a), Some(b)) => {
                seen_first.push(a.name.to_string_lossy().into_owned());
                seen_second.push(b.name.to_string_lossy().into_owned());
            }
            (None, None) => break,
            _ => panic!("interleaved traversals diverged"),
        }
    }
    assert_eq!(seen_first, seen_second);
    assert_eq!(
        seen_first,
        ["a.log", "2023.log", "out.bin", "notes.md", "Readme.txt"]
    );
}

// ---------------------------------------------------------------------------
// Yielded handles
// ---------------------------------------------------------------------------

#[test]
fn yielded_handle_reads_the_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("payload.txt"), "the payload").unwrap();

    let fd = open_root(dir.path()).unwrap();
    let file = walk(&fd).build().next_file().unwrap().unwrap();
    assert_eq!(file.name.to_string_lossy(), "payload.txt");

    let mut contents = String::new();
    file.into_file().read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "the payload");
}

#[test]
fn depth_reflects_nesting_level() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("top.txt"), "").unwrap();
    let sub = dir.path().join("a");
    fs::create_dir(&sub).unwrap();
    fs::write(sub.join("mid.txt"), "").unwrap();
    let subsub = sub.join("b");
    fs::create_dir(&subsub).unwrap();
    fs::write(subsub.join("deep.txt"), "").unwrap();

    let fd = open_root(dir.path()).unwrap();
    let depths: Vec<(String, usize)> = walk(&fd)
        .build()
        .map(|file| {
            let file = file.unwrap();
            (file.name.to_string_lossy().into_owned(), file.depth)
        })
        .collect();

    assert_eq!(
        depths,
        [
            ("deep.txt".to_string(), 2),
            ("mid.txt".to_string(), 1),
            ("top.txt".to_string(), 0),
        ]
    );
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[test]
fn non_directory_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, "not a directory").unwrap();

    let fd = fs::File::open(&path).unwrap();
    let mut traversal = walk(&fd).build();

    assert!(matches!(
        traversal.next_file(),
        Err(WalkError::InvalidRoot(_))
    ));
}

#[test]
fn failed_context_is_defunct() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, "").unwrap();

    let fd = fs::File::open(&path).unwrap();
    let mut traversal = walk(&fd).build();

    assert!(traversal.next_file().is_err());
    assert!(matches!(traversal.next_file(), Err(WalkError::Defunct)));
}

#[test]
fn iterator_yields_an_error_once_then_fuses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, "").unwrap();

    let fd = fs::File::open(&path).unwrap();
    let mut traversal = walk(&fd).build();

    assert!(matches!(traversal.next(), Some(Err(_))));
    assert!(traversal.next().is_none());
    assert!(traversal.next().is_none());
}

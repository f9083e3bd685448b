use std::os::fd::BorrowedFd;

use crate::engine::{Config, Traversal};

/// Initial member-list capacity; a directory that outgrows it doubles.
const DEFAULT_LISTING_CAPACITY: usize = 32;

/// Initial frame-stack capacity; a walk that goes deeper doubles it.
const DEFAULT_STACK_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// WalkBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring a traversal.
///
/// Created via [`fdwalk::walk()`](crate::walk). Configure with chained
/// builder methods, then call [`build()`](WalkBuilder::build) to obtain the
/// [`Traversal`]. Nothing is opened until the first
/// [`next_file()`](Traversal::next_file) call.
///
/// # Example
///
/// ```rust,no_run
/// # fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let root = fdwalk::open_root("/var/spool")?;
/// let mut walk = fdwalk::walk(&root)
///     .listing_capacity(256)
///     .build();
/// while let Some(file) = walk.next_file()? {
///     println!("{}", file.name.to_string_lossy());
/// }
/// # Ok(())
/// # }
/// ```
pub struct WalkBuilder<'fd> {
    root: BorrowedFd<'fd>,
    listing_capacity: usize,
    stack_capacity: usize,
}

impl<'fd> WalkBuilder<'fd> {
    pub(crate) fn new(root: BorrowedFd<'fd>) -> Self {
        Self {
            root,
            listing_capacity: DEFAULT_LISTING_CAPACITY,
            stack_capacity: DEFAULT_STACK_CAPACITY,
        }
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Initial capacity of each directory's member list.
    ///
    /// Purely a growth hint: lists double whenever exceeded and are
    /// trimmed to exact size once the directory has been read. Raise it
    /// when the tree is known to hold wide directories.
    pub fn listing_capacity(mut self, n: usize) -> Self {
        self.listing_capacity = n;
        self
    }

    /// Initial capacity of the traversal stack, one slot per tree level.
    ///
    /// The stack doubles when the walk goes deeper and never shrinks
    /// during a traversal.
    pub fn stack_capacity(mut self, n: usize) -> Self {
        self.stack_capacity = n;
        self
    }

    // ── Build ─────────────────────────────────────────────────────────────

    /// Finish configuration and return the traversal context.
    ///
    /// The root descriptor stays borrowed for the context's lifetime; the
    /// caller must keep it open. Root validation happens on the first
    /// `next_file` call, which reports
    /// [`WalkError::InvalidRoot`](crate::WalkError::InvalidRoot) for a
    /// descriptor that is closed or not a directory.
    pub fn build(self) -> Traversal<'fd> {
        Traversal::new(
            self.root,
            Config {
                listing_capacity: self.listing_capacity,
                stack_capacity: self.stack_capacity,
            },
        )
    }
}

use std::ffi::{OsStr, OsString};
use std::io;

use thiserror::Error;

/// Why a traversal stopped.
///
/// Every failure is terminal: the context releases each descriptor and
/// cached name it holds before the error reaches the caller, and cannot be
/// resumed or retried afterwards. Start a fresh traversal instead.
#[derive(Error, Debug)]
pub enum WalkError {
    /// The root descriptor could not be duplicated or read as a directory.
    #[error("invalid root descriptor")]
    InvalidRoot(#[source] io::Error),

    /// A directory could not be enumerated.
    #[error("cannot enumerate directory")]
    Listing(#[source] io::Error),

    /// A discovered subdirectory could not be opened.
    #[error("cannot open subdirectory {name:?}")]
    Descend {
        name: OsString,
        #[source]
        source: io::Error,
    },

    /// A discovered regular file could not be opened.
    #[error("cannot open file {name:?}")]
    Open {
        name: OsString,
        #[source]
        source: io::Error,
    },

    /// The parent directory could not be reopened after a child was
    /// exhausted.
    #[error("cannot reopen parent directory")]
    Ascend(#[source] io::Error),

    /// The context already failed and holds nothing; a fresh traversal is
    /// required.
    #[error("traversal context is defunct")]
    Defunct,
}

impl WalkError {
    pub(crate) fn invalid_root(source: io::Error) -> Self {
        Self::InvalidRoot(source)
    }

    pub(crate) fn listing(source: io::Error) -> Self {
        Self::Listing(source)
    }

    pub(crate) fn descend(name: OsString, source: io::Error) -> Self {
        Self::Descend { name, source }
    }

    pub(crate) fn open(name: OsString, source: io::Error) -> Self {
        Self::Open { name, source }
    }

    pub(crate) fn ascend(source: io::Error) -> Self {
        Self::Ascend(source)
    }

    /// The directory member involved, when the failure names one.
    /// Callers can include the offending member in diagnostics without
    /// pattern matching on variants.
    pub fn name(&self) -> Option<&OsStr> {
        match self {
            Self::Descend { name, .. } | Self::Open { name, .. } => Some(name),
            _ => None,
        }
    }
}

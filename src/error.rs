//! Link error types.

use std::path::PathBuf;

use crate::coff::TryFromRelocationTypeError;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("{}: {error}", .path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },

    /// A structurally broken object, archive, or import entry.
    #[error("{0}")]
    Malformed(#[from] FileError),

    #[error("duplicate symbol: {name} defined in {first} and {second}")]
    DuplicateSymbol {
        name: String,
        first: String,
        second: String,
    },

    #[error("{0}")]
    Unresolved(UnresolvedSymbols),

    #[error("{file}: {error}")]
    UnsupportedRelocation {
        file: String,
        error: TryFromRelocationTypeError,
    },

    #[error("no input files")]
    NoInput,
}

/// An input file error carrying the originating path and, for archive
/// members, the member name.
#[derive(Debug, thiserror::Error)]
#[error(
    "{file}{}: {error}",
    .member.as_ref().map(|m| format!("({m})")).unwrap_or_default()
)]
pub struct FileError {
    pub file: String,
    pub member: Option<String>,
    pub error: MalformedKind,
}

impl FileError {
    pub fn new(file: impl Into<String>, error: impl Into<MalformedKind>) -> FileError {
        Self {
            file: file.into(),
            member: None,
            error: error.into(),
        }
    }

    pub fn in_member(
        file: impl Into<String>,
        member: impl Into<String>,
        error: impl Into<MalformedKind>,
    ) -> FileError {
        Self {
            file: file.into(),
            member: Some(member.into()),
            error: error.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MalformedKind {
    #[error("{0}")]
    Object(#[from] object::read::Error),

    #[error("not a COFF object, archive, or short import entry")]
    UnknownFileType,

    #[error("unsupported machine type {0:#06x}, expected IMAGE_FILE_MACHINE_AMD64")]
    Machine(u16),

    #[error("{0}")]
    Other(String),
}

impl From<String> for MalformedKind {
    fn from(value: String) -> Self {
        Self::Other(value)
    }
}

/// The full set of names still undefined after resolution.
#[derive(Debug, thiserror::Error)]
#[error("{}", display_unresolved(.0))]
pub struct UnresolvedSymbols(pub Vec<String>);

fn display_unresolved(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("undefined symbol: {name}"))
        .collect::<Vec<_>>()
        .join("\n")
}

//! Input file handling.
//!
//! Input files are memory mapped once and owned by the [`InputStore`] arena
//! for the whole link; every chunk and symbol name is a slice into those
//! buffers. Archive members are parsed lazily when the resolver demands
//! them, and each member is handed out at most once.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use memmap2::Mmap;
use object::{
    coff::ImportFile,
    read::archive::{ArchiveFile, ArchiveOffset},
};
use typed_arena::Arena;

use crate::{
    chunks::ChunkId,
    error::{FileError, LinkError, MalformedKind},
    symbols::SymbolId,
};

/// Index of an object file in the link-wide file list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FileId(pub u32);

impl FileId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an input came from, for diagnostics.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: String,
    pub member: Option<String>,
}

impl FileSource {
    pub fn new(path: impl Into<String>) -> FileSource {
        Self {
            path: path.into(),
            member: None,
        }
    }

    pub fn member(path: impl Into<String>, member: impl Into<String>) -> FileSource {
        Self {
            path: path.into(),
            member: Some(member.into()),
        }
    }

    pub fn error(&self, error: impl Into<MalformedKind>) -> LinkError {
        LinkError::Malformed(match &self.member {
            Some(member) => FileError::in_member(self.path.as_str(), member.as_str(), error),
            None => FileError::new(self.path.as_str(), error),
        })
    }
}

impl std::fmt::Display for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}({member})", self.path),
            None => f.write_str(&self.path),
        }
    }
}

enum BufferData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

/// A loaded input file.
pub struct InputBuffer {
    path: PathBuf,
    data: BufferData,
}

impl InputBuffer {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        match &self.data {
            BufferData::Mapped(map) => map,
            BufferData::Owned(data) => data,
        }
    }
}

/// Arena owning all input file buffers and derived name strings.
///
/// The store must outlive the symbol table; everything the link graph
/// borrows points into it.
#[derive(Default)]
pub struct InputStore {
    buffers: Arena<InputBuffer>,
    strings: Arena<Vec<u8>>,
}

impl InputStore {
    pub fn new() -> InputStore {
        Self::default()
    }

    /// Maps a file read-only, falling back to an owned read if the platform
    /// refuses the mapping.
    pub fn open(&self, path: &Path) -> Result<&InputBuffer, LinkError> {
        let io_err = |error| LinkError::Io {
            path: path.to_path_buf(),
            error,
        };

        let file = std::fs::File::open(path).map_err(io_err)?;
        let data = match unsafe { Mmap::map(&file) } {
            Ok(map) => BufferData::Mapped(map),
            Err(_) => BufferData::Owned(std::fs::read(path).map_err(io_err)?),
        };

        Ok(self.buffers.alloc(InputBuffer {
            path: path.to_path_buf(),
            data,
        }))
    }

    /// Interns a derived byte string (synthesized symbol names).
    pub fn alloc_bytes(&self, bytes: Vec<u8>) -> &[u8] {
        self.strings.alloc(bytes).as_slice()
    }
}

/// The three input kinds, discriminated on file magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Object,
    Archive,
    Import,
}

/// Sniffs the input kind. Objects are only identified tentatively; the COFF
/// parser validates them properly.
pub fn identify(data: &[u8]) -> Option<FileKind> {
    if data.starts_with(b"!<arch>\n") {
        Some(FileKind::Archive)
    } else if data.len() >= 20 && data[..2] == [0x00, 0x00] && data[2..4] == [0xff, 0xff] {
        Some(FileKind::Import)
    } else if data.len() >= 2 {
        Some(FileKind::Object)
    } else {
        None
    }
}

/// A parsed object file's place in the link graph.
///
/// `sparse_chunks` is indexed by 1-based COFF section number and
/// `sparse_symbols` by COFF symbol table index, so relocations can resolve
/// their targets without another name lookup. Entries for dropped sections
/// and skipped symbols stay `None`.
#[derive(Debug)]
pub struct ObjectFile<'a> {
    pub source: FileSource,
    pub sparse_chunks: Vec<Option<ChunkId>>,
    pub sparse_symbols: Vec<Option<SymbolId>>,

    /// Raw `.drectve` payload, trimmed. Captured for the driver; the core
    /// does not interpret it.
    pub directives: Option<&'a [u8]>,
}

/// An opened archive with its symbol index.
pub struct LinkArchive<'a> {
    pub path: String,
    data: &'a [u8],
    archive: ArchiveFile<'a>,

    /// The archive symbol index, linker sentinels excluded.
    pub symbols: Vec<(&'a [u8], ArchiveOffset)>,

    /// Start addresses of members already handed out.
    seen: HashSet<usize>,
}

impl<'a> LinkArchive<'a> {
    pub fn parse(path: String, data: &'a [u8]) -> Result<LinkArchive<'a>, LinkError> {
        let file_err =
            |error: object::read::Error| LinkError::Malformed(FileError::new(path.as_str(), error));

        let archive = ArchiveFile::parse(data).map_err(file_err)?;

        let iter = archive.symbols().map_err(file_err)?.ok_or_else(|| {
            LinkError::Malformed(FileError::new(
                path.as_str(),
                "archive is missing a symbol table".to_string(),
            ))
        })?;

        let mut symbols = Vec::new();
        for symbol in iter {
            let symbol = symbol.map_err(file_err)?;
            if symbol.name() != b"__NULL_IMPORT_DESCRIPTOR" {
                symbols.push((symbol.name(), symbol.offset()));
            }
        }

        Ok(Self {
            path,
            data,
            archive,
            symbols,
            seen: HashSet::new(),
        })
    }

    /// Returns the named member's data, or `None` if the member was already
    /// extracted earlier in the link.
    pub fn member(
        &mut self,
        offset: ArchiveOffset,
    ) -> Result<Option<(String, &'a [u8])>, LinkError> {
        let member = self
            .archive
            .member(offset)
            .map_err(|error| LinkError::Malformed(FileError::new(self.path.as_str(), error)))?;

        let name = String::from_utf8_lossy(member.name()).into_owned();
        let data = member.data(self.data).map_err(|error| {
            LinkError::Malformed(FileError::in_member(
                self.path.as_str(),
                name.as_str(),
                error,
            ))
        })?;

        if !self.seen.insert(data.as_ptr() as usize) {
            return Ok(None);
        }

        Ok(Some((name, data)))
    }
}

/// A short-form import entry.
#[derive(Debug, Clone)]
pub struct ImportMember<'a> {
    pub architecture: object::Architecture,

    /// The public symbol name.
    pub symbol: &'a [u8],

    /// The DLL the symbol is imported from.
    pub dll: &'a [u8],

    /// The name exported from the DLL.
    pub import: object::read::coff::ImportName<'a>,

    /// Whether the import is executable code.
    pub is_code: bool,
}

impl<'a> ImportMember<'a> {
    pub fn parse(data: &'a [u8]) -> Result<ImportMember<'a>, object::read::Error> {
        let file = ImportFile::parse(data)?;
        Ok(Self {
            architecture: file.architecture(),
            symbol: file.symbol(),
            dll: file.dll(),
            import: file.import(),
            is_code: matches!(file.import_type(), object::read::coff::ImportType::Code),
        })
    }
}

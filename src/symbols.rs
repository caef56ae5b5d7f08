//! Symbol bodies and the handles that tie the link graph together.
//!
//! Every name that takes part in resolution gets exactly one slot in the
//! symbol table; [`SymbolId`] is the stable handle to that slot. Relocations
//! and weak aliases reference the `SymbolId`, never the body, so the
//! resolver can swap an `Undefined` for a definition without touching any
//! edges.

use object::read::archive::ArchiveOffset;

use crate::{chunks::ChunkId, inputs::FileId};

/// Index of a symbol slot in the link-wide symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an opened archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArchiveId(pub u32);

impl ArchiveId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The current meaning of a symbol name.
#[derive(Debug, Clone)]
pub enum SymbolBody<'a> {
    /// Defined by a section of an input object.
    DefinedRegular {
        name: &'a [u8],
        file: FileId,
        chunk: ChunkId,
        value: u32,
    },

    /// A constant virtual address, not backed by any chunk.
    DefinedAbsolute { name: &'a [u8], va: u64 },

    /// A common symbol owning BSS storage.
    DefinedCommon {
        name: &'a [u8],
        chunk: ChunkId,
        size: u32,
    },

    /// An import address slot (`__imp_` name). `location` is set to the
    /// address-table slot once the import tables are built.
    DefinedImportData {
        name: &'a [u8],
        dll: &'a [u8],
        export: &'a [u8],
        location: Option<ChunkId>,
    },

    /// A callable trampoline for an imported function.
    DefinedImportFunc { name: &'a [u8], chunk: ChunkId },

    /// A reference with no definition yet. `alias` carries the
    /// weak-external fallback target when one was declared.
    Undefined {
        name: &'a [u8],
        alias: Option<SymbolId>,
    },

    /// An archive member that can provide a definition on demand.
    Lazy {
        name: &'a [u8],
        archive: ArchiveId,
        member: ArchiveOffset,
    },
}

impl<'a> SymbolBody<'a> {
    pub fn name(&self) -> &'a [u8] {
        match self {
            SymbolBody::DefinedRegular { name, .. }
            | SymbolBody::DefinedAbsolute { name, .. }
            | SymbolBody::DefinedCommon { name, .. }
            | SymbolBody::DefinedImportData { name, .. }
            | SymbolBody::DefinedImportFunc { name, .. }
            | SymbolBody::Undefined { name, .. }
            | SymbolBody::Lazy { name, .. } => name,
        }
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, SymbolBody::Undefined { .. } | SymbolBody::Lazy { .. })
    }

    /// The chunk providing this symbol's storage, if any.
    pub fn chunk(&self) -> Option<ChunkId> {
        match self {
            SymbolBody::DefinedRegular { chunk, .. }
            | SymbolBody::DefinedCommon { chunk, .. }
            | SymbolBody::DefinedImportFunc { chunk, .. } => Some(*chunk),
            SymbolBody::DefinedImportData { location, .. } => *location,
            _ => None,
        }
    }
}

/// Lossy display form of a symbol or section name.
pub fn display_name(name: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(name)
}

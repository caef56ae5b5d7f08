//! Units of output image content.
//!
//! Everything that occupies space in the final image is a [`Chunk`]: input
//! sections, BSS allocations for common symbols, import trampolines, and the
//! synthesized rows of the import directory. Chunks are stored in one flat
//! arena owned by the symbol table and referenced by [`ChunkId`] everywhere
//! else, so the chunk/symbol/relocation graph can be cyclic without any
//! ownership knots.

use object::pe;

use crate::{coff::SectionFlags, inputs::FileId, symbols::SymbolId};

/// Index of a chunk in the link-wide chunk arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ChunkId(pub u32);

impl ChunkId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The `jmp *imp` trampoline body used for imported functions.
pub const IMPORT_FUNC_DATA: [u8; 6] = [0xff, 0x25, 0x00, 0x00, 0x00, 0x00];

/// A contiguous unit of image content with uniform permissions.
///
/// `rva` and `file_off` stay zero until the writer assigns addresses;
/// `output_section` is the 0-based index of the output section the writer
/// placed the chunk in.
#[derive(Debug)]
pub struct Chunk<'a> {
    /// Section name used for output grouping, `$` suffix included.
    pub name: &'a [u8],
    pub align: u32,
    pub rva: u64,
    pub file_off: u64,
    pub live: bool,
    pub output_section: Option<usize>,
    pub kind: ChunkKind<'a>,
}

#[derive(Debug)]
pub enum ChunkKind<'a> {
    /// A section read from an input object.
    Section(SectionChunk<'a>),

    /// BSS storage allocated for a common symbol.
    Common(CommonChunk),

    /// A NUL-terminated string (DLL names).
    String(StringChunk),

    /// A 6-byte jump through an import address slot.
    ImportFunc(ImportFuncChunk),

    /// `{u16 hint, zstring name}` import hint/name entry, 2-aligned.
    HintName(HintNameChunk),

    /// An 8-byte import lookup or address slot.
    Lookup(LookupChunk),

    /// A 20-byte import directory entry.
    Directory(DirectoryChunk),

    /// Zero filler used to terminate the import tables.
    Null(NullChunk),
}

#[derive(Debug)]
pub struct SectionChunk<'a> {
    /// The object file this section came from.
    pub file: FileId,

    /// 1-based COFF section index inside that file.
    pub section_index: usize,

    pub characteristics: SectionFlags,

    /// Raw section bytes. Empty for uninitialized sections.
    pub data: &'a [u8],

    /// Allocation size for uninitialized sections.
    pub uninit_size: u32,

    pub relocs: &'a [pe::ImageRelocation],

    /// Sections that must be kept live iff this one is kept.
    pub children: Vec<ChunkId>,
    pub assoc_child: bool,
}

impl SectionChunk<'_> {
    pub fn is_bss(&self) -> bool {
        self.characteristics
            .contains(SectionFlags::CntUninitializedData)
    }

    pub fn is_comdat(&self) -> bool {
        self.characteristics.contains(SectionFlags::LnkComdat)
    }

    /// Garbage-collection roots are the plain data sections: anything that
    /// is not COMDAT, not tied to a parent section, and not code.
    pub fn is_root(&self) -> bool {
        !self.is_comdat()
            && !self.assoc_child
            && !self.characteristics.contains(SectionFlags::CntCode)
    }
}

#[derive(Debug)]
pub struct CommonChunk {
    pub size: u32,
}

#[derive(Debug)]
pub struct StringChunk {
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct ImportFuncChunk {
    /// The `__imp_` symbol whose address slot the jump goes through.
    pub imp: SymbolId,
}

#[derive(Debug)]
pub struct HintNameChunk {
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct LookupChunk {
    /// Hint/name entry this slot resolves to.
    pub hint_name: ChunkId,
}

#[derive(Debug)]
pub struct DirectoryChunk {
    pub dll_name: ChunkId,
    pub lookup_table: ChunkId,
    pub address_table: ChunkId,
}

#[derive(Debug)]
pub struct NullChunk {
    pub size: u32,
}

impl<'a> Chunk<'a> {
    pub fn section(
        name: &'a [u8],
        file: FileId,
        section_index: usize,
        characteristics: SectionFlags,
        data: &'a [u8],
        uninit_size: u32,
        relocs: &'a [pe::ImageRelocation],
    ) -> Chunk<'a> {
        Self {
            name,
            align: characteristics.alignment(),
            rva: 0,
            file_off: 0,
            // Section chunks wait for the garbage collector.
            live: false,
            output_section: None,
            kind: ChunkKind::Section(SectionChunk {
                file,
                section_index,
                characteristics,
                data,
                uninit_size,
                relocs,
                children: Vec::new(),
                assoc_child: false,
            }),
        }
    }

    pub fn common(size: u32) -> Chunk<'a> {
        Self::synthetic(b".bss", 8, ChunkKind::Common(CommonChunk { size }))
    }

    pub fn string(name: &'a [u8], value: &[u8]) -> Chunk<'a> {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value);
        data.push(0);
        Self::synthetic(name, 1, ChunkKind::String(StringChunk { data }))
    }

    pub fn import_func(imp: SymbolId) -> Chunk<'a> {
        Self::synthetic(b".text", 1, ChunkKind::ImportFunc(ImportFuncChunk { imp }))
    }

    pub fn hint_name(name: &'a [u8], hint: u16, export: &[u8]) -> Chunk<'a> {
        // Two bytes of hint, the NUL-terminated name, padded to even size.
        let mut data = vec![0u8; (export.len() + 4) & !1];
        data[..2].copy_from_slice(&hint.to_le_bytes());
        data[2..2 + export.len()].copy_from_slice(export);
        Self::synthetic(name, 2, ChunkKind::HintName(HintNameChunk { data }))
    }

    pub fn lookup(name: &'a [u8], hint_name: ChunkId) -> Chunk<'a> {
        Self::synthetic(name, 1, ChunkKind::Lookup(LookupChunk { hint_name }))
    }

    pub fn directory(name: &'a [u8], dll_name: ChunkId) -> Chunk<'a> {
        Self::synthetic(
            name,
            1,
            ChunkKind::Directory(DirectoryChunk {
                dll_name,
                // Filled once the lookup rows for the DLL exist.
                lookup_table: ChunkId(0),
                address_table: ChunkId(0),
            }),
        )
    }

    pub fn null(name: &'a [u8], size: u32) -> Chunk<'a> {
        Self::synthetic(name, 1, ChunkKind::Null(NullChunk { size }))
    }

    fn synthetic(name: &'a [u8], align: u32, kind: ChunkKind<'a>) -> Chunk<'a> {
        Self {
            name,
            align,
            rva: 0,
            file_off: 0,
            live: true,
            output_section: None,
            kind,
        }
    }

    pub fn size(&self) -> u64 {
        match &self.kind {
            ChunkKind::Section(sec) => {
                if sec.is_bss() {
                    sec.uninit_size as u64
                } else {
                    sec.data.len() as u64
                }
            }
            ChunkKind::Common(common) => common.size as u64,
            ChunkKind::String(string) => string.data.len() as u64,
            ChunkKind::ImportFunc(_) => IMPORT_FUNC_DATA.len() as u64,
            ChunkKind::HintName(hint) => hint.data.len() as u64,
            ChunkKind::Lookup(_) => 8,
            ChunkKind::Directory(_) => size_of::<pe::ImageImportDescriptor>() as u64,
            ChunkKind::Null(null) => null.size as u64,
        }
    }

    /// Raw bytes copied into the output buffer. Empty for BSS storage and
    /// for chunks whose contents exist only as relocation results.
    pub fn content(&self) -> &[u8] {
        match &self.kind {
            ChunkKind::Section(sec) => sec.data,
            ChunkKind::String(string) => &string.data,
            ChunkKind::ImportFunc(_) => &IMPORT_FUNC_DATA,
            ChunkKind::HintName(hint) => &hint.data,
            _ => &[],
        }
    }

    /// True for chunks that occupy memory but no file space.
    pub fn is_bss(&self) -> bool {
        match &self.kind {
            ChunkKind::Section(sec) => sec.is_bss(),
            ChunkKind::Common(_) => true,
            _ => false,
        }
    }

    pub fn permissions(&self) -> SectionFlags {
        match &self.kind {
            ChunkKind::Section(sec) => sec.characteristics.intersection(SectionFlags::PERM_MASK),
            ChunkKind::Common(_) => SectionFlags::CntUninitializedData
                | SectionFlags::MemRead
                | SectionFlags::MemWrite,
            ChunkKind::ImportFunc(_) => {
                SectionFlags::CntCode | SectionFlags::MemExecute | SectionFlags::MemRead
            }
            _ => SectionFlags::CntInitializedData | SectionFlags::MemRead,
        }
    }

    pub fn as_section(&self) -> Option<&SectionChunk<'a>> {
        match &self.kind {
            ChunkKind::Section(sec) => Some(sec),
            _ => None,
        }
    }

    pub fn as_section_mut(&mut self) -> Option<&mut SectionChunk<'a>> {
        match &mut self.kind {
            ChunkKind::Section(sec) => Some(sec),
            _ => None,
        }
    }
}

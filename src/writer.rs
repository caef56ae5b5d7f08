//! Image layout and emission.
//!
//! Groups the live chunks into output sections, assigns RVAs and file
//! offsets, then serializes the DOS stub, PE32+ headers, section table, and
//! section contents into one buffer and patches the AMD64 relocations in
//! place. The buffer is only handed back on success, so a failed link never
//! leaves a partial image behind.

use std::mem::offset_of;

use log::debug;
use object::{LittleEndian, U16, U32, U64, pe, pod::bytes_of};

use crate::{
    chunks::{ChunkId, ChunkKind},
    coff::{RelocationType, SectionFlags, strip_section_suffix},
    error::{LinkError, UnresolvedSymbols},
    imports::ImportTablesInfo,
    resolver::SymbolTable,
    symbols::{SymbolBody, display_name},
};

const PAGE_SIZE: u64 = 4096;
const FILE_ALIGNMENT: u64 = 512;
const DOS_STUB_SIZE: usize = 64;
const NUM_DATA_DIRECTORIES: usize = 16;

const PE_SIGNATURE_OFFSET: usize = DOS_STUB_SIZE;
const COFF_HEADER_OFFSET: usize = PE_SIGNATURE_OFFSET + 4;
const OPTIONAL_HEADER_OFFSET: usize = COFF_HEADER_OFFSET + size_of::<pe::ImageFileHeader>();
const DATA_DIRECTORY_OFFSET: usize =
    OPTIONAL_HEADER_OFFSET + size_of::<pe::ImageOptionalHeader64>();
const SECTION_TABLE_OFFSET: usize =
    DATA_DIRECTORY_OFFSET + NUM_DATA_DIRECTORIES * size_of::<pe::ImageDataDirectory>();

fn u16(v: u16) -> U16<LittleEndian> {
    U16::new(LittleEndian, v)
}
fn u32(v: u32) -> U32<LittleEndian> {
    U32::new(LittleEndian, v)
}
fn u64(v: u64) -> U64<LittleEndian> {
    U64::new(LittleEndian, v)
}

fn write_u16(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}
fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

// Relocation patches are additive: the object bytes may already carry an
// addend.
fn add16(buf: &mut [u8], off: usize, v: u16) {
    let cur = u16::from_le_bytes([buf[off], buf[off + 1]]);
    write_u16(buf, off, cur.wrapping_add(v));
}
fn add32(buf: &mut [u8], off: usize, v: u32) {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[off..off + 4]);
    write_u32(buf, off, u32::from_le_bytes(bytes).wrapping_add(v));
}
fn add64(buf: &mut [u8], off: usize, v: u64) {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[off..off + 8]);
    buf[off..off + 8].copy_from_slice(&u64::from_le_bytes(bytes).wrapping_add(v).to_le_bytes());
}

/// A section of the output image: an ordered run of chunks sharing one
/// stripped name.
struct OutputSection {
    name: Vec<u8>,
    chunks: Vec<ChunkId>,
    characteristics: SectionFlags,
    virtual_size: u64,
    raw_size: u64,
    rva: u64,
    file_off: u64,
}

pub struct Writer<'w, 'a> {
    link: &'w mut SymbolTable<'a>,
    imports: Option<ImportTablesInfo>,
    sections: Vec<OutputSection>,
    buffer: Vec<u8>,
    end_of_section_table: u64,
    size_of_image: u64,
    file_size: u64,
}

/// Lays out the live chunks and serializes the image.
pub fn write_image(
    link: &mut SymbolTable<'_>,
    imports: Option<ImportTablesInfo>,
) -> Result<Vec<u8>, LinkError> {
    let mut writer = Writer {
        link,
        imports,
        sections: Vec::new(),
        buffer: Vec::new(),
        end_of_section_table: 0,
        size_of_image: 0,
        file_size: 0,
    };

    writer.group_sections();
    writer.remove_empty_sections();
    writer.assign_addresses();
    writer.open_file();
    writer.write_header()?;
    writer.write_sections();
    writer.apply_relocations()?;
    writer.backfill_headers();
    Ok(writer.buffer)
}

impl<'w, 'a> Writer<'w, 'a> {
    /// Walks the live chunks in input order. Consecutive chunks whose names
    /// strip to the same output name share a section; within a section,
    /// chunks are stably sorted by their full `$`-bearing name.
    fn group_sections(&mut self) {
        for index in 0..self.link.chunks.len() {
            let chunk = &self.link.chunks[index];
            if !chunk.live {
                continue;
            }
            let stripped = strip_section_suffix(chunk.name);
            if self.sections.last().is_none_or(|sec| sec.name != stripped) {
                self.sections.push(OutputSection {
                    name: stripped.to_vec(),
                    chunks: Vec::new(),
                    characteristics: SectionFlags::empty(),
                    virtual_size: 0,
                    raw_size: 0,
                    rva: 0,
                    file_off: 0,
                });
            }
            if let Some(sec) = self.sections.last_mut() {
                sec.chunks.push(ChunkId(index as u32));
            }
        }

        for index in 0..self.sections.len() {
            let mut ids = std::mem::take(&mut self.sections[index].chunks);
            ids.sort_by(|&a, &b| self.link.chunk(a).name.cmp(self.link.chunk(b).name));

            let mut offset = 0u64;
            let mut raw_size = 0u64;
            let mut characteristics = SectionFlags::empty();
            for &id in &ids {
                let chunk = self.link.chunk_mut(id);
                offset = offset.next_multiple_of(chunk.align as u64);
                chunk.rva = offset;
                chunk.file_off = offset;
                offset += chunk.size();
                if !chunk.is_bss() {
                    raw_size = offset.next_multiple_of(FILE_ALIGNMENT);
                }
                characteristics |= chunk.permissions();
            }

            let sec = &mut self.sections[index];
            sec.chunks = ids;
            sec.virtual_size = offset;
            sec.raw_size = raw_size;
            sec.characteristics = characteristics;
        }
    }

    fn remove_empty_sections(&mut self) {
        self.sections.retain(|sec| sec.virtual_size != 0);

        // Chunks learn their final section index only now, after removal,
        // so SECTION relocations and the section table agree.
        for index in 0..self.sections.len() {
            let ids = self.sections[index].chunks.clone();
            for id in ids {
                self.link.chunk_mut(id).output_section = Some(index);
            }
        }
    }

    /// Assigns RVAs starting at 0x1000 and file offsets starting right
    /// after the page-rounded section table.
    fn assign_addresses(&mut self) {
        let header_size =
            SECTION_TABLE_OFFSET + size_of::<pe::ImageSectionHeader>() * self.sections.len();
        self.end_of_section_table = (header_size as u64).next_multiple_of(PAGE_SIZE);

        let mut rva = 0x1000u64;
        let mut file_off = self.end_of_section_table;
        for index in 0..self.sections.len() {
            {
                let sec = &mut self.sections[index];
                sec.rva = rva;
                sec.file_off = file_off;
            }

            let ids = self.sections[index].chunks.clone();
            for id in ids {
                let chunk = self.link.chunk_mut(id);
                chunk.rva += rva;
                chunk.file_off += file_off;
            }

            let sec = &self.sections[index];
            debug!(
                "output section '{}' at rva {:#x}, file offset {:#x}, size {:#x}",
                display_name(&sec.name),
                sec.rva,
                sec.file_off,
                sec.virtual_size,
            );

            rva += sec.virtual_size.next_multiple_of(PAGE_SIZE);
            file_off += sec.raw_size;
        }

        self.size_of_image = self.end_of_section_table + (rva - 0x1000);
        self.file_size = file_off;
    }

    fn open_file(&mut self) {
        self.buffer = vec![0u8; self.file_size as usize];
    }

    fn entry_rva(&self) -> Result<u64, LinkError> {
        self.link
            .find(self.link.config.entry.as_bytes())
            .and_then(|id| self.link.body_rva(self.link.body(id)))
            .ok_or_else(|| {
                LinkError::Unresolved(UnresolvedSymbols(vec![self.link.config.entry.clone()]))
            })
    }

    fn write_header(&mut self) -> Result<(), LinkError> {
        let entry_rva = self.entry_rva()?;

        let initialized_data: u64 = self
            .sections
            .iter()
            .filter(|sec| sec.characteristics.contains(SectionFlags::CntInitializedData))
            .map(|sec| sec.raw_size)
            .sum();
        let uninitialized_data: u64 = self
            .sections
            .iter()
            .filter(|sec| {
                sec.characteristics
                    .contains(SectionFlags::CntUninitializedData)
            })
            .map(|sec| sec.virtual_size)
            .sum();
        let header_size =
            SECTION_TABLE_OFFSET + size_of::<pe::ImageSectionHeader>() * self.sections.len();

        let buf = &mut self.buffer;

        // 64-byte DOS stub.
        buf[0] = b'M';
        buf[1] = b'Z';
        write_u16(buf, offset_of!(pe::ImageDosHeader, e_lfarlc), DOS_STUB_SIZE as u16);
        write_u32(buf, offset_of!(pe::ImageDosHeader, e_lfanew), DOS_STUB_SIZE as u32);

        buf[PE_SIGNATURE_OFFSET..PE_SIGNATURE_OFFSET + 4].copy_from_slice(b"PE\0\0");

        let file_header = pe::ImageFileHeader {
            machine: u16(pe::IMAGE_FILE_MACHINE_AMD64),
            number_of_sections: u16(self.sections.len() as u16),
            time_date_stamp: u32(0),
            pointer_to_symbol_table: u32(0),
            number_of_symbols: u32(0),
            size_of_optional_header: u16(
                (size_of::<pe::ImageOptionalHeader64>()
                    + NUM_DATA_DIRECTORIES * size_of::<pe::ImageDataDirectory>())
                    as u16,
            ),
            characteristics: u16(
                pe::IMAGE_FILE_EXECUTABLE_IMAGE
                    | pe::IMAGE_FILE_RELOCS_STRIPPED
                    | pe::IMAGE_FILE_LARGE_ADDRESS_AWARE,
            ),
        };
        buf[COFF_HEADER_OFFSET..COFF_HEADER_OFFSET + size_of::<pe::ImageFileHeader>()]
            .copy_from_slice(bytes_of(&file_header));

        let optional = pe::ImageOptionalHeader64 {
            magic: u16(pe::IMAGE_NT_OPTIONAL_HDR64_MAGIC),
            major_linker_version: 0,
            minor_linker_version: 0,
            // Code totals are backfilled from the .text section.
            size_of_code: u32(0),
            size_of_initialized_data: u32(initialized_data as u32),
            size_of_uninitialized_data: u32(uninitialized_data as u32),
            address_of_entry_point: u32(entry_rva as u32),
            base_of_code: u32(0),
            image_base: u64(self.link.config.image_base),
            section_alignment: u32(PAGE_SIZE as u32),
            file_alignment: u32(FILE_ALIGNMENT as u32),
            major_operating_system_version: u16(6),
            minor_operating_system_version: u16(0),
            major_image_version: u16(0),
            minor_image_version: u16(0),
            major_subsystem_version: u16(6),
            minor_subsystem_version: u16(0),
            win32_version_value: u32(0),
            size_of_image: u32(self.size_of_image as u32),
            size_of_headers: u32((header_size as u64).next_multiple_of(FILE_ALIGNMENT) as u32),
            check_sum: u32(0),
            subsystem: u16(pe::IMAGE_SUBSYSTEM_WINDOWS_CUI),
            dll_characteristics: u16(0),
            size_of_stack_reserve: u64(1024 * 1024),
            size_of_stack_commit: u64(4096),
            size_of_heap_reserve: u64(1024 * 1024),
            size_of_heap_commit: u64(4096),
            loader_flags: u32(0),
            number_of_rva_and_sizes: u32(NUM_DATA_DIRECTORIES as u32),
        };
        buf[OPTIONAL_HEADER_OFFSET..OPTIONAL_HEADER_OFFSET + size_of::<pe::ImageOptionalHeader64>()]
            .copy_from_slice(bytes_of(&optional));

        // The 16 data directory slots stay zero here; the import entries
        // are backfilled once relocation results are known.

        for (index, sec) in self.sections.iter().enumerate() {
            let mut name = [0u8; 8];
            let len = sec.name.len().min(8);
            name[..len].copy_from_slice(&sec.name[..len]);

            let header = pe::ImageSectionHeader {
                name,
                virtual_size: u32(sec.virtual_size as u32),
                virtual_address: u32(sec.rva as u32),
                size_of_raw_data: u32(sec.raw_size as u32),
                pointer_to_raw_data: u32(if sec.raw_size > 0 {
                    sec.file_off as u32
                } else {
                    0
                }),
                pointer_to_relocations: u32(0),
                pointer_to_linenumbers: u32(0),
                number_of_relocations: u16(0),
                number_of_linenumbers: u16(0),
                characteristics: u32(sec.characteristics.bits()),
            };

            let offset = SECTION_TABLE_OFFSET + index * size_of::<pe::ImageSectionHeader>();
            buf[offset..offset + size_of::<pe::ImageSectionHeader>()]
                .copy_from_slice(bytes_of(&header));
        }

        Ok(())
    }

    fn write_sections(&mut self) {
        for sec in &self.sections {
            // Gaps in code sections trap instead of sliding into the next
            // chunk.
            if sec.characteristics.contains(SectionFlags::CntCode) && sec.raw_size > 0 {
                let start = sec.file_off as usize;
                self.buffer[start..start + sec.raw_size as usize].fill(0xcc);
            }

            for &id in &sec.chunks {
                let chunk = self.link.chunk(id);
                if chunk.is_bss() {
                    continue;
                }
                let content = chunk.content();
                let start = chunk.file_off as usize;
                self.buffer[start..start + content.len()].copy_from_slice(content);
            }
        }
    }

    fn apply_relocations(&mut self) -> Result<(), LinkError> {
        for index in 0..self.sections.len() {
            let ids = self.sections[index].chunks.clone();
            for id in ids {
                self.apply_chunk_relocations(id)?;
            }
        }
        Ok(())
    }

    fn apply_chunk_relocations(&mut self, id: ChunkId) -> Result<(), LinkError> {
        let chunk = self.link.chunk(id);
        let rva = chunk.rva;
        let file_off = chunk.file_off as usize;
        let size = chunk.size();

        enum Patch {
            Section,
            ImportFunc(crate::symbols::SymbolId),
            Lookup(ChunkId),
            Directory(ChunkId, ChunkId, ChunkId),
            None,
        }

        let patch = match &chunk.kind {
            ChunkKind::Section(_) => Patch::Section,
            ChunkKind::ImportFunc(func) => Patch::ImportFunc(func.imp),
            ChunkKind::Lookup(lookup) => Patch::Lookup(lookup.hint_name),
            ChunkKind::Directory(dir) => {
                Patch::Directory(dir.dll_name, dir.lookup_table, dir.address_table)
            }
            _ => Patch::None,
        };

        match patch {
            Patch::Section => self.apply_section_relocations(id),
            Patch::ImportFunc(imp) => {
                let imp_rva = self
                    .link
                    .body_rva(self.link.body(imp))
                    .unwrap_or_else(|| unreachable!("import slot placed before trampolines"));
                // Displacement from the end of the jmp to the address slot.
                let operand = imp_rva.wrapping_sub(rva).wrapping_sub(size) as u32;
                write_u32(&mut self.buffer, file_off + 2, operand);
                Ok(())
            }
            Patch::Lookup(hint) => {
                let hint_rva = self.link.chunk(hint).rva as u32;
                write_u32(&mut self.buffer, file_off, hint_rva);
                Ok(())
            }
            Patch::Directory(dll_name, lookup, address) => {
                let descriptor = pe::ImageImportDescriptor {
                    original_first_thunk: u32(self.link.chunk(lookup).rva as u32),
                    time_date_stamp: u32(0),
                    forwarder_chain: u32(0),
                    name: u32(self.link.chunk(dll_name).rva as u32),
                    first_thunk: u32(self.link.chunk(address).rva as u32),
                };
                let end = file_off + size_of::<pe::ImageImportDescriptor>();
                self.buffer[file_off..end].copy_from_slice(bytes_of(&descriptor));
                Ok(())
            }
            Patch::None => Ok(()),
        }
    }

    fn apply_section_relocations(&mut self, id: ChunkId) -> Result<(), LinkError> {
        let chunk = self.link.chunk(id);
        let Some(sec) = chunk.as_section() else {
            return Ok(());
        };
        // Uninitialized sections have no bytes on disk to patch.
        if sec.is_bss() {
            return Ok(());
        }

        let file = sec.file;
        let relocs = sec.relocs;
        let chunk_rva = chunk.rva;
        let chunk_off = chunk.file_off;
        let chunk_size = chunk.size();
        let source = self.link.files[file.index()].source.clone();
        let image_base = self.link.config.image_base;

        for reloc in relocs {
            let va = reloc.virtual_address.get(LittleEndian) as u64;
            let sym_index = reloc.symbol_table_index.get(LittleEndian) as usize;

            let typ = RelocationType::try_from(reloc.typ.get(LittleEndian)).map_err(|error| {
                LinkError::UnsupportedRelocation {
                    file: source.to_string(),
                    error,
                }
            })?;

            let width: u64 = match typ {
                RelocationType::Addr64 => 8,
                RelocationType::Section => 2,
                _ => 4,
            };
            if va + width > chunk_size {
                return Err(source.error(format!(
                    "relocation at offset {va:#x} lies outside its section"
                )));
            }

            let target = self.link.files[file.index()]
                .sparse_symbols
                .get(sym_index)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    source.error(format!("relocation against unknown symbol index {sym_index}"))
                })?;

            let body = self.link.body(target);
            let s = self.link.body_rva(body).ok_or_else(|| {
                source.error(format!(
                    "relocation against undefined symbol '{}'",
                    display_name(body.name())
                ))
            })?;
            let p = chunk_rva + va;
            let off = (chunk_off + va) as usize;

            match typ {
                RelocationType::Addr32 => {
                    add32(&mut self.buffer, off, image_base.wrapping_add(s) as u32)
                }
                RelocationType::Addr64 => add64(&mut self.buffer, off, image_base.wrapping_add(s)),
                RelocationType::Addr32Nb => add32(&mut self.buffer, off, s as u32),
                RelocationType::Rel32
                | RelocationType::Rel32_1
                | RelocationType::Rel32_2
                | RelocationType::Rel32_3
                | RelocationType::Rel32_4
                | RelocationType::Rel32_5 => {
                    let skip = 4 + (u16::from(typ) - u16::from(RelocationType::Rel32)) as u64;
                    add32(
                        &mut self.buffer,
                        off,
                        s.wrapping_sub(p).wrapping_sub(skip) as u32,
                    );
                }
                RelocationType::Section => {
                    let out = self.target_section(body).ok_or_else(|| {
                        source.error(format!(
                            "SECTION relocation against '{}' which has no output section",
                            display_name(body.name())
                        ))
                    })?;
                    add16(&mut self.buffer, off, out as u16 + 1);
                }
                RelocationType::Secrel => {
                    let out = self.target_section(body).ok_or_else(|| {
                        source.error(format!(
                            "SECREL relocation against '{}' which has no output section",
                            display_name(body.name())
                        ))
                    })?;
                    let sec_rva = self.sections[out].rva;
                    add32(&mut self.buffer, off, s.wrapping_sub(sec_rva) as u32);
                }
            }
        }
        Ok(())
    }

    /// The 0-based output section index of a symbol's owning chunk.
    fn target_section(&self, body: &SymbolBody<'a>) -> Option<usize> {
        self.link.chunk(body.chunk()?).output_section
    }

    /// Fills the code totals and import data directory entries left open by
    /// `write_header`.
    fn backfill_headers(&mut self) {
        if let Some(text) = self.sections.iter().find(|sec| sec.name == b".text") {
            let (raw_size, rva) = (text.raw_size as u32, text.rva as u32);
            write_u32(
                &mut self.buffer,
                OPTIONAL_HEADER_OFFSET + offset_of!(pe::ImageOptionalHeader64, size_of_code),
                raw_size,
            );
            write_u32(
                &mut self.buffer,
                OPTIONAL_HEADER_OFFSET + offset_of!(pe::ImageOptionalHeader64, base_of_code),
                rva,
            );
        }

        if let Some(imports) = &self.imports {
            let entries = [
                (
                    pe::IMAGE_DIRECTORY_ENTRY_IMPORT,
                    self.link.chunk(imports.directory_start).rva as u32,
                    imports.directory_size,
                ),
                (
                    pe::IMAGE_DIRECTORY_ENTRY_IAT,
                    self.link.chunk(imports.address_start).rva as u32,
                    imports.address_size,
                ),
            ];
            for (index, rva, size) in entries {
                let offset = DATA_DIRECTORY_OFFSET + index * size_of::<pe::ImageDataDirectory>();
                write_u32(&mut self.buffer, offset, rva);
                write_u32(&mut self.buffer, offset + 4, size);
            }
        }
    }
}

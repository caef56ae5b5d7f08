//! In-memory COFF object builder for link tests.
//!
//! Emits the same `object::pe` pod structs the linker consumes, so tests
//! control every header field without shelling out to a compiler.

use object::{
    U16Bytes, U32Bytes,
    pe::{
        self, IMAGE_FILE_MACHINE_AMD64, IMAGE_SYM_CLASS_EXTERNAL, IMAGE_SYM_CLASS_STATIC,
        IMAGE_SYM_CLASS_WEAK_EXTERNAL,
    },
    pod::bytes_of,
};

pub const TEXT: u32 =
    pe::IMAGE_SCN_CNT_CODE | pe::IMAGE_SCN_MEM_EXECUTE | pe::IMAGE_SCN_MEM_READ;
pub const DATA: u32 =
    pe::IMAGE_SCN_CNT_INITIALIZED_DATA | pe::IMAGE_SCN_MEM_READ | pe::IMAGE_SCN_MEM_WRITE;
pub const RDATA: u32 = pe::IMAGE_SCN_CNT_INITIALIZED_DATA | pe::IMAGE_SCN_MEM_READ;
pub const BSS: u32 =
    pe::IMAGE_SCN_CNT_UNINITIALIZED_DATA | pe::IMAGE_SCN_MEM_READ | pe::IMAGE_SCN_MEM_WRITE;
pub const COMDAT: u32 = pe::IMAGE_SCN_LNK_COMDAT;
pub const INFO: u32 = pe::IMAGE_SCN_LNK_INFO | pe::IMAGE_SCN_LNK_REMOVE;

struct SectionDef {
    name: String,
    characteristics: u32,
    data: Vec<u8>,
    bss_size: u32,
    relocs: Vec<RelocDef>,
}

struct RelocDef {
    address: u32,
    symbol: usize,
    typ: u16,
}

enum Aux {
    None,
    Section { selection: u8, number: u16 },
    Weak { tag: usize },
}

struct SymbolDef {
    name: String,
    value: u32,
    section: u16,
    storage_class: u8,
    aux: Aux,
}

/// Builder for a single AMD64 COFF object.
#[derive(Default)]
pub struct CoffBuilder {
    sections: Vec<SectionDef>,
    symbols: Vec<SymbolDef>,
}

#[allow(unused)]
impl CoffBuilder {
    pub fn new() -> CoffBuilder {
        Self::default()
    }

    /// Appends an initialized section; 1-based section numbers follow the
    /// order of these calls.
    pub fn section(&mut self, name: &str, characteristics: u32, data: &[u8]) -> &mut CoffBuilder {
        self.sections.push(SectionDef {
            name: name.into(),
            characteristics,
            data: data.to_vec(),
            bss_size: 0,
            relocs: Vec::new(),
        });
        self
    }

    pub fn bss_section(&mut self, name: &str, size: u32) -> &mut CoffBuilder {
        self.sections.push(SectionDef {
            name: name.into(),
            characteristics: BSS,
            data: Vec::new(),
            bss_size: size,
            relocs: Vec::new(),
        });
        self
    }

    /// Adds a relocation to the most recently added section. `symbol` is the
    /// value returned from one of the symbol methods.
    pub fn reloc(&mut self, address: u32, symbol: usize, typ: u16) -> &mut CoffBuilder {
        self.sections
            .last_mut()
            .expect("reloc requires a section")
            .relocs
            .push(RelocDef {
                address,
                symbol,
                typ,
            });
        self
    }

    pub fn global(&mut self, name: &str, section: u16, value: u32) -> usize {
        self.push_symbol(name, value, section, IMAGE_SYM_CLASS_EXTERNAL, Aux::None)
    }

    pub fn local(&mut self, name: &str, section: u16, value: u32) -> usize {
        self.push_symbol(name, value, section, IMAGE_SYM_CLASS_STATIC, Aux::None)
    }

    pub fn undefined(&mut self, name: &str) -> usize {
        self.push_symbol(name, 0, 0, IMAGE_SYM_CLASS_EXTERNAL, Aux::None)
    }

    pub fn common(&mut self, name: &str, size: u32) -> usize {
        self.push_symbol(name, size, 0, IMAGE_SYM_CLASS_EXTERNAL, Aux::None)
    }

    pub fn absolute(&mut self, name: &str, value: u32) -> usize {
        self.push_symbol(name, value, 0xffff, IMAGE_SYM_CLASS_EXTERNAL, Aux::None)
    }

    /// The static section symbol carrying a section-definition auxiliary
    /// record (COMDAT selection and associative parent).
    pub fn section_symbol(
        &mut self,
        name: &str,
        section: u16,
        selection: u8,
        number: u16,
    ) -> usize {
        self.push_symbol(
            name,
            0,
            section,
            IMAGE_SYM_CLASS_STATIC,
            Aux::Section { selection, number },
        )
    }

    /// A weak external defaulting to the symbol `tag`.
    pub fn weak(&mut self, name: &str, tag: usize) -> usize {
        self.push_symbol(name, 0, 0, IMAGE_SYM_CLASS_WEAK_EXTERNAL, Aux::Weak { tag })
    }

    fn push_symbol(
        &mut self,
        name: &str,
        value: u32,
        section: u16,
        storage_class: u8,
        aux: Aux,
    ) -> usize {
        self.symbols.push(SymbolDef {
            name: name.into(),
            value,
            section,
            storage_class,
            aux,
        });
        self.symbols.len() - 1
    }

    pub fn build(&self) -> Vec<u8> {
        // Symbol table indices account for auxiliary records.
        let mut table_index = vec![0u32; self.symbols.len()];
        let mut next = 0u32;
        for (ordinal, symbol) in self.symbols.iter().enumerate() {
            table_index[ordinal] = next;
            next += 1 + aux_count(&symbol.aux);
        }
        let number_of_symbols = next;

        let header_size =
            size_of::<pe::ImageFileHeader>() + self.sections.len() * size_of::<pe::ImageSectionHeader>();
        let mut offset = header_size as u32;
        let mut data_pointers = Vec::new();
        let mut reloc_pointers = Vec::new();
        for section in &self.sections {
            if section.data.is_empty() {
                data_pointers.push(0);
            } else {
                data_pointers.push(offset);
                offset += section.data.len() as u32;
            }
            if section.relocs.is_empty() {
                reloc_pointers.push(0);
            } else {
                reloc_pointers.push(offset);
                offset += (section.relocs.len() * size_of::<pe::ImageRelocation>()) as u32;
            }
        }
        let symtab_pointer = offset;

        let mut buf = Vec::new();
        buf.extend_from_slice(bytes_of(&pe::ImageFileHeader {
            machine: u16v(IMAGE_FILE_MACHINE_AMD64),
            number_of_sections: u16v(self.sections.len() as u16),
            time_date_stamp: u32v(0),
            pointer_to_symbol_table: u32v(symtab_pointer),
            number_of_symbols: u32v(number_of_symbols),
            size_of_optional_header: u16v(0),
            characteristics: u16v(0),
        }));

        for (index, section) in self.sections.iter().enumerate() {
            assert!(section.name.len() <= 8, "section names must be inline");
            let mut name = [0u8; 8];
            name[..section.name.len()].copy_from_slice(section.name.as_bytes());

            let size_of_raw_data = if section.data.is_empty() {
                section.bss_size
            } else {
                section.data.len() as u32
            };

            buf.extend_from_slice(bytes_of(&pe::ImageSectionHeader {
                name,
                virtual_size: u32v(0),
                virtual_address: u32v(0),
                size_of_raw_data: u32v(size_of_raw_data),
                pointer_to_raw_data: u32v(data_pointers[index]),
                pointer_to_relocations: u32v(reloc_pointers[index]),
                pointer_to_linenumbers: u32v(0),
                number_of_relocations: u16v(section.relocs.len() as u16),
                number_of_linenumbers: u16v(0),
                characteristics: u32v(section.characteristics),
            }));
        }

        for section in &self.sections {
            buf.extend_from_slice(&section.data);
            for reloc in &section.relocs {
                buf.extend_from_slice(bytes_of(&pe::ImageRelocation {
                    virtual_address: U32Bytes::new(object::LittleEndian, reloc.address),
                    symbol_table_index: U32Bytes::new(
                        object::LittleEndian,
                        table_index[reloc.symbol],
                    ),
                    typ: U16Bytes::new(object::LittleEndian, reloc.typ),
                }));
            }
        }

        let mut strtab: Vec<u8> = Vec::new();
        for symbol in &self.symbols {
            let mut name = [0u8; 8];
            if symbol.name.len() <= 8 {
                name[..symbol.name.len()].copy_from_slice(symbol.name.as_bytes());
            } else {
                // Long names live in the string table; the offset counts the
                // 4-byte length prefix.
                let offset = 4 + strtab.len() as u32;
                strtab.extend_from_slice(symbol.name.as_bytes());
                strtab.push(0);
                name[4..].copy_from_slice(&offset.to_le_bytes());
            }

            buf.extend_from_slice(bytes_of(&pe::ImageSymbol {
                name,
                value: U32Bytes::new(object::LittleEndian, symbol.value),
                section_number: U16Bytes::new(object::LittleEndian, symbol.section),
                typ: U16Bytes::new(object::LittleEndian, 0),
                storage_class: symbol.storage_class,
                number_of_aux_symbols: aux_count(&symbol.aux) as u8,
            }));

            match &symbol.aux {
                Aux::None => {}
                Aux::Section { selection, number } => {
                    let section = &self.sections[symbol.section as usize - 1];
                    buf.extend_from_slice(bytes_of(&pe::ImageAuxSymbolSection {
                        length: U32Bytes::new(object::LittleEndian, section.data.len() as u32),
                        number_of_relocations: U16Bytes::new(
                            object::LittleEndian,
                            section.relocs.len() as u16,
                        ),
                        number_of_linenumbers: U16Bytes::new(object::LittleEndian, 0),
                        check_sum: U32Bytes::new(object::LittleEndian, 0),
                        number: U16Bytes::new(object::LittleEndian, *number),
                        selection: *selection,
                        reserved: 0,
                        high_number: U16Bytes::new(object::LittleEndian, 0),
                    }));
                }
                Aux::Weak { tag } => {
                    let mut aux = [0u8; size_of::<pe::ImageSymbol>()];
                    aux[..4].copy_from_slice(&table_index[*tag].to_le_bytes());
                    // IMAGE_WEAK_EXTERN_SEARCH_LIBRARY
                    aux[4..8].copy_from_slice(&2u32.to_le_bytes());
                    buf.extend_from_slice(&aux);
                }
            }
        }

        buf.extend_from_slice(&(4 + strtab.len() as u32).to_le_bytes());
        buf.extend_from_slice(&strtab);
        buf
    }
}

fn aux_count(aux: &Aux) -> u32 {
    match aux {
        Aux::None => 0,
        Aux::Section { .. } | Aux::Weak { .. } => 1,
    }
}

fn u16v(v: u16) -> object::U16<object::LittleEndian> {
    object::U16::new(object::LittleEndian, v)
}

fn u32v(v: u32) -> object::U32<object::LittleEndian> {
    object::U32::new(object::LittleEndian, v)
}

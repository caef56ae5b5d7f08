//! Low-level COFF handling module.
//!
//! This acts as a supplement to the [object](https://github.com/gimli-rs/object)
//! crate: newtypes and strongly typed bit flags over the raw PE/COFF
//! constants the linker cares about.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use object::pe::{
    IMAGE_REL_AMD64_ADDR32, IMAGE_REL_AMD64_ADDR32NB, IMAGE_REL_AMD64_ADDR64,
    IMAGE_REL_AMD64_REL32, IMAGE_REL_AMD64_REL32_1, IMAGE_REL_AMD64_REL32_2,
    IMAGE_REL_AMD64_REL32_3, IMAGE_REL_AMD64_REL32_4, IMAGE_REL_AMD64_REL32_5,
    IMAGE_REL_AMD64_SECREL, IMAGE_REL_AMD64_SECTION, IMAGE_SCN_ALIGN_MASK, IMAGE_SCN_CNT_CODE,
    IMAGE_SCN_CNT_INITIALIZED_DATA, IMAGE_SCN_CNT_UNINITIALIZED_DATA, IMAGE_SCN_LNK_COMDAT,
    IMAGE_SCN_LNK_INFO, IMAGE_SCN_LNK_REMOVE, IMAGE_SCN_MEM_DISCARDABLE, IMAGE_SCN_MEM_EXECUTE,
    IMAGE_SCN_MEM_READ, IMAGE_SCN_MEM_SHARED, IMAGE_SCN_MEM_WRITE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SectionFlags(u32);

bitflags! {
    impl SectionFlags: u32 {
        const CntCode = IMAGE_SCN_CNT_CODE;
        const CntInitializedData = IMAGE_SCN_CNT_INITIALIZED_DATA;
        const CntUninitializedData = IMAGE_SCN_CNT_UNINITIALIZED_DATA;
        const LnkInfo = IMAGE_SCN_LNK_INFO;
        const LnkRemove = IMAGE_SCN_LNK_REMOVE;
        const LnkComdat = IMAGE_SCN_LNK_COMDAT;
        const MemDiscardable = IMAGE_SCN_MEM_DISCARDABLE;
        const MemShared = IMAGE_SCN_MEM_SHARED;
        const MemExecute = IMAGE_SCN_MEM_EXECUTE;
        const MemRead = IMAGE_SCN_MEM_READ;
        const MemWrite = IMAGE_SCN_MEM_WRITE;
    }
}

impl SectionFlags {
    /// Flags that carry over from input sections into output section headers.
    pub const PERM_MASK: SectionFlags = SectionFlags::CntCode
        .union(SectionFlags::CntInitializedData)
        .union(SectionFlags::CntUninitializedData)
        .union(SectionFlags::MemShared)
        .union(SectionFlags::MemExecute)
        .union(SectionFlags::MemRead)
        .union(SectionFlags::MemWrite);

    /// Decodes the `IMAGE_SCN_ALIGN_*` field into a byte alignment.
    ///
    /// The field encodes `1 << (value - 1)` with zero reserved; sections
    /// without the field set get the minimum alignment.
    pub fn alignment(self) -> u32 {
        match (self.0 & IMAGE_SCN_ALIGN_MASK) >> 20 {
            0 => 1,
            shift => 1 << (shift - 1),
        }
    }
}

/// A section **number** from a COFF symbol record.
///
/// Section references in the symbol table are 1-based. The reserved values
/// for undefined, absolute, and debug symbols are kept in their raw `u16`
/// form so a record read straight out of an object maps onto this without
/// sign games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SectionNumber(u16);

#[allow(non_upper_case_globals)]
impl SectionNumber {
    pub const Undefined: Self = Self(0);
    pub const Absolute: Self = Self(u16::MAX);
    pub const Debug: Self = Self(u16::MAX - 1);
}

impl From<u16> for SectionNumber {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl SectionNumber {
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the 1-based section index for a symbol defined in a section.
    pub const fn index(self) -> Option<usize> {
        if self.0 > Self::Undefined.0 && self.0 < Self::Debug.0 {
            Some(self.0 as usize)
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported 'IMAGE_REL_AMD64_*' relocation type '{}'", .0)]
pub struct TryFromRelocationTypeError(pub u16);

/// AMD64 relocation types understood by the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[num_enum(error_type(name = TryFromRelocationTypeError, constructor = TryFromRelocationTypeError))]
#[repr(u16)]
pub enum RelocationType {
    Addr64 = IMAGE_REL_AMD64_ADDR64,
    Addr32 = IMAGE_REL_AMD64_ADDR32,
    Addr32Nb = IMAGE_REL_AMD64_ADDR32NB,
    Rel32 = IMAGE_REL_AMD64_REL32,
    Rel32_1 = IMAGE_REL_AMD64_REL32_1,
    Rel32_2 = IMAGE_REL_AMD64_REL32_2,
    Rel32_3 = IMAGE_REL_AMD64_REL32_3,
    Rel32_4 = IMAGE_REL_AMD64_REL32_4,
    Rel32_5 = IMAGE_REL_AMD64_REL32_5,
    Section = IMAGE_REL_AMD64_SECTION,
    Secrel = IMAGE_REL_AMD64_SECREL,
}

/// Returns the section number from a section-definition auxiliary record.
///
/// Only big-object COFFs store the upper half; for the regular object form
/// the trailing bytes of the record are unused.
pub fn aux_section_number(aux: &object::pe::ImageAuxSymbolSection, bigobj: bool) -> u32 {
    let low = aux.number.get(object::LittleEndian) as u32;
    if bigobj {
        ((aux.high_number.get(object::LittleEndian) as u32) << 16) | low
    } else {
        low
    }
}

/// Reads the auxiliary record following symbol `index` straight out of the
/// object's symbol table. Auxiliary records share the symbol record size;
/// shorter layouts are padded.
pub fn aux_record<'data, T: object::pod::Pod>(
    data: &'data [u8],
    header: &object::pe::ImageFileHeader,
    index: usize,
) -> Option<&'data T> {
    let offset = header.pointer_to_symbol_table.get(object::LittleEndian) as usize
        + (index + 1) * size_of::<object::pe::ImageSymbol>();
    let bytes = data.get(offset..)?;
    object::pod::from_bytes(bytes).ok().map(|(value, _)| value)
}

/// Strips the `$` suffix used for in-section ordering from a section name.
pub fn strip_section_suffix(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b'$') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::{SectionFlags, strip_section_suffix};
    use object::pe::{IMAGE_SCN_ALIGN_1BYTES, IMAGE_SCN_ALIGN_16BYTES, IMAGE_SCN_ALIGN_8192BYTES};

    #[test]
    fn alignment_decoding() {
        let tests = [
            (IMAGE_SCN_ALIGN_1BYTES, 1),
            (IMAGE_SCN_ALIGN_16BYTES, 16),
            (IMAGE_SCN_ALIGN_8192BYTES, 8192),
            (0, 1),
        ];

        for (flags, expected) in tests {
            assert_eq!(SectionFlags::from_bits_retain(flags).alignment(), expected);
        }
    }

    #[test]
    fn section_suffix_stripping() {
        assert_eq!(strip_section_suffix(b".text$mn"), b".text");
        assert_eq!(strip_section_suffix(b".idata$4"), b".idata");
        assert_eq!(strip_section_suffix(b".data"), b".data");
        assert_eq!(strip_section_suffix(b"$"), b"");
    }
}

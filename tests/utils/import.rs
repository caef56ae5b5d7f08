//! Short-form import entry writer for link tests.

const IMPORT_OBJECT_CODE: u16 = 0;
const IMPORT_OBJECT_DATA: u16 = 1;
const IMPORT_OBJECT_NAME: u16 = 1;

/// Builds a 20-byte short import header followed by the symbol and DLL
/// names.
pub fn short_import(symbol: &str, dll: &str, code: bool) -> Vec<u8> {
    let typ = if code {
        IMPORT_OBJECT_CODE
    } else {
        IMPORT_OBJECT_DATA
    };
    let type_info = typ | (IMPORT_OBJECT_NAME << 2);
    let size_of_data = (symbol.len() + dll.len() + 2) as u32;

    let mut buf = Vec::with_capacity(20 + size_of_data as usize);
    buf.extend_from_slice(&0u16.to_le_bytes()); // Sig1
    buf.extend_from_slice(&0xffffu16.to_le_bytes()); // Sig2
    buf.extend_from_slice(&0u16.to_le_bytes()); // Version
    buf.extend_from_slice(&0x8664u16.to_le_bytes()); // Machine
    buf.extend_from_slice(&0u32.to_le_bytes()); // TimeDateStamp
    buf.extend_from_slice(&size_of_data.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // OrdinalHint
    buf.extend_from_slice(&type_info.to_le_bytes());
    buf.extend_from_slice(symbol.as_bytes());
    buf.push(0);
    buf.extend_from_slice(dll.as_bytes());
    buf.push(0);
    buf
}

//! Import table synthesis.
//!
//! Turns the resolved `__imp_` symbols into the chunks of the `.idata`
//! section: one directory entry and DLL name string per DLL, plus parallel
//! lookup and address tables of 8-byte slots pointing at hint/name entries.
//! Each table is terminated by a zero slot. The `$`-suffixed section names
//! put the rows in the right order once the writer sorts the section.

use indexmap::IndexMap;

use crate::{
    chunks::{Chunk, ChunkId, ChunkKind},
    resolver::SymbolTable,
    symbols::{SymbolBody, SymbolId},
};

/// Locations the writer needs for the import-related data directories.
pub struct ImportTablesInfo {
    /// First directory entry; start of the directory table.
    pub directory_start: ChunkId,
    pub directory_size: u32,

    /// First import address slot; start of the IAT.
    pub address_start: ChunkId,
    pub address_size: u32,
}

/// Builds the import tables for every `DefinedImportData` symbol currently
/// winning its name. Returns `None` when nothing is imported.
pub fn create_import_tables(link: &mut SymbolTable<'_>) -> Option<ImportTablesInfo> {
    // Bin the import symbols by DLL. Group and member order are sorted by
    // name so output bytes do not depend on argument order.
    let mut groups: IndexMap<&[u8], Vec<SymbolId>> = IndexMap::new();
    for index in 0..link.import_data.len() {
        let id = link.import_data[index];
        if let SymbolBody::DefinedImportData { dll, .. } = link.body(id) {
            groups.entry(*dll).or_default().push(id);
        }
    }
    if groups.is_empty() {
        return None;
    }

    groups.sort_keys();
    for ids in groups.values_mut() {
        ids.sort_by_key(|&id| link.body(id).name());
    }

    let mut directories = Vec::with_capacity(groups.len());
    let mut hint_names: IndexMap<SymbolId, ChunkId> = IndexMap::new();

    for (&dll, ids) in &groups {
        let dll_name = link.push_chunk(Chunk::string(b".idata$7", dll));
        directories.push(link.push_chunk(Chunk::directory(b".idata$2", dll_name)));

        for &id in ids {
            let SymbolBody::DefinedImportData { export, .. } = link.body(id) else {
                continue;
            };
            let chunk = Chunk::hint_name(b".idata$6", 0, *export);
            let hint = link.push_chunk(chunk);
            hint_names.insert(id, hint);
        }
    }

    // Directory table terminator.
    let directory_size = (groups.len() as u32 + 1) * size_of::<object::pe::ImageImportDescriptor>() as u32;
    link.push_chunk(Chunk::null(
        b".idata$2",
        size_of::<object::pe::ImageImportDescriptor>() as u32,
    ));

    // Lookup tables, one run and terminator per DLL.
    let mut lookup_starts = Vec::with_capacity(groups.len());
    for ids in groups.values() {
        let mut first = None;
        for &id in ids {
            let hint = hint_names[&id];
            let chunk = link.push_chunk(Chunk::lookup(b".idata$4", hint));
            first.get_or_insert(chunk);
        }
        link.push_chunk(Chunk::null(b".idata$4", 8));
        lookup_starts.push(first);
    }

    // Address tables mirror the lookup tables; the loader rewrites these
    // slots in place at load time.
    let mut address_starts = Vec::with_capacity(groups.len());
    let mut address_size = 0u32;
    for ids in groups.values() {
        let mut first = None;
        for &id in ids {
            let hint = hint_names[&id];
            let chunk = link.push_chunk(Chunk::lookup(b".idata$5", hint));
            first.get_or_insert(chunk);

            if let SymbolBody::DefinedImportData { location, .. } = link.body_mut(id) {
                *location = Some(chunk);
            }
        }
        link.push_chunk(Chunk::null(b".idata$5", 8));
        address_size += (ids.len() as u32 + 1) * 8;
        address_starts.push(first);
    }

    for (index, &dir) in directories.iter().enumerate() {
        let (Some(lookup), Some(address)) = (lookup_starts[index], address_starts[index]) else {
            continue;
        };
        if let ChunkKind::Directory(dir) = &mut link.chunk_mut(dir).kind {
            dir.lookup_table = lookup;
            dir.address_table = address;
        }
    }

    let address_start = address_starts.iter().copied().flatten().next()?;
    Some(ImportTablesInfo {
        directory_start: directories[0],
        directory_size,
        address_start,
        address_size,
    })
}

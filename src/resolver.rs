//! The global symbol table and resolution driver.
//!
//! The table owns every arena the link graph lives in: symbol slots, chunks,
//! parsed object files, and opened archives. Input files feed symbol bodies
//! in through [`SymbolTable::add_symbol`]; the selection rules decide which
//! body a name keeps. Archive members are not loaded when their symbols are
//! first seen. They are remembered as lazy candidates and pulled in by
//! [`SymbolTable::resolve`] once an undefined reference actually demands
//! them.

use indexmap::IndexMap;
use log::{debug, warn};
use object::{
    Object as _, ObjectSection as _, ObjectSymbol as _,
    coff::CoffFile,
    pe::{
        self, IMAGE_COMDAT_SELECT_ASSOCIATIVE, IMAGE_FILE_MACHINE_AMD64,
        IMAGE_SYM_CLASS_EXTERNAL, IMAGE_SYM_CLASS_FILE, IMAGE_SYM_CLASS_STATIC,
        IMAGE_SYM_CLASS_WEAK_EXTERNAL,
    },
    read::archive::ArchiveOffset,
};

use crate::{
    chunks::{Chunk, ChunkId, ChunkKind},
    coff::{SectionFlags, SectionNumber, aux_record, aux_section_number},
    config::LinkConfig,
    error::{LinkError, MalformedKind, UnresolvedSymbols},
    inputs::{FileId, FileKind, FileSource, ImportMember, InputStore, LinkArchive, ObjectFile,
             identify},
    symbols::{ArchiveId, SymbolBody, SymbolId, display_name},
};

/// Name-indexed map of symbols plus the arenas backing the link graph.
pub struct SymbolTable<'a> {
    pub config: LinkConfig,
    store: &'a InputStore,

    /// One slot per resolved name; the map points at slots in `bodies`.
    map: IndexMap<&'a [u8], SymbolId>,
    bodies: Vec<SymbolBody<'a>>,

    /// Archive members remembered for symbols that are still undefined.
    lazy: IndexMap<SymbolId, (ArchiveId, ArchiveOffset)>,

    pub(crate) chunks: Vec<Chunk<'a>>,
    pub(crate) files: Vec<ObjectFile<'a>>,
    archives: Vec<LinkArchive<'a>>,

    /// Import address symbols, in the order their entries were read.
    pub(crate) import_data: Vec<SymbolId>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(store: &'a InputStore, config: LinkConfig) -> SymbolTable<'a> {
        let mut table = Self {
            store,
            map: IndexMap::new(),
            bodies: Vec::new(),
            lazy: IndexMap::new(),
            chunks: Vec::new(),
            files: Vec::new(),
            archives: Vec::new(),
            import_data: Vec::new(),
            config,
        };

        // The loader-provided pseudo symbol and the entrypoint reference are
        // present before any input is read.
        let source = FileSource::new("<internal>");
        let image_base = table.config.image_base;
        let entry = store.alloc_bytes(table.config.entry.clone().into_bytes());

        table
            .add_symbol(
                SymbolBody::DefinedAbsolute {
                    name: b"__ImageBase",
                    va: image_base,
                },
                true,
                &source,
            )
            .unwrap_or_else(|_| unreachable!("fresh table cannot conflict"));
        table
            .add_symbol(
                SymbolBody::Undefined {
                    name: entry,
                    alias: None,
                },
                true,
                &source,
            )
            .unwrap_or_else(|_| unreachable!("fresh table cannot conflict"));

        table
    }

    /// Reads the file at `path` and feeds its symbols into the table.
    pub fn add_path(&mut self, path: &std::path::Path) -> Result<(), LinkError> {
        let buffer = self.store.open(path)?;
        let display = buffer.path().display().to_string();
        let data = buffer.data();

        match identify(data) {
            Some(FileKind::Object) => self.add_object(FileSource::new(display), data).map(|_| ()),
            Some(FileKind::Archive) => self.add_archive(display, data),
            Some(FileKind::Import) => self.add_import(FileSource::new(display), data),
            None => Err(FileSource::new(display).error(MalformedKind::UnknownFileType)),
        }
    }

    pub fn find(&self, name: &[u8]) -> Option<SymbolId> {
        self.map.get(name).copied()
    }

    pub fn body(&self, id: SymbolId) -> &SymbolBody<'a> {
        &self.bodies[id.index()]
    }

    pub(crate) fn body_mut(&mut self, id: SymbolId) -> &mut SymbolBody<'a> {
        &mut self.bodies[id.index()]
    }

    /// The object files read so far, in input order.
    pub fn objects(&self) -> &[ObjectFile<'a>] {
        &self.files
    }

    pub(crate) fn chunk(&self, id: ChunkId) -> &Chunk<'a> {
        &self.chunks[id.index()]
    }

    pub(crate) fn chunk_mut(&mut self, id: ChunkId) -> &mut Chunk<'a> {
        &mut self.chunks[id.index()]
    }

    pub(crate) fn push_chunk(&mut self, chunk: Chunk<'a>) -> ChunkId {
        let id = ChunkId(self.chunks.len() as u32);
        self.chunks.push(chunk);
        id
    }

    /// The RVA a defined symbol resolves to, once addresses are assigned.
    pub(crate) fn body_rva(&self, body: &SymbolBody<'a>) -> Option<u64> {
        match body {
            SymbolBody::DefinedRegular { chunk, value, .. } => {
                Some(self.chunk(*chunk).rva + *value as u64)
            }
            SymbolBody::DefinedAbsolute { va, .. } => {
                Some(va.wrapping_sub(self.config.image_base))
            }
            SymbolBody::DefinedCommon { chunk, .. }
            | SymbolBody::DefinedImportFunc { chunk, .. } => Some(self.chunk(*chunk).rva),
            SymbolBody::DefinedImportData { location, .. } => {
                location.map(|chunk| self.chunk(chunk).rva)
            }
            SymbolBody::Undefined { .. } | SymbolBody::Lazy { .. } => None,
        }
    }

    /// Offers a new symbol body to the table.
    ///
    /// Non-external bodies get an anonymous slot; external bodies go through
    /// the selection rules against the current holder of the name.
    pub(crate) fn add_symbol(
        &mut self,
        new: SymbolBody<'a>,
        external: bool,
        provider: &FileSource,
    ) -> Result<SymbolId, LinkError> {
        if !external {
            return Ok(self.push_body(new));
        }

        let name = new.name();
        let Some(&id) = self.map.get(name) else {
            let id = self.push_body(new);
            self.map.insert(name, id);
            return Ok(id);
        };

        let existing = &self.bodies[id.index()];
        match (existing, &new) {
            // An undefined reference takes any definition.
            (SymbolBody::Undefined { .. }, body) if body.is_defined() => {
                self.bodies[id.index()] = new;
            }

            // Remember the archive member; extraction happens at the
            // resolution fixpoint.
            (
                SymbolBody::Undefined { .. },
                SymbolBody::Lazy {
                    archive, member, ..
                },
            ) => {
                self.lazy.entry(id).or_insert((*archive, *member));
            }

            // A later weak-external declaration can still contribute its
            // fallback target.
            (
                SymbolBody::Undefined { alias: None, .. },
                SymbolBody::Undefined {
                    alias: Some(alias), ..
                },
            ) => {
                let alias = *alias;
                if let SymbolBody::Undefined { alias: slot, .. } = &mut self.bodies[id.index()] {
                    *slot = Some(alias);
                }
            }

            (SymbolBody::Undefined { .. }, SymbolBody::Undefined { .. }) => {}

            // A real definition beats the lazy candidate without extraction.
            (SymbolBody::Lazy { .. }, body) if body.is_defined() => {
                self.bodies[id.index()] = new;
            }

            // An undefined reference to a lazy symbol keeps the candidate
            // aside and waits for the fixpoint.
            (
                SymbolBody::Lazy {
                    archive, member, ..
                },
                SymbolBody::Undefined { .. },
            ) => {
                let pending = (*archive, *member);
                self.lazy.entry(id).or_insert(pending);
                self.bodies[id.index()] = new;
            }

            (SymbolBody::Lazy { .. }, SymbolBody::Lazy { .. }) => {}

            // Defined incumbent, undefined or lazy newcomer.
            (_, SymbolBody::Undefined { .. }) => {}
            (_, SymbolBody::Lazy { .. }) => {}

            // COMDAT sections allow duplicate definitions; first seen wins.
            (
                SymbolBody::DefinedRegular {
                    chunk: existing_chunk,
                    ..
                },
                SymbolBody::DefinedRegular { chunk, .. },
            ) if self.is_comdat(*existing_chunk) || self.is_comdat(*chunk) => {
                if self.config.verbose {
                    debug!(
                        "{provider}: discarded duplicate COMDAT '{}'",
                        display_name(name)
                    );
                }
            }

            // The largest common allocation wins.
            (
                SymbolBody::DefinedCommon { size: existing, .. },
                SymbolBody::DefinedCommon { size, .. },
            ) => {
                if size > existing {
                    self.bodies[id.index()] = new;
                }
            }

            // A regular definition beats a common one.
            (SymbolBody::DefinedCommon { .. }, SymbolBody::DefinedRegular { .. }) => {
                self.bodies[id.index()] = new;
            }
            (SymbolBody::DefinedRegular { .. }, SymbolBody::DefinedCommon { .. }) => {}

            // Identical absolute values can coexist.
            (
                SymbolBody::DefinedAbsolute { va: existing, .. },
                SymbolBody::DefinedAbsolute { va, .. },
            ) if existing == va => {}

            (existing, _) => {
                return Err(LinkError::DuplicateSymbol {
                    name: display_name(name).into_owned(),
                    first: self.provider_of(existing),
                    second: provider.to_string(),
                });
            }
        }

        Ok(id)
    }

    fn push_body(&mut self, body: SymbolBody<'a>) -> SymbolId {
        let id = SymbolId(self.bodies.len() as u32);
        self.bodies.push(body);
        id
    }

    fn is_comdat(&self, chunk: ChunkId) -> bool {
        self.chunk(chunk)
            .as_section()
            .is_some_and(|sec| sec.is_comdat())
    }

    fn provider_of(&self, body: &SymbolBody<'a>) -> String {
        match body {
            SymbolBody::DefinedRegular { file, .. } => self.files[file.index()].source.to_string(),
            SymbolBody::DefinedImportData { dll, .. } => display_name(dll).into_owned(),
            SymbolBody::DefinedImportFunc { .. } => "<import library>".into(),
            SymbolBody::DefinedAbsolute { .. } => "<absolute>".into(),
            SymbolBody::DefinedCommon { .. } => "<common>".into(),
            SymbolBody::Undefined { .. } | SymbolBody::Lazy { .. } => "<undefined>".into(),
        }
    }

    /// Parses a COFF object, materializing its sections as chunks and its
    /// symbol records as bodies.
    pub fn add_object(&mut self, source: FileSource, data: &'a [u8]) -> Result<FileId, LinkError> {
        let coff: CoffFile = CoffFile::parse(data).map_err(|e| source.error(e))?;

        let machine = coff.coff_header().machine.get(object::LittleEndian);
        if machine != IMAGE_FILE_MACHINE_AMD64 {
            return Err(source.error(MalformedKind::Machine(machine)));
        }

        let file = FileId(self.files.len() as u32);
        let (sparse_chunks, directives) = self.initialize_chunks(file, &source, &coff);

        if let Some(directives) = directives {
            debug!(
                "{source}: captured {} bytes of linker directives",
                directives.len()
            );
        }

        self.files.push(ObjectFile {
            source,
            sparse_chunks,
            sparse_symbols: Vec::new(),
            directives,
        });

        let sparse_symbols = self.initialize_symbols(file, data, &coff)?;
        self.files[file.index()].sparse_symbols = sparse_symbols;
        Ok(file)
    }

    /// Enumerates the object's sections. Directive and debug sections do not
    /// contribute chunks; a merely damaged section is skipped with a
    /// diagnostic rather than failing the file.
    fn initialize_chunks(
        &mut self,
        file: FileId,
        source: &FileSource,
        coff: &CoffFile<'a>,
    ) -> (Vec<Option<ChunkId>>, Option<&'a [u8]>) {
        let mut sparse = vec![None; coff.coff_section_table().len() + 1];
        let mut directives = None;

        for section in coff.sections() {
            let index = section.index().0;

            let name = match section.name_bytes() {
                Ok(name) => name,
                Err(e) => {
                    warn!("{source}: section {index}: {e}; section skipped");
                    continue;
                }
            };

            let characteristics = SectionFlags::from_bits_retain(
                section
                    .coff_section()
                    .characteristics
                    .get(object::LittleEndian),
            );

            if name == b".drectve" {
                if let Ok(data) = section.data() {
                    directives = Some(data.trim_ascii());
                }
                continue;
            }
            if name.starts_with(b".debug") {
                continue;
            }
            if characteristics.contains(SectionFlags::LnkRemove) {
                continue;
            }

            let relocs = match section.coff_relocations() {
                Ok(relocs) => relocs,
                Err(e) => {
                    warn!("{source}: section {index}: {e}; section skipped");
                    continue;
                }
            };

            let (data, uninit_size) = if characteristics
                .contains(SectionFlags::CntUninitializedData)
            {
                let size = section
                    .coff_section()
                    .size_of_raw_data
                    .get(object::LittleEndian);
                (&[][..], size)
            } else {
                match section.data() {
                    Ok(data) => (data, 0),
                    Err(e) => {
                        warn!("{source}: section {index}: {e}; section skipped");
                        continue;
                    }
                }
            };

            let id = self.push_chunk(Chunk::section(
                name,
                file,
                index,
                characteristics,
                data,
                uninit_size,
                relocs,
            ));
            sparse[index] = Some(id);
        }

        (sparse, directives)
    }

    /// Walks the symbol records, creating one body per non-auxiliary record
    /// and keeping a sparse index-to-slot table for relocation lookups.
    fn initialize_symbols(
        &mut self,
        file: FileId,
        data: &'a [u8],
        coff: &CoffFile<'a>,
    ) -> Result<Vec<Option<SymbolId>>, LinkError> {
        let source = self.files[file.index()].source.clone();
        let header = coff.coff_header();
        let symbol_count = header.number_of_symbols.get(object::LittleEndian) as usize;

        let mut sparse: Vec<Option<SymbolId>> = vec![None; symbol_count];
        let mut weak_fixups: Vec<(usize, u32)> = Vec::new();

        for symbol in coff.symbols() {
            let index = symbol.index().0;
            let raw = symbol.coff_symbol();
            let storage_class = raw.storage_class;
            let has_aux = raw.number_of_aux_symbols > 0;

            if storage_class == IMAGE_SYM_CLASS_FILE {
                continue;
            }

            let name = match symbol.name_bytes() {
                Ok(name) => name,
                Err(e) => {
                    warn!("{source}: symbol {index}: {e}; symbol skipped");
                    continue;
                }
            };
            if name == b"@comp.id" || name == b"@feat.00" {
                continue;
            }

            let value = raw.value.get(object::LittleEndian);
            let section = SectionNumber::from(raw.section_number.get(object::LittleEndian));
            let external = storage_class == IMAGE_SYM_CLASS_EXTERNAL
                || storage_class == IMAGE_SYM_CLASS_WEAK_EXTERNAL;

            let body = if storage_class == IMAGE_SYM_CLASS_WEAK_EXTERNAL {
                // The auxiliary record names the fallback; the alias slot is
                // patched once the whole table has been walked so forward
                // references resolve too.
                match has_aux
                    .then(|| aux_record::<pe::ImageAuxSymbolWeak>(data, header, index))
                    .flatten()
                {
                    Some(aux) => {
                        weak_fixups
                            .push((index, aux.weak_default_sym_index.get(object::LittleEndian)));
                    }
                    None => warn!("{source}: symbol {index}: missing weak external record"),
                }
                SymbolBody::Undefined { name, alias: None }
            } else if section == SectionNumber::Undefined && external && value == 0 {
                SymbolBody::Undefined { name, alias: None }
            } else if section == SectionNumber::Undefined && external {
                let chunk = self.push_chunk(Chunk::common(value));
                SymbolBody::DefinedCommon {
                    name,
                    chunk,
                    size: value,
                }
            } else if section == SectionNumber::Absolute {
                SymbolBody::DefinedAbsolute {
                    name,
                    va: value as u64,
                }
            } else if let Some(section_index) = section.index() {
                if has_aux && storage_class == IMAGE_SYM_CLASS_STATIC && value == 0 {
                    // Section symbol; its aux record may tie the section to
                    // an associative parent.
                    if let Some(aux) = aux_record::<pe::ImageAuxSymbolSection>(data, header, index)
                    {
                        if aux.selection == IMAGE_COMDAT_SELECT_ASSOCIATIVE {
                            let parent = aux_section_number(aux, false) as usize;
                            self.add_associative(file, parent, section_index);
                        }
                    }
                }

                match self.files[file.index()].sparse_chunks.get(section_index) {
                    Some(&Some(chunk)) => SymbolBody::DefinedRegular {
                        name,
                        file,
                        chunk,
                        value,
                    },
                    // The section was dropped or out of range; no body.
                    _ => continue,
                }
            } else {
                // Debug and other reserved section numbers.
                continue;
            };

            let id = self.add_symbol(body, external, &source)?;
            sparse[index] = Some(id);
        }

        for (index, tag) in weak_fixups {
            let Some(Some(id)) = sparse.get(index).copied() else {
                continue;
            };
            let target = sparse.get(tag as usize).copied().flatten();
            if let (Some(target), SymbolBody::Undefined { alias: None, .. }) =
                (target, &self.bodies[id.index()])
            {
                if let SymbolBody::Undefined { alias, .. } = &mut self.bodies[id.index()] {
                    *alias = Some(target);
                }
            }
        }

        Ok(sparse)
    }

    /// Registers the section at `child` as an associative child of `parent`.
    fn add_associative(&mut self, file: FileId, parent: usize, child: usize) {
        if parent == child {
            return;
        }
        let sparse = &self.files[file.index()].sparse_chunks;
        let (Some(&Some(parent)), Some(&Some(child))) = (sparse.get(parent), sparse.get(child))
        else {
            return;
        };

        let child_sec = match self.chunk_mut(child).as_section_mut() {
            Some(sec) if !sec.assoc_child => sec,
            _ => return,
        };
        child_sec.assoc_child = true;

        if let Some(parent_sec) = self.chunk_mut(parent).as_section_mut() {
            parent_sec.children.push(child);
        }
    }

    fn add_archive(&mut self, path: String, data: &'a [u8]) -> Result<(), LinkError> {
        let archive = LinkArchive::parse(path, data)?;
        let id = ArchiveId(self.archives.len() as u32);
        let source = FileSource::new(archive.path.clone());
        let symbols = archive.symbols.clone();
        self.archives.push(archive);

        for (name, offset) in symbols {
            self.add_symbol(
                SymbolBody::Lazy {
                    name,
                    archive: id,
                    member: offset,
                },
                true,
                &source,
            )?;
        }
        Ok(())
    }

    /// Parses a short import entry into `__imp_<name>` import data and, for
    /// code imports, a callable trampoline symbol.
    fn add_import(&mut self, source: FileSource, data: &'a [u8]) -> Result<(), LinkError> {
        let member = ImportMember::parse(data).map_err(|e| source.error(e))?;

        if member.architecture != object::Architecture::X86_64 {
            let machine = u16::from_le_bytes([data[6], data[7]]);
            return Err(source.error(MalformedKind::Machine(machine)));
        }

        let export = match member.import {
            object::read::coff::ImportName::Name(name) => name,
            object::read::coff::ImportName::Ordinal(ordinal) => {
                warn!(
                    "{source}: using public symbol name '{}' to resolve ordinal {ordinal} import",
                    display_name(member.symbol)
                );
                member.symbol
            }
        };

        let imp_name = self
            .store
            .alloc_bytes([b"__imp_".as_slice(), member.symbol].concat());

        let imp_id = self.add_symbol(
            SymbolBody::DefinedImportData {
                name: imp_name,
                dll: member.dll,
                export,
                location: None,
            },
            true,
            &source,
        )?;
        self.import_data.push(imp_id);

        if member.is_code {
            let chunk = self.push_chunk(Chunk::import_func(imp_id));
            self.add_symbol(
                SymbolBody::DefinedImportFunc {
                    name: member.symbol,
                    chunk,
                },
                true,
                &source,
            )?;
        }
        Ok(())
    }

    /// Drives archive extraction to a fixpoint: as long as some name is
    /// still undefined and an archive member offering it is known, load the
    /// member and feed its symbols back through `add_symbol`.
    pub fn resolve(&mut self) -> Result<(), LinkError> {
        loop {
            let next = self.lazy.iter().find_map(|(&id, &(archive, member))| {
                matches!(self.bodies[id.index()], SymbolBody::Undefined { .. })
                    .then_some((id, archive, member))
            });

            let Some((id, archive, member)) = next else {
                return Ok(());
            };
            self.lazy.shift_remove(&id);

            let wanted = self.bodies[id.index()].name();
            self.extract_member(archive, member, wanted)?;
        }
    }

    fn extract_member(
        &mut self,
        archive: ArchiveId,
        member: ArchiveOffset,
        wanted: &'a [u8],
    ) -> Result<(), LinkError> {
        let ar = &mut self.archives[archive.index()];
        let path = ar.path.clone();
        let Some((member_name, data)) = ar.member(member)? else {
            // Already extracted for another symbol.
            return Ok(());
        };

        if self.config.verbose {
            debug!("loaded {path}({member_name}) for {}", display_name(wanted));
        }

        let source = FileSource::member(path, member_name);
        match identify(data) {
            Some(FileKind::Import) => self.add_import(source, data),
            Some(FileKind::Object) => self.add_object(source, data).map(|_| ()),
            _ => Err(source.error(MalformedKind::UnknownFileType)),
        }
    }

    /// Collapses weak aliases and reports every name that is still
    /// undefined. After a successful return, every slot reachable from a
    /// relocation holds a defined body.
    pub fn report_remaining_undefined(&mut self) -> Result<(), LinkError> {
        let mut missing = Vec::new();

        for slot in 0..self.map.len() {
            let Some((_, &id)) = self.map.get_index(slot) else {
                continue;
            };
            let SymbolBody::Undefined { name, alias } = &self.bodies[id.index()] else {
                continue;
            };
            let (name, alias) = (*name, *alias);

            match self.resolve_alias(alias) {
                Some(body) => self.bodies[id.index()] = body,
                None => missing.push(display_name(name).into_owned()),
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LinkError::Unresolved(UnresolvedSymbols(missing)))
        }
    }

    /// Follows a weak-alias chain to a defined body.
    fn resolve_alias(&self, alias: Option<SymbolId>) -> Option<SymbolBody<'a>> {
        let mut hops = 0usize;
        let mut current = alias?;
        loop {
            match &self.bodies[current.index()] {
                body if body.is_defined() => return Some(body.clone()),
                SymbolBody::Undefined {
                    alias: Some(next), ..
                } => {
                    current = *next;
                    hops += 1;
                    // Alias cycles would loop forever; give up instead.
                    if hops > self.bodies.len() {
                        return None;
                    }
                }
                _ => return None,
            }
        }
    }

    /// Computes the reachable chunk set.
    ///
    /// Roots are the entrypoint's section and every non-COMDAT,
    /// non-associative data section; liveness propagates through relocation
    /// targets and associative children. Synthetic chunks are born live.
    pub fn mark_live(&mut self) {
        let mut stack: Vec<ChunkId> = Vec::new();

        if let Some(id) = self.find(self.config.entry.as_bytes()) {
            if let Some(chunk) = self.bodies[id.index()].chunk() {
                stack.push(chunk);
            }
        }

        for index in 0..self.chunks.len() {
            if self.chunks[index]
                .as_section()
                .is_some_and(|sec| sec.is_root())
            {
                stack.push(ChunkId(index as u32));
            }
        }

        while let Some(id) = stack.pop() {
            let chunk = &mut self.chunks[id.index()];
            if chunk.live {
                continue;
            }
            chunk.live = true;

            let (file, relocs, children) = match &chunk.kind {
                ChunkKind::Section(sec) => (sec.file, sec.relocs, sec.children.clone()),
                _ => continue,
            };

            for reloc in relocs {
                let index = reloc.symbol_table_index.get(object::LittleEndian) as usize;
                let target = self.files[file.index()]
                    .sparse_symbols
                    .get(index)
                    .copied()
                    .flatten();
                if let Some(target) = target {
                    if let Some(chunk) = self.bodies[target.index()].chunk() {
                        stack.push(chunk);
                    }
                }
            }

            stack.extend(children);
        }

        if self.config.verbose {
            for chunk in &self.chunks {
                if let Some(sec) = chunk.as_section() {
                    if !chunk.live {
                        debug!(
                            "{}: discarded section '{}'",
                            self.files[sec.file.index()].source,
                            display_name(chunk.name)
                        );
                    }
                }
            }
        }
    }
}

//! A static linker that consumes AMD64 COFF object files, archives, and
//! short-form import libraries and produces a PE32+ executable image.
//!
//! The pipeline runs strictly in sequence: input files are parsed into
//! chunks and symbol bodies, the resolver binds names (pulling archive
//! members on demand) and computes the live chunk set, the import tables
//! are synthesized, and the writer lays everything out and serializes the
//! image. See [`link`] for the whole flow.

use std::path::PathBuf;

pub mod chunks;
pub mod coff;
pub mod config;
pub mod error;
pub mod imports;
pub mod inputs;
pub mod resolver;
pub mod symbols;
pub mod writer;

pub use config::LinkConfig;
pub use error::LinkError;

use inputs::InputStore;
use resolver::SymbolTable;

/// Links the given inputs, in order, into a PE32+ image.
///
/// The returned buffer is the complete image; nothing is written to disk.
/// Errors before the end of the pipeline discard all intermediate state.
pub fn link(inputs: &[PathBuf], config: &LinkConfig) -> Result<Vec<u8>, LinkError> {
    if inputs.is_empty() {
        return Err(LinkError::NoInput);
    }

    let store = InputStore::new();
    let mut symtab = SymbolTable::new(&store, config.clone());

    for path in inputs {
        symtab.add_path(path)?;
    }

    symtab.resolve()?;
    symtab.report_remaining_undefined()?;
    symtab.mark_live();

    let imports = imports::create_import_tables(&mut symtab);
    writer::write_image(&mut symtab, imports)
}

/// Convenience front end over [`link`] for drivers.
#[derive(Debug, Default)]
pub struct Linker {
    config: LinkConfig,
    inputs: Vec<PathBuf>,
}

impl Linker {
    pub fn new() -> Linker {
        Self::default()
    }

    pub fn entry(&mut self, name: impl Into<String>) -> &mut Linker {
        self.config.entry = name.into();
        self
    }

    pub fn image_base(&mut self, base: u64) -> &mut Linker {
        self.config.image_base = base;
        self
    }

    pub fn verbose(&mut self, verbose: bool) -> &mut Linker {
        self.config.verbose = verbose;
        self
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> &mut Linker {
        self.inputs.push(path.into());
        self
    }

    pub fn link(&self) -> Result<Vec<u8>, LinkError> {
        link(&self.inputs, &self.config)
    }
}

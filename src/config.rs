//! Linker configuration.

/// Immutable configuration for a single link.
///
/// The driver builds one of these up front; the resolver and writer only
/// ever see it by shared reference so there is no ambient mutable state to
/// reason about.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Name of the entrypoint symbol.
    pub entry: String,

    /// Base address the image is linked against. The image carries no base
    /// relocations, so the loader must map it here.
    pub image_base: u64,

    /// Log discarded sections and loaded archive members.
    pub verbose: bool,
}

impl std::default::Default for LinkConfig {
    fn default() -> Self {
        Self {
            entry: "mainCRTStartup".into(),
            image_base: 0x140000000,
            verbose: false,
        }
    }
}

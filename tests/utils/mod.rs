use std::path::PathBuf;

pub mod ar;
pub mod coff;
pub mod import;

/// Scratch directory for link inputs and outputs.
pub struct TestFs {
    dir: tempfile::TempDir,
}

#[allow(unused)]
impl TestFs {
    pub fn new() -> TestFs {
        Self {
            dir: tempfile::tempdir().expect("failed creating test directory"),
        }
    }

    pub fn write(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, data).expect("failed writing test input");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

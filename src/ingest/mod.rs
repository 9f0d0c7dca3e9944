// Ingest module
// Turns uploaded files into pages and pages into chunks

pub mod chunking;
pub mod loader;

use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

pub use chunking::{Chunk, split};
pub use loader::{DocumentSource, Page, load};

/// A file received in an upload request, held in memory until it is written to disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    #[inline]
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Extension of the declared filename without the dot, empty when there is none.
    #[inline]
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Name used on disk. Directory components of the declared name are dropped.
    #[inline]
    pub fn stored_name(&self) -> String {
        Path::new(&self.filename)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("upload-{}", Uuid::new_v4().simple()))
    }

    /// Write the file into `dir` and return its path.
    #[inline]
    pub async fn persist(&self, dir: &Path) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(self.stored_name());
        fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

//! File capture: turning local report files into [`FilePayload`]s.
//!
//! Each file is checked on its own; a rejected file is reported and the rest
//! of the batch is still captured.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::FilePayload;

/// Default per-file ceiling: 4 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 4 * 1024 * 1024;

/// Per-file capture failures.
#[derive(Error, Debug)]
pub enum CaptureFault {
    #[error("file {name} is too large ({size} bytes, limit {limit})")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("file {name} has unsupported type {mime_type}")]
    UnsupportedType { name: String, mime_type: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Files captured from one selection, plus the ones that were rejected.
#[derive(Debug, Default)]
pub struct CaptureBatch {
    pub files: Vec<FilePayload>,
    pub faults: Vec<CaptureFault>,
}

/// Reads report images and PDFs from disk.
#[derive(Debug, Clone)]
pub struct FileCapture {
    max_file_bytes: u64,
}

impl Default for FileCapture {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl FileCapture {
    pub fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Capture a single file.
    pub fn capture_path(&self, path: &Path) -> Result<FilePayload, CaptureFault> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !is_supported(&mime_type) {
            return Err(CaptureFault::UnsupportedType { name, mime_type });
        }

        let io_err = |source| CaptureFault::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > self.max_file_bytes {
            return Err(CaptureFault::TooLarge {
                name,
                size,
                limit: self.max_file_bytes,
            });
        }

        let bytes = std::fs::read(path).map_err(io_err)?;
        Ok(FilePayload::from_bytes(name, mime_type, &bytes))
    }

    /// Capture every path, collecting failures instead of stopping at the first.
    pub fn capture_paths<I, P>(&self, paths: I) -> CaptureBatch
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut batch = CaptureBatch::default();
        for path in paths {
            match self.capture_path(path.as_ref()) {
                Ok(file) => batch.files.push(file),
                Err(fault) => {
                    tracing::warn!(error = %fault, "skipping file");
                    batch.faults.push(fault);
                }
            }
        }
        batch
    }
}

/// Images of any kind and PDFs are accepted.
fn is_supported(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || mime_type == "application/pdf"
}

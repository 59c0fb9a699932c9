//! Packaging a finished recording as a downloadable file.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ExportError;

pub const EXPORT_FILENAME: &str = "audio-visualization.webm";
pub const EXPORT_MIME: &str = "video/webm;codecs=vp9";

/// Encoded chunks joined in delivery order.
#[derive(Clone, Debug, PartialEq)]
pub struct Blob {
    data: Vec<u8>,
    chunk_count: usize,
}

impl Blob {
    /// Zero-size chunks are skipped and do not count.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let mut data = Vec::new();
        let mut chunk_count = 0;
        for chunk in chunks {
            let chunk = chunk.as_ref();
            if chunk.is_empty() {
                continue;
            }
            data.extend_from_slice(chunk);
            chunk_count += 1;
        }
        Self { data, chunk_count }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn mime(&self) -> &'static str {
        EXPORT_MIME
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExportReceipt {
    pub path: PathBuf,
    pub mime: &'static str,
    pub bytes: usize,
    pub chunks: usize,
}

impl ExportReceipt {
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

pub trait ExportSink {
    fn export(&mut self, blob: &Blob) -> Result<ExportReceipt, ExportError>;
}

/// Saves exports into a directory under the fixed file name.
///
/// The blob is staged in a temporary file next to the target and renamed into
/// place. The temporary handle is consumed by the rename, or deleted on drop
/// when anything fails before it.
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn target(&self) -> PathBuf {
        self.dir.join(EXPORT_FILENAME)
    }
}

impl ExportSink for DownloadDir {
    fn export(&mut self, blob: &Blob) -> Result<ExportReceipt, ExportError> {
        if !self.dir.is_dir() {
            return Err(ExportError::MissingDirectory(self.dir.display().to_string()));
        }

        let mut staging = tempfile::Builder::new()
            .prefix(".audio-visualization-")
            .suffix(".part")
            .tempfile_in(&self.dir)?;
        staging.write_all(blob.data())?;
        staging.as_file().sync_all()?;

        let target = self.target();
        staging.persist(&target)?;

        log::info!(
            "Exported {} ({} bytes, {} chunks, {})",
            target.display(),
            blob.len(),
            blob.chunk_count(),
            blob.mime()
        );

        Ok(ExportReceipt {
            path: target,
            mime: blob.mime(),
            bytes: blob.len(),
            chunks: blob.chunk_count(),
        })
    }
}

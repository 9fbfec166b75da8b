//! The file being uploaded: declared metadata plus random-access reads.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const FALLBACK_NAME: &str = "upload.bin";
const FALLBACK_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone)]
enum FileData {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

/// A file handle plus its declared name, size and content type.
///
/// Cloning is cheap: on-disk files are reopened per read and in-memory
/// buffers are shared.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    size: u64,
    file_type: String,
    data: FileData,
}

impl UploadFile {
    /// Stat a file on disk; the content type is inferred from its extension.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_NAME.to_string());
        Ok(Self {
            file_type: guess_file_type(&name).to_string(),
            name,
            size: meta.len(),
            data: FileData::Path(path.to_path_buf()),
        })
    }

    /// Wrap an in-memory buffer (e.g. a finished recording).
    pub fn from_bytes(
        name: impl Into<String>,
        file_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            file_type: file_type.into(),
            data: FileData::Memory(Arc::from(bytes)),
        }
    }

    /// Override the declared content type.
    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = file_type.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    /// Read bytes `[start, end)`. Fails if the range lies outside the declared
    /// size or the file shrank since it was opened.
    pub async fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        if start > end || end > self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "range {}..{} outside file of {} bytes",
                    start, end, self.size
                ),
            ));
        }
        match &self.data {
            FileData::Memory(bytes) => Ok(bytes[start as usize..end as usize].to_vec()),
            FileData::Path(path) => {
                let mut f = tokio::fs::File::open(path).await?;
                f.seek(SeekFrom::Start(start)).await?;
                let mut buf = vec![0u8; (end - start) as usize];
                f.read_exact(&mut buf).await?;
                Ok(buf)
            }
        }
    }
}

/// Best-effort content type from a file extension. Media formats come first
/// since recordings are the common payload.
pub fn guess_file_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "webm" => "video/webm",
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "json" => "application/json",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => FALLBACK_TYPE,
    }
}

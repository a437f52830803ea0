use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::formats;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

/// Directory holding uploaded images. Records refer to files by their name
/// relative to this root.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, UploadError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.resolve(filename).is_file()
    }

    /// Sanitized name for an upload, or why it would be refused.
    pub fn check_name(&self, original_name: &str) -> Result<String, UploadError> {
        let filename = secure_filename(original_name)
            .ok_or_else(|| UploadError::InvalidFilename(original_name.to_string()))?;

        if formats::from_path(Path::new(&filename)).is_none() {
            return Err(UploadError::UnsupportedFormat(filename));
        }

        Ok(filename)
    }

    /// Stores `data` under a sanitized, not-yet-used name and returns that name.
    pub fn save(&self, original_name: &str, data: &[u8]) -> Result<String, UploadError> {
        let filename = self.check_name(original_name)?;
        let filename = self.unused_name(&filename);
        std::fs::write(self.resolve(&filename), data)?;
        info!("Stored upload {} ({} bytes)", filename, data.len());

        Ok(filename)
    }

    /// Deletes a stored upload. Missing files are not an error.
    pub fn remove(&self, filename: &str) -> Result<(), UploadError> {
        let Some(name) = secure_filename(filename).filter(|name| name == filename) else {
            return Err(UploadError::InvalidFilename(filename.to_string()));
        };

        match std::fs::remove_file(self.resolve(&name)) {
            Ok(()) => {
                info!("Removed upload {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn unused_name(&self, filename: &str) -> String {
        if !self.resolve(filename).exists() {
            return filename.to_string();
        }

        let path = Path::new(filename);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("upload");
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        (1..)
            .map(|n| format!("{}_{}.{}", stem, n, extension))
            .find(|candidate| !self.resolve(candidate).exists())
            .unwrap_or_else(|| filename.to_string())
    }
}

/// Keeps ASCII letters, digits, `.`, `-` and `_`; whitespace becomes `_`.
/// Directory components and leading dots are dropped.
pub fn secure_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

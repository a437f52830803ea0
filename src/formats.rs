use log::info;
use std::path::Path;
use std::sync::OnceLock;

/// Image formats accepted for upload and metadata extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoFormat {
    Jpeg,
    Png,
    Tiff,
    Webp,
    Heic,
}

impl PhotoFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            PhotoFormat::Jpeg => "image/jpeg",
            PhotoFormat::Png => "image/png",
            PhotoFormat::Tiff => "image/tiff",
            PhotoFormat::Webp => "image/webp",
            PhotoFormat::Heic => "image/heic",
        }
    }

    /// Encoder/decoder used when pixels have to be rewritten.
    /// `None` means the file can be read for metadata but never re-encoded.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            PhotoFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            PhotoFormat::Png => Some(image::ImageFormat::Png),
            PhotoFormat::Tiff => Some(image::ImageFormat::Tiff),
            PhotoFormat::Webp => Some(image::ImageFormat::WebP),
            PhotoFormat::Heic => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(PhotoFormat::Jpeg),
            "png" => Some(PhotoFormat::Png),
            "tif" | "tiff" => Some(PhotoFormat::Tiff),
            "webp" => Some(PhotoFormat::Webp),
            "heic" | "heif" => Some(PhotoFormat::Heic),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhotoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

#[derive(Debug)]
pub struct FormatRegistry {
    formats: Vec<PhotoFormat>,
}

impl FormatRegistry {
    fn with_defaults() -> Self {
        Self {
            formats: vec![
                PhotoFormat::Jpeg,
                PhotoFormat::Png,
                PhotoFormat::Tiff,
                PhotoFormat::Webp,
                PhotoFormat::Heic,
            ],
        }
    }

    pub fn formats(&self) -> &[PhotoFormat] {
        &self.formats
    }

    pub fn lookup(&self, path: &Path) -> Option<PhotoFormat> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(PhotoFormat::from_extension)
            .filter(|format| self.formats.contains(format))
    }
}

static REGISTRY: OnceLock<FormatRegistry> = OnceLock::new();

/// Registers every supported format. Called once from `main`; later calls
/// return the already registered set.
pub fn register_formats() -> &'static FormatRegistry {
    REGISTRY.get_or_init(|| {
        let registry = FormatRegistry::with_defaults();
        info!(
            "Registered image formats: {}",
            registry
                .formats()
                .iter()
                .map(|f| f.mime_type())
                .collect::<Vec<_>>()
                .join(", ")
        );
        registry
    })
}

/// Detects the registered format of a file by its extension.
pub fn from_path(path: &Path) -> Option<PhotoFormat> {
    register_formats().lookup(path)
}

//! Orientation normalizer
//!
//! Rewrites photos whose EXIF orientation flag asks viewers to rotate or
//! mirror them:
//! - physical pixel transformation using the `image` crate
//! - re-encode (JPEG at the configured quality)
//! - remaining EXIF fields re-attached without the orientation tag (JPEG/PNG)
//! - atomic replace through a temp file in the same directory
//!
//! Must run after metadata extraction on the same file.

use std::fs::File;
use std::io::{BufReader, Cursor, Write};
use std::path::Path;

use exif::{Field, In, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageFormat, ImageReader};
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::{Bytes, ImageEXIF};
use log::{debug, error, info, warn};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::formats::{self, PhotoFormat};

/// Tags the EXIF writer regenerates itself or that point into the old file layout.
const SKIPPED_TAGS: [Tag; 6] = [
    Tag::Orientation,
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
];

#[derive(Debug, Error)]
pub enum OrientationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("Container error: {0}")]
    Container(String),
}

/// Rotates/mirrors `path` upright if its orientation flag says so.
/// Returns whether the file was rewritten; failures are logged and count as
/// "no change".
pub fn normalize_orientation(path: &Path, jpeg_quality: u8) -> bool {
    match try_normalize(path, jpeg_quality) {
        Ok(true) => {
            info!("Fixed orientation for {}", path.display());
            true
        }
        Ok(false) => false,
        Err(e) => {
            error!("Error fixing orientation for {}: {}", path.display(), e);
            false
        }
    }
}

fn try_normalize(path: &Path, jpeg_quality: u8) -> Result<bool, OrientationError> {
    let Some(format) = formats::from_path(path) else {
        debug!("Skipping orientation check for unregistered format: {}", path.display());
        return Ok(false);
    };

    let Some(exif) = read_exif(path)? else {
        return Ok(false);
    };

    let Some(orientation) = exif
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .and_then(|value| u8::try_from(value).ok())
        .and_then(Orientation::from_exif)
    else {
        return Ok(false);
    };

    if matches!(orientation, Orientation::NoTransforms) {
        return Ok(false);
    }

    let Some(image_format) = format.image_format() else {
        // HEIF carries its rotation in container transforms that viewers apply
        debug!(
            "Leaving {} orientation to its container ({:?})",
            format,
            orientation
        );
        return Ok(false);
    };

    let mut img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    img.apply_orientation(orientation);

    let encoded = encode(&img, image_format, jpeg_quality)?;
    let output = match reattach_exif(&encoded, format, &exif) {
        Ok(with_exif) => with_exif,
        Err(e) => {
            warn!(
                "Dropping EXIF block of {} after rotation: {}",
                path.display(),
                e
            );
            encoded
        }
    };

    replace_file(path, &output)?;
    Ok(true)
}

fn read_exif(path: &Path) -> Result<Option<exif::Exif>, OrientationError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, OrientationError> {
    let mut buffer = Cursor::new(Vec::new());

    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
            if img.color().has_alpha() {
                DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
            } else {
                img.write_with_encoder(encoder)?;
            }
        }
        other => img.write_to(&mut buffer, other)?,
    }

    Ok(buffer.into_inner())
}

/// Copies every primary-IFD field except the orientation flag into the
/// freshly encoded image.
fn reattach_exif(
    encoded: &[u8],
    format: PhotoFormat,
    exif: &exif::Exif,
) -> Result<Vec<u8>, OrientationError> {
    if !matches!(format, PhotoFormat::Jpeg | PhotoFormat::Png) {
        return Ok(encoded.to_vec());
    }

    let kept: Vec<&Field> = exif
        .fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        .filter(|field| !SKIPPED_TAGS.contains(&field.tag))
        .filter(|field| !matches!(field.value, Value::Unknown(..)))
        .collect();

    if kept.is_empty() {
        return Ok(encoded.to_vec());
    }

    let mut writer = exif::experimental::Writer::new();
    for field in &kept {
        writer.push_field(field);
    }

    let mut exif_buffer = Cursor::new(Vec::new());
    writer.write(&mut exif_buffer, exif.little_endian())?;
    let exif_bytes = Bytes::from(exif_buffer.into_inner());
    let image_bytes = Bytes::copy_from_slice(encoded);

    let output = match format {
        PhotoFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(image_bytes)
                .map_err(|e| OrientationError::Container(format!("Failed to parse JPEG: {}", e)))?;
            jpeg.set_exif(Some(exif_bytes));
            jpeg.encoder().bytes()
        }
        _ => {
            let mut png = Png::from_bytes(image_bytes)
                .map_err(|e| OrientationError::Container(format!("Failed to parse PNG: {}", e)))?;
            png.set_exif(Some(exif_bytes));
            png.encoder().bytes()
        }
    };

    Ok(output.to_vec())
}

fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), OrientationError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.persist(path).map_err(|e| OrientationError::Io(e.error))?;

    Ok(())
}

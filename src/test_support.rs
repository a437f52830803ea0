//! Builders for test images with hand-made EXIF blocks.

use exif::{Field, In, Rational, Tag, Value};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use crate::geocoding::{Address, GeoCoordinate, GeocodeError, ReverseGeocoder};
use crate::pipeline::MetadataPipeline;
use crate::uploads::UploadDir;

pub const RED: Rgb<u8> = Rgb([220, 20, 20]);
pub const BLUE: Rgb<u8> = Rgb([20, 20, 220]);

pub fn ascii(text: &str) -> Value {
    Value::Ascii(vec![text.as_bytes().to_vec()])
}

pub fn rational(parts: &[(u32, u32)]) -> Value {
    Value::Rational(
        parts
            .iter()
            .map(|&(num, denom)| Rational { num, denom })
            .collect(),
    )
}

pub fn orientation_field(orientation: u16) -> Field {
    Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![orientation]),
    }
}

/// Left half red, right half blue.
pub fn split_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, _| if x < width / 2 { RED } else { BLUE });
    DynamicImage::ImageRgb8(img)
}

pub fn encode_exif(fields: &[Field]) -> Vec<u8> {
    let mut writer = exif::experimental::Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut buffer = Cursor::new(Vec::new());
    writer.write(&mut buffer, false).unwrap();
    buffer.into_inner()
}

pub fn write_jpeg(path: &Path, width: u32, height: u32, fields: &[Field]) {
    let mut encoded = Cursor::new(Vec::new());
    split_image(width, height)
        .write_to(&mut encoded, ImageFormat::Jpeg)
        .unwrap();

    let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded.into_inner())).unwrap();
    if !fields.is_empty() {
        jpeg.set_exif(Some(Bytes::from(encode_exif(fields))));
    }
    std::fs::write(path, jpeg.encoder().bytes()).unwrap();
}

/// True when the pixel is clearly more red than blue.
pub fn is_reddish(pixel: Rgb<u8>) -> bool {
    pixel[0] > pixel[2]
}

/// Geocoder whose every lookup fails, leaving the coordinate label.
pub struct OfflineGeocoder;

impl ReverseGeocoder for OfflineGeocoder {
    fn reverse(&self, _coordinate: GeoCoordinate) -> Result<Address, GeocodeError> {
        Err(GeocodeError::NoResult("offline".to_string()))
    }
}

pub fn offline_pipeline(root: &Path) -> MetadataPipeline {
    MetadataPipeline::new(UploadDir::new(root).unwrap(), Arc::new(OfflineGeocoder), 95)
}

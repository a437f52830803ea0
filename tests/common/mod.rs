#![allow(dead_code)]

use exif::{Field, In, Rational, Tag, Value};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::io::Cursor;
use std::sync::Arc;

use photoblog::geocoding::{Address, GeoCoordinate, GeocodeError, ReverseGeocoder};
use photoblog::pipeline::MetadataPipeline;
use photoblog::uploads::UploadDir;

pub const BOUNDARY: &str = "photoblog-test-boundary";

/// Answers every lookup with the same town in France.
pub struct FixedGeocoder(pub &'static str);

impl ReverseGeocoder for FixedGeocoder {
    fn reverse(&self, _coordinate: GeoCoordinate) -> Result<Address, GeocodeError> {
        Ok(Address {
            town: Some(self.0.to_string()),
            country: Some("France".to_string()),
            ..Default::default()
        })
    }
}

pub fn field(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

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

/// A camera JPEG shot sideways (orientation 6) somewhere with GPS.
pub fn camera_fields() -> Vec<Field> {
    vec![
        field(Tag::Make, ascii("FUJIFILM")),
        field(Tag::Model, ascii("X-T5")),
        field(Tag::LensModel, ascii("XF23mmF1.4 R LM WR")),
        field(Tag::DateTimeOriginal, ascii("2024:05:18 06:12:40")),
        field(Tag::FocalLength, rational(&[(23, 1)])),
        field(Tag::FNumber, rational(&[(14, 10)])),
        field(Tag::ExposureTime, rational(&[(1, 500)])),
        field(Tag::PhotographicSensitivity, Value::Short(vec![160])),
        field(Tag::GPSLatitudeRef, ascii("N")),
        field(Tag::GPSLatitude, rational(&[(48, 1), (51, 1), (30, 1)])),
        field(Tag::GPSLongitudeRef, ascii("E")),
        field(Tag::GPSLongitude, rational(&[(2, 1), (17, 1), (40, 1)])),
        field(Tag::Orientation, Value::Short(vec![6])),
    ]
}

pub fn jpeg_bytes(width: u32, height: u32, fields: &[Field]) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([220, 20, 20])
        } else {
            Rgb([20, 20, 220])
        }
    });

    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut encoded, ImageFormat::Jpeg)
        .unwrap();

    let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded.into_inner())).unwrap();
    if !fields.is_empty() {
        let mut writer = exif::experimental::Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut exif_buffer = Cursor::new(Vec::new());
        writer.write(&mut exif_buffer, false).unwrap();
        jpeg.set_exif(Some(Bytes::from(exif_buffer.into_inner())));
    }
    jpeg.encoder().bytes().to_vec()
}

/// multipart/form-data body with one file per `(field, filename, bytes)`.
pub fn multipart_body(files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn pipeline(uploads: UploadDir) -> MetadataPipeline {
    MetadataPipeline::new(uploads, Arc::new(FixedGeocoder("Montmartre")), 95)
}

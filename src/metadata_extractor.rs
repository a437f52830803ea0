use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

use crate::geocoding::{dms_to_decimal, resolve_place_name, GeoCoordinate, ReverseGeocoder};

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
}

/// Capture metadata derived from a photo. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ExtractedMetadata {
    pub date_taken: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<u32>,
}

impl ExtractedMetadata {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Primary-IFD EXIF fields keyed by tag name ("DateTimeOriginal", "GPSLatitude", ...).
#[derive(Debug, Default, Clone)]
pub struct RawExifMap {
    fields: HashMap<String, Value>,
}

impl RawExifMap {
    pub fn from_exif(exif: &exif::Exif) -> Self {
        let mut map = Self::default();
        for field in exif.fields() {
            if field.ifd_num == In::PRIMARY {
                map.fields
                    .entry(field.tag.to_string())
                    .or_insert_with(|| field.value.clone());
            }
        }
        map
    }

    pub fn insert(&mut self, tag: Tag, value: Value) {
        self.fields.insert(tag.to_string(), value);
    }

    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.fields.get(&tag.to_string())
    }

    fn text(&self, tag: Tag) -> Option<String> {
        match self.get(tag)? {
            Value::Ascii(parts) => parts
                .iter()
                .map(|bytes| clean_exif_string(&String::from_utf8_lossy(bytes)))
                .find(|s| !s.is_empty()),
            _ => None,
        }
    }

    fn number(&self, tag: Tag) -> Option<f64> {
        let value = match self.get(tag)? {
            Value::Rational(v) => v.first()?.to_f64(),
            Value::SRational(v) => v.first()?.to_f64(),
            other => other.get_uint(0)? as f64,
        };
        value.is_finite().then_some(value)
    }

    fn dms(&self, tag: Tag) -> Option<[f64; 3]> {
        match self.get(tag)? {
            Value::Rational(v) if v.len() >= 3 => {
                let dms = [v[0].to_f64(), v[1].to_f64(), v[2].to_f64()];
                dms.iter().all(|c| c.is_finite()).then_some(dms)
            }
            _ => None,
        }
    }
}

pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Reads the capture metadata of `path`. Never fails: a missing or broken
    /// EXIF block yields an empty result. GPS tags are only turned into a
    /// location when a geocoder is given.
    pub fn extract(path: &Path, geocoder: Option<&dyn ReverseGeocoder>) -> ExtractedMetadata {
        match Self::read_raw_exif(path) {
            Ok(raw) => Self::extract_from_map(&raw, geocoder),
            Err(MetadataError::Exif(exif::Error::NotFound(_))) => {
                debug!("No EXIF data in {}", path.display());
                ExtractedMetadata::default()
            }
            Err(e) => {
                warn!("Error reading EXIF from {}: {}", path.display(), e);
                ExtractedMetadata::default()
            }
        }
    }

    pub fn read_raw_exif(path: &Path) -> Result<RawExifMap, MetadataError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = Reader::new().read_from_container(&mut reader)?;
        Ok(RawExifMap::from_exif(&exif))
    }

    pub fn extract_from_map(
        raw: &RawExifMap,
        geocoder: Option<&dyn ReverseGeocoder>,
    ) -> ExtractedMetadata {
        ExtractedMetadata {
            date_taken: raw
                .text(Tag::DateTimeOriginal)
                .and_then(|s| Self::parse_exif_datetime(&s)),
            camera_make: raw.text(Tag::Make),
            camera_model: raw.text(Tag::Model),
            lens: raw.text(Tag::LensModel),
            focal_length: raw
                .number(Tag::FocalLength)
                .map(|v| format!("{}mm", v)),
            aperture: raw.number(Tag::FNumber).map(|v| format!("f/{}", v)),
            shutter_speed: raw
                .number(Tag::ExposureTime)
                .map(|v| format!("{}s", v)),
            iso: raw
                .get(Tag::PhotographicSensitivity)
                .and_then(|v| v.get_uint(0)),
            location: geocoder.and_then(|geocoder| {
                Self::gps_coordinate(raw)
                    .map(|coordinate| resolve_place_name(geocoder, coordinate))
            }),
        }
    }

    /// Only returns a coordinate when both axes carry a full DMS triple and a
    /// hemisphere reference.
    pub fn gps_coordinate(raw: &RawExifMap) -> Option<GeoCoordinate> {
        let lat = raw.dms(Tag::GPSLatitude)?;
        let lat_ref = raw.text(Tag::GPSLatitudeRef)?;
        let lon = raw.dms(Tag::GPSLongitude)?;
        let lon_ref = raw.text(Tag::GPSLongitudeRef)?;

        Some(GeoCoordinate::new(
            dms_to_decimal(lat, &lat_ref),
            dms_to_decimal(lon, &lon_ref),
        ))
    }

    pub fn parse_exif_datetime(datetime_str: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(datetime_str.trim(), EXIF_DATETIME_FORMAT).ok()
    }
}

/// Strips NUL padding and surrounding whitespace from an EXIF ASCII value.
fn clean_exif_string(value: &str) -> String {
    value.replace('\0', "").trim().to_string()
}

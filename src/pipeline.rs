use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::db::{Photo, PhotoStore};
use crate::geocoding::ReverseGeocoder;
use crate::metadata_extractor::{ExtractedMetadata, MetadataExtractor};
use crate::orientation::normalize_orientation;
use crate::uploads::UploadDir;

/// Outcome of one post-saved hook run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct HookReport {
    pub processed: usize,
    pub skipped: usize,
    pub updated: usize,
    pub rotated: usize,
}

/// Result of running both stages on one file.
#[derive(Debug, Clone, Default)]
pub struct ProcessedFile {
    pub metadata: ExtractedMetadata,
    pub rotated: bool,
}

#[derive(Clone)]
pub struct MetadataPipeline {
    uploads: UploadDir,
    geocoder: Arc<dyn ReverseGeocoder>,
    jpeg_quality: u8,
}

impl MetadataPipeline {
    pub fn new(uploads: UploadDir, geocoder: Arc<dyn ReverseGeocoder>, jpeg_quality: u8) -> Self {
        Self {
            uploads,
            geocoder,
            jpeg_quality,
        }
    }

    pub fn uploads(&self) -> &UploadDir {
        &self.uploads
    }

    /// Extracts metadata, then normalizes orientation. The order is fixed:
    /// re-encoding may drop tags the extractor needs. The geocoder is only
    /// consulted when `resolve_location` is set.
    pub fn process_file(&self, path: &Path, resolve_location: bool) -> ProcessedFile {
        let geocoder = resolve_location.then(|| self.geocoder.as_ref());
        let metadata = MetadataExtractor::extract(path, geocoder);
        debug!("Metadata extracted from {}: {:?}", path.display(), metadata);

        let rotated = normalize_orientation(path, self.jpeg_quality);

        ProcessedFile { metadata, rotated }
    }

    /// Runs the pipeline for every photo of a freshly saved post and commits
    /// newly filled fields in one batch. Only store failures are returned.
    pub async fn after_post_saved<S>(&self, store: &S, post_id: i64) -> Result<HookReport, sqlx::Error>
    where
        S: PhotoStore + ?Sized,
    {
        let photos = store.photos_for_post(post_id).await?;
        let mut report = HookReport::default();
        let mut changed = Vec::new();

        for mut photo in photos {
            let Some(filename) = photo.image_filename.clone().filter(|f| !f.is_empty()) else {
                continue;
            };

            if !self.uploads.exists(&filename) {
                warn!(
                    "File does not exist at {}, skipping photo {}",
                    self.uploads.resolve(&filename).display(),
                    photo.id
                );
                report.skipped += 1;
                continue;
            }

            let path = self.uploads.resolve(&filename);
            let resolve_location = is_blank(&photo.location);
            let pipeline = self.clone();
            let task = move || pipeline.process_file(&path, resolve_location);
            let processed = match tokio::task::spawn_blocking(task).await {
                Ok(processed) => processed,
                Err(e) => {
                    error!("Metadata task for photo {} failed: {}", photo.id, e);
                    ProcessedFile::default()
                }
            };

            report.processed += 1;
            if processed.rotated {
                report.rotated += 1;
            }

            if reconcile(&mut photo, &processed.metadata) {
                changed.push(photo);
            }
        }

        if !changed.is_empty() {
            store.commit_metadata(&changed).await?;
            report.updated = changed.len();
            info!(
                "Updated metadata of {} photo(s) for post {}",
                changed.len(),
                post_id
            );
        }

        Ok(report)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn fill(target: &mut Option<String>, value: &Option<String>) -> bool {
    match value {
        Some(v) if is_blank(target) && !v.is_empty() => {
            *target = Some(v.clone());
            true
        }
        _ => false,
    }
}

/// Copies extracted values into fields that are still empty. Returns whether
/// anything changed; filled fields are never overwritten.
pub fn reconcile(photo: &mut Photo, extracted: &ExtractedMetadata) -> bool {
    let mut changed = false;

    if photo.date_taken.is_none() {
        if let Some(date_taken) = extracted.date_taken {
            photo.date_taken = Some(date_taken);
            changed = true;
        }
    }

    changed |= fill(&mut photo.location, &extracted.location);
    changed |= fill(&mut photo.camera_make, &extracted.camera_make);
    changed |= fill(&mut photo.camera_model, &extracted.camera_model);
    changed |= fill(&mut photo.lens, &extracted.lens);
    changed |= fill(&mut photo.focal_length, &extracted.focal_length);
    changed |= fill(&mut photo.aperture, &extracted.aperture);
    changed |= fill(&mut photo.shutter_speed, &extracted.shutter_speed);
    changed |= fill(&mut photo.iso, &extracted.iso.map(|iso| iso.to_string()));

    changed
}

use bytes::BufMut;
use futures::TryStreamExt;
use serde::Serialize;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection, Reply};

use crate::db::{DbPool, Photo, Post};
use crate::pipeline::{HookReport, MetadataPipeline};
use crate::uploads::UploadError;
use crate::warp_helpers::{
    db_rejection, not_found, validation, with_db, with_pipeline, DatabaseError,
};

const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub post_id: i64,
    pub photos: Vec<Photo>,
    pub report: HookReport,
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut data, chunk| {
            data.put(chunk);
            async move { Ok(data) }
        })
        .await
}

async fn require_post(db_pool: &DbPool, post_id: i64) -> Result<Post, Rejection> {
    Post::find_by_id(db_pool, post_id)
        .await
        .map_err(db_rejection)?
        .ok_or_else(|| not_found("Post"))
}

fn upload_rejection(original_name: &str, e: UploadError) -> Rejection {
    match e {
        UploadError::Io(e) => {
            log::error!("Failed to store upload {}: {}", original_name, e);
            warp::reject::custom(DatabaseError {
                message: format!("Failed to store upload: {}", e),
            })
        }
        other => validation(other.to_string()),
    }
}

/// Reads every `image` part into memory and checks its name before anything
/// touches the upload directory.
async fn read_images(
    mut form: FormData,
    pipeline: &MetadataPipeline,
) -> Result<Vec<(String, Vec<u8>)>, Rejection> {
    let mut images = Vec::new();
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| validation(format!("Malformed multipart body: {}", e)))?
    {
        if part.name() != IMAGE_FIELD {
            continue;
        }

        let Some(original_name) = part.filename().map(str::to_string) else {
            continue;
        };

        let data = read_part(part)
            .await
            .map_err(|e| validation(format!("Failed to read upload: {}", e)))?;
        if data.is_empty() {
            continue;
        }

        pipeline
            .uploads()
            .check_name(&original_name)
            .map_err(|e| upload_rejection(&original_name, e))?;
        images.push((original_name, data));
    }

    if images.is_empty() {
        return Err(validation(format!(
            "No files found in the '{}' field",
            IMAGE_FIELD
        )));
    }

    Ok(images)
}

/// Best-effort removal of files stored by a request that then failed.
fn discard(pipeline: &MetadataPipeline, saved: &[String]) {
    for filename in saved {
        if let Err(e) = pipeline.uploads().remove(filename) {
            log::warn!("Failed to discard upload {}: {}", filename, e);
        }
    }
}

pub async fn upload_photos(
    post_id: i64,
    form: FormData,
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> Result<impl Reply, Rejection> {
    let post = require_post(&db_pool, post_id).await?;
    let images = read_images(form, &pipeline).await?;

    let mut saved = Vec::with_capacity(images.len());
    for (original_name, data) in &images {
        match pipeline.uploads().save(original_name, data) {
            Ok(filename) => saved.push(filename),
            Err(e) => {
                discard(&pipeline, &saved);
                return Err(upload_rejection(original_name, e));
            }
        }
    }

    if let Err(e) = Photo::create_many(&db_pool, post_id, &saved).await {
        discard(&pipeline, &saved);
        return Err(db_rejection(e));
    }

    if post.image_filename.is_none() {
        Post::set_cover(&db_pool, post_id, &saved[0])
            .await
            .map_err(db_rejection)?;
    }

    let report = pipeline
        .after_post_saved(&db_pool, post_id)
        .await
        .map_err(db_rejection)?;
    log::info!(
        "Stored {} upload(s) for post {}: {:?}",
        saved.len(),
        post_id,
        report
    );

    let photos = Photo::list_for_post(&db_pool, post_id)
        .await
        .map_err(db_rejection)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&UploadResponse {
            post_id,
            photos,
            report,
        }),
        warp::http::StatusCode::CREATED,
    ))
}

pub async fn reprocess_post(
    post_id: i64,
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> Result<impl Reply, Rejection> {
    require_post(&db_pool, post_id).await?;

    let report = pipeline
        .after_post_saved(&db_pool, post_id)
        .await
        .map_err(db_rejection)?;
    let photos = Photo::list_for_post(&db_pool, post_id)
        .await
        .map_err(db_rejection)?;

    Ok(warp::reply::json(&UploadResponse {
        post_id,
        photos,
        report,
    }))
}

pub fn build_upload_routes(
    db_pool: DbPool,
    pipeline: MetadataPipeline,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let upload = warp::path!("api" / "admin" / "posts" / i64 / "photos")
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(with_db(db_pool.clone()))
        .and(with_pipeline(pipeline.clone()))
        .and_then(upload_photos);

    let process = warp::path!("api" / "admin" / "posts" / i64 / "process")
        .and(warp::post())
        .and(with_db(db_pool))
        .and(with_pipeline(pipeline.clone()))
        .and_then(reprocess_post);

    let files = warp::path("uploads").and(warp::fs::dir(pipeline.uploads().root().to_path_buf()));

    upload.or(process).or(files)
}

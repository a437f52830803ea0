use serde_json::json;
use std::convert::Infallible;
use warp::{Filter, Rejection, Reply};

use crate::db::DbPool;
use crate::pipeline::MetadataPipeline;
use crate::warp_helpers::{db_rejection, with_db, with_pipeline, DatabaseError};

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Ready once the database answers and the upload directory is present.
pub async fn ready_check(
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> Result<impl Reply, Rejection> {
    sqlx::query("SELECT 1")
        .execute(&db_pool)
        .await
        .map_err(db_rejection)?;

    let upload_root = pipeline.uploads().root();
    if !upload_root.is_dir() {
        log::error!("Upload directory missing: {}", upload_root.display());
        return Err(warp::reject::custom(DatabaseError {
            message: format!("Upload directory missing: {}", upload_root.display()),
        }));
    }

    Ok(warp::reply::json(&json!({
        "status": "ready",
        "database": "connected",
        "uploads": upload_root.display().to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub fn build_health_routes(
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool))
        .and(with_pipeline(pipeline))
        .and_then(ready_check);

    health.or(ready)
}

//! Photo blog backend: posts, photos and the upload metadata pipeline.

pub mod config;
pub mod db;
pub mod db_pool;
pub mod db_schema;
pub mod formats;
pub mod geocoding;
pub mod handlers_health;
pub mod handlers_posts;
pub mod handlers_upload;
pub mod metadata_extractor;
pub mod orientation;
pub mod pipeline;
pub mod uploads;
pub mod warp_helpers;

#[cfg(test)]
mod test_support;

use warp::Filter;

use crate::db::DbPool;
use crate::pipeline::MetadataPipeline;

/// Every HTTP route of the blog, without cors/logging/recovery layers.
pub fn build_routes(
    db_pool: DbPool,
    pipeline: MetadataPipeline,
    max_upload_bytes: u64,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    handlers_health::build_health_routes(db_pool.clone(), pipeline.clone())
        .or(handlers_posts::build_post_routes(
            db_pool.clone(),
            pipeline.clone(),
        ))
        .or(handlers_upload::build_upload_routes(
            db_pool,
            pipeline,
            max_upload_bytes,
        ))
}

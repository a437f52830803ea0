use serde::{Deserialize, Serialize};
use warp::{Filter, Rejection, Reply};

use crate::db::{DbPool, Photo, Post, PostWithPhotos, Profile};
use crate::pipeline::{HookReport, MetadataPipeline};
use crate::warp_helpers::{db_rejection, not_found, validation, with_db, with_pipeline};

#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: Option<String>,
}

/// Partial post edit. Absent keys keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct PostEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    pub image_filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SavedPost {
    #[serde(flatten)]
    pub post: PostWithPhotos,
    pub report: HookReport,
}

/// Manual edit of a photo's capture fields. Absent keys keep their value.
#[derive(Debug, Default, Deserialize)]
pub struct PhotoEdit {
    pub date_taken: Option<chrono::NaiveDateTime>,
    pub location: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<String>,
}

impl PhotoEdit {
    fn apply(self, photo: &mut Photo) {
        macro_rules! overwrite {
            ($($field:ident),*) => {
                $(if self.$field.is_some() { photo.$field = self.$field; })*
            };
        }
        overwrite!(
            date_taken,
            location,
            camera_make,
            camera_model,
            lens,
            focal_length,
            aperture,
            shutter_speed,
            iso
        );
    }
}

pub async fn list_posts(db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let posts = Post::list_recent(&db_pool).await.map_err(db_rejection)?;
    Ok(warp::reply::json(&posts))
}

pub async fn get_post(id: i64, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let post = Post::find_by_id(&db_pool, id)
        .await
        .map_err(db_rejection)?
        .ok_or_else(|| not_found("Post"))?;

    let detail = post.with_photos(&db_pool).await.map_err(db_rejection)?;
    Ok(warp::reply::json(&detail))
}

pub async fn get_profile(db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let profile = Profile::first(&db_pool)
        .await
        .map_err(db_rejection)?
        .ok_or_else(|| not_found("Profile"))?;
    Ok(warp::reply::json(&profile))
}

pub async fn create_post(new_post: NewPost, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let title = new_post.title.trim();
    if title.is_empty() {
        return Err(validation("Post title must not be empty"));
    }

    let post = Post::create(&db_pool, title, new_post.body.as_deref())
        .await
        .map_err(db_rejection)?;
    log::info!("Created post {} ({})", post.id, title);

    Ok(warp::reply::with_status(
        warp::reply::json(&post),
        warp::http::StatusCode::CREATED,
    ))
}

pub async fn upsert_profile(profile: Profile, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let saved = profile.upsert(&db_pool).await.map_err(db_rejection)?;
    Ok(warp::reply::json(&saved))
}

/// Saves the edit, then runs the post-saved hook like any other post save.
pub async fn update_post(
    id: i64,
    edit: PostEdit,
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> Result<impl Reply, Rejection> {
    let title = edit.title.as_deref().map(str::trim);
    if title.is_some_and(str::is_empty) {
        return Err(validation("Post title must not be empty"));
    }

    if let Some(cover) = edit.image_filename.as_deref() {
        if !pipeline.uploads().exists(cover) {
            return Err(validation(format!("Unknown cover image: {}", cover)));
        }
    }

    let post = Post::update(
        &db_pool,
        id,
        title,
        edit.body.as_deref(),
        edit.image_filename.as_deref(),
    )
    .await
    .map_err(db_rejection)?
    .ok_or_else(|| not_found("Post"))?;

    let report = pipeline
        .after_post_saved(&db_pool, id)
        .await
        .map_err(db_rejection)?;
    let post = post.with_photos(&db_pool).await.map_err(db_rejection)?;

    Ok(warp::reply::json(&SavedPost { post, report }))
}

fn remove_files(pipeline: &MetadataPipeline, filenames: impl IntoIterator<Item = String>) {
    for filename in filenames {
        if let Err(e) = pipeline.uploads().remove(&filename) {
            log::warn!("Failed to remove upload {}: {}", filename, e);
        }
    }
}

/// Deletes the post, its photos and their files.
pub async fn delete_post(
    id: i64,
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> Result<impl Reply, Rejection> {
    let post = Post::find_by_id(&db_pool, id)
        .await
        .map_err(db_rejection)?
        .ok_or_else(|| not_found("Post"))?;
    let photos = Photo::list_for_post(&db_pool, id)
        .await
        .map_err(db_rejection)?;

    if !Post::delete(&db_pool, id).await.map_err(db_rejection)? {
        return Err(not_found("Post"));
    }

    let mut filenames: Vec<String> = photos
        .into_iter()
        .filter_map(|photo| photo.image_filename)
        .chain(post.image_filename)
        .collect();
    filenames.sort();
    filenames.dedup();
    remove_files(&pipeline, filenames);
    log::info!("Deleted post {}", id);

    Ok(warp::reply::with_status(
        warp::reply(),
        warp::http::StatusCode::NO_CONTENT,
    ))
}

pub async fn delete_photo(
    id: i64,
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> Result<impl Reply, Rejection> {
    let photo = Photo::find_by_id(&db_pool, id)
        .await
        .map_err(db_rejection)?
        .ok_or_else(|| not_found("Photo"))?;

    if !Photo::delete(&db_pool, id).await.map_err(db_rejection)? {
        return Err(not_found("Photo"));
    }

    // The file stays while a post still uses it as cover
    if let Some(filename) = photo.image_filename {
        let is_cover = match photo.post_id {
            Some(post_id) => Post::find_by_id(&db_pool, post_id)
                .await
                .map_err(db_rejection)?
                .is_some_and(|post| post.image_filename.as_deref() == Some(filename.as_str())),
            None => false,
        };
        if !is_cover {
            remove_files(&pipeline, [filename]);
        }
    }

    Ok(warp::reply::with_status(
        warp::reply(),
        warp::http::StatusCode::NO_CONTENT,
    ))
}

pub async fn edit_photo(
    id: i64,
    edit: PhotoEdit,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let mut photo = Photo::find_by_id(&db_pool, id)
        .await
        .map_err(db_rejection)?
        .ok_or_else(|| not_found("Photo"))?;

    edit.apply(&mut photo);
    photo.update_fields(&db_pool).await.map_err(db_rejection)?;

    Ok(warp::reply::json(&photo))
}

pub fn build_post_routes(
    db_pool: DbPool,
    pipeline: MetadataPipeline,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let list = warp::path!("api" / "posts")
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(list_posts);

    let detail = warp::path!("api" / "posts" / i64)
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_post);

    let profile = warp::path!("api" / "profile")
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_profile);

    let create = warp::path!("api" / "admin" / "posts")
        .and(warp::post())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json::<NewPost>())
        .and(with_db(db_pool.clone()))
        .and_then(create_post);

    let update_profile = warp::path!("api" / "admin" / "profile")
        .and(warp::put())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json::<Profile>())
        .and(with_db(db_pool.clone()))
        .and_then(upsert_profile);

    let update = warp::path!("api" / "admin" / "posts" / i64)
        .and(warp::put())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json::<PostEdit>())
        .and(with_db(db_pool.clone()))
        .and(with_pipeline(pipeline.clone()))
        .and_then(update_post);

    let remove_post = warp::path!("api" / "admin" / "posts" / i64)
        .and(warp::delete())
        .and(with_db(db_pool.clone()))
        .and(with_pipeline(pipeline.clone()))
        .and_then(delete_post);

    let edit = warp::path!("api" / "admin" / "photos" / i64)
        .and(warp::put())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json::<PhotoEdit>())
        .and(with_db(db_pool.clone()))
        .and_then(edit_photo);

    let remove_photo = warp::path!("api" / "admin" / "photos" / i64)
        .and(warp::delete())
        .and(with_db(db_pool))
        .and(with_pipeline(pipeline))
        .and_then(delete_photo);

    list.or(detail)
        .or(profile)
        .or(create)
        .or(update)
        .or(remove_post)
        .or(update_profile)
        .or(edit)
        .or(remove_photo)
}

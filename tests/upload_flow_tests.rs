mod common;

use image::GenericImageView;
use serde_json::Value;
use tempfile::TempDir;
use warp::Filter;

use photoblog::build_routes;
use photoblog::db::{create_in_memory_pool, DbPool, Photo, Post};
use photoblog::uploads::UploadDir;
use photoblog::warp_helpers::handle_rejection;

use common::{camera_fields, jpeg_bytes, multipart_body, pipeline, BOUNDARY};

async fn setup(temp_dir: &TempDir) -> (DbPool, UploadDir) {
    photoblog::formats::register_formats();
    let pool = create_in_memory_pool().await.unwrap();
    let uploads = UploadDir::new(temp_dir.path().join("uploads")).unwrap();
    (pool, uploads)
}

async fn upload(
    pool: &DbPool,
    uploads: &UploadDir,
    post_id: i64,
    files: &[(&str, &str, &[u8])],
) -> warp::http::Response<bytes::Bytes> {
    let routes = build_routes(pool.clone(), pipeline(uploads.clone()), 10 * 1024 * 1024)
        .recover(handle_rejection);

    warp::test::request()
        .method("POST")
        .path(&format!("/api/admin/posts/{}/photos", post_id))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(multipart_body(files))
        .reply(&routes)
        .await
}

#[tokio::test]
async fn test_upload_extracts_metadata_and_rotates() {
    // GIVEN: a post and a sideways camera JPEG
    let temp_dir = TempDir::new().unwrap();
    let (pool, uploads) = setup(&temp_dir).await;
    let post = Post::create(&pool, "Paris mornings", None).await.unwrap();
    let data = jpeg_bytes(40, 20, &camera_fields());

    // WHEN: uploading it
    let response = upload(
        &pool,
        &uploads,
        post.id,
        &[("image", "DSCF0001.JPG", data.as_slice())],
    )
    .await;

    // THEN: the photo row carries the capture fields
    assert_eq!(response.status(), 201);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["report"]["processed"], 1);
    assert_eq!(body["report"]["updated"], 1);
    assert_eq!(body["report"]["rotated"], 1);

    let photo = &body["photos"][0];
    assert_eq!(photo["image_filename"], "DSCF0001.JPG");
    assert_eq!(photo["camera_make"], "FUJIFILM");
    assert_eq!(photo["camera_model"], "X-T5");
    assert_eq!(photo["lens"], "XF23mmF1.4 R LM WR");
    assert_eq!(photo["focal_length"], "23mm");
    assert_eq!(photo["aperture"], "f/1.4");
    assert_eq!(photo["shutter_speed"], "0.002s");
    assert_eq!(photo["iso"], "160");
    assert_eq!(photo["location"], "Montmartre, France");
    assert_eq!(photo["date_taken"], "2024-05-18T06:12:40");

    // THEN: the stored file is physically upright
    let stored = image::open(uploads.resolve("DSCF0001.JPG")).unwrap();
    assert_eq!(stored.dimensions(), (20, 40));

    // THEN: the first upload became the post cover
    let post = Post::find_by_id(&pool, post.id).await.unwrap().unwrap();
    assert_eq!(post.image_filename.as_deref(), Some("DSCF0001.JPG"));
}

#[tokio::test]
async fn test_reprocess_keeps_manual_edits() {
    let temp_dir = TempDir::new().unwrap();
    let (pool, uploads) = setup(&temp_dir).await;
    let post = Post::create(&pool, "Edited", None).await.unwrap();

    // GIVEN: a photo whose location was typed in before processing
    uploads
        .save("edited.jpg", &jpeg_bytes(16, 16, &camera_fields()))
        .unwrap();
    let mut photo = Photo::create(&pool, post.id, "edited.jpg").await.unwrap();
    photo.location = Some("Sacré-Cœur steps".to_string());
    photo.update_fields(&pool).await.unwrap();

    // WHEN: running the hook through the admin route
    let routes = build_routes(pool.clone(), pipeline(uploads.clone()), 1024 * 1024)
        .recover(handle_rejection);
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/api/admin/posts/{}/process", post.id))
        .reply(&routes)
        .await;

    // THEN: EXIF fills the gaps but the manual location stays
    assert_eq!(response.status(), 200);
    let stored = Photo::find_by_id(&pool, photo.id).await.unwrap().unwrap();
    assert_eq!(stored.location.as_deref(), Some("Sacré-Cœur steps"));
    assert_eq!(stored.camera_make.as_deref(), Some("FUJIFILM"));

    // THEN: a second run has nothing left to do
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/api/admin/posts/{}/process", post.id))
        .reply(&routes)
        .await;
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["report"]["updated"], 0);
    assert_eq!(body["report"]["rotated"], 0);
}

#[tokio::test]
async fn test_upload_without_exif_leaves_fields_empty() {
    let temp_dir = TempDir::new().unwrap();
    let (pool, uploads) = setup(&temp_dir).await;
    let post = Post::create(&pool, "Scans", None).await.unwrap();
    let data = jpeg_bytes(16, 16, &[]);

    let response = upload(
        &pool,
        &uploads,
        post.id,
        &[("image", "scan.jpg", data.as_slice())],
    )
    .await;

    assert_eq!(response.status(), 201);
    let body: Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["report"]["updated"], 0);
    assert!(body["photos"][0]["camera_make"].is_null());
    assert!(body["photos"][0]["date_taken"].is_null());
}

#[tokio::test]
async fn test_upload_rejects_unsupported_files() {
    let temp_dir = TempDir::new().unwrap();
    let (pool, uploads) = setup(&temp_dir).await;
    let post = Post::create(&pool, "Docs", None).await.unwrap();

    let response = upload(
        &pool,
        &uploads,
        post.id,
        &[("image", "notes.txt", b"hello".as_slice())],
    )
    .await;

    assert_eq!(response.status(), 400);
    assert!(Photo::list_for_post(&pool, post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_batch_stores_nothing() {
    // GIVEN: a valid image followed by a file of an unsupported type
    let temp_dir = TempDir::new().unwrap();
    let (pool, uploads) = setup(&temp_dir).await;
    let post = Post::create(&pool, "Mixed", None).await.unwrap();
    let data = jpeg_bytes(16, 16, &[]);

    // WHEN: uploading both in one request
    let response = upload(
        &pool,
        &uploads,
        post.id,
        &[
            ("image", "good.jpg", data.as_slice()),
            ("image", "bad.txt", b"text".as_slice()),
        ],
    )
    .await;

    // THEN: neither a row nor a file is left behind
    assert_eq!(response.status(), 400);
    assert!(Photo::list_for_post(&pool, post.id).await.unwrap().is_empty());
    assert!(!uploads.exists("good.jpg"));
    assert_eq!(std::fs::read_dir(uploads.root()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_to_missing_post_is_404() {
    let temp_dir = TempDir::new().unwrap();
    let (pool, uploads) = setup(&temp_dir).await;
    let data = jpeg_bytes(16, 16, &[]);

    let response = upload(
        &pool,
        &uploads,
        42,
        &[("image", "a.jpg", data.as_slice())],
    )
    .await;

    assert_eq!(response.status(), 404);
    assert!(!uploads.exists("a.jpg"));
}

#[tokio::test]
async fn test_uploaded_files_are_served() {
    let temp_dir = TempDir::new().unwrap();
    let (pool, uploads) = setup(&temp_dir).await;
    let post = Post::create(&pool, "Served", None).await.unwrap();
    let data = jpeg_bytes(16, 16, &[]);
    upload(
        &pool,
        &uploads,
        post.id,
        &[("image", "served.jpg", data.as_slice())],
    )
    .await;

    let routes = build_routes(pool.clone(), pipeline(uploads.clone()), 1024 * 1024);
    let response = warp::test::request()
        .path("/uploads/served.jpg")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.body().as_ref(), data.as_slice());
}

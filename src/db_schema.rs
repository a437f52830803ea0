use sqlx::SqlitePool;

// Schema definitions
pub const POST_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS post (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    body TEXT,
    -- Cover image, relative to the upload directory
    image_filename TEXT,
    timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#;

pub const PHOTO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photo (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_filename TEXT,
    post_id INTEGER REFERENCES post(id) ON DELETE CASCADE,

    -- Capture metadata, filled from EXIF only while empty
    date_taken DATETIME,
    location TEXT,
    camera_make TEXT,
    camera_model TEXT,
    lens TEXT,
    focal_length TEXT,
    aperture TEXT,
    shutter_speed TEXT,
    iso TEXT
)
"#;

pub const PROFILE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profile (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_filename TEXT,
    bio TEXT,

    -- Social links
    email TEXT,
    website TEXT,
    instagram TEXT,
    facebook TEXT,
    threads TEXT,
    bluesky TEXT,
    mastodon TEXT,
    x TEXT,
    linkedin TEXT,
    youtube TEXT,
    tiktok TEXT,
    kofi TEXT
)
"#;

pub const SCHEMA_SQL: &[&str] = &[
    POST_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_post_timestamp ON post(timestamp);",
    PHOTO_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photo_post_id ON photo(post_id);",
    PROFILE_TABLE,
];

pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for sql in SCHEMA_SQL {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub use crate::db_pool::{create_db_pool, create_in_memory_pool, DbPool};

/// Blog post; photos hang off it through `photo.post_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: Option<String>,
    pub body: Option<String>,
    pub image_filename: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Photo attached to a post. `image_filename` is relative to the upload
/// directory; the capture fields are filled by the metadata pipeline only
/// while they are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i64,
    pub image_filename: Option<String>,
    pub post_id: Option<i64>,
    pub date_taken: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    pub focal_length: Option<String>,
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct Profile {
    #[serde(default)]
    pub id: i64,
    pub image_filename: Option<String>,
    pub bio: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub threads: Option<String>,
    pub bluesky: Option<String>,
    pub mastodon: Option<String>,
    pub x: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
    pub kofi: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostWithPhotos {
    #[serde(flatten)]
    pub post: Post,
    pub photos: Vec<Photo>,
}

impl Post {
    pub async fn create(
        pool: &DbPool,
        title: &str,
        body: Option<&str>,
    ) -> Result<Post, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            "INSERT INTO post (title, body, timestamp) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(title)
        .bind(body)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn list_recent(pool: &DbPool) -> Result<Vec<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>("SELECT * FROM post ORDER BY timestamp DESC, id DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>("SELECT * FROM post WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_cover(
        pool: &DbPool,
        id: i64,
        image_filename: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE post SET image_filename = ? WHERE id = ?")
            .bind(image_filename)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Applies the given fields; `None` keeps the stored value.
    pub async fn update(
        pool: &DbPool,
        id: i64,
        title: Option<&str>,
        body: Option<&str>,
        image_filename: Option<&str>,
    ) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as::<_, Post>(
            "UPDATE post SET title = COALESCE(?, title), body = COALESCE(?, body),
             image_filename = COALESCE(?, image_filename) WHERE id = ? RETURNING *",
        )
        .bind(title)
        .bind(body)
        .bind(image_filename)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Deletes the post; its photo rows go with it.
    pub async fn delete(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM post WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn with_photos(self, pool: &DbPool) -> Result<PostWithPhotos, sqlx::Error> {
        let photos = Photo::list_for_post(pool, self.id).await?;
        Ok(PostWithPhotos { post: self, photos })
    }
}

impl Photo {
    pub async fn create(
        pool: &DbPool,
        post_id: i64,
        image_filename: &str,
    ) -> Result<Photo, sqlx::Error> {
        sqlx::query_as::<_, Photo>(
            "INSERT INTO photo (post_id, image_filename) VALUES (?, ?) RETURNING *",
        )
        .bind(post_id)
        .bind(image_filename)
        .fetch_one(pool)
        .await
    }

    /// Inserts one row per file in a single transaction.
    pub async fn create_many(
        pool: &DbPool,
        post_id: i64,
        image_filenames: &[String],
    ) -> Result<Vec<Photo>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut photos = Vec::with_capacity(image_filenames.len());
        for filename in image_filenames {
            let photo = sqlx::query_as::<_, Photo>(
                "INSERT INTO photo (post_id, image_filename) VALUES (?, ?) RETURNING *",
            )
            .bind(post_id)
            .bind(filename)
            .fetch_one(&mut *tx)
            .await?;
            photos.push(photo);
        }
        tx.commit().await?;
        Ok(photos)
    }

    pub async fn list_for_post(pool: &DbPool, post_id: i64) -> Result<Vec<Photo>, sqlx::Error> {
        sqlx::query_as::<_, Photo>("SELECT * FROM photo WHERE post_id = ? ORDER BY id")
            .bind(post_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<Photo>, sqlx::Error> {
        sqlx::query_as::<_, Photo>("SELECT * FROM photo WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM photo WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Manual edit from the admin surface; always wins over EXIF values.
    pub async fn update_fields(&self, pool: &DbPool) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        Self::write_capture_fields(&mut tx, self).await?;
        tx.commit().await
    }

    async fn write_capture_fields(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        photo: &Photo,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE photo SET date_taken = ?, location = ?, camera_make = ?, camera_model = ?,
             lens = ?, focal_length = ?, aperture = ?, shutter_speed = ?, iso = ?
             WHERE id = ?",
        )
        .bind(photo.date_taken)
        .bind(&photo.location)
        .bind(&photo.camera_make)
        .bind(&photo.camera_model)
        .bind(&photo.lens)
        .bind(&photo.focal_length)
        .bind(&photo.aperture)
        .bind(&photo.shutter_speed)
        .bind(&photo.iso)
        .bind(photo.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

impl Profile {
    pub async fn first(pool: &DbPool) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profile ORDER BY id LIMIT 1")
            .fetch_optional(pool)
            .await
    }

    /// Updates the about-page profile, creating it on first use.
    pub async fn upsert(&self, pool: &DbPool) -> Result<Profile, sqlx::Error> {
        let existing = Self::first(pool).await?;

        let sql = if existing.is_some() {
            "UPDATE profile SET image_filename = ?, bio = ?, email = ?, website = ?, instagram = ?,
             facebook = ?, threads = ?, bluesky = ?, mastodon = ?, x = ?, linkedin = ?,
             youtube = ?, tiktok = ?, kofi = ? WHERE id = ? RETURNING *"
        } else {
            "INSERT INTO profile (image_filename, bio, email, website, instagram, facebook,
             threads, bluesky, mastodon, x, linkedin, youtube, tiktok, kofi)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *"
        };

        let mut query = sqlx::query_as::<_, Profile>(sql)
            .bind(&self.image_filename)
            .bind(&self.bio)
            .bind(&self.email)
            .bind(&self.website)
            .bind(&self.instagram)
            .bind(&self.facebook)
            .bind(&self.threads)
            .bind(&self.bluesky)
            .bind(&self.mastodon)
            .bind(&self.x)
            .bind(&self.linkedin)
            .bind(&self.youtube)
            .bind(&self.tiktok)
            .bind(&self.kofi);

        if let Some(existing) = existing {
            query = query.bind(existing.id);
        }

        query.fetch_one(pool).await
    }
}

/// Record store seen by the metadata pipeline.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn photos_for_post(&self, post_id: i64) -> Result<Vec<Photo>, sqlx::Error>;

    /// Persists the capture fields of every given photo in one batch.
    async fn commit_metadata(&self, photos: &[Photo]) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl PhotoStore for DbPool {
    async fn photos_for_post(&self, post_id: i64) -> Result<Vec<Photo>, sqlx::Error> {
        Photo::list_for_post(self, post_id).await
    }

    async fn commit_metadata(&self, photos: &[Photo]) -> Result<(), sqlx::Error> {
        let mut tx = self.begin().await?;
        for photo in photos {
            Photo::write_capture_fields(&mut tx, photo).await?;
        }
        tx.commit().await
    }
}

//! Embedded libSQL storage for imported blog posts.
//!
//! The [`Storage`] struct wraps a local libSQL database holding one row per
//! slug. It backs the local record processor and the `list` command.
//!
//! **Access rules:**
//! - importing: read-write via [`Storage::open`]
//! - listing: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use contentimport_shared::{ContentRecord, ImportError, Result};
use libsql::{Connection, Database, params};
use uuid::Uuid;

/// Column list shared by every `SELECT` on `blog_posts`.
const POST_COLUMNS: &str = "id, slug, title, description, image, published_at, author, tags_json, \
                            content, published, created_at, updated_at";

/// A persisted blog post.
#[derive(Debug, Clone, PartialEq)]
pub struct BlogPost {
    /// Row identifier (UUID v7).
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: String,
    pub tags: Vec<String>,
    pub content: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    /// Build a new, not yet stored post from a validated record.
    pub fn from_record(record: &ContentRecord, published: bool) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7().to_string(),
            slug: record.slug.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            image: record.image.clone(),
            published_at: record.publish_date()?,
            author: record.author.clone(),
            tags: record.tags.clone(),
            content: record.content.clone(),
            published,
            created_at: now,
            updated_at: now,
        })
    }
}

fn storage_err(e: libsql::Error) -> ImportError {
    ImportError::Storage(e.to_string())
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ImportError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ImportError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ImportError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ImportError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Blog post operations
    // -----------------------------------------------------------------------

    /// Look up a post by its slug.
    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE slug = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![slug])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_post(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Insert a new post. Fails if the slug is already taken.
    pub async fn insert_post(&self, post: &BlogPost) -> Result<()> {
        self.check_writable()?;
        let tags_json = serde_json::to_string(&post.tags)
            .map_err(|e| ImportError::Storage(format!("tags encode failed: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO blog_posts (id, slug, title, description, image, published_at, author,
                                         tags_json, content, published, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    post.id.as_str(),
                    post.slug.as_str(),
                    post.title.as_str(),
                    post.description.as_str(),
                    post.image.as_deref(),
                    post.published_at.map(|d| d.to_rfc3339()),
                    post.author.as_str(),
                    tags_json,
                    post.content.as_str(),
                    i64::from(post.published),
                    post.created_at.to_rfc3339(),
                    post.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Overwrite the content of the post with `post.slug`.
    ///
    /// The row keeps its id and `created_at`. `published` only ever moves
    /// from unpublished to published here. Returns `false` if no row matched.
    pub async fn update_post(&self, post: &BlogPost) -> Result<bool> {
        self.check_writable()?;
        let tags_json = serde_json::to_string(&post.tags)
            .map_err(|e| ImportError::Storage(format!("tags encode failed: {e}")))?;
        let changed = self
            .conn
            .execute(
                "UPDATE blog_posts SET
                   title = ?2,
                   description = ?3,
                   image = ?4,
                   published_at = ?5,
                   author = ?6,
                   tags_json = ?7,
                   content = ?8,
                   published = MAX(published, ?9),
                   updated_at = ?10
                 WHERE slug = ?1",
                params![
                    post.slug.as_str(),
                    post.title.as_str(),
                    post.description.as_str(),
                    post.image.as_deref(),
                    post.published_at.map(|d| d.to_rfc3339()),
                    post.author.as_str(),
                    tags_json,
                    post.content.as_str(),
                    i64::from(post.published),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    /// List all posts, newest publish date first.
    pub async fn list_posts(&self) -> Result<Vec<BlogPost>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM blog_posts
             ORDER BY published_at IS NULL, published_at DESC, slug"
        );
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_post(&row)?);
        }
        Ok(results)
    }

    /// Count stored posts.
    pub async fn count_posts(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM blog_posts", params![])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(storage_err)? as usize),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ImportError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row into a [`BlogPost`].
fn row_to_post(row: &libsql::Row) -> Result<BlogPost> {
    let tags_json: String = row.get(7).map_err(storage_err)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| ImportError::Storage(format!("invalid tags_json: {e}")))?;

    Ok(BlogPost {
        id: row.get::<String>(0).map_err(storage_err)?,
        slug: row.get::<String>(1).map_err(storage_err)?,
        title: row.get::<String>(2).map_err(storage_err)?,
        description: row.get::<String>(3).map_err(storage_err)?,
        image: row.get::<String>(4).ok(),
        published_at: row
            .get::<String>(5)
            .ok()
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        author: row.get::<String>(6).map_err(storage_err)?,
        tags,
        content: row.get::<String>(8).map_err(storage_err)?,
        published: row.get::<i64>(9).map_err(storage_err)? != 0,
        created_at: parse_timestamp(&row.get::<String>(10).map_err(storage_err)?)?,
        updated_at: parse_timestamp(&row.get::<String>(11).map_err(storage_err)?)?,
    })
}

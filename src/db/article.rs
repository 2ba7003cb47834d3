use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument, warn};

use super::core::{Database, DbLockErrorExt};
use crate::types::{Article, ArticleStatus, Category, NewArticle, VerificationStatus};
use crate::util::{read_time_minutes, slugify, word_count};
use crate::{PipelineError, Result, TARGET_DB};

const MAX_INSERT_RETRIES: u32 = 3;

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::Config(format!("bad timestamp '{}': {}", value, e)))
}

fn json_list(value: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(value)?)
}

pub(crate) fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let published_at: Option<String> = row.try_get("published_at")?;
    let verification_status: Option<String> = row.try_get("verification_status")?;
    let category: String = row.try_get("category")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Article {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        excerpt: row.try_get("excerpt")?,
        content: row.try_get("content")?,
        category: category.parse::<Category>()?,
        tags: json_list(row.try_get::<&str, _>("tags")?)?,
        author: row.try_get("author")?,
        sources: json_list(row.try_get::<&str, _>("sources")?)?,
        word_count: row.try_get("word_count")?,
        read_time_minutes: row.try_get("read_time_minutes")?,
        image_url: row.try_get("image_url")?,
        image_credit: row.try_get("image_credit")?,
        status: status.parse::<ArticleStatus>()?,
        published_at: published_at.as_deref().map(parse_timestamp).transpose()?,
        verification_score: row.try_get("verification_score")?,
        verification_status: verification_status
            .as_deref()
            .map(str::parse::<VerificationStatus>)
            .transpose()?,
        rejection_reason: row.try_get("rejection_reason")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

impl Database {
    /// Persists a freshly generated article in `pending_review` and returns its id.
    ///
    /// Slug collisions get a fresh random suffix; lock contention is retried
    /// with exponential backoff.
    #[instrument(target = "db_query", level = "info", skip(self, article), fields(title = %article.title))]
    pub async fn insert_article(&self, article: &NewArticle) -> Result<i64> {
        let words = word_count(&article.content);
        let tags = serde_json::to_string(&article.tags)?;
        let sources = serde_json::to_string(&article.sources)?;
        let now = Utc::now().to_rfc3339();

        let mut backoff = 2;
        for attempt in 1..=MAX_INSERT_RETRIES {
            let slug = slugify(&article.title);
            let result = sqlx::query(
                r#"
                INSERT INTO articles (
                    slug, title, excerpt, content, category, tags, author, sources,
                    word_count, read_time_minutes, image_url, image_credit, status,
                    created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
                "#,
            )
            .bind(&slug)
            .bind(&article.title)
            .bind(&article.excerpt)
            .bind(&article.content)
            .bind(article.category.as_str())
            .bind(&tags)
            .bind(&article.author)
            .bind(&sources)
            .bind(words as i64)
            .bind(read_time_minutes(words) as i64)
            .bind(&article.image_url)
            .bind(&article.image_credit)
            .bind(ArticleStatus::PendingReview.as_str())
            .bind(&now)
            .execute(self.pool())
            .await;

            match result {
                Ok(done) => {
                    let id = done.last_insert_rowid();
                    info!(target: TARGET_DB, "Inserted article {} as {}", id, slug);
                    return Ok(id);
                }
                Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                    warn!(target: TARGET_DB, "Slug {} already taken, retrying attempt {}/{}", slug, attempt, MAX_INSERT_RETRIES);
                }
                Err(err) if err.is_database_lock_error() => {
                    info!(target: TARGET_DB, "Database is locked, waiting {}ms before retrying attempt {}/{}", backoff, attempt, MAX_INSERT_RETRIES);
                    sleep(Duration::from_millis(backoff)).await;
                    backoff = backoff.saturating_mul(2);
                    if attempt == MAX_INSERT_RETRIES {
                        // Spread out writers that gave up at the same moment
                        let random_jitter = rand::rng().random_range(0..200);
                        sleep(Duration::from_millis(backoff + random_jitter)).await;
                    }
                }
                Err(err) => {
                    error!(target: TARGET_DB, "Failed to insert article: {}", err);
                    return Err(err.into());
                }
            }
        }

        Err(PipelineError::Database(sqlx::Error::Protocol(
            "Maximum retries exceeded for inserting article".into(),
        )))
    }

    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn get_article(&self, article_id: i64) -> Result<Article> {
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?1")
            .bind(article_id)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => article_from_row(&row),
            None => Err(PipelineError::ArticleNotFound(article_id)),
        }
    }

    /// Titles of the most recently created articles, newest first.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn recent_titles(&self, limit: usize) -> Result<Vec<String>> {
        let titles: Vec<String> =
            sqlx::query_scalar("SELECT title FROM articles ORDER BY created_at DESC, id DESC LIMIT ?1")
                .bind(limit as i64)
                .fetch_all(self.pool())
                .await?;
        debug!(target: TARGET_DB, "Loaded {} recent titles", titles.len());
        Ok(titles)
    }

    /// Drafts the pipeline held for a human, oldest first.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn review_queue(&self, limit: usize) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE status = 'draft' AND verification_status = 'needs_review'
            ORDER BY updated_at ASC, id ASC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(article_from_row).collect()
    }

    /// Publishes without running verification. Verification fields are left alone.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn publish_without_verification(&self, article_id: i64) -> Result<Article> {
        let now = Utc::now().to_rfc3339();
        let updated = sqlx::query(
            r#"
            UPDATE articles
            SET status = 'published',
                published_at = COALESCE(published_at, ?1),
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(&now)
        .bind(article_id)
        .execute(self.pool())
        .await?;

        if updated.rows_affected() == 0 {
            return Err(PipelineError::ArticleNotFound(article_id));
        }
        warn!(target: TARGET_DB, "Article {} published without verification", article_id);
        self.get_article(article_id).await
    }
}

use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                excerpt TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]', -- JSON array
                author TEXT NOT NULL,
                sources TEXT NOT NULL DEFAULT '[]', -- JSON array
                word_count INTEGER NOT NULL,
                read_time_minutes INTEGER NOT NULL,
                image_url TEXT,
                image_credit TEXT,
                status TEXT NOT NULL, -- draft, pending_review, published, archived
                published_at TEXT,
                verification_score INTEGER,
                verification_status TEXT,
                rejection_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK ((status = 'published') = (published_at IS NOT NULL))
            );
            CREATE INDEX IF NOT EXISTS idx_articles_status ON articles (status);
            CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles (created_at);
            CREATE INDEX IF NOT EXISTS idx_articles_status_verification ON articles (status, verification_status);

            CREATE TABLE IF NOT EXISTS verification_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                accuracy_score INTEGER NOT NULL,
                verification_status TEXT NOT NULL,
                analyzer_status TEXT NOT NULL,
                is_fabricated BOOLEAN NOT NULL,
                fact_check_results TEXT NOT NULL, -- JSON array of claim checks
                source_credibility TEXT NOT NULL, -- JSON object
                legal_risk TEXT NOT NULL,
                recommendations TEXT NOT NULL, -- JSON array
                publish_recommendation TEXT NOT NULL,
                evidence TEXT NOT NULL, -- JSON object
                decision TEXT NOT NULL,
                reasons TEXT NOT NULL, -- JSON array
                created_at TEXT NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_verification_records_article_id ON verification_records (article_id);

            -- Corrections produce a new record; existing ones are never rewritten
            CREATE TRIGGER IF NOT EXISTS verification_records_immutable
            BEFORE UPDATE ON verification_records
            BEGIN
                SELECT RAISE(ABORT, 'verification records are immutable');
            END;
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");
        Ok(())
    }
}

use chrono::Utc;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{error, info, instrument};

use super::article::parse_timestamp;
use super::core::Database;
use crate::decision::{Decision, DecisionOutcome};
use crate::evidence::Evidence;
use crate::fact_check::FactCheckVerdict;
use crate::types::{ArticleStatus, VerificationRecord};
use crate::{PipelineError, Result, TARGET_DB};

/// Reads a snake_case/UPPERCASE enum column back through its serde spelling.
fn enum_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let value: String = row.try_get(column)?;
    Ok(serde_json::from_value(serde_json::Value::String(value))?)
}

fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let value: &str = row.try_get(column)?;
    Ok(serde_json::from_str(value)?)
}

fn record_from_row(row: &SqliteRow) -> Result<VerificationRecord> {
    let accuracy_score: i64 = row.try_get("accuracy_score")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(VerificationRecord {
        id: row.try_get("id")?,
        article_id: row.try_get("article_id")?,
        accuracy_score: u8::try_from(accuracy_score)
            .map_err(|_| PipelineError::Config(format!("stored accuracy {} out of range", accuracy_score)))?,
        verification_status: enum_column(row, "verification_status")?,
        analyzer_status: enum_column(row, "analyzer_status")?,
        is_fabricated: row.try_get("is_fabricated")?,
        fact_check_results: json_column(row, "fact_check_results")?,
        source_credibility: json_column(row, "source_credibility")?,
        legal_risk: enum_column(row, "legal_risk")?,
        recommendations: json_column(row, "recommendations")?,
        publish_recommendation: enum_column(row, "publish_recommendation")?,
        evidence: json_column(row, "evidence")?,
        decision: enum_column(row, "decision")?,
        reasons: json_column(row, "reasons")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

impl Database {
    /// Inserts one immutable verification record and returns its id.
    ///
    /// Never touches existing rows: re-verifying an article adds a record.
    pub async fn record_verification(
        conn: &mut SqliteConnection,
        article_id: i64,
        verdict: &FactCheckVerdict,
        evidence: &Evidence,
        outcome: &DecisionOutcome,
    ) -> Result<i64> {
        let done = sqlx::query(
            r#"
            INSERT INTO verification_records (
                article_id, accuracy_score, verification_status, analyzer_status,
                is_fabricated, fact_check_results, source_credibility, legal_risk,
                recommendations, publish_recommendation, evidence, decision, reasons,
                created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(article_id)
        .bind(i64::from(verdict.accuracy_score))
        .bind(outcome.decision.verification_status().as_str())
        .bind(verdict.verification_status.as_str())
        .bind(verdict.is_fabricated)
        .bind(serde_json::to_string(&verdict.fact_check_results)?)
        .bind(serde_json::to_string(&verdict.source_credibility)?)
        .bind(verdict.legal_risk_assessment.as_str())
        .bind(serde_json::to_string(&verdict.recommendations)?)
        .bind(verdict.publish_recommendation.as_str())
        .bind(serde_json::to_string(evidence)?)
        .bind(outcome.decision.as_str())
        .bind(serde_json::to_string(&outcome.reasons)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *conn)
        .await?;

        Ok(done.last_insert_rowid())
    }

    /// Applies a decision to the article's lifecycle and verification fields.
    ///
    /// `published_at` is kept when publishing an already published article and
    /// cleared on any other outcome; `rejection_reason` only survives a reject.
    pub async fn apply_decision(
        conn: &mut SqliteConnection,
        article_id: i64,
        accuracy_score: u8,
        outcome: &DecisionOutcome,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let rejection_reason = match outcome.decision {
            Decision::Reject => Some(outcome.reasons.join("; ")),
            _ => None,
        };

        let updated = sqlx::query(
            r#"
            UPDATE articles
            SET status = ?1,
                published_at = CASE WHEN ?1 = 'published' THEN COALESCE(published_at, ?2) ELSE NULL END,
                verification_score = ?3,
                verification_status = ?4,
                rejection_reason = ?5,
                updated_at = ?2
            WHERE id = ?6
            "#,
        )
        .bind(outcome.final_status.as_str())
        .bind(&now)
        .bind(i64::from(accuracy_score))
        .bind(outcome.decision.verification_status().as_str())
        .bind(rejection_reason)
        .bind(article_id)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(PipelineError::ArticleNotFound(article_id));
        }
        Ok(())
    }

    /// Writes the verification record and the article update in one transaction.
    ///
    /// A failed state update rolls back the record as well and is reported as
    /// `PipelineError::Consistency`, never as a content decision.
    #[instrument(target = "db_query", level = "info", skip(self, verdict, evidence, outcome), fields(decision = %outcome.decision))]
    pub async fn commit_verification(
        &self,
        article_id: i64,
        verdict: &FactCheckVerdict,
        evidence: &Evidence,
        outcome: &DecisionOutcome,
    ) -> Result<VerificationRecord> {
        let mut tx = self.pool().begin().await?;

        let record_id =
            Database::record_verification(&mut *tx, article_id, verdict, evidence, outcome).await?;

        if let Err(err) =
            Database::apply_decision(&mut *tx, article_id, verdict.accuracy_score, outcome).await
        {
            error!(target: TARGET_DB, "State update for article {} failed after record {}: {}", article_id, record_id, err);
            if let Err(rollback_err) = tx.rollback().await {
                error!(target: TARGET_DB, "Rollback for article {} failed: {}", article_id, rollback_err);
            }
            return Err(PipelineError::Consistency {
                article_id,
                source: Box::new(err),
            });
        }

        let row = sqlx::query("SELECT * FROM verification_records WHERE id = ?1")
            .bind(record_id)
            .fetch_one(&mut *tx)
            .await?;
        let record = record_from_row(&row)?;

        tx.commit().await?;
        info!(target: TARGET_DB, "Committed verification {} for article {}: {} -> {}", record_id, article_id, outcome.decision, outcome.final_status);
        Ok(record)
    }

    /// Every verification record for an article, oldest first.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn verification_history(&self, article_id: i64) -> Result<Vec<VerificationRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM verification_records WHERE article_id = ?1 ORDER BY id ASC",
        )
        .bind(article_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Current status of an article, if it exists.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn article_status(&self, article_id: i64) -> Result<ArticleStatus> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM articles WHERE id = ?1")
            .bind(article_id)
            .fetch_optional(self.pool())
            .await?;
        status
            .ok_or(PipelineError::ArticleNotFound(article_id))?
            .parse()
    }
}

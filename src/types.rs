use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::decision::Decision;
use crate::evidence::Evidence;
use crate::fact_check::{ClaimCheck, PublishRecommendation, SourceCredibility};
use crate::PipelineError;

/// Editorial section an article is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Politics,
    Business,
    Technology,
    Science,
    Health,
    Sports,
    Entertainment,
    World,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Politics,
        Category::Business,
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Sports,
        Category::Entertainment,
        Category::World,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::World => "world",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| PipelineError::Config(format!("unknown category '{}'", s)))
    }
}

/// Lifecycle of a stored article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    PendingReview,
    Published,
    Archived,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::PendingReview => "pending_review",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ArticleStatus::Draft),
            "pending_review" => Ok(ArticleStatus::PendingReview),
            "published" => Ok(ArticleStatus::Published),
            "archived" => Ok(ArticleStatus::Archived),
            other => Err(PipelineError::Config(format!(
                "unknown article status '{}'",
                other
            ))),
        }
    }
}

/// Verification status, as reported by the analyzer and as stamped on articles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Flagged,
    NeedsReview,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Flagged => "flagged",
            VerificationStatus::NeedsReview => "needs_review",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(VerificationStatus::Verified),
            "flagged" => Ok(VerificationStatus::Flagged),
            "needs_review" => Ok(VerificationStatus::NeedsReview),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(PipelineError::Config(format!(
                "unknown verification status '{}'",
                other
            ))),
        }
    }
}

/// Defamation/liability exposure of publishing the article as-is
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LegalRisk {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl LegalRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalRisk::None => "NONE",
            LegalRisk::Low => "LOW",
            LegalRisk::Medium => "MEDIUM",
            LegalRisk::High => "HIGH",
            LegalRisk::Critical => "CRITICAL",
        }
    }

    pub fn is_severe(&self) -> bool {
        matches!(self, LegalRisk::High | LegalRisk::Critical)
    }
}

impl fmt::Display for LegalRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LegalRisk {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(LegalRisk::None),
            "LOW" => Ok(LegalRisk::Low),
            "MEDIUM" => Ok(LegalRisk::Medium),
            "HIGH" => Ok(LegalRisk::High),
            "CRITICAL" => Ok(LegalRisk::Critical),
            other => Err(PipelineError::Config(format!("unknown legal risk '{}'", other))),
        }
    }
}

/// A stored article, as read back by the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub author: String,
    pub sources: Vec<String>,
    pub word_count: i64,
    pub read_time_minutes: i64,
    pub image_url: Option<String>,
    pub image_credit: Option<String>,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub verification_score: Option<i64>,
    pub verification_status: Option<VerificationStatus>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a freshly generated article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub author: String,
    pub sources: Vec<String>,
    pub image_url: Option<String>,
    pub image_credit: Option<String>,
}

/// Immutable audit entry written by one verification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRecord {
    pub id: i64,
    pub article_id: i64,
    pub accuracy_score: u8,
    /// Status stamped on the article, derived from `decision`.
    pub verification_status: VerificationStatus,
    /// Status the analyzer itself reported.
    pub analyzer_status: VerificationStatus,
    pub is_fabricated: bool,
    pub fact_check_results: Vec<ClaimCheck>,
    pub source_credibility: SourceCredibility,
    pub legal_risk: LegalRisk,
    pub recommendations: Vec<String>,
    pub publish_recommendation: PublishRecommendation,
    pub evidence: Evidence,
    pub decision: Decision,
    pub reasons: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!("Technology".parse::<Category>().unwrap(), Category::Technology);
        assert_eq!(" world ".parse::<Category>().unwrap(), Category::World);
        assert!("gossip".parse::<Category>().is_err());
    }

    #[test]
    fn test_legal_risk_wire_format() {
        let risk: LegalRisk = serde_json::from_str("\"CRITICAL\"").unwrap();
        assert_eq!(risk, LegalRisk::Critical);
        assert!(risk.is_severe());
        assert!(!LegalRisk::Medium.is_severe());
        assert!(serde_json::from_str::<LegalRisk>("\"critical\"").is_err());
    }

    #[test]
    fn test_status_round_trip_through_db_strings() {
        for status in [
            ArticleStatus::Draft,
            ArticleStatus::PendingReview,
            ArticleStatus::Published,
            ArticleStatus::Archived,
        ] {
            assert_eq!(status.as_str().parse::<ArticleStatus>().unwrap(), status);
        }
    }
}

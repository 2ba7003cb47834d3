//! Turns an analyzer verdict and the evidence confidence into a publishing decision.
//!
//! The rules are an ordered table and the first matching rule wins. The two
//! safety overrides (fabrication, severe legal risk) sit above the scoring
//! rules and must stay there.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ArticleStatus, LegalRisk, VerificationStatus};

/// What the pipeline does with the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Publish,
    NeedsReview,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Publish => "publish",
            Decision::NeedsReview => "needs_review",
            Decision::Reject => "reject",
        }
    }

    /// Article status after the decision is applied.
    pub fn final_status(&self) -> ArticleStatus {
        match self {
            Decision::Publish => ArticleStatus::Published,
            Decision::NeedsReview | Decision::Reject => ArticleStatus::Draft,
        }
    }

    /// Verification status stamped on the article.
    pub fn verification_status(&self) -> VerificationStatus {
        match self {
            Decision::Publish => VerificationStatus::Verified,
            Decision::NeedsReview => VerificationStatus::NeedsReview,
            Decision::Reject => VerificationStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score cut-offs. Tunable; the defaults are the production values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub publish_min_accuracy: u8,
    pub publish_min_evidence: u8,
    pub review_min_accuracy: u8,
    pub review_min_evidence: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            publish_min_accuracy: 85,
            publish_min_evidence: 40,
            review_min_accuracy: 70,
            review_min_evidence: 20,
        }
    }
}

/// Everything the decision depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionInput {
    pub accuracy_score: u8,
    pub is_fabricated: bool,
    pub legal_risk: LegalRisk,
    pub evidence_confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub final_status: ArticleStatus,
    pub rule: &'static str,
    pub reasons: Vec<String>,
}

impl DecisionOutcome {
    fn new(rule: &'static str, decision: Decision, reason: String) -> Self {
        Self {
            decision,
            final_status: decision.final_status(),
            rule,
            reasons: vec![reason],
        }
    }
}

type RuleFn = fn(&DecisionInput, &Thresholds) -> Option<DecisionOutcome>;

/// Ordered decision table.
pub const RULES: [(&str, RuleFn); 6] = [
    ("fabricated", fabricated),
    ("legal_risk", legal_risk),
    ("corroborated", corroborated),
    ("moderate", moderate),
    ("insufficient", insufficient),
    ("borderline", borderline),
];

fn fabricated(input: &DecisionInput, _: &Thresholds) -> Option<DecisionOutcome> {
    input.is_fabricated.then(|| {
        DecisionOutcome::new(
            "fabricated",
            Decision::Reject,
            "Article contains fabricated information.".to_string(),
        )
    })
}

fn legal_risk(input: &DecisionInput, _: &Thresholds) -> Option<DecisionOutcome> {
    input.legal_risk.is_severe().then(|| {
        DecisionOutcome::new(
            "legal_risk",
            Decision::NeedsReview,
            format!(
                "Legal risk assessed as {}; legal review required before publishing.",
                input.legal_risk
            ),
        )
    })
}

fn corroborated(input: &DecisionInput, t: &Thresholds) -> Option<DecisionOutcome> {
    (input.accuracy_score >= t.publish_min_accuracy
        && input.evidence_confidence >= t.publish_min_evidence)
        .then(|| {
            DecisionOutcome::new(
                "corroborated",
                Decision::Publish,
                format!(
                    "High accuracy ({}) and externally corroborated (confidence {}).",
                    input.accuracy_score, input.evidence_confidence
                ),
            )
        })
}

fn moderate(input: &DecisionInput, t: &Thresholds) -> Option<DecisionOutcome> {
    (input.accuracy_score >= t.review_min_accuracy
        && input.evidence_confidence >= t.review_min_evidence)
        .then(|| {
            DecisionOutcome::new(
                "moderate",
                Decision::NeedsReview,
                format!(
                    "Moderate accuracy ({}), human check required.",
                    input.accuracy_score
                ),
            )
        })
}

fn insufficient(input: &DecisionInput, t: &Thresholds) -> Option<DecisionOutcome> {
    (input.accuracy_score < t.review_min_accuracy
        || input.evidence_confidence < t.review_min_evidence)
        .then(|| {
            DecisionOutcome::new(
                "insufficient",
                Decision::Reject,
                format!(
                    "Low accuracy ({}) or insufficient corroboration (confidence {}).",
                    input.accuracy_score, input.evidence_confidence
                ),
            )
        })
}

fn borderline(_: &DecisionInput, _: &Thresholds) -> Option<DecisionOutcome> {
    Some(DecisionOutcome::new(
        "borderline",
        Decision::NeedsReview,
        "Borderline case, human check required.".to_string(),
    ))
}

/// Evaluates the rule table in order and returns the first match.
pub fn decide(input: &DecisionInput, thresholds: &Thresholds) -> DecisionOutcome {
    RULES
        .iter()
        .find_map(|(_, rule)| rule(input, thresholds))
        // borderline always matches
        .unwrap_or_else(|| DecisionOutcome::new("borderline", Decision::NeedsReview, String::new()))
}

use crate::evidence::Evidence;
use crate::prompt::common::{current_date, FACT_CHECK_EXCERPT_CHARS, JSON_ONLY};
use crate::types::Article;
use crate::util::{excerpt, strip_html};

fn format_sources(sources: &[String]) -> String {
    if sources.is_empty() {
        return "(none declared)".to_string();
    }
    sources
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_evidence(evidence: &Evidence) -> String {
    if !evidence.exists {
        return format!(
            "No corroborating coverage was found by the news search (confidence {}/100).",
            evidence.confidence
        );
    }
    let sources = evidence
        .sources
        .iter()
        .map(|s| {
            format!(
                "- \"{}\" ({}, {}) {}",
                s.title,
                s.source,
                s.date.as_deref().unwrap_or("undated"),
                s.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "The news search found corroborating coverage (confidence {}/100):\n{}",
        evidence.confidence, sources
    )
}

/// Generate the strict fact-checking prompt for an article.
///
/// `schema` is the JSON schema of the expected answer.
pub fn fact_check_prompt(article: &Article, evidence: &Evidence, schema: &str) -> String {
    let body = excerpt(&strip_html(&article.content), FACT_CHECK_EXCERPT_CHARS);
    format!(
        r#"You are a meticulous, conservative news fact-checker. Today's date: {date}.
Your only job is to decide whether the article below can be published without
misleading readers or exposing the publisher to legal liability.

ARTICLE TITLE: {title}
CATEGORY: {category}

ARTICLE BODY (excerpt):
----------
{body}
----------

SOURCES DECLARED BY THE AUTHOR:
{sources}

EXTERNAL EVIDENCE:
{evidence}

INSTRUCTIONS:
1. Identify every concrete factual claim (names, numbers, dates, quotes, events).
2. For each claim give a verdict: "true", "false", "unverified" or "misleading",
   a one-sentence explanation, and your confidence from 0 to 100.
3. Judge each declared source: list those you recognise as real, credible outlets
   in "real_sources", those that look invented or unverifiable in "fake_sources",
   and claims that need a citation but have none in "missing_citations".
4. Set "is_fabricated" to true if the article invents events, people, quotes or
   statistics not grounded in any real source. When in doubt about invented quotes,
   set it to true.
5. Assess legal risk (defamation, privacy, unproven accusations against named
   people): "NONE", "LOW", "MEDIUM", "HIGH" or "CRITICAL".
6. Give an overall "accuracy_score" from 0 to 100. Absence of external evidence
   is not proof of falsehood, but it must lower your confidence.
7. Choose "verification_status" ("verified", "flagged", "needs_review",
   "rejected") and "publish_recommendation" ("publish", "needs_revision",
   "reject"), and list concrete "recommendations" for the editor.
8. Do not be creative. Prefer "unverified" over guessing.

Your answer must validate against this JSON schema:
{schema}
{json_only}"#,
        date = current_date(),
        title = article.title,
        category = article.category,
        body = body,
        sources = format_sources(&article.sources),
        evidence = format_evidence(evidence),
        schema = schema,
        json_only = JSON_ONLY
    )
}

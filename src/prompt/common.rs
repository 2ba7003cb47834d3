use chrono::Local;

/// Characters of article body shown to the fact-checker.
pub const FACT_CHECK_EXCERPT_CHARS: usize = 3000;

// Appended to every prompt that must come back as machine-readable JSON
pub const JSON_ONLY: &str = r#"
Output rules:
1. Respond with a single JSON object and nothing else.
2. Do not wrap the JSON in Markdown code fences.
3. Do not add commentary before or after the JSON.
4. Use exactly the keys described above; do not add or omit keys.
"#;

/// Utility function to get the current date in a human-readable format
pub fn current_date() -> String {
    let today = Local::now();
    format!(
        "{} {}, {}",
        today.format("%B"),
        today.format("%-d"),
        today.format("%Y")
    )
}

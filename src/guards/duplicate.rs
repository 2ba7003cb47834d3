use std::collections::HashSet;

/// Default overlap above which a title counts as a near-duplicate.
pub const DEFAULT_DUPLICATE_THRESHOLD: f64 = 0.7;

/// Lowercase word tokens longer than three characters. Short words are mostly
/// stopwords and inflate overlap between unrelated headlines.
pub fn title_tokens(title: &str) -> HashSet<String> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 3)
        .map(str::to_lowercase)
        .collect()
}

/// `|a ∩ b| / max(|a|, |b|)`, or 0.0 when both sets are empty.
pub fn overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let largest = a.len().max(b.len());
    if largest == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / largest as f64
}

fn normalized(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the first recent title the candidate collides with, and the ratio.
///
/// Titles made only of short words have no tokens to compare; those fall back
/// to a case- and whitespace-insensitive exact match. That is the one case
/// where titles sharing no tokens can still flag: an identical title is always
/// a duplicate, while two different token-less titles never are.
pub fn find_duplicate<'a, I>(candidate: &str, recent_titles: I, threshold: f64) -> Option<(&'a str, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidate_tokens = title_tokens(candidate);
    let candidate_normalized = normalized(candidate);

    recent_titles.into_iter().find_map(|existing| {
        let existing_tokens = title_tokens(existing);
        if candidate_tokens.is_empty() || existing_tokens.is_empty() {
            return (candidate_normalized == normalized(existing)).then_some((existing, 1.0));
        }
        let ratio = overlap_ratio(&candidate_tokens, &existing_tokens);
        (ratio > threshold).then_some((existing, ratio))
    })
}

/// True when the candidate title overlaps any recent title by more than the default threshold.
pub fn is_duplicate<'a, I>(candidate: &str, recent_titles: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    find_duplicate(candidate, recent_titles, DEFAULT_DUPLICATE_THRESHOLD).is_some()
}

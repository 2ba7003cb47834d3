use once_cell::sync::Lazy;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;

/// Slugs are cut to this many characters before the random suffix is added.
pub const MAX_SLUG_BASE_CHARS: usize = 100;
const SLUG_SUFFIX_CHARS: usize = 6;
const WORDS_PER_MINUTE: usize = 200;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Removes tags and collapses whitespace. Only the handful of entities an
/// article body realistically contains are decoded.
pub fn strip_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Truncates to at most `max_chars` characters, never splitting a character.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn word_count(html: &str) -> usize {
    strip_html(html).split_whitespace().count()
}

/// Estimated reading time in whole minutes, at least one.
pub fn read_time_minutes(words: usize) -> usize {
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

/// The deterministic part of a slug: lowercase ASCII alphanumerics joined by
/// single hyphens, cut on a hyphen boundary.
pub fn slug_base(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let mut slug = slug.trim_end_matches('-').to_string();

    if slug.len() > MAX_SLUG_BASE_CHARS {
        slug.truncate(MAX_SLUG_BASE_CHARS);
        if let Some(cut) = slug.rfind('-') {
            slug.truncate(cut);
        }
    }
    if slug.is_empty() {
        slug.push_str("article");
    }
    slug
}

/// URL slug with a random suffix so identical titles still get unique slugs.
pub fn slugify(title: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SLUG_SUFFIX_CHARS)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}", slug_base(title), suffix)
}

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::decision::Thresholds;
use crate::guards::RetryPolicy;

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// # Arguments
/// - `var`: The name of the environment variable.
/// - `delimiter`: The character to split the environment variable's value by.
///
/// # Returns
/// - `Vec<String>`, without empty entries
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads and parses an environment variable, falling back to `default` when unset or invalid.
pub fn get_env_var_or<T: FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Tunables for the verification pipeline and the bulk generation job.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub thresholds: Thresholds,
    pub duplicate_threshold: f64,
    pub recent_title_window: usize,
    pub image_retry: RetryPolicy,
    pub article_delay: Duration,
    pub fact_check_max_attempts: u32,
    pub fact_check_temperature: f32,
    pub generation_temperature: f32,
    pub llm_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            duplicate_threshold: 0.7,
            recent_title_window: 100,
            image_retry: RetryPolicy::default(),
            article_delay: Duration::from_secs(5),
            fact_check_max_attempts: 2,
            fact_check_temperature: 0.1,
            generation_temperature: 0.7,
            llm_timeout: Duration::from_secs(120),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            thresholds: Thresholds {
                publish_min_accuracy: get_env_var_or(
                    "PUBLISH_MIN_ACCURACY",
                    d.thresholds.publish_min_accuracy,
                ),
                publish_min_evidence: get_env_var_or(
                    "PUBLISH_MIN_EVIDENCE",
                    d.thresholds.publish_min_evidence,
                ),
                review_min_accuracy: get_env_var_or(
                    "REVIEW_MIN_ACCURACY",
                    d.thresholds.review_min_accuracy,
                ),
                review_min_evidence: get_env_var_or(
                    "REVIEW_MIN_EVIDENCE",
                    d.thresholds.review_min_evidence,
                ),
            },
            duplicate_threshold: get_env_var_or("DUPLICATE_THRESHOLD", d.duplicate_threshold),
            recent_title_window: get_env_var_or("RECENT_TITLE_WINDOW", d.recent_title_window),
            image_retry: RetryPolicy::fixed(
                get_env_var_or("IMAGE_MAX_ATTEMPTS", d.image_retry.max_attempts),
                Duration::from_millis(get_env_var_or("IMAGE_BACKOFF_MS", 1000u64)),
            ),
            article_delay: Duration::from_secs(get_env_var_or("ARTICLE_DELAY_SECS", 5u64)),
            fact_check_max_attempts: get_env_var_or(
                "FACT_CHECK_MAX_ATTEMPTS",
                d.fact_check_max_attempts,
            ),
            fact_check_temperature: get_env_var_or(
                "FACT_CHECK_TEMPERATURE",
                d.fact_check_temperature,
            ),
            generation_temperature: get_env_var_or(
                "GENERATION_TEMPERATURE",
                d.generation_temperature,
            ),
            llm_timeout: Duration::from_secs(get_env_var_or("LLM_TIMEOUT_SECS", 120u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.thresholds.publish_min_accuracy, 85);
        assert_eq!(config.thresholds.publish_min_evidence, 40);
        assert_eq!(config.thresholds.review_min_accuracy, 70);
        assert_eq!(config.thresholds.review_min_evidence, 20);
        assert_eq!(config.duplicate_threshold, 0.7);
        assert_eq!(config.recent_title_window, 100);
        assert_eq!(config.image_retry.max_attempts, 5);
    }

    #[test]
    fn test_env_parsing_falls_back_on_garbage() {
        env::set_var("NEWSROOM_TEST_GARBAGE_U8", "not-a-number");
        assert_eq!(get_env_var_or("NEWSROOM_TEST_GARBAGE_U8", 42u8), 42);
        env::set_var("NEWSROOM_TEST_LIST", "politics; ;science ");
        assert_eq!(
            get_env_var_as_vec("NEWSROOM_TEST_LIST", ';'),
            vec!["politics".to_string(), "science".to_string()]
        );
    }
}

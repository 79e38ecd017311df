use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::options::ApiOptions;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const MAX_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const MIN_BACKOFF_MULTIPLIER: f64 = 1.0;
const MAX_BACKOFF_MULTIPLIER: f64 = 5.0;
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("retry attempt must be non-negative (got {attempt})")]
pub struct AttemptOutOfRange {
    pub attempt: i32,
}

/// Exponential backoff settings for the outbound API call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub retry_on_timeout: bool,
    pub retry_on_rate_limit: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: DEFAULT_MAX_DELAY,
            retry_on_timeout: true,
            retry_on_rate_limit: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based):
    /// `min(initial_delay * multiplier^attempt, max_delay)`.
    pub fn calculate_delay(&self, attempt: i32) -> Result<Duration, AttemptOutOfRange> {
        if attempt < 0 {
            return Err(AttemptOutOfRange { attempt });
        }

        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay);
        Ok(delay.min(self.max_delay))
    }

    pub fn is_valid(&self) -> bool {
        self.max_attempts <= MAX_MAX_ATTEMPTS
            && !self.initial_delay.is_zero()
            && (MIN_BACKOFF_MULTIPLIER..=MAX_BACKOFF_MULTIPLIER).contains(&self.backoff_multiplier)
            && !self.max_delay.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub api_key: String,
    pub options: ApiOptions,
    pub retry_policy: RetryPolicy,
    pub base_url: Option<String>,
    pub debug_mode: bool,
    pub organization_id: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            options: ApiOptions::default(),
            retry_policy: RetryPolicy::default(),
            base_url: None,
            debug_mode: false,
            organization_id: None,
        }
    }
}

impl Configuration {
    pub fn from_env() -> Self {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub(crate) fn from_env_with(mut get_var: impl FnMut(&str) -> Option<String>) -> Self {
        let mut cfg = Self {
            api_key: get_var("OPENAI_API_KEY").unwrap_or_default(),
            base_url: non_blank(get_var("OPENAI_API_BASE_URL")),
            organization_id: non_blank(get_var("OPENAI_ORGANIZATION_ID")),
            ..Self::default()
        };

        cfg.debug_mode = parse_bool(get_var("QX_DEBUG").as_deref(), cfg.debug_mode);
        if let Some(secs) = parse_positive_u64(get_var("QX_TIMEOUT").as_deref()) {
            cfg.options.default_timeout = Duration::from_secs(secs);
        }

        cfg
    }

    pub fn is_valid(&self) -> bool {
        !self.api_key.trim().is_empty() && self.options.is_valid() && self.retry_policy.is_valid()
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_positive_u64(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

pub(crate) fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::{
        AttemptOutOfRange, Configuration, DEFAULT_BASE_URL, RetryPolicy, parse_bool,
        parse_positive_u64,
    };
    use crate::options::ApiOptions;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Configuration {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        Configuration::from_env_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn from_env_uses_defaults_when_vars_are_missing() {
        let cfg = config_from_pairs(&[]);
        assert_eq!(cfg.api_key, "");
        assert_eq!(cfg.base_url, None);
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.organization_id, None);
        assert!(!cfg.debug_mode);
        assert_eq!(cfg.options, ApiOptions::default());
        assert_eq!(cfg.retry_policy, RetryPolicy::default());
        assert!(!cfg.is_valid());
    }

    #[test]
    fn from_env_reads_configured_values() {
        let cfg = config_from_pairs(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE_URL", "http://localhost:9999/v1"),
            ("OPENAI_ORGANIZATION_ID", "org-123"),
            ("QX_DEBUG", "true"),
            ("QX_TIMEOUT", "15"),
        ]);

        assert_eq!(cfg.api_key, "sk-test");
        assert_eq!(cfg.base_url(), "http://localhost:9999/v1");
        assert_eq!(cfg.organization_id.as_deref(), Some("org-123"));
        assert!(cfg.debug_mode);
        assert_eq!(cfg.options.default_timeout, Duration::from_secs(15));
        assert!(cfg.is_valid());
    }

    #[test]
    fn from_env_ignores_unparseable_values() {
        let cfg = config_from_pairs(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE_URL", "   "),
            ("QX_DEBUG", "perhaps"),
            ("QX_TIMEOUT", "soon"),
        ]);

        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert!(!cfg.debug_mode);
        assert_eq!(
            cfg.options.default_timeout,
            ApiOptions::default().default_timeout
        );

        let cfg = config_from_pairs(&[("QX_TIMEOUT", "0")]);
        assert_eq!(
            cfg.options.default_timeout,
            ApiOptions::default().default_timeout
        );
    }

    #[test]
    fn validation_requires_key_options_and_retry_policy() {
        let mut cfg = config_from_pairs(&[("OPENAI_API_KEY", "sk-test")]);
        assert!(cfg.is_valid());

        cfg.options.default_temperature = 5.0;
        assert!(!cfg.is_valid());

        cfg.options = ApiOptions::default();
        cfg.retry_policy.backoff_multiplier = 0.5;
        assert!(!cfg.is_valid());

        cfg.retry_policy = RetryPolicy::default();
        cfg.api_key = "   ".to_string();
        assert!(!cfg.is_valid());
    }

    #[test]
    fn calculate_delay_grows_exponentially() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            ..RetryPolicy::default()
        };
        let delays: Vec<Duration> = (0..4)
            .map(|attempt| policy.calculate_delay(attempt).expect("delay"))
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(8000),
            ]
        );
    }

    #[test]
    fn calculate_delay_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.calculate_delay(5), Ok(Duration::from_secs(30)));
        assert_eq!(policy.calculate_delay(i32::MAX), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn calculate_delay_rejects_negative_attempt() {
        assert_eq!(
            RetryPolicy::default().calculate_delay(-1),
            Err(AttemptOutOfRange { attempt: -1 })
        );
    }

    #[test]
    fn retry_policy_validation_checks_ranges() {
        assert!(RetryPolicy::default().is_valid());
        assert!(
            RetryPolicy {
                max_attempts: 0,
                ..RetryPolicy::default()
            }
            .is_valid()
        );
        assert!(
            !RetryPolicy {
                max_attempts: 11,
                ..RetryPolicy::default()
            }
            .is_valid()
        );
        assert!(
            !RetryPolicy {
                initial_delay: Duration::ZERO,
                ..RetryPolicy::default()
            }
            .is_valid()
        );
        assert!(
            !RetryPolicy {
                backoff_multiplier: 5.5,
                ..RetryPolicy::default()
            }
            .is_valid()
        );
        assert!(
            !RetryPolicy {
                max_delay: Duration::ZERO,
                ..RetryPolicy::default()
            }
            .is_valid()
        );
    }

    #[test]
    fn parse_bool_respects_truthy_and_falsy_values() {
        assert!(parse_bool(Some("true"), false));
        assert!(parse_bool(Some(" TRUE "), false));
        assert!(!parse_bool(Some("off"), true));
        assert!(parse_bool(Some("maybe"), true));
        assert!(!parse_bool(None, false));
    }

    #[test]
    fn parse_positive_u64_rejects_zero_and_garbage() {
        assert_eq!(parse_positive_u64(Some(" 90 ")), Some(90));
        assert_eq!(parse_positive_u64(Some("0")), None);
        assert_eq!(parse_positive_u64(Some("-5")), None);
        assert_eq!(parse_positive_u64(None), None);
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_MODEL: &str = "gpt-5";
pub const DEFAULT_TEMPERATURE: f64 = 1.0;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;
pub const DEFAULT_TOKEN_LIMIT_PER_MINUTE: u32 = 90_000;

pub const MIN_TEMPERATURE: f64 = 0.0;
pub const MAX_TEMPERATURE: f64 = 2.0;
pub const MIN_MAX_TOKENS: u32 = 1;
pub const MAX_MAX_TOKENS: u32 = 4096;

const MIN_RATE_LIMIT: u32 = 1;
const MAX_RATE_LIMIT: u32 = 1000;
const MIN_TOKEN_LIMIT: u32 = 1000;
const MAX_TOKEN_LIMIT: u32 = 1_000_000;

pub const ALLOWED_MODELS: &[&str] = &[
    "gpt-5",
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo",
];

/// Reasoning-depth hint, phrased into the system prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl EffortLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// How much search/context breadth to request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextSize {
    Low,
    #[default]
    Medium,
    High,
}

impl ContextSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLevel(pub String);

impl fmt::Display for UnknownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown level '{}' (expected low, medium or high)", self.0)
    }
}

impl std::error::Error for UnknownLevel {}

impl FromStr for EffortLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

impl FromStr for ContextSize {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// API-level defaults and limits. Command-line values are layered on top with
/// [`ApiOptions::merge_with_command_line`], which never mutates the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiOptions {
    pub default_effort: EffortLevel,
    pub default_context: ContextSize,
    pub default_timeout: Duration,
    pub default_model: String,
    pub default_temperature: f64,
    pub default_max_tokens: u32,
    pub enable_web_search_by_default: bool,
    pub stream_responses_by_default: bool,
    pub system_prompt: Option<String>,
    pub allowed_models: BTreeSet<String>,
    pub custom_headers: BTreeMap<String, String>,
    pub rate_limit_per_minute: u32,
    pub token_limit_per_minute: u32,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            default_effort: EffortLevel::Medium,
            default_context: ContextSize::Medium,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            enable_web_search_by_default: true,
            stream_responses_by_default: true,
            system_prompt: None,
            allowed_models: ALLOWED_MODELS.iter().map(|m| (*m).to_string()).collect(),
            custom_headers: BTreeMap::new(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            token_limit_per_minute: DEFAULT_TOKEN_LIMIT_PER_MINUTE,
        }
    }
}

impl ApiOptions {
    /// Checks every constraint and reports the first one that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_model.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "default_model",
            });
        }
        validate_temperature("default_temperature", self.default_temperature)?;
        validate_max_tokens("default_max_tokens", self.default_max_tokens)?;
        if self.default_timeout.is_zero() {
            return Err(ValidationError::NotPositive {
                field: "default_timeout",
            });
        }
        if !(MIN_RATE_LIMIT..=MAX_RATE_LIMIT).contains(&self.rate_limit_per_minute) {
            return Err(ValidationError::out_of_range(
                "rate_limit_per_minute",
                MIN_RATE_LIMIT,
                MAX_RATE_LIMIT,
                self.rate_limit_per_minute,
            ));
        }
        if !(MIN_TOKEN_LIMIT..=MAX_TOKEN_LIMIT).contains(&self.token_limit_per_minute) {
            return Err(ValidationError::out_of_range(
                "token_limit_per_minute",
                MIN_TOKEN_LIMIT,
                MAX_TOKEN_LIMIT,
                self.token_limit_per_minute,
            ));
        }
        if !self.allowed_models.contains(&self.default_model) {
            return Err(ValidationError::ModelNotAllowed {
                model: self.default_model.clone(),
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn is_model_allowed(&self, model: &str) -> bool {
        !model.trim().is_empty() && self.allowed_models.contains(model)
    }

    /// Returns a copy with the command-line values applied. Missing values and
    /// blank model names keep the existing defaults.
    pub fn merge_with_command_line(
        &self,
        model: Option<&str>,
        temperature: Option<f64>,
        max_tokens: Option<u32>,
    ) -> Self {
        let default_model = model
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_model.clone());

        Self {
            default_model,
            default_temperature: temperature.unwrap_or(self.default_temperature),
            default_max_tokens: max_tokens.unwrap_or(self.default_max_tokens),
            ..self.clone()
        }
    }
}

pub(crate) fn validate_temperature(
    field: &'static str,
    temperature: f64,
) -> Result<(), ValidationError> {
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(ValidationError::out_of_range(
            field,
            MIN_TEMPERATURE,
            MAX_TEMPERATURE,
            temperature,
        ));
    }
    Ok(())
}

pub(crate) fn validate_max_tokens(
    field: &'static str,
    max_tokens: u32,
) -> Result<(), ValidationError> {
    if !(MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&max_tokens) {
        return Err(ValidationError::out_of_range(
            field,
            MIN_MAX_TOKENS,
            MAX_MAX_TOKENS,
            max_tokens,
        ));
    }
    Ok(())
}

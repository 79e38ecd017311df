use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::options::{ContextSize, EffortLevel, validate_max_tokens, validate_temperature};

const DEFAULT_QUERY_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_QUERY_TEMPERATURE: f64 = 0.7;
const DEFAULT_QUERY_MAX_TOKENS: u32 = 1000;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;
const MIN_QUERY_TIMEOUT_SECS: u64 = 1;
const MAX_QUERY_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// One request to the model, with per-request generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub content: String,
    pub reasoning_effort: EffortLevel,
    pub search_context: ContextSize,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub enable_web_search: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            content: String::new(),
            reasoning_effort: EffortLevel::Medium,
            search_context: ContextSize::Medium,
            timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            model: DEFAULT_QUERY_MODEL.to_string(),
            temperature: DEFAULT_QUERY_TEMPERATURE,
            max_tokens: DEFAULT_QUERY_MAX_TOKENS,
            enable_web_search: true,
        }
    }
}

impl Query {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Result<Self, ValidationError> {
        validate_temperature("temperature", temperature)?;
        self.temperature = temperature;
        Ok(self)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Result<Self, ValidationError> {
        validate_max_tokens("max_tokens", max_tokens)?;
        self.max_tokens = max_tokens;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ValidationError> {
        validate_timeout(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_effort(mut self, effort: EffortLevel) -> Self {
        self.reasoning_effort = effort;
        self
    }

    pub fn with_context(mut self, context: ContextSize) -> Self {
        self.search_context = context;
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.enable_web_search = enabled;
        self
    }

    /// Re-checks every field; useful after deserialization or direct mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::Required { field: "content" });
        }
        validate_timeout(self.timeout)?;
        validate_temperature("temperature", self.temperature)?;
        validate_max_tokens("max_tokens", self.max_tokens)?;
        Ok(())
    }
}

fn validate_timeout(timeout: Duration) -> Result<(), ValidationError> {
    let secs = timeout.as_secs();
    let whole_seconds = timeout.subsec_nanos() == 0;
    if !whole_seconds || !(MIN_QUERY_TIMEOUT_SECS..=MAX_QUERY_TIMEOUT_SECS).contains(&secs) {
        return Err(ValidationError::out_of_range(
            "timeout",
            MIN_QUERY_TIMEOUT_SECS,
            MAX_QUERY_TIMEOUT_SECS,
            format!("{:?}", timeout),
        ));
    }
    Ok(())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMetadata {
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub response_time: Duration,
    pub web_search_used: bool,
    pub web_search_results_count: u32,
    pub finish_reason: String,
    pub created_at: DateTime<Utc>,
}

impl Default for ResponseMetadata {
    fn default() -> Self {
        Self {
            model: String::new(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            response_time: Duration::ZERO,
            web_search_used: false,
            web_search_results_count: 0,
            finish_reason: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of one query. A default value is incomplete and therefore not a
/// success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub content: String,
    pub metadata: ResponseMetadata,
    pub is_complete: bool,
    pub error_message: Option<String>,
}

impl Response {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_complete: true,
            ..Self::default()
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            error_message: Some(error_message.into()),
            is_complete: true,
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error_message.as_deref().is_none_or(str::is_empty) && self.is_complete
    }
}

/// Service-facing settings for [`crate::providers::openai::OpenAiService::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub effort_level: String,
    pub context_size: String,
    pub enable_web_search: bool,
    pub timeout_seconds: u64,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: f64,
    pub system_prompt: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            effort_level: "medium".to_string(),
            context_size: "medium".to_string(),
            enable_web_search: true,
            timeout_seconds: 60,
            model: "gpt-4o-mini".to_string(),
            max_tokens: None,
            temperature: 0.7,
            system_prompt: None,
        }
    }
}

impl From<&Query> for QueryOptions {
    fn from(query: &Query) -> Self {
        Self {
            effort_level: query.reasoning_effort.as_str().to_string(),
            context_size: query.search_context.as_str().to_string(),
            enable_web_search: query.enable_web_search,
            timeout_seconds: query.timeout.as_secs(),
            model: query.model.clone(),
            max_tokens: Some(query.max_tokens),
            temperature: query.temperature,
            system_prompt: None,
        }
    }
}

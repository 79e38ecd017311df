//! OpenAI Responses API adapter.

mod normalize;
mod stream;
mod wire;

use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};

use crate::config::Configuration;
use crate::error::QxError;
use crate::model::{Message, QueryOptions, Response, ResponseMetadata};
use crate::options::{ContextSize, EffortLevel};
use crate::providers::http_errors::{request_error, status_error};
use crate::retry::with_retry;
use crate::tools::ToolService;

pub use normalize::{
    ContentInfo, EMPTY_RESPONSE_TEXT, ItemInfo, RequestOptionsInfo, ResponseDetails,
    ResponseMetadataInfo,
};
pub use stream::TextStream;
pub use wire::Usage;

use normalize::normalize_output;
use wire::{InputMessage, ResponsesBody, ResponsesRequest, Tool};

const ORGANIZATION_HEADER: &str = "OpenAI-Organization";

/// Everything needed for one call to `POST /responses`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub enable_web_search: bool,
    pub enable_function_calling: bool,
    pub context_size: ContextSize,
    pub system_prompt: Option<String>,
    pub timeout: Duration,
}

/// A normalized response plus the verbose-mode summary of how it was built.
#[derive(Debug, Clone)]
pub struct Completion {
    pub response: Response,
    pub details: ResponseDetails,
}

/// System prompt sent when the caller gives none.
pub fn effort_instructions(effort: EffortLevel, context: ContextSize) -> String {
    let effort = match effort {
        EffortLevel::Low => "Be concise and direct. Provide quick answers.",
        EffortLevel::High => "Think step by step. Provide detailed and thorough analysis.",
        EffortLevel::Medium => "Provide balanced and clear responses.",
    };
    let context = match context {
        ContextSize::Low => "Focus on the immediate question only.",
        ContextSize::High => "Consider broader context and implications.",
        ContextSize::Medium => "Consider relevant context as needed.",
    };
    format!("You are a helpful AI assistant. {effort} {context}")
}

#[derive(Debug)]
pub struct OpenAiService {
    client: Client,
    config: Configuration,
    tools: ToolService,
}

impl OpenAiService {
    pub fn new(config: Configuration) -> Result<Self, QxError> {
        Self::with_tools(config, ToolService::new())
    }

    pub fn with_tools(config: Configuration, tools: ToolService) -> Result<Self, QxError> {
        if !config.has_api_key() {
            return Err(QxError::MissingApiKey);
        }

        let client = Client::builder()
            .default_headers(default_headers(&config)?)
            .build()
            .map_err(|err| QxError::Network(format!("Failed to initialize HTTP client: {err}")))?;

        Ok(Self {
            client,
            config,
            tools,
        })
    }

    pub fn tools(&self) -> &ToolService {
        &self.tools
    }

    fn responses_url(&self) -> String {
        format!("{}/responses", self.config.base_url().trim_end_matches('/'))
    }

    pub async fn get_completion(&self, request: &CompletionRequest) -> Result<Response, QxError> {
        Ok(self.get_completion_with_details(request).await?.response)
    }

    pub async fn get_completion_with_details(
        &self,
        request: &CompletionRequest,
    ) -> Result<Completion, QxError> {
        if request.prompt.trim().is_empty() {
            return Err(QxError::EmptyPrompt);
        }

        let body = self.build_request(request, false);
        let api_url = self.responses_url();
        info!(
            api_url = %api_url,
            model = %request.model,
            web_search = request.enable_web_search,
            functions = request.enable_function_calling,
            "sending OpenAI request"
        );

        let started = Instant::now();
        let (url, body) = (api_url.as_str(), &body);
        let parsed = with_retry(&self.config.retry_policy, || {
            self.send_once(url, body, request.timeout)
        })
        .await?;
        let elapsed = started.elapsed();

        if let Some(error) = &parsed.error {
            warn!(model = %request.model, error = %error.describe(), "OpenAI reported a failed response");
            return Err(QxError::ModelFailed(error.describe()));
        }
        if parsed.status.as_deref() == Some("failed") {
            return Err(QxError::ModelFailed("response status is 'failed'".to_string()));
        }

        let normalized = normalize_output(&parsed.output, &self.tools);
        let model = parsed.model.clone().unwrap_or_else(|| request.model.clone());
        let usage = parsed.usage.unwrap_or_default();
        debug!(
            items = parsed.output.len(),
            function_calls = normalized.function_calls,
            web_search_calls = normalized.web_search_calls,
            total_tokens = usage.total_tokens,
            elapsed_ms = elapsed.as_millis() as u64,
            "received OpenAI response"
        );

        let metadata = ResponseMetadata {
            model: model.clone(),
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
            response_time: elapsed,
            web_search_used: normalized.web_search_calls > 0,
            web_search_results_count: normalized.web_search_calls,
            finish_reason: parsed.status.clone().unwrap_or_default(),
            ..ResponseMetadata::default()
        };
        let mut response = Response::success(normalized.text).with_metadata(metadata);
        response.is_complete = parsed.status.as_deref() != Some("incomplete");

        let details = ResponseDetails {
            model,
            request_options: RequestOptionsInfo {
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                web_search_enabled: request.enable_web_search,
                function_calling_enabled: request.enable_function_calling,
            },
            response_metadata: ResponseMetadataInfo {
                output_items_count: parsed.output.len(),
                finish_reason: parsed.status,
                usage: parsed.usage,
                items: normalized.items,
            },
        };

        Ok(Completion { response, details })
    }

    /// One-shot query phrased with effort/context instructions.
    pub async fn query(&self, prompt: &str, options: &QueryOptions) -> Result<Response, QxError> {
        let request = self.request_from_options(prompt, options)?;
        self.get_completion(&request).await
    }

    /// Streams text deltas. The timeout covers establishing the stream only.
    pub async fn query_stream(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<TextStream, QxError> {
        let request = self.request_from_options(prompt, options)?;
        let body = self.build_request(&request, true);
        let api_url = self.responses_url();
        info!(api_url = %api_url, model = %request.model, "opening OpenAI stream");

        let timeout_secs = request.timeout.as_secs();
        let send = self.client.post(&api_url).json(&body).send();
        let response = tokio::time::timeout(request.timeout, send)
            .await
            .map_err(|_| QxError::Timeout {
                seconds: timeout_secs,
            })?
            .map_err(|err| request_error(err, &api_url, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "OpenAI stream request returned non-success status");
            return Err(status_error(status, &text));
        }

        Ok(TextStream::new(Box::pin(response.bytes_stream())))
    }

    fn request_from_options(
        &self,
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<CompletionRequest, QxError> {
        if prompt.trim().is_empty() {
            return Err(QxError::EmptyPrompt);
        }

        let effort = options.effort_level.parse().unwrap_or_else(|err| {
            warn!(error = %err, "falling back to medium effort");
            EffortLevel::default()
        });
        let context = options.context_size.parse().unwrap_or_else(|err| {
            warn!(error = %err, "falling back to medium context");
            ContextSize::default()
        });
        let system_prompt = options
            .system_prompt
            .clone()
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or_else(|| effort_instructions(effort, context));
        let timeout = if options.timeout_seconds == 0 {
            self.config.options.default_timeout
        } else {
            Duration::from_secs(options.timeout_seconds)
        };

        Ok(CompletionRequest {
            prompt: prompt.to_string(),
            model: options.model.clone(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            enable_web_search: options.enable_web_search,
            enable_function_calling: false,
            context_size: context,
            system_prompt: Some(system_prompt),
            timeout,
        })
    }

    fn build_request(&self, request: &CompletionRequest, stream: bool) -> ResponsesRequest {
        let mut input = Vec::with_capacity(2);
        if let Some(system_prompt) = request
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
        {
            input.push(InputMessage::from(&Message::system(system_prompt)));
        }
        input.push(InputMessage::from(&Message::user(request.prompt.as_str())));

        let mut tools = Vec::new();
        if request.enable_web_search {
            tools.push(Tool::WebSearchPreview {
                search_context_size: request.context_size,
            });
        }
        if request.enable_function_calling {
            tools.extend(self.tools.available_tools().iter().map(Tool::from));
        }

        ResponsesRequest {
            model: request.model.clone(),
            input,
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
            tools,
            stream,
        }
    }

    async fn send_once(
        &self,
        api_url: &str,
        body: &ResponsesRequest,
        timeout: Duration,
    ) -> Result<ResponsesBody, QxError> {
        let timeout_secs = timeout.as_secs();
        let call = async {
            let response = self
                .client
                .post(api_url)
                .json(body)
                .send()
                .await
                .map_err(|err| {
                    warn!(api_url = %api_url, error = %err, "OpenAI request failed");
                    request_error(err, api_url, timeout_secs)
                })?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|err| request_error(err, api_url, timeout_secs))?;

            if !status.is_success() {
                warn!(
                    api_url = %api_url,
                    status = %status,
                    response_body_len = text.len(),
                    "OpenAI returned non-success status"
                );
                return Err(status_error(status, &text));
            }

            serde_json::from_str::<ResponsesBody>(&text)
                .map_err(|err| QxError::InvalidResponse(err.to_string()))
        };

        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| QxError::Timeout {
                seconds: timeout_secs,
            })?
    }
}

fn default_headers(config: &Configuration) -> Result<HeaderMap, QxError> {
    let mut headers = HeaderMap::new();

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
        .map_err(|_| QxError::Network("OPENAI_API_KEY contains invalid characters".to_string()))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    if let Some(org) = &config.organization_id {
        match HeaderValue::from_str(org) {
            Ok(value) => {
                headers.insert(HeaderName::from_static("openai-organization"), value);
            }
            Err(_) => warn!(header = ORGANIZATION_HEADER, "skipping invalid header value"),
        }
    }

    for (name, value) in &config.options.custom_headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid custom header"),
        }
    }

    Ok(headers)
}

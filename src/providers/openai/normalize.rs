use serde::Serialize;
use tracing::debug;

use super::wire::{ContentPart, OutputItem, Usage};
use crate::tools::ToolService;

pub const EMPTY_RESPONSE_TEXT: &str = "No text content was returned by the model.";

const PREVIEW_CHARS: usize = 100;

/// Flattened result of one response: visible text plus what the walk saw.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Normalized {
    pub text: String,
    pub items: Vec<ItemInfo>,
    pub web_search_calls: u32,
    pub function_calls: u32,
}

/// Concatenates message text in item order, running any requested functions
/// inline. Never returns blank text.
pub(crate) fn normalize_output(items: &[OutputItem], tools: &ToolService) -> Normalized {
    let mut text = String::new();
    let mut infos = Vec::with_capacity(items.len());
    let mut web_search_calls = 0;
    let mut function_calls = 0;

    for item in items {
        match item {
            OutputItem::Message { content } => {
                let mut previews = Vec::new();
                for part in content {
                    match part {
                        ContentPart::OutputText { text: segment } => {
                            text.push_str(segment);
                            previews.push(preview(segment));
                        }
                        ContentPart::Refusal { refusal } => {
                            debug!(refusal = %refusal, "model refused");
                        }
                        ContentPart::Other => {}
                    }
                }
                infos.push(ItemInfo::message(content.len(), previews));
            }
            OutputItem::WebSearchCall { status } => {
                web_search_calls += 1;
                debug!(status = status.as_deref().unwrap_or("unknown"), "web search call");
                infos.push(ItemInfo::web_search(status.clone()));
            }
            OutputItem::FunctionCall {
                name,
                arguments,
                call_id,
            } => {
                function_calls += 1;
                debug!(
                    function = %name,
                    call_id = call_id.as_deref().unwrap_or(""),
                    "model requested function call"
                );
                let result = tools.execute_function(name, arguments.as_deref());
                text.push_str(&format!("\n[Function Call: {name}]\n{result}\n"));
                infos.push(ItemInfo::function_call(name.clone()));
            }
            OutputItem::Unknown => {
                debug!("skipping unrecognized output item");
                infos.push(ItemInfo::unknown());
            }
        }
    }

    if text.trim().is_empty() {
        text = EMPTY_RESPONSE_TEXT.to_string();
    }

    Normalized {
        text,
        items: infos,
        web_search_calls,
        function_calls,
    }
}

fn preview(segment: &str) -> String {
    if segment.chars().count() <= PREVIEW_CHARS {
        return segment.to_string();
    }
    let head: String = segment.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// Diagnostic summary printed in verbose mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseDetails {
    pub model: String,
    pub request_options: RequestOptionsInfo,
    pub response_metadata: ResponseMetadataInfo,
}

impl ResponseDetails {
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOptionsInfo {
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub web_search_enabled: bool,
    pub function_calling_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadataInfo {
    pub output_items_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub items: Vec<ItemInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemInfo {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentInfo {
    pub content_count: usize,
    pub text_previews: Vec<String>,
}

impl ItemInfo {
    fn bare(kind: &'static str) -> Self {
        Self {
            kind,
            content: None,
            web_search_status: None,
            function_name: None,
        }
    }

    fn message(content_count: usize, text_previews: Vec<String>) -> Self {
        Self {
            content: Some(ContentInfo {
                content_count,
                text_previews,
            }),
            ..Self::bare("message")
        }
    }

    fn web_search(status: Option<String>) -> Self {
        Self {
            web_search_status: Some(status.unwrap_or_else(|| "unknown".to_string())),
            ..Self::bare("web_search_call")
        }
    }

    fn function_call(name: String) -> Self {
        Self {
            function_name: Some(name),
            ..Self::bare("function_call")
        }
    }

    fn unknown() -> Self {
        Self::bare("unknown")
    }
}

//! Local functions the model may ask to call.
//!
//! Every failure path of [`ToolService::execute_function`] produces a readable
//! string instead of an error, because the result is spliced straight into the
//! assistant's reply.

mod builtin;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Error: Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Error parsing arguments: {0}")]
    InvalidArguments(String),

    #[error("Error: {0} is required")]
    MissingArgument(&'static str),

    #[error("Error evaluating expression: {0}")]
    Evaluation(String),

    #[error("Error executing function: {0}")]
    Execution(String),
}

pub type ToolResult = Result<String, ToolError>;

type FunctionHandler = Box<dyn Fn(&Value) -> ToolResult + Send + Sync>;

/// A function advertised to the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub strict: bool,
}

pub struct ToolService {
    handlers: HashMap<String, FunctionHandler>,
    tools: Vec<ToolDefinition>,
}

impl fmt::Debug for ToolService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolService")
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl Default for ToolService {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolService {
    /// Creates a registry with the built-in functions already registered.
    pub fn new() -> Self {
        let mut service = Self::empty();
        builtin::register_all(&mut service);
        service
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            tools: Vec::new(),
        }
    }

    /// Registers `handler` under `name` (matched case-insensitively). A second
    /// registration with the same name replaces the first.
    pub fn register_function<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) where
        F: Fn(&Value) -> ToolResult + Send + Sync + 'static,
    {
        let name = name.into();
        let key = name.to_lowercase();
        let definition = ToolDefinition {
            name,
            description: description.into(),
            parameters,
            strict: false,
        };

        self.tools.retain(|tool| tool.name.to_lowercase() != key);
        self.tools.push(definition);
        self.handlers.insert(key, Box::new(handler));
    }

    pub fn available_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs a registered function with a raw JSON argument payload. Missing or
    /// blank payloads are treated as `{}`.
    pub fn execute_function(&self, name: &str, arguments: Option<&str>) -> String {
        match self.try_execute(name, arguments) {
            Ok(output) => {
                debug!(function = %name, output_len = output.len(), "function call completed");
                output
            }
            Err(err) => {
                warn!(function = %name, error = %err, "function call failed");
                err.to_string()
            }
        }
    }

    fn try_execute(&self, name: &str, arguments: Option<&str>) -> ToolResult {
        let handler = self
            .handlers
            .get(&name.to_lowercase())
            .ok_or_else(|| ToolError::UnknownFunction(name.to_string()))?;

        let raw = arguments
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .unwrap_or("{}");
        let args: Value =
            serde_json::from_str(raw).map_err(|err| ToolError::InvalidArguments(err.to_string()))?;

        handler(&args)
    }
}

/// Reads an optional string argument. `null` counts as absent.
pub(crate) fn optional_str<'a>(
    args: &'a Value,
    key: &'static str,
) -> Result<Option<&'a str>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(ToolError::Execution(format!(
            "'{key}' must be a string, got {other}"
        ))),
    }
}

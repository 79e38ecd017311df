use std::path::PathBuf;

use clap::Parser;

use crate::options::{ContextSize, EffortLevel};

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "qx")]
#[command(about = "Qx - Query eXpress: send a prompt to the OpenAI Responses API")]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// The natural language prompt to send (stdin is prepended when piped)
    pub prompt: Vec<String>,

    /// The AI model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Temperature for response generation (0.0 to 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Maximum number of tokens in the response (omit for unlimited)
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Enable the web search tool
    #[arg(short = 'w', long, overrides_with = "no_web_search")]
    pub web_search: bool,

    #[arg(long, overrides_with = "web_search")]
    pub no_web_search: bool,

    /// Let the model call the built-in local functions
    #[arg(short = 'f', long, overrides_with = "no_functions")]
    pub functions: bool,

    #[arg(long, overrides_with = "functions")]
    pub no_functions: bool,

    /// Print response details as JSON before the text
    #[arg(short, long)]
    pub verbose: bool,

    /// Show version information
    #[arg(long)]
    pub version: bool,

    /// Show license and third-party notices
    #[arg(long)]
    pub license: bool,

    /// Reasoning effort: low, medium or high
    #[arg(short, long)]
    pub effort: Option<EffortLevel>,

    /// Search context size: low, medium or high
    #[arg(short, long)]
    pub context: Option<ContextSize>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print text as it arrives (not available with --functions or --verbose)
    #[arg(long)]
    pub stream: bool,

    /// Replace the default system prompt
    #[arg(long = "system")]
    pub system_prompt: Option<String>,
}

impl Cli {
    pub fn web_search_enabled(&self, default: bool) -> bool {
        if self.no_web_search {
            false
        } else {
            self.web_search || default
        }
    }

    pub fn functions_enabled(&self) -> bool {
        self.functions && !self.no_functions
    }
}

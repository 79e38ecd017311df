use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::config::Configuration;
use crate::error::{QxError, ValidationError};
use crate::gateway::CompletionGateway;
use crate::model::{Query, QueryOptions};
use crate::providers::openai::{CompletionRequest, EMPTY_RESPONSE_TEXT, effort_instructions};

#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Complete,
    Stream(QueryOptions),
}

/// A fully validated invocation, ready to hit the network.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub request: CompletionRequest,
    pub mode: Mode,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

/// Piped input comes first, then the positional words.
pub fn compose_prompt(stdin: Option<&str>, args: &[String]) -> Result<String, QxError> {
    let positional = args.join(" ");
    let parts: Vec<&str> = [stdin.unwrap_or(""), positional.as_str()]
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        return Err(QxError::EmptyPrompt);
    }
    Ok(parts.join("\n\n"))
}

/// Resolves flags against the configured defaults. Fails before any network
/// work on an empty prompt, invalid options, or a missing API key.
pub fn prepare(cli: &Cli, stdin: Option<&str>, config: &Configuration) -> Result<PreparedQuery, QxError> {
    let prompt = compose_prompt(stdin, &cli.prompt)?;

    let temperature = cli.temperature.filter(|value| *value != 0.0);
    let max_tokens = cli.max_tokens.filter(|value| *value != 0);
    let options = config
        .options
        .merge_with_command_line(cli.model.as_deref(), temperature, max_tokens);
    options.validate()?;

    if !config.has_api_key() {
        return Err(QxError::MissingApiKey);
    }

    let effort = cli.effort.unwrap_or(options.default_effort);
    let context = cli.context.unwrap_or(options.default_context);
    let timeout = cli
        .timeout
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(options.default_timeout);
    let system_prompt = cli
        .system_prompt
        .clone()
        .or_else(|| options.system_prompt.clone())
        .or_else(|| {
            (cli.effort.is_some() || cli.context.is_some())
                .then(|| effort_instructions(effort, context))
        });

    let request = CompletionRequest {
        prompt,
        model: options.default_model.clone(),
        temperature: options.default_temperature,
        max_tokens,
        enable_web_search: cli.web_search_enabled(options.enable_web_search_by_default),
        enable_function_calling: cli.functions_enabled(),
        context_size: context,
        system_prompt,
        timeout,
    };

    if cli.stream {
        if cli.functions_enabled() {
            return Err(ValidationError::StreamConflict { flag: "--functions" }.into());
        }
        if cli.verbose {
            return Err(ValidationError::StreamConflict { flag: "--verbose" }.into());
        }
    }

    let mode = if cli.stream {
        let query = Query::new(request.prompt.as_str())
            .with_model(request.model.as_str())
            .with_effort(effort)
            .with_context(context)
            .with_web_search(request.enable_web_search)
            .with_temperature(request.temperature)?;
        query.validate()?;

        Mode::Stream(QueryOptions {
            timeout_seconds: request.timeout.as_secs(),
            max_tokens: request.max_tokens,
            system_prompt: request.system_prompt.clone(),
            ..QueryOptions::from(&query)
        })
    } else {
        Mode::Complete
    };

    debug!(
        model = %request.model,
        temperature = request.temperature,
        max_tokens = ?request.max_tokens,
        web_search = request.enable_web_search,
        functions = request.enable_function_calling,
        stream = cli.stream,
        "resolved query options"
    );

    Ok(PreparedQuery {
        request,
        mode,
        output: cli.output.clone(),
        verbose: cli.verbose,
    })
}

pub async fn execute<G>(prepared: &PreparedQuery, gateway: &G, out: &mut dyn Write) -> Result<()>
where
    G: CompletionGateway + ?Sized,
{
    match &prepared.mode {
        Mode::Complete => {
            let completion = gateway.complete(&prepared.request).await?;
            if prepared.verbose {
                writeln!(out, "{}", completion.details.to_pretty_json())
                    .context("Failed to write response details")?;
            }
            info!(
                content_len = completion.response.content.len(),
                total_tokens = completion.response.metadata.total_tokens,
                "query completed"
            );
            emit(prepared, &completion.response.content, out)
        }
        Mode::Stream(options) => {
            let mut stream = gateway.stream(&prepared.request.prompt, options).await?;
            if prepared.output.is_some() {
                let text = stream.collect_text().await?;
                let text = if text.trim().is_empty() {
                    EMPTY_RESPONSE_TEXT
                } else {
                    text.as_str()
                };
                return emit(prepared, text, out);
            }

            let mut wrote_text = false;
            while let Some(chunk) = stream.next_chunk().await? {
                wrote_text |= !chunk.trim().is_empty();
                write!(out, "{chunk}").context("Failed to write streamed response")?;
                out.flush().context("Failed to write streamed response")?;
            }
            if !wrote_text {
                write!(out, "{EMPTY_RESPONSE_TEXT}").context("Failed to write streamed response")?;
            }
            writeln!(out).context("Failed to write streamed response")?;
            Ok(())
        }
    }
}

fn emit(prepared: &PreparedQuery, content: &str, out: &mut dyn Write) -> Result<()> {
    match &prepared.output {
        Some(path) => {
            fs::write(path, content).map_err(|err| QxError::from_file_error(path, err))?;
            writeln!(out, "Response saved to: {}", path.display())
                .context("Failed to write confirmation")?;
        }
        None => {
            writeln!(out, "{content}").context("Failed to write response")?;
        }
    }
    Ok(())
}

/// Prepares the query, then connects and runs it. `connect` is only invoked
/// once every local check has passed.
pub async fn handle<G, F>(
    cli: &Cli,
    stdin: Option<&str>,
    config: &Configuration,
    connect: F,
    out: &mut dyn Write,
) -> Result<()>
where
    G: CompletionGateway,
    F: FnOnce(&Configuration) -> Result<G, QxError>,
{
    let prepared = prepare(cli, stdin, config)?;
    let gateway = connect(config)?;
    execute(&prepared, &gateway, out).await
}

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod license;
pub mod logging;
pub mod model;
pub mod options;
pub mod providers;
pub mod retry;
pub mod tools;

use std::io::{self, IsTerminal, Read, Write};

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use tracing::info;

use cli::Cli;
use config::Configuration;
use error::{EXIT_GENERAL, EXIT_SUCCESS, QxError, exit_code_for};
use license::LicenseInfo;
use providers::openai::OpenAiService;

/// Runs one invocation and returns the process exit code.
pub async fn run() -> u8 {
    dotenvy::dotenv().ok();

    let cfg = Configuration::from_env();
    logging::init(cfg.debug_mode);
    info!(
        model = %cfg.options.default_model,
        base_url = cfg.base_url(),
        has_api_key = cfg.has_api_key(),
        debug = cfg.debug_mode,
        timeout_secs = cfg.options.default_timeout.as_secs(),
        "loaded runtime configuration"
    );

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
                _ => EXIT_GENERAL,
            };
        }
    };

    let info = LicenseInfo::collect();
    if cli.version {
        println!("{}", info.version_text());
        return EXIT_SUCCESS;
    }
    if cli.license {
        println!("{}", info.license_text());
        return EXIT_SUCCESS;
    }

    match dispatch(&cli, &cfg).await {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            exit_code_for(&err)
        }
    }
}

async fn dispatch(cli: &Cli, cfg: &Configuration) -> anyhow::Result<()> {
    let stdin = read_piped_stdin()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    handler::handle(
        cli,
        stdin.as_deref(),
        cfg,
        |config| OpenAiService::new(config.clone()),
        &mut out,
    )
    .await?;
    out.flush().context("failed to flush stdout")
}

fn read_piped_stdin() -> anyhow::Result<Option<String>> {
    let mut stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buf = String::new();
    stdin
        .read_to_string(&mut buf)
        .map_err(QxError::Io)
        .context("failed to read standard input")?;
    Ok(Some(buf))
}

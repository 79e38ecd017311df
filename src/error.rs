use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_GENERAL: u8 = 1;
pub const EXIT_API: u8 = 2;
pub const EXIT_NETWORK: u8 = 3;
pub const EXIT_FILE_ACCESS: u8 = 4;
pub const EXIT_IO: u8 = 5;
pub const EXIT_TIMEOUT: u8 = 124;

/// A single out-of-range or missing option value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: String,
        max: String,
        value: String,
    },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("model '{model}' is not in the allowed model list")]
    ModelNotAllowed { model: String },

    #[error("{flag} cannot be combined with --stream")]
    StreamConflict { flag: &'static str },
}

impl ValidationError {
    pub(crate) fn out_of_range(
        field: &'static str,
        min: impl ToString,
        max: impl ToString,
        value: impl ToString,
    ) -> Self {
        Self::OutOfRange {
            field,
            min: min.to_string(),
            max: max.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QxError {
    #[error("Invalid option: {0}")]
    Validation(#[from] ValidationError),

    #[error("Prompt cannot be empty.")]
    EmptyPrompt,

    #[error("OPENAI_API_KEY environment variable is not set")]
    MissingApiKey,

    #[error("OpenAI API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("OpenAI API rate limit exceeded: {message}")]
    RateLimited { message: String },

    #[error("Model response failed: {0}")]
    ModelFailed(String),

    #[error("{0}")]
    Network(String),

    #[error("Query timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("{last_error} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<QxError>,
    },

    #[error("Cannot access '{}': {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected response from OpenAI API: {0}")]
    InvalidResponse(String),
}

impl QxError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::EmptyPrompt | Self::InvalidResponse(_) => EXIT_GENERAL,
            Self::Api { .. } | Self::RateLimited { .. } | Self::ModelFailed(_) => EXIT_API,
            Self::MissingApiKey | Self::Network(_) => EXIT_NETWORK,
            Self::FileAccess { .. } => EXIT_FILE_ACCESS,
            Self::Io(_) => EXIT_IO,
            Self::Timeout { .. } => EXIT_TIMEOUT,
            Self::RetriesExhausted { last_error, .. } => last_error.exit_code(),
        }
    }

    /// Classifies a failed write/read of a user-supplied path.
    pub fn from_file_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound
            | ErrorKind::PermissionDenied
            | ErrorKind::IsADirectory
            | ErrorKind::NotADirectory
            | ErrorKind::ReadOnlyFilesystem => Self::FileAccess {
                path: path.into(),
                source: err,
            },
            _ => Self::Io(err),
        }
    }
}

pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(qx_err) = cause.downcast_ref::<QxError>() {
            return qx_err.exit_code();
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return EXIT_IO;
        }
    }
    EXIT_GENERAL
}

use std::error::Error as StdError;
use std::io::ErrorKind;

use reqwest::StatusCode;

use crate::error::QxError;

fn error_chain_has_kind(err: &(dyn StdError + 'static), kind: ErrorKind, needle: &str) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(source) = current {
        if let Some(io_err) = source.downcast_ref::<std::io::Error>()
            && io_err.kind() == kind
        {
            return true;
        }

        if source.to_string().to_ascii_lowercase().contains(needle) {
            return true;
        }

        current = source.source();
    }

    false
}

/// Maps a transport failure onto the timeout or network class.
pub(crate) fn request_error(err: reqwest::Error, api_url: &str, timeout_secs: u64) -> QxError {
    if err.is_timeout() || error_chain_has_kind(&err, ErrorKind::TimedOut, "timed out") {
        return QxError::Timeout {
            seconds: timeout_secs,
        };
    }

    if err.is_connect() {
        if error_chain_has_kind(&err, ErrorKind::ConnectionRefused, "connection refused") {
            return QxError::Network(format!(
                "Connection refused by OpenAI API at '{api_url}'. \
                 Check OPENAI_API_BASE_URL and network connectivity."
            ));
        }

        return QxError::Network(format!(
            "Failed to connect to OpenAI API at '{api_url}'. \
             Check OPENAI_API_BASE_URL and network connectivity."
        ));
    }

    QxError::Network(format!("Failed to call OpenAI API at '{api_url}': {err}"))
}

/// Maps a non-success HTTP status plus its body onto the API error class.
pub(crate) fn status_error(status: StatusCode, body: &str) -> QxError {
    let message = api_error_message(body).unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        } else {
            trimmed.to_string()
        }
    });

    if status == StatusCode::TOO_MANY_REQUESTS {
        QxError::RateLimited { message }
    } else {
        QxError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Pulls `error.message` out of an OpenAI error envelope.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

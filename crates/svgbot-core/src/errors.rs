use std::path::PathBuf;

use crate::formatting::{escape_html, truncate_chars};

const MAX_ERROR_DETAIL: usize = 200;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so every sub-flow
/// can turn a failure into exactly one user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("optimization error: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },
}

/// Payload rejected before any optimization or disk write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("markup is not svg")]
    NotSvgMarkup,

    #[error("file {0} is not svg")]
    NotSvgFile(String),

    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("file {0} is already being processed")]
    Busy(String),
}

/// Failure reported by an `SvgOptimizer`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptimizeError {
    #[error("malformed svg at byte {position}: {reason}")]
    Malformed { position: u64, reason: String },

    #[error("root element is not <svg>")]
    NotSvg,

    #[error("optimizer produced empty output")]
    Empty,

    #[error("optimizer failed: {0}")]
    Engine(String),
}

impl Error {
    /// The single Telegram HTML message shown to the user for this failure.
    pub fn user_html(&self) -> String {
        match self {
            Error::Validation(ValidationError::NotSvgMarkup) => {
                "This is not the svg. Please, send svg.".to_string()
            }
            Error::Validation(ValidationError::NotSvgFile(name)) => {
                format!("File <code>{}</code> isn't svg", escape_html(name))
            }
            Error::Validation(ValidationError::TooLarge { limit, .. }) => format!(
                "File is too large. Maximum size is {} KB.",
                limit / 1024
            ),
            Error::Validation(ValidationError::Busy(name)) => format!(
                "File <code>{}</code> is already being minified, please wait.",
                escape_html(name)
            ),
            Error::Optimize(e) => error_detail(&e.to_string()),
            other => error_detail(&other.to_string()),
        }
    }
}

fn error_detail(detail: &str) -> String {
    format!(
        "Error: <code>{}</code>",
        escape_html(&truncate_chars(detail, MAX_ERROR_DETAIL))
    )
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_match_bot_wording() {
        assert_eq!(
            Error::from(ValidationError::NotSvgMarkup).user_html(),
            "This is not the svg. Please, send svg."
        );
        assert_eq!(
            Error::from(ValidationError::NotSvgFile("photo.png".to_string())).user_html(),
            "File <code>photo.png</code> isn't svg"
        );
    }

    #[test]
    fn error_detail_is_escaped_and_truncated() {
        let err = Error::Transport(format!("<bad>{}", "x".repeat(500)));
        let html = err.user_html();
        assert!(html.starts_with("Error: <code>transport error: &lt;bad&gt;"));
        assert!(html.len() < 300);
    }

    #[test]
    fn optimize_errors_surface_reason() {
        let err = Error::from(OptimizeError::Malformed {
            position: 12,
            reason: "unclosed element".to_string(),
        });
        assert!(err.user_html().contains("unclosed element"));
    }
}

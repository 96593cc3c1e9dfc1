use std::fmt;

use serde::Serialize;

use crate::dsl::error::{CompileError, ErrorKind};
use crate::settings::SettingsError;

/// Structured error type for the `dialoguec` host. Serializes with a `code`
/// tag so `--json` consumers can match on it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    IoError { message: String },
    ConfigError { message: String },
    CompileError {
        stage: ErrorKind,
        line: Option<u32>,
        message: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::IoError { message } => write!(f, "I/O error: {message}"),
            AppError::ConfigError { message } => write!(f, "Config error: {message}"),
            AppError::CompileError { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        AppError::ConfigError {
            message: e.to_string(),
        }
    }
}

impl From<CompileError> for AppError {
    fn from(e: CompileError) -> Self {
        AppError::CompileError {
            stage: e.kind(),
            line: e.line(),
            message: e.to_string(),
        }
    }
}

//! Error types for Studio Core

use thiserror::Error;

use crate::models::TimeSpan;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        /// Alternative windows on the same date, earliest first
        suggestions: Vec<TimeSpan>,
    },

    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Only ever logged; history failures never reach the caller
    #[error("History write failed: {0}")]
    HistoryWrite(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Error::PermissionDenied(msg.into())
    }

    /// Human-readable message suitable for the caller
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(msg) | Error::PermissionDenied(msg) | Error::NotFound(msg) => {
                msg.clone()
            }
            Error::Conflict {
                message,
                suggestions,
            } if !suggestions.is_empty() => {
                let windows: Vec<String> = suggestions.iter().map(|s| s.to_string()).collect();
                format!("{message} Available: {}", windows.join(", "))
            }
            Error::Conflict { message, .. } => message.clone(),
            Error::Persistence(_) => "The booking could not be saved. Please try again.".into(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

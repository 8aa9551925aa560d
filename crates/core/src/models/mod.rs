//! Data models for Studio

mod actor;
mod booking;
mod catalog;
mod history;

pub use actor::*;
pub use booking::*;
pub use catalog::*;
pub use history::*;

/// A stored or submitted value that names no known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

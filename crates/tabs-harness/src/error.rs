//! Harness error type.

use tabs_core::TabsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Tabs(#[from] TabsError),
    #[error("invalid scenario configuration: {0}")]
    InvalidConfig(String),
}

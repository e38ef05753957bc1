//! Error types for the table harness

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Port {0} is still bound after reset")]
    PortBusy(u16),

    #[error("{target} not reachable after {waited:?}: {last_error}")]
    Unreachable {
        target: String,
        waited: Duration,
        last_error: String,
    },

    #[error("chromedriver failed to start: {0}")]
    ChromeDriverStartup(String),

    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("WebDriver session not created: {0}")]
    SessionNotCreated(#[from] fantoccini::error::NewSessionError),

    #[error("Navigation to {url} failed after {attempts} attempts: {last_error}")]
    NavigationFailed {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Unexpected table location {url}: {reason}")]
    ProtocolShape { url: String, reason: String },

    #[error("Element not found: {locator} (waited {waited:?})")]
    ElementNotFound { locator: String, waited: Duration },

    #[error("Player {ordinal}: invalid session transition {from} -> {to}")]
    InvalidState {
        ordinal: u8,
        from: String,
        to: String,
    },

    #[error("Player ordinal {0} is outside 0..=3")]
    InvalidOrdinal(u8),

    #[error("Interrupted during {0}")]
    Interrupted(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Process exit status used by the harness binaries.
    pub fn exit_code(&self) -> i32 {
        match self {
            E2eError::Config(_) | E2eError::Toml(_) => 2,
            _ => 1,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

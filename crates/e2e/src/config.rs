//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Top-level harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Dev server process settings
    pub servers: ServerConfig,

    /// Readiness probing
    pub readiness: ReadinessConfig,

    /// chromedriver and session settings
    pub browser: BrowserConfig,

    /// Bootstrap protocol timing
    pub bootstrap: BootstrapConfig,

    /// UI contract of the game client
    pub contract: FormContract,

    /// Hold-open behavior
    pub operator: OperatorConfig,
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.servers.frontend_port == self.servers.realtime_port {
            return Err(E2eError::Config(format!(
                "frontend and realtime servers share port {}",
                self.servers.frontend_port
            )));
        }
        if self.browser.navigation_attempts == 0 {
            return Err(E2eError::Config(
                "browser.navigation_attempts must be at least 1".to_string(),
            ));
        }
        if self.readiness.poll_interval_ms == 0 || self.bootstrap.poll_interval_ms == 0 {
            return Err(E2eError::Config("poll intervals must be non-zero".to_string()));
        }
        if self.contract.table_segment.trim_matches('/').is_empty() {
            return Err(E2eError::Config("contract.table_segment is empty".to_string()));
        }
        Ok(())
    }

    /// Root URL of the web client
    pub fn frontend_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.servers.host, self.servers.frontend_port, self.contract.app_path
        )
    }
}

/// Dev server process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Shell command that starts the realtime server and the asset server together
    pub start_command: String,

    /// Working directory for the start command (None = current directory)
    pub working_dir: Option<PathBuf>,

    /// Combined stdout/stderr of the dev servers
    pub log_path: PathBuf,

    pub host: String,

    /// Web asset (Vite) server port
    pub frontend_port: u16,

    /// Realtime game server port
    pub realtime_port: u16,

    /// Kill whatever holds the two ports before starting
    pub reset_ports: bool,

    /// Leave the dev servers running after teardown
    pub keep_running: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            start_command: "npm run dev:all".to_string(),
            working_dir: None,
            log_path: PathBuf::from("server.log"),
            host: "localhost".to_string(),
            frontend_port: 5173,
            realtime_port: 8080,
            reset_ports: true,
            keep_running: false,
        }
    }
}

impl ServerConfig {
    pub fn ports(&self) -> [u16; 2] {
        [self.realtime_port, self.frontend_port]
    }
}

/// How the harness decides the servers are up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReadinessMode {
    /// Poll HTTP then TCP until both answer
    #[default]
    Active,
    /// Sleep a fixed budget and proceed unconditionally
    FixedDelay,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub mode: ReadinessMode,

    /// Max seconds to wait for each server
    pub startup_timeout_secs: u64,

    pub poll_interval_ms: u64,

    /// Overrides the scenario's legacy delay in fixed-delay mode
    pub fixed_delay_secs: Option<u64>,

    /// Secondary asset requested when the root is not ready yet
    pub fallback_path: String,

    pub http_request_timeout_ms: u64,

    pub tcp_connect_timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            mode: ReadinessMode::Active,
            startup_timeout_secs: 45,
            poll_interval_ms: 1500,
            fixed_delay_secs: None,
            fallback_path: "/index.html".to_string(),
            http_request_timeout_ms: 3000,
            tcp_connect_timeout_ms: 2000,
        }
    }
}

impl ReadinessConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to the chromedriver binary
    pub chromedriver_path: PathBuf,

    /// chromedriver port (None = find free port)
    pub chromedriver_port: Option<u16>,

    pub chromedriver_startup_timeout_secs: u64,

    pub headless: bool,

    /// Extra Chrome command line switches
    pub extra_args: Vec<String>,

    pub navigation_attempts: u32,

    pub navigation_backoff_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chromedriver_path: PathBuf::from("./chromedriver"),
            chromedriver_port: None,
            chromedriver_startup_timeout_secs: 15,
            headless: false,
            extra_args: Vec::new(),
            navigation_attempts: 10,
            navigation_backoff_ms: 1200,
        }
    }
}

impl BrowserConfig {
    pub fn navigation_backoff(&self) -> Duration {
        Duration::from_millis(self.navigation_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Pause before each joiner opens
    pub join_stagger_ms: u64,

    /// Upper bound for create-table form elements
    pub element_timeout_ms: u64,

    /// Upper bound for the username prompt after clicking join
    pub name_prompt_timeout_ms: u64,

    /// Upper bound for the creator's URL to reach the table page
    pub table_url_timeout_ms: u64,

    pub poll_interval_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            join_stagger_ms: 600,
            element_timeout_ms: 15_000,
            name_prompt_timeout_ms: 2_000,
            table_url_timeout_ms: 15_000,
            poll_interval_ms: 250,
        }
    }
}

impl BootstrapConfig {
    pub fn join_stagger(&self) -> Duration {
        Duration::from_millis(self.join_stagger_ms)
    }
}

/// Selectors and URL shape the game client exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormContract {
    pub app_path: String,
    pub invite_code_input: String,
    pub join_button: String,
    pub username_input: String,
    pub continue_button: String,
    pub create_button: String,
    /// Path segment that marks a table page, e.g. `/table/ABCD`
    pub table_segment: String,
}

impl Default for FormContract {
    fn default() -> Self {
        Self {
            app_path: "/".to_string(),
            invite_code_input: "input#inviteCode".to_string(),
            join_button: "//button[contains(text(), 'Join Table')]".to_string(),
            username_input: "input[type='text'][placeholder='Your username']".to_string(),
            continue_button:
                "//button[contains(text(), 'Continue') or contains(text(), 'Save')]".to_string(),
            create_button: "//button[contains(text(), 'Create Table')]".to_string(),
            table_segment: "/table/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Release the hold automatically after this many seconds
    pub auto_continue_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dev_setup() {
        let config = HarnessConfig::default();
        assert_eq!(config.servers.ports(), [8080, 5173]);
        assert_eq!(config.frontend_url(), "http://localhost:5173/");
        assert_eq!(config.readiness.startup_timeout(), Duration::from_secs(45));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
[servers]
frontend_port = 3000

[readiness]
mode = "fixed-delay"
fixed_delay_secs = 9
"#,
        )
        .unwrap();

        assert_eq!(config.servers.frontend_port, 3000);
        assert_eq!(config.servers.realtime_port, 8080);
        assert_eq!(config.readiness.mode, ReadinessMode::FixedDelay);
        assert_eq!(config.readiness.fixed_delay_secs, Some(9));
        assert_eq!(config.bootstrap.join_stagger_ms, 600);
    }

    #[test]
    fn test_validate_rejects_shared_port() {
        let mut config = HarnessConfig::default();
        config.servers.frontend_port = 8080;
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.browser.navigation_attempts, 10);
    }
}

//! Shared entry point for the scenario binaries

use std::path::PathBuf;
use clap::builder::BoolishValueParser;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{HarnessConfig, ReadinessMode};
use crate::error::E2eResult;
use crate::orchestrator::{Orchestrator, RunReport};
use crate::scenario::Scenario;
use crate::webdriver::ChromeLauncher;

/// Every option can be set through its environment variable instead.
#[derive(Parser, Debug, Default)]
#[command(version)]
#[command(about = "Boots the mahjong dev servers and seats four browser players at one table")]
pub struct HarnessArgs {
    /// TOML configuration file (ignored when missing)
    #[arg(long, env = "MAHJONG_HARNESS_CONFIG", default_value = "mahjong-harness.toml")]
    pub config: PathBuf,

    /// Command that starts both dev servers
    #[arg(long, env = "MAHJONG_START_COMMAND")]
    pub start_command: Option<String>,

    /// Web asset server port
    #[arg(long, env = "MAHJONG_FRONTEND_PORT")]
    pub frontend_port: Option<u16>,

    /// Realtime game server port
    #[arg(long, env = "MAHJONG_REALTIME_PORT")]
    pub realtime_port: Option<u16>,

    /// Where the dev servers' output goes
    #[arg(long, env = "MAHJONG_SERVER_LOG")]
    pub server_log: Option<PathBuf>,

    /// active: poll until the servers answer; fixed-delay: sleep and hope
    #[arg(long, env = "MAHJONG_READINESS", value_enum)]
    pub readiness: Option<ReadinessMode>,

    /// Seconds to wait for each server
    #[arg(long, env = "MAHJONG_STARTUP_TIMEOUT")]
    pub startup_timeout: Option<u64>,

    /// Path to chromedriver
    #[arg(long, env = "MAHJONG_CHROMEDRIVER")]
    pub chromedriver: Option<PathBuf>,

    #[arg(long, env = "MAHJONG_HEADLESS", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub headless: Option<bool>,

    /// Release the hold-open phase after this many seconds
    #[arg(long, env = "MAHJONG_AUTO_CONTINUE")]
    pub auto_continue: Option<u64>,

    /// Leave the dev servers running after the browsers close
    #[arg(long, env = "MAHJONG_KEEP_SERVERS", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub keep_servers: Option<bool>,

    /// Do not kill existing listeners on the server ports
    #[arg(long, env = "MAHJONG_SKIP_RESET", value_parser = BoolishValueParser::new(),
          num_args = 0..=1, default_missing_value = "true")]
    pub skip_reset: Option<bool>,
}

impl HarnessArgs {
    /// File configuration with these overrides applied
    pub fn into_config(self) -> E2eResult<HarnessConfig> {
        let mut config = HarnessConfig::load(&self.config)?;

        if let Some(cmd) = self.start_command {
            config.servers.start_command = cmd;
        }
        if let Some(port) = self.frontend_port {
            config.servers.frontend_port = port;
        }
        if let Some(port) = self.realtime_port {
            config.servers.realtime_port = port;
        }
        if let Some(path) = self.server_log {
            config.servers.log_path = path;
        }
        if let Some(mode) = self.readiness {
            config.readiness.mode = mode;
        }
        if let Some(secs) = self.startup_timeout {
            config.readiness.startup_timeout_secs = secs;
        }
        if let Some(path) = self.chromedriver {
            config.browser.chromedriver_path = path;
        }
        if let Some(headless) = self.headless {
            config.browser.headless = headless;
        }
        if let Some(secs) = self.auto_continue {
            config.operator.auto_continue_secs = Some(secs);
        }
        if let Some(keep) = self.keep_servers {
            config.servers.keep_running = keep;
        }
        if let Some(skip) = self.skip_reset {
            config.servers.reset_ports = !skip;
        }

        config.validate()?;
        Ok(config)
    }
}

pub async fn run(scenario: Scenario, args: HarnessArgs) -> E2eResult<RunReport> {
    let config = args.into_config()?;
    let launcher = ChromeLauncher::new(config.browser.clone());
    let mut orchestrator = Orchestrator::new(config, scenario);
    orchestrator.run(&launcher).await
}

/// Process entry for one scenario binary. Exits non-zero on any fatal error.
pub fn main(scenario: Scenario) -> ! {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = HarnessArgs::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    match rt.block_on(run(scenario, args)) {
        Ok(report) => {
            info!(
                "{} run finished: {} players at table {} ({} ms)",
                report.scenario, report.players, report.invite_code, report.duration_ms
            );
            std::process::exit(0);
        }
        Err(e) => {
            error!("ERROR: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

//! Top-level run: servers up, players seated, hold for the operator, tear down

use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::actor::InviteCode;
use crate::bootstrap::{SessionRegistry, TableBootstrapProtocol};
use crate::browser::BrowserLauncher;
use crate::config::{HarnessConfig, ReadinessMode};
use crate::error::{E2eError, E2eResult};
use crate::gate::{GateReleaser, Interrupt, OperatorGate, Release};
use crate::probe::{fixed_delay, ReadinessProbe, ReadinessTarget};
use crate::scenario::Scenario;
use crate::server::{ProcessLifecycleManager, ServerProcessHandle};

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub scenario: Scenario,
    pub invite_code: InviteCode,
    pub players: usize,
    pub release: Release,
    pub duration_ms: u64,
}

pub struct Orchestrator {
    config: HarnessConfig,
    scenario: Scenario,
    gate: OperatorGate,
    interrupt: Interrupt,
}

impl Orchestrator {
    pub fn new(config: HarnessConfig, scenario: Scenario) -> Self {
        let gate = OperatorGate::new().with_auto_continue(
            config.operator.auto_continue_secs.map(Duration::from_secs),
        );
        Self {
            config,
            scenario,
            gate,
            interrupt: Interrupt::new(),
        }
    }

    pub fn with_gate(mut self, gate: OperatorGate) -> Self {
        self.gate = gate;
        self
    }

    /// Lets another task end the hold-open phase
    pub fn releaser(&self) -> GateReleaser {
        self.gate.releaser()
    }

    /// Aborts the run as Ctrl-C would, from server start until the hold-open phase
    pub fn interrupter(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub async fn run<L: BrowserLauncher>(&mut self, launcher: &L) -> E2eResult<RunReport> {
        let start = Instant::now();
        info!("Running {} scenario", self.scenario);

        let lifecycle = ProcessLifecycleManager::new(self.config.servers.clone());
        if self.config.servers.reset_ports {
            lifecycle.reset().await?;
        }

        // The servers run in their own process group, so the terminal's SIGINT
        // only reaches this process. From here on it must end in finish_servers.
        let servers = lifecycle.start(&self.scenario.flags())?;

        let ready = tokio::select! {
            ready = self.wait_for_servers() => ready,
            _ = self.interrupt.wait() => Err(E2eError::Interrupted("readiness".to_string())),
        };
        if let Err(e) = ready {
            error!(
                "Servers did not come up: {} (see {})",
                e,
                servers.log_path().display()
            );
            self.finish_servers(servers);
            return Err(e);
        }
        info!("Servers restarted. Proceeding with browser automation...");

        let mut registry = SessionRegistry::new();
        let mut protocol = TableBootstrapProtocol::from_config(&self.config);

        let outcome = tokio::select! {
            outcome = protocol.run(launcher, &mut registry) => outcome,
            _ = self.interrupt.wait() => Err(E2eError::Interrupted("table bootstrap".to_string())),
        };

        let result = match outcome {
            Ok(code) => {
                println!("{}", self.scenario.banner());
                println!("Invite code: {}. You can now test by hand in each window.", code);
                let release = self.gate.wait().await;
                Ok((code, release))
            }
            Err(e) => {
                error!("Bootstrap failed during {:?}: {}", protocol.phase(), e);
                Err(e)
            }
        };

        // Teardown runs on every path past server start
        let players = registry.close_all().await;
        launcher.shutdown().await;
        self.finish_servers(servers);

        let (invite_code, release) = result?;
        Ok(RunReport {
            scenario: self.scenario,
            invite_code,
            players,
            release,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Frontend over HTTP first, then the realtime server over TCP
    async fn wait_for_servers(&self) -> E2eResult<()> {
        let readiness = &self.config.readiness;
        let servers = &self.config.servers;

        match readiness.mode {
            ReadinessMode::FixedDelay => {
                let delay = readiness
                    .fixed_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| self.scenario.legacy_startup_delay());
                fixed_delay(delay).await;
            }
            ReadinessMode::Active => {
                info!("Polling for frontend & websocket readiness...");
                let probe = ReadinessProbe::from_config(readiness)?;

                let frontend = ReadinessTarget::http(
                    servers.host.clone(),
                    servers.frontend_port,
                    self.config.contract.app_path.clone(),
                )
                .with_fallback_path(readiness.fallback_path.clone())
                .with_config(readiness);
                probe.wait_until_ready(frontend).await?;

                let realtime = ReadinessTarget::tcp(servers.host.clone(), servers.realtime_port)
                    .with_config(readiness);
                probe.wait_until_ready(realtime).await?;
            }
        }

        info!("Servers ready.");
        Ok(())
    }

    fn finish_servers(&self, mut servers: ServerProcessHandle) {
        if self.config.servers.keep_running {
            servers.detach();
        } else if let Err(e) = servers.stop() {
            warn!("Stopping servers failed: {}", e);
        }
    }
}

//! Dev server lifecycle - clearing the well-known ports and launching the servers

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command as TokioCommand;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{E2eError, E2eResult};
use crate::flags::ServerFeatureFlags;
use crate::probe::is_listening;

const PORT_RELEASE_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Starts and stops the combined realtime + asset server process group
pub struct ProcessLifecycleManager {
    config: ServerConfig,
}

impl ProcessLifecycleManager {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Kill whatever listens on the two well-known ports, then confirm both are free.
    ///
    /// Covers servers left behind by an earlier run that this process never owned.
    pub async fn reset(&self) -> E2eResult<()> {
        let ports = self.config.ports();
        info!("Killing servers on ports {} and {}...", ports[0], ports[1]);

        for port in ports {
            for pid in listening_pids(port).await {
                if pid == std::process::id() {
                    warn!("Port {} is held by this harness itself, not killing", port);
                    continue;
                }
                info!("Killing pid {} on port {}", pid, port);
                force_kill(pid);
            }
        }

        for port in ports {
            self.wait_port_released(port).await?;
        }
        Ok(())
    }

    async fn wait_port_released(&self, port: u16) -> E2eResult<()> {
        let start = Instant::now();
        while is_listening(&self.config.host, port, Duration::from_millis(500)).await {
            if start.elapsed() >= PORT_RELEASE_TIMEOUT {
                return Err(E2eError::PortBusy(port));
            }
            sleep(Duration::from_millis(100)).await;
        }
        debug!("Port {} is free", port);
        Ok(())
    }

    /// Launch the dev servers in the background with `flags` in their environment.
    ///
    /// Returns as soon as the process is spawned; readiness is checked separately.
    pub fn start(&self, flags: &ServerFeatureFlags) -> E2eResult<ServerProcessHandle> {
        info!(
            "Starting servers with '{}' (flags: {})",
            self.config.start_command, flags
        );

        let log = File::create(&self.config.log_path).map_err(|e| {
            E2eError::ServerStartup(format!(
                "cannot open log {}: {}",
                self.config.log_path.display(),
                e
            ))
        })?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.config.start_command);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        flags.apply(&mut cmd);

        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));

        // Own process group so stop() reaches npm's children too
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| {
            E2eError::ServerStartup(format!("failed to spawn '{}': {}", self.config.start_command, e))
        })?;

        info!(
            "Servers spawned (pid: {}), output in {}",
            child.id(),
            self.config.log_path.display()
        );

        Ok(ServerProcessHandle {
            child,
            log_path: self.config.log_path.clone(),
            ports: self.config.ports(),
            stopped: false,
            detached: false,
        })
    }
}

/// Handle to the spawned dev server process group
pub struct ServerProcessHandle {
    child: Child,
    log_path: PathBuf,
    ports: [u16; 2],
    stopped: bool,
    detached: bool,
}

impl ServerProcessHandle {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Whether the launcher shell is still alive
    pub fn is_running(&mut self) -> bool {
        !self.stopped && matches!(self.child.try_wait(), Ok(None))
    }

    /// Block until the launcher shell exits on its own
    pub fn wait(&mut self) -> E2eResult<std::process::ExitStatus> {
        let status = self.child.wait()?;
        self.stopped = true;
        Ok(status)
    }

    /// Leave the servers running after this handle is dropped
    pub fn detach(mut self) {
        info!(
            "Leaving servers running (pid: {}, ports {} and {})",
            self.child.id(),
            self.ports[0],
            self.ports[1]
        );
        self.detached = true;
    }

    /// Stop the process group: SIGTERM, a short grace period, then SIGKILL
    pub fn stop(&mut self) -> E2eResult<()> {
        if self.stopped {
            return Ok(());
        }
        info!("Stopping servers (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            let pgid = Pid::from_raw(self.child.id() as i32);
            if killpg(pgid, Signal::SIGTERM).is_ok() {
                let deadline = Instant::now() + STOP_GRACE;
                while Instant::now() < deadline {
                    if let Ok(Some(_)) = self.child.try_wait() {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
            let _ = killpg(pgid, Signal::SIGKILL);
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
        self.stopped = true;

        Ok(())
    }
}

impl Drop for ServerProcessHandle {
    fn drop(&mut self) {
        if !self.detached {
            let _ = self.stop();
        }
    }
}

/// Pids listening on a TCP port, via `lsof`. Empty when lsof is unavailable.
async fn listening_pids(port: u16) -> Vec<u32> {
    let output = TokioCommand::new("lsof")
        .args(["-t", "-sTCP:LISTEN", &format!("-iTCP:{}", port)])
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        // lsof exits 1 when nothing matches
        Ok(output) => parse_pids(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            warn!("lsof unavailable, cannot scan port {}: {}", port, e);
            Vec::new()
        }
    }
}

fn parse_pids(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

fn force_kill(pid: u32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("kill {} failed: {}", pid, e);
        }
    }
    #[cfg(not(unix))]
    {
        warn!("Cannot kill pid {} on this platform", pid);
    }
}

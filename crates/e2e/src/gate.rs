//! Hold-open point between bootstrap and teardown

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{info, warn};

/// What let the run proceed to teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Enter pressed
    Operator,
    /// stdin reached EOF
    StdinClosed,
    /// Ctrl-C
    Interrupted,
    /// A `GateReleaser` fired
    Synthetic,
    /// Auto-continue timer elapsed
    Timer,
}

/// Releases an `OperatorGate` from anywhere, before or during its wait
#[derive(Clone)]
pub struct GateReleaser {
    tx: Arc<watch::Sender<bool>>,
}

impl GateReleaser {
    pub fn release(&self) {
        self.tx.send_replace(true);
    }
}

/// Ctrl-C, or a programmatic stand-in for it. Cloned handles share one trigger.
#[derive(Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves on the first Ctrl-C or `trigger()`, including one that already happened
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        tokio::select! {
            _ = rx.wait_for(|triggered| *triggered) => {}
            _ = tokio::signal::ctrl_c() => {
                self.trigger();
            }
        }
    }
}

/// Suspends the run until the operator (or something standing in for them) says continue
pub struct OperatorGate {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    read_stdin: bool,
    auto_continue: Option<Duration>,
}

impl Default for OperatorGate {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorGate {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            read_stdin: true,
            auto_continue: None,
        }
    }

    /// Ignore the keyboard; only releasers, Ctrl-C and the timer count
    pub fn without_stdin(mut self) -> Self {
        self.read_stdin = false;
        self
    }

    pub fn with_auto_continue(mut self, after: Option<Duration>) -> Self {
        self.auto_continue = after;
        self
    }

    pub fn releaser(&self) -> GateReleaser {
        GateReleaser {
            tx: self.tx.clone(),
        }
    }

    pub async fn wait(&mut self) -> Release {
        if self.read_stdin {
            println!("Press Enter to close all browsers...");
        }
        if let Some(after) = self.auto_continue {
            info!("Continuing automatically in {:?}", after);
        }

        let auto_continue = self.auto_continue;
        let timer = async move {
            match auto_continue {
                Some(after) => sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

        let read_stdin = self.read_stdin;
        let release = tokio::select! {
            // The gate holds a sender itself, so this only resolves on release
            _ = self.rx.wait_for(|released| *released) => Release::Synthetic,
            line = read_line(), if read_stdin => line,
            _ = tokio::signal::ctrl_c() => Release::Interrupted,
            _ = timer => Release::Timer,
        };

        info!("Released ({:?}), tearing down", release);
        release
    }
}

async fn read_line() -> Release {
    let mut line = String::new();
    match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
        Ok(0) => {
            warn!("stdin closed; continuing to teardown");
            Release::StdinClosed
        }
        Ok(_) => Release::Operator,
        Err(e) => {
            warn!("Reading stdin failed: {}", e);
            Release::StdinClosed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_release_before_wait() {
        let mut gate = OperatorGate::new().without_stdin();
        gate.releaser().release();
        assert_eq!(gate.wait().await, Release::Synthetic);
    }

    #[tokio::test]
    async fn test_release_from_task() {
        let mut gate = OperatorGate::new().without_stdin();
        let releaser = gate.releaser();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            releaser.release();
        });
        assert_eq!(gate.wait().await, Release::Synthetic);
    }

    #[tokio::test]
    async fn test_interrupt_seen_by_every_clone() {
        let interrupt = Interrupt::new();
        let other = interrupt.clone();
        interrupt.trigger();
        tokio::time::timeout(Duration::from_secs(1), other.wait())
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), interrupt.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_auto_continue() {
        let mut gate = OperatorGate::new()
            .without_stdin()
            .with_auto_continue(Some(Duration::from_millis(10)));
        assert_eq!(gate.wait().await, Release::Timer);
    }
}

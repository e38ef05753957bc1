//! Readiness probing - proving the dev servers accept connections

use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::ReadinessConfig;
use crate::error::{E2eError, E2eResult};

/// Statuses that prove a listener is up even though the page is not final.
/// A cold dev server answers 404 or redirects before assets are built.
pub const REACHABLE_STATUSES: [u16; 6] = [301, 302, 303, 307, 308, 404];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeProtocol {
    Http,
    Tcp,
}

/// One dependent service to wait for. Consumed by a single probe run.
#[derive(Debug, Clone)]
pub struct ReadinessTarget {
    pub protocol: ProbeProtocol,
    pub host: String,
    pub port: u16,
    pub path: Option<String>,
    /// Requested within the same attempt when `path` is not ready
    pub fallback_path: Option<String>,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ReadinessTarget {
    pub fn http(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            protocol: ProbeProtocol::Http,
            host: host.into(),
            port,
            path: Some(path.into()),
            fallback_path: None,
            timeout: Duration::from_secs(45),
            poll_interval: Duration::from_millis(1500),
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: ProbeProtocol::Tcp,
            host: host.into(),
            port,
            path: None,
            fallback_path: None,
            timeout: Duration::from_secs(45),
            poll_interval: Duration::from_millis(1500),
        }
    }

    pub fn with_fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Apply the configured timing
    pub fn with_config(self, config: &ReadinessConfig) -> Self {
        self.with_timeout(config.startup_timeout())
            .with_poll_interval(config.poll_interval())
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// URLs tried in order within one HTTP attempt
    pub fn urls(&self) -> Vec<String> {
        let base = self.base_url();
        let mut urls = vec![format!("{}{}", base, self.path.as_deref().unwrap_or("/"))];
        if let Some(fallback) = &self.fallback_path {
            let primary = urls[0].trim_end_matches('/').to_string();
            urls.push(format!("{}/{}", primary, fallback.trim_start_matches('/')));
        }
        urls
    }

    pub fn describe(&self) -> String {
        match self.protocol {
            ProbeProtocol::Http => self.urls()[0].clone(),
            ProbeProtocol::Tcp => format!("tcp://{}:{}", self.host, self.port),
        }
    }
}

/// Classification of a single HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// 2xx
    Ready,
    /// Listener is up but the response is a redirect or 404
    Reachable,
    NotReady,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        !matches!(self, Readiness::NotReady)
    }
}

pub fn classify_status(status: u16) -> Readiness {
    if (200..300).contains(&status) {
        Readiness::Ready
    } else if REACHABLE_STATUSES.contains(&status) {
        Readiness::Reachable
    } else {
        Readiness::NotReady
    }
}

/// Summary of a successful probe
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub target: String,
    pub attempts: u32,
    pub elapsed: Duration,
}

pub struct ReadinessProbe {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl ReadinessProbe {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> E2eResult<Self> {
        // Redirects must stay visible to the classifier
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            connect_timeout,
        })
    }

    pub fn from_config(config: &ReadinessConfig) -> E2eResult<Self> {
        Self::new(
            Duration::from_millis(config.http_request_timeout_ms),
            Duration::from_millis(config.tcp_connect_timeout_ms),
        )
    }

    /// Poll `target` until it is ready or its timeout elapses.
    ///
    /// The check runs before the first sleep, so an already-ready target
    /// returns immediately.
    pub async fn wait_until_ready(&self, target: ReadinessTarget) -> E2eResult<ProbeReport> {
        let name = target.describe();
        let start = Instant::now();
        let mut attempts = 0;

        let last_error = loop {
            attempts += 1;

            let outcome = match target.protocol {
                ProbeProtocol::Http => self.check_http(&target).await,
                ProbeProtocol::Tcp => self.check_tcp(&target.host, target.port).await,
            };

            let error = match outcome {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    info!("{} ready after {} attempt(s) ({:?})", name, attempts, elapsed);
                    return Ok(ProbeReport {
                        target: name,
                        attempts,
                        elapsed,
                    });
                }
                Err(e) => e,
            };
            if attempts == 1 {
                info!("Waiting for {} ...", name);
            }
            debug!("{} not ready: {}", name, error);

            let elapsed = start.elapsed();
            if elapsed >= target.timeout {
                break error;
            }
            sleep(target.poll_interval.min(target.timeout - elapsed)).await;
        };

        Err(E2eError::Unreachable {
            target: name,
            waited: start.elapsed(),
            last_error,
        })
    }

    /// One HTTP attempt: the primary URL, then the fallback asset
    async fn check_http(&self, target: &ReadinessTarget) -> Result<(), String> {
        let mut last_error = String::new();

        for url in target.urls() {
            match self.client.get(&url).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    match classify_status(status) {
                        Readiness::Ready => {
                            debug!("HTTP OK: {} ({})", url, status);
                            return Ok(());
                        }
                        Readiness::Reachable => {
                            info!("HTTP reachable (status {}), treating as ready: {}", status, url);
                            return Ok(());
                        }
                        Readiness::NotReady => {
                            last_error = format!("HTTP status {} from {}", status, url);
                        }
                    }
                }
                Err(e) => {
                    // Connection refused is expected while the server is starting
                    if !e.is_connect() && !e.is_timeout() {
                        warn!("Health check error for {}: {}", url, e);
                    }
                    last_error = format!("{}: {}", url, e);
                }
            }
        }

        Err(last_error)
    }

    async fn check_tcp(&self, host: &str, port: u16) -> Result<(), String> {
        match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => {
                debug!("TCP OK: {}:{}", host, port);
                Ok(())
            }
            Ok(Err(e)) => Err(format!("{}:{}: {}", host, port, e)),
            Err(_) => Err(format!(
                "{}:{}: connect timed out after {:?}",
                host, port, self.connect_timeout
            )),
        }
    }
}

/// Whether anything accepts TCP connections on `host:port` right now
pub async fn is_listening(host: &str, port: u16, connect_timeout: Duration) -> bool {
    matches!(
        timeout(connect_timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Legacy mode: wait a fixed budget and carry on regardless
pub async fn fixed_delay(delay: Duration) {
    warn!(
        "Active readiness probing disabled; sleeping {:?} and proceeding (best effort)",
        delay
    );
    sleep(delay).await;
}

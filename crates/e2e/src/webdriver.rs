//! Chrome sessions through a local chromedriver, driven with fantoccini

use std::collections::HashMap;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::browser::{BrowserLauncher, BrowserSession, ElementId, Locator, WindowRect};
use crate::config::BrowserConfig;
use crate::error::{E2eError, E2eResult};
use crate::probe::{ReadinessProbe, ReadinessTarget};

/// Handle to a running chromedriver process
pub struct ChromeDriverHandle {
    child: Child,
    pub base_url: String,
    pub port: u16,
}

impl ChromeDriverHandle {
    /// Spawn chromedriver and wait until `/status` answers
    pub async fn spawn(config: &BrowserConfig) -> E2eResult<Self> {
        let port = match config.chromedriver_port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let base_url = format!("http://127.0.0.1:{}", port);

        info!(
            "Spawning {} on port {}",
            config.chromedriver_path.display(),
            port
        );

        let child = Command::new(&config.chromedriver_path)
            .arg(format!("--port={}", port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                E2eError::ChromeDriverStartup(format!(
                    "failed to spawn {}: {}",
                    config.chromedriver_path.display(),
                    e
                ))
            })?;

        let mut handle = ChromeDriverHandle {
            child,
            base_url,
            port,
        };

        let probe = ReadinessProbe::new(Duration::from_secs(2), Duration::from_secs(1))?;
        let target = ReadinessTarget::http("127.0.0.1", port, "/status")
            .with_timeout(Duration::from_secs(config.chromedriver_startup_timeout_secs))
            .with_poll_interval(Duration::from_millis(100));

        if let Err(e) = probe.wait_until_ready(target).await {
            handle.stop();
            return Err(E2eError::ChromeDriverStartup(e.to_string()));
        }

        Ok(handle)
    }

    pub fn stop(&mut self) {
        info!("Stopping chromedriver (pid: {})", self.child.id());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for ChromeDriverHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Launches isolated Chrome sessions through one shared chromedriver.
/// The driver is spawned on the first launch.
pub struct ChromeLauncher {
    config: BrowserConfig,
    driver: Mutex<Option<ChromeDriverHandle>>,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            driver: Mutex::new(None),
        }
    }

    /// Chrome switches for a fresh, non-persistent profile
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec!["--incognito".to_string()];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    pub fn capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        caps.insert("browserName".to_string(), json!("chrome"));
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": self.chrome_args() }),
        );
        caps
    }

    async fn driver_url(&self) -> E2eResult<String> {
        let mut driver = self.driver.lock().await;
        if let Some(handle) = driver.as_ref() {
            return Ok(handle.base_url.clone());
        }
        let handle = ChromeDriverHandle::spawn(&self.config).await?;
        let url = handle.base_url.clone();
        *driver = Some(handle);
        Ok(url)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    type Session = WebDriverSession;

    async fn launch(&self) -> E2eResult<WebDriverSession> {
        let driver_url = self.driver_url().await?;

        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        let client = builder.connect(&driver_url).await?;
        debug!("WebDriver session created on {}", driver_url);

        Ok(WebDriverSession {
            client,
            elements: HashMap::new(),
            next_element: 0,
            closed: false,
        })
    }

    async fn shutdown(&self) {
        if let Some(mut handle) = self.driver.lock().await.take() {
            handle.stop();
        }
    }
}

/// One Chrome window driven through chromedriver
pub struct WebDriverSession {
    client: Client,
    /// Elements handed out since the last navigation
    elements: HashMap<ElementId, Element>,
    next_element: u64,
    closed: bool,
}

impl WebDriverSession {
    fn element(&self, id: &ElementId) -> E2eResult<&Element> {
        self.elements.get(id).ok_or_else(|| {
            E2eError::ElementNotFound {
                locator: format!("element {}", id.0),
                waited: Duration::ZERO,
            }
        })
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn set_window_rect(&mut self, rect: WindowRect) -> E2eResult<()> {
        let x = u32::try_from(rect.x).unwrap_or(0);
        let y = u32::try_from(rect.y).unwrap_or(0);
        self.client
            .set_window_rect(x, y, rect.width, rect.height)
            .await?;
        Ok(())
    }

    async fn window_rect(&mut self) -> E2eResult<WindowRect> {
        let (x, y, width, height) = self.client.get_window_rect().await?;
        Ok(WindowRect {
            x: x as i32,
            y: y as i32,
            width: width as u32,
            height: height as u32,
        })
    }

    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        debug!("WebDriver goto {}", url);
        self.client.goto(url).await?;
        self.elements.clear();
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn find_element(&mut self, locator: &Locator) -> E2eResult<Option<ElementId>> {
        let search = match locator {
            Locator::Css(selector) => fantoccini::Locator::Css(selector.as_str()),
            Locator::XPath(expr) => fantoccini::Locator::XPath(expr.as_str()),
        };
        match self.client.find(search).await {
            Ok(element) => {
                self.next_element += 1;
                let id = ElementId(format!("e{}", self.next_element));
                self.elements.insert(id.clone(), element);
                Ok(Some(id))
            }
            Err(e) if e.is_miss() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn is_interactable(&mut self, element: &ElementId) -> E2eResult<bool> {
        let element = self.element(element)?;
        let checks = async {
            Ok::<bool, CmdError>(element.is_displayed().await? && element.is_enabled().await?)
        };
        match checks.await {
            Ok(ready) => Ok(ready),
            // Re-rendered between find and check; the caller polls again
            Err(CmdError::Standard(w)) if w.error() == "stale element reference" => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&mut self, element: &ElementId) -> E2eResult<()> {
        self.element(element)?.clear().await?;
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementId, text: &str) -> E2eResult<()> {
        self.element(element)?.send_keys(text).await?;
        Ok(())
    }

    async fn click(&mut self, element: &ElementId) -> E2eResult<()> {
        self.element(element)?.click().await?;
        Ok(())
    }

    async fn quit(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.elements.clear();
        self.client.clone().close().await?;
        Ok(())
    }
}

/// Find a free port to use
fn find_free_port() -> E2eResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_free_port() {
        let port = find_free_port().unwrap();
        assert!(port > 1024);
    }

    #[test]
    fn test_chrome_args() {
        let launcher = ChromeLauncher::new(BrowserConfig {
            headless: true,
            extra_args: vec!["--mute-audio".to_string()],
            ..Default::default()
        });
        assert_eq!(
            launcher.chrome_args(),
            vec!["--incognito", "--headless=new", "--mute-audio"]
        );
    }

    #[test]
    fn test_capabilities_request_chrome() {
        let caps = ChromeLauncher::new(BrowserConfig::default()).capabilities();
        assert_eq!(caps["browserName"], "chrome");
        assert_eq!(caps["goog:chromeOptions"]["args"], json!(["--incognito"]));
    }

    #[tokio::test]
    async fn test_missing_chromedriver_fails_startup() {
        let launcher = ChromeLauncher::new(BrowserConfig {
            chromedriver_path: "/nonexistent/chromedriver".into(),
            ..Default::default()
        });
        assert!(matches!(
            launcher.launch().await,
            Err(E2eError::ChromeDriverStartup(_))
        ));
    }
}

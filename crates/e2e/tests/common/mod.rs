//! Shared fixtures: an in-memory stand-in for the game's web client and a tiny HTTP stub

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mahjong_e2e::actor::SessionSettings;
use mahjong_e2e::browser::{BrowserLauncher, BrowserSession, ElementId, Locator, WindowRect};
use mahjong_e2e::config::FormContract;
use mahjong_e2e::wait::WaitConfig;
use mahjong_e2e::{E2eError, E2eResult};

pub const APP_URL: &str = "http://127.0.0.1:5173/";

/// Fast timings so failing waits give up quickly
pub fn fast_settings(app_url: &str) -> SessionSettings {
    let wait = WaitConfig::from_millis(200, 10);
    SessionSettings {
        app_url: app_url.to_string(),
        contract: FormContract::default(),
        navigation_attempts: 3,
        navigation_backoff: Duration::from_millis(1),
        element_wait: wait,
        name_prompt_wait: wait,
        table_url_wait: wait,
    }
}

/// What one fake browser window went through
#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    pub rect: Option<WindowRect>,
    pub navigations: Vec<String>,
    pub names: Vec<String>,
    pub submitted_codes: Vec<String>,
    pub quit: bool,
}

/// Knobs and observations shared by every fake session
#[derive(Debug, Default)]
pub struct World {
    /// Code the server assigns on create; None = create never leaves the lobby
    pub table_code: Option<String>,
    /// Navigations that fail before one succeeds, per session
    pub nav_failures: u32,
    /// Locator values that never appear
    pub missing: Vec<String>,
    pub fail_launch: bool,
    pub launches: usize,
    pub shutdowns: usize,
    pub sessions: Vec<SessionRecord>,
}

impl World {
    pub fn shared(table_code: Option<&str>) -> Arc<Mutex<World>> {
        Arc::new(Mutex::new(World {
            table_code: table_code.map(str::to_string),
            ..Default::default()
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Page {
    Blank,
    Lobby,
    NamePrompt(Intent),
    Table(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Intent {
    Create,
    Join(String),
}

pub struct FakeLauncher {
    pub world: Arc<Mutex<World>>,
}

impl FakeLauncher {
    pub fn new(world: Arc<Mutex<World>>) -> Self {
        Self { world }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self) -> E2eResult<FakeSession> {
        let mut world = self.world.lock().unwrap();
        if world.fail_launch {
            return Err(E2eError::ChromeDriverStartup("fake launch failure".to_string()));
        }
        world.launches += 1;
        world.sessions.push(SessionRecord::default());
        Ok(FakeSession {
            index: world.sessions.len() - 1,
            nav_failures_left: world.nav_failures,
            world: self.world.clone(),
            contract: FormContract::default(),
            page: Page::Blank,
            url: "about:blank".to_string(),
            origin: String::new(),
            values: HashMap::new(),
        })
    }

    async fn shutdown(&self) {
        self.world.lock().unwrap().shutdowns += 1;
    }
}

pub struct FakeSession {
    index: usize,
    nav_failures_left: u32,
    world: Arc<Mutex<World>>,
    contract: FormContract,
    page: Page,
    url: String,
    origin: String,
    values: HashMap<String, String>,
}

impl FakeSession {
    fn record<F: FnOnce(&mut SessionRecord)>(&self, f: F) {
        let mut world = self.world.lock().unwrap();
        f(&mut world.sessions[self.index]);
    }

    fn visible(&self, selector: &str) -> bool {
        let c = &self.contract;
        match &self.page {
            Page::Lobby => {
                selector == c.invite_code_input
                    || selector == c.join_button
                    || selector == c.create_button
            }
            Page::NamePrompt(_) => selector == c.username_input || selector == c.continue_button,
            Page::Blank | Page::Table(_) => false,
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn set_window_rect(&mut self, rect: WindowRect) -> E2eResult<()> {
        self.record(|r| r.rect = Some(rect));
        Ok(())
    }

    async fn window_rect(&mut self) -> E2eResult<WindowRect> {
        let world = self.world.lock().unwrap();
        world.sessions[self.index]
            .rect
            .ok_or_else(|| {
                E2eError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "window never placed",
                ))
            })
    }

    async fn navigate(&mut self, url: &str) -> E2eResult<()> {
        self.record(|r| r.navigations.push(url.to_string()));
        if self.nav_failures_left > 0 {
            self.nav_failures_left -= 1;
            return Err(E2eError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "net::ERR_CONNECTION_REFUSED",
            )));
        }
        self.page = Page::Lobby;
        self.url = url.to_string();
        self.origin = url.trim_end_matches('/').to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> E2eResult<String> {
        Ok(self.url.clone())
    }

    async fn find_element(&mut self, locator: &Locator) -> E2eResult<Option<ElementId>> {
        let selector = locator.value();
        let missing = self
            .world
            .lock()
            .unwrap()
            .missing
            .iter()
            .any(|m| m == selector);
        if missing || !self.visible(selector) {
            return Ok(None);
        }
        Ok(Some(ElementId(selector.to_string())))
    }

    async fn is_interactable(&mut self, element: &ElementId) -> E2eResult<bool> {
        Ok(self.visible(&element.0))
    }

    async fn clear(&mut self, element: &ElementId) -> E2eResult<()> {
        self.values.insert(element.0.clone(), String::new());
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementId, text: &str) -> E2eResult<()> {
        self.values.entry(element.0.clone()).or_default().push_str(text);
        Ok(())
    }

    async fn click(&mut self, element: &ElementId) -> E2eResult<()> {
        let c = self.contract.clone();
        let selector = element.0.as_str();

        if selector == c.create_button {
            self.page = Page::NamePrompt(Intent::Create);
        } else if selector == c.join_button {
            let code = self.values.get(&c.invite_code_input).cloned().unwrap_or_default();
            self.page = Page::NamePrompt(Intent::Join(code));
        } else if selector == c.continue_button {
            let name = self.values.get(&c.username_input).cloned().unwrap_or_default();
            self.record(|r| r.names.push(name));

            match self.page.clone() {
                Page::NamePrompt(Intent::Create) => {
                    let code = self.world.lock().unwrap().table_code.clone();
                    match code {
                        Some(code) => {
                            self.url = format!("{}/table/{}", self.origin, code);
                            self.page = Page::Table(code);
                        }
                        // Server never answers: the modal just closes
                        None => self.page = Page::Lobby,
                    }
                }
                Page::NamePrompt(Intent::Join(code)) => {
                    self.record(|r| r.submitted_codes.push(code.clone()));
                    self.url = format!("{}/table/{}", self.origin, code.to_lowercase());
                    self.page = Page::Table(code);
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn quit(&mut self) -> E2eResult<()> {
        self.record(|r| r.quit = true);
        self.page = Page::Blank;
        Ok(())
    }
}

/// HTTP stub answering every request with `status_for(path)`
pub async fn http_stub<F>(status_for: F) -> (u16, JoinHandle<()>)
where
    F: Fn(&str) -> u16 + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let status_for = Arc::new(status_for);

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let status_for = status_for.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let status = status_for(&path);
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (port, handle)
}

/// Raw TCP listener that accepts and drops connections
pub async fn tcp_stub() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    (port, handle)
}

/// A port nothing listens on
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

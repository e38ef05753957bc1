//! Player actors - one isolated browser session per seat at the table

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{BrowserLauncher, BrowserSession, ElementId, Locator, WindowRect};
use crate::config::{FormContract, HarnessConfig};
use crate::error::{E2eError, E2eResult};
use crate::wait::WaitConfig;

/// Seats at a table
pub const PLAYER_COUNT: u8 = 4;

const WINDOW_WIDTH: u32 = 420;
const TALL_HEIGHT: u32 = 800;
const SHORT_HEIGHT: u32 = 540;

/// Fixed screen placement for a seat.
///
/// ```text
///  +------+  +------+  +------+
///  |  3   |  |  2   |  |  1   |
///  | left |  +------+  | right|
///  |      |  +------+  |      |
///  |      |  |  0   |  |      |
///  +------+  +------+  +------+
/// ```
pub fn seat_window(ordinal: u8) -> Option<WindowRect> {
    let rect = match ordinal {
        // Bottom middle
        0 => WindowRect { x: 520, y: 380, width: WINDOW_WIDTH, height: SHORT_HEIGHT },
        // Right
        1 => WindowRect { x: 1050, y: 0, width: WINDOW_WIDTH, height: TALL_HEIGHT },
        // Top middle
        2 => WindowRect { x: 520, y: 0, width: WINDOW_WIDTH, height: SHORT_HEIGHT },
        // Left
        3 => WindowRect { x: 0, y: 0, width: WINDOW_WIDTH, height: TALL_HEIGHT },
        _ => return None,
    };
    Some(rect)
}

/// Who a player is and where its window goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorIdentity {
    ordinal: u8,
    display_name: String,
    window_rect: WindowRect,
}

impl ActorIdentity {
    pub fn new(ordinal: u8) -> E2eResult<Self> {
        Self::with_display_name(ordinal, format!("player {}", ordinal))
    }

    pub fn with_display_name(ordinal: u8, display_name: impl Into<String>) -> E2eResult<Self> {
        let window_rect = seat_window(ordinal).ok_or(E2eError::InvalidOrdinal(ordinal))?;
        Ok(Self {
            ordinal,
            display_name: display_name.into(),
            window_rect,
        })
    }

    /// All four seats, creator first
    pub fn table() -> Vec<ActorIdentity> {
        (0..PLAYER_COUNT)
            .filter_map(|ordinal| ActorIdentity::new(ordinal).ok())
            .collect()
    }

    pub fn ordinal(&self) -> u8 {
        self.ordinal
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn window_rect(&self) -> WindowRect {
        self.window_rect
    }

    /// Seat 0 creates the table
    pub fn is_creator(&self) -> bool {
        self.ordinal == 0
    }
}

/// Table invite code: the last segment of the creator's table URL, trimmed and upper-cased
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InviteCode(String);

impl InviteCode {
    /// Extract the code from a post-creation URL such as `http://host/table/ab12`
    pub fn from_table_url(url: &str, table_segment: &str) -> E2eResult<Self> {
        let shape_error = |reason: String| E2eError::ProtocolShape {
            url: url.to_string(),
            reason,
        };

        let parsed = reqwest::Url::parse(url).map_err(|e| shape_error(e.to_string()))?;
        let path = parsed.path();
        if !path.contains(table_segment) {
            return Err(shape_error(format!("path has no {} segment", table_segment)));
        }

        let code = path.rsplit('/').next().unwrap_or_default().trim().to_uppercase();
        if code.is_empty() {
            return Err(shape_error("empty invite code segment".to_string()));
        }
        Ok(InviteCode(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InviteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Navigated,
    TableCreated,
    CodeSubmitted,
    Interactive,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::Navigated => "navigated",
            SessionState::TableCreated => "table-created",
            SessionState::CodeSubmitted => "code-submitted",
            SessionState::Interactive => "interactive",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// How a session got to its table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lineage {
    Creator,
    Joiner,
}

/// Timing and UI contract shared by every actor
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub app_url: String,
    pub contract: FormContract,
    pub navigation_attempts: u32,
    pub navigation_backoff: Duration,
    pub element_wait: WaitConfig,
    pub name_prompt_wait: WaitConfig,
    pub table_url_wait: WaitConfig,
}

impl SessionSettings {
    pub fn from_config(config: &HarnessConfig) -> Self {
        let boot = &config.bootstrap;
        Self {
            app_url: config.frontend_url(),
            contract: config.contract.clone(),
            navigation_attempts: config.browser.navigation_attempts,
            navigation_backoff: config.browser.navigation_backoff(),
            element_wait: WaitConfig::from_millis(boot.element_timeout_ms, boot.poll_interval_ms),
            name_prompt_wait: WaitConfig::from_millis(
                boot.name_prompt_timeout_ms,
                boot.poll_interval_ms,
            ),
            table_url_wait: WaitConfig::from_millis(
                boot.table_url_timeout_ms,
                boot.poll_interval_ms,
            ),
        }
    }
}

/// One simulated player
pub struct ActorSession<S: BrowserSession> {
    identity: ActorIdentity,
    session: S,
    settings: Arc<SessionSettings>,
    state: SessionState,
    lineage: Option<Lineage>,
    invite_code: Option<InviteCode>,
}

impl<S: BrowserSession> ActorSession<S> {
    /// Launch an isolated session, place its window and load the app root.
    ///
    /// The session is quit again if placement or navigation fails.
    pub async fn open<L>(
        launcher: &L,
        identity: ActorIdentity,
        settings: Arc<SessionSettings>,
    ) -> E2eResult<Self>
    where
        L: BrowserLauncher<Session = S>,
    {
        info!(
            "Opening browser for {} (seat {})",
            identity.display_name(),
            identity.ordinal()
        );
        let session = launcher.launch().await?;

        let mut actor = ActorSession {
            identity,
            session,
            settings,
            state: SessionState::Created,
            lineage: None,
            invite_code: None,
        };

        let placed = async {
            actor.session.set_window_rect(actor.identity.window_rect()).await?;
            actor.navigate_root().await
        }
        .await;

        if let Err(e) = placed {
            actor.close().await;
            return Err(e);
        }
        Ok(actor)
    }

    pub fn identity(&self) -> &ActorIdentity {
        &self.identity
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn lineage(&self) -> Option<Lineage> {
        self.lineage
    }

    /// The code this actor created or submitted
    pub fn invite_code(&self) -> Option<&InviteCode> {
        self.invite_code.as_ref()
    }

    /// Window placement as reported by the browser
    pub async fn observed_window_rect(&mut self) -> E2eResult<WindowRect> {
        self.session.window_rect().await
    }

    /// Navigation retried with backoff: the asset server can still be
    /// hydrating after its port starts accepting connections.
    async fn navigate_root(&mut self) -> E2eResult<()> {
        self.require(&[SessionState::Created], SessionState::Navigated)?;

        let url = self.settings.app_url.clone();
        let attempts = self.settings.navigation_attempts;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.session.navigate(&url).await {
                Ok(()) => {
                    debug!("{} loaded {}", self.identity.display_name(), url);
                    self.state = SessionState::Navigated;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Navigation attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        sleep(self.settings.navigation_backoff).await;
                    }
                }
            }
        }

        Err(E2eError::NavigationFailed {
            url,
            attempts,
            last_error,
        })
    }

    /// Join an existing table: enter the code, click join, then name the player
    pub async fn submit_invite_code(&mut self, code: &InviteCode) -> E2eResult<()> {
        self.require(&[SessionState::Navigated], SessionState::CodeSubmitted)?;
        info!("{} joining table {}", self.identity.display_name(), code);

        let contract = self.settings.contract.clone();
        let element_wait = self.settings.element_wait;

        let input = self
            .wait_for(&Locator::css(&contract.invite_code_input), element_wait, false)
            .await?;
        self.fill(&input, code.as_str()).await?;

        let join = self
            .wait_for(&Locator::xpath(&contract.join_button), element_wait, true)
            .await?;
        self.session.click(&join).await?;

        let prompt_wait = self.settings.name_prompt_wait;
        self.enter_name(&contract, prompt_wait).await?;

        self.invite_code = Some(code.clone());
        self.lineage = Some(Lineage::Joiner);
        self.state = SessionState::CodeSubmitted;
        Ok(())
    }

    /// Create a new table and wait until the browser lands on its page
    pub async fn create_table(&mut self) -> E2eResult<()> {
        self.require(&[SessionState::Navigated], SessionState::TableCreated)?;
        info!("{} creating table", self.identity.display_name());

        let contract = self.settings.contract.clone();
        let element_wait = self.settings.element_wait;

        let create = self
            .wait_for(&Locator::xpath(&contract.create_button), element_wait, true)
            .await?;
        self.session.click(&create).await?;

        self.enter_name(&contract, element_wait).await?;

        let deadline = self.settings.table_url_wait.start();
        loop {
            let url = self.session.current_url().await?;
            if url.contains(&contract.table_segment) {
                debug!("Table page reached: {}", url);
                break;
            }
            if !deadline.tick().await {
                return Err(E2eError::ProtocolShape {
                    url,
                    reason: format!(
                        "did not navigate to a {} page within {:?}",
                        contract.table_segment,
                        deadline.elapsed()
                    ),
                });
            }
        }

        self.lineage = Some(Lineage::Creator);
        self.state = SessionState::TableCreated;
        Ok(())
    }

    /// Read the invite code out of the current table URL
    pub async fn extract_invite_code(&mut self) -> E2eResult<InviteCode> {
        if self.state != SessionState::TableCreated {
            return Err(self.invalid("extract-invite-code"));
        }
        let url = self.session.current_url().await?;
        let code = InviteCode::from_table_url(&url, &self.settings.contract.table_segment)?;
        info!("Invite code: {}", code);
        self.invite_code = Some(code.clone());
        Ok(code)
    }

    /// Seated and still answering
    pub async fn mark_interactive(&mut self) -> E2eResult<()> {
        self.require(
            &[SessionState::TableCreated, SessionState::CodeSubmitted],
            SessionState::Interactive,
        )?;
        self.session.current_url().await?;
        self.state = SessionState::Interactive;
        Ok(())
    }

    /// Quit the browser. Never fails; safe to call repeatedly.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        match self.session.quit().await {
            Ok(()) => debug!("Closed browser for {}", self.identity.display_name()),
            Err(e) => warn!(
                "Closing browser for {} failed: {}",
                self.identity.display_name(),
                e
            ),
        }
        self.state = SessionState::Closed;
    }

    async fn enter_name(&mut self, contract: &FormContract, prompt_wait: WaitConfig) -> E2eResult<()> {
        let name_input = self
            .wait_for(&Locator::css(&contract.username_input), prompt_wait, false)
            .await?;
        let name = self.identity.display_name().to_string();
        self.fill(&name_input, &name).await?;

        let element_wait = self.settings.element_wait;
        let cont = self
            .wait_for(&Locator::xpath(&contract.continue_button), element_wait, true)
            .await?;
        self.session.click(&cont).await
    }

    async fn wait_for(
        &mut self,
        locator: &Locator,
        wait: WaitConfig,
        interactable: bool,
    ) -> E2eResult<ElementId> {
        let deadline = wait.start();
        loop {
            if let Some(element) = self.session.find_element(locator).await? {
                if !interactable || self.session.is_interactable(&element).await? {
                    return Ok(element);
                }
            }
            if !deadline.tick().await {
                return Err(E2eError::ElementNotFound {
                    locator: locator.to_string(),
                    waited: deadline.elapsed(),
                });
            }
        }
    }

    async fn fill(&mut self, element: &ElementId, text: &str) -> E2eResult<()> {
        self.session.clear(element).await?;
        self.session.send_keys(element, text).await
    }

    fn require(&self, allowed: &[SessionState], to: SessionState) -> E2eResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.invalid(&to.to_string()))
        }
    }

    fn invalid(&self, to: &str) -> E2eError {
        E2eError::InvalidState {
            ordinal: self.identity.ordinal(),
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}

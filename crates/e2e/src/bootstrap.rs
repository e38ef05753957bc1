//! Table bootstrap - seat 0 creates the table, seats 1..3 join with its invite code

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::actor::{ActorIdentity, ActorSession, InviteCode, SessionSettings};
use crate::browser::{BrowserLauncher, BrowserSession};
use crate::config::HarnessConfig;
use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    Pending,
    Creating,
    Joining,
    Ready,
}

/// Every session opened during a run, released together at teardown
pub struct SessionRegistry<S: BrowserSession> {
    sessions: Vec<ActorSession<S>>,
}

impl<S: BrowserSession> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
        }
    }
}

impl<S: BrowserSession> SessionRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and hand it back for further driving
    pub fn push(&mut self, session: ActorSession<S>) -> &mut ActorSession<S> {
        self.sessions.push(session);
        let last = self.sessions.len() - 1;
        &mut self.sessions[last]
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActorSession<S>> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActorSession<S>> {
        self.sessions.iter_mut()
    }

    pub fn get_mut(&mut self, ordinal: u8) -> Option<&mut ActorSession<S>> {
        self.sessions
            .iter_mut()
            .find(|s| s.identity().ordinal() == ordinal)
    }

    /// Close every session, whatever state it is in. Returns how many were swept.
    pub async fn close_all(&mut self) -> usize {
        let count = self.sessions.len();
        if count > 0 {
            info!("Closing {} browser session(s)", count);
        }
        for session in self.sessions.iter_mut() {
            session.close().await;
        }
        count
    }
}

/// Single forward pass: create, then join. No retries at this level.
pub struct TableBootstrapProtocol {
    settings: Arc<SessionSettings>,
    identities: Vec<ActorIdentity>,
    join_stagger: Duration,
    phase: BootstrapPhase,
}

impl TableBootstrapProtocol {
    pub fn new(settings: SessionSettings, join_stagger: Duration) -> Self {
        Self {
            settings: Arc::new(settings),
            identities: ActorIdentity::table(),
            join_stagger,
            phase: BootstrapPhase::Pending,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            SessionSettings::from_config(config),
            config.bootstrap.join_stagger(),
        )
    }

    /// Replace the default four players. The first identity must be seat 0.
    pub fn with_identities(mut self, identities: Vec<ActorIdentity>) -> Self {
        self.identities = identities;
        self
    }

    pub fn phase(&self) -> BootstrapPhase {
        self.phase
    }

    /// Seat every player. Each session is registered the moment it opens, so
    /// the caller can release all of them whether or not this succeeds.
    pub async fn run<L>(
        &mut self,
        launcher: &L,
        registry: &mut SessionRegistry<L::Session>,
    ) -> E2eResult<InviteCode>
    where
        L: BrowserLauncher,
    {
        let (creator, joiners) = match self.identities.split_first() {
            Some((creator, joiners)) if creator.is_creator() => (creator.clone(), joiners.to_vec()),
            _ => {
                return Err(E2eError::Config(
                    "the first player must be seat 0, the table creator".to_string(),
                ))
            }
        };

        self.phase = BootstrapPhase::Creating;
        info!("Launching first player and creating table...");
        let actor = ActorSession::open(launcher, creator, self.settings.clone()).await?;
        let creator_session = registry.push(actor);
        creator_session.create_table().await?;
        let code = creator_session.extract_invite_code().await?;

        self.phase = BootstrapPhase::Joining;
        for identity in joiners {
            // Time-based spacing between joins, not a handshake
            sleep(self.join_stagger).await;
            let actor = ActorSession::open(launcher, identity, self.settings.clone()).await?;
            let joiner = registry.push(actor);
            joiner.submit_invite_code(&code).await?;
        }

        for session in registry.iter_mut() {
            if let Err(e) = session.mark_interactive().await {
                warn!(
                    "{} stopped responding after seating",
                    session.identity().display_name()
                );
                return Err(e);
            }
        }

        self.phase = BootstrapPhase::Ready;
        info!("All {} players seated at table {}", registry.len(), code);
        Ok(code)
    }
}

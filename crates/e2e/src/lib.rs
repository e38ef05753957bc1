//! Mahjong table harness
//!
//! Boots the game's dev servers, proves they are reachable, then seats four
//! independent browser players at one table and holds the windows open for
//! manual testing:
//! - Clears the well-known ports and spawns the servers with feature flags
//! - Polls the asset server over HTTP, then the realtime server over TCP
//! - Drives Chrome sessions over WebDriver: seat 0 creates the table, seats
//!   1..3 join with the invite code taken from seat 0's URL
//! - Waits for the operator, then closes every session
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Orchestrator                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ProcessLifecycleManager                                    │
//! │    ├── reset()            kill listeners on 8080 / 5173     │
//! │    └── start(flags) -> ServerProcessHandle                  │
//! │  ReadinessProbe                                             │
//! │    └── wait_until_ready(HTTP 5173) then (TCP 8080)          │
//! │  TableBootstrapProtocol                                     │
//! │    ├── Creating:  seat 0 open, create_table, invite code    │
//! │    ├── Joining:   seats 1..3 open, submit_invite_code       │
//! │    └── Ready:     every ActorSession interactive            │
//! │  OperatorGate.wait()                                        │
//! │  SessionRegistry.close_all()                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod actor;
pub mod bootstrap;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod flags;
pub mod gate;
pub mod orchestrator;
pub mod probe;
pub mod scenario;
pub mod server;
pub mod wait;
pub mod webdriver;

pub use actor::{ActorIdentity, ActorSession, InviteCode, Lineage, SessionState};
pub use bootstrap::{SessionRegistry, TableBootstrapProtocol};
pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use orchestrator::{Orchestrator, RunReport};
pub use scenario::Scenario;

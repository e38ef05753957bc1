//! The three manual test setups

use std::time::Duration;

use crate::flags::{ServerFeatureFlags, BLIND_PASS_ALL, SKIP_CHARLESTON};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Plain lobby: four players seated, game untouched
    Lobby,
    /// Every Charleston pass resolves as a blind pass
    BlindPass,
    /// Charleston removed, play starts right after seating
    Gameplay,
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Lobby => "lobby",
            Scenario::BlindPass => "blindpass",
            Scenario::Gameplay => "gameplay",
        }
    }

    pub fn flags(&self) -> ServerFeatureFlags {
        match self {
            Scenario::Lobby => ServerFeatureFlags::none(),
            Scenario::BlindPass => ServerFeatureFlags::none().enable(BLIND_PASS_ALL),
            Scenario::Gameplay => ServerFeatureFlags::none().enable(SKIP_CHARLESTON),
        }
    }

    /// Budget used when active probing is turned off
    pub fn legacy_startup_delay(&self) -> Duration {
        match self {
            Scenario::Lobby => Duration::from_secs(5),
            Scenario::BlindPass | Scenario::Gameplay => Duration::from_secs(6),
        }
    }

    /// What the operator should do once everyone is seated
    pub fn banner(&self) -> &'static str {
        match self {
            Scenario::Lobby => "All players joined the table.",
            Scenario::BlindPass => {
                "BLIND_PASS_ALL=1 is enabled. Perform Charleston passes by hand in each window."
            }
            Scenario::Gameplay => {
                "All players joined. Game should start directly in play phase (Charleston skipped)."
            }
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_flags() {
        assert!(Scenario::Lobby.flags().is_empty());
        assert_eq!(Scenario::BlindPass.flags().get(BLIND_PASS_ALL), Some("1"));
        assert_eq!(Scenario::BlindPass.flags().get(SKIP_CHARLESTON), None);
        assert_eq!(Scenario::Gameplay.flags().get(SKIP_CHARLESTON), Some("1"));
    }
}

//! Environment feature flags handed to the dev servers at launch

use std::collections::BTreeMap;
use std::process::Command;

/// Every Charleston pass auto-resolves as a blind pass
pub const BLIND_PASS_ALL: &str = "BLIND_PASS_ALL";

/// The Charleston phase is removed for the session
pub const SKIP_CHARLESTON: &str = "SKIP_CHARLESTON";

/// Flag name to value, fixed for the lifetime of the servers they configure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerFeatureFlags {
    flags: BTreeMap<String, String>,
}

impl ServerFeatureFlags {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn enable(self, name: impl Into<String>) -> Self {
        self.with(name, "1")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge the flags into the environment a command inherits
    pub fn apply(&self, cmd: &mut Command) {
        for (name, value) in self.iter() {
            cmd.env(name, value);
        }
    }
}

impl std::fmt::Display for ServerFeatureFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.flags.is_empty() {
            return write!(f, "(none)");
        }
        let rendered: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ServerFeatureFlags::none().to_string(), "(none)");
        let flags = ServerFeatureFlags::none()
            .enable(SKIP_CHARLESTON)
            .enable(BLIND_PASS_ALL);
        assert_eq!(flags.to_string(), "BLIND_PASS_ALL=1 SKIP_CHARLESTON=1");
    }

    #[test]
    fn test_apply_sets_env() {
        let flags = ServerFeatureFlags::none().enable(BLIND_PASS_ALL);
        let mut cmd = Command::new("true");
        flags.apply(&mut cmd);
        let envs: Vec<_> = cmd.get_envs().collect();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].0, BLIND_PASS_ALL);
        assert_eq!(envs[0].1.and_then(|v| v.to_str()), Some("1"));
    }
}

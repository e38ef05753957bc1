//! Browser session abstraction used by the player actors

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// How an element is located on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Css(s) | Locator::XPath(s) => s,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{}", s),
            Locator::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// Opaque element reference handed out by a session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

/// Window position and size in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One live browser session
#[async_trait]
pub trait BrowserSession: Send {
    async fn set_window_rect(&mut self, rect: WindowRect) -> E2eResult<()>;

    async fn window_rect(&mut self) -> E2eResult<WindowRect>;

    async fn navigate(&mut self, url: &str) -> E2eResult<()>;

    async fn current_url(&mut self) -> E2eResult<String>;

    /// `Ok(None)` when nothing matches right now
    async fn find_element(&mut self, locator: &Locator) -> E2eResult<Option<ElementId>>;

    /// Displayed and enabled
    async fn is_interactable(&mut self, element: &ElementId) -> E2eResult<bool>;

    async fn clear(&mut self, element: &ElementId) -> E2eResult<()>;

    async fn send_keys(&mut self, element: &ElementId, text: &str) -> E2eResult<()>;

    async fn click(&mut self, element: &ElementId) -> E2eResult<()>;

    /// End the session and close its window
    async fn quit(&mut self) -> E2eResult<()>;
}

/// Creates isolated sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self) -> E2eResult<Self::Session>;

    /// Release whatever backs the sessions (driver process etc.)
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css("input#inviteCode").to_string(), "css:input#inviteCode");
        assert_eq!(Locator::xpath("//button").to_string(), "xpath://button");
        assert_eq!(Locator::xpath("//button").value(), "//button");
    }
}

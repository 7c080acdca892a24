//! Inbound launch requests.
//!
//! A [`LaunchRequest`] is immutable once received. Routing steps that need a
//! different request (the mini-app fallback) build a new one instead of
//! patching the original.

use std::fmt::Display;
use std::str::FromStr;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use crate::launcher::session::SessionId;

/// What the launch request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchAction {
    /// Display a URL
    View,
    /// Launcher icon or an internal "resume browsing" request
    Main,
    /// Close every private session
    CloseAllPrivate,
    /// Bring a specific session back to the foreground
    BringToFront,
    /// Open a mini-app window
    StartMiniApp,
    /// Open the notification settings page
    NotificationSettings,
    /// Anything else. Never routable.
    Other(String),
}

impl LaunchAction {
    pub fn as_str(&self) -> &str {
        match self {
            LaunchAction::View => "VIEW",
            LaunchAction::Main => "MAIN",
            LaunchAction::CloseAllPrivate => "CLOSE_ALL_PRIVATE",
            LaunchAction::BringToFront => "BRING_TO_FRONT",
            LaunchAction::StartMiniApp => "START_MINIAPP",
            LaunchAction::NotificationSettings => "NOTIFICATION_SETTINGS",
            LaunchAction::Other(s) => s,
        }
    }
}

impl FromStr for LaunchAction {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "VIEW" => LaunchAction::View,
            "MAIN" => LaunchAction::Main,
            "CLOSE_ALL_PRIVATE" => LaunchAction::CloseAllPrivate,
            "BRING_TO_FRONT" => LaunchAction::BringToFront,
            "START_MINIAPP" => LaunchAction::StartMiniApp,
            "NOTIFICATION_SETTINGS" => LaunchAction::NotificationSettings,
            other => LaunchAction::Other(other.to_string()),
        })
    }
}

impl Display for LaunchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

bitflags! {
    /// Boolean switches carried by an inbound request.
    pub struct LaunchFlags: u32 {
        /// Open the page in a private session
        const PRIVATE                  = 0b0000_0001;
        /// Append to the caller's window instead of opening a new one
        const APPEND                   = 0b0000_0010;
        /// Open behind the current window
        const OPEN_IN_BACKGROUND       = 0b0000_0100;
        /// Reuse a window created for the same URL, else open a new one
        const REUSE_MATCHING_ELSE_NEW  = 0b0000_1000;
        /// Replace the content of the currently active page
        const CLOBBER                  = 0b0001_0000;
        /// A page is asking for its mini-app window to come back
        const BRING_MINIAPP_TO_FRONT   = 0b0010_0000;
        /// Request came from a notification settings entry point
        const NOTIFICATION_PREFERENCES = 0b0100_0000;
    }
}

impl Default for LaunchFlags {
    fn default() -> Self {
        LaunchFlags::empty()
    }
}

/// Screen orientation pinned by a mini-app.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Default,
    Portrait,
    Landscape,
}

/// Mini-app shortcut data carried on the request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MiniAppSpec {
    pub id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub orientation: Orientation,
    /// Base64 MAC binding the shortcut to its URL
    pub mac: Option<String>,
}

/// Opaque extras from the original request. Carried through unmodified.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestEcho(serde_json::Value);

impl RequestEcho {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    action: LaunchAction,
    url: Option<String>,
    target_session: Option<SessionId>,
    flags: LaunchFlags,
    mini_app: Option<MiniAppSpec>,
    echo: RequestEcho,
}

impl LaunchRequest {
    pub fn new(action: LaunchAction) -> Self {
        Self {
            action,
            url: None,
            target_session: None,
            flags: LaunchFlags::empty(),
            mini_app: None,
            echo: RequestEcho::default(),
        }
    }

    pub fn view(url: impl Into<String>) -> Self {
        Self::new(LaunchAction::View).with_url(url)
    }

    pub fn main() -> Self {
        Self::new(LaunchAction::Main)
    }

    /// Request fired by the "close all private pages" notification.
    pub fn close_all_private() -> Self {
        Self::new(LaunchAction::CloseAllPrivate)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_flags(mut self, flags: LaunchFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_target_session(mut self, id: SessionId) -> Self {
        self.target_session = Some(id);
        self
    }

    pub fn with_mini_app(mut self, spec: MiniAppSpec) -> Self {
        self.mini_app = Some(spec);
        self
    }

    pub fn with_echo(mut self, echo: RequestEcho) -> Self {
        self.echo = echo;
        self
    }

    pub fn action(&self) -> &LaunchAction {
        &self.action
    }

    /// The target URL, if it is usable. Blank strings count as absent.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    pub fn target_session(&self) -> Option<SessionId> {
        self.target_session
    }

    pub fn flags(&self) -> LaunchFlags {
        self.flags
    }

    pub fn has(&self, flag: LaunchFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn mini_app(&self) -> Option<&MiniAppSpec> {
        self.mini_app.as_ref()
    }

    pub fn echo(&self) -> &RequestEcho {
        &self.echo
    }

    pub fn is_private(&self) -> bool {
        self.has(LaunchFlags::PRIVATE)
    }

    pub fn wants_notification_settings(&self) -> bool {
        self.action == LaunchAction::NotificationSettings
            || self.has(LaunchFlags::NOTIFICATION_PREFERENCES)
    }

    pub fn wants_mini_app(&self) -> bool {
        self.action == LaunchAction::StartMiniApp || self.has(LaunchFlags::BRING_MINIAPP_TO_FRONT)
    }

    /// MAIN-family requests resume browsing rather than open a given URL.
    pub fn is_main_family(&self) -> bool {
        matches!(self.action, LaunchAction::Main | LaunchAction::BringToFront)
    }

    /// Plain VIEW request for `url`, used when a mini-app cannot be opened.
    /// Flags and extras carry over; the mini-app payload and markers do not.
    pub fn into_view_fallback(self, url: String) -> Self {
        let flags = (self.flags - LaunchFlags::BRING_MINIAPP_TO_FRONT)
            | LaunchFlags::REUSE_MATCHING_ELSE_NEW;
        Self {
            action: LaunchAction::View,
            url: Some(url),
            target_session: self.target_session,
            flags,
            mini_app: None,
            echo: self.echo,
        }
    }
}

/// True for URLs that need a read grant to be opened by another window.
pub fn is_content_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| u.scheme() == "content")
}

//! Outbound launches handed to the host.
//!
//! An [`OutboundLaunch`] is split in two typed halves:
//!
//! - [`VisibleRequestPayload`] is what the started window (and anything that
//!   inspects or logs the launch) can observe. A private page payload has no
//!   URL field to fill: its constructor does not take one.
//! - [`RoutingSignal`] carries trusted internal signaling (authenticity stamp,
//!   launch mode, transition kind). It never holds page content.

use std::fmt::Display;
use bitflags::bitflags;
use uuid::Uuid;
use crate::launcher::request::{MiniAppSpec, Orientation, RequestEcho};
use crate::launcher::session::SessionId;

/// Window class a launch is addressed to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WindowClass {
    MiniApp,
    PrivatePage,
    Page,
    ClassicTabbed,
    Embedded,
    /// The routing window itself
    Launcher,
}

impl WindowClass {
    /// True for per-page windows, private or not.
    pub fn is_page(self) -> bool {
        matches!(self, WindowClass::Page | WindowClass::PrivatePage)
    }

    pub fn for_page(private: bool) -> Self {
        if private {
            WindowClass::PrivatePage
        } else {
            WindowClass::Page
        }
    }
}

bitflags! {
    /// Host flags applied to an outbound launch.
    pub struct WindowFlags: u32 {
        const NEW_DOCUMENT         = 0b0000_0001;
        const NEW_TASK             = 0b0000_0010;
        const RETAIN_IN_RECENTS    = 0b0000_0100;
        const EXCLUDE_FROM_RECENTS = 0b0000_1000;
        const MULTIPLE_TASK        = 0b0001_0000;
        const CLEAR_TOP            = 0b0010_0000;
        const GRANT_READ_URI       = 0b0100_0000;
    }
}

const DESCRIPTOR_SCHEME: &str = "page://";

/// Launch descriptor of a per-page window: the session id and the URL the
/// window was created for. The URL is empty for private sessions.
///
/// The descriptor is fixed when the window starts. Navigation inside the
/// window never changes it, which is what URL retargeting matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub id: SessionId,
    pub url: Option<String>,
}

impl SessionDescriptor {
    pub fn encode(&self) -> String {
        format!("{}{}?{}", DESCRIPTOR_SCHEME, self.id, self.url.as_deref().unwrap_or(""))
    }

    /// Parses a descriptor. Anything that is not a page descriptor yields `None`.
    pub fn parse(data: &str) -> Option<Self> {
        let rest = data.strip_prefix(DESCRIPTOR_SCHEME)?;
        let (id, url) = match rest.split_once('?') {
            Some((id, url)) => (id, url),
            None => (rest, ""),
        };
        let id = id.parse::<u32>().ok()?;
        Some(Self {
            id: SessionId::new(id),
            url: if url.is_empty() { None } else { Some(url.to_string()) },
        })
    }
}

impl Display for SessionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// How a new page relates to the window that asked for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Open in front of everything else
    #[default]
    Foreground,
    /// Open as a dependent of the current window, behind it
    Affiliated,
    /// Reuse an existing window for the same URL when possible
    Retarget,
}

/// Who initiated the launch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LaunchSource {
    Launcher,
    #[default]
    External,
    WindowOpen,
    ContextualSearch,
    Menu,
    LongPress,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PageTransition {
    #[default]
    Link,
    AutoToplevel,
    Typed,
}

/// Proof that a launch was built by this process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AuthenticityStamp(Uuid);

impl AuthenticityStamp {
    pub(crate) fn new(token: Uuid) -> Self {
        Self(token)
    }

    pub fn token(&self) -> Uuid {
        self.0
    }
}

/// Mini-app data forwarded to the mini-app window. The MAC stays behind.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniAppPayload {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub orientation: Orientation,
}

impl MiniAppPayload {
    pub(crate) fn from_spec(id: String, url: String, spec: &MiniAppSpec) -> Self {
        Self {
            id,
            url,
            title: spec.title.clone(),
            icon: spec.icon.clone(),
            orientation: spec.orientation,
        }
    }
}

/// Externally observable part of an outbound launch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisibleRequestPayload {
    data: Option<String>,
    parent: Option<SessionId>,
    private: bool,
    desktop_mode: bool,
    echo: Option<RequestEcho>,
    mini_app: Option<MiniAppPayload>,
}

impl VisibleRequestPayload {
    /// Payload of a non-private page window.
    pub fn page(id: SessionId, url: &str, parent: Option<SessionId>, echo: Option<RequestEcho>) -> Self {
        let descriptor = SessionDescriptor { id, url: Some(url.to_string()) };
        Self {
            data: Some(descriptor.encode()),
            parent,
            echo,
            ..Default::default()
        }
    }

    /// Payload of a private page window. Only the session id is visible.
    pub fn private_page(id: SessionId, parent: Option<SessionId>) -> Self {
        let descriptor = SessionDescriptor { id, url: None };
        Self {
            data: Some(descriptor.encode()),
            parent,
            private: true,
            ..Default::default()
        }
    }

    /// Payload handed to a delegate window (classic or embedded). The request
    /// is passed on as received, so the URL travels in the clear.
    pub fn delegated(url: Option<&str>, private: bool, echo: &RequestEcho) -> Self {
        Self {
            data: url.map(str::to_string),
            private,
            echo: Some(echo.clone()).filter(|e| !e.is_empty()),
            ..Default::default()
        }
    }

    pub fn mini_app(app: MiniAppPayload) -> Self {
        Self {
            data: Some(app.url.clone()),
            mini_app: Some(app),
            ..Default::default()
        }
    }

    pub fn with_desktop_mode(mut self, on: bool) -> Self {
        self.desktop_mode = on;
        self
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    /// Page descriptor, if this payload addresses a per-page window.
    pub fn descriptor(&self) -> Option<SessionDescriptor> {
        self.data.as_deref().and_then(SessionDescriptor::parse)
    }

    /// URL visible in the payload. Always `None` for private pages.
    pub fn url(&self) -> Option<String> {
        match self.descriptor() {
            Some(d) => d.url,
            None => self.data.clone(),
        }
    }

    pub fn parent(&self) -> Option<SessionId> {
        self.parent
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn desktop_mode(&self) -> bool {
        self.desktop_mode
    }

    pub fn echo(&self) -> Option<&RequestEcho> {
        self.echo.as_ref()
    }

    pub fn mini_app_payload(&self) -> Option<&MiniAppPayload> {
        self.mini_app.as_ref()
    }
}

/// Trusted routing information. Never observable by page content.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSignal {
    pub stamp: AuthenticityStamp,
    pub launch_mode: LaunchMode,
    pub source: LaunchSource,
    pub transition: PageTransition,
    /// Start the window behind the current one
    pub launch_behind: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundLaunch {
    pub target: WindowClass,
    pub flags: WindowFlags,
    pub payload: VisibleRequestPayload,
    pub signal: Option<RoutingSignal>,
}

impl OutboundLaunch {
    /// Session id of the window this launch creates, for page launches.
    pub fn session_id(&self) -> Option<SessionId> {
        self.payload.descriptor().map(|d| d.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_keeps_query_in_url() {
        let d = SessionDescriptor { id: SessionId::new(3), url: Some("https://a.test/?q=1".into()) };
        assert_eq!(d.encode(), "page://3?https://a.test/?q=1");
        assert_eq!(SessionDescriptor::parse(&d.encode()), Some(d));
    }

    #[test]
    fn descriptor_rejects_foreign_data() {
        assert_eq!(SessionDescriptor::parse("https://a.test/"), None);
        assert_eq!(SessionDescriptor::parse("page://x?https://a.test/"), None);
        let bare = SessionDescriptor::parse("page://8").unwrap();
        assert_eq!(bare.id, SessionId::new(8));
        assert_eq!(bare.url, None);
    }

    #[test]
    fn private_payload_has_no_url() {
        let p = VisibleRequestPayload::private_page(SessionId::new(2), None);
        assert!(p.is_private());
        assert_eq!(p.url(), None);
        assert_eq!(p.descriptor().map(|d| d.id), Some(SessionId::new(2)));
        assert_eq!(p.echo(), None);
    }

    #[test]
    fn page_payload_exposes_url() {
        let p = VisibleRequestPayload::page(SessionId::new(4), "https://b.test/", Some(SessionId::new(1)), None);
        assert_eq!(p.url().as_deref(), Some("https://b.test/"));
        assert_eq!(p.parent(), Some(SessionId::new(1)));
    }

    #[test]
    fn page_classes() {
        assert!(WindowClass::for_page(true).is_page());
        assert!(WindowClass::Page.is_page());
        assert!(!WindowClass::ClassicTabbed.is_page());
        assert!(!WindowClass::MiniApp.is_page());
    }
}

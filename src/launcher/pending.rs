//! Side channel for launch data that must not travel in the visible payload.
//!
//! Entries are keyed by session id and consumed exactly once by the window
//! that starts with that id. Private URLs and in-flight web content handles
//! go through here.

use std::collections::HashMap;
use crate::launcher::outbound::VisibleRequestPayload;
use crate::launcher::request::RequestEcho;
use crate::launcher::session::SessionId;

/// In-flight web content handed over to a window that has not started yet.
/// It cannot be duplicated, so it is moved rather than cloned.
#[derive(Debug, PartialEq, Eq)]
pub struct WebContentHandle {
    token: u64,
    url: String,
}

impl WebContentHandle {
    pub fn new(token: u64, url: impl Into<String>) -> Self {
        Self { token, url: url.into() }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PendingLaunchData {
    pub url: Option<String>,
    pub original_request_echo: Option<RequestEcho>,
    pub web_contents: Option<WebContentHandle>,
}

impl PendingLaunchData {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// URL to load: the explicit one, else the one the web contents were created for.
    pub fn effective_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.web_contents.as_ref().map(|w| w.url()))
    }
}

/// What a starting window loads, and where it came from.
#[derive(Debug, PartialEq)]
pub struct LaunchContent {
    pub url: Option<String>,
    pub echo: Option<RequestEcho>,
    pub web_contents: Option<WebContentHandle>,
    /// True when the content was read from the side channel
    pub from_pending: bool,
}

#[derive(Debug, Default)]
pub struct PendingLaunchStore {
    entries: HashMap<SessionId, PendingLaunchData>,
}

impl PendingLaunchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `data` for `id`. An unconsumed entry for the same id is replaced.
    pub fn put(&mut self, id: SessionId, data: PendingLaunchData) {
        if self.entries.insert(id, data).is_some() {
            log::warn!("Replacing unconsumed pending launch data for session {id}");
        }
    }

    /// Removes and returns the entry for `id`.
    pub fn take(&mut self, id: SessionId) -> Option<PendingLaunchData> {
        self.entries.remove(&id)
    }

    /// Un-stages an entry whose launch did not happen.
    pub fn remove(&mut self, id: SessionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops the entries of every listed session. Returns how many were dropped.
    pub fn drop_sessions(&mut self, ids: &[SessionId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| !ids.contains(id));
        before - self.entries.len()
    }

    /// Content for the window starting as `id`. Falls back to the window's own
    /// payload when nothing was staged.
    pub fn take_or_fallback(&mut self, id: SessionId, payload: &VisibleRequestPayload) -> LaunchContent {
        match self.take(id) {
            Some(data) => LaunchContent {
                url: data.effective_url().map(str::to_string),
                echo: data.original_request_echo,
                web_contents: data.web_contents,
                from_pending: true,
            },
            None => LaunchContent {
                url: payload.url(),
                echo: payload.echo().cloned(),
                web_contents: None,
                from_pending: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_returns_entry_once() {
        let mut store = PendingLaunchStore::new();
        let id = SessionId::new(7);
        store.put(id, PendingLaunchData::with_url("https://a.test/"));

        assert_eq!(store.take(id), Some(PendingLaunchData::with_url("https://a.test/")));
        assert_eq!(store.take(id), None);
        assert!(store.is_empty());
    }

    #[test]
    fn take_on_unknown_id_is_absent() {
        let mut store = PendingLaunchStore::new();
        assert_eq!(store.take(SessionId::new(1)), None);
    }

    #[test]
    fn put_replaces_unconsumed_entry() {
        let mut store = PendingLaunchStore::new();
        let id = SessionId::new(2);
        store.put(id, PendingLaunchData::with_url("https://old.test/"));
        store.put(id, PendingLaunchData::with_url("https://new.test/"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.take(id).and_then(|d| d.url), Some("https://new.test/".into()));
    }

    #[test]
    fn web_contents_url_is_used_when_no_url() {
        let data = PendingLaunchData {
            web_contents: Some(WebContentHandle::new(42, "https://popup.test/")),
            ..Default::default()
        };
        assert_eq!(data.effective_url(), Some("https://popup.test/"));
    }

    #[test]
    fn fallback_reads_visible_payload() {
        let mut store = PendingLaunchStore::new();
        let id = SessionId::new(3);
        let payload = VisibleRequestPayload::page(id, "https://visible.test/", None, None);

        let content = store.take_or_fallback(id, &payload);
        assert!(!content.from_pending);
        assert_eq!(content.url.as_deref(), Some("https://visible.test/"));

        store.put(id, PendingLaunchData::with_url("https://staged.test/"));
        let content = store.take_or_fallback(id, &payload);
        assert!(content.from_pending);
        assert_eq!(content.url.as_deref(), Some("https://staged.test/"));
    }

    #[test]
    fn drop_sessions_only_touches_listed_ids() {
        let mut store = PendingLaunchStore::new();
        store.put(SessionId::new(1), PendingLaunchData::default());
        store.put(SessionId::new(2), PendingLaunchData::default());
        store.put(SessionId::new(3), PendingLaunchData::default());

        assert_eq!(store.drop_sessions(&[SessionId::new(1), SessionId::new(3), SessionId::new(9)]), 2);
        assert!(store.contains(SessionId::new(2)));
    }
}

//! Session registry: [`SessionRegistry`], [`SessionRecord`] and [`SessionId`].
//!
//! The registry owns session id allocation and the per-session state the
//! router needs to decide whether a window may be reused. It does not track
//! liveness: a session dies when the host removes its window, which the
//! router only ever observes through a fresh read of the window stack.

use std::collections::BTreeMap;
use std::fmt::Display;
use serde::{Deserialize, Serialize};
use crate::errors::LauncherError;

/// Identifier of a browsing session. Every session backs exactly one window.
///
/// Ids are process-unique and allocated in increasing order; an id is never
/// handed out twice within a process lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u32);

impl SessionId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for SessionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State kept for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    /// URL the session was created for. Always `None` for private sessions.
    pub url: Option<String>,
    pub private: bool,
    /// Session whose window opened this one, if any.
    pub parent: Option<SessionId>,
    /// False when the session explicitly refuses to be reused for another launch
    pub retargetable: bool,
    /// A dependent window still needs this one present
    pub covered_by_child: bool,
}

impl SessionRecord {
    pub fn new(id: SessionId, url: Option<String>, private: bool, parent: Option<SessionId>) -> Self {
        Self {
            id,
            url: if private { None } else { url },
            private,
            parent,
            retargetable: true,
            covered_by_child: false,
        }
    }
}

/// Serializable view of the registry. Private sessions never appear in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// `None` once the id space is used up
    pub next_id: Option<u32>,
    pub current: Option<SessionId>,
    pub sessions: Vec<PersistedSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub id: SessionId,
    pub url: Option<String>,
    pub parent: Option<SessionId>,
}

#[derive(Debug)]
pub struct SessionRegistry {
    next_id: Option<u32>,
    sessions: BTreeMap<SessionId, SessionRecord>,
    /// Session shown most recently in the foreground
    current: Option<SessionId>,
    /// Session the host is expected to bring up next
    prioritized: Option<SessionId>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self {
            next_id: Some(0),
            sessions: BTreeMap::new(),
            current: None,
            prioritized: None,
        }
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next session id. Ids are never reused, so the allocator
    /// fails instead of wrapping once `u32::MAX` has been handed out or seen.
    pub fn allocate(&mut self) -> Result<SessionId, LauncherError> {
        let id = self.next_id.ok_or(LauncherError::SessionIdsExhausted)?;
        self.next_id = id.checked_add(1);
        Ok(SessionId(id))
    }

    /// Makes sure the allocator never returns `id` or anything below it.
    pub fn increment_past(&mut self, id: SessionId) {
        if let Some(next) = self.next_id {
            if next <= id.0 {
                self.next_id = id.0.checked_add(1);
                if self.next_id.is_none() {
                    log::warn!("Session id {id} leaves no room for new sessions");
                }
            }
        }
    }

    /// Advances the allocator past every id in `ids`. Used on cold start so
    /// windows that survived a process restart never collide with new ones.
    pub fn increment_past_all(&mut self, ids: impl IntoIterator<Item = SessionId>) {
        for id in ids {
            self.increment_past(id);
        }
    }

    pub fn register(&mut self, record: SessionRecord) {
        self.increment_past(record.id);
        self.sessions.insert(record.id, record);
    }

    pub fn remove(&mut self, id: SessionId) -> Option<SessionRecord> {
        if self.current == Some(id) {
            self.current = None;
        }
        if self.prioritized == Some(id) {
            self.prioritized = None;
        }
        self.sessions.remove(&id)
    }

    /// Drops every private record and returns the ids that were removed.
    pub fn remove_private(&mut self) -> Vec<SessionId> {
        let ids: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|r| r.private)
            .map(|r| r.id)
            .collect();
        for id in &ids {
            self.remove(*id);
        }
        ids
    }

    pub fn get(&self, id: SessionId) -> Option<&SessionRecord> {
        self.sessions.get(&id)
    }

    pub fn is_private(&self, id: SessionId) -> bool {
        self.sessions.get(&id).is_some_and(|r| r.private)
    }

    pub fn private_count(&self) -> usize {
        self.sessions.values().filter(|r| r.private).count()
    }

    /// Unknown sessions are retargetable: they belong to windows that survived
    /// a restart and were never marked otherwise.
    pub fn is_retargetable(&self, id: SessionId) -> bool {
        self.sessions.get(&id).map_or(true, |r| r.retargetable)
    }

    pub fn is_covered_by_child(&self, id: SessionId) -> bool {
        self.sessions.get(&id).is_some_and(|r| r.covered_by_child)
    }

    pub fn set_retargetable(&mut self, id: SessionId, retargetable: bool) -> Result<(), LauncherError> {
        let record = self.sessions.get_mut(&id).ok_or(LauncherError::UnknownSession(id))?;
        record.retargetable = retargetable;
        Ok(())
    }

    pub fn set_covered_by_child(&mut self, id: SessionId, covered: bool) -> Result<(), LauncherError> {
        let record = self.sessions.get_mut(&id).ok_or(LauncherError::UnknownSession(id))?;
        record.covered_by_child = covered;
        Ok(())
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.current
    }

    pub fn set_current(&mut self, id: Option<SessionId>) {
        self.current = id;
    }

    pub fn prioritized(&self) -> Option<SessionId> {
        self.prioritized
    }

    pub fn set_prioritized(&mut self, id: SessionId) {
        self.prioritized = Some(id);
    }

    /// Snapshot suitable for durable storage. A private current session is
    /// reported as no current session at all.
    pub fn persistable_snapshot(&self) -> RegistrySnapshot {
        let current = self.current.filter(|id| !self.is_private(*id));
        RegistrySnapshot {
            next_id: self.next_id,
            current,
            sessions: self
                .sessions
                .values()
                .filter(|r| !r.private)
                .map(|r| PersistedSession {
                    id: r.id,
                    url: r.url.clone(),
                    parent: r.parent.filter(|p| !self.is_private(*p)),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_never_repeat() {
        let mut reg = SessionRegistry::new();
        let a = reg.allocate().unwrap();
        let b = reg.allocate().unwrap();
        assert!(b > a);

        reg.remove(a);
        let c = reg.allocate().unwrap();
        assert!(c > b);
    }

    #[test]
    fn increment_past_skips_surviving_windows() {
        let mut reg = SessionRegistry::new();
        reg.increment_past_all([SessionId::new(4), SessionId::new(11), SessionId::new(2)]);
        assert_eq!(reg.allocate().unwrap(), SessionId::new(12));

        // Moving backwards is a no-op
        reg.increment_past(SessionId::new(3));
        assert_eq!(reg.allocate().unwrap(), SessionId::new(13));
    }

    #[test]
    fn highest_host_id_exhausts_allocator_without_wrapping() {
        let mut reg = SessionRegistry::new();
        reg.increment_past(SessionId::new(u32::MAX));
        assert!(matches!(reg.allocate(), Err(LauncherError::SessionIdsExhausted)));

        // Lower ids seen later do not revive the allocator
        reg.increment_past(SessionId::new(3));
        assert!(matches!(reg.allocate(), Err(LauncherError::SessionIdsExhausted)));
        assert_eq!(reg.persistable_snapshot().next_id, None);
    }

    #[test]
    fn last_id_is_handed_out_once() {
        let mut reg = SessionRegistry::new();
        reg.increment_past(SessionId::new(u32::MAX - 1));
        assert_eq!(reg.allocate().unwrap(), SessionId::new(u32::MAX));
        assert!(reg.allocate().is_err());
    }

    #[test]
    fn private_record_drops_url() {
        let rec = SessionRecord::new(SessionId::new(1), Some("https://secret.test/".into()), true, None);
        assert_eq!(rec.url, None);
    }

    #[test]
    fn snapshot_never_contains_private_sessions() {
        let mut reg = SessionRegistry::new();
        reg.register(SessionRecord::new(SessionId::new(1), Some("https://a.test/".into()), false, None));
        reg.register(SessionRecord::new(SessionId::new(2), Some("https://b.test/".into()), true, None));
        reg.register(SessionRecord::new(SessionId::new(3), Some("https://c.test/".into()), false, Some(SessionId::new(2))));
        reg.set_current(Some(SessionId::new(2)));

        let snap = reg.persistable_snapshot();
        assert_eq!(snap.current, None);
        assert_eq!(snap.sessions.len(), 2);
        assert!(snap.sessions.iter().all(|s| s.id != SessionId::new(2)));
        assert_eq!(snap.sessions[1].parent, None);

        let json = serde_json::to_string(&snap).unwrap();
        assert!(!json.contains("b.test"));
    }

    #[test]
    fn flags_on_unknown_session_fail() {
        let mut reg = SessionRegistry::new();
        let err = reg.set_retargetable(SessionId::new(9), false).unwrap_err();
        assert!(matches!(err, LauncherError::UnknownSession(id) if id == SessionId::new(9)));
        assert!(reg.is_retargetable(SessionId::new(9)));
        assert!(!reg.is_covered_by_child(SessionId::new(9)));
    }

    #[test]
    fn remove_private_clears_current() {
        let mut reg = SessionRegistry::new();
        reg.register(SessionRecord::new(SessionId::new(5), None, true, None));
        reg.register(SessionRecord::new(SessionId::new(6), Some("https://x.test/".into()), false, None));
        reg.set_current(Some(SessionId::new(5)));

        let removed = reg.remove_private();
        assert_eq!(removed, vec![SessionId::new(5)]);
        assert_eq!(reg.current_session_id(), None);
        assert_eq!(reg.private_count(), 0);
        assert!(reg.get(SessionId::new(6)).is_some());
    }
}

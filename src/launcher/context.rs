use uuid::Uuid;
use crate::launcher::diagnostics::RaiseFailureCounter;
use crate::launcher::outbound::AuthenticityStamp;
use crate::launcher::pending::PendingLaunchStore;
use crate::launcher::privacy::PrivatePreferenceOverrides;
use crate::launcher::session::{SessionId, SessionRegistry};

/// Mutable routing state, owned by the router and mutated only from the
/// routing thread.
#[derive(Debug)]
pub struct RouterContext {
    pub registry: SessionRegistry,
    pub pending: PendingLaunchStore,
    pub raise_failures: RaiseFailureCounter,
    pub private_overrides: PrivatePreferenceOverrides,
    /// Per-process token stamped on every launch this router builds
    trusted: Uuid,
}

impl RouterContext {
    pub fn new(raise_failure_counter: impl Into<String>) -> Self {
        Self {
            registry: SessionRegistry::new(),
            pending: PendingLaunchStore::new(),
            raise_failures: RaiseFailureCounter::new(raise_failure_counter),
            private_overrides: PrivatePreferenceOverrides::new(),
            trusted: Uuid::new_v4(),
        }
    }

    pub fn stamp(&self) -> AuthenticityStamp {
        AuthenticityStamp::new(self.trusted)
    }

    pub fn is_trusted(&self, stamp: &AuthenticityStamp) -> bool {
        stamp.token() == self.trusted
    }

    /// Forgets everything tied to the private session: registry records,
    /// staged pending data and tracker overrides.
    pub fn end_private_session(&mut self) -> Vec<SessionId> {
        let ids = self.registry.remove_private();
        let dropped = self.pending.drop_sessions(&ids);
        self.private_overrides.clear_all();
        log::debug!("Private session ended: {} record(s), {dropped} pending entr(ies) dropped", ids.len());
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::pending::PendingLaunchData;
    use crate::launcher::privacy::TrackerDecision;
    use crate::launcher::session::SessionRecord;

    #[test]
    fn stamps_are_per_context() {
        let a = RouterContext::new("c");
        let b = RouterContext::new("c");
        assert!(a.is_trusted(&a.stamp()));
        assert!(!a.is_trusted(&b.stamp()));
    }

    #[test]
    fn private_session_end_clears_private_state_only() {
        let mut ctx = RouterContext::new("c");
        ctx.registry.register(SessionRecord::new(SessionId::new(1), None, true, None));
        ctx.registry.register(SessionRecord::new(SessionId::new(2), Some("https://a.test/".into()), false, None));
        ctx.pending.put(SessionId::new(1), PendingLaunchData::with_url("https://secret.test/"));
        ctx.pending.put(SessionId::new(2), PendingLaunchData::with_url("https://a.test/"));
        ctx.private_overrides.set("https://secret.test/", TrackerDecision::Allow);

        assert_eq!(ctx.end_private_session(), vec![SessionId::new(1)]);
        assert!(!ctx.pending.contains(SessionId::new(1)));
        assert!(ctx.pending.contains(SessionId::new(2)));
        assert!(ctx.private_overrides.is_empty());
        assert!(ctx.registry.get(SessionId::new(2)).is_some());
    }
}

//! Finding an existing window to reuse.
//!
//! Every lookup reads the host stack fresh and then acts on what it read. The
//! host may have changed in between; a raise that fails is handled, not
//! prevented.

use crate::launcher::context::RouterContext;
use crate::launcher::stack::{RaiseError, RunningWindowEntry, WindowStack, WindowStackInspector};
use crate::launcher::session::SessionId;

pub struct RetargetResolver<'a> {
    stack: &'a dyn WindowStack,
}

impl<'a> RetargetResolver<'a> {
    pub fn new(stack: &'a dyn WindowStack) -> Self {
        Self { stack }
    }

    /// Raises the window of session `id`. Returns false when there is no such
    /// window, it may not be reused, or the host refused the raise.
    pub fn retarget_by_exact_id(&self, ctx: &mut RouterContext, id: SessionId) -> bool {
        let entries = WindowStackInspector::new(self.stack).page_windows(&ctx.registry);
        let Some(entry) = entries.iter().find(|e| e.session_id == id) else {
            log::debug!("No running window for session {id}");
            return false;
        };
        if !Self::eligible(ctx, entry) {
            return false;
        }
        ctx.registry.set_prioritized(id);
        self.raise(ctx, entry)
    }

    /// Raises a window created for exactly `url` with matching privacy.
    /// Returns the session that was brought to front.
    ///
    /// Matching is plain string equality on the URL the window was launched
    /// with. No normalization of any kind.
    pub fn retarget_by_url(&self, ctx: &mut RouterContext, private: bool, url: &str) -> Option<SessionId> {
        if url.is_empty() {
            return None;
        }

        let entries = WindowStackInspector::new(self.stack).page_windows(&ctx.registry);
        for entry in entries
            .iter()
            .filter(|e| e.private == private && e.original_url.as_deref() == Some(url))
        {
            if !Self::eligible(ctx, entry) {
                continue;
            }
            ctx.registry.set_prioritized(entry.session_id);
            if self.raise(ctx, entry) {
                return Some(entry.session_id);
            }
        }
        None
    }

    /// Brings back the most recently viewed page: the current session if it
    /// can be raised, else the first reusable page window in host order.
    pub fn retarget_last_viewed(&self, ctx: &mut RouterContext) -> Option<SessionId> {
        if let Some(current) = ctx.registry.current_session_id() {
            if self.retarget_by_exact_id(ctx, current) {
                return Some(current);
            }
        }

        let entries = WindowStackInspector::new(self.stack).page_windows(&ctx.registry);
        for entry in &entries {
            if Self::eligible(ctx, entry) && self.raise(ctx, entry) {
                return Some(entry.session_id);
            }
        }
        None
    }

    fn eligible(ctx: &RouterContext, entry: &RunningWindowEntry) -> bool {
        if entry.covered_by_child {
            log::debug!("Session {} is covered by a child window", entry.session_id);
            return false;
        }
        if !ctx.registry.is_retargetable(entry.session_id) {
            log::debug!("Session {} is not retargetable", entry.session_id);
            return false;
        }
        true
    }

    fn raise(&self, ctx: &mut RouterContext, entry: &RunningWindowEntry) -> bool {
        match self.stack.move_to_front(entry.task) {
            Ok(()) => {
                ctx.registry.set_current(Some(entry.session_id));
                true
            }
            Err(e @ RaiseError::PermissionDenied { .. }) => {
                ctx.raise_failures.record_hit();
                log::warn!("{e} (session {})", entry.session_id);
                false
            }
            Err(e @ RaiseError::TaskGone { .. }) => {
                log::debug!("{e} (session {})", entry.session_id);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::host::InMemoryHost;
    use crate::launcher::outbound::WindowClass;
    use crate::launcher::session::SessionRecord;
    use crate::launcher::stack::{HostTask, TaskId};

    fn page(task: u32, session: u32, url: &str) -> HostTask {
        HostTask {
            id: TaskId::new(task),
            window_class: Some(WindowClass::Page),
            base_data: Some(format!("page://{session}?{url}")),
            current_url: Some(url.to_string()),
        }
    }

    fn ctx() -> RouterContext {
        RouterContext::new("Launcher.RaiseToFrontFailed")
    }

    #[test]
    fn exact_id_raises_and_prioritizes() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/"), page(2, 7, "https://b.test/")]);
        let mut ctx = ctx();

        assert!(RetargetResolver::new(&host).retarget_by_exact_id(&mut ctx, SessionId::new(7)));
        assert_eq!(ctx.registry.prioritized(), Some(SessionId::new(7)));
        assert_eq!(ctx.registry.current_session_id(), Some(SessionId::new(7)));
        assert_eq!(host.raised(), vec![TaskId::new(2)]);
    }

    #[test]
    fn exact_id_skips_covered_window() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/")]);
        let mut ctx = ctx();
        ctx.registry.register(SessionRecord::new(SessionId::new(3), Some("https://a.test/".into()), false, None));
        ctx.registry.set_covered_by_child(SessionId::new(3), true).unwrap();

        assert!(!RetargetResolver::new(&host).retarget_by_exact_id(&mut ctx, SessionId::new(3)));
        assert!(host.raised().is_empty());
    }

    #[test]
    fn permission_failure_is_counted_not_raised() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/")]);
        host.deny_raise(TaskId::new(1));
        let mut ctx = ctx();

        assert!(!RetargetResolver::new(&host).retarget_by_exact_id(&mut ctx, SessionId::new(3)));
        assert_eq!(ctx.raise_failures.count(), 1);
    }

    #[test]
    fn url_match_is_exact() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/path")]);
        let resolver = RetargetResolver::new(&host);
        let mut ctx = ctx();

        for near_miss in ["https://a.test/path/", "https://A.test/path", "https://a.test/Path", ""] {
            assert_eq!(resolver.retarget_by_url(&mut ctx, false, near_miss), None, "{near_miss}");
        }
        assert_eq!(resolver.retarget_by_url(&mut ctx, false, "https://a.test/path"), Some(SessionId::new(3)));
    }

    #[test]
    fn url_match_ignores_navigation() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/")]);
        host.navigate(TaskId::new(1), "https://a.test/moved");
        let mut ctx = ctx();

        let resolver = RetargetResolver::new(&host);
        assert_eq!(resolver.retarget_by_url(&mut ctx, false, "https://a.test/moved"), None);
        assert_eq!(resolver.retarget_by_url(&mut ctx, false, "https://a.test/"), Some(SessionId::new(3)));
    }

    #[test]
    fn url_match_skips_not_retargetable_and_tries_next() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/"), page(2, 4, "https://a.test/")]);
        let mut ctx = ctx();
        ctx.registry.register(SessionRecord::new(SessionId::new(3), Some("https://a.test/".into()), false, None));
        ctx.registry.set_retargetable(SessionId::new(3), false).unwrap();

        let hit = RetargetResolver::new(&host).retarget_by_url(&mut ctx, false, "https://a.test/");
        assert_eq!(hit, Some(SessionId::new(4)));
    }

    #[test]
    fn url_match_respects_privacy() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/")]);
        let mut ctx = ctx();
        assert_eq!(RetargetResolver::new(&host).retarget_by_url(&mut ctx, true, "https://a.test/"), None);
    }

    #[test]
    fn last_viewed_prefers_current_then_scans() {
        let host = InMemoryHost::with_tasks(vec![page(1, 3, "https://a.test/"), page(2, 4, "https://b.test/")]);
        let resolver = RetargetResolver::new(&host);
        let mut ctx = ctx();

        ctx.registry.set_current(Some(SessionId::new(4)));
        assert_eq!(resolver.retarget_last_viewed(&mut ctx), Some(SessionId::new(4)));

        ctx.registry.set_current(None);
        host.deny_raise(TaskId::new(2));
        // Task 2 was raised above and now sits on top, but refuses the raise
        assert_eq!(resolver.retarget_last_viewed(&mut ctx), Some(SessionId::new(3)));
        assert_eq!(ctx.raise_failures.count(), 1);
    }
}

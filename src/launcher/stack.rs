//! Read side of the host window stack.
//!
//! The host owns the stack and may reorder or evict entries at any time, so
//! nothing here is cached: every call to [`WindowStackInspector::page_windows`]
//! reads the stack again.

use std::fmt::Display;
use crate::launcher::outbound::{SessionDescriptor, WindowClass};
use crate::launcher::session::{SessionId, SessionRegistry};

/// Host task identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u32);

impl TaskId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// One entry of the host's task list as the host reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTask {
    pub id: TaskId,
    /// `None` for tasks owned by another application
    pub window_class: Option<WindowClass>,
    /// Data the task was started with
    pub base_data: Option<String>,
    /// What the window currently shows. Changes with navigation.
    pub current_url: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RaiseError {
    #[error("Raising {task} was denied: the task is owned by another identity")]
    PermissionDenied { task: TaskId },

    #[error("{task} no longer exists")]
    TaskGone { task: TaskId },
}

/// Host window stack primitives.
pub trait WindowStack: Send + Sync {
    /// Current task list, most recent first. Order is not stable across calls.
    fn tasks(&self) -> Vec<HostTask>;

    /// Privileged raise-to-front.
    fn move_to_front(&self, task: TaskId) -> Result<(), RaiseError>;

    /// Finishes the task and evicts it from recents. Returns false if it was already gone.
    fn finish_and_remove(&self, task: TaskId) -> bool;
}

/// A running per-page window, as seen by the router.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningWindowEntry {
    pub task: TaskId,
    pub window_class: WindowClass,
    pub session_id: SessionId,
    /// URL from the launch descriptor. Navigation never changes it.
    pub original_url: Option<String>,
    pub covered_by_child: bool,
    pub private: bool,
}

pub struct WindowStackInspector<'a> {
    stack: &'a dyn WindowStack,
}

impl<'a> WindowStackInspector<'a> {
    pub fn new(stack: &'a dyn WindowStack) -> Self {
        Self { stack }
    }

    /// Per-page windows in host enumeration order.
    pub fn page_windows(&self, registry: &SessionRegistry) -> Vec<RunningWindowEntry> {
        self.stack
            .tasks()
            .iter()
            .filter_map(|task| Self::entry(task, registry))
            .collect()
    }

    /// Session ids of every per-page window the host still shows.
    pub fn running_session_ids(&self) -> Vec<SessionId> {
        self.stack
            .tasks()
            .iter()
            .filter(|t| t.window_class.is_some_and(WindowClass::is_page))
            .filter_map(|t| t.base_data.as_deref().and_then(SessionDescriptor::parse))
            .map(|d| d.id)
            .collect()
    }

    /// Tasks of our own application that belong to `class`.
    pub fn tasks_of_class(&self, class: impl Fn(WindowClass) -> bool) -> Vec<TaskId> {
        self.stack
            .tasks()
            .iter()
            .filter(|t| t.window_class.is_some_and(&class))
            .map(|t| t.id)
            .collect()
    }

    fn entry(task: &HostTask, registry: &SessionRegistry) -> Option<RunningWindowEntry> {
        let window_class = task.window_class.filter(|c| c.is_page())?;
        let descriptor = task.base_data.as_deref().and_then(SessionDescriptor::parse)?;
        Some(RunningWindowEntry {
            task: task.id,
            window_class,
            session_id: descriptor.id,
            original_url: descriptor.url,
            covered_by_child: registry.is_covered_by_child(descriptor.id),
            private: window_class == WindowClass::PrivatePage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::host::InMemoryHost;

    fn task(id: u32, class: Option<WindowClass>, data: Option<&str>, current: Option<&str>) -> HostTask {
        HostTask {
            id: TaskId::new(id),
            window_class: class,
            base_data: data.map(str::to_string),
            current_url: current.map(str::to_string),
        }
    }

    #[test]
    fn original_url_comes_from_descriptor_not_current_page() {
        let host = InMemoryHost::with_tasks(vec![task(
            1,
            Some(WindowClass::Page),
            Some("page://4?https://a.test/"),
            Some("https://a.test/elsewhere"),
        )]);
        let registry = SessionRegistry::new();
        let entries = WindowStackInspector::new(&host).page_windows(&registry);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, SessionId::new(4));
        assert_eq!(entries[0].original_url.as_deref(), Some("https://a.test/"));
    }

    #[test]
    fn foreign_and_non_page_tasks_are_skipped() {
        let host = InMemoryHost::with_tasks(vec![
            task(1, None, Some("page://1?https://a.test/"), None),
            task(2, Some(WindowClass::ClassicTabbed), None, None),
            task(3, Some(WindowClass::PrivatePage), Some("page://9?"), None),
            task(4, Some(WindowClass::Page), Some("garbage"), None),
        ]);
        let registry = SessionRegistry::new();
        let inspector = WindowStackInspector::new(&host);
        let entries = inspector.page_windows(&registry);

        assert_eq!(entries.len(), 1);
        assert!(entries[0].private);
        assert_eq!(entries[0].original_url, None);
        assert_eq!(inspector.running_session_ids(), vec![SessionId::new(9)]);
        assert_eq!(inspector.tasks_of_class(|c| c == WindowClass::ClassicTabbed), vec![TaskId::new(2)]);
    }

    #[test]
    fn covered_flag_comes_from_registry() {
        use crate::launcher::session::SessionRecord;

        let host = InMemoryHost::with_tasks(vec![task(1, Some(WindowClass::Page), Some("page://2?https://a.test/"), None)]);
        let mut registry = SessionRegistry::new();
        registry.register(SessionRecord::new(SessionId::new(2), Some("https://a.test/".into()), false, None));
        registry.set_covered_by_child(SessionId::new(2), true).unwrap();

        let entries = WindowStackInspector::new(&host).page_windows(&registry);
        assert!(entries[0].covered_by_child);
    }
}

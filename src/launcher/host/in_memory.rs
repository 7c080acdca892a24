use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use crate::launcher::host::{Teardown, WindowLauncher};
use crate::launcher::outbound::OutboundLaunch;
use crate::launcher::stack::{HostTask, RaiseError, TaskId, WindowStack};

const FIRST_STARTED_TASK: u32 = 1000;

/// Host simulated in memory. Started windows become tasks on the stack, so
/// later requests can retarget them.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

#[derive(Debug, Default)]
struct HostState {
    tasks: Vec<HostTask>,
    next_task: u32,
    denied: HashSet<TaskId>,
    launches: Vec<OutboundLaunch>,
    raised: Vec<TaskId>,
    teardowns: Vec<Teardown>,
    notification_settings_opened: usize,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose stack starts out with `tasks`, most recent first.
    pub fn with_tasks(tasks: Vec<HostTask>) -> Self {
        let host = Self::default();
        host.state().tasks = tasks;
        host
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every raise of `task` fail with a permission error.
    pub fn deny_raise(&self, task: TaskId) {
        self.state().denied.insert(task);
    }

    /// Simulates navigation inside a window.
    pub fn navigate(&self, task: TaskId, url: &str) {
        if let Some(t) = self.state().tasks.iter_mut().find(|t| t.id == task) {
            t.current_url = Some(url.to_string());
        }
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.state().tasks.iter().map(|t| t.id).collect()
    }

    pub fn launches(&self) -> Vec<OutboundLaunch> {
        self.state().launches.clone()
    }

    pub fn raised(&self) -> Vec<TaskId> {
        self.state().raised.clone()
    }

    pub fn teardowns(&self) -> Vec<Teardown> {
        self.state().teardowns.clone()
    }

    pub fn notification_settings_opened(&self) -> usize {
        self.state().notification_settings_opened
    }
}

impl WindowStack for InMemoryHost {
    fn tasks(&self) -> Vec<HostTask> {
        self.state().tasks.clone()
    }

    fn move_to_front(&self, task: TaskId) -> Result<(), RaiseError> {
        let mut state = self.state();
        if state.denied.contains(&task) {
            return Err(RaiseError::PermissionDenied { task });
        }
        let pos = state
            .tasks
            .iter()
            .position(|t| t.id == task)
            .ok_or(RaiseError::TaskGone { task })?;
        let raised = state.tasks.remove(pos);
        state.tasks.insert(0, raised);
        state.raised.push(task);
        Ok(())
    }

    fn finish_and_remove(&self, task: TaskId) -> bool {
        let mut state = self.state();
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != task);
        state.tasks.len() != before
    }
}

impl WindowLauncher for InMemoryHost {
    fn start_window(&self, launch: OutboundLaunch) {
        let mut state = self.state();
        let id = TaskId::new(FIRST_STARTED_TASK + state.next_task);
        state.next_task += 1;

        let task = HostTask {
            id,
            window_class: Some(launch.target),
            base_data: launch.payload.data().map(str::to_string),
            current_url: launch.payload.url(),
        };
        let behind = launch.signal.as_ref().is_some_and(|s| s.launch_behind);
        let pos = if behind { state.tasks.len().min(1) } else { 0 };
        state.tasks.insert(pos, task);
        state.launches.push(launch);
    }

    fn open_notification_settings(&self) {
        self.state().notification_settings_opened += 1;
    }

    fn finish_launcher(&self, teardown: Teardown) {
        self.state().teardowns.push(teardown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::outbound::{VisibleRequestPayload, WindowClass, WindowFlags};
    use crate::launcher::session::SessionId;

    fn plain(id: u32) -> HostTask {
        HostTask { id: TaskId::new(id), window_class: Some(WindowClass::Page), base_data: None, current_url: None }
    }

    #[test]
    fn raise_moves_task_to_front() {
        let host = InMemoryHost::with_tasks(vec![plain(1), plain(2)]);
        host.move_to_front(TaskId::new(2)).unwrap();
        assert_eq!(host.task_ids(), vec![TaskId::new(2), TaskId::new(1)]);
    }

    #[test]
    fn denied_and_missing_raises() {
        let host = InMemoryHost::with_tasks(vec![plain(1)]);
        host.deny_raise(TaskId::new(1));
        assert_eq!(
            host.move_to_front(TaskId::new(1)),
            Err(RaiseError::PermissionDenied { task: TaskId::new(1) })
        );
        assert_eq!(
            host.move_to_front(TaskId::new(9)),
            Err(RaiseError::TaskGone { task: TaskId::new(9) })
        );
    }

    #[test]
    fn started_window_lands_on_stack() {
        let host = InMemoryHost::new();
        host.start_window(OutboundLaunch {
            target: WindowClass::Page,
            flags: WindowFlags::NEW_DOCUMENT,
            payload: VisibleRequestPayload::page(SessionId::new(1), "https://a.test/", None, None),
            signal: None,
        });

        let tasks = host.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].base_data.as_deref(), Some("page://1?https://a.test/"));
        assert_eq!(host.launches().len(), 1);
    }
}

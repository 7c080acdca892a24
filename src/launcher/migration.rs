use crate::errors::LauncherError;
use crate::launcher::services::{PreferenceStore, PREF_MIGRATION_PENDING, PREF_OPTED_OUT_OF_PAGE_MODE};
use crate::launcher::stack::{TaskId, WindowStack, WindowStackInspector};

/// Evicts the windows of the previous browsing mode after the page mode
/// preference flips. The window running the sweep is never touched.
pub struct MigrationSweeper<'a> {
    stack: &'a dyn WindowStack,
    own_task: TaskId,
}

impl<'a> MigrationSweeper<'a> {
    pub fn new(stack: &'a dyn WindowStack, own_task: TaskId) -> Self {
        Self { stack, own_task }
    }

    /// Sweeps if the preference store says a migration is pending, then clears
    /// the pending flag. Returns the number of windows finished.
    pub fn maybe_perform(&self, prefs: &dyn PreferenceStore) -> Result<usize, LauncherError> {
        if !prefs.get_bool(PREF_MIGRATION_PENDING).unwrap_or(false) {
            return Ok(0);
        }

        // Opting out means we are leaving page mode.
        let from_page_mode = prefs.get_bool(PREF_OPTED_OUT_OF_PAGE_MODE).unwrap_or(false);
        let finished = self.sweep(from_page_mode);

        prefs
            .set_bool(PREF_MIGRATION_PENDING, false)
            .map_err(|e| LauncherError::Preferences(format!("{e:#}")))?;
        Ok(finished)
    }

    /// Finishes every window that belongs to the mode being left.
    pub fn sweep(&self, from_page_mode: bool) -> usize {
        let inspector = WindowStackInspector::new(self.stack);
        let stale = inspector.tasks_of_class(|class| class.is_page() == from_page_mode);

        let mut finished = 0;
        for task in stale.into_iter().filter(|t| *t != self.own_task) {
            if self.stack.finish_and_remove(task) {
                finished += 1;
            }
        }

        log::info!(
            "Migration sweep from {} mode finished {finished} window(s)",
            if from_page_mode { "page" } else { "classic" }
        );
        finished
    }
}

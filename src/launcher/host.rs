//! Write side of the host: starting windows and tearing down the launcher.
//!
//! The read side (task list, raise-to-front, eviction) is [`WindowStack`](crate::launcher::stack::WindowStack).

mod in_memory;

pub use in_memory::InMemoryHost;

use crate::launcher::outbound::OutboundLaunch;

/// What happens to the launcher window once a request has been routed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Teardown {
    /// Finish the launcher window
    Finish,
    /// Finish and evict the launcher task from recents
    FinishAndRemove,
}

pub trait WindowLauncher: Send + Sync {
    /// Starts a new window for `launch`.
    fn start_window(&self, launch: OutboundLaunch);

    fn open_notification_settings(&self);

    fn finish_launcher(&self, teardown: Teardown);
}

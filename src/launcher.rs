//! Launch routing: [`LaunchRouter`], the [`SessionRegistry`] and the window stack plumbing.
//!
//! # Concepts
//!
//! - **Session registry**: allocates [`SessionId`]s and keeps per-session state
//!   (private flag, parent, retargetable, covered by a child window).
//! - **Window stack inspector**: fresh, read-only view of the host's running
//!   page windows, keyed by the descriptor each window was launched with.
//! - **Pending launch store**: side channel for data that must not appear in a
//!   visible launch payload (private URLs, in-flight web contents).
//! - **Retarget resolver**: finds a window to reuse and raises it.
//! - **Launch router**: the decision table every inbound request goes through.
//! - **Migration sweeper**: evicts old-mode windows after the page mode flips.
//!
//! The host is reached through two traits: [`WindowStack`] to read and raise
//! tasks, and [`WindowLauncher`] to start windows. [`InMemoryHost`] implements
//! both for tests and the demo.

pub mod context;
pub mod diagnostics;
pub mod host;
pub mod landing;
pub mod migration;
pub mod outbound;
pub mod pending;
pub mod privacy;
pub mod request;
pub mod resolver;
pub mod router;
pub mod services;
pub mod session;
pub mod stack;

pub use context::RouterContext;
pub use diagnostics::RaiseFailureCounter;
pub use host::{InMemoryHost, Teardown, WindowLauncher};
pub use migration::MigrationSweeper;
pub use outbound::{
    AuthenticityStamp, LaunchMode, LaunchSource, OutboundLaunch, PageTransition, RoutingSignal,
    SessionDescriptor, VisibleRequestPayload, WindowClass, WindowFlags,
};
pub use pending::{LaunchContent, PendingLaunchData, PendingLaunchStore, WebContentHandle};
pub use privacy::{PrivatePreferenceOverrides, TrackerDecision};
pub use request::{LaunchAction, LaunchFlags, LaunchRequest, MiniAppSpec, RequestEcho};
pub use resolver::RetargetResolver;
pub use router::{IgnoreReason, LaunchRouter, PageLaunchParams, PageOutcome, Phase, RouteDecision, RouteOutcome};
pub use services::{
    FirstRunFlow, FirstRunResult, LandingPageProvider, LauncherServices, MiniAppVerifier, PreferenceStore,
    PrivateKeyStore,
};
pub use session::{SessionId, SessionRecord, SessionRegistry};
pub use stack::{HostTask, RaiseError, RunningWindowEntry, TaskId, WindowStack, WindowStackInspector};

//! The launch router.
//!
//! [`LaunchRouter::route`] takes one inbound [`LaunchRequest`] to a terminal
//! [`RouteDecision`]. The decision table is evaluated top to bottom and the
//! first matching rule wins:
//!
//! 1. embedded mode + append + URL: delegate to an embedded window
//! 2. mini-app request: start the mini-app, or downgrade to a plain VIEW
//! 3. page mode off: delegate to the classic tabbed window
//! 4. close all private sessions
//! 5. notification settings
//! 6. first run, once, then back to 1 with the same request
//! 7. retarget an existing page window or create a new one
//!
//! There are two suspension points: the first run flow and the landing page
//! lookup (plus key restoration for private launches). All of them race
//! against the router's liveness token; a step that finishes after the
//! launcher was torn down is dropped.

use std::sync::Arc;
use base64::Engine as _;
use tokio_util::sync::CancellationToken;
use crate::config::LauncherConfig;
use crate::errors::LauncherError;
use crate::launcher::context::RouterContext;
use crate::launcher::host::{Teardown, WindowLauncher};
use crate::launcher::landing::resolve_landing_page;
use crate::launcher::migration::MigrationSweeper;
use crate::launcher::outbound::{
    LaunchMode, LaunchSource, MiniAppPayload, OutboundLaunch, PageTransition, RoutingSignal,
    VisibleRequestPayload, WindowClass, WindowFlags,
};
use crate::launcher::pending::{LaunchContent, PendingLaunchData};
use crate::launcher::request::{is_content_url, LaunchAction, LaunchFlags, LaunchRequest, RequestEcho};
use crate::launcher::resolver::RetargetResolver;
use crate::launcher::services::{FirstRunResult, LauncherServices, PREF_OPTED_OUT_OF_PAGE_MODE};
use crate::launcher::session::{SessionId, SessionRecord};
use crate::launcher::stack::{TaskId, WindowStack, WindowStackInspector};

/// Where the router is relative to the first run flow.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    PreFirstRun,
    /// First run completed; it is not checked again for this request
    PostFirstRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The active page was told to load the new URL
    Clobbered(SessionId),
    /// An existing window was brought to front
    Retargeted(SessionId),
    /// A new window was started
    Created(SessionId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NoUrl,
    UnsupportedAction(String),
    IncompleteMiniApp,
    NothingToBringToFront,
    LaunchFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    DelegateEmbedded,
    DelegateMiniApp,
    DelegateClassicWindow,
    CloseAllPrivate { closed: usize },
    OpenNotificationSettings,
    /// The first run flow was aborted
    RunFirstRun,
    Page(PageOutcome),
    /// Nothing was launched
    Ignored(IgnoreReason),
    /// The launcher went away while routing was suspended
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    pub decision: RouteDecision,
    /// `None` when the launcher is already gone
    pub teardown: Option<Teardown>,
}

/// Parameters of a page launch requested by another window.
#[derive(Debug, Default)]
pub struct PageLaunchParams {
    pub private: bool,
    pub launch_mode: LaunchMode,
    pub url: Option<String>,
    pub source: LaunchSource,
    pub transition: PageTransition,
    pub desktop_mode: bool,
    /// Data to stage for the new window
    pub pending: Option<PendingLaunchData>,
    /// Session of the window asking for the launch
    pub opener: Option<SessionId>,
}

enum Step {
    Done(RouteDecision, Option<Teardown>),
    NeedsFirstRun(LaunchRequest),
}

enum MiniAppAttempt {
    Launched,
    Fallback(String),
}

/// Everything needed to start one page window.
struct PageWindowSpec {
    url: String,
    private: bool,
    parent: Option<SessionId>,
    affiliated: bool,
    append: bool,
    echo: Option<RequestEcho>,
    pending: Option<PendingLaunchData>,
    launch_mode: LaunchMode,
    source: LaunchSource,
    transition: PageTransition,
    desktop_mode: bool,
}

impl PageWindowSpec {
    fn new(url: String, private: bool) -> Self {
        Self {
            url,
            private,
            parent: None,
            affiliated: false,
            append: false,
            echo: None,
            pending: None,
            launch_mode: LaunchMode::Foreground,
            source: LaunchSource::External,
            transition: PageTransition::Link,
            desktop_mode: false,
        }
    }
}

pub struct LaunchRouter {
    config: LauncherConfig,
    ctx: RouterContext,
    services: LauncherServices,
    stack: Arc<dyn WindowStack>,
    launcher: Arc<dyn WindowLauncher>,
    /// Task of the launcher window itself
    own_task: TaskId,
    liveness: CancellationToken,
}

impl LaunchRouter {
    pub fn new(
        config: LauncherConfig,
        services: LauncherServices,
        stack: Arc<dyn WindowStack>,
        launcher: Arc<dyn WindowLauncher>,
        own_task: TaskId,
    ) -> Self {
        let mut ctx = RouterContext::new(config.raise_failure_counter.clone());

        // Windows that outlived the previous process keep their ids
        let running = WindowStackInspector::new(stack.as_ref()).running_session_ids();
        ctx.registry.increment_past_all(running);

        Self {
            config,
            ctx,
            services,
            stack,
            launcher,
            own_task,
            liveness: CancellationToken::new(),
        }
    }

    /// Router over a host that implements both halves of the host interface.
    pub fn with_host<H>(config: LauncherConfig, services: LauncherServices, host: Arc<H>, own_task: TaskId) -> Self
    where
        H: WindowStack + WindowLauncher + 'static,
    {
        let stack: Arc<dyn WindowStack> = host.clone();
        let launcher: Arc<dyn WindowLauncher> = host;
        Self::new(config, services, stack, launcher, own_task)
    }

    /// Token the host cancels when the launcher window is torn down.
    pub fn liveness(&self) -> CancellationToken {
        self.liveness.clone()
    }

    pub fn context(&self) -> &RouterContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut RouterContext {
        &mut self.ctx
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Routes one inbound request to a terminal decision and tears down the
    /// launcher accordingly.
    pub async fn route(&mut self, request: LaunchRequest) -> RouteOutcome {
        let sweeper = MigrationSweeper::new(self.stack.as_ref(), self.own_task);
        if let Err(e) = sweeper.maybe_perform(self.services.prefs.as_ref()) {
            log::error!("Migration sweep failed: {e}");
        }

        let action = request.action().clone();
        let mut phase = Phase::PreFirstRun;
        let mut request = request;

        let (decision, teardown) = loop {
            match self.evaluate(phase, request).await {
                Step::Done(decision, teardown) => break (decision, teardown),
                Step::NeedsFirstRun(pending_request) => {
                    let first_run = self.services.first_run.clone();
                    let result = tokio::select! {
                        _ = self.liveness.cancelled() => None,
                        result = first_run.run(&pending_request) => Some(result),
                    };

                    match result {
                        _ if self.liveness.is_cancelled() => {
                            log::debug!("First run finished after the launcher was torn down");
                            break (RouteDecision::Dropped, None);
                        }
                        Some(FirstRunResult::Completed) => {
                            phase = Phase::PostFirstRun;
                            request = pending_request;
                        }
                        _ => break (RouteDecision::RunFirstRun, Some(Teardown::FinishAndRemove)),
                    }
                }
            }
        };

        match &decision {
            RouteDecision::Ignored(reason) => log::warn!("Ignoring {action} request: {reason:?}"),
            decision => log::debug!("Routed {action} request: {decision:?}"),
        }
        if let Some(teardown) = teardown {
            self.launcher.finish_launcher(teardown);
        }
        RouteOutcome { decision, teardown }
    }

    async fn evaluate(&mut self, phase: Phase, mut request: LaunchRequest) -> Step {
        if self.config.embedded_mode_enabled && request.has(LaunchFlags::APPEND) && request.url().is_some() {
            let launch = self.delegate(WindowClass::Embedded, WindowFlags::empty(), &request);
            self.launcher.start_window(launch);
            return Step::Done(RouteDecision::DelegateEmbedded, Some(Teardown::Finish));
        }

        if request.wants_mini_app() {
            match self.launch_mini_app(&request) {
                Ok(MiniAppAttempt::Launched) => {
                    return Step::Done(RouteDecision::DelegateMiniApp, Some(Teardown::FinishAndRemove));
                }
                Ok(MiniAppAttempt::Fallback(url)) => request = request.into_view_fallback(url),
                Err(e) => {
                    log::warn!("{e}");
                    return Step::Done(
                        RouteDecision::Ignored(IgnoreReason::IncompleteMiniApp),
                        Some(Teardown::FinishAndRemove),
                    );
                }
            }
        }

        if !self.page_mode_enabled() {
            let flags = WindowFlags::CLEAR_TOP | WindowFlags::NEW_TASK | WindowFlags::RETAIN_IN_RECENTS;
            let launch = self.delegate(WindowClass::ClassicTabbed, flags, &request);
            self.launcher.start_window(launch);
            return Step::Done(RouteDecision::DelegateClassicWindow, Some(Teardown::Finish));
        }

        if *request.action() == LaunchAction::CloseAllPrivate {
            let closed = self.close_all_private();
            return Step::Done(RouteDecision::CloseAllPrivate { closed }, Some(Teardown::FinishAndRemove));
        }

        if request.wants_notification_settings() {
            self.launcher.open_notification_settings();
            return Step::Done(RouteDecision::OpenNotificationSettings, Some(Teardown::Finish));
        }

        if phase == Phase::PreFirstRun && self.services.first_run.is_required(&request) {
            return Step::NeedsFirstRun(request);
        }

        self.retarget_or_create(&request).await
    }

    fn page_mode_enabled(&self) -> bool {
        self.config.page_mode_supported
            && !self.services.prefs.get_bool(PREF_OPTED_OUT_OF_PAGE_MODE).unwrap_or(false)
    }

    fn signal(&self, launch_mode: LaunchMode, source: LaunchSource, transition: PageTransition) -> RoutingSignal {
        RoutingSignal {
            stamp: self.ctx.stamp(),
            launch_mode,
            source,
            transition,
            launch_behind: false,
        }
    }

    /// Passes the request on to a window that does its own routing.
    fn delegate(&self, target: WindowClass, mut flags: WindowFlags, request: &LaunchRequest) -> OutboundLaunch {
        if request.url().is_some_and(is_content_url) {
            flags |= WindowFlags::GRANT_READ_URI;
        }
        if self.config.multi_instance {
            flags |= WindowFlags::MULTIPLE_TASK;
        }
        OutboundLaunch {
            target,
            flags,
            payload: VisibleRequestPayload::delegated(request.url(), request.is_private(), request.echo()),
            signal: Some(self.signal(LaunchMode::Foreground, LaunchSource::External, PageTransition::Link)),
        }
    }

    fn launch_mini_app(&self, request: &LaunchRequest) -> Result<MiniAppAttempt, LauncherError> {
        let spec = request.mini_app().ok_or(LauncherError::IncompleteMiniApp)?;
        let (Some(id), Some(url)) = (spec.id.clone(), spec.url.clone()) else {
            return Err(LauncherError::IncompleteMiniApp);
        };

        let mac = match spec.mac.as_deref().map(|m| base64::engine::general_purpose::STANDARD.decode(m)) {
            Some(Ok(mac)) => mac,
            Some(Err(e)) => {
                log::warn!("{}", LauncherError::InvalidMiniAppMac(e));
                return Ok(MiniAppAttempt::Fallback(url));
            }
            None => return Ok(MiniAppAttempt::Fallback(url)),
        };

        if !self.services.verifier.is_url_valid(&url, &mac) {
            log::error!("Mini-app shortcut for {url} failed verification, opening it as a page");
            return Ok(MiniAppAttempt::Fallback(url));
        }

        let app = MiniAppPayload::from_spec(id, url, spec);
        self.launcher.start_window(OutboundLaunch {
            target: WindowClass::MiniApp,
            flags: WindowFlags::NEW_TASK | WindowFlags::NEW_DOCUMENT,
            payload: VisibleRequestPayload::mini_app(app),
            signal: Some(self.signal(LaunchMode::Foreground, LaunchSource::External, PageTransition::AutoToplevel)),
        });
        Ok(MiniAppAttempt::Launched)
    }

    /// Closes every private page window and ends the private session.
    fn close_all_private(&mut self) -> usize {
        let inspector = WindowStackInspector::new(self.stack.as_ref());
        let closed = inspector
            .tasks_of_class(|c| c == WindowClass::PrivatePage)
            .into_iter()
            .filter(|task| self.stack.finish_and_remove(*task))
            .count();
        self.ctx.end_private_session();
        log::info!("Closed {closed} private window(s)");
        closed
    }

    async fn retarget_or_create(&mut self, request: &LaunchRequest) -> Step {
        if request.is_main_family() {
            return self.handle_main(request).await;
        }

        if *request.action() != LaunchAction::View {
            let action = request.action().to_string();
            return Step::Done(
                RouteDecision::Ignored(IgnoreReason::UnsupportedAction(action)),
                Some(Teardown::FinishAndRemove),
            );
        }

        let Some(url) = request.url() else {
            return Step::Done(RouteDecision::Ignored(IgnoreReason::NoUrl), Some(Teardown::FinishAndRemove));
        };

        let private = request.is_private();
        if request.has(LaunchFlags::CLOBBER) {
            if let Some(id) = self.clobber_current(url, private, request.echo()) {
                return Step::Done(RouteDecision::Page(PageOutcome::Clobbered(id)), Some(Teardown::FinishAndRemove));
            }
        }

        let append = request.has(LaunchFlags::APPEND);
        if request.has(LaunchFlags::REUSE_MATCHING_ELSE_NEW) && !append {
            let hit = RetargetResolver::new(self.stack.as_ref()).retarget_by_url(&mut self.ctx, private, url);
            if let Some(id) = hit {
                return Step::Done(RouteDecision::Page(PageOutcome::Retargeted(id)), Some(Teardown::FinishAndRemove));
            }
        }

        let spec = PageWindowSpec {
            affiliated: request.has(LaunchFlags::OPEN_IN_BACKGROUND) && !private,
            append,
            echo: Some(request.echo().clone()).filter(|e| !e.is_empty()),
            ..PageWindowSpec::new(url.to_string(), private)
        };
        match self.fire_page_window(spec).await {
            Ok(id) => Step::Done(RouteDecision::Page(PageOutcome::Created(id)), Some(Teardown::FinishAndRemove)),
            Err(e) => self.failed(e),
        }
    }

    /// Stages `url` for the active page and raises it. The staged entry is
    /// removed again when the raise does not happen. Only a page of the same
    /// privacy as the request can be clobbered.
    fn clobber_current(&mut self, url: &str, private: bool, echo: &RequestEcho) -> Option<SessionId> {
        let id = self.ctx.registry.current_session_id()?;
        let window_private = WindowStackInspector::new(self.stack.as_ref())
            .page_windows(&self.ctx.registry)
            .iter()
            .find(|e| e.session_id == id)
            .map(|e| e.private)
            .unwrap_or_else(|| self.ctx.registry.is_private(id));
        if window_private != private {
            log::debug!("Not clobbering session {id}: privacy differs from the request");
            return None;
        }
        self.ctx.pending.put(
            id,
            PendingLaunchData {
                url: Some(url.to_string()),
                original_request_echo: Some(echo.clone()),
                web_contents: None,
            },
        );

        if RetargetResolver::new(self.stack.as_ref()).retarget_by_exact_id(&mut self.ctx, id) {
            return Some(id);
        }
        self.ctx.pending.remove(id);
        None
    }

    async fn handle_main(&mut self, request: &LaunchRequest) -> Step {
        let resolver = RetargetResolver::new(self.stack.as_ref());
        if let Some(id) = request.target_session() {
            if resolver.retarget_by_exact_id(&mut self.ctx, id) {
                return Step::Done(RouteDecision::Page(PageOutcome::Retargeted(id)), Some(Teardown::FinishAndRemove));
            }
        }

        if !self.config.multi_instance {
            if let Some(id) = resolver.retarget_last_viewed(&mut self.ctx) {
                return Step::Done(RouteDecision::Page(PageOutcome::Retargeted(id)), Some(Teardown::FinishAndRemove));
            }
        }

        if *request.action() == LaunchAction::BringToFront {
            return Step::Done(
                RouteDecision::Ignored(IgnoreReason::NothingToBringToFront),
                Some(Teardown::FinishAndRemove),
            );
        }

        let Some(url) = resolve_landing_page(
            self.services.landing.as_ref(),
            self.config.landing_page_timeout,
            &self.config.fallback_landing_url,
            &self.liveness,
        )
        .await
        else {
            return Step::Done(RouteDecision::Dropped, None);
        };

        let (launch_mode, teardown) = if self.config.multi_instance {
            (LaunchMode::Foreground, Teardown::Finish)
        } else {
            (LaunchMode::Retarget, Teardown::FinishAndRemove)
        };
        let params = PageLaunchParams {
            launch_mode,
            url: Some(url),
            source: LaunchSource::Launcher,
            transition: PageTransition::AutoToplevel,
            ..Default::default()
        };
        match self.launch_page_instance(params).await {
            Ok(outcome) => Step::Done(RouteDecision::Page(outcome), Some(teardown)),
            Err(e) => self.failed(e),
        }
    }

    fn failed(&self, e: LauncherError) -> Step {
        match e {
            LauncherError::LauncherGone => Step::Done(RouteDecision::Dropped, None),
            e => {
                log::error!("Page launch failed: {e}");
                Step::Done(
                    RouteDecision::Ignored(IgnoreReason::LaunchFailed(e.to_string())),
                    Some(Teardown::FinishAndRemove),
                )
            }
        }
    }

    /// Opens a page on behalf of another window (window.open, background
    /// tabs, contextual search, the launcher's own landing page).
    ///
    /// Without an explicit URL the staged pending data supplies it. A
    /// [`LaunchMode::Retarget`] launch first tries to reuse a window for the
    /// same URL and cannot carry pending data.
    pub async fn launch_page_instance(&mut self, params: PageLaunchParams) -> Result<PageOutcome, LauncherError> {
        let PageLaunchParams { private, launch_mode, url, source, transition, desktop_mode, pending, opener } = params;

        let url = url
            .filter(|u| !u.trim().is_empty())
            .or_else(|| pending.as_ref().and_then(|p| p.effective_url().map(str::to_string)))
            .ok_or(LauncherError::NoUrl)?;

        if launch_mode == LaunchMode::Retarget {
            debug_assert!(pending.is_none(), "a retargeted launch cannot deliver pending data");
            let hit = RetargetResolver::new(self.stack.as_ref()).retarget_by_url(&mut self.ctx, private, &url);
            if let Some(id) = hit {
                return Ok(PageOutcome::Retargeted(id));
            }
        }

        let parent = match (launch_mode, source) {
            (LaunchMode::Affiliated, _) | (_, LaunchSource::WindowOpen | LaunchSource::ContextualSearch) => opener,
            _ => None,
        };

        let spec = PageWindowSpec {
            parent,
            affiliated: launch_mode == LaunchMode::Affiliated && !private,
            pending,
            launch_mode,
            source,
            transition,
            desktop_mode,
            ..PageWindowSpec::new(url, private)
        };
        let id = self.fire_page_window(spec).await?;
        Ok(PageOutcome::Created(id))
    }

    async fn fire_page_window(&mut self, spec: PageWindowSpec) -> Result<SessionId, LauncherError> {
        let PageWindowSpec {
            url,
            private,
            parent,
            affiliated,
            append,
            echo,
            mut pending,
            launch_mode,
            source,
            transition,
            desktop_mode,
        } = spec;
        debug_assert!(!(affiliated && private), "private launches are never affiliated");

        let id = self.ctx.registry.allocate()?;

        let mut flags = WindowFlags::empty();
        if !append {
            flags |= WindowFlags::NEW_DOCUMENT;
        }
        if !private {
            flags |= WindowFlags::RETAIN_IN_RECENTS;
        }
        if self.config.multi_instance {
            flags |= WindowFlags::MULTIPLE_TASK;
        }
        if is_content_url(&url) {
            flags |= WindowFlags::GRANT_READ_URI;
        }
        flags.remove(WindowFlags::EXCLUDE_FROM_RECENTS);

        let payload = if private {
            // The URL and the request echo travel through the pending store only
            let data = pending.get_or_insert_with(PendingLaunchData::default);
            debug_assert!(
                data.url.is_none() || data.url.as_deref() == Some(url.as_str()),
                "private pending data already names another URL"
            );
            data.url = Some(url.clone());
            if data.original_request_echo.is_none() {
                data.original_request_echo = echo;
            }
            VisibleRequestPayload::private_page(id, parent)
        } else {
            VisibleRequestPayload::page(id, &url, parent, echo)
        };
        let payload = payload.with_desktop_mode(desktop_mode);
        debug_assert!(!private || payload.url().is_none(), "private URL leaked into the visible payload");

        let web_contents_pending = pending.as_ref().is_some_and(|p| p.web_contents.is_some());
        let staged = pending.is_some();
        if let Some(data) = pending {
            self.ctx.pending.put(id, data);
        }

        if private && !self.services.keys.has_key() {
            if let Err(e) = self.restore_private_key().await {
                if staged {
                    self.ctx.pending.remove(id);
                }
                return Err(e);
            }
        }

        self.ctx.registry.register(SessionRecord::new(id, Some(url.clone()), private, parent));

        let mut signal = self.signal(launch_mode, source, transition);
        signal.launch_behind = affiliated && !web_contents_pending;
        self.launcher.start_window(OutboundLaunch {
            target: WindowClass::for_page(private),
            flags,
            payload,
            signal: Some(signal),
        });

        if private {
            log::debug!("Started private page window for session {id}");
        } else {
            log::debug!("Started page window for session {id}: {url}");
        }
        Ok(id)
    }

    async fn restore_private_key(&self) -> Result<(), LauncherError> {
        let keys = self.services.keys.clone();
        let result = tokio::select! {
            _ = self.liveness.cancelled() => return Err(LauncherError::LauncherGone),
            result = keys.restore_key() => result,
        };
        if self.liveness.is_cancelled() {
            return Err(LauncherError::LauncherGone);
        }
        result.map_err(|e| LauncherError::KeyRestoration(format!("{e:#}")))
    }

    /// Called by a page window as it starts. Hands over the staged content,
    /// or the window's own payload when nothing was staged.
    pub fn window_started(&mut self, id: SessionId, payload: &VisibleRequestPayload) -> LaunchContent {
        self.ctx.registry.set_current(Some(id));
        self.ctx.pending.take_or_fallback(id, payload)
    }

    /// Called when a page window is finished. Closing the last private
    /// window ends the private session.
    pub fn window_closed(&mut self, id: SessionId) {
        let was_private = self.ctx.registry.is_private(id);
        self.ctx.registry.remove(id);
        self.ctx.pending.remove(id);
        if was_private && self.ctx.registry.private_count() == 0 {
            self.ctx.end_private_session();
        }
    }

    /// Failed raise attempts since the last report.
    pub fn commit_diagnostics(&mut self) -> (String, u64) {
        let counter = &mut self.ctx.raise_failures;
        (counter.name().to_string(), counter.commit())
    }
}

use gosub_launcher::services::StaticLandingPage;
use gosub_launcher::{
    HostTask, InMemoryHost, LaunchFlags, LaunchRequest, LaunchRouter, LauncherConfig, LauncherError,
    LauncherServices, TaskId, WindowClass, WindowStack,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), LauncherError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    // The launcher is configured through the builder, which validates the values before use
    let config = LauncherConfig::builder()
        .landing_page_timeout(Duration::from_millis(250))
        .build()?;

    // Collaborators. Everything except the landing page uses the in-process defaults.
    let services = LauncherServices {
        landing: Arc::new(StaticLandingPage::new("https://example.test/home")),
        ..Default::default()
    };

    // The host stack starts with only the launcher window on it
    let own_task = TaskId::new(1);
    let host = Arc::new(InMemoryHost::with_tasks(vec![HostTask {
        id: own_task,
        window_class: Some(WindowClass::Launcher),
        base_data: None,
        current_url: None,
    }]));
    let mut router = LaunchRouter::with_host(config, services, host.clone(), own_task);

    let requests = [
        LaunchRequest::main(),
        LaunchRequest::view("https://news.test/today"),
        LaunchRequest::view("https://news.test/today").with_flags(LaunchFlags::REUSE_MATCHING_ELSE_NEW),
        LaunchRequest::view("https://private.test/").with_flags(LaunchFlags::PRIVATE),
        LaunchRequest::close_all_private(),
    ];

    for request in requests {
        let action = request.action().clone();
        let outcome = router.route(request).await;
        println!("{action:<18} -> {:?} (teardown: {:?})", outcome.decision, outcome.teardown);
    }

    println!("\nHost stack:");
    for task in host.tasks() {
        println!("  {} {:?} {}", task.id, task.window_class, task.base_data.unwrap_or_default());
    }

    let (name, hits) = router.commit_diagnostics();
    println!("\n{name}: {hits}");

    Ok(())
}

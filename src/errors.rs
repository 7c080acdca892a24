use crate::config::LauncherConfigError;
use crate::launcher::session::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("Launch request carries no usable URL")]
    NoUrl,

    #[error("Mini-app request is missing its id or URL")]
    IncompleteMiniApp,

    #[error("Mini-app MAC is not valid base64: {0}")]
    InvalidMiniAppMac(#[from] base64::DecodeError),

    #[error("Private key restoration failed: {0}")]
    KeyRestoration(String),

    #[error("Launcher window was torn down while a deferred step was pending")]
    LauncherGone,

    #[error("No session ids left to allocate")]
    SessionIdsExhausted,

    #[error("Session {0} is not known to the registry")]
    UnknownSession(SessionId),

    #[error("Invalid launcher configuration: {0}")]
    Config(#[from] LauncherConfigError),

    #[error("Preference store error: {0}")]
    Preferences(String),
}

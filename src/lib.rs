pub mod config;
pub mod errors;
pub mod launcher;

pub use config::LauncherConfig;
pub use errors::LauncherError;
pub use launcher::*;

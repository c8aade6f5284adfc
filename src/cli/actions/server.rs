use crate::{
    api::{self, AuthConfig, AuthState},
    cli::telemetry,
    directory::{MemoryDirectory, UserDirectory},
    rate_limit::{MemoryRateLimitStore, RateLimiter},
    session::{MemoryRefreshLedger, SessionManager},
};
use anyhow::Result;
use secrecy::SecretString;
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub frontend_base_url: String,
    pub session_secret: SecretString,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub users_file: Option<PathBuf>,
    pub login_max_attempts: u32,
    pub login_window_seconds: u64,
    pub refresh_max_attempts: u32,
    pub refresh_window_seconds: u64,
    pub rate_limit_sweep_probability: f64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the directory cannot be loaded or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let directory: Arc<dyn UserDirectory> = match &args.users_file {
        Some(path) => {
            info!("Loading users from {}", path.display());
            Arc::new(MemoryDirectory::from_json_file(path)?)
        }
        None => {
            warn!("No users file configured, serving built-in demo users");
            Arc::new(MemoryDirectory::with_demo_users())
        }
    };

    let sessions = SessionManager::new(
        args.session_secret,
        directory,
        Arc::new(MemoryRefreshLedger::new()),
    )
    .with_access_ttl_seconds(args.access_ttl_seconds)
    .with_refresh_ttl_seconds(args.refresh_ttl_seconds);

    let rate_limiter = RateLimiter::new(Arc::new(MemoryRateLimitStore::new()))
        .with_sweep_probability(args.rate_limit_sweep_probability);

    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_login_limit(args.login_max_attempts, args.login_window_seconds)
        .with_refresh_limit(args.refresh_max_attempts, args.refresh_window_seconds);

    let auth_state = Arc::new(AuthState::new(auth_config, sessions, rate_limiter));

    let result = api::new(args.port, auth_state).await;
    telemetry::shutdown_tracer();
    result
}

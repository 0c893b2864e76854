pub mod config;
pub mod sessions;
pub mod stats;
pub mod timer;

use std::sync::Arc;

use pomosync_core::{AuthSession, Config, ReqwestSessionApi, SyncEngine, SyncSnapshot};

/// Connection flags shared by every subcommand.
pub struct Remote {
    pub token: Option<String>,
    pub base_url: Option<String>,
}

/// Single-threaded runtime: the CLI is one event loop.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

pub fn sync_engine(
    remote: &Remote,
    config: &Config,
) -> Result<SyncEngine<ReqwestSessionApi>, Box<dyn std::error::Error>> {
    let base_url = remote
        .base_url
        .clone()
        .unwrap_or_else(|| config.sync.base_url.clone());
    let api = ReqwestSessionApi::new(&base_url, config.sync.request_timeout())?;
    let auth = match remote.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => AuthSession::signed_in(token),
        _ => AuthSession::new(),
    };
    Ok(SyncEngine::new(Arc::new(api), auth, config.sync_settings()))
}

/// Surface the engine's non-fatal error slot on stderr.
pub fn report(snapshot: &SyncSnapshot) {
    if let Some(error) = &snapshot.error {
        eprintln!("warning: {error}");
    }
}

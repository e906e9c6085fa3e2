//! `sandloop clear` — drop a session's log and definitions.

use sandloop_config::AppConfig;
use sandloop_core::store::SessionStore as _;
use tracing::info;

pub async fn run(
    config: &AppConfig,
    user_id: &str,
    session_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = sandloop_store::from_config(config).await?;
    store.clear_session(user_id, session_id).await?;
    info!(user = %user_id, session = %session_id, "Session cleared");
    println!("cleared {session_id}");
    Ok(())
}

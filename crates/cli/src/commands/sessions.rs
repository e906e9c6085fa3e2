//! `sandloop sessions` — list a user's sessions.

use sandloop_config::AppConfig;
use sandloop_core::store::SessionStore as _;

pub async fn run(config: &AppConfig, user_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = sandloop_store::from_config(config).await?;
    let sessions = store.sessions(user_id).await?;

    if sessions.is_empty() {
        println!("(no sessions for {user_id})");
        return Ok(());
    }
    for session in sessions {
        println!("{session}");
    }
    Ok(())
}

//! `sandloop history` — dump a session's message log.

use sandloop_agent::window;
use sandloop_config::AppConfig;
use sandloop_core::store::SessionStore as _;

pub async fn run(
    config: &AppConfig,
    user_id: &str,
    session_id: &str,
    include_reasoning: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = sandloop_store::from_config(config).await?;
    let history = store.history(user_id, session_id).await?;
    let visible = window(&history, -1, include_reasoning);

    for message in &visible {
        println!(
            "[{}] {:?}{}: {}",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.role,
            if message.is_reasoning { " (reasoning)" } else { "" },
            message.content.as_text()
        );
    }
    if visible.is_empty() {
        println!("(no messages)");
    }
    Ok(())
}

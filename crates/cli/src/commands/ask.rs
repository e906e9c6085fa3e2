//! `sandloop ask` — one full agent turn against a session.
//!
//! Wires the whole pipeline the way a gateway handler would: persist the
//! user turn, window the history, seed live session state, rehydrate a
//! fresh sandbox, run the loop, persist the delta.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sandloop_agent::input::{UserPayload, format_user_content};
use sandloop_agent::runner::AgentLoop;
use sandloop_agent::{SessionRegistry, window};
use sandloop_config::AppConfig;
use sandloop_core::message::Message;
use sandloop_core::sandbox::SandboxFactory as _;
use sandloop_core::store::SessionStore as _;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

pub async fn run(
    config: &AppConfig,
    user_id: &str,
    session_id: Option<String>,
    query: String,
    images: Vec<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session_id = session_id.unwrap_or_else(|| {
        let id = Uuid::new_v4().to_string();
        println!("session: {id}");
        id
    });

    let store = sandloop_store::from_config(config).await?;
    let generator = sandloop_providers::from_config(config)?;
    let sandbox_factory = sandloop_sandbox::from_config(config);
    let registry = SessionRegistry::new(std::time::Duration::from_secs(
        config.agent.session_ttl_secs,
    ));

    // ── Build and persist the user turn ──
    let payload = UserPayload {
        query,
        images: images
            .iter()
            .map(|path| std::fs::read(path).map(|bytes| BASE64.encode(bytes)))
            .collect::<Result<_, _>>()?,
        csv_data: csv.map(std::fs::read_to_string).transpose()?,
    };
    let user_message = Message::user(format_user_content(&payload, &config.agent.data_dir));

    store
        .append_message(user_id, &session_id, &user_message)
        .await?;
    store.add_session(user_id, &session_id).await?;

    // ── Load the snapshot ──
    let history = store.history(user_id, &session_id).await?;
    let windowed = window(
        &history,
        config.agent.history_turns,
        config.agent.include_reasoning,
    );
    info!(
        total = history.len(),
        windowed = windowed.len(),
        "Loaded session history"
    );

    let seed = store.definitions(user_id, &session_id).await?;
    let definitions = registry.get_or_seed(&session_id, seed).await;

    // ── Run the loop ──
    let agent = AgentLoop::new(generator, config.default_model.clone())
        .with_temperature(config.default_temperature)
        .with_max_steps(config.agent.max_steps)
        .with_structured_steps(config.agent.structured_steps)
        .with_rehydration(config.agent.rehydration)
        .with_authorized_imports(config.sandbox.authorized_imports.clone());
    let agent = match config.default_max_tokens {
        Some(max) => agent.with_max_tokens(max),
        None => agent,
    };

    let sandbox = sandbox_factory.create().await;
    let mut defs = definitions.lock().await;
    let outcome = agent.run(sandbox.as_ref(), &mut defs, &windowed).await?;

    // ── Persist the delta ──
    for message in &outcome.transcript {
        store.append_message(user_id, &session_id, message).await?;
    }
    store
        .append_message(user_id, &session_id, &Message::assistant(outcome.answer.clone()))
        .await?;
    store.save_definitions(user_id, &session_id, &defs).await?;

    if outcome.exhausted {
        info!(steps = outcome.steps, "Run exhausted its step budget");
    }
    println!("{}", outcome.answer);
    Ok(())
}

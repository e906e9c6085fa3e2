//! Sandbox adapters for sandloop.
//!
//! The restricted interpreter itself lives in the executor sidecar; this
//! crate holds the adapters that speak to it (or stand in for it) behind
//! the [`Sandbox`](sandloop_core::Sandbox) contract.

pub mod http;
pub mod scripted;

pub use http::{HttpSandbox, HttpSandboxFactory};
pub use scripted::{ScriptedSandbox, ScriptedSandboxFactory};

use sandloop_config::AppConfig;
use sandloop_core::sandbox::SandboxFactory;
use std::sync::Arc;

/// Build the configured sandbox factory.
pub fn from_config(config: &AppConfig) -> Arc<dyn SandboxFactory> {
    Arc::new(HttpSandboxFactory::new(
        config.sandbox.url.clone(),
        std::time::Duration::from_secs(config.sandbox.timeout_secs),
    ))
}

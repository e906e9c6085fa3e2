//! Text-generation backends for sandloop.
//!
//! One production implementation — the OpenAI-compatible chat-completions
//! client — plus a factory that builds it from configuration. Scripted test
//! generators live with the agent crate's test helpers, not here.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatGenerator;

use sandloop_config::AppConfig;
use sandloop_core::error::GenerationError;
use sandloop_core::generate::Generator;
use std::sync::Arc;

/// Build the configured generator.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Generator>, GenerationError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| GenerationError::NotConfigured("no API key configured".into()))?;

    Ok(Arc::new(OpenAiCompatGenerator::new(
        "openai_compat",
        config.api_url.clone(),
        api_key,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_requires_api_key() {
        let config = AppConfig::default();
        assert!(matches!(
            from_config(&config),
            Err(GenerationError::NotConfigured(_))
        ));
    }

    #[test]
    fn from_config_builds_generator() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..Default::default()
        };
        let generator = from_config(&config).unwrap();
        assert_eq!(generator.name(), "openai_compat");
    }
}

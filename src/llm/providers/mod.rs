//! Generation provider implementations.
//!
//! `build(config, api_key)` is the factory, called at startup.
//! Adding a new backend = new module + new match arm.

pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::error::ProviderError;
use crate::llm::GenerationProvider;

/// Construct a `GenerationProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<GenerationProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(GenerationProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(GenerationProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    #[test]
    fn default_is_dummy() {
        let p = build(&config::defaults().unwrap().llm, None).unwrap();
        assert_eq!(p.name(), "dummy");
    }

    #[test]
    fn openai_builds_without_network() {
        let mut cfg = config::defaults().unwrap().llm;
        cfg.provider = "openai".into();
        let p = build(&cfg, Some("sk-test".into())).unwrap();
        assert_eq!(p.name(), "openai");
    }

    #[test]
    fn unknown_provider() {
        let mut cfg = config::defaults().unwrap().llm;
        cfg.provider = "gpt-neo-local".into();
        assert!(matches!(build(&cfg, None), Err(ProviderError::UnknownProvider(_))));
    }
}

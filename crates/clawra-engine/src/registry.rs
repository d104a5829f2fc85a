use clawra_contracts::providers::provider_names;
use clawra_contracts::{ProviderId, DEFAULT_PROVIDER};
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::{ClawraError, Result};
use crate::providers::{build_provider, ImageProvider};

/// Resolves provider names to adapters.
///
/// Order: explicit name, then the configured default (`IMAGE_PROVIDER`),
/// then `fal`. Blank names count as absent.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRegistry<'a> {
    config: &'a RuntimeConfig,
}

impl<'a> ProviderRegistry<'a> {
    pub fn new(config: &'a RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn resolve_id(&self, explicit: Option<&str>) -> Result<ProviderId> {
        let requested = explicit
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| self.config.default_provider.as_deref())
            .unwrap_or(DEFAULT_PROVIDER.as_str());
        requested
            .parse::<ProviderId>()
            .map_err(|name| ClawraError::UnknownProvider {
                name,
                valid: provider_names().into_iter().map(str::to_string).collect(),
            })
    }

    pub fn resolve(&self, explicit: Option<&str>) -> Result<Box<dyn ImageProvider>> {
        let id = self.resolve_id(explicit)?;
        debug!(provider = %id, "resolved image provider");
        build_provider(id, self.config.provider_settings(id))
    }
}

#[cfg(test)]
mod tests {
    use clawra_contracts::ProviderId;

    use super::ProviderRegistry;
    use crate::config::RuntimeConfig;
    use crate::error::ClawraError;

    #[test]
    fn explicit_name_beats_configured_default() -> anyhow::Result<()> {
        let mut config = RuntimeConfig::default();
        config.default_provider = Some("openai".to_string());
        let registry = ProviderRegistry::new(&config);

        assert_eq!(registry.resolve_id(Some("xai"))?, ProviderId::Xai);
        assert_eq!(registry.resolve_id(None)?, ProviderId::Openai);
        assert_eq!(registry.resolve_id(Some("  "))?, ProviderId::Openai);
        Ok(())
    }

    #[test]
    fn falls_back_to_fal() -> anyhow::Result<()> {
        let config = RuntimeConfig::default();
        let provider = ProviderRegistry::new(&config).resolve(None)?;
        assert_eq!(provider.identity().id, ProviderId::Fal);
        assert_eq!(provider.name(), "fal.ai (Grok Imagine)");
        Ok(())
    }

    #[test]
    fn unknown_name_lists_the_valid_set() {
        let config = RuntimeConfig::default();
        let err = ProviderRegistry::new(&config)
            .resolve(Some("bogus"))
            .err()
            .expect("bogus provider must fail");
        match &err {
            ClawraError::UnknownProvider { name, valid } => {
                assert_eq!(name, "bogus");
                assert_eq!(valid, &vec!["fal", "openai", "google", "xai"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            err.to_string(),
            "Unknown image provider: \"bogus\". Supported providers: fal, openai, google, xai"
        );
    }

    #[test]
    fn unknown_configured_default_also_fails() {
        let mut config = RuntimeConfig::default();
        config.default_provider = Some("midjourney".to_string());
        let err = ProviderRegistry::new(&config).resolve_id(None).unwrap_err();
        assert!(matches!(err, ClawraError::UnknownProvider { ref name, .. } if name == "midjourney"));
    }
}

//! Inference service implementations for memloop.
//!
//! All providers implement the `memloop_core::Provider` trait.
//! [`build_from_config`] turns the loaded configuration into a ready provider.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use memloop_config::AppConfig;
use memloop_core::{Error, Provider};
use std::sync::Arc;
use std::time::Duration;

/// Build the configured provider.
///
/// A missing API key is a configuration failure, reported before any query runs.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, Error> {
    let api_key = config.api_key.as_deref().ok_or_else(|| {
        Error::config("No API key configured (set ANTHROPIC_API_KEY or api_key in config.toml)")
    })?;

    let mut provider = AnthropicProvider::with_timeout(
        api_key,
        Duration::from_secs(config.provider.request_timeout_secs),
    )?;
    if let Some(url) = &config.provider.base_url {
        provider = provider.with_base_url(url);
    }

    tracing::debug!(provider = "anthropic", model = %config.model, "Provider ready");
    Ok(Arc::new(provider))
}

//! ledgerlink-providers — provider profiles and configuration resolution.
//!
//! The environment hands the manager an ordered list of provider records.
//! Resolution drops records carrying placeholder/demo credentials; if
//! nothing usable remains, a built-in list of public, unauthenticated
//! endpoints with low priority applies. That fallback is a deliberate
//! degraded-but-functional default, not a startup failure.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use ledgerlink_core::error::RegistryError;
use ledgerlink_core::registry::{ProviderRegistry, ProviderSpec};

pub mod alchemy;
pub mod infura;
pub mod public;

fn default_rate_limit() -> u32 {
    10
}

fn default_timeout_ms() -> u64 {
    15_000
}

/// One provider record as supplied by the external configuration loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub name: String,
    pub rpc_url: String,
    pub ws_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub priority: u32,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ProviderRecord {
    fn into_spec(self) -> ProviderSpec {
        ProviderSpec {
            name: self.name,
            rpc_url: self.rpc_url,
            ws_url: self.ws_url,
            api_key: self.api_key,
            priority: self.priority,
            rate_limit: self.rate_limit,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Returns `true` for credentials that are clearly placeholders from a
/// config template rather than working keys.
pub fn is_placeholder_key(key: &str) -> bool {
    key.is_empty()
        || key.eq_ignore_ascii_case("demo")
        || key.eq_ignore_ascii_case("changeme")
        || key.to_ascii_uppercase().contains("YOUR_")
}

/// Resolve configured records into usable specs: drop placeholder-credential
/// entries, fall back to the public list if nothing survives.
pub fn resolve_providers(records: Vec<ProviderRecord>) -> Vec<ProviderSpec> {
    let specs: Vec<ProviderSpec> = records
        .into_iter()
        .filter(|record| match record.api_key.as_deref() {
            Some(key) if is_placeholder_key(key) => {
                warn!(provider = %record.name, "dropping provider with placeholder credential");
                false
            }
            _ => true,
        })
        .map(ProviderRecord::into_spec)
        .collect();

    if specs.is_empty() {
        warn!("no usable providers configured; falling back to public endpoints");
        public::fallback_providers()
    } else {
        specs
    }
}

/// Build a populated registry from resolved specs.
pub fn build_registry(specs: Vec<ProviderSpec>) -> Result<ProviderRegistry, RegistryError> {
    let mut registry = ProviderRegistry::new();
    for spec in specs {
        registry.register(spec)?;
    }
    Ok(registry)
}

//! Infura provider profile.
//!
//! Free tier allows roughly 10 requests/sec sustained.

use std::time::Duration;

use ledgerlink_core::registry::ProviderSpec;

pub const FREE_TIER_REQUESTS_PER_SEC: u32 = 10;

/// URL template for the HTTP JSON-RPC endpoint.
pub fn rpc_url(project_id: &str, chain_id: u64) -> String {
    let network = chain_id_to_network(chain_id);
    format!("https://{network}.infura.io/v3/{project_id}")
}

/// URL template for the WebSocket endpoint.
pub fn ws_url(project_id: &str, chain_id: u64) -> String {
    let network = chain_id_to_network(chain_id);
    format!("wss://{network}.infura.io/ws/v3/{project_id}")
}

/// Build a provider spec pre-configured for Infura free tier.
pub fn spec(project_id: &str, chain_id: u64, priority: u32) -> ProviderSpec {
    let network = chain_id_to_network(chain_id);
    ProviderSpec {
        name: format!("infura-{network}"),
        rpc_url: rpc_url(project_id, chain_id),
        ws_url: ws_url(project_id, chain_id),
        api_key: Some(project_id.to_string()),
        priority,
        rate_limit: FREE_TIER_REQUESTS_PER_SEC,
        timeout: Duration::from_secs(15),
    }
}

fn chain_id_to_network(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "mainnet",
        11155111 => "sepolia",
        137 => "polygon-mainnet",
        42161 => "arbitrum-mainnet",
        10 => "optimism-mainnet",
        8453 => "base-mainnet",
        _ => "mainnet",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_url_mainnet() {
        assert_eq!(rpc_url("pid", 1), "https://mainnet.infura.io/v3/pid");
    }

    #[test]
    fn ws_url_has_ws_path() {
        assert_eq!(ws_url("pid", 1), "wss://mainnet.infura.io/ws/v3/pid");
    }
}

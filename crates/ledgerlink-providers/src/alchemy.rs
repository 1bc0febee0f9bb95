//! Alchemy provider profile.
//!
//! Free tier allows roughly 25 requests/sec sustained.
//! <https://docs.alchemy.com/reference/throughput>

use std::time::Duration;

use ledgerlink_core::registry::ProviderSpec;

pub const FREE_TIER_REQUESTS_PER_SEC: u32 = 25;

/// URL template for the HTTP JSON-RPC endpoint.
pub fn rpc_url(api_key: &str, chain_id: u64) -> String {
    let network = chain_id_to_network(chain_id);
    format!("https://{network}.g.alchemy.com/v2/{api_key}")
}

/// URL template for the WebSocket endpoint.
pub fn ws_url(api_key: &str, chain_id: u64) -> String {
    let network = chain_id_to_network(chain_id);
    format!("wss://{network}.g.alchemy.com/v2/{api_key}")
}

/// Build a provider spec pre-configured for Alchemy free tier.
pub fn spec(api_key: &str, chain_id: u64, priority: u32) -> ProviderSpec {
    let network = chain_id_to_network(chain_id);
    ProviderSpec {
        name: format!("alchemy-{network}"),
        rpc_url: rpc_url(api_key, chain_id),
        ws_url: ws_url(api_key, chain_id),
        api_key: Some(api_key.to_string()),
        priority,
        rate_limit: FREE_TIER_REQUESTS_PER_SEC,
        timeout: Duration::from_secs(15),
    }
}

fn chain_id_to_network(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "eth-mainnet",
        11155111 => "eth-sepolia",
        137 => "polygon-mainnet",
        42161 => "arb-mainnet",
        10 => "opt-mainnet",
        8453 => "base-mainnet",
        _ => "eth-mainnet",
    }
}

//! Public / community endpoints.
//!
//! Free, no-credential endpoints that expose both a request and an
//! event-stream URL. Used as the built-in fallback when no usable provider
//! is configured: degraded but functional, deliberately low priority.

use std::time::Duration;

use ledgerlink_core::registry::ProviderSpec;

fn public_spec(name: &str, rpc_url: &str, ws_url: &str, priority: u32) -> ProviderSpec {
    ProviderSpec {
        name: name.to_string(),
        rpc_url: rpc_url.to_string(),
        ws_url: ws_url.to_string(),
        api_key: None,
        priority,
        rate_limit: 10,
        timeout: Duration::from_secs(15),
    }
}

/// PublicNode Ethereum gateway.
pub fn publicnode() -> ProviderSpec {
    public_spec(
        "publicnode",
        "https://ethereum-rpc.publicnode.com",
        "wss://ethereum-rpc.publicnode.com",
        100,
    )
}

/// LlamaNodes public RPC.
pub fn llama_rpc() -> ProviderSpec {
    public_spec(
        "llamarpc",
        "https://eth.llamarpc.com",
        "wss://eth.llamarpc.com",
        101,
    )
}

/// dRPC public gateway.
pub fn drpc() -> ProviderSpec {
    public_spec("drpc", "https://eth.drpc.org", "wss://eth.drpc.org", 102)
}

/// The built-in fallback list, in priority order.
pub fn fallback_providers() -> Vec<ProviderSpec> {
    vec![publicnode(), llama_rpc(), drpc()]
}

use crate::data::types::ChainConfig;

/// Get a chain configuration preset by name.
pub fn get_chain_config(name: &str) -> Option<ChainConfig> {
    match name.to_lowercase().as_str() {
        "sepolia" => Some(ChainConfig {
            name: "Sepolia".to_string(),
            chain_id: 11_155_111,
            rpc_url: "https://ethereum-sepolia-rpc.publicnode.com".to_string(),
            symbol: "SepoliaETH".to_string(),
            explorer_url: Some("https://sepolia.etherscan.io".to_string()),
        }),
        "holesky" => Some(ChainConfig {
            name: "Holesky".to_string(),
            chain_id: 17_000,
            rpc_url: "https://ethereum-holesky-rpc.publicnode.com".to_string(),
            symbol: "HoleskyETH".to_string(),
            explorer_url: Some("https://holesky.etherscan.io".to_string()),
        }),
        "ethereum" | "eth" | "mainnet" => Some(ChainConfig {
            name: "Ethereum".to_string(),
            chain_id: 1,
            rpc_url: "https://eth.merkle.io".to_string(),
            symbol: "ETH".to_string(),
            explorer_url: Some("https://etherscan.io".to_string()),
        }),
        "local" | "anvil" | "localhost" => Some(ChainConfig {
            name: "Local".to_string(),
            chain_id: 31_337,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            symbol: "ETH".to_string(),
            explorer_url: None,
        }),
        _ => None,
    }
}

/// Return a list of all supported chain names.
pub fn supported_chains() -> Vec<&'static str> {
    vec!["sepolia", "holesky", "ethereum", "local"]
}

/// The preset describing the network with `chain_id`, if any.
pub fn preset_for_chain_id(chain_id: u64) -> Option<ChainConfig> {
    supported_chains()
        .into_iter()
        .filter_map(get_chain_config)
        .find(|c| c.chain_id == chain_id)
}

/// The preset to report for the network the node actually serves.
///
/// With an explicit RPC URL the node may not be on the requested preset's
/// chain; the requested preset is only used when the ids agree.
pub fn resolve_network(requested: Option<ChainConfig>, chain_id: Option<u64>) -> Option<ChainConfig> {
    match chain_id {
        None => requested,
        Some(id) => requested
            .filter(|c| c.chain_id == id)
            .or_else(|| preset_for_chain_id(id)),
    }
}

impl ChainConfig {
    /// Explorer link for a transaction, when the network has an explorer.
    pub fn tx_url(&self, tx_hash: &alloy::primitives::TxHash) -> Option<String> {
        self.explorer_url
            .as_ref()
            .map(|base| format!("{base}/tx/{tx_hash}"))
    }
}

//! Routing targets: chain, wrapped native token, router and RPC endpoints

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use swapcycle_core::{Error, Result};

/// One EVM network the bot can trade on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Key used by `WalletConfig::selected_network`
    #[serde(default)]
    pub name: String,
    pub chain_id: u64,
    /// Native currency symbol, for log lines
    pub symbol: String,
    pub wrapped_native: String,
    /// Tried in order, rotating on failure
    pub rpc_endpoints: Vec<String>,
    /// Router used when a wallet has no `selected_dex`
    pub default_router: String,
    /// Token whose USD price stands in for the native currency
    #[serde(default)]
    pub price_token: Option<String>,
}

impl NetworkConfig {
    /// Core mainnet with WCORE and the public endpoints
    pub fn core() -> Self {
        Self {
            name: "core".to_string(),
            chain_id: 1116,
            symbol: "CORE".to_string(),
            wrapped_native: "0x40375C92d9FAf44d2f9db9Bd9ba41a3317a2404f".to_string(),
            rpc_endpoints: vec![
                "https://rpc.coredao.org".to_string(),
                "https://rpc-core.icecreamswap.com".to_string(),
                "https://core.drpc.org".to_string(),
                "https://rpc.coredao.org/".to_string(),
            ],
            default_router: "0x2C34490b5E30f3C6838aE59c8c5fE88F9B9fBc8A".to_string(),
            price_token: Some("0x40375C92d9FAf44d2f9db9Bd9ba41a3317a2404f".to_string()),
        }
    }

    pub fn wrapped_native_address(&self) -> Result<Address> {
        parse_address(&self.wrapped_native, "wrapped native token")
    }

    /// The wallet's chosen router, or this network's default
    pub fn router_address(&self, selected_dex: &str) -> Result<Address> {
        let router = selected_dex.trim();
        if router.is_empty() {
            parse_address(&self.default_router, "default router")
        } else {
            parse_address(router, "router")
        }
    }
}

/// Parse a 0x address, reporting which field was malformed
pub fn parse_address(value: &str, what: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| Error::InvalidTradeParameters(format!("invalid {} address {}: {}", what, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_network_addresses_parse() {
        let core = NetworkConfig::core();
        assert_eq!(core.chain_id, 1116);
        assert!(core.wrapped_native_address().is_ok());
        assert_eq!(
            core.router_address("").unwrap(),
            parse_address(&core.default_router, "router").unwrap()
        );
    }

    #[test]
    fn test_selected_dex_overrides_router() {
        let core = NetworkConfig::core();
        let custom = "0x9965507D1a55bcC2695C58ba16FB37d819B0A4dc";
        assert_eq!(
            core.router_address(custom).unwrap(),
            custom.parse::<Address>().unwrap()
        );
        assert!(matches!(
            core.router_address("not-an-address"),
            Err(Error::InvalidTradeParameters(_))
        ));
    }
}

//! Wallet balances with USD values for the dashboard

use serde::Serialize;
use swapcycle_core::{Result, WalletConfig};
use swapcycle_networking::network::parse_address;
use swapcycle_networking::units::from_wei;
use swapcycle_networking::{NetworkHandle, PriceFeed};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalances {
    pub native: f64,
    pub native_usd: f64,
    /// `None` when no token is selected
    pub token: Option<f64>,
    pub token_usd: Option<f64>,
}

/// Read native and selected-token balances. Prices are best effort (0 when unknown).
pub async fn wallet_balances(
    network: &NetworkHandle,
    prices: &PriceFeed,
    address: &str,
    config: &WalletConfig,
) -> Result<WalletBalances> {
    let owner = parse_address(address, "wallet")?;
    let native = from_wei(network.client.native_balance(owner).await?);

    let native_price = match &network.config.price_token {
        Some(token) => prices.token_price_usd(token).await,
        None => 0.0,
    };

    let (token, token_usd) = if config.has_token() {
        let token_address = parse_address(&config.selected_token, "token")?;
        let amount = from_wei(network.client.token_balance(token_address, owner).await?);
        let price = prices.token_price_usd(config.selected_token.trim()).await;
        (Some(amount), Some(amount * price))
    } else {
        (None, None)
    };

    Ok(WalletBalances {
        native,
        native_usd: native * native_price,
        token,
        token_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeChain, TEST_ADDRESS};
    use std::sync::Arc;
    use swapcycle_networking::units::to_wei;
    use swapcycle_networking::NetworkConfig;
    use swapcycle_persistence::PriceCache;

    #[tokio::test]
    async fn test_balances_use_cached_prices() {
        let chain = Arc::new(FakeChain::funded());
        chain.set_native_balance(to_wei(2.0).unwrap());
        chain.set_token_balance(to_wei(150.0).unwrap());

        let network = NetworkHandle {
            config: NetworkConfig::core(),
            client: chain,
        };
        let cache = Arc::new(PriceCache::default());
        cache.insert(&NetworkConfig::core().wrapped_native, 0.5);
        cache.insert(FakeChain::TOKEN, 0.01);
        let prices = PriceFeed::with_base_url(cache, "http://127.0.0.1:1").unwrap();

        let mut config = WalletConfig::default_for(1);
        let without_token = wallet_balances(&network, &prices, TEST_ADDRESS, &config)
            .await
            .unwrap();
        assert_eq!(without_token.native, 2.0);
        assert_eq!(without_token.native_usd, 1.0);
        assert!(without_token.token.is_none());

        config.selected_token = FakeChain::TOKEN.to_string();
        let with_token = wallet_balances(&network, &prices, TEST_ADDRESS, &config)
            .await
            .unwrap();
        assert_eq!(with_token.token, Some(150.0));
        assert!((with_token.token_usd.unwrap() - 1.5).abs() < 1e-9);
    }
}

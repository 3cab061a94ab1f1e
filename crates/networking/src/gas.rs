//! Gas price policy

/// 1 gwei in wei
pub const GWEI: u128 = 1_000_000_000;
pub const MIN_GAS_PRICE: u128 = GWEI;
pub const MAX_GAS_PRICE: u128 = 500 * GWEI;
/// Used when no endpoint will quote a gas price
pub const FALLBACK_GAS_PRICE: u128 = 5 * GWEI;

/// Network price plus 10%, clamped to [1, 500] gwei
pub fn adjust_gas_price(network_price: u128) -> u128 {
    network_price
        .saturating_mul(11)
        .saturating_div(10)
        .clamp(MIN_GAS_PRICE, MAX_GAS_PRICE)
}

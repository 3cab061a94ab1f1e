//! Due-time evaluation with jitter

use chrono::{DateTime, Utc};
use rand::Rng;
use swapcycle_core::{TradeDirection, WalletConfig, WalletStrategy};

pub struct IntervalScheduler;

impl IntervalScheduler {
    /// Whether `direction` may trade at `now`.
    ///
    /// Jitter of up to 20% of the base interval is redrawn on every call and
    /// only ever delays a trade. A wallet that never traded is measured from
    /// the epoch, so it is due immediately.
    pub fn is_due<R: Rng + ?Sized>(
        strategy: &WalletStrategy,
        config: &WalletConfig,
        direction: TradeDirection,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> bool {
        let base_ms = config.interval(direction).total_millis() as f64;
        let jitter_ms = rng.gen_range(0.0..0.2) * base_ms;
        let last_ms = strategy
            .last_operation_time
            .map(|t| t.timestamp_millis())
            .unwrap_or(0);
        let elapsed_ms = (now.timestamp_millis() - last_ms) as f64;

        elapsed_ms >= base_ms + jitter_ms
    }

    /// Seconds until the base interval elapses, ignoring jitter (for display)
    pub fn seconds_until_due(
        strategy: &WalletStrategy,
        config: &WalletConfig,
        direction: TradeDirection,
        now: DateTime<Utc>,
    ) -> u64 {
        let Some(last) = strategy.last_operation_time else {
            return 0;
        };
        let base = config.interval(direction).total_seconds() as i64;
        let elapsed = (now - last).num_seconds();
        (base - elapsed).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleGenerator;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use swapcycle_core::IntervalSpec;

    fn setup(last: Option<DateTime<Utc>>) -> (WalletStrategy, WalletConfig, StdRng) {
        let mut rng = StdRng::seed_from_u64(5);
        let mut strategy = CycleGenerator::new_strategy(1, &mut rng);
        strategy.last_operation_time = last;
        let mut config = WalletConfig::default_for(1);
        config.buy_interval = IntervalSpec::new(0, 10, 0);
        config.sell_interval = IntervalSpec::new(1, 0, 0);
        (strategy, config, rng)
    }

    #[test]
    fn test_never_traded_is_due() {
        let (strategy, config, mut rng) = setup(None);
        assert!(IntervalScheduler::is_due(
            &strategy,
            &config,
            TradeDirection::Sell,
            Utc::now(),
            &mut rng
        ));
    }

    #[test]
    fn test_just_traded_is_not_due() {
        let now = Utc::now();
        let (strategy, config, mut rng) = setup(Some(now));
        for _ in 0..1_000 {
            assert!(!IntervalScheduler::is_due(
                &strategy,
                &config,
                TradeDirection::Buy,
                now,
                &mut rng
            ));
        }
    }

    #[test]
    fn test_twice_the_interval_is_always_due() {
        let now = Utc::now();
        let (strategy, config, mut rng) = setup(Some(now - Duration::minutes(20)));
        for _ in 0..1_000 {
            assert!(IntervalScheduler::is_due(
                &strategy,
                &config,
                TradeDirection::Buy,
                now,
                &mut rng
            ));
        }
        // the sell side has a one hour interval
        assert!(!IntervalScheduler::is_due(
            &strategy,
            &config,
            TradeDirection::Sell,
            now,
            &mut rng
        ));
    }

    #[test]
    fn test_jitter_never_fires_early() {
        let now = Utc::now();
        let (strategy, config, mut rng) = setup(Some(now - Duration::seconds(599)));
        for _ in 0..1_000 {
            assert!(!IntervalScheduler::is_due(
                &strategy,
                &config,
                TradeDirection::Buy,
                now,
                &mut rng
            ));
        }
    }

    #[test]
    fn test_seconds_until_due() {
        let now = Utc::now();
        let (strategy, config, _) = setup(Some(now - Duration::seconds(100)));
        assert_eq!(
            IntervalScheduler::seconds_until_due(&strategy, &config, TradeDirection::Buy, now),
            500
        );
        let (fresh, config, _) = setup(None);
        assert_eq!(
            IntervalScheduler::seconds_until_due(&fresh, &config, TradeDirection::Sell, now),
            0
        );
    }
}

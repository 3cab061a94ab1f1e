//! Shuffled buy/sell cycles and their bookkeeping

use rand::seq::SliceRandom;
use rand::Rng;
use swapcycle_core::{
    Cycle, TradeDirection, WalletStrategy, BUYS_PER_CYCLE, CYCLE_LENGTH, SELLS_PER_CYCLE,
};

/// Result of consuming one slot from a wallet's cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextOperation {
    pub direction: TradeDirection,
    /// A fresh cycle had to be generated before this slot was read
    pub rolled_over: bool,
}

pub struct CycleGenerator;

impl CycleGenerator {
    /// Uniform shuffle of 5 buys and 5 sells with full counters
    pub fn new_cycle<R: Rng + ?Sized>(rng: &mut R) -> Cycle {
        let mut operations = Vec::with_capacity(CYCLE_LENGTH as usize);
        operations.extend(std::iter::repeat(TradeDirection::Buy).take(BUYS_PER_CYCLE as usize));
        operations.extend(std::iter::repeat(TradeDirection::Sell).take(SELLS_PER_CYCLE as usize));
        operations.shuffle(rng);

        Cycle {
            remaining_buys: BUYS_PER_CYCLE,
            remaining_sells: SELLS_PER_CYCLE,
            operations_left: CYCLE_LENGTH,
            operations,
        }
    }

    /// Strategy for a wallet that has never traded
    pub fn new_strategy<R: Rng + ?Sized>(wallet_id: i64, rng: &mut R) -> WalletStrategy {
        WalletStrategy {
            wallet_id,
            current_cycle: Self::new_cycle(rng),
            consecutive_buys: 0,
            consecutive_sells: 0,
            amount_variability: rng.gen_range(0.3..0.7),
            time_variability: rng.gen_range(0.2..0.5),
            base_success_prob: rng.gen_range(0.85..0.95),
            market_bias: rng.gen_range(-0.3..0.3),
            last_operation_time: None,
        }
    }

    /// Exhausted, or the stored counters no longer describe the operation list
    pub fn needs_rollover(cycle: &Cycle) -> bool {
        cycle.is_exhausted() || !cycle.is_consistent()
    }

    /// Replace the cycle and redraw the per-cycle variability coefficients
    pub fn roll_over<R: Rng + ?Sized>(strategy: &mut WalletStrategy, rng: &mut R) {
        strategy.current_cycle = Self::new_cycle(rng);
        strategy.amount_variability = rng.gen_range(0.3..0.7);
        strategy.time_variability = rng.gen_range(0.2..0.5);
    }

    /// Consume the next slot: the operation at index `10 - operations_left`.
    pub fn next_operation<R: Rng + ?Sized>(
        strategy: &mut WalletStrategy,
        rng: &mut R,
    ) -> NextOperation {
        let rolled_over = Self::needs_rollover(&strategy.current_cycle);
        if rolled_over {
            Self::roll_over(strategy, rng);
        }

        let cycle = &mut strategy.current_cycle;
        // Consistent cycles always have a slot at this index
        let direction = cycle.operations[cycle.operation_index()];
        cycle.operations_left -= 1;

        match direction {
            TradeDirection::Buy => {
                cycle.remaining_buys -= 1;
                strategy.consecutive_buys += 1;
                strategy.consecutive_sells = 0;
            }
            TradeDirection::Sell => {
                cycle.remaining_sells -= 1;
                strategy.consecutive_sells += 1;
                strategy.consecutive_buys = 0;
            }
        }

        NextOperation {
            direction,
            rolled_over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_cycle_has_five_of_each() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let cycle = CycleGenerator::new_cycle(&mut rng);
            let buys = cycle.operations.iter().filter(|d| d.is_buy()).count();
            assert_eq!(cycle.operations.len(), 10);
            assert_eq!(buys, 5);
            assert_eq!(
                (cycle.remaining_buys, cycle.remaining_sells, cycle.operations_left),
                (5, 5, 10)
            );
        }
    }

    #[test]
    fn test_shuffle_position_balance() {
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 10_000;
        let buys_first = (0..trials)
            .filter(|_| CycleGenerator::new_cycle(&mut rng).operations[0].is_buy())
            .count();
        let share = buys_first as f64 / trials as f64;
        assert!((0.47..0.53).contains(&share), "buy-first share {}", share);
    }

    #[test]
    fn test_counters_stay_in_step() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut strategy = CycleGenerator::new_strategy(1, &mut rng);
        let expected = strategy.current_cycle.operations.clone();

        for (i, want) in expected.iter().enumerate() {
            let next = CycleGenerator::next_operation(&mut strategy, &mut rng);
            let cycle = &strategy.current_cycle;
            assert_eq!(next.direction, *want);
            assert!(!next.rolled_over);
            assert_eq!(cycle.operations_left, 9 - i as u32);
            assert_eq!(
                cycle.remaining_buys + cycle.remaining_sells,
                cycle.operations_left
            );
        }

        let cycle = &strategy.current_cycle;
        assert_eq!(
            (cycle.remaining_buys, cycle.remaining_sells, cycle.operations_left),
            (0, 0, 0)
        );

        let next = CycleGenerator::next_operation(&mut strategy, &mut rng);
        assert!(next.rolled_over);
        assert_eq!(strategy.current_cycle.operations_left, 9);
    }

    #[test]
    fn test_consecutive_counters() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut strategy = CycleGenerator::new_strategy(1, &mut rng);
        strategy.current_cycle.operations = vec![
            TradeDirection::Buy,
            TradeDirection::Buy,
            TradeDirection::Sell,
            TradeDirection::Buy,
            TradeDirection::Sell,
            TradeDirection::Buy,
            TradeDirection::Sell,
            TradeDirection::Buy,
            TradeDirection::Sell,
            TradeDirection::Sell,
        ];

        CycleGenerator::next_operation(&mut strategy, &mut rng);
        CycleGenerator::next_operation(&mut strategy, &mut rng);
        assert_eq!((strategy.consecutive_buys, strategy.consecutive_sells), (2, 0));
        CycleGenerator::next_operation(&mut strategy, &mut rng);
        assert_eq!((strategy.consecutive_buys, strategy.consecutive_sells), (0, 1));
    }

    #[test]
    fn test_corrupt_cycle_is_regenerated() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut strategy = CycleGenerator::new_strategy(1, &mut rng);
        strategy.current_cycle.operations.truncate(3);

        let next = CycleGenerator::next_operation(&mut strategy, &mut rng);
        assert!(next.rolled_over);
        assert!(strategy.current_cycle.is_consistent());
    }

    #[test]
    fn test_new_strategy_ranges() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let s = CycleGenerator::new_strategy(1, &mut rng);
            assert!((0.3..0.7).contains(&s.amount_variability));
            assert!((0.2..0.5).contains(&s.time_variability));
            assert!((0.85..0.95).contains(&s.base_success_prob));
            assert!((-0.3..0.3).contains(&s.market_bias));
            assert!(s.last_operation_time.is_none());
        }
    }
}

// =============================================================================
// Simulated Order Book Ladder
// =============================================================================
//
// No depth is fetched from any exchange. Each refresh cycle builds a fresh
// ladder around the current price:
//
//   step          = price * 0.001
//   bid level i   = price - step * (i + 1)
//   ask level i   = price + step * (i + 1)
//   size          = 10 + U[0, 1) * 500
//   total         = price * size
//
// The biggest wall on each side is the level with the largest total (first
// one wins on ties), and buy_to_sell_ratio = buy wall total / sell wall total.
// =============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Relative distance between two adjacent ladder levels.
pub const LEVEL_STEP: f64 = 0.001;
const MIN_LEVEL_SIZE: f64 = 10.0;
const LEVEL_SIZE_SPREAD: f64 = 500.0;

/// One price level of the ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
    pub total: f64,
}

impl BookLevel {
    fn new(price: f64, size: f64) -> Self {
        Self {
            price,
            size,
            total: price * size,
        }
    }
}

/// Ladder plus the derived wall statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSummary {
    pub biggest_buy_wall: BookLevel,
    pub biggest_sell_wall: BookLevel,
    pub buy_to_sell_ratio: f64,
    /// Best (highest) bid first.
    pub bids: Vec<BookLevel>,
    /// Best (lowest) ask first.
    pub asks: Vec<BookLevel>,
}

impl OrderBookSummary {
    /// Derive wall statistics from both sides of a ladder.
    pub fn from_levels(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        let biggest_buy_wall = biggest_wall(&bids);
        let biggest_sell_wall = biggest_wall(&asks);
        let buy_to_sell_ratio = if biggest_sell_wall.total > 0.0 {
            biggest_buy_wall.total / biggest_sell_wall.total
        } else {
            0.0
        };

        Self {
            biggest_buy_wall,
            biggest_sell_wall,
            buy_to_sell_ratio,
            bids,
            asks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

fn biggest_wall(levels: &[BookLevel]) -> BookLevel {
    levels
        .iter()
        .copied()
        .reduce(|max, level| if level.total > max.total { level } else { max })
        .unwrap_or_default()
}

/// Build a `levels`-deep simulated ladder around `price`.
pub fn simulate<R: Rng>(rng: &mut R, price: f64, levels: usize) -> OrderBookSummary {
    let step = price * LEVEL_STEP;
    let mut bids = Vec::with_capacity(levels);
    let mut asks = Vec::with_capacity(levels);

    for i in 0..levels {
        let offset = step * (i + 1) as f64;
        let bid_size = MIN_LEVEL_SIZE + rng.gen::<f64>() * LEVEL_SIZE_SPREAD;
        let ask_size = MIN_LEVEL_SIZE + rng.gen::<f64>() * LEVEL_SIZE_SPREAD;
        bids.push(BookLevel::new(price - offset, bid_size));
        asks.push(BookLevel::new(price + offset, ask_size));
    }

    OrderBookSummary::from_levels(bids, asks)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn ladder_is_symmetric_around_price() {
        let mut rng = StdRng::seed_from_u64(7);
        let book = simulate(&mut rng, 100.0, 10);

        assert_eq!(book.bids.len(), 10);
        assert_eq!(book.asks.len(), 10);
        assert!((book.bids[0].price - 99.9).abs() < 1e-9);
        assert!((book.asks[0].price - 100.1).abs() < 1e-9);
        assert!((book.bids[9].price - 99.0).abs() < 1e-9);
        assert!((book.asks[9].price - 101.0).abs() < 1e-9);

        for pair in book.bids.windows(2) {
            assert!(pair[0].price > pair[1].price);
        }
        for pair in book.asks.windows(2) {
            assert!(pair[0].price < pair[1].price);
        }
    }

    #[test]
    fn sizes_and_totals_are_consistent() {
        let mut rng = StdRng::seed_from_u64(42);
        let book = simulate(&mut rng, 245.86, 10);
        for level in book.bids.iter().chain(&book.asks) {
            assert!(level.size >= MIN_LEVEL_SIZE && level.size < MIN_LEVEL_SIZE + LEVEL_SIZE_SPREAD);
            assert!((level.total - level.price * level.size).abs() < 1e-9);
        }
    }

    #[test]
    fn walls_are_the_largest_totals() {
        let mut rng = StdRng::seed_from_u64(3);
        let book = simulate(&mut rng, 50.0, 10);

        let max_bid = book.bids.iter().map(|l| l.total).fold(f64::MIN, f64::max);
        let max_ask = book.asks.iter().map(|l| l.total).fold(f64::MIN, f64::max);
        assert_eq!(book.biggest_buy_wall.total, max_bid);
        assert_eq!(book.biggest_sell_wall.total, max_ask);
        assert!((book.buy_to_sell_ratio - max_bid / max_ask).abs() < 1e-12);
    }

    #[test]
    fn first_wall_wins_ties() {
        let bids = vec![BookLevel::new(10.0, 5.0), BookLevel::new(5.0, 10.0)];
        let asks = vec![BookLevel::new(11.0, 1.0)];
        let book = OrderBookSummary::from_levels(bids, asks);
        assert_eq!(book.biggest_buy_wall.price, 10.0);
        assert!((book.buy_to_sell_ratio - 50.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn empty_ladder_has_zero_ratio() {
        let book = OrderBookSummary::from_levels(Vec::new(), Vec::new());
        assert!(book.is_empty());
        assert_eq!(book.buy_to_sell_ratio, 0.0);
        assert_eq!(book.biggest_buy_wall, BookLevel::default());
    }
}

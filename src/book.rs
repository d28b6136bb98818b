//! `Book`: the two-sided, price-keyed collection of [`OrderQueue`]s for one
//! symbol, and the crossing logic that turns an incoming order into fills
//! plus (for a limit order with volume left over) a resting order.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::order::{Order, OrderId, OrderType, Side, Status};
use crate::price::Price;
use crate::queue::{Fill, OrderQueue};

/// Internal enum to unify forward (ascending) and reverse (descending)
/// iteration over a price-keyed book side, the way a single incoming order
/// sweeps asks low-to-high but bids high-to-low.
enum EitherIter<'a> {
    Fwd(std::collections::btree_map::IterMut<'a, Price, OrderQueue>),
    Rev(std::iter::Rev<std::collections::btree_map::IterMut<'a, Price, OrderQueue>>),
}

impl<'a> Iterator for EitherIter<'a> {
    type Item = (&'a Price, &'a mut OrderQueue);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            EitherIter::Fwd(iter) => iter.next(),
            EitherIter::Rev(iter) => iter.next(),
        }
    }
}

/// Sweeps `incoming` against one side of the book, consuming whole price
/// levels front-to-back until either `incoming` is fully filled, the side
/// runs dry, or `price_ok` rejects the next level (a limit order has
/// stopped crossing). Levels drained to nothing are pruned.
fn sweep(
    incoming: &mut Order,
    book_side: &mut BTreeMap<Price, OrderQueue>,
    reversed: bool,
    price_ok: impl Fn(Price) -> bool,
    now: SystemTime,
) -> Vec<Fill> {
    let mut fills = Vec::new();
    let mut drained = Vec::new();

    let iter = if reversed {
        EitherIter::Rev(book_side.iter_mut().rev())
    } else {
        EitherIter::Fwd(book_side.iter_mut())
    };

    for (&price, queue) in iter {
        if incoming.remain() == 0 {
            break;
        }
        if !price_ok(price) {
            break;
        }
        let want = incoming.remain();
        let (leftover, level_fills) = queue.match_amount(want, price, incoming.id, now);
        incoming.traded += want - leftover;
        if !level_fills.is_empty() {
            debug!(price = %price, matched = want - leftover, "book: level matched");
        }
        fills.extend(level_fills);
        if queue.is_empty() {
            drained.push(price);
        }
    }

    for price in drained {
        book_side.remove(&price);
    }
    fills
}

/// Top-of-book depth at a point in time, truncated to `max_depth` levels
/// per side. The wire shape the rest of a back-test (strategy, recorder)
/// observes the market through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub time: SystemTime,
    /// Highest bid first.
    pub bids: Vec<(Price, u64)>,
    /// Lowest ask first.
    pub asks: Vec<(Price, u64)>,
}

/// The order book for a single symbol.
pub struct Book {
    pub symbol: String,
    pub max_depth: usize,
    /// Buy orders, keyed ascending; matching walks this in reverse to find
    /// the highest bid first.
    pub bids: BTreeMap<Price, OrderQueue>,
    /// Sell orders, keyed ascending; matching walks this forward to find
    /// the lowest ask first.
    pub asks: BTreeMap<Price, OrderQueue>,
}

impl Book {
    pub fn new(symbol: impl Into<String>, max_depth: usize) -> Self {
        Self {
            symbol: symbol.into(),
            max_depth,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<Price, OrderQueue> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Places `order`: sweeps the opposite side, then — for a limit order
    /// with volume left over — rests the remainder in the queue at its
    /// price. A market order never rests; any unfillable remainder is
    /// simply discarded (the redesigned behaviour; see `SPEC_FULL.md`
    /// §4.2).
    pub fn place(&mut self, mut order: Order, now: SystemTime) -> Vec<Fill> {
        if order.volume == 0 {
            return Vec::new();
        }

        let side = order.side();
        if order.order_type == OrderType::Market {
            order.price = match side {
                Side::Buy => Price::MAX,
                Side::Sell => Price::MIN,
            };
        }
        let limit_price = order.price;

        let fills = match (side, order.order_type) {
            (Side::Buy, OrderType::Market) => sweep(&mut order, &mut self.asks, false, |_| true, now),
            (Side::Buy, OrderType::Limit) => {
                sweep(&mut order, &mut self.asks, false, |p| p <= limit_price, now)
            }
            (Side::Sell, OrderType::Market) => sweep(&mut order, &mut self.bids, true, |_| true, now),
            (Side::Sell, OrderType::Limit) => {
                sweep(&mut order, &mut self.bids, true, |p| p >= limit_price, now)
            }
        };

        if order.remain() == 0 {
            order.finish_fill();
        } else if order.order_type == OrderType::Limit {
            order.status = if order.traded > 0 {
                Status::Partial
            } else {
                Status::Live
            };
            self.side_mut(side).entry(order.price).or_default().add(order);
        } else {
            warn!(order_id = order.id, "market order left unfilled remainder, discarding");
        }

        debug_assert!(self.is_not_crossed(), "book crossed after place");
        fills
    }

    /// Withdraws `volume` of historical liquidity at `price` on `side`.
    /// Per `spec.md` §4.2, the level is dropped once its *historical*
    /// volume reaches zero, even if algorithmic orders still rest there —
    /// deliberately distinct from [`cancel_algorithmic`](Self::cancel_algorithmic)'s
    /// drop condition.
    pub fn cancel_historical(&mut self, side: Side, price: Price, volume: u64) {
        let book_side = self.side_mut(side);
        if let Some(queue) = book_side.get_mut(&price) {
            queue.cancel_historical(volume);
            if queue.historical_volume() == 0 {
                book_side.remove(&price);
            }
        }
    }

    /// Cancels a single algorithmic order by id at `price` on `side`,
    /// dropping the level only once it holds no volume at all.
    pub fn cancel_algorithmic(&mut self, side: Side, price: Price, order_id: OrderId) -> bool {
        let book_side = self.side_mut(side);
        let Some(queue) = book_side.get_mut(&price) else {
            return false;
        };
        let found = queue.cancel_algorithmic(order_id);
        if queue.total_volume() == 0 {
            book_side.remove(&price);
        }
        found
    }

    fn is_not_crossed(&self) -> bool {
        match (self.bids.keys().next_back(), self.asks.keys().next()) {
            (Some(best_bid), Some(best_ask)) => best_bid < best_ask,
            _ => true,
        }
    }

    /// Reports up to `max_depth` levels per side — but, preserving a
    /// reporting convention from the reference, never more levels on one
    /// side than are available on the other: `data_depth =
    /// min(bids.len(), asks.len(), max_depth)`.
    pub fn snapshot(&self, time: SystemTime) -> DepthSnapshot {
        let data_depth = self.max_depth.min(self.bids.len()).min(self.asks.len());
        let bids = self
            .bids
            .iter()
            .rev()
            .take(data_depth)
            .map(|(p, q)| (*p, q.total_volume()))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(data_depth)
            .map(|(p, q)| (*p, q.total_volume()))
            .collect();
        DepthSnapshot { time, bids, asks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Direction, Offset};

    fn limit(id: OrderId, side: Side, price: u64, volume: u64) -> Order {
        let (direction, offset) = match side {
            Side::Buy => (Direction::Long, Offset::Open),
            Side::Sell => (Direction::Short, Offset::Open),
        };
        Order {
            id,
            symbol: "IF2021".into(),
            price: Price(price),
            volume,
            traded: 0,
            direction,
            offset,
            order_type: OrderType::Limit,
            is_history: false,
            status: Status::Submitting,
            submit_time: SystemTime::now(),
            on_fill: None,
        }
    }

    fn market(id: OrderId, side: Side, volume: u64) -> Order {
        Order {
            order_type: OrderType::Market,
            price: Price(0),
            ..limit(id, side, 0, volume)
        }
    }

    #[test]
    fn market_buy_partially_fills_across_two_asks() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Sell, 101, 5), SystemTime::now());
        book.place(limit(2, Side::Sell, 102, 3), SystemTime::now());

        let fills = book.place(market(100, Side::Buy, 6), SystemTime::now());

        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].volume, 5);
        assert_eq!(fills[0].price, Price(101));
        assert_eq!(fills[1].volume, 1);
        assert_eq!(fills[1].price, Price(102));
        assert_eq!(book.asks.get(&Price(102)).unwrap().total_volume(), 2);
    }

    #[test]
    fn market_sell_fills_against_highest_bid_first() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Buy, 100, 4), SystemTime::now());

        let fills = book.place(market(200, Side::Sell, 10), SystemTime::now());

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].volume, 4);
        assert_eq!(fills[0].price, Price(100));
        assert!(!book.bids.contains_key(&Price(100)));
    }

    #[test]
    fn market_order_with_no_liquidity_produces_no_fills_and_does_not_rest() {
        let mut book = Book::new("IF2021", 5);
        let fills = book.place(market(300, Side::Buy, 10), SystemTime::now());
        assert!(fills.is_empty());
        assert!(book.asks.is_empty());
    }

    #[test]
    fn market_order_exactly_exhausts_one_level() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Sell, 100, 5), SystemTime::now());
        let fills = book.place(market(400, Side::Buy, 5), SystemTime::now());
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].volume, 5);
        assert!(book.asks.is_empty());
    }

    #[test]
    fn limit_order_partially_matches_then_rests_remainder() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Sell, 100, 5), SystemTime::now());

        let fills = book.place(limit(2, Side::Buy, 101, 10), SystemTime::now());

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].volume, 5);
        assert_eq!(book.bids.get(&Price(101)).unwrap().total_volume(), 5);
    }

    #[test]
    fn limit_order_with_no_cross_rests_in_full() {
        let mut book = Book::new("IF2021", 5);
        let fills = book.place(limit(10, Side::Buy, 90, 8), SystemTime::now());
        assert!(fills.is_empty());
        assert_eq!(book.bids.get(&Price(90)).unwrap().total_volume(), 8);
    }

    #[test]
    fn fifo_fairness_across_two_resting_orders_at_same_price() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Sell, 100, 4), SystemTime::now());
        book.place(limit(2, Side::Sell, 100, 6), SystemTime::now());

        let fills = book.place(market(3, Side::Buy, 9), SystemTime::now());

        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].resting_order_id, 1);
        assert_eq!(fills[0].volume, 4);
        assert_eq!(fills[1].resting_order_id, 2);
        assert_eq!(fills[1].volume, 5);
        assert_eq!(book.asks.get(&Price(100)).unwrap().total_volume(), 1);
    }

    #[test]
    fn crossing_limit_buy_matches_instead_of_resting() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Sell, 105, 5), SystemTime::now());

        let fills = book.place(limit(2, Side::Buy, 110, 3), SystemTime::now());

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, Price(105));
        assert_eq!(fills[0].volume, 3);
        assert_eq!(book.asks.get(&Price(105)).unwrap().total_volume(), 2);
        assert!(!book.bids.contains_key(&Price(110)));
    }

    #[test]
    fn crossing_limit_sell_matches_instead_of_resting() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Buy, 100, 5), SystemTime::now());

        let fills = book.place(limit(2, Side::Sell, 90, 4), SystemTime::now());

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, Price(100));
        assert_eq!(fills[0].volume, 4);
        assert_eq!(book.bids.get(&Price(100)).unwrap().total_volume(), 1);
        assert!(!book.asks.contains_key(&Price(90)));
    }

    #[test]
    fn cancel_algorithmic_removes_order_and_prunes_empty_level() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(42, Side::Buy, 101, 10), SystemTime::now());

        let removed = book.cancel_algorithmic(Side::Buy, Price(101), 42);

        assert!(removed);
        assert!(!book.bids.contains_key(&Price(101)));
    }

    #[test]
    fn cancel_algorithmic_nonexistent_order_is_a_no_op() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Sell, 99, 5), SystemTime::now());

        assert!(!book.cancel_algorithmic(Side::Sell, Price(99), 999));
    }

    #[test]
    fn cancel_historical_drops_level_even_with_algo_volume_remaining() {
        let mut book = Book::new("IF2021", 5);
        let mut hist = limit(1, Side::Buy, 100, 10);
        hist.is_history = true;
        book.place(hist, SystemTime::now());
        book.place(limit(2, Side::Buy, 100, 4), SystemTime::now());

        book.cancel_historical(Side::Buy, Price(100), 10);

        // Historical volume hit zero, so the level is pruned even though
        // the algorithmic order behind it still has volume (§4.2).
        assert!(!book.bids.contains_key(&Price(100)));
    }

    #[test]
    fn snapshot_reports_best_levels_first_up_to_max_depth() {
        let mut book = Book::new("IF2021", 2);
        book.place(limit(1, Side::Buy, 99, 1), SystemTime::now());
        book.place(limit(2, Side::Buy, 100, 1), SystemTime::now());
        book.place(limit(3, Side::Buy, 98, 1), SystemTime::now());
        book.place(limit(4, Side::Sell, 101, 1), SystemTime::now());
        book.place(limit(5, Side::Sell, 102, 1), SystemTime::now());
        book.place(limit(6, Side::Sell, 103, 1), SystemTime::now());

        let snap = book.snapshot(SystemTime::now());
        assert_eq!(snap.bids, vec![(Price(100), 1), (Price(99), 1)]);
        assert_eq!(snap.asks, vec![(Price(101), 1), (Price(102), 1)]);
    }

    #[test]
    fn snapshot_depth_is_limited_by_the_thinner_side() {
        let mut book = Book::new("IF2021", 5);
        book.place(limit(1, Side::Buy, 100, 1), SystemTime::now());
        book.place(limit(2, Side::Buy, 99, 1), SystemTime::now());
        book.place(limit(3, Side::Sell, 101, 1), SystemTime::now());

        let snap = book.snapshot(SystemTime::now());
        assert_eq!(snap.bids, vec![(Price(100), 1)]);
        assert_eq!(snap.asks, vec![(Price(101), 1)]);
    }

    #[test]
    fn zero_volume_order_is_a_silent_no_op() {
        let mut book = Book::new("IF2021", 5);
        let fills = book.place(limit(1, Side::Buy, 100, 0), SystemTime::now());
        assert!(fills.is_empty());
        assert!(book.bids.is_empty());
    }
}

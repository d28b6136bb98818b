//! Reconstructing historical order flow from a stream of market-depth
//! snapshots ("ticks").
//!
//! A back-test only ever has depth snapshots for the historical side of the
//! market, never the individual orders that produced them. [`diff_ticks`]
//! turns two consecutive snapshots into the sequence of [`Event`]s that
//! would explain the change: a level moving out of the money is an
//! aggressive sweep by the *opposite* side (modelled as an unconditional,
//! price-unlimited order, since the exact crossing price the aggressor
//! used is unobservable); a level's volume rising is a new resting order;
//! a level's volume falling with its rank unchanged is a cancellation.

use std::collections::BTreeSet;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::book::DepthSnapshot;
use crate::order::Side;
use crate::price::Price;

/// A price limit that is either an exact tick value or "no limit" — the
/// Rust-idiomatic stand-in for the reference's signed-infinity sentinel
/// price on a sweep event (see `SPEC_FULL.md` §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceBound {
    Exact(Price),
    Unlimited,
}

impl PriceBound {
    pub fn exact(self) -> Option<Price> {
        match self {
            PriceBound::Exact(p) => Some(p),
            PriceBound::Unlimited => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Buy,
    Sell,
    Cancel,
}

/// One inferred change between two ticks.
///
/// `side` is the side of the book the event acts on: for `Buy`/`Sell` it is
/// also the side of the synthetic historical order being placed; for
/// `Cancel` it names which book (bids or asks) loses resting volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub time: SystemTime,
    pub kind: EventKind,
    pub side: Side,
    pub price: PriceBound,
    pub volume: u64,
}

fn price_set(levels: &[(Price, u64)]) -> BTreeSet<Price> {
    levels.iter().map(|(p, _)| *p).collect()
}

fn volume_at(levels: &[(Price, u64)], price: Price) -> u64 {
    levels
        .iter()
        .find(|(p, _)| *p == price)
        .map(|(_, v)| *v)
        .unwrap_or(0)
}

/// Diffs one side of the book (`is_bid` selects bid vs. ask semantics) and
/// appends the inferred events for it to `out`, in best-price-first order.
fn diff_side(prev: &[(Price, u64)], cur: &[(Price, u64)], is_bid: bool, time: SystemTime, out: &mut Vec<Event>) {
    let prev_best = prev.first().copied();
    let cur_best = cur.first().copied();

    // Prices consumed by an aggressive-sweep event above and that must
    // therefore not also surface in the residual level-by-level diff below.
    let mut excluded: BTreeSet<Price> = BTreeSet::new();

    // Top-of-book price unchanged but its volume shrank: per §4.4 this is
    // still aggressive activity (an order traded into the resting top
    // level without fully clearing it), not a cancel. Matches
    // original_source/src/simulator.py:271-283's `del last_buy_dict[...]`
    // branch, which removes the level from both sides before the residual
    // diff runs so it is never double-reported as a cancel.
    if let (Some((pb, pv)), Some((cb, cv))) = (prev_best, cur_best) {
        if pb == cb && cv < pv {
            let (kind, side) = if is_bid {
                (EventKind::Sell, Side::Sell)
            } else {
                (EventKind::Buy, Side::Buy)
            };
            out.push(Event {
                time,
                kind,
                side,
                price: PriceBound::Exact(pb),
                volume: pv - cv,
            });
            excluded.insert(pb);
        }
    }

    let worse = match (prev_best, cur_best) {
        (Some((pb, _)), Some((cb, _))) => {
            if is_bid {
                cb < pb
            } else {
                cb > pb
            }
        }
        (Some(_), None) => true,
        _ => false,
    };

    let in_swept_region = |price: Price| match (worse, cur_best) {
        (false, _) => false,
        (true, Some((boundary, _))) => {
            if is_bid {
                price > boundary
            } else {
                price < boundary
            }
        }
        (true, None) => true,
    };

    if worse {
        let swept: u64 = prev
            .iter()
            .filter(|(p, _)| in_swept_region(*p))
            .map(|(_, v)| v)
            .sum();
        if swept > 0 {
            let (kind, side) = if is_bid {
                (EventKind::Sell, Side::Sell)
            } else {
                (EventKind::Buy, Side::Buy)
            };
            out.push(Event {
                time,
                kind,
                side,
                price: PriceBound::Unlimited,
                volume: swept,
            });
        }
    }

    let mut prices: Vec<Price> = price_set(prev).union(&price_set(cur)).copied().collect();
    if is_bid {
        prices.sort_by(|a, b| b.cmp(a));
    } else {
        prices.sort();
    }

    for price in prices {
        if in_swept_region(price) || excluded.contains(&price) {
            continue;
        }
        let pv = volume_at(prev, price);
        let cv = volume_at(cur, price);
        if cv > pv {
            let (kind, side) = if is_bid {
                (EventKind::Buy, Side::Buy)
            } else {
                (EventKind::Sell, Side::Sell)
            };
            out.push(Event {
                time,
                kind,
                side,
                price: PriceBound::Exact(price),
                volume: cv - pv,
            });
        } else if cv < pv {
            let side = if is_bid { Side::Buy } else { Side::Sell };
            out.push(Event {
                time,
                kind: EventKind::Cancel,
                side,
                price: PriceBound::Exact(price),
                volume: pv - cv,
            });
        }
    }
}

/// Produces the events that explain the change from `prev` to `cur`. Bid
/// and ask sides are independent: a tick in which both sides moved yields
/// both sides' events, bids first.
///
/// Replaying the returned events against a book seeded from `prev` and
/// reading its snapshot afterwards reproduces `cur` exactly (I7) — applying
/// zero events when `prev == cur` included.
pub fn diff_ticks(prev: &DepthSnapshot, cur: &DepthSnapshot) -> Vec<Event> {
    let mut events = Vec::new();
    diff_side(&prev.bids, &cur.bids, true, cur.time, &mut events);
    diff_side(&prev.asks, &cur.asks, false, cur.time, &mut events);
    events
}

/// Diffs every consecutive pair in a tick stream, one `Vec<Event>` per
/// transition. `ticks.len() - 1` diffs are produced; an empty or
/// single-tick stream produces none.
pub fn generate_diffs(ticks: &[DepthSnapshot]) -> Vec<Vec<Event>> {
    ticks.windows(2).map(|pair| diff_ticks(&pair[0], &pair[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(time: SystemTime, bids: Vec<(u64, u64)>, asks: Vec<(u64, u64)>) -> DepthSnapshot {
        DepthSnapshot {
            time,
            bids: bids.into_iter().map(|(p, v)| (Price(p), v)).collect(),
            asks: asks.into_iter().map(|(p, v)| (Price(p), v)).collect(),
        }
    }

    /// Top-of-bid sweep with a new top appearing underneath: scenario #6.
    #[test]
    fn top_of_bid_sweep_with_new_top() {
        let t0 = SystemTime::now();
        let prev = tick(t0, vec![(100, 5), (99, 3)], vec![]);
        let cur = tick(t0, vec![(98, 2)], vec![]);

        let events = diff_ticks(&prev, &cur);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Sell);
        assert_eq!(events[0].price, PriceBound::Unlimited);
        assert_eq!(events[0].volume, 8);
        assert_eq!(events[1].kind, EventKind::Buy);
        assert_eq!(events[1].price, PriceBound::Exact(Price(98)));
        assert_eq!(events[1].volume, 2);
    }

    #[test]
    fn improving_best_bid_emits_a_buy_at_the_new_level() {
        let t0 = SystemTime::now();
        let prev = tick(t0, vec![(100, 5)], vec![]);
        let cur = tick(t0, vec![(101, 2), (100, 5)], vec![]);

        let events = diff_ticks(&prev, &cur);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Buy);
        assert_eq!(events[0].price, PriceBound::Exact(Price(101)));
        assert_eq!(events[0].volume, 2);
    }

    #[test]
    fn unchanged_top_of_book_volume_decrease_is_an_aggressive_sell() {
        let t0 = SystemTime::now();
        let prev = tick(t0, vec![(100, 5)], vec![]);
        let cur = tick(t0, vec![(100, 2)], vec![]);

        let events = diff_ticks(&prev, &cur);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Sell);
        assert_eq!(events[0].side, Side::Sell);
        assert_eq!(events[0].price, PriceBound::Exact(Price(100)));
        assert_eq!(events[0].volume, 3);
    }

    #[test]
    fn non_top_level_volume_decrease_is_still_a_cancel() {
        let t0 = SystemTime::now();
        let prev = tick(t0, vec![(100, 5), (99, 4)], vec![]);
        let cur = tick(t0, vec![(100, 5), (99, 1)], vec![]);

        let events = diff_ticks(&prev, &cur);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Cancel);
        assert_eq!(events[0].side, Side::Buy);
        assert_eq!(events[0].price, PriceBound::Exact(Price(99)));
        assert_eq!(events[0].volume, 3);
    }

    #[test]
    fn identical_ticks_produce_no_events() {
        let t0 = SystemTime::now();
        let t = tick(t0, vec![(100, 5), (99, 1)], vec![(101, 4)]);
        assert!(diff_ticks(&t, &t).is_empty());
    }

    #[test]
    fn ask_side_sweep_is_a_buy_event() {
        let t0 = SystemTime::now();
        let prev = tick(t0, vec![], vec![(101, 4), (102, 6)]);
        let cur = tick(t0, vec![], vec![(103, 1)]);

        let events = diff_ticks(&prev, &cur);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Buy);
        assert_eq!(events[0].price, PriceBound::Unlimited);
        assert_eq!(events[0].volume, 10);
        assert_eq!(events[1].kind, EventKind::Sell);
        assert_eq!(events[1].price, PriceBound::Exact(Price(103)));
        assert_eq!(events[1].volume, 1);
    }

    #[test]
    fn generate_diffs_covers_every_consecutive_pair() {
        let t0 = SystemTime::now();
        let ticks = vec![
            tick(t0, vec![(100, 5)], vec![]),
            tick(t0, vec![(100, 3)], vec![]),
            tick(t0, vec![(100, 3), (99, 2)], vec![]),
        ];
        let diffs = generate_diffs(&ticks);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0][0].kind, EventKind::Sell);
        assert_eq!(diffs[1][0].kind, EventKind::Buy);
    }
}

//! `OrderQueue`: the FIFO chain of historical/algorithmic orders resting at
//! one price level, and the consumption algorithm that drains it.
//!
//! A queue is a sequence of *segments* `(H, A)` — one historical order `H`
//! plus the ordered list `A` of algorithmic orders queued behind it before
//! the next historical order arrived — followed by a trailing
//! `next_orders` list of algorithmic orders placed after the most recent
//! historical order (or all algorithmic orders, if no historical order has
//! arrived yet). Time priority within the queue is exactly
//! `H0, A0, H1, A1, ..., Hn, An, next_orders`.

use std::collections::VecDeque;
use std::time::SystemTime;

use tracing::debug;

use crate::order::{Order, OrderId};
use crate::price::Price;

/// One historical order and the algorithmic orders queued behind it.
struct Segment {
    historical: Order,
    algo: VecDeque<Order>,
}

/// A record of one resting order being consumed by an incoming order.
/// Not part of the distilled spec's data model — the Rust-idiomatic
/// equivalent of returning nothing and relying on side effects alone; see
/// `SPEC_FULL.md` §3.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Fill {
    pub price: Price,
    pub volume: u64,
    pub resting_order_id: OrderId,
    pub resting_is_history: bool,
    pub incoming_order_id: OrderId,
    pub timestamp: SystemTime,
}

#[derive(Default)]
pub struct OrderQueue {
    segments: VecDeque<Segment>,
    next_orders: VecDeque<Order>,
}

impl OrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splice a popped segment's leftover algorithmic orders onto the new
    /// front of whatever comes next — the next segment's `algo` list if
    /// one exists, otherwise `next_orders`. This is the mechanism that
    /// keeps algorithmic orders strictly behind the historical order they
    /// queued behind even after that historical order is gone (I5).
    fn splice_front(&mut self, mut leftover: VecDeque<Order>) {
        if leftover.is_empty() {
            return;
        }
        if let Some(next) = self.segments.front_mut() {
            while let Some(order) = leftover.pop_back() {
                next.algo.push_front(order);
            }
        } else {
            while let Some(order) = leftover.pop_back() {
                self.next_orders.push_front(order);
            }
        }
    }

    /// Adds `order` to the queue. Historical orders seal all algorithmic
    /// orders queued behind them into a new segment and reset
    /// `next_orders`; algorithmic orders simply join the trailing list.
    pub fn add(&mut self, order: Order) {
        if order.is_history {
            let algo = std::mem::take(&mut self.next_orders);
            self.segments.push_back(Segment {
                historical: order,
                algo,
            });
        } else {
            self.next_orders.push_back(order);
        }
    }

    /// Consumes up to `amount` units of liquidity FIFO, draining each
    /// segment's algorithmic list in parallel with its historical order so
    /// that by the time the historical order is exhausted, the
    /// algorithmic orders behind it have received their proportional
    /// share. Returns whatever amount could not be matched (the caller
    /// routes this to the next price level) and the `Fill`s produced.
    pub fn match_amount(
        &mut self,
        mut amount: u64,
        price: Price,
        incoming_order_id: OrderId,
        now: SystemTime,
    ) -> (u64, Vec<Fill>) {
        let mut fills = Vec::new();
        while amount > 0 {
            let Some(seg) = self.segments.front_mut() else {
                break;
            };
            let remain_h = seg.historical.remain();
            if amount >= remain_h {
                amount -= remain_h;
                if remain_h > 0 {
                    fills.push(Fill {
                        price,
                        volume: remain_h,
                        resting_order_id: seg.historical.id,
                        resting_is_history: true,
                        incoming_order_id,
                        timestamp: now,
                    });
                    seg.historical.traded = seg.historical.volume;
                    seg.historical.finish_fill();
                }
                fills.extend(Self::consume_algo(
                    &mut seg.algo,
                    remain_h,
                    price,
                    incoming_order_id,
                    now,
                ));
                let popped = self.segments.pop_front().expect("front just checked");
                debug!(price = %price, "order queue: historical segment fully consumed");
                self.splice_front(popped.algo);
            } else {
                seg.historical.traded += amount;
                fills.push(Fill {
                    price,
                    volume: amount,
                    resting_order_id: seg.historical.id,
                    resting_is_history: true,
                    incoming_order_id,
                    timestamp: now,
                });
                fills.extend(Self::consume_algo(
                    &mut seg.algo,
                    amount,
                    price,
                    incoming_order_id,
                    now,
                ));
                amount = 0;
            }
        }
        (amount, fills)
    }

    /// Drains up to `amount` units from the front of an algorithmic list,
    /// firing `on_fill` for every order it fully consumes.
    fn consume_algo(
        orders: &mut VecDeque<Order>,
        mut amount: u64,
        price: Price,
        incoming_order_id: OrderId,
        now: SystemTime,
    ) -> Vec<Fill> {
        let mut fills = Vec::new();
        while amount > 0 {
            let Some(front) = orders.front_mut() else {
                break;
            };
            let remain = front.remain();
            if amount >= remain {
                amount -= remain;
                if remain > 0 {
                    fills.push(Fill {
                        price,
                        volume: remain,
                        resting_order_id: front.id,
                        resting_is_history: false,
                        incoming_order_id,
                        timestamp: now,
                    });
                    front.traded = front.volume;
                    front.finish_fill();
                }
                orders.pop_front();
            } else {
                front.traded += amount;
                fills.push(Fill {
                    price,
                    volume: amount,
                    resting_order_id: front.id,
                    resting_is_history: false,
                    incoming_order_id,
                    timestamp: now,
                });
                amount = 0;
            }
        }
        fills
    }

    /// Withdraws `amount` of historical volume from the head of the queue,
    /// dropping exhausted segments and splicing their algorithmic orders
    /// forward — but never filling them (a cancel is withdrawn liquidity,
    /// not a trade). Returns the amount that could not be withdrawn
    /// (always 0 for a well-formed tick-diff cancel event).
    pub fn cancel_historical(&mut self, mut amount: u64) -> u64 {
        while amount > 0 {
            let Some(seg) = self.segments.front_mut() else {
                break;
            };
            let remain_h = seg.historical.remain();
            if amount >= remain_h {
                amount -= remain_h;
                let popped = self.segments.pop_front().expect("front just checked");
                self.splice_front(popped.algo);
            } else {
                seg.historical.volume -= amount;
                amount = 0;
            }
        }
        amount
    }

    /// Removes an algorithmic order by id from anywhere in the queue.
    /// No callback fires — the order's queue position merely improved or
    /// it was withdrawn outright, neither of which is a fill.
    pub fn cancel_algorithmic(&mut self, order_id: OrderId) -> bool {
        for seg in self.segments.iter_mut() {
            if let Some(pos) = seg.algo.iter().position(|o| o.id == order_id) {
                seg.algo.remove(pos);
                return true;
            }
        }
        if let Some(pos) = self.next_orders.iter().position(|o| o.id == order_id) {
            self.next_orders.remove(pos);
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.next_orders.is_empty()
    }

    pub fn total_volume(&self) -> u64 {
        let segs: u64 = self
            .segments
            .iter()
            .map(|s| s.historical.remain() + s.algo.iter().map(Order::remain).sum::<u64>())
            .sum();
        let trailing: u64 = self.next_orders.iter().map(Order::remain).sum();
        segs + trailing
    }

    pub fn historical_volume(&self) -> u64 {
        self.segments.iter().map(|s| s.historical.remain()).sum()
    }

    /// Presentation-only figure for UI height calculation: the greater of
    /// cumulative historical and cumulative algorithmic depth at each
    /// point in the queue, plus trailing algorithmic volume. Never read by
    /// the matching path.
    pub fn display_height(&self) -> u64 {
        let mut hist_height = 0u64;
        let mut algo_height = 0u64;
        for seg in &self.segments {
            hist_height += seg.historical.volume;
            algo_height += seg.algo.iter().map(|o| o.volume).sum::<u64>();
            if algo_height < hist_height {
                algo_height = hist_height;
            }
        }
        algo_height + self.next_orders.iter().map(|o| o.volume).sum::<u64>()
    }
}

//! `Exchange`: the multi-symbol entry point a strategy or tick-replayer
//! actually talks to. Owns one [`Book`] per symbol, assigns order ids
//! through a pluggable [`IdSource`], and keeps the registry that lets a
//! bare order id be cancelled without the caller tracking its price.

use std::collections::HashMap;
use std::time::SystemTime;

use tracing::info;

use crate::book::{Book, DepthSnapshot};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ids::IdSource;
use crate::order::{Direction, Offset, Order, OrderHandle, OrderId, OrderType, Side, Status};
use crate::price::Price;
use crate::queue::Fill;
use crate::tickdiff::{Event, EventKind, PriceBound};

/// Everything needed to place a new algorithmic order, supplied by the
/// strategy under test. `on_fill` is optional — most back-test strategies
/// poll fills from the returned `Vec<Fill>` instead, but a callback is
/// useful for strategies modelled as reactive state machines.
pub struct NewOrderRequest {
    pub symbol: String,
    pub price: Price,
    pub volume: u64,
    pub direction: Direction,
    pub offset: Offset,
    pub order_type: OrderType,
    pub on_fill: Option<Box<dyn FnMut()>>,
}

pub struct Exchange {
    config: EngineConfig,
    books: HashMap<String, Book>,
    /// order id -> (symbol, price, side), for algorithmic orders currently
    /// resting. Filled or cancelled orders are removed; historical orders
    /// placed from tick-diff events are never registered here since
    /// nothing outside the engine addresses them by id.
    registry: HashMap<OrderId, (String, Price, Side)>,
    ids: Box<dyn IdSource>,
}

impl Exchange {
    pub fn new(config: EngineConfig, ids: Box<dyn IdSource>) -> Self {
        Self {
            config,
            books: HashMap::new(),
            registry: HashMap::new(),
            ids,
        }
    }

    /// Registers a symbol, creating its (initially empty) book. Placing an
    /// order or applying an event against an unregistered symbol is an
    /// [`EngineError::UnknownSymbol`].
    pub fn add_symbol(&mut self, symbol: impl Into<String>) {
        let symbol = symbol.into();
        self.books
            .entry(symbol.clone())
            .or_insert_with(|| Book::new(symbol, self.config.max_depth));
    }

    fn book_mut(&mut self, symbol: &str) -> EngineResult<&mut Book> {
        self.books
            .get_mut(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }

    /// Places a new algorithmic order, assigning it an id from the
    /// configured [`IdSource`].
    pub fn place_order(
        &mut self,
        request: NewOrderRequest,
        now: SystemTime,
    ) -> EngineResult<(OrderHandle, Vec<Fill>)> {
        let id = self.ids.next_id();
        self.place_order_with_id(id, request, now)
    }

    /// Places a new algorithmic order under a caller-supplied id, for
    /// embedders whose harness already owns id assignment.
    pub fn place_order_with_id(
        &mut self,
        id: OrderId,
        request: NewOrderRequest,
        now: SystemTime,
    ) -> EngineResult<(OrderHandle, Vec<Fill>)> {
        let NewOrderRequest {
            symbol,
            price,
            volume,
            direction,
            offset,
            order_type,
            on_fill,
        } = request;

        let order = Order {
            id,
            symbol: symbol.clone(),
            price,
            volume,
            traded: 0,
            direction,
            offset,
            order_type,
            is_history: false,
            status: Status::Submitting,
            submit_time: now,
            on_fill,
        };
        let side = order.side();
        let handle = OrderHandle::from(&order);

        let book = self.book_mut(&symbol)?;
        let fills = book.place(order, now);

        let traded: u64 = fills.iter().map(|f| f.volume).sum();
        if order_type == OrderType::Limit && traded < volume {
            self.registry.insert(id, (symbol, price, side));
        }

        info!(order_id = id, filled = traded, "placed order");
        Ok((handle, fills))
    }

    /// Cancels a resting algorithmic order by id.
    pub fn cancel_order(&mut self, order_id: OrderId) -> EngineResult<bool> {
        let (symbol, price, side) = self
            .registry
            .remove(&order_id)
            .ok_or(EngineError::UnknownOrder(order_id))?;
        let book = self.book_mut(&symbol)?;
        Ok(book.cancel_algorithmic(side, price, order_id))
    }

    /// Replays one tick-diff [`Event`] against `symbol`'s book as a
    /// historical order or a historical cancellation.
    pub fn apply_event(&mut self, symbol: &str, event: &Event) -> EngineResult<Vec<Fill>> {
        let id = self.ids.next_id();
        let book = self.book_mut(symbol)?;

        match event.kind {
            EventKind::Buy | EventKind::Sell => {
                let (direction, offset) = match event.side {
                    Side::Buy => (Direction::Long, Offset::Open),
                    Side::Sell => (Direction::Short, Offset::Open),
                };
                let (order_type, price) = match event.price {
                    PriceBound::Exact(p) => (OrderType::Limit, p),
                    PriceBound::Unlimited => (OrderType::Market, Price(0)),
                };
                let order = Order {
                    id,
                    symbol: symbol.to_string(),
                    price,
                    volume: event.volume,
                    traded: 0,
                    direction,
                    offset,
                    order_type,
                    is_history: true,
                    status: Status::Submitting,
                    submit_time: event.time,
                    on_fill: None,
                };
                Ok(book.place(order, event.time))
            }
            EventKind::Cancel => {
                let price = event
                    .price
                    .exact()
                    .expect("a cancel event always carries an exact price");
                book.cancel_historical(event.side, price, event.volume);
                Ok(Vec::new())
            }
        }
    }

    /// Replays a whole tick-diff, in order, against `symbol`'s book.
    pub fn apply_events(&mut self, symbol: &str, events: &[Event]) -> EngineResult<Vec<Fill>> {
        let mut fills = Vec::new();
        for event in events {
            fills.extend(self.apply_event(symbol, event)?);
        }
        Ok(fills)
    }

    pub fn snapshot(&self, symbol: &str, time: SystemTime) -> EngineResult<DepthSnapshot> {
        self.books
            .get(symbol)
            .map(|book| book.snapshot(time))
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }
}

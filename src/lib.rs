//! A single-process limit order book matching engine for back-testing
//! futures trading strategies against historical market data.
//!
//! The engine runs two kinds of orders through the same queues: orders
//! inferred from historical tick data (via [`tickdiff`]), and orders
//! placed live by the strategy under test (via [`exchange::Exchange`]).
//! Historical and algorithmic orders share price-time priority, but an
//! algorithmic order queued behind a historical order never overtakes it
//! even after that historical order leaves the book — see [`queue`].
//!
//! ```text
//! tickdiff::Event  ──┐
//!                     ├─> exchange::Exchange ─> book::Book ─> queue::OrderQueue
//! NewOrderRequest  ──┘
//! ```

pub mod book;
pub mod config;
pub mod error;
pub mod exchange;
pub mod ids;
pub mod order;
pub mod price;
pub mod queue;
pub mod tickdiff;

pub use book::{Book, DepthSnapshot};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use exchange::{Exchange, NewOrderRequest};
pub use ids::{IdSource, SequentialIds, UuidIds};
pub use order::{Direction, Offset, Order, OrderHandle, OrderId, OrderType, Side, Status};
pub use price::Price;
pub use queue::{Fill, OrderQueue};
pub use tickdiff::{diff_ticks, generate_diffs, Event, EventKind, PriceBound};

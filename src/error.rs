use thiserror::Error;

use crate::order::OrderId;

/// Reportable failures from the public `Exchange` surface.
///
/// Per the error-handling policy: an unknown symbol or order id is always
/// the caller's mistake (bad input from the strategy), never a reason to
/// abort the simulation, so both variants are plain `Result` values the
/// caller is expected to handle. A genuine internal contradiction (a
/// negative remainder, a book still crossed after `place` returns) is not
/// represented here at all — those are logic bugs, and the component that
/// detects one panics via `debug_assert!` instead of returning an error a
/// caller might be tempted to swallow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    #[error("order `{0}` not found")]
    UnknownOrder(OrderId),
}

pub type EngineResult<T> = Result<T, EngineError>;

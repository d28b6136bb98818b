//! Fixed-point price keys.
//!
//! Floating-point prices are hazardous as map keys: two ticks that "should"
//! be the same price can fail an equality check after a division or two.
//! [`Price`] canonicalises every price to an integer number of tick-size
//! units before it ever reaches an [`OrderQueue`](crate::queue::OrderQueue)
//! or a [`Book`](crate::book::Book); the only place a decimal value is
//! converted is [`crate::config::EngineConfig::to_ticks`].

use std::fmt;

/// A price expressed as a whole number of tick-size units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Price(pub u64);

impl Price {
    /// The lowest representable price. Used as the sentinel limit for a
    /// synthetic sell order that must sweep every resting bid.
    pub const MIN: Price = Price(0);
    /// The highest representable price. Used as the sentinel limit for a
    /// synthetic buy order that must sweep every resting ask.
    pub const MAX: Price = Price(u64::MAX);
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Price {
    fn from(ticks: u64) -> Self {
        Price(ticks)
    }
}

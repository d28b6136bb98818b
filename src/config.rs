//! Engine-wide configuration.
//!
//! This is the in-process configuration layer every component reads
//! `max_depth` and price canonicalisation from. There is deliberately no
//! CLI or environment-variable surface here — that belongs to the
//! strategy/harness embedding this crate, not the core.

use crate::price::Price;

/// Shared settings for an [`Exchange`](crate::exchange::Exchange) and the
/// [`Book`](crate::book::Book)s it creates.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Maximum number of price levels a [`DepthSnapshot`](crate::book::DepthSnapshot)
    /// reports per side.
    pub max_depth: usize,
    /// The size, in price units, of one tick. Used only by [`to_ticks`](Self::to_ticks)
    /// and [`from_ticks`](Self::from_ticks) to canonicalise decimal prices
    /// at the boundary.
    pub tick_size: f64,
}

impl EngineConfig {
    pub fn new(max_depth: usize, tick_size: f64) -> Self {
        assert!(tick_size > 0.0, "tick_size must be positive");
        Self {
            max_depth,
            tick_size,
        }
    }

    /// Canonicalise a decimal price into a [`Price`] by rounding to the
    /// nearest tick. This is the only place in the crate a float is turned
    /// into a map key.
    pub fn to_ticks(&self, value: f64) -> Price {
        Price((value / self.tick_size).round() as u64)
    }

    /// Inverse of [`to_ticks`](Self::to_ticks), for reporting prices back
    /// out in decimal form.
    pub fn from_ticks(&self, price: Price) -> f64 {
        price.0 as f64 * self.tick_size
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            tick_size: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_whole_ticks() {
        let cfg = EngineConfig::new(5, 0.5);
        let p = cfg.to_ticks(101.5);
        assert_eq!(p, Price(203));
        assert_eq!(cfg.from_ticks(p), 101.5);
    }

    #[test]
    fn rounds_to_nearest_tick() {
        let cfg = EngineConfig::new(5, 1.0);
        assert_eq!(cfg.to_ticks(100.49), Price(100));
        assert_eq!(cfg.to_ticks(100.51), Price(101));
    }
}

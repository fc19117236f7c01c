// ===============================
// src/positions.rs (PnL & inventory)
// ===============================

use crate::domain::{Price, Side, Volume};
use crate::metrics::{PNL_REALIZED, POSITION};

/// Cash-style accounting: buys spend `px * qty`, sells earn it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub qty: Volume,
    pub realized_pnl: Price,
}

impl Position {
    pub fn on_fill(&mut self, side: Side, px: Price, qty: Volume) {
        self.realized_pnl -= side.sign() * px * qty;
        self.qty += side.sign() * qty;

        POSITION.set(self.qty);
        PNL_REALIZED.set(self.realized_pnl);
    }

    /// Realized cash plus the open position marked at `mark_px`.
    pub fn total_pnl(&self, mark_px: Price) -> Price {
        self.realized_pnl + mark_px * self.qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trip_realizes_difference() {
        let mut pos = Position::default();
        pos.on_fill(Side::Buy, 100.0, 10.0);
        assert_relative_eq!(pos.realized_pnl, -1_000.0);
        assert_relative_eq!(pos.total_pnl(100.0), 0.0);
        assert_relative_eq!(pos.total_pnl(105.0), 50.0);

        pos.on_fill(Side::Sell, 110.0, 10.0);
        assert_relative_eq!(pos.qty, 0.0);
        assert_relative_eq!(pos.realized_pnl, 100.0);
        assert_relative_eq!(pos.total_pnl(1.0), 100.0);
    }

    #[test]
    fn test_short_is_marked_to_market() {
        let mut pos = Position::default();
        pos.on_fill(Side::Sell, 50.0, 4.0);
        assert_relative_eq!(pos.qty, -4.0);
        assert_relative_eq!(pos.total_pnl(40.0), 40.0);
    }
}

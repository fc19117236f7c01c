// ===============================
// src/risk.rs
// ===============================
use thiserror::Error;

use crate::domain::{volume_eq, Order, Signal, Side, Volume};

/// Position bounds. `min <= max` is checked by config validation.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub min_position: Volume,
    pub max_position: Volume,
}

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("position already at max")]
    AtMax,
    #[error("position already at min")]
    AtMin,
    #[error("no headroom for volume {0}")]
    NoHeadroom(Volume),
}

impl RiskError {
    pub fn label(&self) -> &'static str {
        match self {
            RiskError::AtMax => "at_max",
            RiskError::AtMin => "at_min",
            RiskError::NoHeadroom(_) => "no_headroom",
        }
    }
}

/// Room left before `side` would breach a bound.
pub fn headroom(side: Side, position: Volume, lim: &Limits) -> Volume {
    match side {
        Side::Buy => lim.max_position - position,
        Side::Sell => position - lim.min_position,
    }
}

/// Pre-trade check. On success the order volume is `min(requested, headroom)`.
pub fn check(sig: &Signal, position: Volume, lim: &Limits) -> Result<Order, RiskError> {
    // 1) Already sitting on the bound
    match sig.side {
        Side::Buy if volume_eq(position, lim.max_position) => return Err(RiskError::AtMax),
        Side::Sell if volume_eq(position, lim.min_position) => return Err(RiskError::AtMin),
        _ => {}
    }

    // 2) Clamp to headroom
    let qty = sig.qty.min(headroom(sig.side, position, lim));
    if qty <= 0.0 {
        return Err(RiskError::NoHeadroom(qty));
    }

    Ok(Order { side: sig.side, px: sig.px, qty, time: sig.time })
}

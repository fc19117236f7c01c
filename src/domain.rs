// ===============================
// src/domain.rs
// ===============================
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub type Price = f64;
pub type Volume = f64;
pub type OrderId = u64;

/// Tolerance used when comparing a position against its bounds.
pub const VOLUME_EPS: Volume = 1e-9;

pub fn volume_eq(a: Volume, b: Volume) -> bool {
    (a - b).abs() < VOLUME_EPS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side { pub fn sign(&self) -> f64 { match self { Side::Buy => 1.0, Side::Sell => -1.0 } } }
impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Side::Buy => "Buy", Side::Sell => "Sell" })
    }
}

/// One simulated market observation. `time` is elapsed since simulation start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick { pub time: Duration, pub price: Price, pub volume: Volume }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal { pub time: Duration, pub side: Side, pub px: Price, pub qty: Volume }

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order { pub side: Side, pub px: Price, pub qty: Volume, pub time: Duration }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus { Pending, Executed, Rejected }
impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplyStatus::Pending => "Pending",
            ReplyStatus::Executed => "Executed",
            ReplyStatus::Rejected => "Rejected",
        })
    }
}

/// One resolved order as handed to the order sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub side: Side,
    pub px: Price,
    pub qty: Volume,
    pub status: ReplyStatus,
    pub error: String,
    pub total_pnl: Price,
}

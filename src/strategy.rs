// ===============================
// src/strategy.rs
// ===============================
//
// Time-weighted EMA crossover (trend following):
// - fast EMA crosses above slow EMA -> Buy
// - fast EMA crosses below slow EMA -> Sell
//
// Both EMAs decay by elapsed time between ticks, not by tick count, so
// irregular tick spacing does not distort the filter.
//
// Risk:
// - choppy markets produce whipsaw; position limits live in risk.rs.
//

use std::time::Duration;
use tracing::debug;

use crate::domain::{Price, Side, Signal, Tick};
use crate::metrics::SIGNALS;
use crate::orders::OrderManager;
use crate::recorder::RecorderError;

/// Continuous-time EMA: `alpha = 1 - exp(-dt / tau)`.
#[derive(Debug, Clone)]
pub struct TimeEma {
    neg_inv_tau: f64,
    value: Option<Price>,
    last_time: Duration,
}

impl TimeEma {
    /// `period` must be non-zero (config validation guarantees it).
    pub fn new(period: Duration) -> Self {
        Self { neg_inv_tau: -1.0 / period.as_secs_f64(), value: None, last_time: Duration::ZERO }
    }

    pub fn alpha(&self, dt: Duration) -> f64 {
        1.0 - (dt.as_secs_f64() * self.neg_inv_tau).exp()
    }

    pub fn update(&mut self, tick: &Tick) -> Price {
        let Some(cur) = self.value else {
            self.value = Some(tick.price);
            self.last_time = tick.time;
            return tick.price;
        };

        // stale or duplicate timestamp: leave value and time alone
        if tick.time <= self.last_time {
            return cur;
        }

        let alpha = self.alpha(tick.time - self.last_time);
        let next = cur + alpha * (tick.price - cur);
        self.value = Some(next);
        self.last_time = tick.time;
        next
    }

    /// `None` until the first update.
    pub fn current(&self) -> Option<Price> {
        self.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Higher {
    Undetermined,
    Fast,
    Slow,
}

pub struct EmaCrossover {
    fast: TimeEma,
    slow: TimeEma,
    higher: Higher,
}

impl EmaCrossover {
    pub fn new(fast: Duration, slow: Duration) -> Self {
        Self { fast: TimeEma::new(fast), slow: TimeEma::new(slow), higher: Higher::Undetermined }
    }

    #[cfg(test)]
    pub fn state(&self) -> Higher {
        self.higher
    }

    /// (fast, slow); `None` before the first tick.
    pub fn values(&self) -> (Option<Price>, Option<Price>) {
        (self.fast.current(), self.slow.current())
    }

    pub fn on_tick(&mut self, tick: &Tick) -> Option<Signal> {
        let slow = self.slow.update(tick);
        let fast = self.fast.update(tick);

        let prev = self.higher;
        let (now, side) = if fast > slow { (Higher::Fast, Side::Buy) } else { (Higher::Slow, Side::Sell) };
        self.higher = now;

        // only a flip between two determined states is a cross
        let crossed = matches!((prev, now), (Higher::Slow, Higher::Fast) | (Higher::Fast, Higher::Slow));
        if !crossed {
            return None;
        }
        debug!(side = %side, fast, slow, px = tick.price, "cross");
        Some(Signal { time: tick.time, side, px: tick.price, qty: tick.volume })
    }
}

/// Crossover strategy wired to an order manager.
pub struct EmaTradingBot {
    cross: EmaCrossover,
    orders: OrderManager,
    signals: u64,
}

impl EmaTradingBot {
    pub fn new(cross: EmaCrossover, orders: OrderManager) -> Self {
        Self { cross, orders, signals: 0 }
    }

    pub fn on_tick(&mut self, tick: &Tick) {
        if let Some(sig) = self.cross.on_tick(tick) {
            self.signals += 1;
            let label = match sig.side { Side::Buy => "buy", Side::Sell => "sell" };
            SIGNALS.with_label_values(&[label]).inc();
            match sig.side {
                Side::Buy => self.orders.on_buy_signal(sig.px, sig.qty),
                Side::Sell => self.orders.on_sell_signal(sig.px, sig.qty),
            }
        }
    }

    pub fn signals(&self) -> u64 {
        self.signals
    }

    pub fn orders(&self) -> &OrderManager {
        &self.orders
    }

    pub fn cross(&self) -> &EmaCrossover {
        &self.cross
    }

    pub fn flush_records(&mut self) -> Result<(), RecorderError> {
        self.orders.flush_records()
    }
}

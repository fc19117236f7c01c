// ===============================
// src/simulation.rs (orchestrator)
// ===============================
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info};

use crate::config::SimConfig;
use crate::domain::{Price, Tick, Volume};
use crate::feed::{GbmParams, TickGenerator};
use crate::gateway::SimVenue;
use crate::metrics::RECORDER_ERRORS;
use crate::orders::{OrderManager, OrderStats};
use crate::recorder::{OrderSink, RecorderError, TickSink};
use crate::risk::Limits;
use crate::strategy::{EmaCrossover, EmaTradingBot};

const HEARTBEAT_EVERY: u64 = 10_000;

/// Price stream and venue stream, drawn from one optional master seed.
pub fn rng_streams(seed: Option<u64>) -> (StdRng, StdRng) {
    let mut master = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let price = StdRng::seed_from_u64(master.gen());
    let venue = StdRng::seed_from_u64(master.gen());
    (price, venue)
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub steps: u64,
    pub final_time_ms: u128,
    pub final_price: Price,
    pub signals: u64,
    pub orders: OrderStats,
    pub position: Volume,
    pub realized_pnl: Price,
    pub total_pnl: Price,
    pub tick_sink_errors: u64,
}

pub struct Simulator {
    steps_count: u64,
    feed: TickGenerator,
    bot: EmaTradingBot,
    ticks: Box<dyn TickSink>,
    current: Tick,
    tick_sink_errors: u64,
    started_at: DateTime<Utc>,
}

impl Simulator {
    pub fn new(cfg: &SimConfig, ticks: Box<dyn TickSink>, orders: Box<dyn OrderSink>) -> Self {
        let (price_rng, venue_rng) = rng_streams(cfg.seed);
        let feed = TickGenerator::new(GbmParams::from(cfg), cfg.initial_price, price_rng);
        let venue = SimVenue::new(cfg.rejection_probability, venue_rng);
        let limits = Limits { min_position: cfg.min_position, max_position: cfg.max_position };
        let om = OrderManager::new(venue, limits, orders);
        let bot = EmaTradingBot::new(EmaCrossover::new(cfg.fast_ema, cfg.slow_ema), om);
        let current = feed.latest();
        Self { steps_count: cfg.steps_count, feed, bot, ticks, current, tick_sink_errors: 0, started_at: Utc::now() }
    }

    #[cfg(test)]
    pub fn current(&self) -> Tick {
        self.current
    }

    pub fn step(&mut self) -> Tick {
        self.current = self.feed.next_tick();
        if let Err(e) = self.ticks.write_tick(&self.current) {
            self.tick_sink_errors += 1;
            RECORDER_ERRORS.with_label_values(&["ticks"]).inc();
            error!(%e, "tick record failed");
        }
        self.bot.on_tick(&self.current);
        self.current
    }

    pub fn run(&mut self) -> RunSummary {
        info!(steps = self.steps_count, "simulation started");
        for i in 1..=self.steps_count {
            let tick = self.step();
            if i % HEARTBEAT_EVERY == 0 {
                let pos = self.bot.orders().position();
                let (fast, slow) = self.bot.cross().values();
                info!(
                    step = i,
                    px = tick.price,
                    fast = ?fast,
                    slow = ?slow,
                    pos = pos.qty,
                    pnl = self.bot.orders().total_pnl(tick.price),
                    "heartbeat"
                );
            }
        }
        self.summary()
    }

    /// Flush both sinks; returns the first error.
    pub fn flush(&mut self) -> Result<(), RecorderError> {
        let ticks = self.ticks.flush();
        let orders = self.bot.flush_records();
        ticks.and(orders)
    }

    pub fn summary(&self) -> RunSummary {
        let om = self.bot.orders();
        let pos = om.position();
        RunSummary {
            started_at: self.started_at.to_rfc3339(),
            steps: self.steps_count,
            final_time_ms: self.current.time.as_millis(),
            final_price: self.current.price,
            signals: self.bot.signals(),
            orders: om.stats(),
            position: pos.qty,
            realized_pnl: pos.realized_pnl,
            total_pnl: om.total_pnl(self.current.price),
            tick_sink_errors: self.tick_sink_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::testing::{BrokenSink, MemorySink};
    use std::time::Duration;

    fn cfg(steps: u64) -> SimConfig {
        SimConfig {
            steps_count: steps,
            seed: Some(1234),
            rejection_probability: 0.0,
            min_volume: 10.0,
            max_volume: 100.0,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_run_logs_every_step_but_not_baseline() {
        let sink = MemorySink::default();
        let mut sim = Simulator::new(&cfg(500), Box::new(sink.clone()), Box::new(sink.clone()));
        assert_eq!(sim.current(), Tick { time: Duration::ZERO, price: 100.0, volume: 0.0 });

        let summary = sim.run();
        let ticks = sink.ticks.borrow();
        assert_eq!(ticks.len(), 500);
        assert!(ticks[0].time > Duration::ZERO);
        assert!(ticks.windows(2).all(|w| w[1].time > w[0].time && w[1].price > 0.0));
        assert_eq!(summary.steps, 500);
        assert_eq!(summary.final_price, ticks[499].price);
        assert_eq!(summary.orders.submitted, sink.orders.borrow().len() as u64);
    }

    #[test]
    fn test_position_stays_in_bounds_over_a_run() {
        let sink = MemorySink::default();
        let mut c = cfg(20_000);
        c.min_position = -150.0;
        c.max_position = 150.0;
        c.rejection_probability = 20.0;
        let mut sim = Simulator::new(&c, Box::new(sink.clone()), Box::new(sink.clone()));
        let summary = sim.run();
        assert!(summary.position >= -150.0 - 1e-9 && summary.position <= 150.0 + 1e-9);
        assert_eq!(summary.orders.executed + summary.orders.rejected, summary.orders.submitted);
    }

    #[test]
    fn test_tick_sink_errors_are_soft() {
        let sink = MemorySink::default();
        let mut sim = Simulator::new(&cfg(100), Box::new(BrokenSink), Box::new(sink));
        let summary = sim.run();
        assert_eq!(summary.steps, 100);
        assert_eq!(summary.tick_sink_errors, 100);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let a = MemorySink::default();
        let b = MemorySink::default();
        Simulator::new(&cfg(2_000), Box::new(a.clone()), Box::new(a.clone())).run();
        Simulator::new(&cfg(2_000), Box::new(b.clone()), Box::new(b.clone())).run();
        assert_eq!(*a.ticks.borrow(), *b.ticks.borrow());
        assert_eq!(*a.orders.borrow(), *b.orders.borrow());
    }

    #[test]
    fn test_venue_outcomes_do_not_move_price_path() {
        let accept = MemorySink::default();
        let reject = MemorySink::default();
        let mut c = cfg(1_000);
        Simulator::new(&c, Box::new(accept.clone()), Box::new(accept.clone())).run();
        c.rejection_probability = 100.0;
        Simulator::new(&c, Box::new(reject.clone()), Box::new(reject.clone())).run();
        assert_eq!(*accept.ticks.borrow(), *reject.ticks.borrow());
        assert!(reject.orders.borrow().iter().all(|o| o.status == crate::domain::ReplyStatus::Rejected));
    }
}

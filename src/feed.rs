// ===============================
// src/feed.rs
// ===============================
//
// Synthetic market data:
// - each step advances the clock by a uniform random delay
//   in [min_diff_time, max_diff_time] (integer nanoseconds, inclusive)
// - price follows a discretized geometric process, so it never goes <= 0
// - volume is uniform in [min_volume, max_volume]
//
// Notes:
// - Drift and variance are scaled by dt / time_horizon, i.e. they are
//   horizon-relative, not per second or annualized. Keep it that way;
//   reference runs depend on this scaling.
//

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;
use std::time::Duration;

use crate::config::SimConfig;
use crate::domain::{Price, Tick, Volume};
use crate::metrics::{LAST_PRICE, TICKS};

#[derive(Debug, Clone)]
pub struct GbmParams {
    pub mu: f64,
    pub sigma: f64,
    pub time_horizon: Duration,
    pub min_diff_time: Duration,
    pub max_diff_time: Duration,
    pub min_volume: Volume,
    pub max_volume: Volume,
}

impl From<&SimConfig> for GbmParams {
    fn from(c: &SimConfig) -> Self {
        Self {
            mu: c.average_trend_value,
            sigma: c.price_variation,
            time_horizon: c.time_horizon,
            min_diff_time: c.min_diff_time,
            max_diff_time: c.max_diff_time,
            min_volume: c.min_volume,
            max_volume: c.max_volume,
        }
    }
}

/// One geometric step: `px * exp((mu - sigma^2/2) f + sigma sqrt(f) z)` with `f = dt / horizon`.
pub fn gbm_step(px: Price, dt: Duration, horizon: Duration, mu: f64, sigma: f64, z: f64) -> Price {
    let f = dt.as_nanos() as f64 / horizon.as_nanos() as f64;
    let drift = (mu - 0.5 * sigma * sigma) * f;
    let diffusion = sigma * f.sqrt() * z;
    px * (drift + diffusion).exp()
}

pub struct TickGenerator {
    params: GbmParams,
    rng: StdRng,
    last: Tick,
}

impl TickGenerator {
    /// Starts from the baseline tick (t = 0, `initial_price`, volume 0).
    pub fn new(params: GbmParams, initial_price: Price, rng: StdRng) -> Self {
        let last = Tick { time: Duration::ZERO, price: initial_price, volume: 0.0 };
        Self { params, rng, last }
    }

    /// Most recent tick; the baseline until the first `next_tick`.
    pub fn latest(&self) -> Tick {
        self.last
    }

    fn random_dt(&mut self) -> Duration {
        let lo = self.params.min_diff_time.as_nanos() as u64;
        let hi = self.params.max_diff_time.as_nanos() as u64;
        Duration::from_nanos(self.rng.gen_range(lo..=hi))
    }

    fn random_volume(&mut self) -> Volume {
        self.rng.gen_range(self.params.min_volume..=self.params.max_volume)
    }

    pub fn next_tick(&mut self) -> Tick {
        let dt = self.random_dt();
        let z: f64 = self.rng.sample(StandardNormal);
        let p = &self.params;
        let price = gbm_step(self.last.price, dt, p.time_horizon, p.mu, p.sigma, z);
        let volume = self.random_volume();

        let tick = Tick { time: self.last.time + dt, price, volume };
        self.last = tick;
        TICKS.inc();
        LAST_PRICE.set(price);
        tick
    }
}

impl Iterator for TickGenerator {
    type Item = Tick;
    fn next(&mut self) -> Option<Tick> {
        Some(self.next_tick())
    }
}

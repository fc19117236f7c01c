// ===============================
// src/gateway.rs (simulated venue)
// ===============================
use rand::rngs::StdRng;
use rand::Rng;

use crate::domain::{Order, OrderId, ReplyStatus};
use crate::metrics::EXECS;

pub const REJECT_REASON: &str = "Random rejection";

/// Receives venue replies on `poll`. The order manager is the only implementor.
pub trait ReplyHandler {
    fn on_reply(&mut self, id: OrderId, status: ReplyStatus, error: &str);
}

#[derive(Debug, Clone, Copy)]
struct PendingReply {
    id: OrderId,
    status: ReplyStatus,
}

/// Fills or rejects every order. The outcome is drawn on `send_order`,
/// but nobody hears about it until `poll`.
pub struct SimVenue {
    rejection_pct: f64,
    rng: StdRng,
    next_id: OrderId,
    queue: Vec<PendingReply>,
}

impl SimVenue {
    pub fn new(rejection_pct: f64, rng: StdRng) -> Self {
        Self { rejection_pct, rng, next_id: 1, queue: Vec::new() }
    }

    pub fn send_order(&mut self, _order: &Order) -> OrderId {
        let id = self.next_id;
        self.next_id += 1;

        let draw: f64 = self.rng.gen_range(0.0..100.0);
        let status = if draw < self.rejection_pct { ReplyStatus::Rejected } else { ReplyStatus::Executed };
        self.queue.push(PendingReply { id, status });
        id
    }

    /// Deliver queued replies in submission order, then clear the queue.
    /// With no handler the replies are dropped.
    pub fn poll(&mut self, handler: Option<&mut dyn ReplyHandler>) -> usize {
        let drained = std::mem::take(&mut self.queue);
        let n = drained.len();
        if let Some(h) = handler {
            for r in drained {
                let (label, error) = match r.status {
                    ReplyStatus::Rejected => ("rejected", REJECT_REASON),
                    ReplyStatus::Executed => ("executed", ""),
                    ReplyStatus::Pending => ("pending", ""),
                };
                EXECS.with_label_values(&[label]).inc();
                h.on_reply(r.id, r.status, error);
            }
        }
        n
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use rand::SeedableRng;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect(Vec<(OrderId, ReplyStatus, String)>);
    impl ReplyHandler for Collect {
        fn on_reply(&mut self, id: OrderId, status: ReplyStatus, error: &str) {
            self.0.push((id, status, error.to_string()));
        }
    }

    fn order() -> Order {
        Order { side: Side::Buy, px: 100.0, qty: 1.0, time: Duration::ZERO }
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut venue = SimVenue::new(50.0, StdRng::seed_from_u64(1));
        let ids: Vec<OrderId> = (0..20).map(|_| venue.send_order(&order())).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_poll_delivers_in_order_and_clears() {
        let mut venue = SimVenue::new(0.0, StdRng::seed_from_u64(2));
        for _ in 0..3 {
            venue.send_order(&order());
        }
        let mut h = Collect::default();
        assert_eq!(venue.poll(Some(&mut h)), 3);
        let ids: Vec<OrderId> = h.0.iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(h.0.iter().all(|r| r.1 == ReplyStatus::Executed && r.2.is_empty()));
        assert_eq!(venue.pending(), 0);

        // empty poll is a no-op
        assert_eq!(venue.poll(Some(&mut h)), 0);
        assert_eq!(h.0.len(), 3);
    }

    #[test]
    fn test_poll_without_handler_drops_replies() {
        let mut venue = SimVenue::new(0.0, StdRng::seed_from_u64(3));
        venue.send_order(&order());
        venue.send_order(&order());
        assert_eq!(venue.poll(None), 2);
        assert_eq!(venue.pending(), 0);
        // ids keep counting after a dropped batch
        assert_eq!(venue.send_order(&order()), 3);
    }

    #[test]
    fn test_full_rejection_uses_fixed_reason() {
        let mut venue = SimVenue::new(100.0, StdRng::seed_from_u64(4));
        for _ in 0..50 {
            venue.send_order(&order());
        }
        let mut h = Collect::default();
        venue.poll(Some(&mut h));
        assert!(h.0.iter().all(|r| r.1 == ReplyStatus::Rejected && r.2 == REJECT_REASON));
    }

    #[test]
    fn test_rejection_rate_tracks_probability() {
        let mut venue = SimVenue::new(50.0, StdRng::seed_from_u64(5));
        for _ in 0..1_000 {
            venue.send_order(&order());
        }
        let mut h = Collect::default();
        venue.poll(Some(&mut h));
        let rejected = h.0.iter().filter(|r| r.1 == ReplyStatus::Rejected).count();
        let ratio = rejected as f64 / 1_000.0;
        assert!((0.30..=0.70).contains(&ratio), "ratio {ratio}");
    }
}

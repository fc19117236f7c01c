// ===============================
// src/orders.rs (order manager)
// ===============================
//
// Signal -> risk::check -> SimVenue::send_order -> SimVenue::poll -> on_reply.
// Everything resolves inside one call, so the next tick always sees the
// updated position.
//
use ahash::AHashMap as HashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::{Order, OrderId, OrderRecord, Price, ReplyStatus, Side, Signal, Volume};
use crate::gateway::{ReplyHandler, SimVenue};
use crate::metrics::{ORDERS, PNL_TOTAL, RECORDER_ERRORS, RISK_SKIPS};
use crate::positions::Position;
use crate::recorder::{OrderSink, RecorderError};
use crate::risk::{self, Limits};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub submitted: u64,
    pub executed: u64,
    pub rejected: u64,
    pub sink_errors: u64,
}

/// Pending orders plus the position they settle into.
struct Book {
    pending: HashMap<OrderId, Order>,
    position: Position,
    sink: Box<dyn OrderSink>,
    stats: OrderStats,
}

impl ReplyHandler for Book {
    fn on_reply(&mut self, id: OrderId, status: ReplyStatus, err: &str) {
        let Some(order) = self.pending.remove(&id) else {
            warn!(id, "reply for unknown order, ignored");
            return;
        };

        match status {
            ReplyStatus::Executed => {
                self.position.on_fill(order.side, order.px, order.qty);
                self.stats.executed += 1;
                info!(id, side = %order.side, px = order.px, qty = order.qty, pos = self.position.qty, "FILLED");
            }
            ReplyStatus::Rejected => {
                self.stats.rejected += 1;
                warn!(id, side = %order.side, px = order.px, qty = order.qty, reason = %err, "REJECT");
            }
            ReplyStatus::Pending => {}
        }

        let total_pnl = self.position.total_pnl(order.px);
        PNL_TOTAL.set(total_pnl);

        let rec = OrderRecord {
            id,
            side: order.side,
            px: order.px,
            qty: order.qty,
            status,
            error: err.to_string(),
            total_pnl,
        };
        if let Err(e) = self.sink.write_order(&rec) {
            self.stats.sink_errors += 1;
            RECORDER_ERRORS.with_label_values(&["orders"]).inc();
            error!(%e, id, "order record failed");
        }
    }
}

pub struct OrderManager {
    venue: SimVenue,
    limits: Limits,
    book: Book,
}

impl OrderManager {
    pub fn new(venue: SimVenue, limits: Limits, sink: Box<dyn OrderSink>) -> Self {
        let book = Book { pending: HashMap::new(), position: Position::default(), sink, stats: OrderStats::default() };
        Self { venue, limits, book }
    }

    pub fn on_buy_signal(&mut self, px: Price, qty: Volume) {
        self.on_signal(&Signal { time: Default::default(), side: Side::Buy, px, qty });
    }

    pub fn on_sell_signal(&mut self, px: Price, qty: Volume) {
        self.on_signal(&Signal { time: Default::default(), side: Side::Sell, px, qty });
    }

    fn on_signal(&mut self, sig: &Signal) {
        let order = match risk::check(sig, self.book.position.qty, &self.limits) {
            Ok(o) => o,
            Err(e) => {
                RISK_SKIPS.with_label_values(&[e.label()]).inc();
                debug!(?e, side = %sig.side, qty = sig.qty, pos = self.book.position.qty, "risk skipped");
                return;
            }
        };

        let id = self.venue.send_order(&order);
        self.book.pending.insert(id, order);
        self.book.stats.submitted += 1;
        ORDERS.inc();

        self.venue.poll(Some(&mut self.book));
    }

    pub fn position(&self) -> Position {
        self.book.position
    }

    pub fn total_pnl(&self, mark_px: Price) -> Price {
        self.book.position.total_pnl(mark_px)
    }

    pub fn stats(&self) -> OrderStats {
        self.book.stats
    }

    pub fn flush_records(&mut self) -> Result<(), RecorderError> {
        self.book.sink.flush()
    }
}

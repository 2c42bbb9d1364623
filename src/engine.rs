// src/engine.rs
//! Decision-core consumer.
//!
//! Owns every piece of consumer-local state: the book view, the signal
//! engine, the strategy, the execution simulator and the trade journal
//! handle. One call per ring event; within a tick the book update is visible
//! to the signals, the signals to the strategy, the strategy to the
//! simulator.
//!
//! Event order on a trade print matters: fills are detected *before* fresh
//! quotes are admitted, so a taker order placed by this tick fills on the
//! next print, not its own trigger.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::book::{BookView, EventKind, MarketUpdate, Side};
use crate::fixed;
use crate::journal::{JournalRecord, TradeJournal};
use crate::sim::{Executor, Fill, OrderSide};
use crate::signal::SignalEngine;
use crate::strategy::Strategy;
use crate::wire::MarketMsg;

const DUMP_INTERVAL: Duration = Duration::from_secs(1);
const INITIAL_BALANCE: f64 = 1_000.0;
const DISPLAY_DEPTH: usize = 5;

pub struct Engine {
    book: BookView,
    signals: SignalEngine,
    strategy: Strategy,
    exec: Executor,
    journal: TradeJournal,
    session_id: String,
    last_price: f64,
    crossed_snapshots: u64,
    book_dump: PathBuf,
    dashboard_dump: PathBuf,
    last_dump: Option<Instant>,
}

impl Engine {
    /// `output_dir` receives the two display side-channel files. The session
    /// id is shared with the journal, so the caller mints it.
    pub fn new(output_dir: impl AsRef<Path>, journal: TradeJournal, session_id: String) -> Self {
        let output_dir = output_dir.as_ref();
        Self {
            book: BookView::new(),
            signals: SignalEngine::new(),
            strategy: Strategy::new(),
            exec: Executor::new(INITIAL_BALANCE),
            journal,
            session_id,
            last_price: 0.0,
            crossed_snapshots: 0,
            book_dump: output_dir.join("book_snapshot.json"),
            dashboard_dump: output_dir.join("dashboard.json"),
            last_dump: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn crossed_snapshots(&self) -> u64 {
        self.crossed_snapshots
    }

    pub fn balance(&self) -> f64 {
        self.exec.balance()
    }

    pub fn position(&self) -> f64 {
        self.exec.position()
    }

    /// Handles one event off the ring.
    pub fn on_msg(&mut self, msg: &MarketMsg) {
        let exchange_ns = msg.ts_ms() * 1_000_000;
        let local_ns = Utc::now().timestamp_nanos_opt().unwrap_or(0);

        match msg {
            MarketMsg::Depth(snap) => {
                self.signals.observe(exchange_ns, local_ns);
                if self.book.apply_snapshot(snap).is_err() {
                    self.crossed_snapshots += 1;
                } else {
                    self.tick(snap.ts_ms);
                }
            }
            MarketMsg::Trade(t) => {
                // buyer_maker=true means the taker sold.
                let side = if t.buyer_maker { Side::Ask } else { Side::Bid };
                let mu = MarketUpdate::new(
                    exchange_ns,
                    local_ns,
                    t.price,
                    t.qty,
                    side,
                    EventKind::Trade,
                );
                self.signals.add_event(&mu);

                let price = fixed::to_f64(t.price);
                self.last_price = price;
                let fills = self.exec.on_trade(price, t.ts_ms);
                for fill in &fills {
                    self.journal_fill(fill);
                }
                self.tick(t.ts_ms);
            }
            MarketMsg::Liq(_) | MarketMsg::Ticker(_) => {
                self.signals.observe(exchange_ns, local_ns);
            }
        }

        self.maybe_dump();
    }

    /// Flushes side-channels on shutdown.
    pub fn finish(&mut self) {
        self.last_dump = None;
        self.maybe_dump();
    }

    fn tick(&mut self, ts_ms: i64) {
        self.strategy.set_position(self.exec.position_units());
        let quotes = self.strategy.quotes(&self.book, &self.signals);

        let best_bid = self.book.best_bid().map(|(p, _)| fixed::to_f64(p));
        let best_ask = self.book.best_ask().map(|(p, _)| fixed::to_f64(p));
        self.exec.apply_quotes(&quotes, best_bid, best_ask, ts_ms);
    }

    fn journal_fill(&self, fill: &Fill) {
        self.journal.push(JournalRecord {
            ts_ms: fill.ts_ms,
            side: fill.kind.as_str(),
            price: fill.price,
            qty: fill.qty,
            pnl: fill.pnl,
            balance: fill.balance_after,
            reason: fill.reason.as_str(),
            velocity: self.signals.trade_velocity(),
            vpin: self.signals.vpin(),
        });
    }

    fn maybe_dump(&mut self) {
        if let Some(last) = self.last_dump {
            if last.elapsed() < DUMP_INTERVAL {
                return;
            }
        }
        self.last_dump = Some(Instant::now());

        if let Err(err) = self.dump_book() {
            warn!(error = %err, "book snapshot dump failed");
        }
        if let Err(err) = self.dump_dashboard() {
            warn!(error = %err, "dashboard dump failed");
        }
    }

    fn dump_book(&self) -> Result<()> {
        let levels = |side| -> Vec<[f64; 2]> {
            self.book
                .top_levels(side, DISPLAY_DEPTH)
                .into_iter()
                .map(|(p, q)| [fixed::to_f64(p), fixed::to_f64(q)])
                .collect()
        };

        let doc = json!({
            "bids": levels(Side::Bid),
            "asks": levels(Side::Ask),
        });
        write_atomic(&self.book_dump, doc.to_string().as_bytes())
    }

    fn dump_dashboard(&self) -> Result<()> {
        let orders: Vec<_> = self
            .exec
            .active_orders()
            .map(|o| {
                let side = if o.side == OrderSide::Bid { "B" } else { "A" };
                json!({
                    "id": o.id,
                    "side": side,
                    "price": o.price,
                    "qty": o.qty,
                    "ts": o.ts_ms,
                    "type": o.reason.as_str(),
                })
            })
            .collect();

        let doc = json!({
            "session_id": self.session_id,
            "price": self.last_price,
            "velocity": self.signals.trade_velocity(),
            "position": self.exec.position(),
            "entry_price": self.exec.entry_price(),
            "balance": self.exec.balance(),
            "orders": orders,
        });
        write_atomic(&self.dashboard_dump, doc.to_string().as_bytes())
    }
}

/// Mints the session identifier shared by the engine and its journal.
pub fn session_id() -> String {
    format!("CORTEX-{}", Utc::now().timestamp())
}

/// Write-then-rename so a reader never sees a half-written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

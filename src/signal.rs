// src/signal.rs
//! Micro-structure signal engine.
//!
//! Keeps a fixed 1000-print trade window with incrementally maintained taker
//! buy/sell volume totals, plus the last observed feed latency. Derived
//! sensors:
//!
//! - trade velocity (prints/sec), the momentum read
//! - VPIN (signed taker-flow imbalance), the order-flow toxicity read
//! - trap signal (directional flow that fails to extend the price extreme)
//! - regime classification against the book (vacuum / absorption)
//! - latency guard: data older than 500 ms degrades everything to safe
//!   defaults instead of aborting

use crate::book::{BookView, EventKind, MarketUpdate, Side};
use crate::fixed::SCALE;

const WINDOW_SIZE: usize = 1000;
const MAX_LATENCY_NS: i64 = 500_000_000; // 500ms

/// Minimum top-5 liquidity per side before the book counts as a vacuum.
const VACUUM_THRESHOLD: i64 = 50_000_000; // 0.5 units
/// L1 size above which a level counts as an absorption wall.
const WALL_THRESHOLD: i64 = 500_000_000; // 5.0 units

const TRAP_MIN_RECORDS: usize = 50;
const TRAP_VPIN_THRESHOLD: i64 = 30_000_000;
const TRAP_PRICE_GAP: i64 = 50_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TakerSide {
    #[default]
    Buy,
    Sell,
}

/// Tri-valued trap signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trap {
    /// Net buying stalled below the window high; expect a flush down.
    Bull,
    /// Net selling stalled above the window low; expect a bounce.
    Bear,
    None,
}

/// Book regime as seen by the strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookState {
    Normal,
    /// Top-5 liquidity on at least one side below the critical threshold.
    Vacuum,
    /// An L1 wall large enough to absorb incoming flow.
    Absorption,
}

#[derive(Clone, Copy, Default)]
struct TradeRecord {
    price: i64,
    size: i64,
    side: TakerSide,
    ts_ns: i64,
}

pub struct SignalEngine {
    window: Box<[TradeRecord; WINDOW_SIZE]>,
    head: usize,
    count: usize,
    buy_vol: i64,
    sell_vol: i64,
    latency_ns: i64,
    stale: bool,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalEngine {
    pub fn new() -> Self {
        Self {
            window: Box::new([TradeRecord::default(); WINDOW_SIZE]),
            head: 0,
            count: 0,
            buy_vol: 0,
            sell_vol: 0,
            latency_ns: 0,
            stale: false,
        }
    }

    /// Updates the latency guard from an event's timestamps. Called for every
    /// event, trade or not.
    #[inline]
    pub fn observe(&mut self, ts_exchange_ns: i64, ts_local_ns: i64) {
        self.latency_ns = ts_local_ns - ts_exchange_ns;
        self.stale = self.latency_ns > MAX_LATENCY_NS;
    }

    /// Ingests a market event. Non-trade events only refresh the latency
    /// guard; trades also enter the window, evicting the oldest record and
    /// keeping the running volume totals consistent.
    pub fn add_event(&mut self, mu: &MarketUpdate) {
        self.observe(mu.ts_exchange_ns, mu.ts_local_ns);

        if mu.kind != EventKind::Trade {
            return;
        }

        let side = match mu.side {
            Side::Bid => TakerSide::Buy,
            Side::Ask => TakerSide::Sell,
        };

        if self.count == WINDOW_SIZE {
            let evicted = self.window[self.head];
            match evicted.side {
                TakerSide::Buy => self.buy_vol -= evicted.size,
                TakerSide::Sell => self.sell_vol -= evicted.size,
            }
        } else {
            self.count += 1;
        }

        self.window[self.head] = TradeRecord {
            price: mu.price,
            size: mu.size,
            side,
            ts_ns: mu.ts_exchange_ns,
        };
        match side {
            TakerSide::Buy => self.buy_vol += mu.size,
            TakerSide::Sell => self.sell_vol += mu.size,
        }
        self.head = (self.head + 1) % WINDOW_SIZE;
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    #[inline]
    pub fn latency_ns(&self) -> i64 {
        self.latency_ns
    }

    /// Trades per second over the window. 0 with fewer than two records or a
    /// non-positive time span.
    pub fn trade_velocity(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let oldest = (self.head + WINDOW_SIZE - self.count) % WINDOW_SIZE;
        let newest = (self.head + WINDOW_SIZE - 1) % WINDOW_SIZE;
        let span_ns = self.window[newest].ts_ns - self.window[oldest].ts_ns;
        if span_ns <= 0 {
            return 0.0;
        }
        self.count as f64 / (span_ns as f64 / 1e9)
    }

    /// Signed taker-flow imbalance, `(|b−s| * 10^8 / (b+s)) * sign(b−s)`,
    /// in [−10^8, +10^8]. Returns 0 when both volume totals are zero; callers
    /// must not read that as a balanced-flow claim.
    pub fn vpin(&self) -> i64 {
        let total = self.buy_vol + self.sell_vol;
        if total == 0 {
            return 0;
        }
        let diff = self.buy_vol - self.sell_vol;
        let mag = (diff.unsigned_abs() as i128 * SCALE as i128 / total as i128) as i64;
        if diff < 0 {
            -mag
        } else {
            mag
        }
    }

    /// Trap detection: strong directional flow that failed to extend the
    /// window's price extreme. Needs at least 50 records.
    pub fn trap_signal(&self) -> Trap {
        if self.count < TRAP_MIN_RECORDS {
            return Trap::None;
        }

        let newest = (self.head + WINDOW_SIZE - 1) % WINDOW_SIZE;
        let last_px = self.window[newest].price;

        let mut max_px = i64::MIN;
        let mut min_px = i64::MAX;
        for i in 0..self.count {
            let px = self.window[(self.head + WINDOW_SIZE - 1 - i) % WINDOW_SIZE].price;
            max_px = max_px.max(px);
            min_px = min_px.min(px);
        }

        let vpin = self.vpin();
        if vpin > TRAP_VPIN_THRESHOLD && last_px < max_px - TRAP_PRICE_GAP {
            Trap::Bull
        } else if vpin < -TRAP_VPIN_THRESHOLD && last_px > min_px + TRAP_PRICE_GAP {
            Trap::Bear
        } else {
            Trap::None
        }
    }

    /// Classifies the current book. Under staleness this degrades to Normal:
    /// the safety gate in the strategy pulls quotes anyway, and a stale
    /// vacuum reading must not trigger taker flow.
    pub fn book_state(&self, book: &BookView) -> BookState {
        if self.stale {
            return BookState::Normal;
        }

        if book.depth_sum(Side::Bid, 5) < VACUUM_THRESHOLD
            || book.depth_sum(Side::Ask, 5) < VACUUM_THRESHOLD
        {
            return BookState::Vacuum;
        }

        if book.level1_size(Side::Bid) > WALL_THRESHOLD
            || book.level1_size(Side::Ask) > WALL_THRESHOLD
        {
            return BookState::Absorption;
        }

        BookState::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(ts_ms: i64, price: i64, size: i64, side: Side) -> MarketUpdate {
        MarketUpdate::new(ts_ms * 1_000_000, ts_ms * 1_000_000, price, size, side, EventKind::Trade)
    }

    #[test]
    fn velocity_counts_over_span() {
        let mut sig = SignalEngine::new();
        // 10 trades over 1 second.
        for i in 0..10 {
            sig.add_event(&trade(1_000 + i * 111, 50_000_000, 1, Side::Bid));
        }
        let v = sig.trade_velocity();
        assert!((v - 10.0 / 0.999).abs() < 0.1, "velocity {v}");
    }

    #[test]
    fn velocity_degenerate_cases() {
        let mut sig = SignalEngine::new();
        assert_eq!(sig.trade_velocity(), 0.0);
        sig.add_event(&trade(1_000, 50_000_000, 1, Side::Bid));
        assert_eq!(sig.trade_velocity(), 0.0);
        // Same timestamp -> zero span.
        sig.add_event(&trade(1_000, 50_000_000, 1, Side::Bid));
        assert_eq!(sig.trade_velocity(), 0.0);
    }

    #[test]
    fn vpin_sign_and_bounds() {
        let mut sig = SignalEngine::new();
        assert_eq!(sig.vpin(), 0);

        sig.add_event(&trade(1, 50_000_000, 300_000_000, Side::Bid));
        sig.add_event(&trade(2, 50_000_000, 100_000_000, Side::Ask));
        // (300 - 100) / 400 = +0.5
        assert_eq!(sig.vpin(), SCALE / 2);

        sig.add_event(&trade(3, 50_000_000, 600_000_000, Side::Ask));
        assert!(sig.vpin() < 0);
        assert!(sig.vpin().abs() <= SCALE);
    }

    #[test]
    fn window_eviction_keeps_totals_consistent() {
        let mut sig = SignalEngine::new();
        // Overfill the window: the first 200 buys must be evicted.
        for i in 0..1_200i64 {
            let side = if i < 200 { Side::Bid } else { Side::Ask };
            sig.add_event(&trade(i, 50_000_000, 1_000, side));
        }
        // Window now holds 1000 sells only.
        assert_eq!(sig.vpin(), -SCALE);
    }

    #[test]
    fn bull_trap_fires_on_stalled_buying() {
        let mut sig = SignalEngine::new();
        for i in 0..60 {
            sig.add_event(&trade(1_000 + i, 51_000_000, 100_000_000, Side::Bid));
        }
        for i in 0..10 {
            sig.add_event(&trade(1_060 + i, 50_900_000, 100_000_000, Side::Ask));
        }
        // Net buying (VPIN ~ +0.71e8) but price sits 0.001 below the high.
        assert!(sig.vpin() > TRAP_VPIN_THRESHOLD);
        assert_eq!(sig.trap_signal(), Trap::Bull);
    }

    #[test]
    fn bear_trap_fires_on_stalled_selling() {
        let mut sig = SignalEngine::new();
        for i in 0..60 {
            sig.add_event(&trade(1_000 + i, 50_000_000, 100_000_000, Side::Ask));
        }
        for i in 0..10 {
            sig.add_event(&trade(1_060 + i, 50_100_000, 100_000_000, Side::Bid));
        }
        assert_eq!(sig.trap_signal(), Trap::Bear);
    }

    #[test]
    fn trap_needs_fifty_records() {
        let mut sig = SignalEngine::new();
        for i in 0..48 {
            sig.add_event(&trade(1_000 + i, 51_000_000, 100_000_000, Side::Bid));
        }
        sig.add_event(&trade(1_050, 50_000_000, 1, Side::Bid));
        assert_eq!(sig.trap_signal(), Trap::None);
    }

    #[test]
    fn latency_guard_flags_and_recovers() {
        let mut sig = SignalEngine::new();
        sig.observe(0, 600_000_000); // 600ms old
        assert!(sig.is_stale());
        assert_eq!(sig.latency_ns(), 600_000_000);

        sig.observe(1_000_000_000, 1_100_000_000); // 100ms old
        assert!(!sig.is_stale());
    }

    #[test]
    fn regime_classification() {
        use crate::wire::DepthSnapshot;

        let mut sig = SignalEngine::new();
        let mut book = BookView::new();

        let mut snap = DepthSnapshot::default();
        snap.bid_px[0] = 50_000_000;
        snap.bid_qty[0] = 100_000_000;
        snap.ask_px[0] = 50_020_000;
        snap.ask_qty[0] = 100_000_000;
        book.apply_snapshot(&snap).unwrap();
        assert_eq!(sig.book_state(&book), BookState::Normal);

        // Thin ask side -> vacuum.
        snap.ask_qty[0] = 40_000_000;
        book.apply_snapshot(&snap).unwrap();
        assert_eq!(sig.book_state(&book), BookState::Vacuum);

        // Big L1 wall -> absorption.
        snap.ask_qty[0] = 600_000_000;
        book.apply_snapshot(&snap).unwrap();
        assert_eq!(sig.book_state(&book), BookState::Absorption);

        // Staleness degrades to Normal.
        sig.observe(0, 600_000_000);
        assert_eq!(sig.book_state(&book), BookState::Normal);
    }
}

// src/book.rs
//! Order book view and the hot-path event record.
//!
//! The book is a snapshot consumer: each depth packet replaces the whole
//! top-50, and the sides are kept as sorted maps from price to aggregate
//! size, so the top of book is always the first (asks) or last (bids) key.
//! Derived micro-structure reads (micro-price, depth imbalance) use 128-bit
//! intermediates; price-times-size products are E16 and overflow i64.
//!
//! Everything here is consumer-thread-local. No locking.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::fixed::SCALE;
use crate::wire::DepthSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Side {
    Bid,
    Ask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    Add,
    Cancel,
    Trade,
}

/// Hot-path market event, laid out to occupy exactly one cache line so two
/// adjacent records never share one (no false sharing between cores).
#[derive(Clone, Copy, Debug)]
#[repr(C, align(64))]
pub struct MarketUpdate {
    /// Exchange (engine) timestamp, ns.
    pub ts_exchange_ns: i64,
    /// Local arrival timestamp, ns.
    pub ts_local_ns: i64,
    /// Reserved for L3 feeds; zero in snapshot-consumer mode.
    pub order_id: i64,
    pub price: i64,
    pub size: i64,
    pub side: Side,
    pub kind: EventKind,
    _pad: [u8; 22],
}

const _: () = assert!(std::mem::size_of::<MarketUpdate>() == 64);

impl MarketUpdate {
    pub fn new(
        ts_exchange_ns: i64,
        ts_local_ns: i64,
        price: i64,
        size: i64,
        side: Side,
        kind: EventKind,
    ) -> Self {
        Self {
            ts_exchange_ns,
            ts_local_ns,
            order_id: 0,
            price,
            size,
            side,
            kind,
            _pad: [0; 22],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookError {
    /// Snapshot arrived with best bid >= best ask; previous state retained.
    Crossed,
}

#[derive(Default)]
pub struct BookView {
    bids: BTreeMap<i64, i64>,
    asks: BTreeMap<i64, i64>,
}

impl BookView {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Replaces both sides from a depth packet. Slots with a zero price are
    /// the packet's unused tail and are skipped; zero-size levels at a real
    /// price are kept (they still define the top of book).
    ///
    /// A crossed snapshot is rejected and the previous book state retained.
    pub fn apply_snapshot(&mut self, snap: &DepthSnapshot) -> Result<(), BookError> {
        let mut bids = BTreeMap::new();
        let mut asks = BTreeMap::new();

        for i in 0..snap.bid_px.len() {
            if snap.bid_px[i] != 0 {
                *bids.entry(snap.bid_px[i]).or_insert(0) += snap.bid_qty[i];
            }
        }
        for i in 0..snap.ask_px.len() {
            if snap.ask_px[i] != 0 {
                *asks.entry(snap.ask_px[i]).or_insert(0) += snap.ask_qty[i];
            }
        }

        if let (Some((&bb, _)), Some((&ba, _))) =
            (bids.iter().next_back(), asks.iter().next())
        {
            if bb >= ba {
                return Err(BookError::Crossed);
            }
        }

        self.bids = bids;
        self.asks = asks;
        Ok(())
    }

    /// Applies a single add/cancel event to the aggregate level.
    pub fn apply_update(&mut self, mu: &MarketUpdate) {
        let side = match mu.side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        match mu.kind {
            EventKind::Add => {
                *side.entry(mu.price).or_insert(0) += mu.size;
            }
            EventKind::Cancel => {
                if let Some(level) = side.get_mut(&mu.price) {
                    *level -= mu.size;
                    if *level <= 0 {
                        side.remove(&mu.price);
                    }
                }
            }
            EventKind::Trade => {}
        }
    }

    #[inline]
    pub fn best_bid(&self) -> Option<(i64, i64)> {
        self.bids.iter().next_back().map(|(&p, &s)| (p, s))
    }

    #[inline]
    pub fn best_ask(&self) -> Option<(i64, i64)> {
        self.asks.iter().next().map(|(&p, &s)| (p, s))
    }

    /// Volume-weighted fair value between the L1 levels:
    /// `(bid_px * ask_vol + ask_px * bid_vol) / (bid_vol + ask_vol)`.
    ///
    /// Returns 0 when either side is empty; the plain midpoint when both
    /// sides exist but the L1 volumes sum to zero.
    pub fn micro_price(&self) -> i64 {
        let (Some((bid_px, bid_vol)), Some((ask_px, ask_vol))) =
            (self.best_bid(), self.best_ask())
        else {
            return 0;
        };

        let den = bid_vol + ask_vol;
        if den == 0 {
            return (bid_px + ask_px) / 2;
        }

        let num = bid_px as i128 * ask_vol as i128 + ask_px as i128 * bid_vol as i128;
        (num / den as i128) as i64
    }

    /// Top-5 depth imbalance, `(Σbid − Σask) * 10^8 / (Σbid + Σask)`, signed
    /// and clamped to ±10^8. Returns 0 when either side is empty.
    pub fn imbalance(&self) -> i64 {
        if self.bids.is_empty() || self.asks.is_empty() {
            return 0;
        }

        let bid_vol = self.depth_sum(Side::Bid, 5);
        let ask_vol = self.depth_sum(Side::Ask, 5);
        let total = bid_vol + ask_vol;
        if total == 0 {
            return 0;
        }

        let diff = bid_vol - ask_vol;
        let mag = (diff.unsigned_abs() as i128 * SCALE as i128 / total as i128) as i64;
        let signed = if diff < 0 { -mag } else { mag };
        signed.clamp(-SCALE, SCALE)
    }

    /// Sum of sizes across the top `n` levels of one side.
    pub fn depth_sum(&self, side: Side, n: usize) -> i64 {
        match side {
            Side::Bid => self.bids.values().rev().take(n).sum(),
            Side::Ask => self.asks.values().take(n).sum(),
        }
    }

    /// L1 size, 0 when the side is empty.
    #[inline]
    pub fn level1_size(&self, side: Side) -> i64 {
        match side {
            Side::Bid => self.best_bid().map_or(0, |(_, s)| s),
            Side::Ask => self.best_ask().map_or(0, |(_, s)| s),
        }
    }

    /// Top `n` (price, size) levels, best first.
    pub fn top_levels(&self, side: Side, n: usize) -> Vec<(i64, i64)> {
        match side {
            Side::Bid => self.bids.iter().rev().take(n).map(|(&p, &s)| (p, s)).collect(),
            Side::Ask => self.asks.iter().take(n).map(|(&p, &s)| (p, s)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(bids: &[(i64, i64)], asks: &[(i64, i64)]) -> DepthSnapshot {
        let mut s = DepthSnapshot::default();
        for (i, &(p, q)) in bids.iter().enumerate() {
            s.bid_px[i] = p;
            s.bid_qty[i] = q;
        }
        for (i, &(p, q)) in asks.iter().enumerate() {
            s.ask_px[i] = p;
            s.ask_qty[i] = q;
        }
        s
    }

    #[test]
    fn market_update_is_one_cache_line() {
        assert_eq!(std::mem::size_of::<MarketUpdate>(), 64);
        assert_eq!(std::mem::align_of::<MarketUpdate>(), 64);
    }

    #[test]
    fn micro_price_stays_within_touch() {
        let mut book = BookView::new();
        book.apply_snapshot(&snap(
            &[(50_000_000, 100_000_000)],
            &[(50_020_000, 100_000_000)],
        ))
        .unwrap();

        let micro = book.micro_price();
        assert!(micro >= 50_000_000 && micro <= 50_020_000);
        // Equal volumes -> midpoint.
        assert_eq!(micro, 50_010_000);
    }

    #[test]
    fn micro_price_weights_toward_thin_side() {
        let mut book = BookView::new();
        // Heavy bid volume pulls fair value toward the ask.
        book.apply_snapshot(&snap(
            &[(50_000_000, 900_000_000)],
            &[(50_020_000, 100_000_000)],
        ))
        .unwrap();
        assert_eq!(book.micro_price(), 50_018_000);
    }

    #[test]
    fn micro_price_degeneracies() {
        let mut book = BookView::new();
        assert_eq!(book.micro_price(), 0);

        book.apply_snapshot(&snap(&[(50_000_000, 1)], &[])).unwrap();
        assert_eq!(book.micro_price(), 0);

        // Both sides present, zero volumes -> midpoint.
        book.apply_snapshot(&snap(&[(50_000_000, 0)], &[(50_020_000, 0)]))
            .unwrap();
        assert_eq!(book.micro_price(), 50_010_000);
    }

    #[test]
    fn micro_price_large_values_do_not_overflow() {
        let mut book = BookView::new();
        // Price ~ 90k, size ~ 9000 units: E16 product far beyond i64.
        book.apply_snapshot(&snap(
            &[(9_000_000_000_000, 900_000_000_000)],
            &[(9_000_100_000_000, 900_000_000_000)],
        ))
        .unwrap();
        let micro = book.micro_price();
        assert!(micro >= 9_000_000_000_000 && micro <= 9_000_100_000_000);
    }

    #[test]
    fn imbalance_sign_follows_depth() {
        let mut book = BookView::new();
        book.apply_snapshot(&snap(
            &[(50_000_000, 300_000_000), (49_990_000, 300_000_000)],
            &[(50_020_000, 100_000_000)],
        ))
        .unwrap();
        assert!(book.imbalance() > 0);

        book.apply_snapshot(&snap(
            &[(50_000_000, 100_000_000)],
            &[(50_020_000, 300_000_000), (50_030_000, 300_000_000)],
        ))
        .unwrap();
        assert!(book.imbalance() < 0);
    }

    #[test]
    fn imbalance_bounds_and_degeneracies() {
        let mut book = BookView::new();
        assert_eq!(book.imbalance(), 0);

        // One-sided liquidity clamps to the scale, never beyond.
        book.apply_snapshot(&snap(&[(50_000_000, 500_000_000)], &[(50_020_000, 0)]))
            .unwrap();
        assert_eq!(book.imbalance(), SCALE);
    }

    #[test]
    fn crossed_snapshot_is_rejected_and_state_kept() {
        let mut book = BookView::new();
        book.apply_snapshot(&snap(&[(50_000_000, 1)], &[(50_020_000, 1)]))
            .unwrap();

        let err = book
            .apply_snapshot(&snap(&[(50_030_000, 1)], &[(50_020_000, 1)]))
            .unwrap_err();
        assert_eq!(err, BookError::Crossed);
        assert_eq!(book.best_bid(), Some((50_000_000, 1)));
    }

    #[test]
    fn add_and_cancel_events_drive_levels() {
        let mut book = BookView::new();
        let add = MarketUpdate::new(0, 0, 50_000_000, 100, Side::Bid, EventKind::Add);
        book.apply_update(&add);
        book.apply_update(&add);
        assert_eq!(book.best_bid(), Some((50_000_000, 200)));

        let cancel = MarketUpdate::new(0, 0, 50_000_000, 200, Side::Bid, EventKind::Cancel);
        book.apply_update(&cancel);
        assert_eq!(book.best_bid(), None);
    }
}

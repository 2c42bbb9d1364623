// src/heatmap.rs
//! Inverse liquidation heatmap.
//!
//! Every trade print projects an estimated liquidation price for the taker's
//! fresh position (±4%, a 25x-leverage proxy) and accumulates its size into a
//! price bucket; confirmed liquidation events boost their bucket 10x. The
//! bucket map is the only state in the pipeline read from another thread (a
//! display renderer), so it sits behind a mutex; the lock is held only across
//! the map mutation or the snapshot copy, never across I/O.

use std::sync::Mutex;

/// Price distance of the estimated liquidation, in percent.
const INV_LIQ_PCT: i64 = 4;
/// Bucket width in E8 (10^-3 units of price).
const BUCKET_STEP: i64 = 100_000;
/// Score multiplier for confirmed liquidation events.
const CONFIRMATION_BOOST: i64 = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub open_interest: i64,
    pub funding_rate: i64,
    pub mark_price: i64,
    pub last_trade_px: i64,
}

/// One heatmap bucket: price level (E8) and accumulated intensity (E8 size).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub price: i64,
    pub score: i64,
}

#[derive(Default)]
struct Inner {
    buckets: std::collections::BTreeMap<i64, i64>,
    telemetry: Telemetry,
}

#[derive(Default)]
pub struct LiquidationHeatmap {
    inner: Mutex<Inner>,
}

impl LiquidationHeatmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulates the estimated liquidation level for a trade print.
    ///
    /// buyer_maker=true means the taker sold (a short entering, liquidated
    /// upward); false means the taker bought (liquidated downward).
    pub fn on_trade(&self, price_e8: i64, qty_e8: i64, buyer_maker: bool) {
        let pct = if buyer_maker {
            100 + INV_LIQ_PCT
        } else {
            100 - INV_LIQ_PCT
        };
        let est = (price_e8 as i128 * pct as i128 / 100) as i64;
        let bucket = bucket_of(est);

        let mut inner = self.inner.lock().unwrap();
        *inner.buckets.entry(bucket).or_insert(0) += qty_e8;
        inner.telemetry.last_trade_px = price_e8;
    }

    /// A real liquidation confirms the zone; weight it hard.
    pub fn on_liquidation(&self, price_e8: i64, qty_e8: i64, _side: u8) {
        let bucket = bucket_of(price_e8);
        let mut inner = self.inner.lock().unwrap();
        *inner.buckets.entry(bucket).or_insert(0) += qty_e8 * CONFIRMATION_BOOST;
    }

    pub fn on_ticker(&self, open_interest: i64, funding_rate: i64, mark_price: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.telemetry.open_interest = open_interest;
        inner.telemetry.funding_rate = funding_rate;
        inner.telemetry.mark_price = mark_price;
    }

    /// Top `n` buckets by intensity, strongest first. Snapshot copy; safe to
    /// render from another thread.
    pub fn zones(&self, n: usize) -> Vec<Zone> {
        let inner = self.inner.lock().unwrap();
        let mut zones: Vec<Zone> = inner
            .buckets
            .iter()
            .map(|(&price, &score)| Zone { price, score })
            .collect();
        drop(inner);

        zones.sort_by(|a, b| b.score.cmp(&a.score));
        zones.truncate(n);
        zones
    }

    pub fn telemetry(&self) -> Telemetry {
        self.inner.lock().unwrap().telemetry
    }
}

#[inline]
fn bucket_of(price_e8: i64) -> i64 {
    (price_e8 / BUCKET_STEP) * BUCKET_STEP
}

// src/strategy.rs
//! Regime-keyed quoting strategy.
//!
//! Pure over its inputs: the same (book, signals, position) always yields the
//! same [`Quotes`]. Safety is expressed in the output; staleness or a
//! degenerate book produce inactive quotes, never an error.
//!
//! Regimes:
//! - **RANGE**: symmetric market making around the micro-price with
//!   inventory skew.
//! - **WICK_CATCHER**: trap detected under high velocity; quote the
//!   reversion side only.
//! - **ROCKET_SURFER**: vacuum under high velocity; cross the spread in the
//!   direction of the depth imbalance.

use crate::book::BookView;
use crate::signal::{BookState, SignalEngine, TakerSide, Trap};

/// Half-spread applied around the micro-price (2 ticks).
const HALF_SPREAD: i64 = 20_000;
/// Quote skew per unit of position.
const RISK_AVERSION: i64 = 100;
/// Taker fee, 0.055%.
const TAKER_FEE: i64 = 55_000;
/// Trades per second above which momentum regimes arm.
const VELOCITY_THRESHOLD: f64 = 5.0;
/// Contractual expected move while a vacuum holds (0.2%).
const VACUUM_EXPECTED_MOVE: i64 = 200_000;
/// Depth-imbalance magnitude that picks the taker direction.
const IMBALANCE_TRIGGER: i64 = 30_000_000;

/// Why the strategy produced what it produced. Rendered into journals and
/// dashboards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    SafetyLatencyGuard,
    Wait,
    RocketSurferBuy,
    RocketSurferSell,
    WickCatcherShort,
    WickCatcherLong,
    RangeMm,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::SafetyLatencyGuard => "SAFETY_LATENCY_GUARD",
            Reason::Wait => "WAIT",
            Reason::RocketSurferBuy => "ROCKET_SURFER_BUY",
            Reason::RocketSurferSell => "ROCKET_SURFER_SELL",
            Reason::WickCatcherShort => "WICK_CATCHER_SHORT",
            Reason::WickCatcherLong => "WICK_CATCHER_LONG",
            Reason::RangeMm => "RANGE_MM",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-the-spread intent. The executor sizes the order from its own
/// notional at admission time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TakerIntent {
    pub side: TakerSide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quotes {
    pub bid_px: i64,
    pub ask_px: i64,
    pub bid_active: bool,
    pub ask_active: bool,
    pub taker: Option<TakerIntent>,
    pub reason: Reason,
}

impl Quotes {
    fn inactive(reason: Reason) -> Self {
        Self {
            bid_px: 0,
            ask_px: 0,
            bid_active: false,
            ask_active: false,
            taker: None,
            reason,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Regime {
    Range,
    WickCatcher,
    RocketSurfer,
}

#[derive(Default)]
pub struct Strategy {
    position: i64,
}

impl Strategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current net position in whole units, for inventory skew.
    pub fn set_position(&mut self, position: i64) {
        self.position = position;
    }

    pub fn quotes(&self, book: &BookView, signals: &SignalEngine) -> Quotes {
        // Safety gate dominates everything else.
        if signals.is_stale() {
            return Quotes::inactive(Reason::SafetyLatencyGuard);
        }

        let micro = book.micro_price();
        if micro <= 0 {
            return Quotes::inactive(Reason::Wait);
        }

        let velocity = signals.trade_velocity();
        let state = signals.book_state(book);
        let trap = signals.trap_signal();
        let imbalance = book.imbalance();

        let mut regime = Regime::Range;
        if velocity > VELOCITY_THRESHOLD {
            if state == BookState::Vacuum {
                regime = Regime::RocketSurfer;
            } else if state == BookState::Absorption || trap != Trap::None {
                regime = Regime::WickCatcher;
            }
        }

        if regime == Regime::RocketSurfer {
            // The move must clear three taker fees to be worth crossing.
            if VACUUM_EXPECTED_MOVE > TAKER_FEE * 3 {
                if imbalance > IMBALANCE_TRIGGER {
                    return Quotes {
                        taker: Some(TakerIntent {
                            side: TakerSide::Buy,
                        }),
                        ..Quotes::inactive(Reason::RocketSurferBuy)
                    };
                }
                if imbalance < -IMBALANCE_TRIGGER {
                    return Quotes {
                        taker: Some(TakerIntent {
                            side: TakerSide::Sell,
                        }),
                        ..Quotes::inactive(Reason::RocketSurferSell)
                    };
                }
            }
            // No clear direction: fall through to range quoting.
        }

        if regime == Regime::WickCatcher {
            match trap {
                Trap::Bull => {
                    // Buyers saturated below the high: fade it with an ask.
                    return Quotes {
                        bid_px: 0,
                        ask_px: micro + HALF_SPREAD,
                        bid_active: false,
                        ask_active: true,
                        taker: None,
                        reason: Reason::WickCatcherShort,
                    };
                }
                Trap::Bear => {
                    return Quotes {
                        bid_px: micro - HALF_SPREAD,
                        ask_px: 0,
                        bid_active: true,
                        ask_active: false,
                        taker: None,
                        reason: Reason::WickCatcherLong,
                    };
                }
                Trap::None => {} // absorption wall without a trap: range
            }
        }

        // RANGE: skew both quotes toward the side that reduces exposure.
        let skew = self.position * RISK_AVERSION;
        let mut bid_px = micro - HALF_SPREAD - skew;
        let mut ask_px = micro + HALF_SPREAD - skew;

        if bid_px >= ask_px {
            let mid = (bid_px + ask_px) / 2;
            bid_px = mid - HALF_SPREAD;
            ask_px = mid + HALF_SPREAD;
        }

        Quotes {
            bid_px,
            ask_px,
            bid_active: true,
            ask_active: true,
            taker: None,
            reason: Reason::RangeMm,
        }
    }
}

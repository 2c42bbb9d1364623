// src/sim.rs
//! Simulated execution loop.
//!
//! Maker quotes from the strategy are admitted as resting orders; taker
//! intents hit the best opposite level and fill on the next crossing print.
//! Fill detection runs against live trade prints, and position / average
//! entry / balance update deterministically per fill. The simulator works in
//! the decimal domain; E8 stays upstream.
//!
//! The simulator never journals: it returns [`Fill`] records and the caller
//! forwards them best-effort, so a journal failure cannot corrupt state.

use crate::fixed;
use crate::signal::TakerSide;
use crate::strategy::{Quotes, Reason};

/// Notional per order, in quote currency.
const MIN_ORDER_VALUE: f64 = 25.0;
/// An existing order within this distance of the target price is kept.
const PRICE_TOLERANCE: f64 = 1e-5;
/// Below this the position counts as flat and the entry price resets.
const FLAT_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderSide {
    Bid,
    Ask,
}

#[derive(Clone, Debug)]
pub struct SimOrder {
    pub id: u64,
    pub side: OrderSide,
    pub price: f64,
    pub qty: f64,
    pub active: bool,
    /// Exit orders survive quote refreshes; only fills remove them.
    pub is_exit: bool,
    pub ts_ms: i64,
    pub reason: Reason,
}

/// How a fill moved the position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillKind {
    BuyLong,
    BuyCover,
    SellShort,
    SellClose,
}

impl FillKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillKind::BuyLong => "BUY_LONG",
            FillKind::BuyCover => "BUY_COVER",
            FillKind::SellShort => "SELL_SHORT",
            FillKind::SellClose => "SELL_CLOSE",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Fill {
    pub ts_ms: i64,
    pub kind: FillKind,
    pub price: f64,
    pub qty: f64,
    pub pnl: f64,
    pub balance_after: f64,
    pub reason: Reason,
}

pub struct Executor {
    balance: f64,
    position: f64,
    entry_price: f64,
    next_id: u64,
    orders: Vec<SimOrder>,
}

impl Executor {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            position: 0.0,
            entry_price: 0.0,
            next_id: 0,
            orders: Vec::new(),
        }
    }

    #[inline]
    pub fn balance(&self) -> f64 {
        self.balance
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Position truncated to whole units, as the strategy's skew input.
    #[inline]
    pub fn position_units(&self) -> i64 {
        self.position as i64
    }

    #[inline]
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &SimOrder> {
        self.orders.iter().filter(|o| o.active)
    }

    /// Places an order directly. Quote admission goes through
    /// [`Executor::apply_quotes`]; this is the raw entry point it (and any
    /// manual intervention) uses.
    pub fn place_order(
        &mut self,
        side: OrderSide,
        price: f64,
        qty: f64,
        is_exit: bool,
        reason: Reason,
        ts_ms: i64,
    ) {
        self.next_id += 1;
        self.orders.push(SimOrder {
            id: self.next_id,
            side,
            price,
            qty,
            active: true,
            is_exit,
            ts_ms,
            reason,
        });
    }

    /// Reconciles resting orders with a fresh quote set.
    ///
    /// Under the safety gate nothing changes at all; the guard protects the
    /// book of orders as well as the quotes. A taker intent becomes an
    /// immediate order at the best opposite level. Otherwise each maker side
    /// is handled independently: an active order within tolerance of the
    /// target survives, anything else is cancelled, and a missing quote is
    /// placed with `min_order_value / price` units.
    pub fn apply_quotes(
        &mut self,
        q: &Quotes,
        best_bid: Option<f64>,
        best_ask: Option<f64>,
        ts_ms: i64,
    ) {
        if q.reason == Reason::SafetyLatencyGuard {
            return;
        }

        if let Some(taker) = q.taker {
            let px = match taker.side {
                TakerSide::Buy => best_ask,
                TakerSide::Sell => best_bid,
            };
            if let Some(px) = px.filter(|p| *p > 0.0) {
                let side = match taker.side {
                    TakerSide::Buy => OrderSide::Bid,
                    TakerSide::Sell => OrderSide::Ask,
                };
                self.place_order(side, px, MIN_ORDER_VALUE / px, false, q.reason, ts_ms);
            }
            return;
        }

        self.manage_side(OrderSide::Bid, q.bid_active, q.bid_px, q.reason, ts_ms);
        self.manage_side(OrderSide::Ask, q.ask_active, q.ask_px, q.reason, ts_ms);
        self.orders.retain(|o| o.active);
    }

    fn manage_side(&mut self, side: OrderSide, active: bool, px_e8: i64, reason: Reason, ts_ms: i64) {
        let target = fixed::to_f64(px_e8);
        let mut exists = false;

        for o in self.orders.iter_mut() {
            if !o.active || o.side != side || o.is_exit {
                continue;
            }
            if !active || (o.price - target).abs() > PRICE_TOLERANCE {
                o.active = false;
            } else {
                exists = true;
            }
        }

        if active && !exists && target > 0.0 {
            self.place_order(side, target, MIN_ORDER_VALUE / target, false, reason, ts_ms);
        }
    }

    /// Runs fill detection against a trade print. Fills apply in order-list
    /// order; each one updates position/entry/balance before the next is
    /// classified.
    pub fn on_trade(&mut self, price: f64, ts_ms: i64) -> Vec<Fill> {
        let mut fills = Vec::new();

        for i in 0..self.orders.len() {
            if !self.orders[i].active {
                continue;
            }
            let (side, o_price, o_qty, reason) = {
                let o = &self.orders[i];
                (o.side, o.price, o.qty, o.reason)
            };

            let crossed = match side {
                OrderSide::Bid => price <= o_price,
                OrderSide::Ask => price >= o_price,
            };
            if !crossed {
                continue;
            }
            self.orders[i].active = false;

            let (kind, pnl) = match side {
                OrderSide::Bid => {
                    if self.position >= 0.0 {
                        // Adding to a long: weighted-average entry.
                        let cost = self.position * self.entry_price + o_qty * o_price;
                        self.position += o_qty;
                        self.entry_price = cost / self.position;
                        (FillKind::BuyLong, 0.0)
                    } else {
                        let pnl = (self.entry_price - o_price) * o_qty;
                        self.balance += pnl;
                        self.position += o_qty;
                        self.settle_if_flat();
                        (FillKind::BuyCover, pnl)
                    }
                }
                OrderSide::Ask => {
                    if self.position <= 0.0 {
                        let cost = self.position.abs() * self.entry_price + o_qty * o_price;
                        self.position -= o_qty;
                        self.entry_price = cost / self.position.abs();
                        (FillKind::SellShort, 0.0)
                    } else {
                        let pnl = (o_price - self.entry_price) * o_qty;
                        self.balance += pnl;
                        self.position -= o_qty;
                        self.settle_if_flat();
                        (FillKind::SellClose, pnl)
                    }
                }
            };

            fills.push(Fill {
                ts_ms,
                kind,
                price: o_price,
                qty: o_qty,
                pnl,
                balance_after: self.balance,
                reason,
            });
        }

        if !fills.is_empty() {
            self.orders.retain(|o| o.active);
        }
        fills
    }

    fn settle_if_flat(&mut self) {
        if self.position.abs() < FLAT_EPSILON {
            self.position = 0.0;
            self.entry_price = 0.0;
        }
    }
}

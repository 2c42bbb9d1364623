//! # Cortex Engine - Market Data & Decision Pipeline
//!
//! This crate provides a single-symbol, low-latency ingestion and decision
//! pipeline for a perpetual-futures feed. A producer thread parses a textual
//! gateway stream line-by-line into fixed-point wire packets; a consumer
//! drains a lock-free SPSC ring and either records the packets to a rotating
//! binary log or feeds a decision core that derives order-book
//! micro-structure signals and emits quotes for a simulated execution loop.
//!
//! ## Architecture
//!
//! The engine consists of several key components:
//! - **Parser**: Decodes the `|`-delimited gateway feed into typed packets
//! - **Ring**: Bounded SPSC hand-off between the parser and the consumer
//! - **BookView**: Snapshot order book with micro-price and depth imbalance
//! - **SignalEngine**: Trade velocity, VPIN, latency guard, regime detection
//! - **Strategy**: Regime-keyed quoting with inventory skew and safety gates
//! - **Executor**: Simulated order admission, fills and PnL bookkeeping
//! - **Heatmap**: Bucketed estimated-liquidation intensity map
//!
//! ## Example
//!
//! ```rust
//! use cortex_engine::{
//!     book::BookView,
//!     signal::SignalEngine,
//!     strategy::{Reason, Strategy},
//!     wire::DepthSnapshot,
//! };
//!
//! let mut book = BookView::new();
//! let mut snap = DepthSnapshot::default();
//! snap.bid_px[0] = 50_000_000; // 0.5000 in E8
//! snap.bid_qty[0] = 100_000_000;
//! snap.ask_px[0] = 50_020_000;
//! snap.ask_qty[0] = 100_000_000;
//! book.apply_snapshot(&snap).unwrap();
//!
//! let signals = SignalEngine::new();
//! let strategy = Strategy::new();
//! let quotes = strategy.quotes(&book, &signals);
//! assert_eq!(quotes.reason, Reason::RangeMm);
//! assert!(quotes.bid_active && quotes.ask_active);
//! ```
pub mod book;
pub mod engine;
pub mod fixed;
pub mod heatmap;
pub mod journal;
pub mod metrics;
pub mod parser;
pub mod recorder;
pub mod ring;
pub mod signal;
pub mod sim;
pub mod strategy;
pub mod wire;

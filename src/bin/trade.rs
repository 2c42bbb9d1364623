// src/bin/trade.rs
//! Decision-pipeline binary: stdin feed -> ring -> book/signals/strategy ->
//! simulated execution, with the SQLite journal and the JSON side-channels.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

use anyhow::Result;
use tracing::{error, info};

use cortex_engine::{
    engine::{session_id, Engine},
    journal::TradeJournal,
    metrics::PipelineMetrics,
    parser::FeedParser,
    ring,
    wire::MarketMsg,
};

const SYMBOL: &str = "WLDUSDT";
const RING_CAPACITY: usize = 65_536;
const DB_PATH: &str = "cortex_live.db";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let metrics = Arc::new(PipelineMetrics::new());
    let running = Arc::new(AtomicBool::new(true));
    let (mut tx, mut rx) = ring::channel::<MarketMsg>(RING_CAPACITY);

    let producer = {
        let metrics = metrics.clone();
        let running = running.clone();
        let parser = FeedParser::new(SYMBOL);
        thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.is_empty() {
                    continue;
                }
                metrics.inc_lines();
                match parser.parse_line(&line) {
                    Some(msg) => {
                        let _ = tx.push(msg);
                    }
                    None => metrics.inc_line_dropped(),
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("producer: input closed ({})", metrics.summary(tx.dropped()));
        })
    };

    let session = session_id();
    let journal = TradeJournal::spawn(PathBuf::from(DB_PATH), SYMBOL.to_string(), session.clone());
    let mut engine = Engine::new(".", journal, session);
    info!(session = engine.session_id(), "decision pipeline up");

    loop {
        match rx.pop() {
            Some(msg) => {
                metrics.inc_consumed();
                engine.on_msg(&msg);
            }
            None => {
                if !running.load(Ordering::SeqCst) {
                    // Drain events published just before the flag landed.
                    while let Some(msg) = rx.pop() {
                        metrics.inc_consumed();
                        engine.on_msg(&msg);
                    }
                    break;
                }
                thread::yield_now();
            }
        }
    }

    engine.finish();
    producer.join().ok();
    info!(
        balance = engine.balance(),
        position = engine.position(),
        crossed = engine.crossed_snapshots(),
        "trade pipeline done: {}",
        metrics.summary(rx.dropped())
    );
    Ok(())
}

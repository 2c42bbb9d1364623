// src/main.rs
//! Recorder binary: parse the gateway feed from stdin and either persist
//! binary packets to the rotating log (`--headless`) or feed the liquidation
//! heatmap (`--visual-only`).

use std::io::BufRead;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser as ClapParser;
use tracing::{error, info};

use cortex_engine::{
    fixed,
    heatmap::LiquidationHeatmap,
    metrics::PipelineMetrics,
    parser::FeedParser,
    recorder::LogWriter,
    ring::{self, Consumer},
    wire::MarketMsg,
};

const SYMBOL: &str = "WLDUSDT";
const RING_CAPACITY: usize = 65_536;
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const VISUAL_INTERVAL: Duration = Duration::from_millis(100);
const LOG_DIR: &str = "data/history";
const LOG_PREFIX: &str = "market_data";

#[derive(ClapParser, Debug)]
#[command(name = "cortex-engine", version)]
struct Cli {
    /// Record packets to the rotating binary log; no rendering.
    #[arg(long)]
    headless: bool,
    /// Render the liquidation heatmap; no disk writes.
    #[arg(long)]
    visual_only: bool,
}

fn main() {
    // Exactly one mode; anything else is usage with exit code 1.
    let cli = match Cli::try_parse() {
        Ok(cli) if cli.headless ^ cli.visual_only => cli,
        _ => {
            eprintln!("Usage: cortex-engine [--headless | --visual-only]");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli.headless) {
        error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run(headless: bool) -> Result<()> {
    let metrics = Arc::new(PipelineMetrics::new());
    let running = Arc::new(AtomicBool::new(true));
    let (mut tx, mut rx) = ring::channel::<MarketMsg>(RING_CAPACITY);

    let producer = {
        let metrics = metrics.clone();
        let running = running.clone();
        let parser = FeedParser::new(SYMBOL).skip_depth(!headless);
        thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.is_empty() {
                    continue;
                }
                metrics.inc_lines();
                match parser.parse_line(&line) {
                    Some(msg) => {
                        // Overflow policy is silent drop; the ring counts it.
                        let _ = tx.push(msg);
                    }
                    None => metrics.inc_line_dropped(),
                }
            }
            running.store(false, Ordering::SeqCst);
            info!("producer: input closed ({})", metrics.summary(tx.dropped()));
        })
    };

    if headless {
        info!("starting in headless mode (recording only)");
        consume_headless(&mut rx, &running, &metrics)?;
    } else {
        info!("starting in visual mode (no disk write)");
        consume_visual(&mut rx, &running, &metrics);
    }

    producer.join().ok();
    info!("recorder done: {}", metrics.summary(rx.dropped()));
    Ok(())
}

fn consume_headless(
    rx: &mut Consumer<MarketMsg>,
    running: &AtomicBool,
    metrics: &PipelineMetrics,
) -> Result<()> {
    // The initial open is the one fatal error in this mode.
    let mut writer = LogWriter::create(LOG_DIR, LOG_PREFIX)?;
    let mut last_flush = Instant::now();

    loop {
        match rx.pop() {
            Some(msg) => {
                metrics.inc_consumed();
                writer.write_msg(&msg);
            }
            None => {
                if !running.load(Ordering::SeqCst) {
                    // Drain events published just before the flag landed.
                    while let Some(msg) = rx.pop() {
                        metrics.inc_consumed();
                        writer.write_msg(&msg);
                    }
                    break;
                }
                thread::yield_now();
            }
        }

        if last_flush.elapsed() >= FLUSH_INTERVAL {
            writer.flush();
            last_flush = Instant::now();
        }
    }

    writer.flush();
    Ok(())
}

fn consume_visual(rx: &mut Consumer<MarketMsg>, running: &AtomicBool, metrics: &PipelineMetrics) {
    let heatmap = LiquidationHeatmap::new();
    let mut last_render = Instant::now();

    let feed = |heatmap: &LiquidationHeatmap, msg: MarketMsg| match msg {
        MarketMsg::Trade(t) => heatmap.on_trade(t.price, t.qty, t.buyer_maker),
        MarketMsg::Liq(l) => heatmap.on_liquidation(l.price, l.qty, l.side),
        MarketMsg::Ticker(t) => heatmap.on_ticker(t.open_interest, t.funding_rate, t.mark_price),
        MarketMsg::Depth(_) => {} // filtered at the parser
    };

    loop {
        match rx.pop() {
            Some(msg) => {
                metrics.inc_consumed();
                feed(&heatmap, msg);
            }
            None => {
                if !running.load(Ordering::SeqCst) {
                    while let Some(msg) = rx.pop() {
                        metrics.inc_consumed();
                        feed(&heatmap, msg);
                    }
                    break;
                }
                thread::yield_now();
            }
        }

        if last_render.elapsed() >= VISUAL_INTERVAL {
            render_heatmap(&heatmap);
            last_render = Instant::now();
        }
    }

    render_heatmap(&heatmap);
}

/// Minimal terminal view of the strongest zones. The real renderer is a
/// separate program; this keeps visual mode observable on its own.
fn render_heatmap(heatmap: &LiquidationHeatmap) {
    let zones = heatmap.zones(15);
    let telemetry = heatmap.telemetry();

    print!("\x1b[2J\x1b[H");
    println!("LIQUIDATION HEATMAP | {SYMBOL}");
    println!(
        "price {:.4} | mark {:.4} | oi {:.0} | funding {:.6}",
        fixed::to_f64(telemetry.last_trade_px),
        fixed::to_f64(telemetry.mark_price),
        fixed::to_f64(telemetry.open_interest),
        fixed::to_f64(telemetry.funding_rate),
    );

    let max_score = zones.first().map_or(1, |z| z.score.max(1));
    for z in &zones {
        let bar = (z.score as f64 / max_score as f64 * 30.0) as usize;
        println!("{:>10.4} | {}", fixed::to_f64(z.price), "#".repeat(bar));
    }
}

// src/journal.rs
//! Append-only trade journal backed by SQLite.
//!
//! Runs on its own thread behind a channel so the consumer never blocks on
//! the database; pushes are fire-and-forget and a failed insert is logged and
//! dropped. WAL journaling with synchronous=NORMAL trades the last second of
//! durability for speed.
//!
//! Two tables: `trades` is the legacy decimal schema, `trade_log` the
//! extended fixed-point one with telemetry snapshots.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use rusqlite::{params, Connection};

use crate::fixed;

/// One realized fill, as handed to the journal.
#[derive(Clone, Debug)]
pub struct JournalRecord {
    pub ts_ms: i64,
    /// Position-transition tag (BUY_LONG, BUY_COVER, SELL_SHORT, SELL_CLOSE).
    pub side: &'static str,
    pub price: f64,
    pub qty: f64,
    pub pnl: f64,
    pub balance: f64,
    /// Strategy reason tag at order placement.
    pub reason: &'static str,
    pub velocity: f64,
    pub vpin: i64,
}

pub struct TradeJournal {
    tx: Option<mpsc::Sender<JournalRecord>>,
    handle: Option<JoinHandle<()>>,
}

impl TradeJournal {
    /// Spawns the writer thread. A database that cannot be opened is logged
    /// and the journal degrades to a sink; the pipeline keeps running.
    pub fn spawn(path: PathBuf, symbol: String, session_id: String) -> Self {
        let (tx, rx) = mpsc::channel::<JournalRecord>();
        let handle = thread::spawn(move || {
            if let Err(err) = run_writer(path, symbol, session_id, rx) {
                tracing::warn!(error = %err, "trade journal writer exited");
            }
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// A journal that drops everything (tests, visual mode).
    pub fn disabled() -> Self {
        Self {
            tx: None,
            handle: None,
        }
    }

    /// Best-effort append. Never blocks, never fails the caller.
    pub fn push(&self, record: JournalRecord) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(record);
        }
    }
}

impl Drop for TradeJournal {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain and exit.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_writer(
    path: PathBuf,
    symbol: String,
    session_id: String,
    rx: mpsc::Receiver<JournalRecord>,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init_schema(&conn)?;

    while let Ok(rec) = rx.recv() {
        if let Err(err) = insert_record(&conn, &symbol, &session_id, &rec) {
            tracing::warn!(error = %err, "trade journal insert failed");
        }
    }
    Ok(())
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp_ms INTEGER NOT NULL,
            session_id TEXT NOT NULL,
            side TEXT NOT NULL,
            price REAL NOT NULL,
            qty REAL NOT NULL,
            pnl REAL NOT NULL,
            balance REAL NOT NULL,
            reason TEXT NOT NULL,
            book_snapshot TEXT DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS trade_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp_ns INTEGER NOT NULL,
            symbol TEXT NOT NULL,
            side TEXT NOT NULL,
            strategy_type TEXT NOT NULL,
            entry_price_e8 INTEGER NOT NULL,
            exit_price_e8 INTEGER NOT NULL,
            pnl_e8 INTEGER NOT NULL,
            trigger_reason TEXT NOT NULL,
            telemetry_velocity INTEGER NOT NULL,
            telemetry_vpin INTEGER NOT NULL,
            session_id TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn insert_record(
    conn: &Connection,
    symbol: &str,
    session_id: &str,
    rec: &JournalRecord,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO trades (timestamp_ms, session_id, side, price, qty, pnl, balance, reason, book_snapshot)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, '{}')",
        params![
            rec.ts_ms,
            session_id,
            rec.side,
            rec.price,
            rec.qty,
            rec.pnl,
            rec.balance,
            rec.reason,
        ],
    )?;

    conn.execute(
        "INSERT INTO trade_log (timestamp_ns, symbol, side, strategy_type, entry_price_e8,
                                exit_price_e8, pnl_e8, trigger_reason, telemetry_velocity,
                                telemetry_vpin, session_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            rec.ts_ms * 1_000_000,
            symbol,
            rec.side,
            strategy_type(rec.reason),
            fixed::from_f64(rec.price),
            0i64,
            fixed::from_f64(rec.pnl),
            rec.reason,
            (rec.velocity * 100.0) as i64,
            rec.vpin,
            session_id,
        ],
    )?;
    Ok(())
}

/// Strategy family from the reason tag.
fn strategy_type(reason: &str) -> &'static str {
    if reason.starts_with("ROCKET") {
        "ROCKET_SURFER"
    } else if reason.starts_with("WICK") {
        "WICK_CATCHER"
    } else {
        "RANGE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_type_from_reason() {
        assert_eq!(strategy_type("ROCKET_SURFER_BUY"), "ROCKET_SURFER");
        assert_eq!(strategy_type("WICK_CATCHER_SHORT"), "WICK_CATCHER");
        assert_eq!(strategy_type("RANGE_MM"), "RANGE");
        assert_eq!(strategy_type("WAIT"), "RANGE");
    }

    #[test]
    fn records_land_in_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.db");

        let journal = TradeJournal::spawn(
            path.clone(),
            "WLDUSDT".to_string(),
            "CORTEX-TEST".to_string(),
        );
        journal.push(JournalRecord {
            ts_ms: 1_700_000_000_123,
            side: "BUY_LONG",
            price: 0.5,
            qty: 50.0,
            pnl: 0.0,
            balance: 1_000.0,
            reason: "RANGE_MM",
            velocity: 7.5,
            vpin: 10_000_000,
        });
        drop(journal); // joins the writer

        let conn = Connection::open(&path).unwrap();
        let legacy: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |r| r.get(0))
            .unwrap();
        assert_eq!(legacy, 1);

        let (ns, strat, px_e8, vel): (i64, String, i64, i64) = conn
            .query_row(
                "SELECT timestamp_ns, strategy_type, entry_price_e8, telemetry_velocity FROM trade_log",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(ns, 1_700_000_000_123_000_000);
        assert_eq!(strat, "RANGE");
        assert_eq!(px_e8, 50_000_000);
        assert_eq!(vel, 750);
    }

    #[test]
    fn disabled_journal_swallows_pushes() {
        let journal = TradeJournal::disabled();
        journal.push(JournalRecord {
            ts_ms: 0,
            side: "BUY_LONG",
            price: 1.0,
            qty: 1.0,
            pnl: 0.0,
            balance: 0.0,
            reason: "RANGE_MM",
            velocity: 0.0,
            vpin: 0,
        });
    }
}

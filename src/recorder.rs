// src/recorder.rs
//! Rotating binary log writer for the headless recorder.
//!
//! Packets append to `<dir>/<prefix>_<YYYYMMDD_HHMMSS>.bin` through a 1 MiB
//! buffer. Files rotate hourly: the new file is opened first, then the old
//! one flushed and closed, in that order. A failed rotation turns writes into
//! no-ops until a later rotation succeeds; only the *initial* open is fatal,
//! and that decision belongs to the caller.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{error, info};

use crate::wire::{encode_msg, MarketMsg};

const WRITE_BUFFER_SIZE: usize = 1 << 20;
const ROTATION_INTERVAL: Duration = Duration::from_secs(3600);

pub struct LogWriter {
    dir: PathBuf,
    prefix: String,
    file: Option<BufWriter<File>>,
    last_rotation: Instant,
    scratch: Vec<u8>,
}

impl LogWriter {
    /// Opens the initial log file. Failure here is the one fatal recorder
    /// error.
    pub fn create(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("create log dir {dir:?}"))?;

        let mut writer = Self {
            dir,
            prefix: prefix.into(),
            file: None,
            last_rotation: Instant::now(),
            scratch: Vec::with_capacity(4096),
        };
        writer.rotate().context("open initial log file")?;
        Ok(writer)
    }

    fn rotate(&mut self) -> Result<()> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{}_{stamp}.bin", self.prefix));

        // Open the replacement before releasing the old handle so a failed
        // open never costs the file we already have.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open log file {path:?}"))?;
        info!(path = %path.display(), "recorder rotating");

        let old = self.file.replace(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
        self.last_rotation = Instant::now();
        if let Some(mut old) = old {
            if let Err(err) = old.flush() {
                error!(error = %err, "flush of rotated-out log failed");
            }
        }
        Ok(())
    }

    fn check_rotation(&mut self) {
        if self.file.is_some() && self.last_rotation.elapsed() < ROTATION_INTERVAL {
            return;
        }
        if let Err(err) = self.rotate() {
            error!(error = %err, "log rotation failed; dropping writes");
            self.file = None;
            self.last_rotation = Instant::now();
        }
    }

    /// Appends one packet. Write errors drop the file handle; a later
    /// rotation re-opens.
    pub fn write_msg(&mut self, msg: &MarketMsg) {
        self.check_rotation();
        let Some(file) = self.file.as_mut() else {
            return;
        };

        self.scratch.clear();
        encode_msg(msg, &mut self.scratch);
        if let Err(err) = file.write_all(&self.scratch) {
            error!(error = %err, "log write failed; dropping file handle");
            self.file = None;
        }
    }

    /// Forces buffered bytes to disk. Called once per second by the consumer
    /// loop and on shutdown.
    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = file.flush() {
                error!(error = %err, "log flush failed");
            }
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

// ===============================
// src/recorder.rs
// ===============================
//
// Tick and order recorders:
// - CSV (default) or JSONL, chosen by RECORD_FORMAT.
// - One file per stream, truncated at start; CSV gets a header row.
// - Buffered with BufWriter, flushed every 1000 rows and at the end.
// - Parent directory is created if missing.
// - Opening errors are fatal (caller aborts before the run); write errors
//   are returned to the caller, which logs them and keeps going.
//
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::RecordFormat;
use crate::domain::{OrderRecord, Tick};

const FLUSH_EVERY_N_EVENTS: u32 = 1000;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recorder: cannot create directory for {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[error("recorder: cannot open {path}: {source}")]
    Open { path: PathBuf, source: std::io::Error },
    #[error("recorder: write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("recorder: serialize failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait TickSink {
    fn write_tick(&mut self, tick: &Tick) -> Result<(), RecorderError>;
    fn flush(&mut self) -> Result<(), RecorderError> { Ok(()) }
}

pub trait OrderSink {
    fn write_order(&mut self, rec: &OrderRecord) -> Result<(), RecorderError>;
    fn flush(&mut self) -> Result<(), RecorderError> { Ok(()) }
}

/// `HH:MM:SS.mmm` of elapsed time; hours are not wrapped at 24.
pub fn format_clock(t: Duration) -> String {
    let ms = t.as_millis();
    let (h, rem) = (ms / 3_600_000, ms % 3_600_000);
    let (m, rem) = (rem / 60_000, rem % 60_000);
    let (s, ms) = (rem / 1_000, rem % 1_000);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

struct RecordWriter {
    path: PathBuf,
    format: RecordFormat,
    writer: BufWriter<File>,
    since_last_flush: u32,
}

impl RecordWriter {
    fn open(path: &Path, format: RecordFormat, csv_header: &str) -> Result<Self, RecorderError> {
        // Make sure the parent directory exists (if any)
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|source| RecorderError::CreateDir { path: path.to_path_buf(), source })?;
            }
        }
        let file = File::create(path).map_err(|source| RecorderError::Open { path: path.to_path_buf(), source })?;
        let mut w = Self { path: path.to_path_buf(), format, writer: BufWriter::new(file), since_last_flush: 0 };
        if format == RecordFormat::Csv {
            writeln!(w.writer, "{csv_header}")?;
        }
        info!(path = %w.path.display(), format = format.as_str(), "recorder: started");
        Ok(w)
    }

    fn write_row(&mut self, csv_line: impl FnOnce() -> String, json: &impl Serialize) -> Result<(), RecorderError> {
        match self.format {
            RecordFormat::Csv => writeln!(self.writer, "{}", csv_line())?,
            RecordFormat::Jsonl => {
                serde_json::to_writer(&mut self.writer, json)?;
                self.writer.write_all(b"\n")?;
            }
        }
        self.since_last_flush += 1;
        if self.since_last_flush >= FLUSH_EVERY_N_EVENTS {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        self.since_last_flush = 0;
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct TickRow {
    time_ns: u128,
    price: f64,
    volume: f64,
}

pub struct TickRecorder(RecordWriter);

impl TickRecorder {
    pub fn open(path: &Path, format: RecordFormat) -> Result<Self, RecorderError> {
        RecordWriter::open(path, format, "Time,Price,Volume").map(Self)
    }
}

impl TickSink for TickRecorder {
    fn write_tick(&mut self, tick: &Tick) -> Result<(), RecorderError> {
        let row = TickRow { time_ns: tick.time.as_nanos(), price: tick.price, volume: tick.volume };
        self.0.write_row(
            || format!("{},{:.3},{:.3}", format_clock(tick.time), tick.price, tick.volume),
            &row,
        )
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        self.0.flush()
    }
}

pub struct OrderRecorder(RecordWriter);

impl OrderRecorder {
    pub fn open(path: &Path, format: RecordFormat) -> Result<Self, RecorderError> {
        RecordWriter::open(path, format, "Side,Price,Volume,ReplyStatus,ErrorText,PnL").map(Self)
    }
}

impl OrderSink for OrderRecorder {
    fn write_order(&mut self, rec: &OrderRecord) -> Result<(), RecorderError> {
        self.0.write_row(
            || format!("{},{:.3},{:.3},{},{},{:.3}", rec.side, rec.px, rec.qty, rec.status, rec.error, rec.total_pnl),
            rec,
        )
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        self.0.flush()
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory sinks for tests. Clones share the same storage.
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    pub struct MemorySink {
        pub ticks: Rc<RefCell<Vec<Tick>>>,
        pub orders: Rc<RefCell<Vec<OrderRecord>>>,
    }

    impl TickSink for MemorySink {
        fn write_tick(&mut self, tick: &Tick) -> Result<(), RecorderError> {
            self.ticks.borrow_mut().push(*tick);
            Ok(())
        }
    }

    impl OrderSink for MemorySink {
        fn write_order(&mut self, rec: &OrderRecord) -> Result<(), RecorderError> {
            self.orders.borrow_mut().push(rec.clone());
            Ok(())
        }
    }

    /// Always fails, for checking that sink errors are not fatal.
    pub struct BrokenSink;

    impl TickSink for BrokenSink {
        fn write_tick(&mut self, _tick: &Tick) -> Result<(), RecorderError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }
    }

    impl OrderSink for BrokenSink {
        fn write_order(&mut self, _rec: &OrderRecord) -> Result<(), RecorderError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }
    }
}

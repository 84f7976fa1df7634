//! Detection record output.
//!
//! One record per logged tick, written as a single line:
//! `<elapsed ms> <x1> <y1> <area1> <x2> <y2> <area2> ...`, where elapsed is measured
//! from the session's time origin and `x`/`y` is each blob's bounding-box center.

use crate::core_modules::blob::DetectionResult;
use chrono::{DateTime, TimeZone};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const LOG_HEADER: &str = "# time(ms) x(pixel) y(pixel) blob_area(pixels).. repeated for each blob";

/// Where a record goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogSink {
    #[default]
    Console,
    File,
}

/// `<prefix>-<YYYYMMDDHHMM>.txt`
pub fn log_file_name<Tz: TimeZone>(prefix: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{prefix}-{}.txt", now.format("%Y%m%d%H%M"))
}

/// Formats one record line, without the trailing newline.
pub fn format_record(elapsed_ms: i64, result: &DetectionResult) -> String {
    let mut line = elapsed_ms.to_string();
    for blob in &result.blobs {
        let (x, y) = blob.centroid();
        // Writing into a String cannot fail.
        let _ = write!(line, " {x} {y} {}", blob.area);
    }
    line
}

pub struct DetectionLogger<C = Stdout, F = BufWriter<File>> {
    console: C,
    file: F,
    path: Option<PathBuf>,
    last_log_timestamp: u64,
}

impl DetectionLogger {
    /// Creates the log file `<prefix>-<YYYYMMDDHHMM>.txt` in `dir` and writes the header.
    /// The file stays open for the logger's lifetime.
    pub fn open<Tz: TimeZone>(dir: &Path, prefix: &str, now: &DateTime<Tz>) -> io::Result<Self>
    where
        Tz::Offset: std::fmt::Display,
    {
        let path = dir.join(log_file_name(prefix, now));
        let file = BufWriter::new(File::create(&path)?);
        let mut logger = Self::new(io::stdout(), file)?;
        info!(path = %path.display(), "Opened detection log");
        logger.path = Some(path);
        Ok(logger)
    }
}

impl<C: Write, F: Write> DetectionLogger<C, F> {
    pub fn new(console: C, mut file: F) -> io::Result<Self> {
        writeln!(file, "{LOG_HEADER}")?;
        file.flush()?;
        Ok(Self {
            console,
            file,
            path: None,
            last_log_timestamp: 0,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn last_log_timestamp(&self) -> u64 {
        self.last_log_timestamp
    }

    /// Whether a result stamped `timestamp` is due under `interval_ms`. The gate starts
    /// at timestamp 0, so nothing at or before `interval_ms` is logged.
    fn is_due(&self, timestamp: u64, interval_ms: i64) -> bool {
        if interval_ms < 0 {
            return false;
        }
        // A timestamp that went backwards (a looping recording) restarts the gate.
        timestamp
            .checked_sub(self.last_log_timestamp)
            .is_none_or(|elapsed| elapsed > interval_ms as u64)
    }

    /// Writes a record for `result` to `sink` if the interval since the last record has
    /// passed. Returns whether a record was written.
    pub fn log(
        &mut self,
        sink: LogSink,
        result: &DetectionResult,
        start_time: u64,
        interval_ms: i64,
    ) -> io::Result<bool> {
        if !self.is_due(result.timestamp, interval_ms) {
            return Ok(false);
        }

        let elapsed = result.timestamp as i64 - start_time as i64;
        let line = format_record(elapsed, result);
        let out: &mut dyn Write = match sink {
            LogSink::Console => &mut self.console,
            LogSink::File => &mut self.file,
        };
        writeln!(out, "{line}")?;
        out.flush()?;

        self.last_log_timestamp = result.timestamp;
        Ok(true)
    }

    pub fn into_writers(self) -> (C, F) {
        (self.console, self.file)
    }
}

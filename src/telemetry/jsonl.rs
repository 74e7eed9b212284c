//! # JSON Lines Sink
//!
//! File-backed [`TelemetrySink`] for host runs. Each accepted batch is appended
//! to `<output_dir>/<bucket>.jsonl`, one point per line, with the timestamp
//! truncated to the configured write precision.
//!
//! The open file handle stands in for the link: a write error drops the handle
//! and the sink reports itself disconnected until [`TelemetrySink::reconnect`]
//! reopens the file.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::point::Point;
use super::sink::{TelemetrySink, WriteOptions, WritePrecision};
use crate::error::{NodeError, Result};

/// Earliest year accepted as a synchronized wall clock.
const MIN_SYNCED_YEAR: i32 = 2020;

/// One line of output.
#[derive(Serialize)]
struct Record<'a> {
    measurement: &'a str,
    tags: &'a BTreeMap<String, String>,
    fields: &'a BTreeMap<String, f64>,
    time: u64,
    precision: &'static str,
}

/// Appends point batches to a JSON Lines file.
pub struct JsonlSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    precision: WritePrecision,
    timezone: Option<String>,
}

impl std::fmt::Debug for JsonlSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSink")
            .field("path", &self.path)
            .field("connected", &self.writer.is_some())
            .field("precision", &self.precision)
            .finish_non_exhaustive()
    }
}

impl JsonlSink {
    /// Opens (or creates) `<output_dir>/<bucket>.jsonl` for appending.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or the file cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use current_node::telemetry::JsonlSink;
    ///
    /// let sink = JsonlSink::open("./telemetry", "energy")?;
    /// println!("Writing to: {}", sink.path().display());
    /// # Ok::<(), current_node::error::NodeError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(output_dir: P, bucket: &str) -> Result<Self> {
        let dir = output_dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.jsonl", bucket));
        let writer = Self::open_file(&path)?;
        info!("Telemetry sink writing to {}", path.display());

        Ok(Self {
            path,
            writer: Some(writer),
            precision: WritePrecision::Milliseconds,
            timezone: None,
        })
    }

    fn open_file(path: &Path) -> Result<BufWriter<File>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timezone recorded by the last successful time sync.
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    fn write_points(writer: &mut BufWriter<File>, points: &[Point], precision: WritePrecision) -> Result<()> {
        let precision_name = match precision {
            WritePrecision::Seconds => "s",
            WritePrecision::Milliseconds => "ms",
        };

        for point in points {
            let record = Record {
                measurement: &point.measurement,
                tags: &point.tags,
                fields: &point.fields,
                time: precision.convert(point.timestamp_ms),
                precision: precision_name,
            };
            serde_json::to_writer(&mut *writer, &record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    fn check_clock(now: DateTime<Utc>) -> Result<()> {
        if now.year() < MIN_SYNCED_YEAR {
            return Err(NodeError::TimeSync(format!(
                "Wall clock reads {}, not synchronized",
                now.to_rfc3339()
            )));
        }
        Ok(())
    }
}

impl TelemetrySink for JsonlSink {
    fn configure(&mut self, options: WriteOptions) {
        debug!(
            "Sink configured: batch_size={} buffer_size={} precision={:?}",
            options.batch_size, options.buffer_size, options.precision
        );
        self.precision = options.precision;
    }

    fn write_batch(&mut self, points: &[Point]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| NodeError::Sink(format!("{} is not open", self.path.display())))?;

        if let Err(e) = Self::write_points(writer, points, self.precision) {
            warn!("Write to {} failed, closing: {}", self.path.display(), e);
            self.writer = None;
            return Err(NodeError::Sink(format!("Failed to write batch: {}", e)));
        }

        debug!("Wrote batch of {} points to {}", points.len(), self.path.display());
        Ok(())
    }

    fn sync_time(&mut self, timezone: &str, primary_server: &str, secondary_server: &str) -> Result<()> {
        // The host OS disciplines the clock; only confirm it looks synchronized.
        Self::check_clock(Utc::now())?;
        debug!(
            "Time source confirmed (tz={}, servers={}, {})",
            timezone, primary_server, secondary_server
        );
        self.timezone = Some(timezone.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    fn reconnect(&mut self) -> Result<()> {
        let writer = Self::open_file(&self.path)
            .map_err(|e| NodeError::Link(format!("Failed to reopen {}: {}", self.path.display(), e)))?;
        self.writer = Some(writer);
        Ok(())
    }
}

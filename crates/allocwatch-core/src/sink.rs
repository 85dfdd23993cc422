//! Line-oriented output stream for tracker messages.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use serde::Serialize;

use crate::config::OutputTarget;
use crate::error::TrackerError;
use crate::event::{CallEvent, Severity};

/// Prefix of every line the tracker writes.
pub const PREFIX: &str = "[ALLOCWATCH]";

/// Destination of report and per-call lines.
///
/// Write failures never propagate into allocation paths; they are counted
/// and surfaced by [`ReportSink::write_errors`].
pub struct ReportSink {
    writer: Box<dyn Write + Send>,
    write_errors: u64,
}

impl fmt::Debug for ReportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportSink")
            .field("write_errors", &self.write_errors)
            .finish_non_exhaustive()
    }
}

impl ReportSink {
    /// Open `target`. Files are created or truncated.
    pub fn open(target: &OutputTarget) -> Result<Self, TrackerError> {
        let writer: Box<dyn Write + Send> = match target {
            OutputTarget::Stdout => Box::new(io::stdout()),
            OutputTarget::Stderr => Box::new(io::stderr()),
            OutputTarget::File(path) => {
                let file = File::create(path).map_err(|source| TrackerError::OpenOutput {
                    path: path.clone(),
                    source,
                })?;
                Box::new(BufWriter::new(file))
            }
        };
        Ok(Self::from_writer(writer))
    }

    /// Sink over an arbitrary writer.
    #[must_use]
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            write_errors: 0,
        }
    }

    #[must_use]
    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    /// Write `PREFIX` followed by `body`.
    pub fn line(&mut self, body: fmt::Arguments<'_>) {
        if writeln!(self.writer, "{PREFIX} {body}").is_err() {
            self.write_errors += 1;
        }
    }

    /// Write a severity headline, e.g. `[ALLOCWATCH] INFO: Report`.
    pub fn headline(&mut self, severity: Severity, message: &str) {
        self.line(format_args!("{severity}: {message}"));
    }

    /// Render one call event as a headline plus an optional detail line.
    pub fn event(&mut self, event: &CallEvent) {
        self.line(format_args!(
            "{}: {:<7} at {}",
            event.severity(),
            event.kind(),
            event.site()
        ));
        if let Some(detail) = event.detail() {
            self.line(format_args!("{:<5} {detail}", ""));
        }
    }

    /// Write `value` as one JSON line. A value that fails to serialize
    /// counts as a write error.
    pub fn json<T: Serialize>(&mut self, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.line(format_args!("{json}")),
            Err(_) => self.write_errors += 1,
        }
    }

    pub fn flush(&mut self) {
        if self.writer.flush().is_err() {
            self.write_errors += 1;
        }
    }

    /// Flush and close the stream. Standard streams are only flushed.
    pub fn close(mut self) -> u64 {
        self.flush();
        self.write_errors
    }
}

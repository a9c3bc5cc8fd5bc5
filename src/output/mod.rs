//! Report output on stdout
//!
//! A single [`ReportWriter`] is shared by every target task. Each write
//! takes the stream lock for one whole line or block, so rows from different
//! targets never interleave mid-line.

mod formatter;

pub use formatter::{
    tsv_header, JsonFormatter, OutputFormatter, TsvFormatter, COLUMNS, NO_SAMPLES_NOTICE,
};

use crate::{
    error::{AppError, Result},
    models::Measurement,
    stats::SummaryReport,
    types::OutputFormat,
};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared, line-locked writer for measurement rows and summaries
pub struct ReportWriter {
    formatter: Box<dyn OutputFormatter>,
    out: Mutex<Box<dyn Write + Send>>,
    header_written: AtomicBool,
}

impl ReportWriter {
    /// Writer on stdout
    pub fn stdout(format: OutputFormat) -> Self {
        Self::with_writer(format, Box::new(io::stdout()))
    }

    pub fn with_writer(format: OutputFormat, out: Box<dyn Write + Send>) -> Self {
        let formatter: Box<dyn OutputFormatter> = match format {
            OutputFormat::Text => Box::new(TsvFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
        };
        Self {
            formatter,
            out: Mutex::new(out),
            header_written: AtomicBool::new(false),
        }
    }

    /// Write the header the first time this is called; later calls do nothing
    pub fn write_header_once(&self) -> Result<bool> {
        if self.header_written.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        match self.formatter.format_header() {
            Some(header) => {
                self.write_block(&header)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn write_measurement(&self, measurement: &Measurement, fallback_location: &str) -> Result<()> {
        let line = self.formatter.format_measurement(measurement, fallback_location)?;
        self.write_block(&line)
    }

    pub fn write_summary(&self, report: &SummaryReport) -> Result<()> {
        let block = self.formatter.format_summary(report)?;
        self.write_block(&block)
    }

    pub fn write_no_samples(&self) -> Result<()> {
        let notice = self.formatter.format_no_samples();
        self.write_block(&notice)
    }

    fn write_block(&self, text: &str) -> Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| AppError::internal("Report writer lock poisoned"))?;
        writeln!(out, "{}", text)?;
        out.flush()?;
        Ok(())
    }
}

/// In-memory writer whose contents stay readable after it is handed to a
/// [`ReportWriter`]
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

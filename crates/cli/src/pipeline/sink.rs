//! RowSink - writes frame rows as JSON lines

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use contracts::Frame;
use tracing::{debug, instrument};

use crate::error::{CliError, Result};

/// JSON-lines row writer over a file or stdout
pub struct RowSink {
    writer: Box<dyn Write + Send>,
    skip_nulls: bool,
    rows: u64,
}

impl RowSink {
    /// Open `path`, or stdout when `None`.
    ///
    /// An existing file is truncated.
    pub fn open(path: Option<&Path>, skip_nulls: bool) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match path {
            Some(path) => {
                let file = File::create(path)
                    .map_err(|e| CliError::output(path.display().to_string(), e))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(BufWriter::new(io::stdout())),
        };
        Ok(Self::from_writer(writer, skip_nulls))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>, skip_nulls: bool) -> Self {
        Self {
            writer,
            skip_nulls,
            rows: 0,
        }
    }

    /// Write every row of `frame`, returning the number written.
    #[instrument(name = "sink_write", skip(self, frame), fields(rows = frame.num_rows()))]
    pub fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        let mut written = 0;
        for mut row in frame.rows() {
            if self.skip_nulls {
                row.retain(|_, value| !value.is_null());
            }
            serde_json::to_writer(&mut self.writer, &row)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.writer.write_all(b"\n")?;
            written += 1;
        }
        self.rows += written as u64;
        debug!(written, total = self.rows, "rows written");
        Ok(written)
    }

    /// Rows written so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush buffered rows
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::encoder::EncodedUnit;
use crate::error::Result;

/// Writes encoded units back to back, as a raw elementary stream.
pub struct BitstreamWriter<W: Write = BufWriter<File>> {
    inner: W,
    bytes_written: u64,
    units_written: u64,
}

impl BitstreamWriter<BufWriter<File>> {
    /// Creates (or truncates) `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        log::debug!("writing bitstream to {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> BitstreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
            units_written: 0,
        }
    }

    /// Appends one unit. Empty units are skipped.
    pub fn write_unit(&mut self, unit: &EncodedUnit) -> Result<()> {
        if unit.is_empty() {
            return Ok(());
        }
        self.inner.write_all(unit.data())?;
        self.bytes_written += unit.len() as u64;
        self.units_written += 1;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn units_written(&self) -> u64 {
        self.units_written
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        log::debug!(
            "bitstream finished: {} bytes in {} units",
            self.bytes_written,
            self.units_written
        );
        Ok(self.inner)
    }
}

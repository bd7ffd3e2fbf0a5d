use std::io::Write;

use crate::encoder::EncoderEngine;
use crate::error::{PipeError, Result};
use crate::frame::{PictureRef, PictureType, PixelFormat};
use crate::output::BitstreamWriter;

/// Terminal consumer of decoded (and possibly converted) pictures.
///
/// The picture is only valid for the duration of the call; a sink that needs
/// it longer must copy it.
pub trait FrameSink {
    /// `seq` counts delivered pictures from zero.
    fn consume(&mut self, picture: &PictureRef<'_>, seq: u64) -> Result<()>;

    /// Called once after the last picture.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    /// `(r, g, b) ` tuples per row.
    Rgb,
    /// Y, U and V component blocks.
    Yuv,
    /// One line with the picture coding type.
    FrameType,
}

impl DumpMode {
    /// The format pictures must be converted to before printing.
    pub fn required_format(self) -> Option<PixelFormat> {
        match self {
            DumpMode::Rgb => Some(PixelFormat::Rgb24),
            DumpMode::Yuv => Some(PixelFormat::Yuv420p),
            DumpMode::FrameType => None,
        }
    }
}

/// Limits how much of each plane is printed. Zero means no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    pub rows: usize,
    pub cols: usize,
}

impl Sample {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    fn clip(limit: usize, available: usize) -> usize {
        if limit == 0 {
            available
        } else {
            limit.min(available)
        }
    }
}

/// Prints pixel values or picture types as text.
pub struct PixelPrinter<W: Write> {
    out: W,
    mode: DumpMode,
    sample: Sample,
    printed: u64,
}

impl<W: Write> PixelPrinter<W> {
    pub fn new(out: W, mode: DumpMode) -> Self {
        Self {
            out,
            mode,
            sample: Sample::default(),
            printed: 0,
        }
    }

    pub fn with_sample(mut self, sample: Sample) -> Self {
        self.sample = sample;
        self
    }

    pub fn mode(&self) -> DumpMode {
        self.mode
    }

    /// Pictures printed so far.
    pub fn printed(&self) -> u64 {
        self.printed
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn expect_format(&self, picture: &PictureRef<'_>) -> Result<()> {
        match self.mode.required_format() {
            Some(format) if format != picture.format() => Err(PipeError::InvalidPicture(
                format!("{:?} dump needs {}, got {}", self.mode, format, picture.format()),
            )),
            _ => Ok(()),
        }
    }

    fn print_rgb(&mut self, picture: &PictureRef<'_>, seq: u64) -> Result<()> {
        writeln!(self.out, "Frame {}:", seq)?;
        let plane = picture.plane(0);
        let rows = Sample::clip(self.sample.rows, plane.rows());
        let cols = Sample::clip(self.sample.cols, picture.width() as usize);
        for y in 0..rows {
            for px in plane.row(y).chunks_exact(3).take(cols) {
                write!(self.out, "({}, {}, {}) ", px[0], px[1], px[2])?;
            }
            writeln!(self.out)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn print_yuv(&mut self, picture: &PictureRef<'_>, seq: u64) -> Result<()> {
        writeln!(self.out, "Frame {}:", seq)?;
        for (name, plane) in ["Y", "U", "V"].iter().zip(picture.planes()) {
            writeln!(self.out, "{} Component:", name)?;
            let rows = Sample::clip(self.sample.rows, plane.rows());
            let cols = Sample::clip(self.sample.cols, plane.row_bytes());
            for y in 0..rows {
                for value in &plane.row(y)[..cols] {
                    write!(self.out, "{} ", value)?;
                }
                writeln!(self.out)?;
            }
        }
        Ok(())
    }

    fn print_type(&mut self, picture: &PictureRef<'_>, seq: u64) -> Result<()> {
        writeln!(self.out, "\nDecoded frame {}:", seq + 1)?;
        match picture.kind() {
            PictureType::Other => writeln!(self.out, "  Frame Type: Other")?,
            kind => writeln!(self.out, "  Frame Type: {} Frame", kind)?,
        }
        Ok(())
    }
}

impl<W: Write> FrameSink for PixelPrinter<W> {
    fn consume(&mut self, picture: &PictureRef<'_>, seq: u64) -> Result<()> {
        self.expect_format(picture)?;
        match self.mode {
            DumpMode::Rgb => self.print_rgb(picture, seq)?,
            DumpMode::Yuv => self.print_yuv(picture, seq)?,
            DumpMode::FrameType => self.print_type(picture, seq)?,
        }
        self.printed += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Re-encodes every picture and appends the output to a bitstream.
pub struct EncodeSink<E, W: Write> {
    engine: E,
    writer: BitstreamWriter<W>,
    pictures: u64,
    closed: bool,
}

impl<E: EncoderEngine, W: Write> EncodeSink<E, W> {
    pub fn new(engine: E, writer: BitstreamWriter<W>) -> Self {
        Self {
            engine,
            writer,
            pictures: 0,
            closed: false,
        }
    }

    pub fn pictures(&self) -> u64 {
        self.pictures
    }

    pub fn writer(&self) -> &BitstreamWriter<W> {
        &self.writer
    }

    /// Returns the writer; call after [`FrameSink::finish`].
    pub fn into_writer(self) -> BitstreamWriter<W> {
        self.writer
    }
}

impl<E: EncoderEngine, W: Write> FrameSink for EncodeSink<E, W> {
    fn consume(&mut self, picture: &PictureRef<'_>, _seq: u64) -> Result<()> {
        let unit = self.engine.encode(picture)?;
        self.writer.write_unit(&unit)?;
        self.pictures += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let unit = self.engine.close()?;
        self.writer.write_unit(&unit)
    }
}

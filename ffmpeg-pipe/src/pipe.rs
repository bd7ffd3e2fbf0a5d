//! The decode loop and the encode loop that tie the stages together.

use std::io::Write;

use crate::decoder::{BlockDecoder, Drain};
use crate::encoder::EncoderEngine;
use crate::error::{PipeError, Result};
use crate::frame::{Picture, PictureRef, PixelFormat};
use crate::input::ContainerReader;
use crate::output::BitstreamWriter;
use crate::scaler::Scaler;
use crate::sink::FrameSink;

pub const DEFAULT_MAX_CONSECUTIVE_FAULTS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeConfig {
    /// Convert every picture to this format before the sink sees it.
    pub target_format: Option<PixelFormat>,
    /// Consecutive decode faults tolerated before the run aborts.
    pub max_consecutive_faults: u32,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            target_format: None,
            max_consecutive_faults: DEFAULT_MAX_CONSECUTIVE_FAULTS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub packets_read: u64,
    /// Packets of the selected stream accepted by the decoder.
    pub packets_fed: u64,
    /// Packets belonging to other streams.
    pub packets_ignored: u64,
    pub faults: u64,
    pub pictures: u64,
}

/// Reads packets of one stream, decodes them and hands every picture to a sink.
#[derive(Debug, Clone)]
pub struct DecodePipe {
    config: PipeConfig,
    scaler: Option<Scaler>,
}

impl DecodePipe {
    pub fn new(config: PipeConfig) -> Self {
        Self {
            config,
            scaler: config.target_format.map(Scaler::new),
        }
    }

    /// Runs until the reader is exhausted and the decoder has been drained.
    ///
    /// The reader and decoder are closed when this returns, on success or
    /// failure alike.
    pub fn run<R, D, S>(
        &self,
        reader: &mut R,
        stream_index: usize,
        decoder: &mut D,
        sink: &mut S,
    ) -> Result<DecodeStats>
    where
        R: ContainerReader + ?Sized,
        D: BlockDecoder + ?Sized,
        S: FrameSink + ?Sized,
    {
        let result = self.run_inner(reader, stream_index, decoder, sink);
        decoder.close();
        reader.close();
        match &result {
            Ok(stats) => log::info!(
                "decode finished: {} pictures from {} packets, {} faults",
                stats.pictures,
                stats.packets_fed,
                stats.faults
            ),
            Err(e) => log::error!("decode aborted: {}", e),
        }
        result
    }

    fn run_inner<R, D, S>(
        &self,
        reader: &mut R,
        stream_index: usize,
        decoder: &mut D,
        sink: &mut S,
    ) -> Result<DecodeStats>
    where
        R: ContainerReader + ?Sized,
        D: BlockDecoder + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut stats = DecodeStats::default();
        let mut faults = 0u32;

        while let Some(packet) = reader.next_packet()? {
            stats.packets_read += 1;
            if packet.index() != stream_index {
                stats.packets_ignored += 1;
                continue;
            }
            log::debug!(
                "packet {} bytes, pts {:?}, key {}",
                packet.size(),
                packet.pts(),
                packet.is_key()
            );

            match decoder.feed(&packet) {
                Ok(()) => stats.packets_fed += 1,
                Err(e) if e.is_recoverable() => {
                    self.fault(&mut faults, &mut stats, e)?;
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.drain_ready(decoder, sink, &mut stats, &mut faults)?;
        }

        match decoder.flush() {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => self.fault(&mut faults, &mut stats, e)?,
            Err(e) => return Err(e),
        }
        // trailing pictures; a decoder that asks for input after flush has nothing left
        self.drain_ready(decoder, sink, &mut stats, &mut faults)?;

        sink.finish()?;
        Ok(stats)
    }

    /// Pulls pictures until the decoder wants input or has nothing left.
    ///
    /// A faulted drain counts toward the fault bound and draining carries on,
    /// so the decoder is never fed while it still holds output. Only a
    /// delivered picture resets the count.
    fn drain_ready<D, S>(
        &self,
        decoder: &mut D,
        sink: &mut S,
        stats: &mut DecodeStats,
        faults: &mut u32,
    ) -> Result<()>
    where
        D: BlockDecoder + ?Sized,
        S: FrameSink + ?Sized,
    {
        loop {
            let picture = match decoder.drain() {
                Ok(Drain::Picture(picture)) => picture,
                Ok(Drain::NeedMoreInput) | Ok(Drain::EndOfStream) => return Ok(()),
                Err(e) if e.is_recoverable() => {
                    self.fault(faults, stats, e)?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.deliver(&picture, sink, stats.pictures)?;
            stats.pictures += 1;
            *faults = 0;
        }
    }

    fn deliver<S: FrameSink + ?Sized>(
        &self,
        picture: &PictureRef<'_>,
        sink: &mut S,
        seq: u64,
    ) -> Result<()> {
        log::debug!(
            "picture {}: {}x{} {} {}",
            seq,
            picture.width(),
            picture.height(),
            picture.format(),
            picture.kind()
        );
        match &self.scaler {
            Some(scaler) if scaler.needs_conversion(picture) => {
                let converted = scaler.convert(picture)?;
                sink.consume(&converted.as_view(), seq)
            }
            _ => sink.consume(picture, seq),
        }
    }

    fn fault(&self, faults: &mut u32, stats: &mut DecodeStats, err: PipeError) -> Result<()> {
        *faults += 1;
        stats.faults += 1;
        if *faults > self.config.max_consecutive_faults {
            return Err(PipeError::Decode(format!(
                "giving up after {} consecutive faults, last: {}",
                faults, err
            )));
        }
        log::warn!("skipping decode fault ({} in a row): {}", faults, err);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    pub pictures: u64,
    /// Non-empty units written.
    pub units: u64,
    pub bytes: u64,
}

/// Encodes `pictures` in order, closes the engine and writes everything it
/// produced. The writer is left for the caller to finish.
pub fn run_encode<I, E, W>(
    pictures: I,
    engine: &mut E,
    writer: &mut BitstreamWriter<W>,
) -> Result<EncodeStats>
where
    I: IntoIterator<Item = Picture>,
    E: EncoderEngine + ?Sized,
    W: Write,
{
    let mut stats = EncodeStats::default();
    let start = writer.bytes_written();
    let units = writer.units_written();

    for picture in pictures {
        let unit = engine.encode(&picture.as_view())?;
        writer.write_unit(&unit)?;
        stats.pictures += 1;
    }
    let tail = engine.close()?;
    writer.write_unit(&tail)?;

    stats.units = writer.units_written() - units;
    stats.bytes = writer.bytes_written() - start;
    log::info!(
        "encoded {} pictures into {} bytes",
        stats.pictures,
        stats.bytes
    );
    Ok(stats)
}

#[cfg(feature = "ffmpeg")]
pub use av::{VideoSession, transcode};

#[cfg(feature = "ffmpeg")]
mod av {
    use std::path::Path;

    use super::{DecodePipe, DecodeStats, PipeConfig};
    use crate::decoder::Decoder;
    use crate::encoder::{Encoder, EncoderConfig};
    use crate::error::{PipeError, Result};
    use crate::frame::{Geometry, PixelFormat};
    use crate::input::{AvInput, ContainerReader};
    use crate::output::BitstreamWriter;
    use crate::sink::{EncodeSink, FrameSink};
    use crate::stream::StreamDescriptor;

    /// Frame rate assumed when the container does not declare one.
    const FALLBACK_FPS: u32 = 25;

    /// An opened container with its first video stream selected and a
    /// decoder ready for it.
    pub struct VideoSession {
        input: AvInput,
        stream: StreamDescriptor,
        decoder: Decoder,
    }

    impl VideoSession {
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            let input = AvInput::open(path)?;
            let stream = input.streams().select_first_video_stream()?.clone();
            let av_stream = input
                .stream(stream.index)
                .ok_or(PipeError::NoVideoStream)?;
            let decoder = Decoder::open(av_stream)?;
            log::info!(
                "selected stream {}: {} {}x{}",
                stream.index,
                stream.codec_name,
                stream.width,
                stream.height
            );
            Ok(Self {
                input,
                stream,
                decoder,
            })
        }

        pub fn input(&self) -> &AvInput {
            &self.input
        }

        pub fn stream(&self) -> &StreamDescriptor {
            &self.stream
        }

        /// Whole frames per second, rounded.
        pub fn fps(&self) -> u32 {
            self.stream
                .fps()
                .map(|fps| fps.round() as u32)
                .filter(|fps| *fps > 0)
                .unwrap_or(FALLBACK_FPS)
        }

        pub fn run<S: FrameSink + ?Sized>(
            mut self,
            config: PipeConfig,
            sink: &mut S,
        ) -> Result<DecodeStats> {
            DecodePipe::new(config).run(
                &mut self.input,
                self.stream.index,
                &mut self.decoder,
                sink,
            )
        }
    }

    /// Decodes the first video stream of `input` and re-encodes it into a raw
    /// H.264 file at `output`.
    ///
    /// The input and encoder are set up before `output` is created, so a bad
    /// source leaves no file behind.
    pub fn transcode(
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        configure: impl FnOnce(u32) -> EncoderConfig,
        max_consecutive_faults: u32,
    ) -> Result<(DecodeStats, u64)> {
        let session = VideoSession::open(input)?;
        let geometry = Geometry::new(session.stream().width, session.stream().height);
        let encoder = Encoder::open(configure(session.fps()), geometry)?;
        let writer = BitstreamWriter::create(output)?;

        let mut sink = EncodeSink::new(encoder, writer);
        let config = PipeConfig {
            target_format: Some(PixelFormat::Yuv420p),
            max_consecutive_faults,
        };
        let stats = session.run(config, &mut sink)?;
        let writer = sink.into_writer();
        let bytes = writer.bytes_written();
        writer.finish()?;
        Ok((stats, bytes))
    }
}

#[cfg(test)]
#[path = "pipe_test.rs"]
mod pipe_test;

use crate::error::Result;
use crate::frame::PictureRef;
use crate::packet::PacketRef;

/// Outcome of one [`BlockDecoder::drain`] call.
#[derive(Debug)]
pub enum Drain<T> {
    Picture(T),
    /// Nothing buffered; feed the next packet.
    NeedMoreInput,
    /// The decoder was flushed and has emitted everything it held.
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Closed,
    Open,
    /// End of input was signalled; only trailing pictures remain.
    Draining,
}

/// A stateful codec turning compressed packets into pictures.
///
/// One packet can yield zero, one or several pictures, so every `feed` must
/// be followed by `drain` calls until [`Drain::NeedMoreInput`]. A picture
/// returned by `drain` borrows decoder storage that the next call reuses.
pub trait BlockDecoder {
    fn state(&self) -> DecoderState;

    /// Submits one access unit. Corrupt data is reported as
    /// [`PipeError::Decode`](crate::PipeError::Decode) and leaves the decoder usable.
    fn feed(&mut self, packet: &PacketRef<'_>) -> Result<()>;

    /// Pulls at most one picture.
    fn drain(&mut self) -> Result<Drain<PictureRef<'_>>>;

    /// Signals end of input. Trailing pictures are then pulled with `drain`
    /// until [`Drain::EndOfStream`]. Calling it again is a no-op.
    fn flush(&mut self) -> Result<()>;

    /// Releases codec state. Idempotent.
    fn close(&mut self);
}

#[cfg(feature = "ffmpeg")]
pub use av::Decoder;

#[cfg(feature = "ffmpeg")]
mod av {
    use ffmpeg_next::format::Pixel;
    use ffmpeg_next::software::scaling;

    use super::{BlockDecoder, DecoderState, Drain};
    use crate::convert;
    use crate::error::{PipeError, Result};
    use crate::frame::{ColorRange, PictureRef, PixelFormat};
    use crate::packet::PacketRef;
    use crate::stream::AvStream;

    /// Single-threaded FFmpeg video decoder.
    ///
    /// Frames in layouts the crate has no name for (high bit depth, planar
    /// RGB, ...) are rescaled to yuv420p before they are handed out.
    pub struct Decoder {
        inner: Option<ffmpeg_next::codec::decoder::Video>,
        frame: ffmpeg_next::frame::Video,
        rescaler: Option<Rescaler>,
        stream_index: usize,
        state: DecoderState,
        finished: bool,
        emitted: u64,
    }

    struct Rescaler {
        input: (Pixel, u32, u32),
        context: scaling::Context,
        frame: ffmpeg_next::frame::Video,
    }

    impl Rescaler {
        fn new(input: (Pixel, u32, u32)) -> Result<Self> {
            let (format, width, height) = input;
            let context = scaling::Context::get(
                format,
                width,
                height,
                Pixel::YUV420P,
                width,
                height,
                scaling::Flags::BILINEAR,
            )
            .map_err(|e| {
                log::error!("no scaler from {:?}: {}", format, e);
                PipeError::unsupported_conversion(format, PixelFormat::Yuv420p)
            })?;
            log::info!("decoder emits {:?}, rescaling to yuv420p", format);
            Ok(Self {
                input,
                context,
                frame: ffmpeg_next::frame::Video::empty(),
            })
        }

        /// Rescales `frame`, rebuilding the context when its layout changes.
        fn run<'s>(
            slot: &'s mut Option<Rescaler>,
            frame: &ffmpeg_next::frame::Video,
        ) -> Result<&'s ffmpeg_next::frame::Video> {
            let input = (frame.format(), frame.width(), frame.height());
            let rescaler = match slot.take() {
                Some(rescaler) if rescaler.input == input => slot.insert(rescaler),
                _ => slot.insert(Rescaler::new(input)?),
            };
            rescaler
                .context
                .run(frame, &mut rescaler.frame)
                .map_err(|e| {
                    log::error!("rescaling {:?} failed: {}", input.0, e);
                    PipeError::unsupported_conversion(input.0, PixelFormat::Yuv420p)
                })?;
            Ok(&rescaler.frame)
        }
    }

    impl Decoder {
        pub fn open(stream: &AvStream) -> Result<Self> {
            crate::init()?;
            let descriptor = stream.descriptor();
            if !descriptor.is_video() {
                return Err(PipeError::CodecInit(format!(
                    "stream {} is not a video stream",
                    descriptor.index
                )));
            }

            let codec_id = stream.parameters().id();
            let Some(codec) = ffmpeg_next::decoder::find(codec_id) else {
                return Err(PipeError::UnsupportedCodec(descriptor.codec_name.clone()));
            };

            let mut decoder_ctx =
                ffmpeg_next::codec::Context::from_parameters(stream.parameters().clone())
                    .map_err(|e| PipeError::CodecInit(e.to_string()))?;
            unsafe {
                let ctx = decoder_ctx.as_mut_ptr();
                (*ctx).thread_count = 1;
                (*ctx).time_base =
                    ffmpeg_next::Rational::new(descriptor.time_base.num, descriptor.time_base.den)
                        .into();
            }

            let decoder = decoder_ctx
                .decoder()
                .video()
                .map_err(|e| PipeError::CodecInit(e.to_string()))?;

            if decoder.width() == 0 || decoder.height() == 0 {
                return Err(PipeError::CodecInit("missing codec parameters".to_string()));
            }

            log::info!(
                "decoder opened: {} {}x{} for stream {}",
                codec.name(),
                decoder.width(),
                decoder.height(),
                descriptor.index
            );

            Ok(Self {
                inner: Some(decoder),
                frame: ffmpeg_next::frame::Video::empty(),
                rescaler: None,
                stream_index: descriptor.index,
                state: DecoderState::Open,
                finished: false,
                emitted: 0,
            })
        }

    }

    impl BlockDecoder for Decoder {
        fn state(&self) -> DecoderState {
            self.state
        }

        fn feed(&mut self, packet: &PacketRef<'_>) -> Result<()> {
            if self.state != DecoderState::Open {
                return Err(PipeError::Decode(format!(
                    "decoder is {:?}, not accepting packets",
                    self.state
                )));
            }
            let Some(decoder) = self.inner.as_mut() else {
                return Err(PipeError::Decode("decoder is closed".to_string()));
            };
            // an empty packet would be taken as end of input
            if packet.data().is_empty() {
                log::debug!("skipping empty packet");
                return Ok(());
            }

            let mut av_packet = ffmpeg_next::Packet::copy(packet.data());
            av_packet.set_pts(packet.pts());
            av_packet.set_dts(packet.dts());
            if packet.is_key() {
                av_packet.set_flags(ffmpeg_next::packet::Flags::KEY);
            }

            decoder
                .send_packet(&av_packet)
                .map_err(|e| PipeError::Decode(e.to_string()))
        }

        fn drain(&mut self) -> Result<Drain<PictureRef<'_>>> {
            if self.finished {
                return Ok(Drain::EndOfStream);
            }
            let Some(decoder) = self.inner.as_mut() else {
                return Ok(Drain::EndOfStream);
            };

            match decoder.receive_frame(&mut self.frame) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    self.finished = true;
                    return Ok(Drain::EndOfStream);
                }
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    return Ok(Drain::NeedMoreInput);
                }
                Err(e) => return Err(PipeError::Decode(e.to_string())),
            }

            self.emitted += 1;
            let frame = &self.frame;
            if convert::pixel_format_from_ffmpeg(frame.format()).is_some() {
                return picture_view(frame, frame, convert::color_range_of(frame))
                    .map(Drain::Picture);
            }
            let rescaled = Rescaler::run(&mut self.rescaler, frame)?;
            picture_view(rescaled, frame, ColorRange::Limited).map(Drain::Picture)
        }

        fn flush(&mut self) -> Result<()> {
            if self.state != DecoderState::Open {
                return Ok(());
            }
            self.state = DecoderState::Draining;
            let Some(decoder) = self.inner.as_mut() else {
                return Ok(());
            };
            match decoder.send_eof() {
                Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(()),
                Err(e) => Err(PipeError::Decode(e.to_string())),
            }
        }

        fn close(&mut self) {
            if self.inner.take().is_some() {
                log::debug!(
                    "decoder for stream {} closed after {} pictures",
                    self.stream_index,
                    self.emitted
                );
            }
            self.frame = ffmpeg_next::frame::Video::empty();
            self.rescaler = None;
            self.state = DecoderState::Closed;
        }
    }

    /// Borrows the planes of `frame` as a picture view; timing and coding
    /// type come from `decoded`.
    fn picture_view<'f>(
        frame: &'f ffmpeg_next::frame::Video,
        decoded: &ffmpeg_next::frame::Video,
        range: ColorRange,
    ) -> Result<PictureRef<'f>> {
        let format = convert::pixel_format_from_ffmpeg(frame.format()).ok_or_else(|| {
            PipeError::unsupported_conversion(frame.format(), PixelFormat::Yuv420p)
        })?;

        let planes: Vec<(&[u8], usize)> = (0..format.plane_count())
            .map(|index| (frame.data(index), frame.stride(index)))
            .collect();

        Ok(
            PictureRef::from_planes(frame.width(), frame.height(), format, &planes)?
                .with_range(range)
                .with_pts(decoded.pts())
                .with_kind(convert::picture_type_from_ffmpeg(decoded.kind()))
                .with_key(decoded.is_key()),
        )
    }
}

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use bytes::Bytes;

use crate::error::{PipeError, Result};
use crate::frame::{Geometry, PictureRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Constant rate factor, optionally capped by `crf_max` under VBV pressure.
    ConstantQuality { crf: u8, crf_max: Option<u8> },
    ConstantBitrate { kbps: u32 },
}

/// Video buffering verifier limits, in kbit and kbit/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vbv {
    pub buffer_kbit: u32,
    pub max_kbps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMode {
    ZeroLatency,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Baseline,
    Main,
    High,
}

impl Profile {
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Baseline => "baseline",
            Profile::Main => "main",
            Profile::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    const ALL: [Preset; 9] = [
        Preset::Ultrafast,
        Preset::Superfast,
        Preset::Veryfast,
        Preset::Faster,
        Preset::Fast,
        Preset::Medium,
        Preset::Slow,
        Preset::Slower,
        Preset::Veryslow,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Ultrafast => "ultrafast",
            Preset::Superfast => "superfast",
            Preset::Veryfast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::Slower => "slower",
            Preset::Veryslow => "veryslow",
        }
    }
}

impl Display for Preset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = PipeError;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PipeError::Config(format!("unknown preset: {}", s)))
    }
}

/// Everything the encoder is opened with, except the picture geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub fps: u32,
    pub rate_control: RateControl,
    pub vbv: Option<Vbv>,
    pub keyframe_interval: u32,
    pub intra_refresh: bool,
    pub threads: u32,
    pub latency: LatencyMode,
    pub profile: Profile,
    pub preset: Preset,
}

impl EncoderConfig {
    /// Low-latency live settings: one keyframe per second, rolling intra
    /// refresh, no frame buffering.
    pub fn realtime(fps: u32) -> Self {
        Self {
            fps,
            rate_control: RateControl::ConstantQuality {
                crf: 25,
                crf_max: Some(35),
            },
            vbv: Some(Vbv {
                buffer_kbit: 1000,
                max_kbps: 1000,
            }),
            keyframe_interval: fps,
            intra_refresh: true,
            threads: 1,
            latency: LatencyMode::ZeroLatency,
            profile: Profile::High,
            preset: Preset::Fast,
        }
    }

    /// Size-oriented recompression: slow preset, crf 28 under a 300 kbit/s cap.
    pub fn archival(fps: u32) -> Self {
        Self {
            fps,
            rate_control: RateControl::ConstantQuality {
                crf: 28,
                crf_max: None,
            },
            vbv: Some(Vbv {
                buffer_kbit: 600,
                max_kbps: 300,
            }),
            keyframe_interval: fps.saturating_mul(10),
            intra_refresh: false,
            threads: 1,
            latency: LatencyMode::Normal,
            profile: Profile::High,
            preset: Preset::Slow,
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        let crf_max = match self.rate_control {
            RateControl::ConstantQuality { crf_max, .. } => crf_max,
            RateControl::ConstantBitrate { .. } => None,
        };
        self.rate_control = RateControl::ConstantQuality { crf, crf_max };
        self
    }

    /// Caps the bitrate at `kbps`, with a two second VBV buffer.
    pub fn with_max_bitrate_kbps(mut self, kbps: u32) -> Self {
        self.vbv = Some(Vbv {
            buffer_kbit: kbps.saturating_mul(2),
            max_kbps: kbps,
        });
        self
    }

    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.preset = preset;
        self
    }

    pub fn validate(&self, geometry: Geometry) -> Result<()> {
        let invalid = |msg: String| Err(PipeError::Config(msg));

        if geometry.width == 0 || geometry.height == 0 {
            return invalid(format!(
                "geometry {}x{} is empty",
                geometry.width, geometry.height
            ));
        }
        if geometry.width % 2 != 0 || geometry.height % 2 != 0 {
            return invalid(format!(
                "geometry {}x{} must be even for 4:2:0",
                geometry.width, geometry.height
            ));
        }
        if self.fps == 0 {
            return invalid("frame rate must be positive".to_string());
        }
        if self.keyframe_interval == 0 {
            return invalid("keyframe interval must be positive".to_string());
        }
        if self.threads == 0 {
            return invalid("thread count must be positive".to_string());
        }

        match self.rate_control {
            RateControl::ConstantQuality { crf, crf_max } => {
                if crf > 51 {
                    return invalid(format!("crf {} is outside 0-51", crf));
                }
                if let Some(max) = crf_max {
                    if max > 51 || max < crf {
                        return invalid(format!("crf_max {} must be within {}-51", max, crf));
                    }
                }
            }
            RateControl::ConstantBitrate { kbps } => {
                if kbps == 0 {
                    return invalid("bitrate must be positive".to_string());
                }
            }
        }

        if let Some(vbv) = self.vbv {
            if vbv.buffer_kbit == 0 || vbv.max_kbps == 0 {
                return invalid("vbv buffer and max rate must be positive".to_string());
            }
        }
        Ok(())
    }

    /// The `x264-params` string, e.g. `keyint=30:intra-refresh=1:crf-max=35`.
    pub fn x264_params(&self) -> String {
        let mut params = vec![format!("keyint={}", self.keyframe_interval)];
        if self.intra_refresh {
            params.push("intra-refresh=1".to_string());
        }
        if let RateControl::ConstantQuality {
            crf_max: Some(max), ..
        } = self.rate_control
        {
            params.push(format!("crf-max={}", max));
        }
        if let Some(vbv) = self.vbv {
            params.push(format!("vbv-bufsize={}", vbv.buffer_kbit));
            params.push(format!("vbv-maxrate={}", vbv.max_kbps));
        }
        params.join(":")
    }

    /// Private codec options passed when opening libx264.
    pub fn codec_options(&self) -> Vec<(&'static str, String)> {
        let mut options = vec![
            ("preset", self.preset.as_str().to_string()),
            ("profile", self.profile.as_str().to_string()),
        ];
        if self.latency == LatencyMode::ZeroLatency {
            options.push(("tune", "zerolatency".to_string()));
        }
        if let RateControl::ConstantQuality { crf, .. } = self.rate_control {
            options.push(("crf", crf.to_string()));
        }
        options.push(("x264-params", self.x264_params()));
        options
    }
}

/// Compressed bytes produced by one encode or close call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedUnit {
    data: Bytes,
    packets: usize,
    keyframe: bool,
}

impl EncodedUnit {
    pub fn new(data: impl Into<Bytes>, packets: usize, keyframe: bool) -> Self {
        Self {
            data: data.into(),
            packets,
            keyframe,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of access units concatenated in `data`.
    pub fn packets(&self) -> usize {
        self.packets
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }
}

#[derive(Debug, Default)]
pub(crate) struct UnitBuilder {
    data: Vec<u8>,
    packets: usize,
    keyframe: bool,
}

impl UnitBuilder {
    pub(crate) fn push(&mut self, bytes: &[u8], keyframe: bool) {
        self.data.extend_from_slice(bytes);
        self.packets += 1;
        self.keyframe |= keyframe;
    }

    pub(crate) fn finish(self) -> EncodedUnit {
        EncodedUnit::new(self.data, self.packets, self.keyframe)
    }
}

/// A stateful encoder turning raw 4:2:0 pictures into an elementary stream.
///
/// `encode` may return an empty unit while pictures sit in the lookahead;
/// `close` must be called to get them out.
pub trait EncoderEngine {
    fn encode(&mut self, picture: &PictureRef<'_>) -> Result<EncodedUnit>;

    /// Flushes buffered pictures. Encoding afterwards is an error.
    fn close(&mut self) -> Result<EncodedUnit>;
}

#[cfg(feature = "ffmpeg")]
pub use av::Encoder;

#[cfg(feature = "ffmpeg")]
mod av {
    use ffmpeg_next::{Dictionary, Rational};

    use super::{EncodedUnit, EncoderConfig, EncoderEngine, RateControl, UnitBuilder};
    use crate::error::{PipeError, Result};
    use crate::frame::{Geometry, PictureRef, PixelFormat};

    const CODEC_NAME: &str = "libx264";

    /// libx264 through FFmpeg, producing Annex-B H.264.
    pub struct Encoder {
        inner: Option<ffmpeg_next::codec::encoder::Video>,
        frame: ffmpeg_next::frame::Video,
        geometry: Geometry,
        frame_index: i64,
        packets: u64,
    }

    impl Encoder {
        pub fn open(config: EncoderConfig, geometry: Geometry) -> Result<Self> {
            config.validate(geometry)?;
            crate::init()?;

            let codec = ffmpeg_next::encoder::find_by_name(CODEC_NAME)
                .ok_or_else(|| PipeError::Config(format!("{} is not available", CODEC_NAME)))?;

            let mut encoder = ffmpeg_next::codec::Context::new_with_codec(codec)
                .encoder()
                .video()
                .map_err(|e| PipeError::Config(e.to_string()))?;

            let fps = Rational::new(config.fps as i32, 1);
            encoder.set_width(geometry.width);
            encoder.set_height(geometry.height);
            encoder.set_format(ffmpeg_next::format::Pixel::YUV420P);
            encoder.set_frame_rate(Some(fps));
            encoder.set_time_base(fps.invert());
            encoder.set_gop(config.keyframe_interval);
            if let RateControl::ConstantBitrate { kbps } = config.rate_control {
                encoder.set_bit_rate(kbps as usize * 1000);
            }
            unsafe {
                (*encoder.as_mut_ptr()).thread_count = config.threads as i32;
            }

            let mut options = Dictionary::new();
            for (key, value) in config.codec_options() {
                options.set(key, &value);
            }
            let encoder = encoder
                .open_with(options)
                .map_err(|e| PipeError::Config(format!("{}: {}", CODEC_NAME, e)))?;

            log::info!(
                "encoder opened: {} {}x{} @ {} fps, preset {}",
                CODEC_NAME,
                geometry.width,
                geometry.height,
                config.fps,
                config.preset
            );

            Ok(Self {
                inner: Some(encoder),
                frame: ffmpeg_next::frame::Video::new(
                    ffmpeg_next::format::Pixel::YUV420P,
                    geometry.width,
                    geometry.height,
                ),
                geometry,
                frame_index: 0,
                packets: 0,
            })
        }

        pub fn geometry(&self) -> Geometry {
            self.geometry
        }

        fn fill_frame(&mut self, picture: &PictureRef<'_>) {
            for (index, plane) in picture.planes().iter().enumerate() {
                let stride = self.frame.stride(index);
                let data = self.frame.data_mut(index);
                for y in 0..plane.rows() {
                    let start = y * stride;
                    data[start..start + plane.row_bytes()].copy_from_slice(plane.row(y));
                }
            }
        }

        fn collect(
            encoder: &mut ffmpeg_next::codec::encoder::Video,
            unit: &mut UnitBuilder,
        ) -> Result<()> {
            let mut packet = ffmpeg_next::Packet::empty();
            loop {
                match encoder.receive_packet(&mut packet) {
                    Ok(()) => {
                        unit.push(packet.data().unwrap_or_default(), packet.is_key());
                    }
                    Err(ffmpeg_next::Error::Other { errno })
                        if errno == ffmpeg_next::util::error::EAGAIN =>
                    {
                        return Ok(());
                    }
                    Err(ffmpeg_next::Error::Eof) => return Ok(()),
                    Err(e) => return Err(PipeError::Encode(e.to_string())),
                }
            }
        }
    }

    impl EncoderEngine for Encoder {
        fn encode(&mut self, picture: &PictureRef<'_>) -> Result<EncodedUnit> {
            if self.inner.is_none() {
                return Err(PipeError::Encode("encoder is closed".to_string()));
            }
            if picture.format() != PixelFormat::Yuv420p || picture.geometry() != self.geometry {
                return Err(PipeError::InvalidPicture(format!(
                    "encoder expects yuv420p {}x{}, got {} {}x{}",
                    self.geometry.width,
                    self.geometry.height,
                    picture.format(),
                    picture.width(),
                    picture.height()
                )));
            }

            self.fill_frame(picture);
            self.frame.set_pts(Some(self.frame_index));
            self.frame_index += 1;

            let Some(encoder) = self.inner.as_mut() else {
                return Err(PipeError::Encode("encoder is closed".to_string()));
            };
            encoder
                .send_frame(&self.frame)
                .map_err(|e| PipeError::Encode(e.to_string()))?;

            let mut unit = UnitBuilder::default();
            Self::collect(encoder, &mut unit)?;
            self.packets += unit.packets as u64;
            Ok(unit.finish())
        }

        fn close(&mut self) -> Result<EncodedUnit> {
            let Some(mut encoder) = self.inner.take() else {
                return Ok(EncodedUnit::default());
            };
            encoder
                .send_eof()
                .map_err(|e| PipeError::Encode(e.to_string()))?;

            let mut unit = UnitBuilder::default();
            Self::collect(&mut encoder, &mut unit)?;
            self.packets += unit.packets as u64;
            log::info!(
                "encoder closed after {} pictures, {} packets",
                self.frame_index,
                self.packets
            );
            Ok(unit.finish())
        }
    }

}

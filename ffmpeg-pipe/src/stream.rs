use std::fmt::{Display, Formatter};

use crate::error::{PipeError, Result};
use crate::frame::PixelFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
    Data,
    Unknown,
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Subtitle => "subtitle",
            MediaType::Data => "data",
            MediaType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    H264,
    Hevc,
    Vp8,
    Vp9,
    Av1,
    Mpeg4,
    Mpeg2Video,
    RawVideo,
    Aac,
    Opus,
    Mp3,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(self) -> Option<f64> {
        if self.den == 0 || self.num == 0 {
            None
        } else {
            Some(self.num as f64 / self.den as f64)
        }
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Declared properties of one container stream.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StreamDescriptor {
    pub index: usize,
    pub media_type: MediaType,
    pub codec_id: CodecId,
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    /// Native pixel format, when the container declares one we can represent.
    pub pixel_format: Option<PixelFormat>,
    pub frame_rate: Rational,
    pub time_base: Rational,
}

impl StreamDescriptor {
    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    pub fn fps(&self) -> Option<f64> {
        self.frame_rate.to_f64()
    }
}

/// All streams of an open container, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StreamTable {
    streams: Vec<StreamDescriptor>,
}

impl StreamTable {
    pub fn new(streams: Vec<StreamDescriptor>) -> Self {
        Self { streams }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams.iter()
    }

    /// The first declared video stream wins; other media types are ignored.
    pub fn select_first_video_stream(&self) -> Result<&StreamDescriptor> {
        self.streams
            .iter()
            .find(|s| s.is_video())
            .ok_or(PipeError::NoVideoStream)
    }
}

#[cfg(feature = "ffmpeg")]
pub use av::AvStream;

#[cfg(feature = "ffmpeg")]
mod av {
    use ffmpeg_next::{codec::Parameters, format::stream};

    use super::StreamDescriptor;
    use crate::convert;

    /// A container stream together with the codec parameters a decoder opens from.
    #[derive(Clone)]
    pub struct AvStream {
        descriptor: StreamDescriptor,
        parameters: Parameters,
    }

    impl AvStream {
        pub fn index(&self) -> usize {
            self.descriptor.index
        }

        pub fn descriptor(&self) -> &StreamDescriptor {
            &self.descriptor
        }

        pub fn parameters(&self) -> &Parameters {
            &self.parameters
        }
    }

    impl From<stream::Stream<'_>> for AvStream {
        fn from(stream: stream::Stream<'_>) -> Self {
            let parameters = stream.parameters();
            let (width, height, format) = convert::video_params(&parameters);
            let rate = if stream.avg_frame_rate().numerator() != 0 {
                stream.avg_frame_rate()
            } else {
                stream.rate()
            };
            let descriptor = StreamDescriptor {
                index: stream.index(),
                media_type: convert::media_type_from_ffmpeg(parameters.medium()),
                codec_id: convert::codec_id_from_ffmpeg(parameters.id()),
                codec_name: format!("{:?}", parameters.id()).to_lowercase(),
                width,
                height,
                pixel_format: format,
                frame_rate: convert::rational_from_ffmpeg(rate),
                time_base: convert::rational_from_ffmpeg(stream.time_base()),
            };

            Self {
                descriptor,
                parameters,
            }
        }
    }
}

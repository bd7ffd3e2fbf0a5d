//! Media file metadata (similar to ffprobe).

use std::fmt;

use crate::frame::PixelFormat;
use crate::stream::{MediaType, StreamDescriptor, StreamTable};

/// Format-level info (corresponds to ffprobe format).
#[derive(Debug, Clone, serde::Serialize)]
pub struct FormatInfo {
    /// Format name, e.g. "mov,mp4,m4a,3gp,3g2,mj2"
    pub format_name: String,
    /// Duration in seconds; None if unknown (e.g. raw h264).
    pub duration_sec: Option<f64>,
    /// Total bitrate in bps; 0 if unknown.
    pub bit_rate: i64,
    pub nb_streams: usize,
}

/// Per-stream info (corresponds to ffprobe stream).
#[derive(Debug, Clone, serde::Serialize)]
pub struct StreamInfo {
    pub index: usize,
    pub codec_type: MediaType,
    /// Codec name, e.g. "h264", "aac"
    pub codec_name: String,
    /// e.g. "1/90000"
    pub time_base: String,
    /// e.g. "30/1"
    pub rate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pix_fmt: Option<PixelFormat>,
}

impl From<&StreamDescriptor> for StreamInfo {
    fn from(stream: &StreamDescriptor) -> Self {
        let (width, height) = if stream.is_video() {
            (Some(stream.width), Some(stream.height))
        } else {
            (None, None)
        };
        Self {
            index: stream.index,
            codec_type: stream.media_type,
            codec_name: stream.codec_name.clone(),
            time_base: stream.time_base.to_string(),
            rate: stream.frame_rate.to_string(),
            width,
            height,
            pix_fmt: stream.pixel_format,
        }
    }
}

/// Full probe result (format + streams, like ffprobe).
#[derive(Debug, Clone, serde::Serialize)]
pub struct MediaInfo {
    pub format: FormatInfo,
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    pub fn new(
        format_name: impl Into<String>,
        duration_us: Option<i64>,
        bit_rate: i64,
        streams: &StreamTable,
    ) -> Self {
        Self {
            format: FormatInfo {
                format_name: format_name.into(),
                duration_sec: duration_us.map(|d| d as f64 / 1_000_000.0),
                bit_rate,
                nb_streams: streams.len(),
            },
            streams: streams.iter().map(StreamInfo::from).collect(),
        }
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[FORMAT]")?;
        writeln!(f, "format_name={}", self.format.format_name)?;
        match self.format.duration_sec {
            Some(d) => writeln!(f, "duration_sec={:.3}", d)?,
            None => writeln!(f, "duration_sec=N/A")?,
        }
        writeln!(f, "bit_rate={}", self.format.bit_rate)?;
        writeln!(f, "nb_streams={}", self.format.nb_streams)?;
        writeln!(f, "[/FORMAT]")?;
        for s in &self.streams {
            writeln!(f, "[STREAM]")?;
            writeln!(f, "index={}", s.index)?;
            writeln!(f, "codec_type={}", s.codec_type)?;
            writeln!(f, "codec_name={}", s.codec_name)?;
            writeln!(f, "time_base={}", s.time_base)?;
            writeln!(f, "rate={}", s.rate)?;
            if let Some(w) = s.width {
                writeln!(f, "width={}", w)?;
            }
            if let Some(h) = s.height {
                writeln!(f, "height={}", h)?;
            }
            if let Some(p) = s.pix_fmt {
                writeln!(f, "pix_fmt={}", p)?;
            }
            writeln!(f, "[/STREAM]")?;
        }
        Ok(())
    }
}

/// Opens a file and returns media metadata (similar to ffprobe).
///
/// # Example
///
/// ```ignore
/// let info = ffmpeg_pipe::probe("input.mp4")?;
/// println!("{}", info);
/// ```
#[cfg(feature = "ffmpeg")]
pub fn probe(path: impl AsRef<std::path::Path>) -> crate::Result<MediaInfo> {
    use crate::input::{AvInput, ContainerReader};

    let mut input = AvInput::open(path)?;
    let info = MediaInfo::new(
        input.format_name(),
        input.duration_us(),
        input.bit_rate(),
        input.streams(),
    );
    input.close();
    Ok(info)
}

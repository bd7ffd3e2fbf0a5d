//! Mapping between ffmpeg-next types and the crate's own vocabulary.

use ffmpeg_next::ffi::AVPixelFormat;
use ffmpeg_next::format::Pixel;

use crate::frame::{ColorRange, PictureType, PixelFormat};
use crate::stream::{CodecId, MediaType, Rational};

// the YUVJ layouts are full range; see `color_range_of`
const PIXEL_FORMATS: [(AVPixelFormat, PixelFormat); 11] = [
    (AVPixelFormat::AV_PIX_FMT_YUV420P, PixelFormat::Yuv420p),
    (AVPixelFormat::AV_PIX_FMT_YUVJ420P, PixelFormat::Yuv420p),
    (AVPixelFormat::AV_PIX_FMT_YUV422P, PixelFormat::Yuv422p),
    (AVPixelFormat::AV_PIX_FMT_YUVJ422P, PixelFormat::Yuv422p),
    (AVPixelFormat::AV_PIX_FMT_YUV444P, PixelFormat::Yuv444p),
    (AVPixelFormat::AV_PIX_FMT_YUVJ444P, PixelFormat::Yuv444p),
    (AVPixelFormat::AV_PIX_FMT_NV12, PixelFormat::Nv12),
    (AVPixelFormat::AV_PIX_FMT_GRAY8, PixelFormat::Gray8),
    (AVPixelFormat::AV_PIX_FMT_RGB24, PixelFormat::Rgb24),
    (AVPixelFormat::AV_PIX_FMT_BGR24, PixelFormat::Bgr24),
    (AVPixelFormat::AV_PIX_FMT_RGBA, PixelFormat::Rgba),
];

pub fn rational_from_ffmpeg(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

pub fn media_type_from_ffmpeg(medium: ffmpeg_next::media::Type) -> MediaType {
    use ffmpeg_next::media::Type;

    match medium {
        Type::Video => MediaType::Video,
        Type::Audio => MediaType::Audio,
        Type::Subtitle => MediaType::Subtitle,
        Type::Data | Type::Attachment => MediaType::Data,
        _ => MediaType::Unknown,
    }
}

pub fn codec_id_from_ffmpeg(id: ffmpeg_next::codec::Id) -> CodecId {
    use ffmpeg_next::codec::Id;

    match id {
        Id::H264 => CodecId::H264,
        Id::HEVC => CodecId::Hevc,
        Id::VP8 => CodecId::Vp8,
        Id::VP9 => CodecId::Vp9,
        Id::AV1 => CodecId::Av1,
        Id::MPEG4 => CodecId::Mpeg4,
        Id::MPEG2VIDEO => CodecId::Mpeg2Video,
        Id::RAWVIDEO => CodecId::RawVideo,
        Id::AAC => CodecId::Aac,
        Id::OPUS => CodecId::Opus,
        Id::MP3 => CodecId::Mp3,
        _ => CodecId::Other,
    }
}

pub fn pixel_format_from_ffmpeg(format: Pixel) -> Option<PixelFormat> {
    let raw: AVPixelFormat = format.into();
    pixel_format_from_raw(raw as i32)
}

fn pixel_format_from_raw(raw: i32) -> Option<PixelFormat> {
    PIXEL_FORMATS
        .iter()
        .find(|(av, _)| *av as i32 == raw)
        .map(|(_, format)| *format)
}

pub fn pixel_format_to_ffmpeg(format: PixelFormat) -> Pixel {
    match format {
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Yuv422p => Pixel::YUV422P,
        PixelFormat::Yuv444p => Pixel::YUV444P,
        PixelFormat::Nv12 => Pixel::NV12,
        PixelFormat::Gray8 => Pixel::GRAY8,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Bgr24 => Pixel::BGR24,
        PixelFormat::Rgba => Pixel::RGBA,
    }
}

pub fn color_range_of(frame: &ffmpeg_next::frame::Video) -> ColorRange {
    let jpeg_layout = matches!(
        frame.format(),
        Pixel::YUVJ420P | Pixel::YUVJ422P | Pixel::YUVJ444P
    );
    if jpeg_layout || frame.color_range() == ffmpeg_next::util::color::Range::JPEG {
        ColorRange::Full
    } else {
        ColorRange::Limited
    }
}

pub fn picture_type_from_ffmpeg(kind: ffmpeg_next::picture::Type) -> PictureType {
    use ffmpeg_next::picture::Type;

    match kind {
        Type::I => PictureType::I,
        Type::P => PictureType::P,
        Type::B => PictureType::B,
        _ => PictureType::Other,
    }
}

/// Reads width, height and pixel format from codec parameters (not exposed by ffmpeg-next).
pub fn video_params(params: &ffmpeg_next::codec::Parameters) -> (u32, u32, Option<PixelFormat>) {
    unsafe {
        let ptr = params.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
        let w = (*ptr).width;
        let h = (*ptr).height;
        let format = if params.medium() == ffmpeg_next::media::Type::Video {
            pixel_format_from_raw((*ptr).format)
        } else {
            None
        };
        (w.max(0) as u32, h.max(0) as u32, format)
    }
}

//! Deterministic pixel format conversion.
//!
//! Uses the BT.601 integer matrices, so the same input always yields the same
//! bytes regardless of source stride. YUV output is always limited range.

use crate::error::{PipeError, Result};
use crate::frame::{ColorRange, Picture, PictureRef, PixelFormat, PlaneRef};

/// Converts decoded pictures to a fixed target format.
#[derive(Debug, Clone, Copy)]
pub struct Scaler {
    target: PixelFormat,
}

impl Scaler {
    pub fn new(target: PixelFormat) -> Self {
        Self { target }
    }

    /// Whether `from` can be converted to the target format.
    ///
    /// Every known layout converts to Rgb24, Bgr24 and Yuv420p; other targets
    /// only accept their own format.
    pub fn supports(&self, from: PixelFormat) -> bool {
        from == self.target
            || matches!(
                self.target,
                PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Yuv420p
            )
    }

    /// Whether `src` differs from what the target describes. Full-range YUV
    /// is remapped even when the layout already matches.
    pub fn needs_conversion(&self, src: &PictureRef<'_>) -> bool {
        src.format() != self.target
            || (src.range() == ColorRange::Full && self.target.is_yuv())
    }

    pub fn convert(&self, src: &PictureRef<'_>) -> Result<Picture> {
        if !self.needs_conversion(src) {
            return Ok(src.to_owned_picture());
        }
        if !self.supports(src.format()) {
            return Err(PipeError::unsupported_conversion(src.format(), self.target));
        }
        for format in [src.format(), self.target] {
            if has_empty_chroma(format, src.width(), src.height()) {
                return Err(PipeError::InvalidPicture(format!(
                    "{}x{} leaves no chroma samples for {}",
                    src.width(),
                    src.height(),
                    format
                )));
            }
        }

        let mut dst = Picture::new(src.width(), src.height(), self.target);
        match (is_rgb(src.format()), self.target) {
            (true, PixelFormat::Rgb24 | PixelFormat::Bgr24) => rgb_to_rgb_picture(src, &mut dst),
            (false, PixelFormat::Rgb24 | PixelFormat::Bgr24) => yuv_to_rgb_picture(src, &mut dst),
            (true, _) => rgb_to_yuv420_picture(src, &mut dst),
            (false, _) => yuv_to_yuv420_picture(src, &mut dst),
        }
        dst.set_pts(src.pts());
        dst.set_kind(src.kind());
        dst.set_key(src.is_key());
        Ok(dst)
    }
}

fn is_rgb(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba
    )
}

fn has_empty_chroma(format: PixelFormat, width: u32, height: u32) -> bool {
    if format.chroma_subsampling().is_none() {
        return false;
    }
    let (row_bytes, rows) = format.plane_size(1, width, height);
    row_bytes == 0 || rows == 0
}

enum ChromaLayout<'p, 'a> {
    Planar(&'p PlaneRef<'a>, &'p PlaneRef<'a>),
    Interleaved(&'p PlaneRef<'a>),
    /// Gray pictures carry no chroma.
    Neutral,
}

/// Nearest-sample chroma lookup for every YUV layout.
struct ChromaPlanes<'p, 'a> {
    layout: ChromaLayout<'p, 'a>,
    subsampling: (usize, usize),
    width: usize,
    rows: usize,
}

impl<'p, 'a> ChromaPlanes<'p, 'a> {
    fn new(src: &'p PictureRef<'a>) -> Self {
        let format = src.format();
        let Some(subsampling) = format.chroma_subsampling() else {
            return Self {
                layout: ChromaLayout::Neutral,
                subsampling: (1, 1),
                width: 0,
                rows: 0,
            };
        };
        let (row_bytes, rows) = format.plane_size(1, src.width(), src.height());
        match format {
            PixelFormat::Nv12 => Self {
                layout: ChromaLayout::Interleaved(src.plane(1)),
                subsampling,
                width: row_bytes / 2,
                rows,
            },
            _ => Self {
                layout: ChromaLayout::Planar(src.plane(1), src.plane(2)),
                subsampling,
                width: row_bytes,
                rows,
            },
        }
    }

    /// Chroma sample covering luma position (x, y).
    fn sample(&self, x: usize, y: usize) -> (u8, u8) {
        let cx = (x / self.subsampling.0).min(self.width.saturating_sub(1));
        let cy = (y / self.subsampling.1).min(self.rows.saturating_sub(1));
        match self.layout {
            ChromaLayout::Planar(u, v) => (u.row(cy)[cx], v.row(cy)[cx]),
            ChromaLayout::Interleaved(uv) => {
                let row = uv.row(cy);
                (row[cx * 2], row[cx * 2 + 1])
            }
            ChromaLayout::Neutral => (128, 128),
        }
    }
}

/// Red, green and blue of pixel `x` in one row of a packed RGB layout.
fn rgb_at(format: PixelFormat, row: &[u8], x: usize) -> (i32, i32, i32) {
    let (r, g, b) = match format {
        PixelFormat::Bgr24 => (row[x * 3 + 2], row[x * 3 + 1], row[x * 3]),
        PixelFormat::Rgba => (row[x * 4], row[x * 4 + 1], row[x * 4 + 2]),
        _ => (row[x * 3], row[x * 3 + 1], row[x * 3 + 2]),
    };
    (r as i32, g as i32, b as i32)
}

fn write_rgb(out: &mut [u8], bgr: bool, [r, g, b]: [u8; 3]) {
    if bgr {
        out.copy_from_slice(&[b, g, r]);
    } else {
        out.copy_from_slice(&[r, g, b]);
    }
}

fn yuv_to_rgb_picture(src: &PictureRef<'_>, dst: &mut Picture) {
    let bgr = dst.format() == PixelFormat::Bgr24;
    let matrix: fn(u8, u8, u8) -> [u8; 3] = match src.range() {
        ColorRange::Limited => yuv_to_rgb,
        ColorRange::Full => full_range_yuv_to_rgb,
    };
    let chroma = ChromaPlanes::new(src);
    let luma = src.plane(0);
    let width = src.width() as usize;

    for y in 0..src.height() as usize {
        let luma_row = luma.row(y);
        let out = dst.plane_mut(0).row_mut(y);
        for x in 0..width {
            let (u, v) = chroma.sample(x, y);
            write_rgb(&mut out[x * 3..x * 3 + 3], bgr, matrix(luma_row[x], u, v));
        }
    }
}

fn rgb_to_rgb_picture(src: &PictureRef<'_>, dst: &mut Picture) {
    let bgr = dst.format() == PixelFormat::Bgr24;
    let plane = src.plane(0);
    for y in 0..src.height() as usize {
        let row = plane.row(y);
        let out = dst.plane_mut(0).row_mut(y);
        for x in 0..src.width() as usize {
            let (r, g, b) = rgb_at(src.format(), row, x);
            write_rgb(&mut out[x * 3..x * 3 + 3], bgr, [r as u8, g as u8, b as u8]);
        }
    }
}

fn yuv_to_yuv420_picture(src: &PictureRef<'_>, dst: &mut Picture) {
    let full = src.range() == ColorRange::Full;
    let luma = src.plane(0);
    for y in 0..src.height() as usize {
        let out = dst.plane_mut(0).row_mut(y);
        for (value, &sample) in out.iter_mut().zip(luma.row(y)) {
            *value = if full { luma_to_limited(sample) } else { sample };
        }
    }

    let chroma = ChromaPlanes::new(src);
    let (cw, ch) = PixelFormat::Yuv420p.plane_size(1, src.width(), src.height());
    for cy in 0..ch {
        let mut u_row = vec![0u8; cw];
        let mut v_row = vec![0u8; cw];
        for cx in 0..cw {
            let (mut u_sum, mut v_sum) = (0i32, 0i32);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (u, v) = chroma.sample(cx * 2 + dx, cy * 2 + dy);
                u_sum += u as i32;
                v_sum += v as i32;
            }
            let (u, v) = (clamp((u_sum + 2) >> 2), clamp((v_sum + 2) >> 2));
            u_row[cx] = if full { chroma_to_limited(u) } else { u };
            v_row[cx] = if full { chroma_to_limited(v) } else { v };
        }
        dst.plane_mut(1).row_mut(cy).copy_from_slice(&u_row);
        dst.plane_mut(2).row_mut(cy).copy_from_slice(&v_row);
    }
}

fn rgb_to_yuv420_picture(src: &PictureRef<'_>, dst: &mut Picture) {
    let format = src.format();
    let rgb = src.plane(0);
    let pixel = |x: usize, y: usize| rgb_at(format, rgb.row(y), x);

    let (width, height) = (src.width() as usize, src.height() as usize);
    for y in 0..height {
        let out = dst.plane_mut(0).row_mut(y);
        for (x, luma) in out.iter_mut().enumerate().take(width) {
            let (r, g, b) = pixel(x, y);
            *luma = rgb_to_y(r, g, b);
        }
    }

    let (cw, ch) = PixelFormat::Yuv420p.plane_size(1, src.width(), src.height());
    for cy in 0..ch {
        let mut u_row = vec![0u8; cw];
        let mut v_row = vec![0u8; cw];
        for cx in 0..cw {
            let (mut u_sum, mut v_sum) = (0, 0);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (r, g, b) = pixel(cx * 2 + dx, cy * 2 + dy);
                u_sum += rgb_to_u(r, g, b);
                v_sum += rgb_to_v(r, g, b);
            }
            u_row[cx] = clamp((u_sum + 2) >> 2);
            v_row[cx] = clamp((v_sum + 2) >> 2);
        }
        dst.plane_mut(1).row_mut(cy).copy_from_slice(&u_row);
        dst.plane_mut(2).row_mut(cy).copy_from_slice(&v_row);
    }
}

fn clamp(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

pub(crate) fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}

fn full_range_yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    [
        clamp((256 * c + 359 * e + 128) >> 8),
        clamp((256 * c - 88 * d - 183 * e + 128) >> 8),
        clamp((256 * c + 454 * d + 128) >> 8),
    ]
}

fn luma_to_limited(y: u8) -> u8 {
    clamp(((220 * y as i32 + 128) >> 8) + 16)
}

fn chroma_to_limited(c: u8) -> u8 {
    clamp(((225 * (c as i32 - 128) + 128) >> 8) + 128)
}

fn rgb_to_y(r: i32, g: i32, b: i32) -> u8 {
    clamp(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16)
}

fn rgb_to_u(r: i32, g: i32, b: i32) -> i32 {
    ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128
}

fn rgb_to_v(r: i32, g: i32, b: i32) -> i32 {
    ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PictureType;

    /// A 4:2:0 picture with a luma ramp and chroma constant per 2x2 block.
    fn yuv_picture(width: u32, height: u32, padding: usize) -> Picture {
        let mut picture = Picture::with_padding(width, height, PixelFormat::Yuv420p, padding);
        for y in 0..height as usize {
            for (x, value) in picture.plane_mut(0).row_mut(y).iter_mut().enumerate() {
                *value = (60 + (x * 7 + y * 13) % 140) as u8;
            }
        }
        let (cw, ch) = PixelFormat::Yuv420p.plane_size(1, width, height);
        for cy in 0..ch {
            for cx in 0..cw {
                picture.plane_mut(1).row_mut(cy)[cx] = (118 + (cx * 3 + cy) % 20) as u8;
                picture.plane_mut(2).row_mut(cy)[cx] = (118 + (cx + cy * 5) % 20) as u8;
            }
        }
        picture
    }

    #[test]
    fn reference_levels() {
        assert_eq!(yuv_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(yuv_to_rgb(235, 128, 128), [255, 255, 255]);
        assert_eq!(yuv_to_rgb(255, 255, 255), [255, 125, 255]);
        assert_eq!(yuv_to_rgb(0, 0, 0), [0, 135, 0]);
    }

    #[test]
    fn output_does_not_depend_on_source_stride() {
        let tight = yuv_picture(8, 6, 0);
        let padded = yuv_picture(8, 6, 13);
        let scaler = Scaler::new(PixelFormat::Rgb24);

        let a = scaler.convert(&tight.as_view()).unwrap();
        let b = scaler.convert(&padded.as_view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn conversion_is_deterministic() {
        let picture = yuv_picture(16, 8, 3);
        let scaler = Scaler::new(PixelFormat::Rgb24);
        let first = scaler.convert(&picture.as_view()).unwrap();
        for _ in 0..3 {
            assert_eq!(scaler.convert(&picture.as_view()).unwrap(), first);
        }
    }

    #[test]
    fn bgr_is_rgb_reversed() {
        let picture = yuv_picture(6, 4, 0);
        let rgb = Scaler::new(PixelFormat::Rgb24)
            .convert(&picture.as_view())
            .unwrap();
        let bgr = Scaler::new(PixelFormat::Bgr24)
            .convert(&picture.as_view())
            .unwrap();
        for (a, b) in rgb.planes()[0]
            .data()
            .chunks(3)
            .zip(bgr.planes()[0].data().chunks(3))
        {
            assert_eq!([a[0], a[1], a[2]], [b[2], b[1], b[0]]);
        }
    }

    #[test]
    fn nv12_matches_planar() {
        let planar = yuv_picture(8, 4, 0);
        let mut nv12 = Picture::new(8, 4, PixelFormat::Nv12);
        for y in 0..4 {
            nv12.plane_mut(0)
                .row_mut(y)
                .copy_from_slice(planar.planes()[0].row(y));
        }
        for cy in 0..2 {
            let u = planar.planes()[1].row(cy).to_vec();
            let v = planar.planes()[2].row(cy).to_vec();
            let row = nv12.plane_mut(1).row_mut(cy);
            for cx in 0..4 {
                row[cx * 2] = u[cx];
                row[cx * 2 + 1] = v[cx];
            }
        }

        let scaler = Scaler::new(PixelFormat::Rgb24);
        assert_eq!(
            scaler.convert(&planar.as_view()).unwrap().planes(),
            scaler.convert(&nv12.as_view()).unwrap().planes()
        );
    }

    #[test]
    fn round_trip_stays_within_two_levels() {
        let source = yuv_picture(16, 10, 0);
        let rgb = Scaler::new(PixelFormat::Rgb24)
            .convert(&source.as_view())
            .unwrap();
        let back = Scaler::new(PixelFormat::Yuv420p)
            .convert(&rgb.as_view())
            .unwrap();

        for (plane, (a, b)) in source.planes().iter().zip(back.planes()).enumerate() {
            for (i, (x, y)) in a.data().iter().zip(b.data()).enumerate() {
                let diff = (*x as i32 - *y as i32).abs();
                assert!(diff <= 2, "plane {plane} sample {i}: {x} vs {y}");
            }
        }
    }

    #[test]
    fn gray_rgb_has_neutral_chroma() {
        let mut gray = Picture::new(4, 4, PixelFormat::Rgb24);
        gray.plane_mut(0).fill(128);
        let yuv = Scaler::new(PixelFormat::Yuv420p)
            .convert(&gray.as_view())
            .unwrap();
        assert!(yuv.planes()[0].data().iter().all(|&v| v == 126));
        assert!(yuv.planes()[1].data().iter().all(|&v| v == 128));
        assert!(yuv.planes()[2].data().iter().all(|&v| v == 128));
    }

    #[test]
    fn odd_dimensions_reuse_last_chroma_sample() {
        let picture = yuv_picture(5, 3, 2);
        let rgb = Scaler::new(PixelFormat::Rgb24)
            .convert(&picture.as_view())
            .unwrap();
        assert_eq!((rgb.width(), rgb.height()), (5, 3));

        let expected = yuv_to_rgb(
            picture.planes()[0].row(2)[4],
            picture.planes()[1].row(0)[1],
            picture.planes()[2].row(0)[1],
        );
        assert_eq!(&rgb.planes()[0].row(2)[12..15], &expected);
    }

    #[test]
    fn identity_conversion_packs_tightly() {
        let mut picture = yuv_picture(6, 4, 5);
        picture.set_pts(Some(42));
        picture.set_kind(PictureType::P);
        let copy = Scaler::new(PixelFormat::Yuv420p)
            .convert(&picture.as_view())
            .unwrap();
        assert_eq!(copy.planes()[0].stride(), 6);
        assert_eq!(copy.pts(), Some(42));
        assert_eq!(copy.kind(), PictureType::P);
        assert_eq!(copy, picture.as_view().to_owned_picture());
    }

    #[test]
    fn metadata_survives_conversion() {
        let mut picture = yuv_picture(4, 4, 0);
        picture.set_pts(Some(7));
        picture.set_kind(PictureType::I);
        picture.set_key(true);
        let rgb = Scaler::new(PixelFormat::Rgb24)
            .convert(&picture.as_view())
            .unwrap();
        assert_eq!(rgb.pts(), Some(7));
        assert_eq!(rgb.kind(), PictureType::I);
        assert!(rgb.is_key());
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        let rgb = Picture::new(4, 4, PixelFormat::Rgb24);
        let err = Scaler::new(PixelFormat::Nv12)
            .convert(&rgb.as_view())
            .unwrap_err();
        assert!(matches!(err, PipeError::UnsupportedConversion { .. }));

        let yuv = Picture::new(4, 4, PixelFormat::Yuv420p);
        assert!(!Scaler::new(PixelFormat::Yuv444p).supports(PixelFormat::Yuv420p));
        assert!(
            Scaler::new(PixelFormat::Yuv444p)
                .convert(&yuv.as_view())
                .is_err()
        );
    }

    /// Upsamples a 4:2:0 picture's chroma into `format` without changing values.
    fn upsampled(source: &Picture, format: PixelFormat) -> Picture {
        let (width, height) = (source.width(), source.height());
        let (sx, sy) = format.chroma_subsampling().unwrap();
        let mut picture = Picture::new(width, height, format);
        for y in 0..height as usize {
            picture
                .plane_mut(0)
                .row_mut(y)
                .copy_from_slice(source.planes()[0].row(y));
        }
        let (cw, ch) = format.plane_size(1, width, height);
        for plane in 1..3 {
            for cy in 0..ch {
                for cx in 0..cw {
                    let value = source.planes()[plane].row(cy * sy / 2)[cx * sx / 2];
                    picture.plane_mut(plane).row_mut(cy)[cx] = value;
                }
            }
        }
        picture
    }

    #[test]
    fn denser_chroma_layouts_match_420_when_chroma_agrees() {
        let source = yuv_picture(8, 6, 0);
        for format in [PixelFormat::Yuv422p, PixelFormat::Yuv444p] {
            let dense = upsampled(&source, format);
            for target in [PixelFormat::Rgb24, PixelFormat::Yuv420p] {
                let scaler = Scaler::new(target);
                assert_eq!(
                    scaler.convert(&dense.as_view()).unwrap().planes(),
                    scaler.convert(&source.as_view()).unwrap().planes(),
                    "{format} to {target}"
                );
            }
        }
    }

    #[test]
    fn yuv422_chroma_averages_row_pairs() {
        let mut picture = Picture::new(2, 2, PixelFormat::Yuv422p);
        picture.plane_mut(0).fill(100);
        picture.plane_mut(1).row_mut(0)[0] = 100;
        picture.plane_mut(1).row_mut(1)[0] = 103;
        picture.plane_mut(2).row_mut(0)[0] = 140;
        picture.plane_mut(2).row_mut(1)[0] = 150;

        let yuv = Scaler::new(PixelFormat::Yuv420p)
            .convert(&picture.as_view())
            .unwrap();
        assert_eq!(yuv.planes()[0].data(), &[100, 100, 100, 100]);
        assert_eq!(yuv.planes()[1].data(), &[102]);
        assert_eq!(yuv.planes()[2].data(), &[145]);
    }

    #[test]
    fn yuv444_chroma_averages_blocks() {
        let mut picture = Picture::new(2, 2, PixelFormat::Yuv444p);
        picture.plane_mut(1).row_mut(0).copy_from_slice(&[10, 20]);
        picture.plane_mut(1).row_mut(1).copy_from_slice(&[30, 41]);
        picture.plane_mut(2).fill(200);

        let yuv = Scaler::new(PixelFormat::Yuv420p)
            .convert(&picture.as_view())
            .unwrap();
        assert_eq!(yuv.planes()[1].data(), &[25]);
        assert_eq!(yuv.planes()[2].data(), &[200]);
    }

    #[test]
    fn nv12_to_yuv420_deinterleaves() {
        let planar = yuv_picture(8, 4, 0);
        let mut nv12 = Picture::with_padding(8, 4, PixelFormat::Nv12, 5);
        for y in 0..4 {
            nv12.plane_mut(0)
                .row_mut(y)
                .copy_from_slice(planar.planes()[0].row(y));
        }
        for cy in 0..2 {
            let u = planar.planes()[1].row(cy).to_vec();
            let v = planar.planes()[2].row(cy).to_vec();
            let row = nv12.plane_mut(1).row_mut(cy);
            for cx in 0..4 {
                row[cx * 2] = u[cx];
                row[cx * 2 + 1] = v[cx];
            }
        }

        let yuv = Scaler::new(PixelFormat::Yuv420p)
            .convert(&nv12.as_view())
            .unwrap();
        assert_eq!(yuv, planar);
    }

    #[test]
    fn gray_has_neutral_chroma() {
        let mut gray = Picture::new(4, 2, PixelFormat::Gray8);
        gray.plane_mut(0).fill(235);

        let yuv = Scaler::new(PixelFormat::Yuv420p)
            .convert(&gray.as_view())
            .unwrap();
        assert!(yuv.planes()[0].data().iter().all(|&v| v == 235));
        assert!(yuv.planes()[1].data().iter().all(|&v| v == 128));
        assert!(yuv.planes()[2].data().iter().all(|&v| v == 128));

        let rgb = Scaler::new(PixelFormat::Rgb24)
            .convert(&gray.as_view())
            .unwrap();
        assert!(rgb.planes()[0].data().iter().all(|&v| v == 255));
    }

    #[test]
    fn packed_rgb_layouts_convert_between_each_other() {
        let mut rgba = Picture::new(2, 2, PixelFormat::Rgba);
        rgba.plane_mut(0)
            .row_mut(0)
            .copy_from_slice(&[1, 2, 3, 255, 4, 5, 6, 255]);
        rgba.plane_mut(0)
            .row_mut(1)
            .copy_from_slice(&[7, 8, 9, 0, 10, 11, 12, 0]);

        let bgr = Scaler::new(PixelFormat::Bgr24)
            .convert(&rgba.as_view())
            .unwrap();
        assert_eq!(bgr.planes()[0].row(0), &[3, 2, 1, 6, 5, 4]);

        let rgb = Scaler::new(PixelFormat::Rgb24)
            .convert(&bgr.as_view())
            .unwrap();
        assert_eq!(rgb.planes()[0].row(1), &[7, 8, 9, 10, 11, 12]);

        // alpha does not affect the YUV result
        let to_yuv = Scaler::new(PixelFormat::Yuv420p);
        assert_eq!(
            to_yuv.convert(&rgba.as_view()).unwrap(),
            to_yuv.convert(&rgb.as_view()).unwrap()
        );
    }

    #[test]
    fn full_range_levels() {
        assert_eq!(full_range_yuv_to_rgb(0, 128, 128), [0, 0, 0]);
        assert_eq!(full_range_yuv_to_rgb(255, 128, 128), [255, 255, 255]);
        assert_eq!(luma_to_limited(0), 16);
        assert_eq!(luma_to_limited(255), 235);
        assert_eq!(chroma_to_limited(0), 16);
        assert_eq!(chroma_to_limited(128), 128);
        assert_eq!(chroma_to_limited(255), 240);
    }

    #[test]
    fn full_range_source_is_remapped() {
        let mut picture = Picture::new(2, 2, PixelFormat::Yuv420p);
        picture.set_range(ColorRange::Full);
        picture.plane_mut(0).row_mut(0).copy_from_slice(&[0, 255]);
        picture.plane_mut(0).row_mut(1).copy_from_slice(&[255, 0]);
        picture.plane_mut(1).fill(128);
        picture.plane_mut(2).fill(128);

        let rgb = Scaler::new(PixelFormat::Rgb24)
            .convert(&picture.as_view())
            .unwrap();
        assert_eq!(rgb.planes()[0].row(0), &[0, 0, 0, 255, 255, 255]);

        let scaler = Scaler::new(PixelFormat::Yuv420p);
        assert!(scaler.needs_conversion(&picture.as_view()));
        let limited = scaler.convert(&picture.as_view()).unwrap();
        assert_eq!(limited.range(), ColorRange::Limited);
        assert_eq!(limited.planes()[0].data(), &[16, 235, 235, 16]);
        assert_eq!(limited.planes()[1].data(), &[128]);
        assert!(!scaler.needs_conversion(&limited.as_view()));
    }

    #[test]
    fn degenerate_size_is_rejected() {
        let picture = Picture::new(1, 4, PixelFormat::Yuv420p);
        let err = Scaler::new(PixelFormat::Rgb24)
            .convert(&picture.as_view())
            .unwrap_err();
        assert!(matches!(err, PipeError::InvalidPicture(_)));

        let rgb = Picture::new(3, 1, PixelFormat::Rgb24);
        assert!(
            Scaler::new(PixelFormat::Yuv420p)
                .convert(&rgb.as_view())
                .is_err()
        );
        // no chroma on either side
        let gray = Picture::new(1, 1, PixelFormat::Gray8);
        assert!(Scaler::new(PixelFormat::Rgb24).convert(&gray.as_view()).is_ok());
    }
}

use std::fmt::{Display, Formatter};

use crate::error::{PipeError, Result};

/// Raw pixel layouts the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Planar Y, U, V with chroma at half width and half height.
    Yuv420p,
    /// Planar Y, U, V with chroma at half width.
    Yuv422p,
    /// Planar Y, U, V at full resolution.
    Yuv444p,
    /// Y plane followed by one interleaved UV plane at half resolution.
    Nv12,
    Gray8,
    Rgb24,
    Bgr24,
    Rgba,
}

impl PixelFormat {
    pub fn plane_count(self) -> usize {
        match self {
            PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => 3,
            PixelFormat::Nv12 => 2,
            PixelFormat::Gray8 | PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba => 1,
        }
    }

    /// Logical bytes per row and number of rows of `plane` for a `width`x`height` picture.
    ///
    /// Subsampled chroma dimensions round down.
    pub fn plane_size(self, plane: usize, width: u32, height: u32) -> (usize, usize) {
        let (w, h) = (width as usize, height as usize);
        match (self, plane) {
            (PixelFormat::Yuv420p, 0) | (PixelFormat::Yuv422p, 0) | (PixelFormat::Nv12, 0) => {
                (w, h)
            }
            (PixelFormat::Yuv420p, _) => (w / 2, h / 2),
            (PixelFormat::Yuv422p, _) => (w / 2, h),
            (PixelFormat::Yuv444p, _) | (PixelFormat::Gray8, _) => (w, h),
            (PixelFormat::Nv12, _) => ((w / 2) * 2, h / 2),
            (PixelFormat::Rgb24, _) | (PixelFormat::Bgr24, _) => (w * 3, h),
            (PixelFormat::Rgba, _) => (w * 4, h),
        }
    }

    /// Horizontal and vertical chroma subsampling factors of the YUV layouts.
    pub fn chroma_subsampling(self) -> Option<(usize, usize)> {
        match self {
            PixelFormat::Yuv420p | PixelFormat::Nv12 => Some((2, 2)),
            PixelFormat::Yuv422p => Some((2, 1)),
            PixelFormat::Yuv444p => Some((1, 1)),
            PixelFormat::Gray8 | PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Rgba => {
                None
            }
        }
    }

    pub fn is_yuv(self) -> bool {
        matches!(
            self,
            PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p | PixelFormat::Nv12
        )
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Gray8 => "gray",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Rgba => "rgba",
        };
        f.write_str(name)
    }
}

/// Sample range of YUV data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorRange {
    /// Luma 16-235, chroma 16-240.
    #[default]
    Limited,
    /// All 256 levels, as produced by JPEG-style sources.
    Full,
}

/// Coding type the decoder reported for a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PictureType {
    I,
    P,
    B,
    #[default]
    Other,
}

impl Display for PictureType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PictureType::I => "I",
            PictureType::P => "P",
            PictureType::B => "B",
            PictureType::Other => "Other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One borrowed plane. `stride` may exceed `row_bytes`.
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    data: &'a [u8],
    stride: usize,
    row_bytes: usize,
    rows: usize,
}

impl<'a> PlaneRef<'a> {
    pub fn new(data: &'a [u8], stride: usize, row_bytes: usize, rows: usize) -> Result<Self> {
        if stride < row_bytes {
            return Err(PipeError::InvalidPicture(format!(
                "stride {} is smaller than row width {}",
                stride, row_bytes
            )));
        }
        let needed = if rows == 0 {
            0
        } else {
            stride * (rows - 1) + row_bytes
        };
        if data.len() < needed {
            return Err(PipeError::InvalidPicture(format!(
                "plane holds {} bytes, {} rows of stride {} need {}",
                data.len(),
                rows,
                stride,
                needed
            )));
        }
        Ok(Self {
            data,
            stride,
            row_bytes,
            rows,
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical bytes of row `y`, without padding.
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.row_bytes]
    }
}

/// Borrowed view of a raw picture.
///
/// A view handed out by a decoder is only valid until the next call on that
/// decoder; copy it with [`PictureRef::to_owned_picture`] to keep it longer.
#[derive(Debug, Clone)]
pub struct PictureRef<'a> {
    width: u32,
    height: u32,
    format: PixelFormat,
    planes: Vec<PlaneRef<'a>>,
    range: ColorRange,
    pts: Option<i64>,
    kind: PictureType,
    is_key: bool,
}

impl<'a> PictureRef<'a> {
    /// Builds a view from `(data, stride)` pairs, one per plane of `format`.
    pub fn from_planes(
        width: u32,
        height: u32,
        format: PixelFormat,
        planes: &[(&'a [u8], usize)],
    ) -> Result<Self> {
        if planes.len() != format.plane_count() {
            return Err(PipeError::InvalidPicture(format!(
                "{} expects {} planes, got {}",
                format,
                format.plane_count(),
                planes.len()
            )));
        }
        let planes = planes
            .iter()
            .enumerate()
            .map(|(index, &(data, stride))| {
                let (row_bytes, rows) = format.plane_size(index, width, height);
                PlaneRef::new(data, stride, row_bytes, rows)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            width,
            height,
            format,
            planes,
            range: ColorRange::Limited,
            pts: None,
            kind: PictureType::Other,
            is_key: false,
        })
    }

    pub fn with_pts(mut self, pts: Option<i64>) -> Self {
        self.pts = pts;
        self
    }

    pub fn with_range(mut self, range: ColorRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_kind(mut self, kind: PictureType) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn range(&self) -> ColorRange {
        self.range
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn kind(&self) -> PictureType {
        self.kind
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn planes(&self) -> &[PlaneRef<'a>] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> &PlaneRef<'a> {
        &self.planes[index]
    }

    /// Copies the view into tightly packed owned storage.
    pub fn to_owned_picture(&self) -> Picture {
        let planes = self
            .planes
            .iter()
            .map(|plane| {
                let mut data = Vec::with_capacity(plane.row_bytes * plane.rows);
                for y in 0..plane.rows {
                    data.extend_from_slice(plane.row(y));
                }
                Plane {
                    data,
                    stride: plane.row_bytes,
                    row_bytes: plane.row_bytes,
                    rows: plane.rows,
                }
            })
            .collect();

        Picture {
            width: self.width,
            height: self.height,
            format: self.format,
            planes,
            range: self.range,
            pts: self.pts,
            kind: self.kind,
            is_key: self.is_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    stride: usize,
    row_bytes: usize,
    rows: usize,
}

impl Plane {
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.row_bytes]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        &mut self.data[start..start + self.row_bytes]
    }

    /// Sets every logical sample of the plane, leaving padding untouched.
    pub fn fill(&mut self, value: u8) {
        for y in 0..self.rows {
            self.row_mut(y).fill(value);
        }
    }
}

/// An owned raw picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    width: u32,
    height: u32,
    format: PixelFormat,
    planes: Vec<Plane>,
    range: ColorRange,
    pts: Option<i64>,
    kind: PictureType,
    is_key: bool,
}

impl Picture {
    /// Allocates a zeroed, tightly packed picture.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::with_padding(width, height, format, 0)
    }

    /// Allocates a zeroed picture whose rows carry `padding` extra bytes.
    pub fn with_padding(width: u32, height: u32, format: PixelFormat, padding: usize) -> Self {
        let planes = (0..format.plane_count())
            .map(|index| {
                let (row_bytes, rows) = format.plane_size(index, width, height);
                let stride = row_bytes + padding;
                Plane {
                    data: vec![0; stride * rows],
                    stride,
                    row_bytes,
                    rows,
                }
            })
            .collect();

        Self {
            width,
            height,
            format,
            planes,
            range: ColorRange::Limited,
            pts: None,
            kind: PictureType::Other,
            is_key: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn range(&self) -> ColorRange {
        self.range
    }

    pub fn set_range(&mut self, range: ColorRange) {
        self.range = range;
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    pub fn kind(&self) -> PictureType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: PictureType) {
        self.kind = kind;
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn set_key(&mut self, is_key: bool) {
        self.is_key = is_key;
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    pub fn as_view(&self) -> PictureRef<'_> {
        let planes = self
            .planes
            .iter()
            .map(|plane| PlaneRef {
                data: &plane.data,
                stride: plane.stride,
                row_bytes: plane.row_bytes,
                rows: plane.rows,
            })
            .collect();

        PictureRef {
            width: self.width,
            height: self.height,
            format: self.format,
            planes,
            range: self.range,
            pts: self.pts,
            kind: self.kind,
            is_key: self.is_key,
        }
    }
}

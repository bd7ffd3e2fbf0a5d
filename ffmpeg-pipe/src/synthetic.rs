//! Generated raw pictures for exercising the encoder without an input file.

use crate::frame::{Geometry, Picture, PictureType, PixelFormat};

/// Yields `count` flat 4:2:0 pictures: luma equals the picture index
/// (wrapping at 256) and both chroma planes are neutral.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    geometry: Geometry,
    count: u64,
    next: u64,
    padding: usize,
}

impl SyntheticSource {
    pub fn new(geometry: Geometry, count: u64) -> Self {
        Self {
            geometry,
            count,
            next: 0,
            padding: 0,
        }
    }

    /// Adds `padding` bytes to every row, like decoder-allocated frames.
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }
}

impl Iterator for SyntheticSource {
    type Item = Picture;

    fn next(&mut self) -> Option<Picture> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let mut picture = Picture::with_padding(
            self.geometry.width,
            self.geometry.height,
            PixelFormat::Yuv420p,
            self.padding,
        );
        picture.plane_mut(0).fill((index % 256) as u8);
        picture.plane_mut(1).fill(128);
        picture.plane_mut(2).fill(128);
        picture.set_pts(Some(index as i64));
        picture.set_kind(PictureType::Other);
        Some(picture)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.count - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for SyntheticSource {}

use crate::error::MomentError;

/// Borrowed channel-major cube: element `(c, r, col)` lives at
/// `c * height * width + r * width + col`.
#[derive(Copy, Clone, Debug)]
pub struct CubeView<'a> {
    data: &'a [f32],
    channels: usize,
    height: usize,
    width: usize,
}

impl<'a> CubeView<'a> {
    pub fn new(
        data: &'a [f32],
        channels: usize,
        height: usize,
        width: usize,
    ) -> Result<Self, MomentError> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(MomentError::InvalidDimensions {
                channels,
                height,
                width,
            });
        }
        let expected = channels
            .checked_mul(height)
            .and_then(|n| n.checked_mul(width))
            .ok_or(MomentError::InvalidDimensions {
                channels,
                height,
                width,
            })?;
        if data.len() != expected {
            return Err(MomentError::DataLengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            channels,
            height,
            width,
        })
    }

    #[inline(always)]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn pixels(&self) -> usize {
        self.height * self.width
    }

    /// The `height * width` plane of channel `c`.
    #[inline(always)]
    pub fn plane(&self, c: usize) -> &'a [f32] {
        let n = self.pixels();
        &self.data[c * n..(c + 1) * n]
    }

    /// Channel stack of one pixel, strided by the plane size.
    pub fn spectrum(&self, pixel: usize) -> impl Iterator<Item = f32> + 'a {
        let data: &'a [f32] = self.data;
        data.iter().skip(pixel).step_by(self.pixels()).copied()
    }

    /// Channels `start..end` as a cube of their own. The planes are
    /// contiguous, so no data is copied. Returns `None` for an empty range.
    pub fn channel_range(&self, start: usize, end: usize) -> Option<CubeView<'a>> {
        let end = end.min(self.channels);
        if start >= end {
            return None;
        }
        let n = self.pixels();
        Some(CubeView {
            data: &self.data[start * n..end * n],
            channels: end - start,
            height: self.height,
            width: self.width,
        })
    }
}

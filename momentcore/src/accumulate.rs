//! Per-pixel running sums along the channel axis.
//!
//! All accumulation happens in `f64`; a NaN sample is a masked channel and
//! contributes to none of the sums. Coordinates enter the weighted sums as
//! offsets from a fixed origin (the first channel's coordinate), which keeps
//! `E[d²] - E[d]²` from cancelling catastrophically on large axis values.

#[inline(always)]
pub fn update_mass(sum_i: &mut f64, value: f32) {
    if !value.is_nan() {
        *sum_i += value as f64;
    }
}

#[inline(always)]
pub fn update_weighted(sum_i: &mut f64, sum_id: &mut f64, value: f32, offset: f64) {
    if !value.is_nan() {
        let value = value as f64;
        *sum_i += value;
        *sum_id += value * offset;
    }
}

#[inline(always)]
pub fn update_full(
    sum_i: &mut f64,
    sum_id: &mut f64,
    sum_id2: &mut f64,
    samples: &mut u32,
    value: f32,
    offset: f64,
) {
    if !value.is_nan() {
        let value = value as f64;
        *sum_i += value;
        *sum_id += value * offset;
        *sum_id2 += value * (offset * offset);
        *samples += 1;
    }
}

/// Finished sums for one pixel: Σi, Σi·d and Σi·d² with `d = v - origin`,
/// plus the number of unmasked samples when moment 2 is tracked.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelSums {
    pub origin: f64,
    pub sum_i: f64,
    pub sum_id: f64,
    pub sum_id2: f64,
    pub samples: u32,
}

impl PixelSums {
    #[inline(always)]
    pub fn new(origin: f64, sum_i: f64, sum_id: f64, sum_id2: f64, samples: u32) -> Self {
        Self {
            origin,
            sum_i,
            sum_id,
            sum_id2,
            samples,
        }
    }

    /// Zero total mass, either true zero flux or every channel masked.
    #[inline(always)]
    pub fn is_degenerate(&self) -> bool {
        self.sum_i == 0.0
    }

    #[inline(always)]
    pub fn moment0(&self, dv: f64) -> f32 {
        if self.is_degenerate() {
            0.0
        } else {
            (self.sum_i * dv) as f32
        }
    }

    #[inline(always)]
    pub fn moment1(&self) -> f32 {
        if self.is_degenerate() {
            f32::NAN
        } else {
            (self.origin + self.sum_id / self.sum_i) as f32
        }
    }

    /// Dispersion from `E[d²] - E[d]²`.
    ///
    /// A lone unmasked sample has no spread. Cancellation can leave a tiny
    /// negative variance when the true spread is ~0; that is clamped to zero
    /// before the square root.
    #[inline(always)]
    pub fn moment2(&self) -> f32 {
        if self.is_degenerate() {
            return f32::NAN;
        }
        if self.samples == 1 {
            return 0.0;
        }
        let mean = self.sum_id / self.sum_i;
        let variance = self.sum_id2 / self.sum_i - mean * mean;
        if variance < 0.0 {
            0.0
        } else {
            variance.sqrt() as f32
        }
    }
}

/// Σ i·(v - m1)² over one pixel's channel stack, the second sweep of the
/// two-pass formulation. `m1` is the already rounded moment 1 value.
#[inline]
pub fn centered_square_sum<I>(samples: I, m1: f32) -> f64
where
    I: IntoIterator<Item = (f32, f32)>,
{
    let m1 = m1 as f64;
    let mut acc = 0.0;
    for (value, coord) in samples {
        if !value.is_nan() {
            let diff = coord as f64 - m1;
            acc += value as f64 * (diff * diff);
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_samples_are_skipped() {
        let (mut i, mut id, mut id2, mut n) = (0.0, 0.0, 0.0, 0u32);
        for (value, offset) in [(1.0f32, 2.0f64), (f32::NAN, 100.0), (3.0, 4.0)] {
            update_full(&mut i, &mut id, &mut id2, &mut n, value, offset);
        }
        assert_eq!(i, 4.0);
        assert_eq!(id, 14.0);
        assert_eq!(id2, 52.0);
        assert_eq!(n, 2);

        let mut mass = 0.0;
        update_mass(&mut mass, f32::NAN);
        update_mass(&mut mass, 2.5);
        assert_eq!(mass, 2.5);
    }

    #[test]
    fn degenerate_pixel_yields_zero_and_nan() {
        let sums = PixelSums::default();
        assert_eq!(sums.moment0(2.0), 0.0);
        assert!(sums.moment1().is_nan());
        assert!(sums.moment2().is_nan());

        // cancelling intensities are still zero mass
        let (mut i, mut id) = (0.0, 0.0);
        update_weighted(&mut i, &mut id, 1.0, 3.0);
        update_weighted(&mut i, &mut id, -1.0, 5.0);
        let sums = PixelSums::new(0.0, i, id, 0.0, 2);
        assert!(sums.is_degenerate());
        assert!(sums.moment1().is_nan());
    }

    #[test]
    fn negative_variance_is_clamped() {
        let sums = PixelSums::new(0.0, 1.0, 2.0, 3.999_999, 3);
        assert_eq!(sums.moment2(), 0.0);
    }

    #[test]
    fn lone_sample_has_no_spread() {
        // 1.3 * 7.77² does not round-trip through the variance identity
        let (mut i, mut id, mut id2, mut n) = (0.0, 0.0, 0.0, 0u32);
        update_full(&mut i, &mut id, &mut id2, &mut n, 1.3, -7.77f32 as f64 - 1e4);
        let sums = PixelSums::new(1e4, i, id, id2, n);
        assert_eq!(sums.moment2(), 0.0);
    }

    #[test]
    fn moments_from_sums() {
        // intensities [1, 1] at v = [10, 12], origin 10
        let sums = PixelSums::new(10.0, 2.0, 2.0, 4.0, 2);
        assert_eq!(sums.moment0(0.5), 1.0);
        assert_eq!(sums.moment1(), 11.0);
        assert_eq!(sums.moment2(), 1.0);
    }

    #[test]
    fn centered_sum_matches_identity() {
        let samples = [(1.0f32, 0.0f32), (2.0, 1.0), (f32::NAN, 9.0), (1.0, 2.0)];
        let acc = centered_square_sum(samples, 1.0);
        assert_eq!(acc, 2.0);
    }
}

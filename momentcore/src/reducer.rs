//! # Moment Reducer
//!
//! Collapses the channel axis of a cube into moment 0 (integrated intensity),
//! moment 1 (intensity-weighted mean coordinate) and moment 2
//! (intensity-weighted dispersion) for every pixel.
//!
//! ## Strategies
//! - **single pass** (production): sweeps channel-major, adding each plane
//!   into per-pixel `f64` accumulators, then finalizes with
//!   `Var = E[d²] - E[d]²` where `d = v - v[0]`. Every input element is read
//!   once and planes are read contiguously. Needs `height * width` scratch
//!   per accumulator.
//! - **two pass** (reference): walks each pixel's channel stack twice, once
//!   for Σi and Σi·v, once for Σi·(v - m1)². No accumulator scratch.
//!
//! ## Parallelism
//! The pixel index space is cut into contiguous tiles. One task owns a tile
//! of every accumulator and every output for the whole channel loop, so the
//! hot path needs no synchronization. Each pixel's sums are formed in channel
//! order regardless of tiling, so results do not depend on the thread count.
//!
//! ## Failure
//! Scratch and tile bookkeeping are reserved before any output is touched;
//! if that fails the call returns `AllocationFailed` and the outputs are left
//! as they were.

use crate::accumulate::{self, PixelSums};
use crate::cube::CubeView;
use crate::error::MomentError;
use crate::moments::{MomentOutputs, MomentSelection};
use crate::strategy::Strategy;
use log::{debug, warn};
use rayon::prelude::*;
use std::mem::size_of;
use std::time::Instant;

#[derive(Copy, Clone, Debug)]
pub struct ReduceOptions {
    pub strategy: Strategy,
    pub parallel: bool,
    /// Lower bound on tile size; small tiles are not worth a task.
    pub min_pixels_per_task: usize,
    /// Cap on single-pass accumulator scratch. `None` leaves it to the
    /// allocator.
    pub max_scratch_bytes: Option<usize>,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::SinglePass,
            parallel: true,
            min_pixels_per_task: 4096,
            max_scratch_bytes: None,
        }
    }
}

impl ReduceOptions {
    #[inline]
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    #[inline]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[inline]
    pub fn with_min_pixels_per_task(mut self, n: usize) -> Self {
        self.min_pixels_per_task = n;
        self
    }

    #[inline]
    pub fn with_max_scratch_bytes(mut self, bytes: usize) -> Self {
        self.max_scratch_bytes = Some(bytes);
        self
    }

    fn tile_len(&self, pixels: usize) -> usize {
        let min = self.min_pixels_per_task.max(1);
        let len = if self.parallel {
            pixels.div_ceil(rayon::current_num_threads().max(1)).max(min)
        } else {
            min
        };
        len.min(pixels)
    }
}

/// Disjoint slice of every requested output map, starting at pixel `offset`.
struct OutputTile<'s> {
    offset: usize,
    len: usize,
    mom0: Option<&'s mut [f32]>,
    mom1: Option<&'s mut [f32]>,
    mom2: Option<&'s mut [f32]>,
}

impl OutputTile<'_> {
    #[inline(always)]
    fn write(&mut self, i: usize, sums: &PixelSums, dv: f64) {
        if let Some(m0) = self.mom0.as_deref_mut() {
            m0[i] = sums.moment0(dv);
        }
        if let Some(m1) = self.mom1.as_deref_mut() {
            m1[i] = sums.moment1();
        }
        if let Some(m2) = self.mom2.as_deref_mut() {
            m2[i] = sums.moment2();
        }
    }
}

/// Accumulator tile matching an `OutputTile`.
struct SumTile<'s> {
    sum_i: &'s mut [f64],
    sum_id: Option<&'s mut [f64]>,
    sum_id2: Option<&'s mut [f64]>,
    samples: Option<&'s mut [u32]>,
}

/// Empty vector with room for `len` items, reported as an error instead of
/// aborting when the allocator refuses.
fn try_vec<T>(len: usize) -> Result<Vec<T>, MomentError> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(len).is_err() {
        let bytes = len.saturating_mul(size_of::<T>());
        warn!("moments: allocation of {bytes} bytes failed");
        return Err(MomentError::AllocationFailed { bytes });
    }
    Ok(buf)
}

/// Zero-filled scratch.
fn try_scratch<T: Copy + Default>(len: usize) -> Result<Vec<T>, MomentError> {
    let mut buf = try_vec(len)?;
    buf.resize(len, T::default());
    Ok(buf)
}

fn split_opt<T>(
    buf: Option<&mut [T]>,
    tile: usize,
    count: usize,
) -> Result<Vec<Option<&mut [T]>>, MomentError> {
    let mut parts = try_vec(count)?;
    match buf {
        Some(b) => parts.extend(b.chunks_mut(tile).map(Some)),
        None => parts.extend((0..count).map(|_| None)),
    }
    Ok(parts)
}

fn output_tiles<'s>(
    outputs: MomentOutputs<'s>,
    pixels: usize,
    tile: usize,
) -> Result<Vec<OutputTile<'s>>, MomentError> {
    let count = pixels.div_ceil(tile);
    let trim = |b: Option<&'s mut [f32]>| b.map(|b| &mut b[..pixels]);
    let m0 = split_opt(trim(outputs.mom0), tile, count)?;
    let m1 = split_opt(trim(outputs.mom1), tile, count)?;
    let m2 = split_opt(trim(outputs.mom2), tile, count)?;
    let mut tiles = try_vec(count)?;
    for (k, ((mom0, mom1), mom2)) in m0.into_iter().zip(m1).zip(m2).enumerate() {
        let offset = k * tile;
        tiles.push(OutputTile {
            offset,
            len: tile.min(pixels - offset),
            mom0,
            mom1,
            mom2,
        });
    }
    Ok(tiles)
}

fn run_tiles<T, F>(tiles: Vec<T>, parallel: bool, f: F)
where
    T: Send,
    F: Fn(T) + Send + Sync,
{
    if parallel && tiles.len() > 1 {
        tiles.into_par_iter().for_each(f);
    } else {
        tiles.into_iter().for_each(f);
    }
}

/// Bytes of accumulator scratch the single pass needs for `selection`.
fn scratch_bytes(selection: MomentSelection, pixels: usize) -> usize {
    let mut per_pixel = size_of::<f64>();
    if selection.needs_weighted() {
        per_pixel += size_of::<f64>();
    }
    if selection.needs_square() {
        per_pixel += size_of::<f64>() + size_of::<u32>();
    }
    pixels.saturating_mul(per_pixel)
}

/// Single-pass accumulator sweep.
///
/// Preconditions (checked by [`crate::reduce_into`]): `v.len() == channels`
/// and each selected output holds at least `height * width` values.
pub fn reduce_single_pass(
    cube: &CubeView<'_>,
    v: &[f32],
    dv: f64,
    selection: MomentSelection,
    outputs: MomentOutputs<'_>,
    options: &ReduceOptions,
) -> Result<(), MomentError> {
    if selection.is_empty() {
        return Ok(());
    }
    let outputs = outputs.restrict(selection);
    let pixels = cube.pixels();

    let bytes = scratch_bytes(selection, pixels);
    if let Some(limit) = options.max_scratch_bytes {
        if bytes > limit {
            warn!("moments: {bytes} bytes of scratch exceeds the {limit} byte limit");
            return Err(MomentError::AllocationFailed { bytes });
        }
    }

    let mut sum_i = try_scratch::<f64>(pixels)?;
    let mut sum_id = if selection.needs_weighted() {
        Some(try_scratch::<f64>(pixels)?)
    } else {
        None
    };
    let (mut sum_id2, mut samples) = if selection.needs_square() {
        (Some(try_scratch::<f64>(pixels)?), Some(try_scratch::<u32>(pixels)?))
    } else {
        (None, None)
    };

    let tile = options.tile_len(pixels);
    let count = pixels.div_ceil(tile);
    let id = split_opt(sum_id.as_deref_mut(), tile, count)?;
    let id2 = split_opt(sum_id2.as_deref_mut(), tile, count)?;
    let n = split_opt(samples.as_deref_mut(), tile, count)?;
    let sums = sum_i
        .chunks_mut(tile)
        .zip(id)
        .zip(id2)
        .zip(n)
        .map(|(((sum_i, sum_id), sum_id2), samples)| SumTile {
            sum_i,
            sum_id,
            sum_id2,
            samples,
        });
    let mut tiles = try_vec(count)?;
    tiles.extend(output_tiles(outputs, pixels, tile)?.into_iter().zip(sums));

    let origin = v.first().map_or(0.0, |&v0| v0 as f64);
    run_tiles(tiles, options.parallel, |(out, acc)| {
        sweep_tile(cube, v, origin, dv, out, acc)
    });
    Ok(())
}

fn sweep_tile(
    cube: &CubeView<'_>,
    v: &[f32],
    origin: f64,
    dv: f64,
    mut out: OutputTile<'_>,
    acc: SumTile<'_>,
) {
    let range = out.offset..out.offset + out.len;
    let SumTile {
        sum_i,
        mut sum_id,
        mut sum_id2,
        mut samples,
    } = acc;

    match (sum_id.as_deref_mut(), sum_id2.as_deref_mut(), samples.as_deref_mut()) {
        (Some(weighted), Some(squared), Some(counts)) => {
            for (c, &coord) in v.iter().enumerate() {
                let plane = &cube.plane(c)[range.clone()];
                let offset = coord as f64 - origin;
                let lanes = sum_i
                    .iter_mut()
                    .zip(weighted.iter_mut())
                    .zip(squared.iter_mut())
                    .zip(counts.iter_mut());
                for ((((i, id), id2), n), &x) in lanes.zip(plane) {
                    accumulate::update_full(i, id, id2, n, x, offset);
                }
            }
        }
        (Some(weighted), _, _) => {
            for (c, &coord) in v.iter().enumerate() {
                let plane = &cube.plane(c)[range.clone()];
                let offset = coord as f64 - origin;
                for ((i, id), &x) in sum_i.iter_mut().zip(weighted.iter_mut()).zip(plane) {
                    accumulate::update_weighted(i, id, x, offset);
                }
            }
        }
        (None, _, _) => {
            for c in 0..cube.channels() {
                let plane = &cube.plane(c)[range.clone()];
                for (i, &x) in sum_i.iter_mut().zip(plane) {
                    accumulate::update_mass(i, x);
                }
            }
        }
    }

    for k in 0..out.len {
        let sums = PixelSums::new(
            origin,
            sum_i[k],
            sum_id.as_deref().map_or(0.0, |b| b[k]),
            sum_id2.as_deref().map_or(0.0, |b| b[k]),
            samples.as_deref().map_or(0, |b| b[k]),
        );
        out.write(k, &sums, dv);
    }
}

/// Two-pass per-pixel reduction. Reads each pixel's channel stack with a
/// plane-sized stride, once more when moment 2 is selected. Kept as the
/// oracle for the single-pass path; needs no accumulator scratch.
pub fn reduce_two_pass(
    cube: &CubeView<'_>,
    v: &[f32],
    dv: f64,
    selection: MomentSelection,
    outputs: MomentOutputs<'_>,
    options: &ReduceOptions,
) -> Result<(), MomentError> {
    if selection.is_empty() {
        return Ok(());
    }
    let outputs = outputs.restrict(selection);
    let pixels = cube.pixels();
    let tiles = output_tiles(outputs, pixels, options.tile_len(pixels))?;
    run_tiles(tiles, options.parallel, |out| two_pass_tile(cube, v, dv, out));
    Ok(())
}

fn two_pass_tile(cube: &CubeView<'_>, v: &[f32], dv: f64, mut out: OutputTile<'_>) {
    for k in 0..out.len {
        let pixel = out.offset + k;
        let (mut sum_i, mut sum_iv) = (0.0, 0.0);
        for (x, &coord) in cube.spectrum(pixel).zip(v) {
            accumulate::update_weighted(&mut sum_i, &mut sum_iv, x, coord as f64);
        }

        if sum_i == 0.0 {
            if let Some(m0) = out.mom0.as_deref_mut() {
                m0[k] = 0.0;
            }
            if let Some(m1) = out.mom1.as_deref_mut() {
                m1[k] = f32::NAN;
            }
            if let Some(m2) = out.mom2.as_deref_mut() {
                m2[k] = f32::NAN;
            }
            continue;
        }

        let m1 = (sum_iv / sum_i) as f32;
        if let Some(m0) = out.mom0.as_deref_mut() {
            m0[k] = (sum_i * dv) as f32;
        }
        if let Some(m1_out) = out.mom1.as_deref_mut() {
            m1_out[k] = m1;
        }
        if let Some(m2) = out.mom2.as_deref_mut() {
            let spread = accumulate::centered_square_sum(cube.spectrum(pixel).zip(v.iter().copied()), m1);
            m2[k] = (spread / sum_i).sqrt() as f32;
        }
    }
}

/// Validates shapes and dispatches to the configured strategy.
pub(crate) fn dispatch(
    cube: &CubeView<'_>,
    v: &[f32],
    dv: f64,
    selection: MomentSelection,
    outputs: MomentOutputs<'_>,
    options: &ReduceOptions,
) -> Result<(), MomentError> {
    if v.len() != cube.channels() {
        return Err(MomentError::AxisLengthMismatch {
            expected: cube.channels(),
            got: v.len(),
        });
    }
    outputs.validate(selection, cube.pixels())?;

    let reducer = options.strategy.reducer();
    debug!(
        "moments: {}x{}x{} cube, selection {:?}, strategy {}, parallel {}",
        cube.channels(),
        cube.height(),
        cube.width(),
        selection,
        reducer.name(),
        options.parallel
    );
    let start = Instant::now();
    reducer.reduce_into(cube, v, dv, selection, outputs, options)?;
    debug!("moments: reduced {} pixels in {:?}", cube.pixels(), start.elapsed());
    Ok(())
}

//! Spectral moment maps for channel-major data cubes.
//!
//! ```
//! use momentcore::{reduce, CubeView, MomentSelection, ReduceOptions};
//!
//! // 3 channels of a 1x2 image, one NaN-masked sample
//! let data = [1.0, 0.0, 2.0, f32::NAN, 1.0, 0.0];
//! let cube = CubeView::new(&data, 3, 1, 2).unwrap();
//! let v = [-1.0, 0.0, 1.0];
//! let maps = reduce(&cube, &v, 0.5, MomentSelection::all(), &ReduceOptions::default()).unwrap();
//! assert_eq!(maps.mom0.as_deref(), Some(&[2.0, 0.0][..]));
//! assert!(maps.mom1.as_ref().unwrap()[1].is_nan());
//! ```

mod accumulate;
pub mod cube;
pub mod error;
pub mod moments;
pub mod params;
pub mod reducer;
pub mod strategy;

#[cfg(feature = "python")]
mod python;

pub use cube::CubeView;
pub use error::MomentError;
pub use moments::{check_map_shape, Moment, MomentMaps, MomentOutputs, MomentSelection, UnitLabels};
pub use params::{axis_step, compute_moments, pixel_axis, ReduceParams};
pub use reducer::{reduce_single_pass, reduce_two_pass, ReduceOptions};
pub use strategy::{Reducer, Strategy, REGISTRY};

/// Writes the selected moment maps into caller buffers.
///
/// Unselected buffers are never touched and may be `None`. On error nothing
/// has been written.
pub fn reduce_into(
    cube: &CubeView<'_>,
    v: &[f32],
    dv: f64,
    selection: MomentSelection,
    outputs: MomentOutputs<'_>,
    options: &ReduceOptions,
) -> Result<(), MomentError> {
    reducer::dispatch(cube, v, dv, selection, outputs, options)
}

/// Allocating variant of [`reduce_into`]; maps are `height * width`,
/// row-major.
pub fn reduce(
    cube: &CubeView<'_>,
    v: &[f32],
    dv: f64,
    selection: MomentSelection,
    options: &ReduceOptions,
) -> Result<MomentMaps, MomentError> {
    let mut maps = MomentMaps::allocate(cube.height(), cube.width(), selection);
    reducer::dispatch(cube, v, dv, selection, maps.outputs(), options)?;
    Ok(maps)
}

/// Flat-argument form mirroring the raw kernel signature.
#[allow(clippy::too_many_arguments)]
pub fn reduce_raw(
    data: &[f32],
    v: &[f32],
    channels: usize,
    height: usize,
    width: usize,
    dv: f64,
    compute0: bool,
    compute1: bool,
    compute2: bool,
    outputs: MomentOutputs<'_>,
) -> Result<(), MomentError> {
    let cube = CubeView::new(data, channels, height, width)?;
    let selection = MomentSelection::new(compute0, compute1, compute2);
    reduce_into(&cube, v, dv, selection, outputs, &ReduceOptions::default())
}

use crate::cube::CubeView;
use crate::error::MomentError;
use crate::moments::{MomentMaps, MomentSelection, UnitLabels};
use crate::reducer::ReduceOptions;
use log::debug;
use serde::Deserialize;

/// A moment request as sent by the viewer front-end:
/// `{"startChan": 10, "endChan": 40, "moments": ["0", "1"]}`.
///
/// `endChan` is inclusive. `dv`, `strategy` and `parallel` are optional
/// overrides. `bunit` and `vUnit` label the resulting maps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceParams {
    #[serde(default)]
    pub start_chan: i64,
    #[serde(default)]
    pub end_chan: i64,
    #[serde(default)]
    pub moments: Vec<String>,
    pub dv: Option<f64>,
    pub strategy: Option<String>,
    pub parallel: Option<bool>,
    pub bunit: Option<String>,
    pub v_unit: Option<String>,
}

const DEFAULT_BUNIT: &str = "Arbitrary Units";
const DEFAULT_AXIS_UNIT: &str = "pixels";

impl ReduceParams {
    pub fn from_json(json: &str) -> Result<Self, MomentError> {
        Ok(serde_json::from_str(json)?)
    }

    #[inline]
    pub fn selection(&self) -> MomentSelection {
        MomentSelection::from_labels(&self.moments)
    }

    /// Half-open channel bounds clamped to the cube, or `None` when the
    /// range is empty.
    pub fn channel_bounds(&self, channels: usize) -> Option<(usize, usize)> {
        let start = self.start_chan.max(0) as usize;
        let end = self.end_chan.saturating_add(1).clamp(0, channels as i64) as usize;
        if start >= end {
            None
        } else {
            Some((start, end))
        }
    }

    pub fn units(&self) -> UnitLabels {
        UnitLabels::new(
            self.bunit.as_deref().unwrap_or(DEFAULT_BUNIT),
            self.v_unit.as_deref().unwrap_or(DEFAULT_AXIS_UNIT),
        )
    }

    pub fn options(&self) -> Result<ReduceOptions, MomentError> {
        let mut opts = ReduceOptions::default();
        if let Some(name) = &self.strategy {
            opts.strategy = name.parse()?;
        }
        if let Some(parallel) = self.parallel {
            opts.parallel = parallel;
        }
        Ok(opts)
    }
}

/// Channel step from the first two axis entries, 1.0 for a single channel.
pub fn axis_step(v: &[f32]) -> f64 {
    match v {
        [a, b, ..] => (*b as f64 - *a as f64).abs(),
        _ => 1.0,
    }
}

/// Channel indices `start..end` as coordinates, for cubes without a
/// spectral axis description.
pub fn pixel_axis(start: usize, end: usize) -> Vec<f32> {
    (start..end).map(|c| c as f32).collect()
}

/// Runs a request against a cube whose full coordinate axis is `v`.
/// An empty channel range yields `MomentMaps` with no maps.
pub fn compute_moments(
    cube: &CubeView<'_>,
    v: &[f32],
    params: &ReduceParams,
) -> Result<MomentMaps, MomentError> {
    if v.len() != cube.channels() {
        return Err(MomentError::AxisLengthMismatch {
            expected: cube.channels(),
            got: v.len(),
        });
    }
    let (start, end) = match params.channel_bounds(cube.channels()) {
        Some(bounds) => bounds,
        None => {
            debug!(
                "moments: empty channel range {}..={}",
                params.start_chan, params.end_chan
            );
            return Ok(MomentMaps::empty(cube.height(), cube.width()).with_units(params.units()));
        }
    };
    let sub = match cube.channel_range(start, end) {
        Some(sub) => sub,
        None => return Ok(MomentMaps::empty(cube.height(), cube.width()).with_units(params.units())),
    };
    let axis = &v[start..end];
    let dv = params.dv.unwrap_or_else(|| axis_step(axis));
    let maps = crate::reduce(&sub, axis, dv, params.selection(), &params.options()?)?;
    Ok(maps.with_units(params.units()))
}

use crate::error::MomentError;
use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Moment {
    Zero,
    One,
    Two,
}

impl Moment {
    pub const ALL: [Moment; 3] = [Moment::Zero, Moment::One, Moment::Two];

    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Moment::Zero => "0",
            Moment::One => "1",
            Moment::Two => "2",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "0" => Some(Moment::Zero),
            "1" => Some(Moment::One),
            "2" => Some(Moment::Two),
            _ => None,
        }
    }

    /// Physical unit of the map: moment 0 carries intensity × axis units,
    /// the weighted moments carry axis units only.
    pub fn unit_label(self, bunit: &str, axis_unit: &str) -> String {
        match self {
            Moment::Zero if bunit.trim().is_empty() => axis_unit.to_string(),
            Moment::Zero => format!("{} {axis_unit}", bunit.trim()),
            Moment::One | Moment::Two => axis_unit.to_string(),
        }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "moment {}", self.label())
    }
}

/// Which maps a call produces. Unselected maps are never written.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MomentSelection {
    pub m0: bool,
    pub m1: bool,
    pub m2: bool,
}

impl MomentSelection {
    #[inline]
    pub const fn new(m0: bool, m1: bool, m2: bool) -> Self {
        Self { m0, m1, m2 }
    }

    #[inline]
    pub const fn all() -> Self {
        Self::new(true, true, true)
    }

    #[inline]
    pub fn only(moment: Moment) -> Self {
        let mut sel = Self::default();
        sel.set(moment, true);
        sel
    }

    /// Builds a selection from request labels such as `["0", "2"]`;
    /// unknown labels are ignored.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut sel = Self::default();
        for m in labels.iter().filter_map(|l| Moment::from_label(l.as_ref())) {
            sel.set(m, true);
        }
        sel
    }

    #[inline]
    pub fn contains(&self, moment: Moment) -> bool {
        match moment {
            Moment::Zero => self.m0,
            Moment::One => self.m1,
            Moment::Two => self.m2,
        }
    }

    #[inline]
    pub fn set(&mut self, moment: Moment, on: bool) {
        match moment {
            Moment::Zero => self.m0 = on,
            Moment::One => self.m1 = on,
            Moment::Two => self.m2 = on,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.m0 || self.m1 || self.m2)
    }

    /// Σi·v is needed.
    #[inline]
    pub fn needs_weighted(&self) -> bool {
        self.m1 || self.m2
    }

    /// Σi·v² is needed.
    #[inline]
    pub fn needs_square(&self) -> bool {
        self.m2
    }

    pub fn iter(&self) -> impl Iterator<Item = Moment> + '_ {
        Moment::ALL.into_iter().filter(|m| self.contains(*m))
    }
}

/// Caller-allocated output maps, each at least `height * width` long.
#[derive(Debug, Default)]
pub struct MomentOutputs<'a> {
    pub mom0: Option<&'a mut [f32]>,
    pub mom1: Option<&'a mut [f32]>,
    pub mom2: Option<&'a mut [f32]>,
}

impl<'a> MomentOutputs<'a> {
    pub fn new(
        mom0: Option<&'a mut [f32]>,
        mom1: Option<&'a mut [f32]>,
        mom2: Option<&'a mut [f32]>,
    ) -> Self {
        Self { mom0, mom1, mom2 }
    }

    fn slot(&self, moment: Moment) -> Option<&[f32]> {
        match moment {
            Moment::Zero => self.mom0.as_deref(),
            Moment::One => self.mom1.as_deref(),
            Moment::Two => self.mom2.as_deref(),
        }
    }

    /// Every selected moment has a buffer of at least `pixels` elements.
    pub fn validate(&self, selection: MomentSelection, pixels: usize) -> Result<(), MomentError> {
        for moment in selection.iter() {
            match self.slot(moment) {
                None => return Err(MomentError::MissingOutput(moment)),
                Some(buf) if buf.len() < pixels => {
                    return Err(MomentError::OutputTooSmall {
                        moment,
                        needed: pixels,
                        got: buf.len(),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Drops buffers the selection does not ask for, so the kernels
    /// cannot touch them.
    pub(crate) fn restrict(self, selection: MomentSelection) -> Self {
        Self {
            mom0: self.mom0.filter(|_| selection.m0),
            mom1: self.mom1.filter(|_| selection.m1),
            mom2: self.mom2.filter(|_| selection.m2),
        }
    }
}

/// A `(height, width)` map array must match the image plane exactly; a
/// flat buffer of the right length but the wrong shape is rejected.
pub fn check_map_shape(
    moment: Moment,
    shape: &[usize],
    height: usize,
    width: usize,
) -> Result<(), MomentError> {
    if shape == [height, width] {
        Ok(())
    } else {
        Err(MomentError::OutputShapeMismatch {
            moment,
            height,
            width,
            got: shape.to_vec(),
        })
    }
}

/// Intensity and axis units a request's maps are expressed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLabels {
    pub bunit: String,
    pub axis: String,
}

impl UnitLabels {
    pub fn new(bunit: impl Into<String>, axis: impl Into<String>) -> Self {
        Self {
            bunit: bunit.into(),
            axis: axis.into(),
        }
    }

    #[inline]
    pub fn label(&self, moment: Moment) -> String {
        moment.unit_label(&self.bunit, &self.axis)
    }
}

/// Owned maps returned by the allocating entry points.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentMaps {
    pub height: usize,
    pub width: usize,
    pub mom0: Option<Vec<f32>>,
    pub mom1: Option<Vec<f32>>,
    pub mom2: Option<Vec<f32>>,
    /// Set by [`crate::compute_moments`]; raw reductions carry no units.
    pub units: Option<UnitLabels>,
}

impl MomentMaps {
    pub(crate) fn allocate(height: usize, width: usize, selection: MomentSelection) -> Self {
        let n = height * width;
        let map = |on: bool| if on { Some(vec![0.0f32; n]) } else { None };
        Self {
            height,
            width,
            mom0: map(selection.m0),
            mom1: map(selection.m1),
            mom2: map(selection.m2),
            units: None,
        }
    }

    /// No maps at all, the result of an empty channel range.
    pub fn empty(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            mom0: None,
            mom1: None,
            mom2: None,
            units: None,
        }
    }

    pub fn with_units(mut self, units: UnitLabels) -> Self {
        self.units = Some(units);
        self
    }

    /// Unit label of a present map, when units are known.
    pub fn unit(&self, moment: Moment) -> Option<String> {
        self.get(moment)?;
        self.units.as_ref().map(|u| u.label(moment))
    }

    pub fn outputs(&mut self) -> MomentOutputs<'_> {
        MomentOutputs {
            mom0: self.mom0.as_deref_mut(),
            mom1: self.mom1.as_deref_mut(),
            mom2: self.mom2.as_deref_mut(),
        }
    }

    pub fn get(&self, moment: Moment) -> Option<&[f32]> {
        match moment {
            Moment::Zero => self.mom0.as_deref(),
            Moment::One => self.mom1.as_deref(),
            Moment::Two => self.mom2.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mom0.is_none() && self.mom1.is_none() && self.mom2.is_none()
    }

    #[inline]
    pub fn at(&self, moment: Moment, row: usize, col: usize) -> Option<f32> {
        self.get(moment).map(|m| m[row * self.width + col])
    }
}

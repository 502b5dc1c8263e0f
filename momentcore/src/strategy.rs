use crate::cube::CubeView;
use crate::error::MomentError;
use crate::moments::{MomentOutputs, MomentSelection};
use crate::reducer::{self, ReduceOptions};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub trait Reducer: Send + Sync {
    fn name(&self) -> &'static str;

    fn reduce_into(
        &self,
        cube: &CubeView<'_>,
        v: &[f32],
        dv: f64,
        selection: MomentSelection,
        outputs: MomentOutputs<'_>,
        options: &ReduceOptions,
    ) -> Result<(), MomentError>;
}

pub struct SinglePass;
impl Reducer for SinglePass {
    fn name(&self) -> &'static str {
        "single_pass"
    }

    #[inline]
    fn reduce_into(
        &self,
        cube: &CubeView<'_>,
        v: &[f32],
        dv: f64,
        selection: MomentSelection,
        outputs: MomentOutputs<'_>,
        options: &ReduceOptions,
    ) -> Result<(), MomentError> {
        reducer::reduce_single_pass(cube, v, dv, selection, outputs, options)
    }
}

pub struct TwoPass;
impl Reducer for TwoPass {
    fn name(&self) -> &'static str {
        "two_pass"
    }

    #[inline]
    fn reduce_into(
        &self,
        cube: &CubeView<'_>,
        v: &[f32],
        dv: f64,
        selection: MomentSelection,
        outputs: MomentOutputs<'_>,
        options: &ReduceOptions,
    ) -> Result<(), MomentError> {
        reducer::reduce_two_pass(cube, v, dv, selection, outputs, options)
    }
}

// Registry
pub static REGISTRY: Lazy<HashMap<&'static str, Arc<dyn Reducer>>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, Arc<dyn Reducer>> = HashMap::new();
    m.insert("single_pass", Arc::new(SinglePass));
    m.insert("two_pass", Arc::new(TwoPass));
    m
});

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Strategy {
    #[default]
    SinglePass,
    TwoPass,
}

impl Strategy {
    #[inline]
    pub fn key(self) -> &'static str {
        match self {
            Strategy::SinglePass => "single_pass",
            Strategy::TwoPass => "two_pass",
        }
    }

    pub fn reducer(self) -> Arc<dyn Reducer> {
        Arc::clone(&REGISTRY[self.key()])
    }
}

impl FromStr for Strategy {
    type Err = MomentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single_pass" | "single" | "fast" => Ok(Strategy::SinglePass),
            "two_pass" | "naive" | "reference" => Ok(Strategy::TwoPass),
            _ => Err(MomentError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_strategy() {
        for s in [Strategy::SinglePass, Strategy::TwoPass] {
            let r = REGISTRY.get(s.key()).expect("registered");
            assert_eq!(r.name(), s.key());
            assert_eq!(s.reducer().name(), s.key());
        }
    }

    #[test]
    fn parses_names() {
        assert_eq!("single_pass".parse::<Strategy>().unwrap(), Strategy::SinglePass);
        assert_eq!("Two-Pass".parse::<Strategy>().unwrap(), Strategy::TwoPass);
        assert!(matches!(
            "simd".parse::<Strategy>(),
            Err(MomentError::UnknownStrategy(name)) if name == "simd"
        ));
    }
}

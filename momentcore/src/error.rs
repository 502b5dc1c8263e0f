use crate::moments::Moment;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MomentError {
    #[error("moments: failed to allocate {bytes} bytes of scratch")]
    AllocationFailed { bytes: usize },
    #[error("moments: invalid cube shape: channels={channels}, height={height}, width={width}")]
    InvalidDimensions {
        channels: usize,
        height: usize,
        width: usize,
    },
    #[error("moments: data length mismatch: expected = {expected}, got = {got}")]
    DataLengthMismatch { expected: usize, got: usize },
    #[error("moments: coordinate axis length mismatch: expected = {expected}, got = {got}")]
    AxisLengthMismatch { expected: usize, got: usize },
    #[error("moments: output buffer for {moment} too small: needed = {needed}, got = {got}")]
    OutputTooSmall {
        moment: Moment,
        needed: usize,
        got: usize,
    },
    #[error("moments: output array for {moment} has shape {got:?}, expected [{height}, {width}]")]
    OutputShapeMismatch {
        moment: Moment,
        height: usize,
        width: usize,
        got: Vec<usize>,
    },
    #[error("moments: {0} requested but no output buffer supplied")]
    MissingOutput(Moment),
    #[error("moments: unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("moments: invalid request parameters: {0}")]
    InvalidParams(String),
}

impl From<serde_json::Error> for MomentError {
    fn from(err: serde_json::Error) -> Self {
        MomentError::InvalidParams(err.to_string())
    }
}

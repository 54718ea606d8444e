//! Anomaly detection: the per-vehicle statistical baseline and the rule
//! classifier that turns readings into anomaly records.

pub mod baseline;
pub mod rules;

use thiserror::Error;

pub use self::baseline::Baseline;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("insufficient baseline data: need {needed} samples, have {have}")]
    InsufficientBaseline { needed: usize, have: usize },
}

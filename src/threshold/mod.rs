mod evaluator;
mod model;

pub use evaluator::{ThresholdEvaluator, Verdict};
pub use model::{
    ErrorThreshold, EvaluationThreshold, ResourceThreshold, ThresholdModel, TimingThreshold,
};

//! The run loop and the pieces it is assembled from.

mod record;
mod runtime;
mod stage;

pub use record::RunRecord;
pub use runtime::{Runtime, RuntimeBuilder};
pub use stage::{
    InputBuilder, OutputInterpreter, PipelineSettings, StageContext, StageDescriptor, StageTable,
    interpret_evaluation,
};

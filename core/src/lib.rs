//! Segmentering, klassifisering og plan-avstemming for styrketrening målt
//! med bærbare bevegelsessensorer.

pub mod buffer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod events;
pub mod fusion;
pub mod pipeline;
pub mod plan;
pub mod repetitions;
pub mod report;
pub mod segmenter;
pub mod spectrum;
pub mod telemetry;
pub mod transitions;
pub mod types;

#[cfg(feature = "python")]
mod py;

pub use buffer::{SampleBuffer, Window};
pub use classifier::{
    classify_windows_parallel, Candidate, Classifier, ClassifierAdapter, ResultReorderer,
    WindowResult,
};
pub use config::{
    load_config, save_config, FusionConfig, PipelineConfig, RepetitionConfig, SegmenterConfig,
    WindowConfig,
};
pub use error::{Error, Result};
pub use events::{Event, EventSink, NullSink};
pub use fusion::{fuse, FusionEngine, FusionOutcome};
pub use pipeline::ExercisePipeline;
pub use plan::{load_plan_definition, parse_plan_definition, ExercisePlan, PlanDefinition, PlanEntry};
pub use repetitions::{PeriodicProfile, RepetitionEstimate, RepetitionEstimator};
pub use report::PlanReport;
pub use segmenter::{MotionSegmenter, MovementState, SegmentEvent};
pub use spectrum::{DeciderState, FreqPower};
pub use telemetry::METRICS;
pub use transitions::TransitionModel;
pub use types::*;

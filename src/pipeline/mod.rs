pub mod enumerate;
pub mod export;
pub mod orchestrator;
pub mod progress;
pub mod resolve;
pub mod select;

pub use export::ExportWriter;
pub use orchestrator::{GroupOutcome, Orchestrator, RunSummary, run_extraction};
pub use progress::{
    KeyOutcome, ProgressEvent, ProgressReceiver, ProgressReporter, ProgressSender, StopSignal,
    channel, render_progress,
};
pub use select::{ExtractionRequest, build_groups, validate_region};

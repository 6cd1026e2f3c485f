//! Data structures for generating DriveMind API responses.

mod error;
mod graph;
mod inference;
mod status;
mod telemetry;

pub use error::{ErrorBody, ErrorCode};
pub use graph::SegmentResponse;
pub use inference::{AnalyzeResponse, PlanResponse, TranscribeResponse};
pub use status::StatusResponse;
pub use telemetry::{BatchIngestResponse, BatchItem};

use drivemind_graph::Location;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("{0} does not match any node or segment in the road network")]
    UnknownLocation(Location),
    #[error("Confidence must be between 0 and 1; got {0}")]
    InvalidConfidence(f64),
}

#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("A media reference needs either a URI or an inline base64 payload")]
    MissingMedia,
    #[error("Inline media is not valid base64: {0}")]
    InvalidMedia(String),
    #[error("Detection confidence must be between 0 and 1; got {0}")]
    InvalidDetection(f64),
}

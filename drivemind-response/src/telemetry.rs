use crate::error::ErrorBody;
use drivemind_telemetry::TelemetryEvent;
use serde::{Deserialize, Serialize};

/// The outcome of one event in a batch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum BatchItem {
    Event(TelemetryEvent),
    Error(ErrorBody),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchIngestResponse {
    pub accepted: usize,
    pub rejected: usize,
    /// One entry per submitted event, in submission order.
    pub results: Vec<BatchItem>,
}

impl FromIterator<BatchItem> for BatchIngestResponse {
    fn from_iter<I: IntoIterator<Item = BatchItem>>(iter: I) -> Self {
        let results: Vec<BatchItem> = iter.into_iter().collect();
        let rejected = results
            .iter()
            .filter(|item| matches!(item, BatchItem::Error(_)))
            .count();
        Self {
            accepted: results.len() - rejected,
            rejected,
            results,
        }
    }
}

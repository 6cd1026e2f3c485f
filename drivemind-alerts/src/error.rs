use crate::alert::{AlertId, AlertState};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AlertError {
    #[error("{0} not found")]
    NotFound(AlertId),
    #[error("{id} is already {state}")]
    AlreadyClosed { id: AlertId, state: AlertState },
}

//! Error kinds for the engine, runner, replay streamer, and read API: one
//! variant per error kind, plus an `Internal(#[from] anyhow::Error)`
//! catch-all for unclassified faults.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("state violation: {0}")]
    StateViolation(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("engine fault: {0}")]
    EngineFault(String),

    #[error("storage fault: {0}")]
    StorageFault(String),

    #[error("transport fault: {0}")]
    TransportFault(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SimError {
    /// Conventional HTTP status code for this error kind.
    pub fn status_code(&self) -> u16 {
        match self {
            SimError::NotFound(_) => 404,
            SimError::InvalidParameter(_) => 400,
            SimError::StateViolation(_) => 409,
            SimError::Timeout(_) => 504,
            SimError::EngineFault(_) => 500,
            SimError::StorageFault(_) => 500,
            SimError::TransportFault(_) => 500,
            SimError::Internal(_) => 500,
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;

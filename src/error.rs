use thiserror::Error;

use crate::models::Status;

/// Errors raised by the assignment core and its collaborators.
#[derive(Debug, Error)]
pub enum CareError {
    /// Listing assignments failed; the previous page is kept.
    #[error("could not load assignments: {0}")]
    Load(String),

    /// The requested status is not reachable from the current one.
    /// Raised locally, never sent to the scheduler.
    #[error("cannot move assignment from {from} to {to}")]
    InvalidTransition { from: Status, to: Status },

    /// The scheduler rejected a transition because the status changed elsewhere.
    #[error("assignment {id} was changed elsewhere (now {current})")]
    Conflict { id: u64, current: Status },

    #[error("session is not authorized")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A transition for this assignment is already in flight.
    #[error("assignment {0} is already being updated")]
    AlreadyUpdating(u64),

    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed data: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CareError {
    /// Maps a collaborator failure met while listing into a `Load` error.
    /// `Unauthorized` passes through so the caller can force re-authentication.
    pub fn into_load(self) -> CareError {
        match self {
            CareError::Unauthorized | CareError::Load(_) => self,
            other => CareError::Load(other.to_string()),
        }
    }

    /// Whether the failure should be shown inline next to the control
    /// instead of in the banner.
    pub fn is_inline(&self) -> bool {
        matches!(self, CareError::InvalidTransition { .. } | CareError::AlreadyUpdating(_))
    }
}

pub type CareResult<T> = Result<T, CareError>;

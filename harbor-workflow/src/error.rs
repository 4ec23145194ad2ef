//! Error types for harbor-workflow.
//!
//! Registry failures never leak out of the coordinator unclassified: every
//! [`StoreError`] is folded into one [`WorkflowError`] variant that says which
//! step failed and what each registry looked like at that point.

use std::time::Duration;

use harbor_core::{BookingStatus, StoreError, VesselId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Last status the coordinator knows each registry holds for one vessel id.
///
/// `None` means the record was absent or could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub vessel: Option<BookingStatus>,
    pub berth: Option<BookingStatus>,
}

impl StatusSnapshot {
    pub fn is_divergent(&self) -> bool {
        self.vessel != self.berth
    }
}

impl std::fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn show(status: Option<BookingStatus>) -> &'static str {
            status.map_or("unknown", |s| s.as_str())
        }
        write!(f, "vessel={}, berth={}", show(self.vessel), show(self.berth))
    }
}

/// Why a single registry call did not succeed.
#[derive(Debug, Error)]
pub enum CallFailure {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The call did not answer in time. It may or may not have applied.
    #[error("registry call timed out after {0:?}")]
    TimedOut(Duration),
}

impl CallFailure {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CallFailure::Store(err) if err.is_not_found())
    }
}

/// All errors returned by [`AllocationCoordinator`](crate::AllocationCoordinator).
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No vessel record for this id. Nothing was changed.
    #[error("vessel '{vessel_id}' not found")]
    VesselNotFound { vessel_id: VesselId },

    /// The vessel exists but has no berth booking. Nothing was changed.
    #[error("berth booking for vessel '{vessel_id}' not found")]
    BerthNotFound {
        vessel_id: VesselId,
        snapshot: StatusSnapshot,
    },

    /// The vessel's current status is not a legal predecessor of the
    /// requested transition. Retrying will not help.
    #[error("cannot {transition} vessel '{vessel_id}' ({snapshot})")]
    IllegalTransition {
        vessel_id: VesselId,
        transition: crate::Transition,
        snapshot: StatusSnapshot,
    },

    /// The vessel status write failed. A rejected write changed nothing; a
    /// timed-out one may still apply, and a retry then finishes the
    /// transition by resuming it.
    #[error("vessel '{vessel_id}' status update failed ({snapshot}): {source}")]
    VesselUpdateFailed {
        vessel_id: VesselId,
        snapshot: StatusSnapshot,
        #[source]
        source: CallFailure,
    },

    /// The vessel advanced but the berth booking did not; the workflow
    /// instance is divergent until the same operation is retried or repaired.
    #[error("vessel '{vessel_id}' left divergent ({snapshot}): berth update failed: {source}")]
    PartialFailure {
        vessel_id: VesselId,
        snapshot: StatusSnapshot,
        #[source]
        source: CallFailure,
    },

    /// A lookup, or taking the vessel's transition lock, failed for a reason
    /// other than absence. Nothing was changed.
    #[error("lookup for vessel '{vessel_id}' failed: {source}")]
    LookupFailed {
        vessel_id: VesselId,
        snapshot: StatusSnapshot,
        #[source]
        source: CallFailure,
    },
}

impl WorkflowError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::VesselNotFound { .. } => "vessel_not_found",
            WorkflowError::BerthNotFound { .. } => "berth_not_found",
            WorkflowError::IllegalTransition { .. } => "illegal_transition",
            WorkflowError::VesselUpdateFailed { .. } => "vessel_update_failed",
            WorkflowError::PartialFailure { .. } => "partial_failure",
            WorkflowError::LookupFailed { .. } => "lookup_failed",
        }
    }

    pub fn vessel_id(&self) -> &VesselId {
        match self {
            WorkflowError::VesselNotFound { vessel_id }
            | WorkflowError::BerthNotFound { vessel_id, .. }
            | WorkflowError::IllegalTransition { vessel_id, .. }
            | WorkflowError::VesselUpdateFailed { vessel_id, .. }
            | WorkflowError::PartialFailure { vessel_id, .. }
            | WorkflowError::LookupFailed { vessel_id, .. } => vessel_id,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        match self {
            WorkflowError::VesselNotFound { .. } => StatusSnapshot::default(),
            WorkflowError::BerthNotFound { snapshot, .. }
            | WorkflowError::IllegalTransition { snapshot, .. }
            | WorkflowError::VesselUpdateFailed { snapshot, .. }
            | WorkflowError::PartialFailure { snapshot, .. }
            | WorkflowError::LookupFailed { snapshot, .. } => *snapshot,
        }
    }

    /// Whether re-issuing the same operation can succeed without operator
    /// action. Transient call failures are retryable; missing records and
    /// stale status views are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::VesselUpdateFailed { .. }
                | WorkflowError::PartialFailure { .. }
                | WorkflowError::LookupFailed { .. }
        )
    }
}

//! [`AllocationCoordinator`]: one workflow transition at a time per vessel.
//!
//! Every operation runs the same chain under the vessel's transition lock:
//!
//! 1. look up the vessel, then the berth booking (no writes yet)
//! 2. check the vessel's status against the transition's predecessors
//! 3. write the target status to the vessel registry
//! 4. write the target status (and approver) to the berth registry
//!
//! A rejected write at step 3 changes nothing; a timed-out one may still
//! land after the lock is released, and re-issuing the operation then
//! finishes it through [`Plan::Resume`]. A failure at step 4 leaves the
//! instance divergent and is reported as [`WorkflowError::PartialFailure`];
//! re-issuing the same operation finishes it too.

use std::future::Future;
use std::time::Duration;

use harbor_core::{ApproverId, BookingStatus, StoreError, VesselId};
use serde::Serialize;

use crate::error::{CallFailure, StatusSnapshot, WorkflowError};
use crate::locks::{TransitionGuard, TransitionLocks};
use crate::ports::{BerthPort, VesselPort};
use crate::transition::{Command, Plan, Transition};

/// Upper bound on one registry call unless configured otherwise.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(harbor_core::config::DEFAULT_CALL_TIMEOUT_MS);

/// Outcome of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub vessel_id: VesselId,
    pub status: BookingStatus,
    /// The vessel was already at `status`; only the berth booking was written.
    pub resumed: bool,
}

pub struct AllocationCoordinator<V, B> {
    vessels: V,
    berths: B,
    locks: TransitionLocks,
    call_timeout: Duration,
}

impl<V: VesselPort, B: BerthPort> AllocationCoordinator<V, B> {
    pub fn new(vessels: V, berths: B) -> Self {
        Self {
            vessels,
            berths,
            locks: TransitionLocks::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Replace the default in-process lock table, e.g. with one shared
    /// across processes.
    pub fn with_locks(mut self, locks: TransitionLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn vessels(&self) -> &V {
        &self.vessels
    }

    pub fn berths(&self) -> &B {
        &self.berths
    }

    pub fn locks(&self) -> &TransitionLocks {
        &self.locks
    }

    // -----------------------------------------------------------------------
    // 1. Public operations
    // -----------------------------------------------------------------------

    /// `New -> In Progress`.
    pub async fn request_allocation(&self, vessel_id: &VesselId) -> Result<Allocation, WorkflowError> {
        self.apply(vessel_id, &Command::Request).await
    }

    /// `In Progress -> Approved`, recording the approver on the berth booking.
    pub async fn approve_allocation(
        &self,
        vessel_id: &VesselId,
        approver: &ApproverId,
    ) -> Result<Allocation, WorkflowError> {
        self.apply(vessel_id, &Command::Approve(approver.clone())).await
    }

    /// `In Progress -> Rejected`, recording the approver on the berth booking.
    pub async fn reject_allocation(
        &self,
        vessel_id: &VesselId,
        approver: &ApproverId,
    ) -> Result<Allocation, WorkflowError> {
        self.apply(vessel_id, &Command::Reject(approver.clone())).await
    }

    /// `New | In Progress -> Cancelled`.
    pub async fn cancel_allocation(&self, vessel_id: &VesselId) -> Result<Allocation, WorkflowError> {
        self.apply(vessel_id, &Command::Cancel).await
    }

    /// Run one command through the lookup / check / write chain.
    pub async fn apply(
        &self,
        vessel_id: &VesselId,
        command: &Command,
    ) -> Result<Allocation, WorkflowError> {
        let transition = command.transition();
        let target = transition.target();
        let _guard = self.hold(vessel_id).await?;

        let (vessel_status, berth_status) = self.resolve(vessel_id).await?;
        let snapshot = StatusSnapshot {
            vessel: Some(vessel_status),
            berth: Some(berth_status),
        };

        let Some(plan) = transition.plan(vessel_status, berth_status) else {
            tracing::debug!(vessel_id = %vessel_id, %transition, %snapshot, "illegal transition");
            return Err(WorkflowError::IllegalTransition {
                vessel_id: vessel_id.clone(),
                transition,
                snapshot,
            });
        };

        self.call(self.vessels.update_vessel_status(vessel_id, target))
            .await
            .map_err(|source| WorkflowError::VesselUpdateFailed {
                vessel_id: vessel_id.clone(),
                snapshot,
                source,
            })?;

        let berth_write = self
            .call(self.berths.update_berth_status(vessel_id, target, command.approver()))
            .await;
        if let Err(source) = berth_write {
            let snapshot = StatusSnapshot {
                vessel: Some(target),
                berth: Some(berth_status),
            };
            tracing::warn!(
                vessel_id = %vessel_id,
                %transition,
                %snapshot,
                error = %source,
                "berth update failed after vessel advanced; instance divergent"
            );
            return Err(WorkflowError::PartialFailure {
                vessel_id: vessel_id.clone(),
                snapshot,
                source,
            });
        }

        let resumed = plan == Plan::Resume;
        tracing::info!(vessel_id = %vessel_id, %transition, status = %target, resumed, "allocation advanced");
        Ok(Allocation {
            vessel_id: vessel_id.clone(),
            status: target,
            resumed,
        })
    }

    // -----------------------------------------------------------------------
    // 2. Inspection and repair
    // -----------------------------------------------------------------------

    /// Current status in each registry. Absent records show as `None`.
    pub async fn status(&self, vessel_id: &VesselId) -> Result<StatusSnapshot, WorkflowError> {
        let vessel = self.optional(vessel_id, self.vessels.get_vessel(vessel_id)).await?;
        let berth = self.optional(vessel_id, self.berths.get_berth(vessel_id)).await?;
        Ok(StatusSnapshot {
            vessel: vessel.map(|v| v.booking_status),
            berth: berth.map(|b| b.booking_status),
        })
    }

    /// Copy the vessel's status onto its berth booking, under the vessel's
    /// transition lock. The vessel registry is never written.
    pub async fn repair(&self, vessel_id: &VesselId) -> Result<StatusSnapshot, WorkflowError> {
        let _guard = self.hold(vessel_id).await?;
        let (vessel_status, berth_status) = self.resolve(vessel_id).await?;
        let before = StatusSnapshot {
            vessel: Some(vessel_status),
            berth: Some(berth_status),
        };
        if !before.is_divergent() {
            return Ok(before);
        }

        self.call(self.berths.update_berth_status(vessel_id, vessel_status, None))
            .await
            .map_err(|source| WorkflowError::PartialFailure {
                vessel_id: vessel_id.clone(),
                snapshot: before,
                source,
            })?;
        tracing::info!(vessel_id = %vessel_id, from = %berth_status, to = %vessel_status, "berth booking repaired");
        Ok(StatusSnapshot {
            vessel: Some(vessel_status),
            berth: Some(vessel_status),
        })
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Both lookups, vessel first, before anything is written.
    async fn resolve(
        &self,
        vessel_id: &VesselId,
    ) -> Result<(BookingStatus, BookingStatus), WorkflowError> {
        let vessel = match self.call(self.vessels.get_vessel(vessel_id)).await {
            Ok(vessel) => vessel,
            Err(err) if err.is_not_found() => {
                return Err(WorkflowError::VesselNotFound {
                    vessel_id: vessel_id.clone(),
                })
            }
            Err(source) => {
                return Err(WorkflowError::LookupFailed {
                    vessel_id: vessel_id.clone(),
                    snapshot: StatusSnapshot::default(),
                    source,
                })
            }
        };

        let known = StatusSnapshot {
            vessel: Some(vessel.booking_status),
            berth: None,
        };
        let berth = match self.call(self.berths.get_berth(vessel_id)).await {
            Ok(berth) => berth,
            Err(err) if err.is_not_found() => {
                return Err(WorkflowError::BerthNotFound {
                    vessel_id: vessel_id.clone(),
                    snapshot: known,
                })
            }
            Err(source) => {
                return Err(WorkflowError::LookupFailed {
                    vessel_id: vessel_id.clone(),
                    snapshot: known,
                    source,
                })
            }
        };

        Ok((vessel.booking_status, berth.booking_status))
    }

    async fn hold(&self, vessel_id: &VesselId) -> Result<TransitionGuard, WorkflowError> {
        self.locks
            .acquire(vessel_id)
            .await
            .map_err(|source| WorkflowError::LookupFailed {
                vessel_id: vessel_id.clone(),
                snapshot: StatusSnapshot::default(),
                source: CallFailure::Store(StoreError::Backend {
                    key: vessel_id.to_string(),
                    source,
                }),
            })
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, CallFailure> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result.map_err(CallFailure::Store),
            Err(_) => Err(CallFailure::TimedOut(self.call_timeout)),
        }
    }

    async fn optional<T>(
        &self,
        vessel_id: &VesselId,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<Option<T>, WorkflowError> {
        match self.call(fut).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(source) => Err(WorkflowError::LookupFailed {
                vessel_id: vessel_id.clone(),
                snapshot: StatusSnapshot::default(),
                source,
            }),
        }
    }
}

impl<V, B> std::fmt::Debug for AllocationCoordinator<V, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationCoordinator")
            .field("call_timeout", &self.call_timeout)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

//! # harbor-workflow
//!
//! Allocation workflow coordinator: drives a vessel and its berth booking
//! through `New -> In Progress -> {Approved | Rejected | Cancelled}` as one
//! logical operation across two independent registries.
//!
//! The coordinator only talks to the registries through [`VesselPort`] and
//! [`BerthPort`]. It serializes transitions per vessel id, bounds every
//! registry call with a timeout, and reports divergence between the two
//! registries as [`WorkflowError::PartialFailure`] instead of hiding it.
//!
//! [`reconcile`] finds and repairs divergent workflow instances after the fact.

pub mod coordinator;
pub mod error;
pub mod locks;
pub mod ports;
pub mod reconcile;
pub mod transition;

pub use coordinator::{Allocation, AllocationCoordinator, DEFAULT_CALL_TIMEOUT};
pub use error::{CallFailure, StatusSnapshot, WorkflowError};
pub use locks::{TransitionGuard, TransitionLocks};
pub use ports::{blocking, BerthPort, VesselPort};
pub use reconcile::{Divergence, DivergenceKind};
pub use transition::{Command, Plan, Transition};

//! Harbor core library: domain types, indexed record store, registries.
//!
//! - [`types`]: vessel / berth-booking records and the shared status vocabulary
//! - [`backend`]: key/value persistence ([`MemoryBackend`], [`FileBackend`])
//! - [`lockfile`]: advisory locks shared across processes
//! - [`store`]: [`IndexedRecordStore`], the generic store with a key index
//! - [`registry`]: [`VesselRegistry`] and [`BerthRegistry`]
//! - [`config`] / [`paths`]: `~/.harbor/` layout and settings
//! - [`error`]: [`BackendError`], [`StoreError`], [`ConfigError`]

pub mod backend;
pub mod config;
pub mod error;
pub mod lockfile;
pub mod paths;
pub mod registry;
pub mod store;
pub mod types;

pub use backend::{FaultOp, FileBackend, MemoryBackend, SharedBackend, StateBackend};
pub use config::HarborConfig;
pub use error::{BackendError, ConfigError, StoreError};
pub use lockfile::LockFile;
pub use registry::{BerthRegistry, VesselRegistry};
pub use store::{IndexedRecordStore, IntegrityReport, Record, WriteOutcome};
pub use types::{
    ApproverId, BerthBookingRecord, BerthDetails, BookingStatus, OwnerDetails, VesselDetails,
    VesselId, VesselRecord,
};

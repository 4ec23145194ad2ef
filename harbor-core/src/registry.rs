//! Vessel and berth-booking registries.
//!
//! Thin typed façades over [`IndexedRecordStore`]. Each registry owns one
//! store and knows nothing about the other registry or about allocation
//! workflows: `update_status` writes whatever status it is given. Transition
//! legality lives with the allocation coordinator.
//!
//! # API pattern
//!
//! Both registries are cheap to clone (the store sits behind an `Arc`) and
//! can be opened three ways:
//! - `open_at(home)`: file-backed under `<home>/.harbor/stores/<name>/`
//! - `in_memory()`: fresh [`MemoryBackend`], for tests and embedding
//! - `with_backend(backend)`: any [`StateBackend`]

use std::sync::Arc;

use chrono::Utc;

use crate::backend::{FileBackend, MemoryBackend, SharedBackend};
use crate::error::StoreError;
use crate::paths;
use crate::store::{IndexedRecordStore, IntegrityReport, Record, WriteOutcome};
use crate::types::{
    ApproverId, BerthBookingRecord, BerthDetails, BookingStatus, VesselDetails, VesselId,
    VesselRecord,
};

impl Record for VesselRecord {
    const KIND: &'static str = "vessel";

    fn key(&self) -> &str {
        self.vessel_id.as_str()
    }
}

impl Record for BerthBookingRecord {
    const KIND: &'static str = "berth booking";

    fn key(&self) -> &str {
        self.vessel_id.as_str()
    }
}

pub type VesselStore = IndexedRecordStore<VesselRecord, SharedBackend>;
pub type BerthStore = IndexedRecordStore<BerthBookingRecord, SharedBackend>;

// ---------------------------------------------------------------------------
// 1. Vessel registry
// ---------------------------------------------------------------------------

/// Owns every [`VesselRecord`].
#[derive(Debug, Clone)]
pub struct VesselRegistry {
    store: Arc<VesselStore>,
}

impl VesselRegistry {
    pub fn with_backend(backend: SharedBackend) -> Self {
        Self {
            store: Arc::new(IndexedRecordStore::new(backend)),
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    /// File-backed registry at `<home>/.harbor/stores/vessels/`. No I/O
    /// until the first call.
    pub fn open_at(home: &std::path::Path) -> Self {
        Self::with_backend(Arc::new(FileBackend::new(paths::vessel_store_dir(home))))
    }

    pub fn store(&self) -> &VesselStore {
        &self.store
    }

    pub fn provision(&self) -> Result<(), StoreError> {
        self.store.provision()
    }

    /// Register a new vessel with status `New`.
    pub fn create(
        &self,
        vessel_id: VesselId,
        details: VesselDetails,
    ) -> Result<VesselRecord, StoreError> {
        let now = Utc::now();
        let record = VesselRecord {
            vessel_id,
            details,
            booking_status: BookingStatus::New,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&record)?;
        tracing::debug!(vessel_id = %record.vessel_id, "vessel registered");
        Ok(record)
    }

    /// Replace every attribute except id and status.
    pub fn update_fields(
        &self,
        vessel_id: &VesselId,
        details: VesselDetails,
    ) -> Result<VesselRecord, StoreError> {
        let outcome = self.store.modify(vessel_id.as_str(), |record| {
            if record.details == details {
                return false;
            }
            record.details = details;
            record.updated_at = Utc::now();
            true
        })?;
        Ok(outcome.into_inner())
    }

    /// Set the booking status unconditionally. Idempotent: re-applying the
    /// current status writes nothing.
    pub fn update_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
    ) -> Result<VesselRecord, StoreError> {
        let outcome = self.store.modify(vessel_id.as_str(), |record| {
            if record.booking_status == status {
                return false;
            }
            record.booking_status = status;
            record.updated_at = Utc::now();
            true
        })?;
        log_status_write("vessel", vessel_id, status, &outcome);
        Ok(outcome.into_inner())
    }

    pub fn get(&self, vessel_id: &VesselId) -> Result<VesselRecord, StoreError> {
        self.store.get(vessel_id.as_str())
    }

    /// Vessels whose owner phone number equals `owner_phone`.
    pub fn find_by_owner(&self, owner_phone: &str) -> Result<Vec<VesselRecord>, StoreError> {
        self.store
            .scan(|v| v.details.owner.owner_phone_number == owner_phone)?
            .collect()
    }

    pub fn list_all(&self) -> Result<Vec<VesselRecord>, StoreError> {
        self.store.list_all()
    }

    /// Not part of the allocation workflow.
    pub fn delete(&self, vessel_id: &VesselId) -> Result<(), StoreError> {
        self.store.delete(vessel_id.as_str())
    }

    pub fn check_integrity(&self) -> Result<IntegrityReport, StoreError> {
        self.store.check_integrity()
    }
}

// ---------------------------------------------------------------------------
// 2. Berth registry
// ---------------------------------------------------------------------------

/// Owns every [`BerthBookingRecord`], keyed by vessel id.
#[derive(Debug, Clone)]
pub struct BerthRegistry {
    store: Arc<BerthStore>,
}

impl BerthRegistry {
    pub fn with_backend(backend: SharedBackend) -> Self {
        Self {
            store: Arc::new(IndexedRecordStore::new(backend)),
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    /// File-backed registry at `<home>/.harbor/stores/berths/`.
    pub fn open_at(home: &std::path::Path) -> Self {
        Self::with_backend(Arc::new(FileBackend::new(paths::berth_store_dir(home))))
    }

    pub fn store(&self) -> &BerthStore {
        &self.store
    }

    pub fn provision(&self) -> Result<(), StoreError> {
        self.store.provision()
    }

    /// Book a berth for `vessel_id` with status `New`. One booking per vessel.
    pub fn create(
        &self,
        vessel_id: VesselId,
        details: BerthDetails,
    ) -> Result<BerthBookingRecord, StoreError> {
        let now = Utc::now();
        let record = BerthBookingRecord {
            vessel_id,
            details,
            booking_status: BookingStatus::New,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&record)?;
        tracing::debug!(vessel_id = %record.vessel_id, "berth booking registered");
        Ok(record)
    }

    /// Replace every attribute except id and status.
    pub fn update_fields(
        &self,
        vessel_id: &VesselId,
        details: BerthDetails,
    ) -> Result<BerthBookingRecord, StoreError> {
        let outcome = self.store.modify(vessel_id.as_str(), |record| {
            if record.details == details {
                return false;
            }
            record.details = details;
            record.updated_at = Utc::now();
            true
        })?;
        Ok(outcome.into_inner())
    }

    /// Set the booking status, and the approver when one is supplied.
    /// Idempotent like [`VesselRegistry::update_status`].
    pub fn update_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
        approver: Option<&ApproverId>,
    ) -> Result<BerthBookingRecord, StoreError> {
        let outcome = self.store.modify(vessel_id.as_str(), |record| {
            let approver_changed =
                approver.is_some_and(|a| record.details.approver_id.as_ref() != Some(a));
            if record.booking_status == status && !approver_changed {
                return false;
            }
            record.booking_status = status;
            if let Some(approver) = approver {
                record.details.approver_id = Some(approver.clone());
            }
            record.updated_at = Utc::now();
            true
        })?;
        log_status_write("berth booking", vessel_id, status, &outcome);
        Ok(outcome.into_inner())
    }

    pub fn get(&self, vessel_id: &VesselId) -> Result<BerthBookingRecord, StoreError> {
        self.store.get(vessel_id.as_str())
    }

    pub fn find_by_terminal_operator(
        &self,
        operator_id: &str,
    ) -> Result<Vec<BerthBookingRecord>, StoreError> {
        self.store
            .scan(|b| b.details.terminal_operator_id == operator_id)?
            .collect()
    }

    pub fn find_by_owner(&self, owner_name: &str) -> Result<Vec<BerthBookingRecord>, StoreError> {
        self.store
            .scan(|b| b.details.owner_name == owner_name)?
            .collect()
    }

    /// Bookings whose shipping agent reference equals `agent_ref`.
    pub fn find_by_shipping_agent(
        &self,
        agent_ref: &str,
    ) -> Result<Vec<BerthBookingRecord>, StoreError> {
        self.store
            .scan(|b| b.details.agent_ref_number == agent_ref)?
            .collect()
    }

    pub fn find_by_approver(
        &self,
        approver: &ApproverId,
    ) -> Result<Vec<BerthBookingRecord>, StoreError> {
        self.store
            .scan(|b| b.details.approver_id.as_ref() == Some(approver))?
            .collect()
    }

    pub fn list_all(&self) -> Result<Vec<BerthBookingRecord>, StoreError> {
        self.store.list_all()
    }

    pub fn delete(&self, vessel_id: &VesselId) -> Result<(), StoreError> {
        self.store.delete(vessel_id.as_str())
    }

    pub fn check_integrity(&self) -> Result<IntegrityReport, StoreError> {
        self.store.check_integrity()
    }
}

fn log_status_write<T>(
    kind: &'static str,
    vessel_id: &VesselId,
    status: BookingStatus,
    outcome: &WriteOutcome<T>,
) {
    if outcome.is_written() {
        tracing::debug!(kind, vessel_id = %vessel_id, %status, "status updated");
    } else {
        tracing::debug!(kind, vessel_id = %vessel_id, %status, "status already current");
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

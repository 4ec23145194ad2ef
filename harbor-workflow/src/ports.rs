//! What the coordinator needs from each registry, and nothing more.
//!
//! The registries themselves are synchronous; their port impls run each call
//! on the blocking pool so a slow backend cannot stall the runtime and the
//! coordinator can bound it with a timeout.

use std::sync::Arc;

use async_trait::async_trait;
use harbor_core::{
    ApproverId, BackendError, BerthBookingRecord, BerthRegistry, BookingStatus, StoreError,
    VesselId, VesselRecord, VesselRegistry,
};

#[async_trait]
pub trait VesselPort: Send + Sync {
    async fn get_vessel(&self, vessel_id: &VesselId) -> Result<VesselRecord, StoreError>;

    /// Must be idempotent: writing the current status succeeds and changes nothing.
    async fn update_vessel_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
    ) -> Result<VesselRecord, StoreError>;
}

#[async_trait]
pub trait BerthPort: Send + Sync {
    async fn get_berth(&self, vessel_id: &VesselId) -> Result<BerthBookingRecord, StoreError>;

    /// Must be idempotent. `approver` is recorded only when supplied.
    async fn update_berth_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
        approver: Option<&ApproverId>,
    ) -> Result<BerthBookingRecord, StoreError>;
}

// ---------------------------------------------------------------------------
// 1. Registry adapters
// ---------------------------------------------------------------------------

/// Run a synchronous registry call on the blocking pool. A panicked call
/// surfaces as a backend failure on `key`.
pub async fn blocking<T, F>(key: &str, call: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(join) => Err(StoreError::Backend {
            key: key.to_owned(),
            source: BackendError::Unavailable(format!("registry task failed: {join}")),
        }),
    }
}

#[async_trait]
impl VesselPort for VesselRegistry {
    async fn get_vessel(&self, vessel_id: &VesselId) -> Result<VesselRecord, StoreError> {
        let registry = self.clone();
        let id = vessel_id.clone();
        blocking(vessel_id.as_str(), move || registry.get(&id)).await
    }

    async fn update_vessel_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
    ) -> Result<VesselRecord, StoreError> {
        let registry = self.clone();
        let id = vessel_id.clone();
        blocking(vessel_id.as_str(), move || registry.update_status(&id, status)).await
    }
}

#[async_trait]
impl BerthPort for BerthRegistry {
    async fn get_berth(&self, vessel_id: &VesselId) -> Result<BerthBookingRecord, StoreError> {
        let registry = self.clone();
        let id = vessel_id.clone();
        blocking(vessel_id.as_str(), move || registry.get(&id)).await
    }

    async fn update_berth_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
        approver: Option<&ApproverId>,
    ) -> Result<BerthBookingRecord, StoreError> {
        let registry = self.clone();
        let id = vessel_id.clone();
        let approver = approver.cloned();
        blocking(vessel_id.as_str(), move || {
            registry.update_status(&id, status, approver.as_ref())
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// 2. Shared handles
// ---------------------------------------------------------------------------

#[async_trait]
impl<T: VesselPort + ?Sized> VesselPort for Arc<T> {
    async fn get_vessel(&self, vessel_id: &VesselId) -> Result<VesselRecord, StoreError> {
        (**self).get_vessel(vessel_id).await
    }

    async fn update_vessel_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
    ) -> Result<VesselRecord, StoreError> {
        (**self).update_vessel_status(vessel_id, status).await
    }
}

#[async_trait]
impl<T: BerthPort + ?Sized> BerthPort for Arc<T> {
    async fn get_berth(&self, vessel_id: &VesselId) -> Result<BerthBookingRecord, StoreError> {
        (**self).get_berth(vessel_id).await
    }

    async fn update_berth_status(
        &self,
        vessel_id: &VesselId,
        status: BookingStatus,
        approver: Option<&ApproverId>,
    ) -> Result<BerthBookingRecord, StoreError> {
        (**self).update_berth_status(vessel_id, status, approver).await
    }
}

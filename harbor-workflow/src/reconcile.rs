//! Offline scan for workflow instances whose two records disagree.
//!
//! Divergence is expected after a [`PartialFailure`](crate::WorkflowError::PartialFailure)
//! that nobody retried. This pass reads both registries in full and lists
//! every instance an operator (or [`AllocationCoordinator::repair`](crate::AllocationCoordinator::repair))
//! should look at. It never writes.

use std::collections::BTreeMap;

use harbor_core::{BerthRegistry, BookingStatus, StoreError, VesselId, VesselRegistry};
use serde::Serialize;

use crate::error::StatusSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// Both records exist with different statuses. Repairable.
    StatusMismatch,
    /// The vessel has left `New` but has no berth booking.
    MissingBooking,
    /// A berth booking exists for an unknown vessel.
    OrphanBooking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Divergence {
    pub vessel_id: VesselId,
    pub kind: DivergenceKind,
    pub snapshot: StatusSnapshot,
}

impl Divergence {
    pub fn is_repairable(&self) -> bool {
        self.kind == DivergenceKind::StatusMismatch
    }
}

/// Every divergent instance, ordered by vessel id.
pub fn find_divergent(
    vessels: &VesselRegistry,
    berths: &BerthRegistry,
) -> Result<Vec<Divergence>, StoreError> {
    let mut pairs: BTreeMap<VesselId, StatusSnapshot> = BTreeMap::new();
    for vessel in vessels.list_all()? {
        pairs.entry(vessel.vessel_id).or_default().vessel = Some(vessel.booking_status);
    }
    for berth in berths.list_all()? {
        pairs.entry(berth.vessel_id).or_default().berth = Some(berth.booking_status);
    }

    let divergent = pairs
        .into_iter()
        .filter_map(|(vessel_id, snapshot)| {
            let kind = classify(snapshot)?;
            Some(Divergence {
                vessel_id,
                kind,
                snapshot,
            })
        })
        .collect::<Vec<_>>();

    if !divergent.is_empty() {
        tracing::info!(count = divergent.len(), "divergent allocations found");
    }
    Ok(divergent)
}

fn classify(snapshot: StatusSnapshot) -> Option<DivergenceKind> {
    match (snapshot.vessel, snapshot.berth) {
        (Some(vessel), Some(berth)) if vessel != berth => Some(DivergenceKind::StatusMismatch),
        (Some(vessel), None) if vessel != BookingStatus::New => Some(DivergenceKind::MissingBooking),
        (None, Some(_)) => Some(DivergenceKind::OrphanBooking),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_core::{BerthDetails, VesselDetails};

    #[test]
    fn finds_each_kind_of_divergence() {
        let vessels = VesselRegistry::in_memory();
        let berths = BerthRegistry::in_memory();
        let id = |s: &str| VesselId::from(s);

        // Consistent pair.
        vessels.create(id("V1"), VesselDetails::default()).unwrap();
        berths.create(id("V1"), BerthDetails::default()).unwrap();
        // Vessel advanced, berth did not.
        vessels.create(id("V2"), VesselDetails::default()).unwrap();
        berths.create(id("V2"), BerthDetails::default()).unwrap();
        vessels.update_status(&id("V2"), BookingStatus::InProgress).unwrap();
        // Vessel registered without booking yet; normal.
        vessels.create(id("V3"), VesselDetails::default()).unwrap();
        // Vessel in progress with no booking.
        vessels.create(id("V4"), VesselDetails::default()).unwrap();
        vessels.update_status(&id("V4"), BookingStatus::InProgress).unwrap();
        // Booking with no vessel.
        berths.create(id("V5"), BerthDetails::default()).unwrap();

        let found = find_divergent(&vessels, &berths).unwrap();
        let summary: Vec<(&str, DivergenceKind)> =
            found.iter().map(|d| (d.vessel_id.as_str(), d.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("V2", DivergenceKind::StatusMismatch),
                ("V4", DivergenceKind::MissingBooking),
                ("V5", DivergenceKind::OrphanBooking),
            ]
        );
        assert!(found[0].is_repairable());
        assert!(!found[1].is_repairable());
        assert_eq!(found[0].snapshot.vessel, Some(BookingStatus::InProgress));
        assert_eq!(found[0].snapshot.berth, Some(BookingStatus::New));
    }
}

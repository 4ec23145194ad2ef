//! Domain types for the vessel and berth-booking registries.
//!
//! Field names serialize in camelCase under the historical wire names
//! (`vesselID`, `mmsiNumber`, `toID`, ...) so stored records stay readable by
//! older tooling. Booking status has exactly one spelling per state, shared by
//! both registries; see [`BookingStatus`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identity of a vessel; also the join key of its berth booking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VesselId(pub String);

impl VesselId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for VesselId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VesselId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identity of the port authority officer who approved or rejected a booking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApproverId(pub String);

impl ApproverId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApproverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ApproverId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ApproverId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Allocation status shared by `VesselRecord` and `BerthBookingRecord`.
///
/// `New -> InProgress -> {Approved | Rejected | Cancelled}`. The serialized
/// spelling is the only one ever written; `N` and `InProgress` are accepted on
/// read for records written by older tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BookingStatus {
    #[default]
    #[serde(rename = "New", alias = "N")]
    New,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
    Approved,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::New,
        BookingStatus::InProgress,
        BookingStatus::Approved,
        BookingStatus::Rejected,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::New => "New",
            BookingStatus::InProgress => "In Progress",
            BookingStatus::Approved => "Approved",
            BookingStatus::Rejected => "Rejected",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Approved | BookingStatus::Rejected | BookingStatus::Cancelled
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown booking status '{0}'; expected: New, In Progress, Approved, Rejected, Cancelled")]
pub struct ParseStatusError(pub String);

impl FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "new" | "n" => Ok(BookingStatus::New),
            "inprogress" => Ok(BookingStatus::InProgress),
            "approved" => Ok(BookingStatus::Approved),
            "rejected" => Ok(BookingStatus::Rejected),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            _ => Err(ParseStatusError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Vessel
// ---------------------------------------------------------------------------

/// Registered owner of a vessel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDetails {
    pub owner_name: String,
    pub owner_phone_number: String,
    #[serde(rename = "ownerAddressLine1")]
    pub owner_address_line1: String,
    #[serde(rename = "ownerAddressLine2")]
    pub owner_address_line2: String,
    #[serde(rename = "ownerAddressLine3")]
    pub owner_address_line3: String,
    pub owner_city: String,
    pub owner_state: String,
    pub owner_post_code: String,
    pub owner_country: String,
}

/// Every mutable vessel attribute. `update_fields` replaces this as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselDetails {
    pub vessel_name: String,
    pub vessel_type: String,
    pub vessel_class: String,
    pub sin: String,
    pub mmsi_number: String,
    /// Historical spelling kept on the wire.
    #[serde(rename = "portOfRegisteration")]
    pub port_of_registration: String,
    #[serde(flatten)]
    pub owner: OwnerDetails,
}

/// A vessel as persisted by the vessel registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselRecord {
    #[serde(rename = "vesselID")]
    pub vessel_id: VesselId,
    #[serde(flatten)]
    pub details: VesselDetails,
    #[serde(rename = "berthBookingStatus")]
    pub booking_status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Berth booking
// ---------------------------------------------------------------------------

/// Every mutable berth-booking attribute, the approver included.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BerthDetails {
    pub vessel_name: String,
    pub vessel_type: String,
    pub vessel_class: String,
    pub shipping_line: String,
    /// Shipping agent reference.
    pub agent_ref_number: String,
    pub arrival_port: String,
    pub inbound_voyage_no: String,
    pub outbound_voyage_no: String,
    pub arrive_from: String,
    pub terminal: String,
    pub remarks: String,
    pub rotation_number: String,
    /// Terminal operator.
    #[serde(rename = "toID")]
    pub terminal_operator_id: String,
    #[serde(
        rename = "approverID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub approver_id: Option<ApproverId>,
    pub mmsi_number: String,
    #[serde(rename = "portOfRegisteration")]
    pub port_of_registration: String,
    pub owner_name: String,
    pub owner_phone_number: String,
}

/// A berth booking as persisted by the berth registry, keyed by vessel id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BerthBookingRecord {
    #[serde(rename = "vesselID")]
    pub vessel_id: VesselId,
    #[serde(flatten)]
    pub details: BerthDetails,
    #[serde(rename = "berthBookingStatus")]
    pub booking_status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Status vocabulary parsing and record serialisation cases.
//!
//! Each `#[case]` is isolated: no shared state.

use chrono::Utc;
use harbor_core::{
    ApproverId, BerthBookingRecord, BerthDetails, BookingStatus, OwnerDetails, VesselDetails,
    VesselId, VesselRecord,
};
use rstest::rstest;

#[rstest]
#[case("New", BookingStatus::New)]
#[case("N", BookingStatus::New)]
#[case("In Progress", BookingStatus::InProgress)]
#[case("in-progress", BookingStatus::InProgress)]
#[case("InProgress", BookingStatus::InProgress)]
#[case("approved", BookingStatus::Approved)]
#[case("Rejected", BookingStatus::Rejected)]
#[case("Canceled", BookingStatus::Cancelled)]
fn parses_status_spellings(#[case] input: &str, #[case] expected: BookingStatus) {
    assert_eq!(input.parse::<BookingStatus>().expect("parse"), expected);
}

#[test]
fn unknown_status_is_rejected() {
    let err = "Allocated".parse::<BookingStatus>().unwrap_err();
    assert!(err.to_string().contains("Allocated"));
}

#[rstest]
#[case(BookingStatus::New, "\"New\"")]
#[case(BookingStatus::InProgress, "\"In Progress\"")]
#[case(BookingStatus::Approved, "\"Approved\"")]
#[case(BookingStatus::Rejected, "\"Rejected\"")]
#[case(BookingStatus::Cancelled, "\"Cancelled\"")]
fn every_status_has_one_written_spelling(#[case] status: BookingStatus, #[case] json: &str) {
    assert_eq!(serde_json::to_string(&status).unwrap(), json);
    assert_eq!(format!("\"{status}\""), json, "Display and serde must agree");
}

#[test]
fn legacy_vessel_json_is_readable() {
    let legacy = r#"{
        "vesselID": "V9", "vesselName": "Old Timer", "vesselType": "Tanker",
        "sin": "S1", "mmsiNumber": "1", "portOfRegisteration": "Monrovia",
        "ownerName": "X", "ownerPhoneNumber": "9", "ownerAddressLine1": "",
        "ownerAddressLine2": "", "ownerAddressLine3": "", "ownerCity": "",
        "ownerState": "", "ownerPostCode": "", "ownerCountry": "",
        "vesselClass": "Aframax", "berthBookingStatus": "N",
        "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
    }"#;
    let record: VesselRecord = serde_json::from_str(legacy).expect("legacy record");
    assert_eq!(record.booking_status, BookingStatus::New);
    assert_eq!(record.details.port_of_registration, "Monrovia");

    let rewritten = serde_json::to_value(&record).unwrap();
    assert_eq!(rewritten["berthBookingStatus"], "New");
}

#[test]
fn full_records_survive_json() {
    let now = Utc::now();
    let vessel = VesselRecord {
        vessel_id: VesselId::from("V1"),
        details: VesselDetails {
            vessel_name: "Nordic Star".into(),
            owner: OwnerDetails {
                owner_address_line3: "Level 3".into(),
                ..Default::default()
            },
            ..Default::default()
        },
        booking_status: BookingStatus::InProgress,
        created_at: now,
        updated_at: now,
    };
    let berth = BerthBookingRecord {
        vessel_id: VesselId::from("V1"),
        details: BerthDetails {
            approver_id: Some(ApproverId::from("A1")),
            inbound_voyage_no: "IN-042".into(),
            ..Default::default()
        },
        booking_status: BookingStatus::Approved,
        created_at: now,
        updated_at: now,
    };

    let v: VesselRecord = serde_json::from_str(&serde_json::to_string(&vessel).unwrap()).unwrap();
    let b: BerthBookingRecord =
        serde_json::from_str(&serde_json::to_string(&berth).unwrap()).unwrap();
    assert_eq!(v, vessel);
    assert_eq!(b, berth);
}

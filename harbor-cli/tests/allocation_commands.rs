use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use harbor_core::{BerthRegistry, BookingStatus, VesselId, VesselRegistry};

fn harbor_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("harbor"));
    cmd.env("HOME", home).env("USERPROFILE", home).env_remove("RUST_LOG");
    cmd
}

fn seed(home: &Path, id: &str) {
    harbor_cmd(home).args(["vessel", "create", id]).assert().success();
    harbor_cmd(home).args(["berth", "create", id]).assert().success();
}

fn statuses(home: &Path, id: &str) -> (BookingStatus, BookingStatus) {
    let id = VesselId::from(id);
    (
        VesselRegistry::open_at(home).get(&id).expect("vessel").booking_status,
        BerthRegistry::open_at(home).get(&id).expect("berth").booking_status,
    )
}

#[test]
fn request_then_approve_without_daemon() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "V1");

    harbor_cmd(home.path())
        .args(["allocation", "request", "V1"])
        .assert()
        .success()
        .stdout(contains("'V1' is now").and(contains("In Progress")));
    assert_eq!(
        statuses(home.path(), "V1"),
        (BookingStatus::InProgress, BookingStatus::InProgress)
    );

    harbor_cmd(home.path())
        .args(["allocation", "approve", "V1", "--approver", "A1"])
        .assert()
        .success();
    assert_eq!(
        statuses(home.path(), "V1"),
        (BookingStatus::Approved, BookingStatus::Approved)
    );
    let berth = BerthRegistry::open_at(home.path()).get(&VesselId::from("V1")).unwrap();
    assert_eq!(berth.details.approver_id.map(|a| a.0), Some("A1".to_string()));
}

#[test]
fn illegal_transition_fails_without_retry_hint() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "V1");

    harbor_cmd(home.path())
        .args(["allocation", "reject", "V1", "--approver", "A1"])
        .assert()
        .failure()
        .stderr(contains("cannot reject vessel 'V1'"))
        .stderr(contains("safe to retry").not());
}

#[test]
fn unknown_vessel_is_reported() {
    let home = TempDir::new().expect("home");
    harbor_cmd(home.path())
        .args(["allocation", "cancel", "GHOST"])
        .assert()
        .failure()
        .stderr(contains("vessel 'GHOST' not found"));
}

#[test]
fn approve_requires_approver() {
    let home = TempDir::new().expect("home");
    harbor_cmd(home.path())
        .args(["allocation", "approve", "V1"])
        .assert()
        .failure()
        .stderr(contains("--approver"));
}

#[test]
fn check_finds_and_repairs_divergence() {
    let home = TempDir::new().expect("home");
    seed(home.path(), "V1");
    // Simulate an interrupted transition: vessel advanced, booking did not.
    VesselRegistry::open_at(home.path())
        .update_status(&VesselId::from("V1"), BookingStatus::InProgress)
        .unwrap();

    let output = harbor_cmd(home.path())
        .args(["allocation", "check", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["divergent"][0]["vesselId"], "V1");
    assert_eq!(report["divergent"][0]["kind"], "status_mismatch");

    harbor_cmd(home.path())
        .args(["allocation", "check", "--repair"])
        .assert()
        .success()
        .stdout(contains("repaired"));
    assert_eq!(
        statuses(home.path(), "V1"),
        (BookingStatus::InProgress, BookingStatus::InProgress)
    );

    harbor_cmd(home.path())
        .args(["allocation", "check"])
        .assert()
        .success()
        .stdout(contains("No divergent allocations"));
}

#[test]
fn daemon_status_reports_not_running() {
    let home = TempDir::new().expect("home");
    let output = harbor_cmd(home.path())
        .args(["daemon", "status"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["running"], false);

    harbor_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

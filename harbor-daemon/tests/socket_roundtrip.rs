//! Full daemon over a real Unix socket in a temporary home.

use std::path::Path;
use std::time::Duration;

use harbor_core::{paths, BerthDetails, BerthRegistry, VesselDetails, VesselId, VesselRegistry};
use harbor_daemon::{request, request_stop, DaemonError, DaemonRequest};

fn seed(home: &Path) {
    let vessels = VesselRegistry::open_at(home);
    let berths = BerthRegistry::open_at(home);
    vessels.provision().unwrap();
    berths.provision().unwrap();
    vessels.create(VesselId::from("V1"), VesselDetails::default()).unwrap();
    berths.create(VesselId::from("V1"), BerthDetails::default()).unwrap();
}

async fn wait_for_socket(home: &Path) {
    let socket = paths::socket_path(home);
    for _ in 0..100 {
        if socket.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("daemon socket never appeared at {}", socket.display());
}

async fn call(home: &Path, req: DaemonRequest) -> Result<serde_json::Value, DaemonError> {
    let home = home.to_path_buf();
    tokio::task::spawn_blocking(move || request(&home, &req))
        .await
        .expect("client task")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn allocation_roundtrip_and_stop() {
    let home = tempfile::TempDir::new().unwrap();
    seed(home.path());

    let daemon = tokio::spawn(harbor_daemon::run(home.path().to_path_buf()));
    wait_for_socket(home.path()).await;

    let status = call(home.path(), DaemonRequest::Status).await.expect("status");
    assert_eq!(status["running"], true);
    assert_eq!(status["vessels"], 1);

    let v1 = VesselId::from("V1");
    let data = call(home.path(), DaemonRequest::RequestAllocation { vessel_id: v1.clone() })
        .await
        .expect("request");
    assert_eq!(data["status"], "In Progress");

    let err = call(home.path(), DaemonRequest::RequestAllocation { vessel_id: v1.clone() })
        .await
        .unwrap_err();
    match err {
        DaemonError::Remote { kind, retryable, .. } => {
            assert_eq!(kind, "illegal_transition");
            assert!(!retryable);
        }
        other => panic!("expected remote error, got {other}"),
    }

    let home_path = home.path().to_path_buf();
    tokio::task::spawn_blocking(move || request_stop(&home_path))
        .await
        .unwrap()
        .expect("stop");
    tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon exits after stop")
        .unwrap()
        .expect("clean shutdown");

    assert!(!paths::socket_path(home.path()).exists(), "socket removed on exit");
    // State was written through to the file-backed stores.
    let berths = BerthRegistry::open_at(home.path());
    assert_eq!(
        berths.get(&v1).unwrap().booking_status,
        harbor_core::BookingStatus::InProgress
    );
}

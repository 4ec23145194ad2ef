//! Newline-delimited JSON over the daemon's Unix socket.
//!
//! One request per line, one response per line:
//!
//! ```text
//! {"op":"approve_allocation","vessel_id":"V1","approver_id":"A1"}
//! {"ok":true,"data":{"vesselId":"V1","status":"Approved","resumed":false}}
//! {"ok":false,"error":{"kind":"illegal_transition","message":"...","vessel_id":"V1",
//!   "snapshot":{"vessel":"Approved","berth":"Approved"},"retryable":false}}
//! ```

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use harbor_core::{paths::socket_path, ApproverId, StoreError, VesselId};
use harbor_workflow::{StatusSnapshot, WorkflowError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};

/// Every operation the daemon serves. Unknown `op` values fail to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DaemonRequest {
    Status,
    Stop,
    RequestAllocation {
        vessel_id: VesselId,
    },
    ApproveAllocation {
        vessel_id: VesselId,
        approver_id: ApproverId,
    },
    RejectAllocation {
        vessel_id: VesselId,
        approver_id: ApproverId,
    },
    CancelAllocation {
        vessel_id: VesselId,
    },
    GetVessel {
        vessel_id: VesselId,
    },
    GetBerth {
        vessel_id: VesselId,
    },
    ListVessels,
    ListBerths,
    /// Workflow instances whose vessel and berth booking disagree.
    Divergent,
    Repair {
        vessel_id: VesselId,
    },
}

/// Structured failure: enough to decide whether a retry is safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_id: Option<VesselId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<StatusSnapshot>,
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            vessel_id: None,
            snapshot: None,
            retryable: false,
        }
    }
}

impl From<&WorkflowError> for ErrorBody {
    fn from(err: &WorkflowError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            vessel_id: Some(err.vessel_id().clone()),
            snapshot: Some(err.snapshot()),
            retryable: err.is_retryable(),
        }
    }
}

impl From<&StoreError> for ErrorBody {
    fn from(err: &StoreError) -> Self {
        let kind = match err {
            StoreError::NotFound { .. } => "not_found",
            StoreError::AlreadyExists { .. } => "already_exists",
            StoreError::InvalidKey { .. } => "invalid_key",
            StoreError::Inconsistent { .. } => "inconsistent",
            _ => "store_error",
        };
        Self {
            retryable: matches!(err, StoreError::Backend { .. }),
            ..Self::new(kind, err.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(body: impl Into<ErrorBody>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(body.into()),
        }
    }

    pub fn into_data(self) -> Result<Value, DaemonError> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        let body = self
            .error
            .unwrap_or_else(|| ErrorBody::new("unknown", "unknown daemon error"));
        Err(DaemonError::Remote {
            kind: body.kind,
            message: body.message,
            retryable: body.retryable,
        })
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    Ok(serde_json::from_str(line.trim_end())?)
}

/// Send a request and unwrap the response payload.
pub fn request(home: &Path, request: &DaemonRequest) -> Result<Value, DaemonError> {
    send_request(home, request)?.into_data()
}

/// Status with a short retry window, for callers racing a daemon start.
pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let mut attempt = 0;
    loop {
        match request(home, &DaemonRequest::Status) {
            Err(DaemonError::DaemonNotRunning { .. }) if attempt < 4 => {
                attempt += 1;
                sleep(Duration::from_millis(100));
            }
            other => return other,
        }
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    request(home, &DaemonRequest::Stop).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_core::BookingStatus;

    #[test]
    fn requests_are_tagged_by_op() {
        let request = DaemonRequest::ApproveAllocation {
            vessel_id: VesselId::from("V1"),
            approver_id: ApproverId::from("A1"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"op": "approve_allocation", "vessel_id": "V1", "approver_id": "A1"})
        );

        let parsed: DaemonRequest = serde_json::from_str(r#"{"op":"list_vessels"}"#).unwrap();
        assert_eq!(parsed, DaemonRequest::ListVessels);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let parsed = serde_json::from_str::<DaemonRequest>(r#"{"op":"drop_tables"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn workflow_error_body_carries_snapshot() {
        let err = WorkflowError::IllegalTransition {
            vessel_id: VesselId::from("V1"),
            transition: harbor_workflow::Transition::Approve,
            snapshot: StatusSnapshot {
                vessel: Some(BookingStatus::Approved),
                berth: Some(BookingStatus::Approved),
            },
        };
        let response = DaemonResponse::error(&err);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "illegal_transition");
        assert_eq!(json["error"]["snapshot"]["vessel"], "Approved");
        assert_eq!(json["error"]["retryable"], false);
    }

    #[test]
    fn remote_failure_becomes_error() {
        let response = DaemonResponse::error(ErrorBody::new("not_found", "vessel 'V9' not found"));
        match response.into_data() {
            Err(DaemonError::Remote { kind, message, .. }) => {
                assert_eq!(kind, "not_found");
                assert!(message.contains("V9"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn missing_socket_means_not_running() {
        let home = tempfile::TempDir::new().unwrap();
        let err = send_request(home.path(), &DaemonRequest::Status).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}

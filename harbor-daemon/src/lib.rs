//! Allocation daemon: owns the registries and one coordinator, and serves
//! typed requests over a Unix socket so every caller shares the same
//! per-vessel transition locks.

mod error;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request, request_status, request_stop, send_request, DaemonRequest, DaemonResponse, ErrorBody,
};
pub use runtime::{dispatch, run, start_blocking, DaemonState};

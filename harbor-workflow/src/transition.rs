//! The allocation state machine.
//!
//! ```text
//! New --request--> In Progress --approve--> Approved
//!  |                    |-------reject----> Rejected
//!  +------cancel--------+-------cancel----> Cancelled
//! ```
//!
//! The vessel's status is authoritative. A transition is legal when the
//! vessel sits in one of its predecessor states, or when an earlier attempt
//! already advanced the vessel but not the berth booking (see [`Plan::Resume`]).

use std::fmt;

use harbor_core::{ApproverId, BookingStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Request,
    Approve,
    Reject,
    Cancel,
}

/// How a legal transition will be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// The vessel is in a predecessor state; advance both records.
    Advance,
    /// The vessel already holds the target but the berth booking still sits
    /// in a predecessor state; finish the interrupted transition.
    Resume,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::Request,
        Transition::Approve,
        Transition::Reject,
        Transition::Cancel,
    ];

    pub fn target(self) -> BookingStatus {
        match self {
            Transition::Request => BookingStatus::InProgress,
            Transition::Approve => BookingStatus::Approved,
            Transition::Reject => BookingStatus::Rejected,
            Transition::Cancel => BookingStatus::Cancelled,
        }
    }

    pub fn predecessors(self) -> &'static [BookingStatus] {
        match self {
            Transition::Request => &[BookingStatus::New],
            Transition::Approve | Transition::Reject => &[BookingStatus::InProgress],
            Transition::Cancel => &[BookingStatus::New, BookingStatus::InProgress],
        }
    }

    /// Decide whether this transition may run given both records' current
    /// status. `None` means it is illegal.
    pub fn plan(self, vessel: BookingStatus, berth: BookingStatus) -> Option<Plan> {
        let predecessors = self.predecessors();
        if predecessors.contains(&vessel) {
            return Some(Plan::Advance);
        }
        if vessel == self.target() && berth != vessel && predecessors.contains(&berth) {
            return Some(Plan::Resume);
        }
        None
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Request => "request",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coordinator operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Request,
    Approve(ApproverId),
    Reject(ApproverId),
    Cancel,
}

impl Command {
    pub fn transition(&self) -> Transition {
        match self {
            Command::Request => Transition::Request,
            Command::Approve(_) => Transition::Approve,
            Command::Reject(_) => Transition::Reject,
            Command::Cancel => Transition::Cancel,
        }
    }

    pub fn approver(&self) -> Option<&ApproverId> {
        match self {
            Command::Approve(approver) | Command::Reject(approver) => Some(approver),
            Command::Request | Command::Cancel => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use BookingStatus::*;

    #[rstest]
    #[case(Transition::Request, New, true)]
    #[case(Transition::Request, InProgress, false)]
    #[case(Transition::Approve, InProgress, true)]
    #[case(Transition::Approve, New, false)]
    #[case(Transition::Approve, Approved, false)]
    #[case(Transition::Reject, InProgress, true)]
    #[case(Transition::Reject, Cancelled, false)]
    #[case(Transition::Cancel, New, true)]
    #[case(Transition::Cancel, InProgress, true)]
    #[case(Transition::Cancel, Rejected, false)]
    fn advance_requires_predecessor(
        #[case] transition: Transition,
        #[case] vessel: BookingStatus,
        #[case] legal: bool,
    ) {
        let plan = transition.plan(vessel, vessel);
        assert_eq!(plan == Some(Plan::Advance), legal, "{transition} from {vessel}");
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        for transition in Transition::ALL {
            for status in BookingStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
                assert_eq!(transition.plan(status, status), None, "{transition} from {status}");
            }
        }
    }

    #[test]
    fn interrupted_transition_resumes() {
        assert_eq!(Transition::Request.plan(InProgress, New), Some(Plan::Resume));
        assert_eq!(Transition::Approve.plan(Approved, InProgress), Some(Plan::Resume));
        assert_eq!(Transition::Cancel.plan(Cancelled, New), Some(Plan::Resume));
    }

    #[test]
    fn resume_does_not_cross_outcomes() {
        // Vessel approved, berth stuck: rejecting or cancelling is still illegal.
        assert_eq!(Transition::Reject.plan(Approved, InProgress), None);
        assert_eq!(Transition::Cancel.plan(Approved, InProgress), None);
        // Both already at the target: nothing to resume.
        assert_eq!(Transition::Approve.plan(Approved, Approved), None);
    }

    #[test]
    fn command_carries_approver_only_for_decisions() {
        let approver = ApproverId::from("A1");
        assert_eq!(Command::Approve(approver.clone()).approver(), Some(&approver));
        assert_eq!(Command::Reject(approver).transition(), Transition::Reject);
        assert_eq!(Command::Cancel.approver(), None);
    }
}

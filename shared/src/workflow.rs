//! Incident status labels and the suggested review path. Any status may
//! be chosen; the path only drives the one-click "next step" action.

use serde::{Deserialize, Serialize};

use crate::model::IncidentStatus;

pub const STATUS_UPDATE_FAILED: &str = "Failed to update report status. Please try again.";
pub const STATUS_UPDATE_OFFLINE: &str = "Error updating report status. Please check your connection.";

const SUGGESTED_PATH: [IncidentStatus; 5] = [
    IncidentStatus::Pending,
    IncidentStatus::Investigating,
    IncidentStatus::Approved,
    IncidentStatus::InProgress,
    IncidentStatus::Resolved,
];

#[must_use]
pub fn suggested_next(status: IncidentStatus) -> Option<IncidentStatus> {
    let pos = SUGGESTED_PATH.iter().position(|s| *s == status)?;
    SUGGESTED_PATH.get(pos + 1).copied()
}

#[must_use]
pub const fn label(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Pending => "Pending Review",
        IncidentStatus::Investigating => "Investigating",
        IncidentStatus::Approved => "Approved",
        IncidentStatus::InProgress => "In Progress",
        IncidentStatus::Resolved => "Resolved",
        IncidentStatus::Rejected => "Rejected",
    }
}

#[must_use]
pub const fn description(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Pending => "Awaiting initial review",
        IncidentStatus::Investigating => "Under detailed investigation",
        IncidentStatus::Approved => "Verified and approved for response",
        IncidentStatus::InProgress => "Responders are working on it",
        IncidentStatus::Resolved => "Issue has been resolved",
        IncidentStatus::Rejected => "Report rejected or invalid",
    }
}

/// Button text for moving *into* `next`.
#[must_use]
pub const fn action_label(next: IncidentStatus) -> &'static str {
    match next {
        IncidentStatus::Pending => "Reopen",
        IncidentStatus::Investigating => "Start Review",
        IncidentStatus::Approved => "Approve",
        IncidentStatus::InProgress => "Dispatch Response",
        IncidentStatus::Resolved => "Mark Resolved",
        IncidentStatus::Rejected => "Reject",
    }
}

#[must_use]
pub const fn badge_color(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Pending => "yellow",
        IncidentStatus::Investigating => "purple",
        IncidentStatus::Approved => "green",
        IncidentStatus::InProgress => "blue",
        IncidentStatus::Resolved => "gray",
        IncidentStatus::Rejected => "red",
    }
}

/// Approving a report credits its reporter.
#[must_use]
pub const fn awards_points(status: IncidentStatus) -> bool {
    matches!(status, IncidentStatus::Approved)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOption {
    pub status: IncidentStatus,
    pub label: String,
    pub description: String,
    pub color: String,
}

impl From<IncidentStatus> for StatusOption {
    fn from(status: IncidentStatus) -> Self {
        Self {
            status,
            label: label(status).to_string(),
            description: description(status).to_string(),
            color: badge_color(status).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub to: IncidentStatus,
    pub action: String,
}

/// Everything an admin status picker needs for one incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusControl {
    pub current: StatusOption,
    pub suggested: Option<Transition>,
    pub options: Vec<StatusOption>,
}

impl StatusControl {
    #[must_use]
    pub fn for_status(current: IncidentStatus) -> Self {
        Self {
            current: current.into(),
            suggested: suggested_next(current).map(|to| Transition {
                to,
                action: action_label(to).to_string(),
            }),
            options: IncidentStatus::ALL.iter().copied().map(StatusOption::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_path() {
        assert_eq!(suggested_next(IncidentStatus::Pending), Some(IncidentStatus::Investigating));
        assert_eq!(suggested_next(IncidentStatus::Investigating), Some(IncidentStatus::Approved));
        assert_eq!(suggested_next(IncidentStatus::Approved), Some(IncidentStatus::InProgress));
        assert_eq!(suggested_next(IncidentStatus::InProgress), Some(IncidentStatus::Resolved));
        assert_eq!(suggested_next(IncidentStatus::Resolved), None);
        assert_eq!(suggested_next(IncidentStatus::Rejected), None);
    }

    #[test]
    fn test_control_offers_every_status() {
        let control = StatusControl::for_status(IncidentStatus::Resolved);
        assert_eq!(control.options.len(), IncidentStatus::ALL.len());
        assert!(control.suggested.is_none());
        assert_eq!(control.current.label, "Resolved");

        let control = StatusControl::for_status(IncidentStatus::Investigating);
        let suggested = control.suggested.unwrap();
        assert_eq!(suggested.to, IncidentStatus::Approved);
        assert_eq!(suggested.action, "Approve");
    }

    #[test]
    fn test_only_approval_awards_points() {
        assert!(awards_points(IncidentStatus::Approved));
        assert!(!awards_points(IncidentStatus::Resolved));
    }
}

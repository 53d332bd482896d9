//! Workflow enums persisted as lowercase strings.
//!
//! Every enum here round-trips through its `as_str` form, which is exactly
//! the value stored in the warehouse column and in JSON snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a persisted string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Workflow status of an intervention.
    Status, "status" {
        /// New, unassigned.
        Open => "open",
        /// Claimed by a worker (human or AI agent).
        Assigned => "assigned",
        /// An agent is (re)building a plan.
        Planning => "planning",
        /// Plan is ready and needs human sign-off.
        AwaitingApproval => "awaiting_approval",
        /// Plan approved, action being taken.
        Executing => "executing",
        /// Human working without a plan/execute cycle.
        InProgress => "in_progress",
        /// Waiting on something external.
        Blocked => "blocked",
        Resolved => "resolved",
        Closed => "closed",
        /// Execution failed and needs review.
        Failed => "failed",
        Escalated => "escalated",
        /// Deferred until `snoozed_until`.
        Snoozed => "snoozed",
    }
}

impl Status {
    /// Statuses excluded from "open" lookups (dedup, `find_open`).
    pub const CLOSED_SET: &'static [Status] = &[Status::Closed, Status::Resolved];

    /// Statuses a worker is actively holding.
    pub const ACTIVE_SET: &'static [Status] = &[
        Status::Assigned,
        Status::InProgress,
        Status::Planning,
        Status::AwaitingApproval,
        Status::Executing,
    ];

    /// Terminal states are retained forever but never transition again
    /// through snooze.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Resolved | Status::Closed | Status::Failed)
    }

    /// Whether this status counts as open for deduplication.
    pub fn is_open(&self) -> bool {
        !Status::CLOSED_SET.contains(self)
    }
}

string_enum! {
    /// Task priority. Ordering for work queues is given by [`Priority::rank`].
    Priority, "priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl Priority {
    /// Sort rank: critical first (1), low last (4).
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 1,
            Priority::High => 2,
            Priority::Medium => 3,
            Priority::Low => 4,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

string_enum! {
    /// Kind of worker an intervention is assigned to.
    AssigneeType, "assignee type" {
        Human => "human",
        AiAgent => "ai_agent",
    }
}

string_enum! {
    PlanStatus, "plan status" {
        None => "none",
        Planning => "planning",
        Planned => "planned",
        Approved => "approved",
        Rejected => "rejected",
    }
}

string_enum! {
    ApprovalStatus, "approval status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

string_enum! {
    ExecutionStatus, "execution status" {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Resolution type counted as a successful fix in agent performance.
pub const RESOLUTION_FIXED: &str = "fixed";

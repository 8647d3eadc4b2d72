use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteStatus;

/// Timestamp column stamped when a transition is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampField {
    DecidedAt,
    CustomerApprovedAt,
    SentAt,
}

impl TimestampField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::DecidedAt => "decided_at",
            Self::CustomerApprovedAt => "customer_approved_at",
            Self::SentAt => "sent_at",
        }
    }
}

/// Status precondition a write must still satisfy when it reaches the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusGuard {
    Exactly(QuoteStatus),
    AnyOf(Vec<QuoteStatus>),
    NoneOf(Vec<QuoteStatus>),
}

impl StatusGuard {
    pub fn admits(&self, current: QuoteStatus) -> bool {
        match self {
            Self::Exactly(expected) => *expected == current,
            Self::AnyOf(allowed) => allowed.contains(&current),
            Self::NoneOf(excluded) => !excluded.contains(&current),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Apply { from: QuoteStatus, to: QuoteStatus, stamp: Option<TimestampField> },
    /// Already at the requested outcome; nothing to write.
    Settled(QuoteStatus),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Any enumerated target is accepted.
    #[default]
    Permissive,
    /// Only the predecessor table below is accepted.
    Strict,
}

impl StatusPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Permissive
        }
    }

    pub fn allows(&self, from: QuoteStatus, to: QuoteStatus) -> bool {
        match self.predecessors(to) {
            None => true,
            Some(allowed) => allowed.contains(&from),
        }
    }

    /// Statuses a quote may leave to reach `to`; `None` means any.
    pub fn predecessors(&self, to: QuoteStatus) -> Option<&'static [QuoteStatus]> {
        match self {
            Self::Permissive => None,
            Self::Strict => Some(strict_predecessors(to)),
        }
    }
}

fn strict_predecessors(target: QuoteStatus) -> &'static [QuoteStatus] {
    use QuoteStatus::{
        Approved, Cancelled, CustomerApproved, Draft, PendingApproval, Rejected, Sent,
    };

    match target {
        Draft => &[Rejected],
        PendingApproval => &[Draft, Rejected],
        Approved | Rejected => &[Draft, PendingApproval],
        Sent => &[Approved],
        CustomerApproved => &[Approved, Sent],
        Cancelled => &[Draft, PendingApproval, Approved, Rejected, Sent],
    }
}

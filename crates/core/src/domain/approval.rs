use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{QuoteId, QuoteStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn target_status(&self) -> QuoteStatus {
        match self {
            Self::Approved => QuoteStatus::Approved,
            Self::Rejected => QuoteStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of `quote_approvals`: the internal approver's recorded decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub id: String,
    pub quote_id: QuoteId,
    pub decision: Decision,
    pub comment: Option<String>,
    pub actor_name: String,
    pub actor_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

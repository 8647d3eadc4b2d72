use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteId;

/// Row of `customer_acceptances`. `ip` and `user_agent` are kept for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAcceptance {
    pub id: String,
    pub quote_id: QuoteId,
    pub signer_name: String,
    pub signer_company: Option<String>,
    pub po_number: Option<String>,
    pub comment: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Network provenance captured by the transport for an acceptance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientOrigin {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

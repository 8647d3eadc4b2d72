use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::quote::QuoteId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEventType {
    Created,
    Approved,
    Rejected,
    CustomerAccepted,
    StatusChanged,
}

impl QuoteEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::CustomerAccepted => "customer_accepted",
            Self::StatusChanged => "status_changed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "customer_accepted" => Some(Self::CustomerAccepted),
            "status_changed" => Some(Self::StatusChanged),
            _ => None,
        }
    }
}

impl fmt::Display for QuoteEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    System,
    User,
    Customer,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Customer => "customer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "customer" => Some(Self::Customer),
            _ => None,
        }
    }
}

/// Append-only audit entry for a state-changing action on a quote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteEvent {
    pub id: String,
    pub quote_id: QuoteId,
    #[serde(rename = "type")]
    pub event_type: QuoteEventType,
    pub actor_type: ActorType,
    pub actor_name: Option<String>,
    pub actor_email: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl QuoteEvent {
    pub fn new(quote_id: QuoteId, event_type: QuoteEventType, actor_type: ActorType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            quote_id,
            event_type,
            actor_type,
            actor_name: None,
            actor_email: None,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_actor(mut self, name: impl Into<String>, email: Option<String>) -> Self {
        self.actor_name = Some(name.into());
        self.actor_email = email;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

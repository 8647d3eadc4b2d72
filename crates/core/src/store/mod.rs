//! Persistence port for the quote lifecycle.
//!
//! Every mutation after creation goes through [`QuoteStore::apply_transition`],
//! which must check the [`StatusGuard`] and perform the status write, the audit
//! record and the event append as one atomic unit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audit::QuoteEvent;
use crate::domain::acceptance::CustomerAcceptance;
use crate::domain::approval::ApprovalDecision;
use crate::domain::quote::{LineItem, Quote, QuoteId, QuoteStatus, QuoteSummary};
use crate::flows::{StatusGuard, TimestampField};

pub mod memory;

pub use memory::InMemoryQuoteStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store decode error: {0}")]
    Decode(String),
    #[error("store constraint violated: {0}")]
    Constraint(String),
}

/// A quote together with everything that must be committed alongside it.
#[derive(Clone, Debug)]
pub struct NewQuoteRecord {
    pub quote: Quote,
    pub items: Vec<LineItem>,
    pub event: QuoteEvent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuoteLookup<'a> {
    Id(&'a QuoteId),
    ApprovalToken(&'a str),
    CustomerViewToken(&'a str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditRecord {
    Approval(ApprovalDecision),
    Acceptance(CustomerAcceptance),
}

#[derive(Clone, Debug)]
pub struct TransitionWrite {
    pub quote_id: QuoteId,
    pub guard: StatusGuard,
    pub to: QuoteStatus,
    pub stamp: Option<TimestampField>,
    pub at: DateTime<Utc>,
    pub record: Option<AuditRecord>,
    pub event: QuoteEvent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The guard no longer held; nothing was written.
    GuardRejected { current: QuoteStatus },
    NotFound,
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Persists the quote, its line items and its creation event together.
    async fn insert_quote(&self, record: NewQuoteRecord) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_quotes(&self, limit: u32) -> Result<Vec<QuoteSummary>, StoreError>;

    async fn find_quote(&self, lookup: QuoteLookup<'_>) -> Result<Option<Quote>, StoreError>;

    /// Ordered by `sort_order`, then insertion order.
    async fn line_items(&self, quote_id: &QuoteId) -> Result<Vec<LineItem>, StoreError>;

    /// Newest first.
    async fn recent_events(
        &self,
        quote_id: &QuoteId,
        limit: u32,
    ) -> Result<Vec<QuoteEvent>, StoreError>;

    async fn approval_records(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<ApprovalDecision>, StoreError>;

    async fn acceptance_records(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<CustomerAcceptance>, StoreError>;

    async fn apply_transition(&self, write: TransitionWrite) -> Result<WriteOutcome, StoreError>;
}

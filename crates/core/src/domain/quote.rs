use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    PendingApproval,
    Approved,
    Rejected,
    Sent,
    CustomerApproved,
    Cancelled,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 7] = [
        QuoteStatus::Draft,
        QuoteStatus::PendingApproval,
        QuoteStatus::Approved,
        QuoteStatus::Rejected,
        QuoteStatus::Sent,
        QuoteStatus::CustomerApproved,
        QuoteStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Sent => "sent",
            Self::CustomerApproved => "customer_approved",
            Self::Cancelled => "cancelled",
        }
    }

    /// True once the internal approver has recorded a decision.
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| DomainError::UnknownStatus(value.to_string()))
    }
}

/// One priced row of a quote. Immutable once the quote is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub quote_id: QuoteId,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub unit_price_cents: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    pub line_total_cents: i64,
    pub sort_order: i32,
}

impl LineItem {
    pub fn view(&self) -> LineItemView {
        LineItemView {
            description: self.description.clone(),
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            discount_percent: self.discount_percent,
            line_total_cents: self.line_total_cents,
            sort_order: self.sort_order,
        }
    }
}

/// Line item as shown on the token-gated approval and customer pages.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineItemView {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub unit_price_cents: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    pub line_total_cents: i64,
    pub sort_order: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub customer_company: String,
    pub customer_name: String,
    pub customer_email: String,
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: QuoteStatus,
    pub approval_token: String,
    pub customer_view_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    pub customer_approved_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn totals_balanced(&self) -> bool {
        self.subtotal_cents.checked_add(self.tax_cents) == Some(self.total_cents)
    }

    pub fn summary(&self) -> QuoteSummary {
        QuoteSummary {
            id: self.id.clone(),
            customer_company: self.customer_company.clone(),
            customer_name: self.customer_name.clone(),
            customer_email: self.customer_email.clone(),
            currency: self.currency.clone(),
            total_cents: self.total_cents,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Token-page projection. Never carries either capability token.
    pub fn projection(&self) -> QuoteProjection {
        QuoteProjection {
            id: self.id.clone(),
            customer_company: self.customer_company.clone(),
            customer_name: self.customer_name.clone(),
            customer_email: self.customer_email.clone(),
            currency: self.currency.clone(),
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            status: self.status,
            valid_until: self.valid_until,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub id: QuoteId,
    pub customer_company: String,
    pub customer_name: String,
    pub customer_email: String,
    pub currency: String,
    pub total_cents: i64,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteProjection {
    pub id: QuoteId,
    pub customer_company: String,
    pub customer_name: String,
    pub customer_email: String,
    pub currency: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub status: QuoteStatus,
    pub valid_until: Option<NaiveDate>,
}

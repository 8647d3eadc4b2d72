use serde::Serialize;

use crate::audit::QuoteEvent;
use crate::domain::acceptance::CustomerAcceptance;
use crate::domain::approval::ApprovalDecision;
use crate::domain::quote::{LineItem, LineItemView, Quote, QuoteId, QuoteProjection, QuoteStatus};
use crate::pricing::format_money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedQuote {
    pub id: QuoteId,
    pub quote_url: String,
    pub approval_url: String,
    pub customer_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayTotals {
    pub subtotal: String,
    pub discount: String,
    pub tax: String,
    pub total: String,
}

impl DisplayTotals {
    pub fn for_quote(quote: &Quote) -> Self {
        Self {
            subtotal: format_money(quote.subtotal_cents, &quote.currency),
            discount: format_money(quote.discount_cents, &quote.currency),
            tax: format_money(quote.tax_cents, &quote.currency),
            total: format_money(quote.total_cents, &quote.currency),
        }
    }
}

/// Everything the internal team sees for one quote.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuoteDetail {
    pub quote: Quote,
    pub items: Vec<LineItem>,
    pub events: Vec<QuoteEvent>,
    pub approvals: Vec<ApprovalDecision>,
    pub acceptances: Vec<CustomerAcceptance>,
    pub display: DisplayTotals,
}

/// What an approval or customer token holder may see.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortalView {
    pub quote: QuoteProjection,
    pub items: Vec<LineItemView>,
}

/// Result of a decision or acceptance. `applied` is false for replays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionReceipt {
    pub status: QuoteStatus,
    pub applied: bool,
}

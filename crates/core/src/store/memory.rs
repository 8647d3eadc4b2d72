use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::audit::QuoteEvent;
use crate::domain::acceptance::CustomerAcceptance;
use crate::domain::approval::ApprovalDecision;
use crate::domain::quote::{LineItem, Quote, QuoteId, QuoteSummary};
use crate::flows::TimestampField;

use super::{
    AuditRecord, NewQuoteRecord, QuoteLookup, QuoteStore, StoreError, TransitionWrite,
    WriteOutcome,
};

#[derive(Default)]
struct MemoryState {
    quotes: Vec<Quote>,
    items: Vec<LineItem>,
    events: Vec<QuoteEvent>,
    approvals: Vec<ApprovalDecision>,
    acceptances: Vec<CustomerAcceptance>,
}

/// Process-local store for tests and embedding. Each operation holds one
/// mutex for its whole check-and-write.
#[derive(Default)]
pub struct InMemoryQuoteStore {
    state: Mutex<MemoryState>,
}

impl InMemoryQuoteStore {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Every event recorded for the quote, oldest first.
    pub fn all_events(&self, quote_id: &QuoteId) -> Vec<QuoteEvent> {
        self.state().events.iter().filter(|event| &event.quote_id == quote_id).cloned().collect()
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn insert_quote(&self, record: NewQuoteRecord) -> Result<(), StoreError> {
        let mut state = self.state();
        let quote = &record.quote;
        if quote.approval_token == quote.customer_view_token {
            return Err(StoreError::Constraint("quote tokens must differ".to_owned()));
        }
        let clash = state.quotes.iter().any(|existing| {
            existing.id == quote.id
                || [&existing.approval_token, &existing.customer_view_token]
                    .into_iter()
                    .any(|token| {
                        token == &quote.approval_token || token == &quote.customer_view_token
                    })
        });
        if clash {
            return Err(StoreError::Constraint(format!("quote `{}` collides", quote.id)));
        }

        state.items.extend(record.items);
        state.events.push(record.event);
        state.quotes.push(record.quote);
        Ok(())
    }

    async fn list_quotes(&self, limit: u32) -> Result<Vec<QuoteSummary>, StoreError> {
        let state = self.state();
        let mut quotes: Vec<&Quote> = state.quotes.iter().rev().collect();
        quotes.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(quotes.into_iter().take(limit as usize).map(Quote::summary).collect())
    }

    async fn find_quote(&self, lookup: QuoteLookup<'_>) -> Result<Option<Quote>, StoreError> {
        let state = self.state();
        let found = state.quotes.iter().find(|quote| match lookup {
            QuoteLookup::Id(id) => &quote.id == id,
            QuoteLookup::ApprovalToken(token) => quote.approval_token == token,
            QuoteLookup::CustomerViewToken(token) => quote.customer_view_token == token,
        });
        Ok(found.cloned())
    }

    async fn line_items(&self, quote_id: &QuoteId) -> Result<Vec<LineItem>, StoreError> {
        let state = self.state();
        let mut items: Vec<LineItem> =
            state.items.iter().filter(|item| &item.quote_id == quote_id).cloned().collect();
        items.sort_by_key(|item| item.sort_order);
        Ok(items)
    }

    async fn recent_events(
        &self,
        quote_id: &QuoteId,
        limit: u32,
    ) -> Result<Vec<QuoteEvent>, StoreError> {
        let state = self.state();
        let mut events: Vec<&QuoteEvent> =
            state.events.iter().rev().filter(|event| &event.quote_id == quote_id).collect();
        events.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(events.into_iter().take(limit as usize).cloned().collect())
    }

    async fn approval_records(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<ApprovalDecision>, StoreError> {
        let state = self.state();
        Ok(state.approvals.iter().filter(|record| &record.quote_id == quote_id).cloned().collect())
    }

    async fn acceptance_records(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<CustomerAcceptance>, StoreError> {
        let state = self.state();
        Ok(state
            .acceptances
            .iter()
            .filter(|record| &record.quote_id == quote_id)
            .cloned()
            .collect())
    }

    async fn apply_transition(&self, write: TransitionWrite) -> Result<WriteOutcome, StoreError> {
        let mut state = self.state();
        let Some(quote) = state.quotes.iter_mut().find(|quote| quote.id == write.quote_id) else {
            return Ok(WriteOutcome::NotFound);
        };
        if !write.guard.admits(quote.status) {
            return Ok(WriteOutcome::GuardRejected { current: quote.status });
        }

        quote.status = write.to;
        quote.updated_at = write.at;
        match write.stamp {
            Some(TimestampField::DecidedAt) => quote.decided_at = Some(write.at),
            Some(TimestampField::CustomerApprovedAt) => quote.customer_approved_at = Some(write.at),
            Some(TimestampField::SentAt) => quote.sent_at = Some(write.at),
            None => {}
        }
        match write.record {
            Some(AuditRecord::Approval(record)) => state.approvals.push(record),
            Some(AuditRecord::Acceptance(record)) => state.acceptances.push(record),
            None => {}
        }
        state.events.push(write.event);
        Ok(WriteOutcome::Applied)
    }
}

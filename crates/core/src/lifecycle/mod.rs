//! Quote lifecycle use cases: create, read, status updates, approver
//! decisions and customer acceptance.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{ActorType, QuoteEvent, QuoteEventType};
use crate::domain::acceptance::{ClientOrigin, CustomerAcceptance};
use crate::domain::approval::{ApprovalDecision, Decision};
use crate::domain::quote::{LineItem, Quote, QuoteId, QuoteStatus, QuoteSummary};
use crate::errors::{ApplicationError, DomainError};
use crate::flows::{
    FlowTransitionError, QuoteStateMachine, StatusGuard, StatusPolicy, Transition,
};
use crate::pricing::{compute_totals, line_total_cents, LineAmounts, PricingError};
use crate::store::{
    AuditRecord, NewQuoteRecord, QuoteLookup, QuoteStore, TransitionWrite, WriteOutcome,
};
use crate::tokens::{CapabilityTokens, DEFAULT_TOKEN_BYTES};

pub mod input;
pub mod view;

pub use input::{
    AcceptanceInput, CreateQuoteInput, DecisionInput, LineItemInput, StatusUpdateInput,
};
pub use view::{CreatedQuote, DisplayTotals, PortalView, QuoteDetail, TransitionReceipt};

pub const LIST_LIMIT: u32 = 50;
pub const EVENT_LIMIT: u32 = 50;
const STATUS_UPDATE_ATTEMPTS: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub policy: StatusPolicy,
    pub token_bytes: usize,
    /// Prefix for the access URLs returned on create, e.g. `https://quotes.example.com`.
    pub public_base_url: Option<String>,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            policy: StatusPolicy::Permissive,
            token_bytes: DEFAULT_TOKEN_BYTES,
            public_base_url: None,
        }
    }
}

#[derive(Clone)]
pub struct QuoteLifecycle {
    store: Arc<dyn QuoteStore>,
    machine: QuoteStateMachine,
    settings: LifecycleSettings,
}

impl QuoteLifecycle {
    pub fn new(store: Arc<dyn QuoteStore>, settings: LifecycleSettings) -> Self {
        Self { store, machine: QuoteStateMachine::new(settings.policy), settings }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    pub async fn create(
        &self,
        input: &CreateQuoteInput,
    ) -> Result<CreatedQuote, ApplicationError> {
        let validated = input.validate()?;
        let amounts: Vec<LineAmounts> =
            validated.lines.iter().map(|line| line.amounts.clone()).collect();
        let totals =
            compute_totals(&amounts, Some(validated.tax_cents)).map_err(DomainError::from)?;
        let tokens = CapabilityTokens::issue(self.settings.token_bytes)?;

        let now = Utc::now();
        let quote_id = QuoteId::generate();
        let items = validated
            .lines
            .iter()
            .map(|line| {
                Ok(LineItem {
                    id: Uuid::new_v4().to_string(),
                    quote_id: quote_id.clone(),
                    description: line.description.clone(),
                    quantity: line.amounts.quantity,
                    unit_price_cents: line.amounts.unit_price_cents,
                    discount_percent: line.amounts.discount_percent,
                    line_total_cents: line_total_cents(&line.amounts)?,
                    sort_order: line.sort_order,
                })
            })
            .collect::<Result<Vec<_>, PricingError>>()
            .map_err(DomainError::from)?;

        let quote = Quote {
            id: quote_id.clone(),
            customer_company: validated.customer_company,
            customer_name: validated.customer_name,
            customer_email: validated.customer_email,
            currency: validated.currency,
            valid_until: validated.valid_until,
            subtotal_cents: totals.subtotal_cents,
            discount_cents: totals.discount_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
            status: self.machine.initial_state(),
            approval_token: tokens.approval,
            customer_view_token: tokens.customer_view,
            created_at: now,
            updated_at: now,
            decided_at: None,
            customer_approved_at: None,
            sent_at: None,
        };
        let created = CreatedQuote {
            id: quote_id.clone(),
            quote_url: self.url(&format!("/quote/{quote_id}")),
            approval_url: self.url(&format!("/approve/{}", quote.approval_token)),
            customer_url: self.url(&format!("/q/{}", quote.customer_view_token)),
        };
        let event = QuoteEvent::new(quote_id.clone(), QuoteEventType::Created, ActorType::System)
            .at(now)
            .with_metadata("source", "api");
        let line_count = items.len();

        self.store.insert_quote(NewQuoteRecord { quote, items, event }).await?;

        info!(
            event_name = "quote.created",
            quote_id = %quote_id,
            line_count,
            total_cents = totals.total_cents,
            "quote created"
        );
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<QuoteSummary>, ApplicationError> {
        Ok(self.store.list_quotes(LIST_LIMIT).await?)
    }

    pub async fn fetch_internal(&self, id: &QuoteId) -> Result<QuoteDetail, ApplicationError> {
        let quote = self.find(QuoteLookup::Id(id)).await?;
        let items = self.store.line_items(&quote.id).await?;
        let events = self.store.recent_events(&quote.id, EVENT_LIMIT).await?;
        let approvals = self.store.approval_records(&quote.id).await?;
        let acceptances = self.store.acceptance_records(&quote.id).await?;
        let display = DisplayTotals::for_quote(&quote);

        Ok(QuoteDetail { quote, items, events, approvals, acceptances, display })
    }

    pub async fn fetch_for_approval(&self, token: &str) -> Result<PortalView, ApplicationError> {
        self.portal_view(QuoteLookup::ApprovalToken(token)).await
    }

    pub async fn fetch_for_customer(&self, token: &str) -> Result<PortalView, ApplicationError> {
        self.portal_view(QuoteLookup::CustomerViewToken(token)).await
    }

    /// Generic status change. A missing target is a no-op for an existing
    /// quote. The write is conditional on the status read just before it; a
    /// lost race is retried from a fresh read.
    pub async fn update_status(
        &self,
        id: &QuoteId,
        input: &StatusUpdateInput,
    ) -> Result<(), ApplicationError> {
        let target = input.target()?;

        for attempt in 1..=STATUS_UPDATE_ATTEMPTS {
            let quote = self.find(QuoteLookup::Id(id)).await?;
            let Some(target) = target else {
                return Ok(());
            };
            let Transition::Apply { from, to, stamp } =
                self.machine.update_status(quote.status, target)?
            else {
                return Ok(());
            };

            let at = Utc::now();
            let event = QuoteEvent::new(
                quote.id.clone(),
                QuoteEventType::StatusChanged,
                ActorType::System,
            )
            .at(at)
            .with_metadata("from", from.as_str())
            .with_metadata("to", to.as_str());
            let write = TransitionWrite {
                quote_id: quote.id.clone(),
                guard: StatusGuard::Exactly(from),
                to,
                stamp,
                at,
                record: None,
                event,
            };

            match self.store.apply_transition(write).await? {
                WriteOutcome::Applied => {
                    info!(
                        event_name = "quote.status.changed",
                        quote_id = %quote.id,
                        from = %from,
                        to = %to,
                        "quote status changed"
                    );
                    return Ok(());
                }
                WriteOutcome::NotFound => {
                    return Err(ApplicationError::NotFound("quote".to_owned()));
                }
                WriteOutcome::GuardRejected { current } => {
                    warn!(
                        event_name = "quote.status.contended",
                        quote_id = %quote.id,
                        expected = %from,
                        current = %current,
                        attempt,
                        "quote status moved before update; retrying"
                    );
                }
            }
        }

        Err(ApplicationError::Conflict(format!(
            "quote `{id}` changed concurrently; gave up after {STATUS_UPDATE_ATTEMPTS} attempts"
        )))
    }

    /// Approver decision through the approval token. Once decided, further
    /// submissions replay the recorded status and write nothing.
    pub async fn decide(
        &self,
        token: &str,
        input: &DecisionInput,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let decision = input.validate()?;
        let quote = self.find(QuoteLookup::ApprovalToken(token)).await?;
        let verdict = decision.decision;

        let Transition::Apply { to, stamp, .. } = self.machine.decide(quote.status, verdict)? else {
            info!(
                event_name = "quote.decision.replayed",
                quote_id = %quote.id,
                status = %quote.status,
                "decision already recorded"
            );
            return Ok(TransitionReceipt { status: quote.status, applied: false });
        };

        let at = Utc::now();
        let comment = decision.comment.clone().map(Value::from).unwrap_or(Value::Null);
        let event_type = match verdict {
            Decision::Approved => QuoteEventType::Approved,
            Decision::Rejected => QuoteEventType::Rejected,
        };
        let event = QuoteEvent::new(quote.id.clone(), event_type, ActorType::User)
            .at(at)
            .with_actor(decision.name.clone(), decision.email.clone())
            .with_metadata("comment", comment);
        let record = ApprovalDecision {
            id: Uuid::new_v4().to_string(),
            quote_id: quote.id.clone(),
            decision: verdict,
            comment: decision.comment,
            actor_name: decision.name,
            actor_email: decision.email,
            created_at: at,
        };
        let write = TransitionWrite {
            quote_id: quote.id.clone(),
            guard: self.machine.decision_guard(verdict),
            to,
            stamp,
            at,
            record: Some(AuditRecord::Approval(record)),
            event,
        };

        let outcome = self.store.apply_transition(write).await?;
        let receipt = self.settle(outcome, to, |current| self.machine.decide(current, verdict))?;
        if receipt.applied {
            info!(
                event_name = "quote.decided",
                quote_id = %quote.id,
                decision = %verdict,
                "approval decision recorded"
            );
        }
        Ok(receipt)
    }

    /// Customer acceptance through the customer view token. Accepting an
    /// accepted quote replays `customer_approved` and writes nothing.
    pub async fn accept(
        &self,
        token: &str,
        input: &AcceptanceInput,
        origin: ClientOrigin,
    ) -> Result<TransitionReceipt, ApplicationError> {
        let acceptance = input.validate()?;
        let quote = self.find(QuoteLookup::CustomerViewToken(token)).await?;

        let Transition::Apply { to, stamp, .. } = self.machine.accept(quote.status)? else {
            info!(
                event_name = "quote.acceptance.replayed",
                quote_id = %quote.id,
                "acceptance already recorded"
            );
            return Ok(TransitionReceipt { status: quote.status, applied: false });
        };

        let at = Utc::now();
        let po_number = acceptance.po_number.clone().map(Value::from).unwrap_or(Value::Null);
        let event = QuoteEvent::new(
            quote.id.clone(),
            QuoteEventType::CustomerAccepted,
            ActorType::Customer,
        )
        .at(at)
        .with_actor(acceptance.signer_name.clone(), None)
        .with_metadata("poNumber", po_number);
        let record = CustomerAcceptance {
            id: Uuid::new_v4().to_string(),
            quote_id: quote.id.clone(),
            signer_name: acceptance.signer_name,
            signer_company: acceptance.signer_company,
            po_number: acceptance.po_number,
            comment: acceptance.comment,
            ip: origin.ip,
            user_agent: origin.user_agent,
            created_at: at,
        };
        let write = TransitionWrite {
            quote_id: quote.id.clone(),
            guard: self.machine.acceptance_guard(),
            to,
            stamp,
            at,
            record: Some(AuditRecord::Acceptance(record)),
            event,
        };

        let outcome = self.store.apply_transition(write).await?;
        let receipt = self.settle(outcome, to, |current| self.machine.accept(current))?;
        if receipt.applied {
            info!(
                event_name = "quote.accepted",
                quote_id = %quote.id,
                "customer acceptance recorded"
            );
        }
        Ok(receipt)
    }

    /// Turns a guarded write outcome into a receipt. When the guard lost a
    /// race the rules are re-run against the status that won.
    fn settle(
        &self,
        outcome: WriteOutcome,
        applied_status: QuoteStatus,
        replan: impl Fn(QuoteStatus) -> Result<Transition, FlowTransitionError>,
    ) -> Result<TransitionReceipt, ApplicationError> {
        match outcome {
            WriteOutcome::Applied => {
                Ok(TransitionReceipt { status: applied_status, applied: true })
            }
            WriteOutcome::NotFound => Err(ApplicationError::NotFound("quote".to_owned())),
            WriteOutcome::GuardRejected { current } => match replan(current)? {
                Transition::Settled(status) => Ok(TransitionReceipt { status, applied: false }),
                Transition::Apply { .. } => Err(ApplicationError::Conflict(format!(
                    "quote moved to `{current}` while the request was processed"
                ))),
            },
        }
    }

    async fn portal_view(&self, lookup: QuoteLookup<'_>) -> Result<PortalView, ApplicationError> {
        let quote = self.find(lookup).await?;
        let items = self.store.line_items(&quote.id).await?;
        Ok(PortalView {
            quote: quote.projection(),
            items: items.iter().map(LineItem::view).collect(),
        })
    }

    async fn find(&self, lookup: QuoteLookup<'_>) -> Result<Quote, ApplicationError> {
        match self.store.find_quote(lookup).await? {
            Some(quote) => Ok(quote),
            None => {
                let by = match lookup {
                    QuoteLookup::Id(_) => "id",
                    QuoteLookup::ApprovalToken(_) => "approval_token",
                    QuoteLookup::CustomerViewToken(_) => "customer_view_token",
                };
                warn!(event_name = "quote.lookup.missed", lookup = by, "quote not found");
                Err(ApplicationError::NotFound("quote".to_owned()))
            }
        }
    }

    fn url(&self, path: &str) -> String {
        match self.settings.public_base_url.as_deref() {
            Some(base) => format!("{}{path}", base.trim_end_matches('/')),
            None => path.to_owned(),
        }
    }
}

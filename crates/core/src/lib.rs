pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod lifecycle;
pub mod pricing;
pub mod store;
pub mod tokens;

pub use audit::{ActorType, QuoteEvent, QuoteEventType};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::acceptance::{ClientOrigin, CustomerAcceptance};
pub use domain::approval::{ApprovalDecision, Decision};
pub use domain::quote::{LineItem, Quote, QuoteId, QuoteStatus, QuoteSummary};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{QuoteStateMachine, StatusPolicy};
pub use lifecycle::{LifecycleSettings, QuoteLifecycle};
pub use pricing::{compute_totals, format_money, PricingError, QuoteTotals};
pub use store::{InMemoryQuoteStore, QuoteStore, StoreError};
pub use tokens::{random_token, CapabilityTokens, TokenError};

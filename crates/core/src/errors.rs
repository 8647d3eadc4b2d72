use thiserror::Error;

use crate::{
    domain::quote::QuoteStatus, flows::FlowTransitionError, pricing::PricingError,
    store::StoreError, tokens::TokenError,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid quote transition from {from} to {to}")]
    InvalidQuoteTransition { from: QuoteStatus, to: QuoteStatus },
    #[error("unknown quote status `{0}`")]
    UnknownStatus(String),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("{0}")]
    Validation(String),
}

impl From<FlowTransitionError> for DomainError {
    fn from(value: FlowTransitionError) -> Self {
        match value {
            FlowTransitionError::IllegalTransition { from, to } => {
                Self::InvalidQuoteTransition { from, to }
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<TokenError> for ApplicationError {
    fn from(value: TokenError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<FlowTransitionError> for ApplicationError {
    fn from(value: FlowTransitionError) -> Self {
        Self::Domain(value.into())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text that is safe to show to any caller.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested quote could not be found.",
            Self::Conflict { .. } => "The quote changed while the request was processed.",
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Internal { .. } => "internal_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// Validation, not-found and conflict messages describe the caller's own
    /// input; internal ones may carry store details.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error @ DomainError::InvalidQuoteTransition { .. }) => {
                Self::Conflict { message: error.to_string(), correlation_id }
            }
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::NotFound(what) => {
                Self::NotFound { message: format!("{what} not found"), correlation_id }
            }
            ApplicationError::Conflict(message) => Self::Conflict { message, correlation_id },
            ApplicationError::Persistence(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::quote::QuoteStatus;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::pricing::PricingError;
    use crate::store::StoreError;

    #[test]
    fn validation_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::Validation(
            "lineItems must contain at least one item".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ref message,
            } if correlation_id == "req-1" && message.contains("lineItems")
        ));
        assert_eq!(interface.code(), "validation_error");
    }

    #[test]
    fn pricing_overflow_is_a_validation_failure() {
        let interface =
            ApplicationError::from(DomainError::from(PricingError::Overflow)).into_interface("r");
        assert!(matches!(interface, InterfaceError::BadRequest { .. }));
    }

    #[test]
    fn not_found_keeps_the_subject_but_nothing_else() {
        let interface =
            ApplicationError::NotFound("quote".to_owned()).into_interface("req-2");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.message(), "quote not found");
        assert_eq!(interface.user_message(), "The requested quote could not be found.");
    }

    #[test]
    fn illegal_transition_maps_to_conflict() {
        let interface = ApplicationError::from(DomainError::InvalidQuoteTransition {
            from: QuoteStatus::Draft,
            to: QuoteStatus::Sent,
        })
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert_eq!(interface.message(), "invalid quote transition from draft to sent");
    }

    #[test]
    fn store_error_maps_to_internal() {
        let interface = ApplicationError::from(StoreError::Backend("database is locked".into()))
            .into_interface("req-4");

        assert!(interface.is_internal());
        assert_eq!(interface.code(), "internal_error");
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
        assert_eq!(interface.correlation_id(), "req-4");
    }
}

//! Request payloads accepted by the lifecycle and their validation.
//!
//! Numbers arrive as raw JSON numbers so that non-integers and out-of-range
//! values are reported as validation failures rather than decode failures.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::domain::approval::Decision;
use crate::domain::quote::QuoteStatus;
use crate::errors::DomainError;
use crate::pricing::{decimal_from_raw, LineAmounts};

pub const MAX_COMMENT_CHARS: usize = 2000;
const DEFAULT_CURRENCY: &str = "USD";
/// Largest integer an IEEE double represents exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price_cents: f64,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default)]
    pub sort_order: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuoteInput {
    #[serde(default)]
    pub customer_company: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub tax_cents: f64,
    #[serde(default)]
    pub line_items: Vec<LineItemInput>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct StatusUpdateInput {
    /// Outer `None` when the field is omitted, `Some(None)` for an explicit `null`.
    #[serde(default, deserialize_with = "present")]
    pub status: Option<Option<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DecisionInput {
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceInput {
    #[serde(default)]
    pub signer_name: String,
    #[serde(default)]
    pub signer_company: Option<String>,
    #[serde(default)]
    pub po_number: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedLine {
    pub description: String,
    pub amounts: LineAmounts,
    pub sort_order: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedQuote {
    pub customer_company: String,
    pub customer_name: String,
    pub customer_email: String,
    pub currency: String,
    pub valid_until: Option<NaiveDate>,
    pub tax_cents: i64,
    pub lines: Vec<ValidatedLine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedDecision {
    pub decision: Decision,
    pub name: String,
    pub email: Option<String>,
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedAcceptance {
    pub signer_name: String,
    pub signer_company: Option<String>,
    pub po_number: Option<String>,
    pub comment: Option<String>,
}

impl CreateQuoteInput {
    pub fn validate(&self) -> Result<ValidatedQuote, DomainError> {
        if self.line_items.is_empty() {
            return Err(invalid("lineItems must contain at least one item"));
        }
        let lines = self
            .line_items
            .iter()
            .enumerate()
            .map(|(index, line)| line.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        let customer_email = required(&self.customer_email, "customerEmail")?;
        if !looks_like_email(&customer_email) {
            return Err(invalid("customerEmail must be a valid email address"));
        }
        let currency = match optional(self.currency.as_deref()) {
            Some(code) if code.chars().count() == 3 => code,
            Some(_) => return Err(invalid("currency must be exactly 3 characters")),
            None => DEFAULT_CURRENCY.to_owned(),
        };
        let tax_cents = whole_number(self.tax_cents, "taxCents")?;
        if tax_cents < 0 {
            return Err(invalid("taxCents must not be negative"));
        }

        Ok(ValidatedQuote {
            customer_company: required(&self.customer_company, "customerCompany")?,
            customer_name: required(&self.customer_name, "customerName")?,
            customer_email,
            currency,
            valid_until: parse_valid_until(self.valid_until.as_deref())?,
            tax_cents,
            lines,
        })
    }
}

impl LineItemInput {
    fn validate(&self, index: usize) -> Result<ValidatedLine, DomainError> {
        let field = |name: &str| format!("lineItems[{index}].{name}");

        let description = required(&self.description, &field("description"))?;
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(invalid(format!("{} must be a positive number", field("quantity"))));
        }
        let unit_price_cents = whole_number(self.unit_price_cents, &field("unitPriceCents"))?;
        if unit_price_cents < 0 {
            return Err(invalid(format!("{} must not be negative", field("unitPriceCents"))));
        }
        if !self.discount_percent.is_finite() || !(0.0..=100.0).contains(&self.discount_percent) {
            return Err(invalid(format!("{} must be between 0 and 100", field("discountPercent"))));
        }
        let sort_order = whole_number(self.sort_order, &field("sortOrder"))?;
        let sort_order = i32::try_from(sort_order)
            .map_err(|_| invalid(format!("{} is out of range", field("sortOrder"))))?;

        let quantity = decimal_from_raw(self.quantity)?;
        if quantity <= Decimal::ZERO {
            return Err(invalid(format!("{} must be a positive number", field("quantity"))));
        }

        Ok(ValidatedLine {
            description,
            amounts: LineAmounts::new(
                quantity,
                unit_price_cents,
                decimal_from_raw(self.discount_percent)?,
            ),
            sort_order,
        })
    }
}

impl StatusUpdateInput {
    pub fn to(status: impl Into<String>) -> Self {
        Self { status: Some(Some(status.into())) }
    }

    /// `None` when the caller asked for no change. Values are matched exactly.
    pub fn target(&self) -> Result<Option<QuoteStatus>, DomainError> {
        match &self.status {
            None => Ok(None),
            Some(None) => Err(invalid("status must not be null")),
            Some(Some(raw)) => raw.parse().map(Some),
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl DecisionInput {
    pub fn validate(&self) -> Result<ValidatedDecision, DomainError> {
        let decision = match self.decision.as_str() {
            "approved" => Decision::Approved,
            "rejected" => Decision::Rejected,
            _ => return Err(invalid("decision must be `approved` or `rejected`")),
        };
        let email = optional(self.email.as_deref());
        if email.as_deref().is_some_and(|email| !looks_like_email(email)) {
            return Err(invalid("email must be a valid email address"));
        }

        Ok(ValidatedDecision {
            decision,
            name: required(&self.name, "name")?,
            email,
            comment: comment(self.comment.as_deref())?,
        })
    }
}

impl AcceptanceInput {
    pub fn validate(&self) -> Result<ValidatedAcceptance, DomainError> {
        Ok(ValidatedAcceptance {
            signer_name: required(&self.signer_name, "signerName")?,
            signer_company: optional(self.signer_company.as_deref()),
            po_number: optional(self.po_number.as_deref()),
            comment: comment(self.comment.as_deref())?,
        })
    }
}

fn invalid(message: impl Into<String>) -> DomainError {
    DomainError::Validation(message.into())
}

fn required(value: &str, field: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_owned)
}

fn comment(value: Option<&str>) -> Result<Option<String>, DomainError> {
    let comment = optional(value);
    if comment.as_deref().is_some_and(|text| text.chars().count() > MAX_COMMENT_CHARS) {
        return Err(invalid(format!("comment must be at most {MAX_COMMENT_CHARS} characters")));
    }
    Ok(comment)
}

fn whole_number(value: f64, field: &str) -> Result<i64, DomainError> {
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > MAX_EXACT_INTEGER {
        return Err(invalid(format!("{field} must be a whole number")));
    }
    Ok(value as i64)
}

fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn parse_valid_until(value: Option<&str>) -> Result<Option<NaiveDate>, DomainError> {
    let Some(raw) = optional(value) else {
        return Ok(None);
    };
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|timestamp| Some(timestamp.date_naive()))
        .map_err(|_| invalid("validUntil must be a YYYY-MM-DD date or RFC 3339 timestamp"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::approval::Decision;
    use crate::domain::quote::QuoteStatus;
    use crate::errors::DomainError;
    use crate::lifecycle::input::{
        AcceptanceInput, CreateQuoteInput, DecisionInput, LineItemInput, StatusUpdateInput,
    };

    fn line(quantity: f64, unit: f64, discount: f64) -> LineItemInput {
        LineItemInput {
            description: "Implementation services".to_owned(),
            quantity,
            unit_price_cents: unit,
            discount_percent: discount,
            sort_order: 0.0,
        }
    }

    fn create(lines: Vec<LineItemInput>) -> CreateQuoteInput {
        CreateQuoteInput {
            customer_company: "Acme Corp".to_owned(),
            customer_name: "Dana Reyes".to_owned(),
            customer_email: "dana@acme.test".to_owned(),
            currency: None,
            valid_until: None,
            tax_cents: 0.0,
            line_items: lines,
        }
    }

    fn message(error: DomainError) -> String {
        match error {
            DomainError::Validation(message) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn camel_case_payload_deserializes_with_defaults() {
        let input: CreateQuoteInput = serde_json::from_value(serde_json::json!({
            "customerCompany": "Acme",
            "customerName": "Dana",
            "customerEmail": "dana@acme.test",
            "lineItems": [{ "description": "Seat", "quantity": 2, "unitPriceCents": 500 }]
        }))
        .expect("deserialize");

        let validated = input.validate().expect("valid");
        assert_eq!(validated.currency, "USD");
        assert_eq!(validated.tax_cents, 0);
        assert_eq!(validated.lines[0].amounts.discount_percent, Decimal::ZERO);
        assert_eq!(validated.lines[0].sort_order, 0);
    }

    #[test]
    fn empty_line_list_is_rejected() {
        let error = create(Vec::new()).validate().expect_err("empty");
        assert!(message(error).contains("lineItems"));
    }

    #[test]
    fn line_numbers_are_checked() {
        assert!(create(vec![line(0.0, 100.0, 0.0)]).validate().is_err());
        assert!(create(vec![line(f64::NAN, 100.0, 0.0)]).validate().is_err());
        assert!(create(vec![line(1.0, 99.5, 0.0)]).validate().is_err());
        assert!(create(vec![line(1.0, -1.0, 0.0)]).validate().is_err());
        assert!(create(vec![line(1.0, 100.0, 101.0)]).validate().is_err());

        let error = create(vec![line(1.0, 100.0, 0.0), line(1.0, 100.0, -1.0)])
            .validate()
            .expect_err("negative discount");
        assert!(message(error).starts_with("lineItems[1].discountPercent"));

        let fractional = create(vec![line(1.5, 100.0, 12.5)]).validate().expect("valid");
        assert_eq!(fractional.lines[0].amounts.quantity, Decimal::new(15, 1));
        assert_eq!(fractional.lines[0].amounts.discount_percent, Decimal::new(125, 1));
    }

    #[test]
    fn customer_fields_are_checked() {
        let mut input = create(vec![line(1.0, 100.0, 0.0)]);
        input.customer_email = "not-an-email".to_owned();
        assert!(message(input.validate().expect_err("email")).contains("customerEmail"));

        let mut input = create(vec![line(1.0, 100.0, 0.0)]);
        input.currency = Some("EURO".to_owned());
        assert!(message(input.validate().expect_err("currency")).contains("currency"));

        let mut input = create(vec![line(1.0, 100.0, 0.0)]);
        input.customer_company = "   ".to_owned();
        assert!(message(input.validate().expect_err("company")).contains("customerCompany"));

        let mut input = create(vec![line(1.0, 100.0, 0.0)]);
        input.tax_cents = -5.0;
        assert!(message(input.validate().expect_err("tax")).contains("taxCents"));
    }

    #[test]
    fn valid_until_accepts_date_or_timestamp() {
        let mut input = create(vec![line(1.0, 100.0, 0.0)]);
        input.valid_until = Some("2026-12-31".to_owned());
        let new_year_eve = NaiveDate::from_ymd_opt(2026, 12, 31);
        assert_eq!(input.validate().expect("date").valid_until, new_year_eve);

        input.valid_until = Some("2026-12-31T08:00:00Z".to_owned());
        assert_eq!(input.validate().expect("rfc3339").valid_until, new_year_eve);

        input.valid_until = Some("next tuesday".to_owned());
        assert!(input.validate().is_err());

        input.valid_until = Some(String::new());
        assert_eq!(input.validate().expect("blank").valid_until, None);
    }

    #[test]
    fn status_update_parses_known_targets_only() {
        let none = StatusUpdateInput::default();
        assert_eq!(none.target(), Ok(None));

        let sent = StatusUpdateInput::to("sent");
        assert_eq!(sent.target(), Ok(Some(QuoteStatus::Sent)));

        let bogus = StatusUpdateInput::to("archived");
        assert_eq!(bogus.target(), Err(DomainError::UnknownStatus("archived".to_owned())));

        for raw in ["", "   ", " sent ", "Sent"] {
            assert!(StatusUpdateInput::to(raw).target().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn status_update_distinguishes_omitted_from_null() {
        let omitted: StatusUpdateInput = serde_json::from_str("{}").expect("omitted");
        assert_eq!(omitted.target(), Ok(None));

        let null: StatusUpdateInput = serde_json::from_str(r#"{"status": null}"#).expect("null");
        assert!(matches!(null.target(), Err(DomainError::Validation(_))));

        let sent: StatusUpdateInput = serde_json::from_str(r#"{"status": "sent"}"#).expect("sent");
        assert_eq!(sent.target(), Ok(Some(QuoteStatus::Sent)));
    }

    #[test]
    fn decision_requires_known_verdict_and_name() {
        let input = DecisionInput {
            decision: "approved".to_owned(),
            name: " Priya ".to_owned(),
            email: Some(String::new()),
            comment: None,
        };
        let validated = input.validate().expect("valid");
        assert_eq!(validated.decision, Decision::Approved);
        assert_eq!(validated.name, "Priya");
        assert_eq!(validated.email, None);

        let maybe = DecisionInput { decision: "maybe".to_owned(), ..input.clone() };
        assert!(maybe.validate().is_err());

        let padded = DecisionInput { decision: " approved ".to_owned(), ..input.clone() };
        assert!(padded.validate().is_err());

        let bad_email = DecisionInput { email: Some("priya@".to_owned()), ..input.clone() };
        assert!(bad_email.validate().is_err());

        let long = DecisionInput { comment: Some("x".repeat(2001)), ..input };
        assert!(message(long.validate().expect_err("too long")).contains("2000"));
    }

    #[test]
    fn acceptance_requires_signer_name() {
        let input = AcceptanceInput {
            signer_name: "Dana Reyes".to_owned(),
            signer_company: Some("  ".to_owned()),
            po_number: Some("PO-7781".to_owned()),
            comment: Some("x".repeat(2000)),
        };
        let validated = input.validate().expect("valid");
        assert_eq!(validated.signer_company, None);
        assert_eq!(validated.po_number.as_deref(), Some("PO-7781"));

        let unsigned = AcceptanceInput { signer_name: String::new(), ..input };
        assert!(message(unsigned.validate().expect_err("signer")).contains("signerName"));
    }
}

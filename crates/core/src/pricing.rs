use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("amount is too large to price")]
    Overflow,
}

/// Priced inputs of one line. Missing inputs are zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineAmounts {
    pub quantity: Decimal,
    pub unit_price_cents: i64,
    pub discount_percent: Decimal,
}

impl LineAmounts {
    pub fn new(quantity: Decimal, unit_price_cents: i64, discount_percent: Decimal) -> Self {
        Self { quantity, unit_price_cents, discount_percent }
    }

    /// Discount as applied: clamped into `[0, 100]`.
    pub fn effective_discount(&self) -> Decimal {
        self.discount_percent.clamp(Decimal::ZERO, HUNDRED)
    }

    fn gross(&self) -> Result<Decimal, PricingError> {
        self.quantity.checked_mul(Decimal::from(self.unit_price_cents)).ok_or(PricingError::Overflow)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Converts a raw JSON number into an exact decimal. NaN and infinities are
/// treated as missing.
pub fn decimal_from_raw(value: f64) -> Result<Decimal, PricingError> {
    if !value.is_finite() {
        return Ok(Decimal::ZERO);
    }
    match Decimal::from_str(&value.to_string()) {
        Ok(decimal) => Ok(decimal),
        // Sub-cent noise beyond the decimal's scale.
        Err(_) if value.abs() < 1.0 => Ok(Decimal::ZERO),
        Err(_) => Err(PricingError::Overflow),
    }
}

/// Whole cents, half away from zero.
fn round_cents(value: Decimal) -> Result<i64, PricingError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PricingError::Overflow)
}

/// `quantity × unit_price_cents × (100 − discount) / 100`, rounded to whole
/// cents and never negative.
pub fn line_total_cents(line: &LineAmounts) -> Result<i64, PricingError> {
    let keep = HUNDRED - line.effective_discount();
    let net = line
        .gross()?
        .checked_mul(keep)
        .and_then(|value| value.checked_div(HUNDRED))
        .ok_or(PricingError::Overflow)?;
    Ok(round_cents(net)?.max(0))
}

/// Cents given away by the line's discount.
pub fn line_discount_cents(line: &LineAmounts) -> Result<i64, PricingError> {
    let gross = round_cents(line.gross()?)?.max(0);
    let net = line_total_cents(line)?;
    Ok(gross.saturating_sub(net).max(0))
}

pub fn compute_totals(lines: &[LineAmounts], tax_cents: Option<i64>) -> Result<QuoteTotals, PricingError> {
    let tax_cents = tax_cents.unwrap_or(0);
    let mut subtotal_cents: i64 = 0;
    let mut discount_cents: i64 = 0;
    for line in lines {
        subtotal_cents =
            subtotal_cents.checked_add(line_total_cents(line)?).ok_or(PricingError::Overflow)?;
        discount_cents =
            discount_cents.checked_add(line_discount_cents(line)?).ok_or(PricingError::Overflow)?;
    }
    let total_cents = subtotal_cents.checked_add(tax_cents).ok_or(PricingError::Overflow)?;

    Ok(QuoteTotals { subtotal_cents, discount_cents, tax_cents, total_cents })
}

/// Display string for an amount in minor units. Presentation only.
pub fn format_money(cents: i64, currency: &str) -> String {
    let code = currency.trim().to_ascii_uppercase();
    let code = if code.is_empty() { "USD".to_owned() } else { code };
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    let amount = format!("{}.{:02}", group_thousands(magnitude / 100), magnitude % 100);

    match currency_symbol(&code) {
        Some(symbol) => format!("{sign}{symbol}{amount}"),
        None => format!("{sign}{code} {amount}"),
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        _ => None,
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

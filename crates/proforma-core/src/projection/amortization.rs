use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::time_value::level_payment;
use crate::types::*;
use crate::ProFormaResult;

/// Input for a standalone loan amortization schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationInput {
    pub principal: Money,
    /// Annual percentage rate, compounded monthly
    pub apr: Rate,
    pub term_months: u32,
    #[serde(default)]
    pub interest_only_months: u32,
}

/// A single month in the amortization schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    /// 1-based month of the loan
    pub month: u32,
    pub interest: Money,
    pub principal: Money,
    pub payment: Money,
    /// Balance outstanding after this month's payment
    pub balance: Money,
}

/// Output for a standalone amortization schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    pub rows: Vec<AmortizationRow>,
    /// Level payment over the amortizing tail (zero if there is none)
    pub amortizing_payment: Money,
    pub total_interest: Money,
    pub total_principal: Money,
}

/// Build the month-by-month schedule for a level-payment loan with an
/// optional interest-only lead-in.
///
/// Returns an empty schedule when there is nothing to amortize.
pub fn amortization_schedule(
    principal: Money,
    apr: Rate,
    term_months: u32,
    interest_only_months: u32,
) -> Vec<AmortizationRow> {
    if principal <= Decimal::ZERO || term_months == 0 {
        return Vec::new();
    }

    let monthly_rate = apr / Decimal::from(MONTHS_IN_YEAR as u32);
    let io_months = interest_only_months.min(term_months);
    let amortizing_payment = amortizing_payment(principal, monthly_rate, term_months - io_months);

    let mut rows = Vec::with_capacity(term_months as usize);
    let mut balance = principal;

    for month in 1..=term_months {
        let interest = balance * monthly_rate;
        let principal_paid = if month <= io_months {
            Decimal::ZERO
        } else if monthly_rate.abs() < crate::time_value::ZERO_RATE_EPSILON {
            amortizing_payment.min(balance)
        } else {
            (amortizing_payment - interest).min(balance)
        };

        balance = (balance - principal_paid).max(Decimal::ZERO);
        rows.push(AmortizationRow {
            month,
            interest,
            principal: principal_paid,
            payment: interest + principal_paid,
            balance,
        });
    }

    rows
}

fn amortizing_payment(principal: Money, monthly_rate: Rate, amortizing_months: u32) -> Money {
    if amortizing_months == 0 {
        return Decimal::ZERO;
    }
    level_payment(monthly_rate, amortizing_months, principal)
        .unwrap_or_else(|_| principal / Decimal::from(amortizing_months))
}

/// Build an amortization schedule wrapped in the standard envelope.
pub fn build_amortization_schedule(
    input: &AmortizationInput,
) -> ProFormaResult<ComputationOutput<AmortizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.principal <= Decimal::ZERO || input.term_months == 0 {
        warnings.push("Principal or term is zero; schedule is empty".into());
    }
    if input.interest_only_months > input.term_months {
        warnings.push(format!(
            "Interest-only period ({}) exceeds term ({}); clamped to term, principal is never repaid",
            input.interest_only_months, input.term_months
        ));
    }

    let rows = amortization_schedule(
        input.principal,
        input.apr,
        input.term_months,
        input.interest_only_months,
    );

    let io_months = input.interest_only_months.min(input.term_months);
    let amortizing_payment = if rows.is_empty() {
        Decimal::ZERO
    } else {
        amortizing_payment(
            input.principal,
            input.apr / Decimal::from(MONTHS_IN_YEAR as u32),
            input.term_months - io_months,
        )
    };

    let output = AmortizationOutput {
        total_interest: rows.iter().map(|r| r.interest).sum(),
        total_principal: rows.iter().map(|r| r.principal).sum(),
        amortizing_payment,
        rows,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization with interest-only period",
        &serde_json::json!({
            "principal": input.principal.to_string(),
            "apr": input.apr.to_string(),
            "term_months": input.term_months,
            "interest_only_months": input.interest_only_months,
        }),
        warnings,
        elapsed,
        output,
    ))
}

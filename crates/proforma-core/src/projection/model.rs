use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use super::amortization::amortization_schedule;
use super::equity::{
    allocate_distributions, equity_split, exit_valuation, investor_cash_flows, EquitySplit,
    MonthlyRecord,
};
use super::inputs::{ProFormaInput, SubscriptionMode};
use super::revenue::{compose_revenue, horizon_months};
use super::seasonality::normalize_seasonality;
use super::simulator::simulate_months;
use super::yearly::{aggregate_years, YearlyRecord};
use crate::time_value::{annualize_periodic_rate, irr_bisection, IRR_BRACKET_HIGH, IRR_BRACKET_LOW};
use crate::types::*;
use crate::ProFormaResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Investor return summary derived from the monthly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    /// Monthly IRR of F's cash flows; `None` when no root is bracketed
    pub irr_monthly: Option<Rate>,
    pub total_distributions: Money,
    pub total_distributions_f: Money,
    pub total_distributions_k: Money,
    /// Total F distributions over the in-kind value; `None` when nothing was contributed
    pub moic_f: Option<Multiple>,
    /// Lowest DSCR over months with debt service due
    pub min_dscr: Option<Decimal>,
    /// Months in which the covenant blocked a distribution
    pub gated_months: u32,
    pub ending_cash: Money,
}

/// Full projection: monthly and yearly series, equity split, exit and returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionResult {
    pub equity_fraction_f: Rate,
    pub equity_fraction_k: Rate,
    pub in_kind_value_f: Money,
    pub months: Vec<MonthlyRecord>,
    pub years: Vec<YearlyRecord>,
    pub exit_value: Money,
    pub exit_value_f: Money,
    pub exit_value_k: Money,
    /// Annualized IRR for F; `None` is distinct from a 0% return
    pub irr_annual: Option<Rate>,
    /// Trailing pre-tax income times the exit multiple
    pub exit_multiple_valuation: Money,
    /// Trailing EBITDA times the EBITDA multiple (informational)
    pub ebitda_multiple_valuation: Money,
    pub returns: ReturnMetrics,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project the restaurant pro-forma month by month.
///
/// `manual_counts`, when given, overrides any counts stored on the input for
/// manual subscription mode.
pub fn project_pro_forma(
    input: &ProFormaInput,
    manual_counts: Option<&[Decimal]>,
) -> ProFormaResult<ComputationOutput<ProjectionResult>> {
    let start = Instant::now();
    let mut warnings = input_warnings(input, manual_counts);

    let split = equity_split(input)?;
    warnings.extend(split_warnings(input, &split));

    let months = horizon_months(input.term_years);
    let seasonality = normalize_seasonality(input.revenue.seasonality.as_deref());
    let streams = compose_revenue(input, &seasonality, months, manual_counts)?;
    let schedule = amortization_schedule(
        input.loan.principal,
        input.loan.apr,
        input.loan.term_months,
        input.loan.interest_only_months,
    );
    debug!(months, loan_months = schedule.len(), "revenue and debt schedule composed");

    // Stage 1: operating months with raw distributions
    let operating = simulate_months(input, &streams, &schedule)?;
    let gated_months = operating
        .iter()
        .filter(|m| !m.distribution_permitted)
        .count() as u32;
    let min_dscr = operating.iter().filter_map(|m| m.dscr.ratio()).min();
    if let Some(low) = operating
        .iter()
        .filter(|m| m.ending_cash < input.cash.min_cash)
        .min_by_key(|m| m.ending_cash)
    {
        warnings.push(format!(
            "Cash falls below the minimum of {}: {} in month {}",
            input.cash.min_cash,
            low.ending_cash.round_dp(2),
            low.month
        ));
    }

    // Stage 2: equity split and exit proceeds
    let exit = exit_valuation(&operating, &split, input);
    let records = allocate_distributions(operating, &split, &exit);
    let years = aggregate_years(&records);
    debug!(
        exit_value = %exit.exit_value,
        gated_months,
        "monthly simulation complete"
    );

    let flows = investor_cash_flows(&split, &records);
    let irr_monthly = irr_bisection(&flows);
    let irr_annual =
        irr_monthly.and_then(|r| annualize_periodic_rate(r, MONTHS_IN_YEAR as u32));
    if irr_monthly.is_none() {
        warnings.push(format!(
            "No sign change in F's NPV between {IRR_BRACKET_LOW} and {IRR_BRACKET_HIGH}; IRR undefined"
        ));
    }

    let total_distributions_f: Money = records.iter().map(|m| m.distribution_f).sum();
    let returns = ReturnMetrics {
        irr_monthly,
        total_distributions: records.iter().map(|m| m.distribution_total).sum(),
        total_distributions_f,
        total_distributions_k: records.iter().map(|m| m.distribution_k).sum(),
        moic_f: if split.in_kind_value_f > Decimal::ZERO {
            Some(total_distributions_f / split.in_kind_value_f)
        } else {
            None
        },
        min_dscr,
        gated_months,
        ending_cash: records
            .last()
            .map(|m| m.operating.ending_cash)
            .unwrap_or(Decimal::ZERO),
    };

    for w in &warnings {
        warn!(target: "proforma::projection", "{w}");
    }

    let output = ProjectionResult {
        equity_fraction_f: split.fraction_f,
        equity_fraction_k: split.fraction_k,
        in_kind_value_f: split.in_kind_value_f,
        months: records,
        years,
        exit_value: exit.exit_value,
        exit_value_f: exit.exit_value_f,
        exit_value_k: exit.exit_value_k,
        irr_annual,
        exit_multiple_valuation: exit.exit_value,
        ebitda_multiple_valuation: exit.ebitda_valuation,
        returns,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monthly restaurant pro-forma with DSCR-gated distributions and F/K equity split",
        &serde_json::json!({
            "horizon_months": months,
            "subscription_mode": input.subscriptions.mode,
            "dscr_gate": input.loan.dscr_gate.to_string(),
            "min_cash": input.cash.min_cash.to_string(),
            "payout_ratio": input.cash.payout_ratio.to_string(),
            "exit_multiple": input.deal.exit_multiple.to_string(),
            "irr_bracket": [IRR_BRACKET_LOW.to_string(), IRR_BRACKET_HIGH.to_string()],
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn input_warnings(input: &ProFormaInput, manual_counts: Option<&[Decimal]>) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(weights) = &input.revenue.seasonality {
        if weights.len() != MONTHS_IN_YEAR {
            warnings.push(format!(
                "Seasonality has {} weights, expected {MONTHS_IN_YEAR}; using neutral seasonality",
                weights.len()
            ));
        } else if weights.iter().any(Option::is_none) {
            warnings.push("Missing seasonality weights treated as 1".into());
        }
    }

    let payout = input.cash.payout_ratio;
    if payout < Decimal::ZERO || payout > Decimal::ONE {
        warnings.push(format!(
            "Payout ratio {payout} is outside [0, 1]; distributions are floored at zero"
        ));
    }

    if input.subscriptions.mode == SubscriptionMode::Manual {
        let horizon = horizon_months(input.term_years);
        match manual_counts.or(input.subscriptions.manual_counts.as_deref()) {
            None => warnings.push(
                "Manual subscription mode without subscriber counts; subscription revenue is zero"
                    .into(),
            ),
            Some(counts) if counts.len() < horizon => warnings.push(format!(
                "{} manual subscriber counts for {horizon} months; later months bill zero subscribers",
                counts.len()
            )),
            Some(_) => {}
        }
    }

    warnings
}

fn split_warnings(input: &ProFormaInput, split: &EquitySplit) -> Vec<String> {
    let mut warnings = Vec::new();
    if input.deal.project_magnitude.is_zero() {
        warnings.push("Project magnitude is zero; F holds no equity".into());
    } else if split.is_clamped() {
        warnings.push(format!(
            "F's ownership fraction {} clamped to {}",
            split.unclamped_fraction_f.round_dp(6),
            split.fraction_f
        ));
    }
    warnings
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::inputs::ProFormaInput;
use super::simulator::OperatingMonth;
use crate::error::ProFormaError;
use crate::types::{Money, Multiple, Rate, MONTHS_IN_YEAR};
use crate::ProFormaResult;

/// Ownership split between the in-kind class (F) and the residual class (K).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquitySplit {
    /// In-kind contribution credited to F, including abated rent
    pub in_kind_value_f: Money,
    /// F's fraction after clamping to [0, 1]
    pub fraction_f: Rate,
    pub fraction_k: Rate,
    /// F's fraction before clamping
    pub unclamped_fraction_f: Rate,
}

impl EquitySplit {
    pub fn is_clamped(&self) -> bool {
        self.fraction_f != self.unclamped_fraction_f
    }

    /// Split an amount by the fixed ownership fractions.
    pub fn split(&self, amount: Money) -> (Money, Money) {
        (amount * self.fraction_f, amount * self.fraction_k)
    }
}

/// Value F's in-kind contribution and derive both ownership fractions.
///
/// Rent-free months are credited to F at the month-one gross rent. A
/// magnitude of zero gives F no ownership; a negative magnitude is rejected.
pub fn equity_split(input: &ProFormaInput) -> ProFormaResult<EquitySplit> {
    let deal = &input.deal;
    if deal.project_magnitude < Decimal::ZERO {
        return Err(ProFormaError::InvalidInput {
            field: "deal.project_magnitude".into(),
            reason: "Project magnitude cannot be negative".into(),
        });
    }

    let abated_rent =
        Decimal::from(input.occupancy.rent_free_months) * input.occupancy.monthly_gross_rent();
    let in_kind_value_f = deal.in_kind_assets + abated_rent;

    let unclamped_fraction_f = if deal.project_magnitude.is_zero() {
        Decimal::ZERO
    } else {
        in_kind_value_f / deal.project_magnitude
    };
    let fraction_f = unclamped_fraction_f.clamp(Decimal::ZERO, Decimal::ONE);

    Ok(EquitySplit {
        in_kind_value_f,
        fraction_f,
        fraction_k: Decimal::ONE - fraction_f,
        unclamped_fraction_f,
    })
}

/// Terminal valuation from the trailing twelve months.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitValuation {
    pub ttm_pre_tax_income: Money,
    pub ttm_ebitda: Money,
    /// Pre-tax multiple valuation, paid out in the final month
    pub exit_value: Money,
    pub exit_value_f: Money,
    pub exit_value_k: Money,
    /// EBITDA multiple valuation, for comparison only
    pub ebitda_valuation: Money,
}

fn floored_multiple(ttm: Money, multiple: Multiple) -> Money {
    ttm.max(Decimal::ZERO) * multiple
}

/// Value the business on its last (up to) twelve simulated months.
pub fn exit_valuation(
    months: &[OperatingMonth],
    split: &EquitySplit,
    input: &ProFormaInput,
) -> ExitValuation {
    let trailing = &months[months.len().saturating_sub(MONTHS_IN_YEAR)..];
    let ttm_pre_tax_income: Money = trailing.iter().map(|m| m.pre_tax_income).sum();
    let ttm_ebitda: Money = trailing.iter().map(|m| m.ebitda).sum();

    let exit_value = floored_multiple(ttm_pre_tax_income, input.deal.exit_multiple);
    let (exit_value_f, exit_value_k) = split.split(exit_value);

    ExitValuation {
        ttm_pre_tax_income,
        ttm_ebitda,
        exit_value,
        exit_value_f,
        exit_value_k,
        ebitda_valuation: floored_multiple(ttm_ebitda, input.deal.ebitda_multiple),
    }
}

/// A simulated month annotated with the equity split and exit proceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    #[serde(flatten)]
    pub operating: OperatingMonth,
    /// Exit proceeds paid this month; non-zero only in the final month
    pub exit_proceeds: Money,
    /// Operating distribution plus exit proceeds
    pub distribution_total: Money,
    pub distribution_f: Money,
    pub distribution_k: Money,
}

/// Annotate the simulated months with per-class distributions, adding the
/// exit proceeds to the final month.
pub fn allocate_distributions(
    months: Vec<OperatingMonth>,
    split: &EquitySplit,
    exit: &ExitValuation,
) -> Vec<MonthlyRecord> {
    let last = months.len().saturating_sub(1);
    months
        .into_iter()
        .enumerate()
        .map(|(i, operating)| {
            let exit_proceeds = if i == last {
                exit.exit_value
            } else {
                Decimal::ZERO
            };
            let distribution_total = operating.distribution + exit_proceeds;
            let (distribution_f, distribution_k) = split.split(distribution_total);
            MonthlyRecord {
                operating,
                exit_proceeds,
                distribution_total,
                distribution_f,
                distribution_k,
            }
        })
        .collect()
}

/// F's cash flows: the in-kind contribution at t = 0, then one inflow per month.
pub fn investor_cash_flows(split: &EquitySplit, months: &[MonthlyRecord]) -> Vec<Money> {
    std::iter::once(-split.in_kind_value_f)
        .chain(months.iter().map(|m| m.distribution_f))
        .collect()
}

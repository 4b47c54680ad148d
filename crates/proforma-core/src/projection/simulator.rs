use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::amortization::AmortizationRow;
use super::inputs::ProFormaInput;
use super::revenue::RevenueStreams;
use crate::error::ProFormaError;
use crate::time_value::compound_growth;
use crate::types::{Money, Rate, MONTHS_IN_YEAR};
use crate::ProFormaResult;

/// Day-count basis for the working-capital day conventions.
const DAYS_PER_MONTH: Decimal = dec!(30);

// ---------------------------------------------------------------------------
// Debt service coverage
// ---------------------------------------------------------------------------

/// Debt service coverage for one month.
///
/// `Undefined` means no debt service was due, so the covenant cannot bind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Dscr {
    Finite(Decimal),
    Undefined,
}

impl Dscr {
    /// EBITDA over scheduled debt service.
    pub fn from_coverage(ebitda: Money, debt_service: Money) -> Self {
        if debt_service > Decimal::ZERO {
            Dscr::Finite(ebitda / debt_service)
        } else {
            Dscr::Undefined
        }
    }

    /// Whether this coverage clears `gate`. Undefined coverage always does.
    pub fn meets(&self, gate: Decimal) -> bool {
        match self {
            Dscr::Finite(ratio) => *ratio >= gate,
            Dscr::Undefined => true,
        }
    }

    pub fn ratio(&self) -> Option<Decimal> {
        match self {
            Dscr::Finite(ratio) => Some(*ratio),
            Dscr::Undefined => None,
        }
    }
}

impl fmt::Display for Dscr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dscr::Finite(ratio) => write!(f, "{ratio}"),
            Dscr::Undefined => f.write_str("∞"),
        }
    }
}

// ---------------------------------------------------------------------------
// Monthly records
// ---------------------------------------------------------------------------

/// One simulated month before equity allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingMonth {
    /// 1-based month index
    pub month: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    pub core: Money,
    pub events: Money,
    pub subscriptions: Money,
    pub revenue: Money,
    /// Food cost plus packaging plus waste
    pub cogs: Money,
    pub variable_labor: Money,
    pub processing_fees: Money,
    pub gross_profit: Money,
    pub contribution: Money,
    pub fixed_labor: Money,
    pub overhead: Money,
    pub occupancy: Money,
    pub ebitda: Money,
    pub interest: Money,
    pub principal: Money,
    pub debt_service: Money,
    pub pre_tax_income: Money,
    pub income_tax: Money,
    pub sales_tax: Money,
    /// Net working capital level at month end
    pub net_working_capital: Money,
    pub delta_nwc: Money,
    pub operating_cash_flow: Money,
    pub cash_before_distribution: Money,
    pub dscr: Dscr,
    /// Whether the coverage and minimum-cash covenant allowed a distribution
    pub distribution_permitted: bool,
    /// Cash distributed from operations this month
    pub distribution: Money,
    pub ending_cash: Money,
}

/// Sequential state carried from one month to the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashState {
    pub cash: Money,
    /// Working-capital level of the prior month; `None` before month 1
    pub prior_nwc: Option<Money>,
}

impl CashState {
    /// Opening state: starting equity cash plus the loan proceeds drawn.
    pub fn opening(input: &ProFormaInput) -> Self {
        CashState {
            cash: input.cash.starting_cash + input.loan.principal.max(Decimal::ZERO),
            prior_nwc: None,
        }
    }
}

/// Per-month drivers that do not depend on simulation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthDrivers {
    /// 0-based month index
    pub index: usize,
    pub core: Money,
    pub events: Money,
    pub subscriptions: Money,
    pub occupancy: Money,
    pub interest: Money,
    pub principal: Money,
}

/// Collect the drivers for every month of the horizon. Months past the loan
/// term carry no debt service.
pub fn month_drivers(
    input: &ProFormaInput,
    streams: &RevenueStreams,
    schedule: &[AmortizationRow],
) -> ProFormaResult<Vec<MonthDrivers>> {
    (0..streams.months())
        .map(|index| {
            let (interest, principal) = schedule
                .get(index)
                .map(|row| (row.interest, row.principal))
                .unwrap_or((Decimal::ZERO, Decimal::ZERO));
            Ok(MonthDrivers {
                index,
                core: streams.core[index],
                events: streams.events[index],
                subscriptions: streams.subscriptions[index],
                occupancy: occupancy_cost(input, index)?,
                interest,
                principal,
            })
        })
        .collect()
}

/// Rent for a 0-based month: abated during the rent-free window, then
/// escalated once per elapsed lease year.
pub fn occupancy_cost(input: &ProFormaInput, index: usize) -> ProFormaResult<Money> {
    let terms = &input.occupancy;
    if index < terms.rent_free_months as usize {
        return Ok(Decimal::ZERO);
    }
    let elapsed_years = (index / MONTHS_IN_YEAR) as u64;
    compound_growth(terms.annual_escalator, elapsed_years)
        .and_then(|growth| terms.monthly_gross_rent().checked_mul(growth))
        .ok_or_else(|| ProFormaError::InvalidInput {
            field: "occupancy.annual_escalator".into(),
            reason: format!("Rent overflows in year {} of the projection", elapsed_years + 1),
        })
}

fn net_working_capital(input: &ProFormaInput, revenue: Money, cogs: Money) -> Money {
    let wc = &input.tax;
    let receivables = revenue * (wc.ar_days / DAYS_PER_MONTH);
    let inventory = cogs * (wc.inventory_days / DAYS_PER_MONTH);
    let payables = cogs * (wc.ap_days / DAYS_PER_MONTH);
    receivables + inventory - payables
}

fn gated_distribution(
    input: &ProFormaInput,
    dscr: Dscr,
    cash_before_distribution: Money,
) -> (bool, Money) {
    let policy = &input.cash;
    let permitted =
        dscr.meets(input.loan.dscr_gate) && cash_before_distribution > policy.min_cash;
    if !permitted {
        return (false, Decimal::ZERO);
    }
    let distributable = (cash_before_distribution - policy.min_cash).max(Decimal::ZERO);
    let distribution = (policy.payout_ratio * distributable).max(Decimal::ZERO);
    (true, distribution)
}

/// Simulate one month from the prior month's state.
pub fn step_month(
    input: &ProFormaInput,
    state: CashState,
    drivers: &MonthDrivers,
) -> (CashState, OperatingMonth) {
    let costs = &input.costs;
    let months_per_year = Decimal::from(MONTHS_IN_YEAR as u32);

    let revenue = drivers.core + drivers.events + drivers.subscriptions;
    let cogs_rate: Rate = costs.cogs_pct + costs.packaging_pct + costs.waste_pct;
    let cogs = revenue * cogs_rate;
    let variable_labor = revenue * costs.variable_labor_pct;
    let processing_fees = revenue * costs.processing_fee_pct * costs.card_mix_pct;
    let gross_profit = revenue - cogs;
    let contribution = gross_profit - variable_labor - processing_fees;

    let fixed_labor = costs.fixed_salaries_annual / months_per_year;
    let overhead = input.overhead.monthly_total();
    let occupancy = drivers.occupancy;
    let ebitda = contribution - fixed_labor - overhead - occupancy;

    let debt_service = drivers.interest + drivers.principal;
    let pre_tax_income = ebitda - drivers.interest;
    let income_tax = if pre_tax_income > Decimal::ZERO {
        pre_tax_income * input.tax.entity_tax_rate
    } else {
        Decimal::ZERO
    };
    let sales_tax = revenue * input.tax.sales_tax_rate;

    let nwc = net_working_capital(input, revenue, cogs);
    let delta_nwc = match state.prior_nwc {
        Some(prior) => nwc - prior,
        None => nwc,
    };
    let operating_cash_flow = ebitda - income_tax - delta_nwc;

    let cash_before_distribution =
        state.cash + operating_cash_flow - drivers.interest - drivers.principal - sales_tax;
    let dscr = Dscr::from_coverage(ebitda, debt_service);
    let (distribution_permitted, distribution) =
        gated_distribution(input, dscr, cash_before_distribution);
    let ending_cash = cash_before_distribution - distribution;

    let period_start = input
        .start_date
        .and_then(|d| d.with_day(1))
        .and_then(|d| d.checked_add_months(Months::new(drivers.index as u32)));

    let month = OperatingMonth {
        month: drivers.index as u32 + 1,
        period_start,
        core: drivers.core,
        events: drivers.events,
        subscriptions: drivers.subscriptions,
        revenue,
        cogs,
        variable_labor,
        processing_fees,
        gross_profit,
        contribution,
        fixed_labor,
        overhead,
        occupancy,
        ebitda,
        interest: drivers.interest,
        principal: drivers.principal,
        debt_service,
        pre_tax_income,
        income_tax,
        sales_tax,
        net_working_capital: nwc,
        delta_nwc,
        operating_cash_flow,
        cash_before_distribution,
        dscr,
        distribution_permitted,
        distribution,
        ending_cash,
    };

    let next = CashState {
        cash: ending_cash,
        prior_nwc: Some(nwc),
    };
    (next, month)
}

/// Run the month-by-month simulation in chronological order.
pub fn simulate_months(
    input: &ProFormaInput,
    streams: &RevenueStreams,
    schedule: &[AmortizationRow],
) -> ProFormaResult<Vec<OperatingMonth>> {
    Ok(month_drivers(input, streams, schedule)?
        .iter()
        .scan(CashState::opening(input), |state, drivers| {
            let (next, month) = step_month(input, *state, drivers);
            *state = next;
            Some(month)
        })
        .collect())
}

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::{Money, Multiple, Rate, Years};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Revenue assumptions for the core dining business and events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueAssumptions {
    /// Steady-state core revenue in year 1
    pub year_one_core_revenue: Money,
    /// Annual core revenue growth (decimal, e.g. 0.03 = 3%)
    pub annual_growth: Rate,
    /// Months for core revenue to ramp from 50% to full run-rate
    pub ramp_months: u32,
    /// Twelve monthly weights, the first applying to month one. `null` entries count as 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonality: Option<Vec<Option<Decimal>>>,
    /// Annual private-events revenue at full run-rate
    pub events_annual: Money,
    /// Months for events revenue to ramp up
    pub events_ramp_months: u32,
    /// Ceiling on monthly core revenue (uncapped when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_capacity_cap: Option<Money>,
}

/// How subscriber counts are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionMode {
    /// Acquisition spend, CAC and churn drive a running subscriber base
    Mechanistic,
    /// Subscriber counts are supplied month by month
    Manual,
}

/// Meal-plan / subscription programme assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionAssumptions {
    pub mode: SubscriptionMode,
    /// Active subscribers before month 1
    pub starting_subscribers: Decimal,
    /// Monthly marketing spend on subscriber acquisition
    pub monthly_acquisition_spend: Money,
    /// Cost per acquired subscriber
    pub cost_per_acquisition: Money,
    /// Fraction of active subscribers lost each month
    pub monthly_churn: Rate,
    /// Fraction of active subscribers paused (not billed) in a month
    pub pause_rate: Rate,
    /// Price per billing period (e.g. per week)
    pub price_per_period: Money,
    /// Billing periods per month (e.g. 4.33 weeks)
    pub periods_per_month: Decimal,
    /// Subscriber counts by month for manual mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_counts: Option<Vec<Decimal>>,
}

/// Variable cost stack (as fractions of revenue) and fixed salaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostAssumptions {
    pub cogs_pct: Rate,
    pub packaging_pct: Rate,
    pub waste_pct: Rate,
    pub variable_labor_pct: Rate,
    /// Card processing fee on card-paid revenue
    pub processing_fee_pct: Rate,
    /// Share of revenue paid by card
    pub card_mix_pct: Rate,
    /// Salaried staff cost per year
    pub fixed_salaries_annual: Money,
}

/// Fixed monthly overhead lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverheadAssumptions {
    pub insurance: Money,
    pub licenses: Money,
    pub utilities: Money,
    pub linen: Money,
    pub repairs: Money,
}

impl OverheadAssumptions {
    pub fn monthly_total(&self) -> Money {
        self.insurance + self.licenses + self.utilities + self.linen + self.repairs
    }
}

/// Lease terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyTerms {
    pub base_rent_monthly: Money,
    /// Triple-net charges (taxes, insurance, CAM) per month
    pub nnn_monthly: Money,
    /// Annual rent escalator
    pub annual_escalator: Rate,
    /// Months of rent abatement at lease start
    pub rent_free_months: u32,
}

impl OccupancyTerms {
    /// Base rent plus NNN before escalation.
    pub fn monthly_gross_rent(&self) -> Money {
        self.base_rent_monthly + self.nnn_monthly
    }
}

/// Senior loan terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// Annual percentage rate, compounded monthly
    pub apr: Rate,
    pub term_months: u32,
    pub interest_only_months: u32,
    /// Minimum DSCR required before distributions may be paid
    pub dscr_gate: Decimal,
}

/// Tax rates and working-capital days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxAndWorkingCapital {
    pub sales_tax_rate: Rate,
    pub entity_tax_rate: Rate,
    /// Receivable days on revenue
    pub ar_days: Decimal,
    /// Payable days on cost of goods
    pub ap_days: Decimal,
    /// Inventory days on cost of goods
    pub inventory_days: Decimal,
}

/// Cash management policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashPolicy {
    pub starting_cash: Money,
    /// Minimum cash covenant; distributions only come out of cash above it
    pub min_cash: Money,
    /// Share of distributable cash paid out each month
    pub payout_ratio: Rate,
}

/// Equity deal and exit assumptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealTerms {
    /// Value of assets contributed in kind by equity class F
    pub in_kind_assets: Money,
    /// Total project magnitude used to size F's ownership
    pub project_magnitude: Money,
    /// Multiple applied to trailing-twelve-month pre-tax income at exit
    pub exit_multiple: Multiple,
    /// Multiple applied to trailing-twelve-month EBITDA (informational)
    pub ebitda_multiple: Multiple,
}

/// Top-level input for a pro-forma projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProFormaInput {
    /// Holding period in years
    pub term_years: Years,
    /// Calendar month of model month 1, used only to label periods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    pub revenue: RevenueAssumptions,
    pub subscriptions: SubscriptionAssumptions,
    pub costs: CostAssumptions,
    pub overhead: OverheadAssumptions,
    pub occupancy: OccupancyTerms,
    pub loan: LoanTerms,
    pub tax: TaxAndWorkingCapital,
    pub cash: CashPolicy,
    pub deal: DealTerms,
}

impl ProFormaInput {
    /// A five-year, single-site scenario with a small term loan, a rent-free
    /// fit-out period, and an in-kind equity partner.
    pub fn baseline() -> Self {
        ProFormaInput {
            term_years: dec!(5),
            start_date: None,
            revenue: RevenueAssumptions {
                year_one_core_revenue: dec!(1_200_000),
                annual_growth: dec!(0.03),
                ramp_months: 6,
                seasonality: Some(
                    [
                        dec!(0.85),
                        dec!(0.90),
                        dec!(1.00),
                        dec!(1.00),
                        dec!(1.05),
                        dec!(1.10),
                        dec!(1.10),
                        dec!(1.05),
                        dec!(1.00),
                        dec!(1.00),
                        dec!(0.95),
                        dec!(1.00),
                    ]
                    .into_iter()
                    .map(Some)
                    .collect(),
                ),
                events_annual: dec!(120_000),
                events_ramp_months: 6,
                monthly_capacity_cap: None,
            },
            subscriptions: SubscriptionAssumptions {
                mode: SubscriptionMode::Mechanistic,
                starting_subscribers: dec!(50),
                monthly_acquisition_spend: dec!(1_000),
                cost_per_acquisition: dec!(40),
                monthly_churn: dec!(0.08),
                pause_rate: dec!(0.10),
                price_per_period: dec!(35),
                periods_per_month: dec!(4.33),
                manual_counts: None,
            },
            costs: CostAssumptions {
                cogs_pct: dec!(0.28),
                packaging_pct: dec!(0.03),
                waste_pct: dec!(0.02),
                variable_labor_pct: dec!(0.12),
                processing_fee_pct: dec!(0.029),
                card_mix_pct: dec!(0.90),
                fixed_salaries_annual: dec!(180_000),
            },
            overhead: OverheadAssumptions {
                insurance: dec!(1_200),
                licenses: dec!(300),
                utilities: dec!(2_500),
                linen: dec!(400),
                repairs: dec!(600),
            },
            occupancy: OccupancyTerms {
                base_rent_monthly: dec!(8_000),
                nnn_monthly: dec!(1_500),
                annual_escalator: dec!(0.03),
                rent_free_months: 3,
            },
            loan: LoanTerms {
                principal: dec!(250_000),
                apr: dec!(0.085),
                term_months: 84,
                interest_only_months: 6,
                dscr_gate: dec!(1.25),
            },
            tax: TaxAndWorkingCapital {
                sales_tax_rate: dec!(0.0875),
                entity_tax_rate: dec!(0.21),
                ar_days: dec!(2),
                ap_days: dec!(15),
                inventory_days: dec!(7),
            },
            cash: CashPolicy {
                starting_cash: dec!(50_000),
                min_cash: dec!(40_000),
                payout_ratio: dec!(0.5),
            },
            deal: DealTerms {
                in_kind_assets: dec!(150_000),
                project_magnitude: dec!(600_000),
                exit_multiple: dec!(3),
                ebitda_multiple: dec!(4),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Manual subscriber counts
// ---------------------------------------------------------------------------

/// Subscriber counts parsed from free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualCounts {
    /// Accepted counts, in month order
    pub counts: Vec<Decimal>,
    /// Tokens that were not finite numbers and were skipped
    pub rejected: Vec<String>,
}

/// Tokenize on any run of commas or whitespace and keep the numeric tokens.
///
/// Non-numeric tokens do not fail the parse; they are returned in `rejected`.
pub fn parse_manual_counts(raw: &str) -> ManualCounts {
    let mut parsed = ManualCounts::default();
    for token in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match Decimal::from_str(token).or_else(|_| Decimal::from_scientific(token)) {
            Ok(value) => parsed.counts.push(value),
            Err(_) => parsed.rejected.push(token.to_string()),
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_mixed_separators() {
        let parsed = parse_manual_counts("100, 120\n140\t160 ,,  180\r\n");
        assert_eq!(
            parsed.counts,
            vec![dec!(100), dec!(120), dec!(140), dec!(160), dec!(180)]
        );
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_parse_drops_non_numeric_tokens() {
        let parsed = parse_manual_counts("10,abc,20,NaN,Infinity,30");
        assert_eq!(parsed.counts, vec![dec!(10), dec!(20), dec!(30)]);
        assert_eq!(parsed.rejected, vec!["abc", "NaN", "Infinity"]);
    }

    #[test]
    fn test_parse_scientific_and_decimal() {
        let parsed = parse_manual_counts("1e2 2.5");
        assert_eq!(parsed.counts, vec![dec!(100), dec!(2.5)]);
    }

    #[test]
    fn test_parse_blank_input() {
        assert_eq!(parse_manual_counts("   \n "), ManualCounts::default());
    }

    #[test]
    fn test_baseline_round_trips_through_json() {
        let baseline = ProFormaInput::baseline();
        let json = serde_json::to_string(&baseline).unwrap();
        let back: ProFormaInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.loan.term_months, 84);
        assert_eq!(back.subscriptions.mode, SubscriptionMode::Mechanistic);
        assert_eq!(back.revenue.seasonality.map(|s| s.len()), Some(12));
    }

    #[test]
    fn test_null_seasonality_entries_deserialize() {
        let mut value = serde_json::to_value(ProFormaInput::baseline()).unwrap();
        value["revenue"]["seasonality"][3] = serde_json::Value::Null;
        let input: ProFormaInput = serde_json::from_value(value).unwrap();
        let weights = input.revenue.seasonality.unwrap();
        assert_eq!(weights[3], None);
        assert_eq!(weights[4], Some(dec!(1.05)));
    }

    #[test]
    fn test_overhead_and_rent_totals() {
        let input = ProFormaInput::baseline();
        assert_eq!(input.overhead.monthly_total(), dec!(5_000));
        assert_eq!(input.occupancy.monthly_gross_rent(), dec!(9_500));
    }
}

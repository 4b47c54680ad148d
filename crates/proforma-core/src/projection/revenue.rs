use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::inputs::{ProFormaInput, RevenueAssumptions, SubscriptionAssumptions, SubscriptionMode};
use crate::error::ProFormaError;
use crate::time_value::compound_growth;
use crate::types::{Money, Years, MONTHS_IN_YEAR};
use crate::ProFormaResult;

/// Monthly revenue streams over the projection horizon. All three vectors
/// have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueStreams {
    pub core: Vec<Money>,
    pub events: Vec<Money>,
    pub subscriptions: Vec<Money>,
}

impl RevenueStreams {
    pub fn months(&self) -> usize {
        self.core.len()
    }
}

/// Number of simulated months: `round(term_years * 12)`, at least one.
pub fn horizon_months(term_years: Years) -> usize {
    (term_years * Decimal::from(MONTHS_IN_YEAR as u32))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_usize()
        .unwrap_or(0)
        .max(1)
}

/// Linear ramp from 50% in month one to 100% at the end of the window.
///
/// `index` is 0-based; a zero-length window is treated as one month.
pub fn ramp_factor(index: usize, ramp_months: u32) -> Decimal {
    let window = ramp_months.max(1) as usize;
    if index >= window {
        return Decimal::ONE;
    }
    let progress = Decimal::from(index as u64 + 1) / Decimal::from(window as u64);
    dec!(0.5) + dec!(0.5) * progress
}

/// Core dining revenue for each month.
///
/// Fails when annual growth compounds past the representable range.
pub fn core_revenue(
    revenue: &RevenueAssumptions,
    seasonality: &[Decimal; MONTHS_IN_YEAR],
    months: usize,
) -> ProFormaResult<Vec<Money>> {
    let months_per_year = Decimal::from(MONTHS_IN_YEAR as u32);
    (0..months)
        .map(|m| {
            let elapsed_years = (m / MONTHS_IN_YEAR) as u64;
            let steady_annual = compound_growth(revenue.annual_growth, elapsed_years)
                .and_then(|growth| revenue.year_one_core_revenue.checked_mul(growth))
                .ok_or_else(|| ProFormaError::InvalidInput {
                    field: "revenue.annual_growth".into(),
                    reason: format!(
                        "Core revenue overflows in year {} of the projection",
                        elapsed_years + 1
                    ),
                })?;
            let base_monthly = steady_annual / months_per_year * seasonality[m % MONTHS_IN_YEAR];
            let ramped = base_monthly * ramp_factor(m, revenue.ramp_months);
            Ok(match revenue.monthly_capacity_cap {
                Some(cap) => ramped.min(cap),
                None => ramped,
            })
        })
        .collect()
}

/// Private-events revenue for each month. No seasonality, no cap.
pub fn events_revenue(revenue: &RevenueAssumptions, months: usize) -> Vec<Money> {
    let base_monthly = revenue.events_annual / Decimal::from(MONTHS_IN_YEAR as u32);
    (0..months)
        .map(|m| base_monthly * ramp_factor(m, revenue.events_ramp_months))
        .collect()
}

/// Running subscriber base carried between months in mechanistic mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubscriberState {
    pub active: Decimal,
}

/// Advance the subscriber base by one month and return the month's billed
/// subscription revenue.
pub fn step_subscribers(
    state: SubscriberState,
    subs: &SubscriptionAssumptions,
) -> (SubscriberState, Money) {
    let acquisitions = if subs.cost_per_acquisition > Decimal::ZERO {
        subs.monthly_acquisition_spend / subs.cost_per_acquisition
    } else {
        Decimal::ZERO
    };
    let active = state.active * (Decimal::ONE - subs.monthly_churn) + acquisitions;
    let billable = active * (Decimal::ONE - subs.pause_rate);
    (SubscriberState { active }, billable * monthly_price(subs))
}

fn monthly_price(subs: &SubscriptionAssumptions) -> Money {
    subs.price_per_period * subs.periods_per_month
}

/// Subscription revenue for each month under the configured mode.
///
/// In manual mode `manual_counts` takes precedence over counts stored on the
/// input; months past the end of the series bill zero subscribers.
pub fn subscription_revenue(
    subs: &SubscriptionAssumptions,
    months: usize,
    manual_counts: Option<&[Decimal]>,
) -> Vec<Money> {
    match subs.mode {
        SubscriptionMode::Mechanistic => (0..months)
            .scan(
                SubscriberState {
                    active: subs.starting_subscribers,
                },
                |state, _| {
                    let (next, revenue) = step_subscribers(*state, subs);
                    *state = next;
                    Some(revenue)
                },
            )
            .collect(),
        SubscriptionMode::Manual => {
            let counts = manual_counts
                .or(subs.manual_counts.as_deref())
                .unwrap_or(&[]);
            let price = monthly_price(subs);
            (0..months)
                .map(|m| counts.get(m).copied().unwrap_or(Decimal::ZERO) * price)
                .collect()
        }
    }
}

/// Compose all three revenue streams for the projection horizon.
pub fn compose_revenue(
    input: &ProFormaInput,
    seasonality: &[Decimal; MONTHS_IN_YEAR],
    months: usize,
    manual_counts: Option<&[Decimal]>,
) -> ProFormaResult<RevenueStreams> {
    Ok(RevenueStreams {
        core: core_revenue(&input.revenue, seasonality, months)?,
        events: events_revenue(&input.revenue, months),
        subscriptions: subscription_revenue(&input.subscriptions, months, manual_counts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::seasonality::NEUTRAL_SEASONALITY;
    use rust_decimal_macros::dec;

    fn flat_revenue() -> RevenueAssumptions {
        RevenueAssumptions {
            year_one_core_revenue: dec!(1_200_000),
            annual_growth: dec!(0.10),
            ramp_months: 4,
            seasonality: None,
            events_annual: dec!(60_000),
            events_ramp_months: 2,
            monthly_capacity_cap: None,
        }
    }

    fn mechanistic_subs() -> SubscriptionAssumptions {
        SubscriptionAssumptions {
            mode: SubscriptionMode::Mechanistic,
            starting_subscribers: dec!(100),
            monthly_acquisition_spend: dec!(1_000),
            cost_per_acquisition: dec!(50),
            monthly_churn: dec!(0.10),
            pause_rate: dec!(0.20),
            price_per_period: dec!(30),
            periods_per_month: dec!(4),
            manual_counts: None,
        }
    }

    #[test]
    fn test_horizon_rounding() {
        assert_eq!(horizon_months(dec!(5)), 60);
        assert_eq!(horizon_months(dec!(2.5)), 30);
        assert_eq!(horizon_months(dec!(0.125)), 2); // 1.5 rounds up
        assert_eq!(horizon_months(Decimal::ZERO), 1);
        assert_eq!(horizon_months(dec!(-3)), 1);
    }

    #[test]
    fn test_ramp_factor() {
        assert_eq!(ramp_factor(0, 4), dec!(0.625));
        assert_eq!(ramp_factor(3, 4), Decimal::ONE);
        assert_eq!(ramp_factor(4, 4), Decimal::ONE);
        assert_eq!(ramp_factor(0, 1), Decimal::ONE);
        // zero window behaves as a one-month window
        assert_eq!(ramp_factor(0, 0), Decimal::ONE);
    }

    #[test]
    fn test_core_growth_and_ramp() {
        let core = core_revenue(&flat_revenue(), &NEUTRAL_SEASONALITY, 24).unwrap();
        assert_eq!(core.len(), 24);
        assert_eq!(core[0], dec!(62_500)); // 100k * 0.625
        assert_eq!(core[11], dec!(100_000));
        assert_eq!(core[12], dec!(110_000));
    }

    #[test]
    fn test_core_capacity_cap() {
        let mut revenue = flat_revenue();
        revenue.monthly_capacity_cap = Some(dec!(90_000));
        let core = core_revenue(&revenue, &NEUTRAL_SEASONALITY, 24).unwrap();
        assert_eq!(core[0], dec!(62_500));
        assert_eq!(core[11], dec!(90_000));
        assert_eq!(core[23], dec!(90_000));
    }

    #[test]
    fn test_core_applies_seasonality_by_calendar_slot() {
        let mut seasonality = NEUTRAL_SEASONALITY;
        seasonality[0] = dec!(0.5);
        seasonality[1] = dec!(1.5);
        let mut revenue = flat_revenue();
        revenue.ramp_months = 1;
        revenue.annual_growth = Decimal::ZERO;
        let core = core_revenue(&revenue, &seasonality, 14).unwrap();
        assert_eq!(core[0], dec!(50_000));
        assert_eq!(core[1], dec!(150_000));
        assert_eq!(core[12], dec!(50_000));
        assert_eq!(core[13], dec!(150_000));
    }

    #[test]
    fn test_runaway_growth_is_an_error() {
        let mut revenue = flat_revenue();
        revenue.annual_growth = dec!(850);
        let result = core_revenue(&revenue, &NEUTRAL_SEASONALITY, 360);
        match result {
            Err(ProFormaError::InvalidInput { field, .. }) => {
                assert_eq!(field, "revenue.annual_growth")
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        // the same growth is fine while it stays representable
        assert!(core_revenue(&revenue, &NEUTRAL_SEASONALITY, 24).is_ok());
    }

    #[test]
    fn test_events_ramp() {
        let events = events_revenue(&flat_revenue(), 3);
        assert_eq!(events, vec![dec!(3_750), dec!(5_000), dec!(5_000)]);
    }

    #[test]
    fn test_mechanistic_subscribers() {
        let subs = mechanistic_subs();
        let (state, revenue) = step_subscribers(SubscriberState { active: dec!(100) }, &subs);
        // 100 * 0.9 + 20 = 110 active, 88 billable, 88 * 120 = 10_560
        assert_eq!(state.active, dec!(110));
        assert_eq!(revenue, dec!(10_560));

        let series = subscription_revenue(&subs, 2, None);
        // 110 * 0.9 + 20 = 119 active, 95.2 billable
        assert_eq!(series, vec![dec!(10_560), dec!(11_424)]);
    }

    #[test]
    fn test_zero_cac_means_no_acquisitions() {
        let mut subs = mechanistic_subs();
        subs.cost_per_acquisition = Decimal::ZERO;
        let (state, _) = step_subscribers(SubscriberState { active: dec!(100) }, &subs);
        assert_eq!(state.active, dec!(90));
    }

    #[test]
    fn test_manual_counts_pad_with_zero() {
        let mut subs = mechanistic_subs();
        subs.mode = SubscriptionMode::Manual;
        let counts = [dec!(10), dec!(20)];
        let series = subscription_revenue(&subs, 4, Some(&counts[..]));
        assert_eq!(
            series,
            vec![dec!(1_200), dec!(2_400), Decimal::ZERO, Decimal::ZERO]
        );
    }

    #[test]
    fn test_manual_argument_overrides_stored_counts() {
        let mut subs = mechanistic_subs();
        subs.mode = SubscriptionMode::Manual;
        subs.manual_counts = Some(vec![dec!(1)]);
        assert_eq!(subscription_revenue(&subs, 1, None), vec![dec!(120)]);
        assert_eq!(
            subscription_revenue(&subs, 1, Some(&[dec!(2)][..])),
            vec![dec!(240)]
        );
    }
}

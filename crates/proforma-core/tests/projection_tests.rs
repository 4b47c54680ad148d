use proforma_core::projection::amortization::amortization_schedule;
use proforma_core::projection::inputs::{parse_manual_counts, ProFormaInput, SubscriptionMode};
use proforma_core::projection::model::project_pro_forma;
use proforma_core::projection::revenue::ramp_factor;
use proforma_core::projection::simulator::Dscr;
use proforma_core::time_value::irr_bisection;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

/// Two flat years of core revenue with every cost, tax and loan removed.
fn flat_zero_cost(years: Decimal) -> ProFormaInput {
    let mut input = ProFormaInput::baseline();
    input.term_years = years;
    input.revenue.year_one_core_revenue = dec!(1_200_000);
    input.revenue.annual_growth = Decimal::ZERO;
    input.revenue.ramp_months = 0;
    input.revenue.seasonality = None;
    input.revenue.events_annual = Decimal::ZERO;
    input.subscriptions.mode = SubscriptionMode::Manual;
    input.subscriptions.manual_counts = Some(Vec::new());
    input.costs.cogs_pct = Decimal::ZERO;
    input.costs.packaging_pct = Decimal::ZERO;
    input.costs.waste_pct = Decimal::ZERO;
    input.costs.variable_labor_pct = Decimal::ZERO;
    input.costs.processing_fee_pct = Decimal::ZERO;
    input.costs.fixed_salaries_annual = Decimal::ZERO;
    input.overhead.insurance = Decimal::ZERO;
    input.overhead.licenses = Decimal::ZERO;
    input.overhead.utilities = Decimal::ZERO;
    input.overhead.linen = Decimal::ZERO;
    input.overhead.repairs = Decimal::ZERO;
    input.occupancy.base_rent_monthly = Decimal::ZERO;
    input.occupancy.nnn_monthly = Decimal::ZERO;
    input.loan.principal = Decimal::ZERO;
    input.tax.sales_tax_rate = Decimal::ZERO;
    input.tax.entity_tax_rate = Decimal::ZERO;
    input.tax.ar_days = Decimal::ZERO;
    input.tax.ap_days = Decimal::ZERO;
    input.tax.inventory_days = Decimal::ZERO;
    input.deal.exit_multiple = dec!(3);
    input
}

// ===========================================================================
// Amortization
// ===========================================================================

#[test]
fn test_amortizing_schedules_retire_the_loan() {
    for (principal, apr, term, io) in [
        (dec!(150_000), dec!(0.08), 60u32, 0u32),
        (dec!(250_000), dec!(0.085), 84, 6),
        (dec!(1_000_000), dec!(0.12), 360, 24),
        (dec!(42_000), Decimal::ZERO, 36, 12),
    ] {
        let rows = amortization_schedule(principal, apr, term, io);
        let last = rows.last().unwrap();
        assert!(
            last.balance.abs() < dec!(0.0001),
            "balance {} for {principal}/{apr}/{term}/{io}",
            last.balance
        );
        let repaid: Decimal = rows.iter().map(|r| r.principal).sum();
        assert!((repaid - principal).abs() < dec!(0.0001), "repaid {repaid}");
    }
}

// ===========================================================================
// Distribution gate
// ===========================================================================

#[test]
fn test_unreachable_dscr_gate_blocks_distributions() {
    let mut input = ProFormaInput::baseline();
    input.loan.principal = dec!(150_000);
    input.loan.apr = dec!(0.08);
    input.loan.term_months = 60;
    input.loan.interest_only_months = 0;
    input.loan.dscr_gate = dec!(25);

    let out = project_pro_forma(&input, None).unwrap();
    let first = &out.result.months[0];
    assert_eq!(first.operating.distribution, Decimal::ZERO);
    assert!(!first.operating.distribution_permitted);
    match first.operating.dscr {
        Dscr::Finite(ratio) => assert!(ratio < dec!(25), "DSCR {ratio}"),
        Dscr::Undefined => panic!("debt service is due in month 1"),
    }

    for month in out.result.months.iter().take(60) {
        assert_eq!(month.operating.distribution, Decimal::ZERO);
    }
    assert!(out.result.returns.gated_months >= 60);
}

#[test]
fn test_months_after_loan_term_have_undefined_dscr() {
    let mut input = ProFormaInput::baseline();
    input.loan.term_months = 24;
    input.loan.interest_only_months = 0;
    let out = project_pro_forma(&input, None).unwrap();
    let months = &out.result.months;
    assert!(matches!(months[23].operating.dscr, Dscr::Finite(_)));
    assert_eq!(months[24].operating.dscr, Dscr::Undefined);
    assert_eq!(months[24].operating.debt_service, Decimal::ZERO);
}

// ===========================================================================
// Working capital
// ===========================================================================

#[test]
fn test_more_payable_days_raise_early_cash() {
    let mut short = ProFormaInput::baseline();
    short.tax.ap_days = Decimal::ZERO;
    let mut long = ProFormaInput::baseline();
    long.tax.ap_days = dec!(45);

    let short = project_pro_forma(&short, None).unwrap().result;
    let long = project_pro_forma(&long, None).unwrap().result;
    for m in 0..3 {
        assert!(
            long.months[m].operating.ending_cash > short.months[m].operating.ending_cash,
            "month {}: {} vs {}",
            m + 1,
            long.months[m].operating.ending_cash,
            short.months[m].operating.ending_cash
        );
    }
}

// ===========================================================================
// Exit valuation
// ===========================================================================

#[test]
fn test_exit_value_flat_two_year_case() {
    let out = project_pro_forma(&flat_zero_cost(dec!(2)), None).unwrap();
    let result = &out.result;
    assert_eq!(result.months.len(), 24);
    assert_eq!(result.exit_value, dec!(3_600_000));

    let last = result.months.last().unwrap();
    assert_eq!(last.exit_proceeds, dec!(3_600_000));
    assert_eq!(
        last.distribution_total,
        last.operating.distribution + dec!(3_600_000)
    );
    assert!(result.months[..23].iter().all(|m| m.exit_proceeds.is_zero()));
}

#[test]
fn test_exit_value_is_floored_at_zero() {
    let mut input = flat_zero_cost(dec!(1));
    input.costs.fixed_salaries_annual = dec!(2_400_000);
    let out = project_pro_forma(&input, None).unwrap();
    assert_eq!(out.result.exit_value, Decimal::ZERO);
    assert_eq!(out.result.ebitda_multiple_valuation, Decimal::ZERO);
}

#[test]
fn test_ebitda_valuation_does_not_feed_cash_flows() {
    let base = project_pro_forma(&flat_zero_cost(dec!(2)), None).unwrap().result;
    let mut input = flat_zero_cost(dec!(2));
    input.deal.ebitda_multiple = dec!(40);
    let rich = project_pro_forma(&input, None).unwrap().result;
    assert!(rich.ebitda_multiple_valuation > base.ebitda_multiple_valuation);
    assert_eq!(rich.irr_annual, base.irr_annual);
    assert_eq!(rich.returns.total_distributions, base.returns.total_distributions);
}

// ===========================================================================
// IRR
// ===========================================================================

#[test]
fn test_irr_without_sign_change_is_none() {
    assert_eq!(irr_bisection(&[dec!(100), dec!(50), dec!(25)]), None);
}

#[test]
fn test_outflow_only_series_has_no_irr() {
    let mut flows = vec![dec!(-100)];
    flows.extend(std::iter::repeat(Decimal::ZERO).take(60));
    assert_eq!(irr_bisection(&flows), None);
}

#[test]
fn test_gated_zero_exit_projection_has_no_irr() {
    let mut input = ProFormaInput::baseline();
    input.loan.dscr_gate = dec!(1000);
    input.costs.fixed_salaries_annual = dec!(3_000_000);
    let out = project_pro_forma(&input, None).unwrap();
    let result = &out.result;
    assert_eq!(result.exit_value, Decimal::ZERO);
    assert_eq!(result.returns.total_distributions_f, Decimal::ZERO);
    assert_eq!(result.returns.irr_monthly, None);
    assert_eq!(result.irr_annual, None);
    assert!(out.warnings.iter().any(|w| w.contains("IRR undefined")));
}

#[test]
fn test_irr_recovers_deep_negative_root() {
    // half the value lost every month for five years
    let mut flows = vec![dec!(-1_000_000)];
    flows.extend(std::iter::repeat(Decimal::ZERO).take(59));
    flows.push(dec!(1_000_000) * dec!(0.5).powu(60));
    let rate = irr_bisection(&flows).expect("bracketed");
    assert!((rate - dec!(-0.5)).abs() < dec!(0.000000001), "got {rate}");
}

#[test]
fn test_percent_typed_apr_still_projects() {
    let mut input = ProFormaInput::baseline();
    input.loan.apr = dec!(8.5);
    input.loan.term_months = 360;
    let out = project_pro_forma(&input, None).unwrap();
    assert_eq!(out.result.months.len(), 60);
    assert!(out.result.months[0].operating.interest > Decimal::ZERO);
}

#[test]
fn test_baseline_has_an_irr() {
    let out = project_pro_forma(&ProFormaInput::baseline(), None).unwrap();
    let result = &out.result;
    assert!(result.returns.total_distributions_f > Decimal::ZERO);
    let irr = result.irr_annual.expect("baseline IRR should be bracketed");
    assert!(irr > dec!(-1));
    let moic = result.returns.moic_f.unwrap();
    assert!(moic > Decimal::ZERO);
}

// ===========================================================================
// Seasonality
// ===========================================================================

#[test]
fn test_uniform_seasonality_matches_neutral() {
    let mut input = ProFormaInput::baseline();
    input.revenue.seasonality = Some(vec![Some(dec!(2)); 12]);
    let out = project_pro_forma(&input, None).unwrap();
    assert_eq!(
        out.result.months[0].operating.core,
        dec!(100_000) * ramp_factor(0, input.revenue.ramp_months)
    );

    input.revenue.seasonality = None;
    let neutral = project_pro_forma(&input, None).unwrap();
    assert_eq!(
        out.result.months[0].operating.core,
        neutral.result.months[0].operating.core
    );
}

// ===========================================================================
// Aggregation and consumers
// ===========================================================================

#[test]
fn test_yearly_totals_reconcile() {
    let mut input = ProFormaInput::baseline();
    input.term_years = dec!(2.5);
    let result = project_pro_forma(&input, None).unwrap().result;
    assert_eq!(result.months.len(), 30);
    assert_eq!(result.years.len(), 3);
    assert_eq!(result.years[2].months, 6);

    let monthly: Decimal = result.months.iter().map(|m| m.distribution_total).sum();
    let yearly: Decimal = result.years.iter().map(|y| y.distributions).sum();
    assert!((monthly - yearly).abs() < dec!(0.000001), "{monthly} vs {yearly}");
    assert_eq!(monthly, result.returns.total_distributions);
    assert_eq!(
        result.years[2].ending_cash,
        result.months[29].operating.ending_cash
    );
}

#[test]
fn test_manual_counts_from_free_text() {
    let parsed = parse_manual_counts("120, 130 oops 140\n150");
    assert_eq!(parsed.rejected, vec!["oops"]);

    let mut input = ProFormaInput::baseline();
    input.subscriptions.mode = SubscriptionMode::Manual;
    let out = project_pro_forma(&input, Some(parsed.counts.as_slice())).unwrap();
    let price = input.subscriptions.price_per_period * input.subscriptions.periods_per_month;
    assert_eq!(out.result.months[0].operating.subscriptions, dec!(120) * price);
    assert_eq!(out.result.months[3].operating.subscriptions, dec!(150) * price);
    assert_eq!(out.result.months[4].operating.subscriptions, Decimal::ZERO);
}

#[test]
fn test_input_round_trips_through_json() {
    let input = ProFormaInput::baseline();
    let json = serde_json::to_string(&input).unwrap();
    let back: ProFormaInput = serde_json::from_str(&json).unwrap();
    let a = project_pro_forma(&input, None).unwrap().result;
    let b = project_pro_forma(&back, None).unwrap().result;
    assert_eq!(a.months, b.months);
}

#[test]
fn test_result_serializes_undefined_dscr() {
    let out = project_pro_forma(&flat_zero_cost(dec!(1)), None).unwrap();
    let value = serde_json::to_value(&out.result).unwrap();
    assert_eq!(value["months"][0]["dscr"]["kind"], "undefined");
    assert_eq!(value["months"][0]["month"], 1);
}

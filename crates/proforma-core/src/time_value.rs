use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::ProFormaError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, MONTHS_IN_YEAR};
use crate::ProFormaResult;

/// Lower edge of the IRR search bracket, as a periodic rate.
pub const IRR_BRACKET_LOW: Rate = dec!(-0.9);
/// Upper edge of the IRR search bracket, as a periodic rate.
pub const IRR_BRACKET_HIGH: Rate = dec!(3.0);
/// Periodic rates below this magnitude are treated as zero by annuity maths.
pub const ZERO_RATE_EPSILON: Rate = dec!(0.000000001);

const IRR_TOLERANCE: Decimal = dec!(0.000001);
const MAX_IRR_ITERATIONS: u32 = 200;

/// Net Present Value of a series of cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> ProFormaResult<Money> {
    if rate <= dec!(-1) {
        return Err(ProFormaError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        if discount.is_zero() {
            return Err(ProFormaError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result += cf / discount;
    }

    Ok(result)
}

/// Level payment that retires `principal` over `nper` periods at `rate`.
///
/// Falls back to straight-line repayment when the rate is numerically zero.
pub fn level_payment(rate: Rate, nper: u32, principal: Money) -> ProFormaResult<Money> {
    if nper == 0 {
        return Err(ProFormaError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.abs() < ZERO_RATE_EPSILON {
        return Ok(principal / Decimal::from(nper));
    }

    // Past the representable range the annuity factor is one to working precision
    let Some(factor) = compound_growth(rate, u64::from(nper)) else {
        return Ok(principal * rate);
    };
    let annuity_factor = factor - Decimal::ONE;

    if annuity_factor.is_zero() {
        return Err(ProFormaError::DivisionByZero {
            context: "level payment annuity factor".into(),
        });
    }

    Ok(principal * rate * (factor / annuity_factor))
}

/// NPV of `cash_flows` at `rate` paired with the IRR tolerance, both scaled so
/// that they stay representable.
///
/// At or above a zero rate this is the ordinary discounted NPV. Below zero the
/// series is compounded forward to its last non-zero flow, `NPV × (1+r)^k`,
/// and the tolerance is scaled by the same factor, so `|value| < tolerance`
/// holds exactly when `|NPV| < IRR_TOLERANCE`. Returns `None` when every flow
/// is zero or the value is not representable.
fn scaled_npv(cash_flows: &[Money], rate: Rate) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let last = cash_flows.iter().rposition(|cf| !cf.is_zero())?;
    let flows = &cash_flows[..=last];

    if one_plus_r < Decimal::ONE {
        let mut value = Decimal::ZERO;
        let mut tolerance = IRR_TOLERANCE;
        for (t, cf) in flows.iter().enumerate() {
            if t > 0 {
                value = value.checked_mul(one_plus_r)?;
                tolerance = tolerance.checked_mul(one_plus_r)?;
            }
            value = value.checked_add(*cf)?;
        }
        return Some((value, tolerance));
    }

    let mut total = Decimal::ZERO;
    let mut discount = Decimal::ONE;
    for (t, cf) in flows.iter().enumerate() {
        if t > 0 {
            match discount.checked_mul(one_plus_r) {
                Some(next) => discount = next,
                // later terms are below the search tolerance
                None => break,
            }
        }
        total = total.checked_add(cf.checked_div(discount)?)?;
    }
    Some((total, IRR_TOLERANCE))
}

/// Internal Rate of Return by bisection over the default bracket.
///
/// Returns `None` when the bracket endpoints do not straddle a root. A `None`
/// is never the same thing as a 0% return.
pub fn irr_bisection(cash_flows: &[Money]) -> Option<Rate> {
    irr_bisection_within(cash_flows, IRR_BRACKET_LOW, IRR_BRACKET_HIGH)
}

/// Bisection IRR search on `[low, high]`.
pub fn irr_bisection_within(cash_flows: &[Money], low: Rate, high: Rate) -> Option<Rate> {
    if cash_flows.is_empty() || low >= high {
        return None;
    }

    let mut lo = low;
    let mut hi = high;
    let (mut value_lo, _) = scaled_npv(cash_flows, lo)?;
    let (value_hi, _) = scaled_npv(cash_flows, hi)?;

    match (value_lo.is_zero(), value_hi.is_zero()) {
        (true, true) => return None,
        (true, false) => return Some(lo),
        (false, true) => return Some(hi),
        (false, false) => {}
    }
    if value_lo.is_sign_negative() == value_hi.is_sign_negative() {
        return None;
    }

    for _ in 0..MAX_IRR_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let (value_mid, tolerance) = scaled_npv(cash_flows, mid)?;
        if value_mid.abs() < tolerance {
            return Some(mid);
        }
        if value_mid.is_sign_negative() != value_lo.is_sign_negative() {
            hi = mid;
        } else {
            lo = mid;
            value_lo = value_mid;
        }
    }

    Some((lo + hi) / dec!(2))
}

/// Growth factor `(1 + rate)^periods`, `None` past the representable range.
pub fn compound_growth(rate: Rate, periods: u64) -> Option<Decimal> {
    (Decimal::ONE + rate).checked_powu(periods)
}

/// Compound a periodic rate up to an annual one: `(1 + r)^n - 1`.
///
/// `None` when the compounded rate is not representable.
pub fn annualize_periodic_rate(rate: Rate, periods_per_year: u32) -> Option<Rate> {
    compound_growth(rate, u64::from(periods_per_year)).map(|growth| growth - Decimal::ONE)
}

/// Input for a standalone IRR computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrInput {
    /// Periodic cash flows, the first at t = 0
    pub cash_flows: Vec<Money>,
    /// Periods per year used to annualize (defaults to 12)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods_per_year: Option<u32>,
    /// Optional periodic discount rate at which to report NPV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Rate>,
}

/// Output of a standalone IRR computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrOutput {
    pub periodic_irr: Option<Rate>,
    pub annualized_irr: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npv_at_discount_rate: Option<Money>,
}

/// IRR of a periodic cash-flow series, wrapped in the standard envelope.
pub fn calculate_irr(input: &IrrInput) -> ProFormaResult<ComputationOutput<IrrOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.cash_flows.is_empty() {
        return Err(ProFormaError::InsufficientData(
            "IRR requires at least one cash flow".into(),
        ));
    }

    let periods_per_year = input.periods_per_year.unwrap_or(MONTHS_IN_YEAR as u32);
    if periods_per_year == 0 {
        return Err(ProFormaError::InvalidInput {
            field: "periods_per_year".into(),
            reason: "Periods per year must be > 0".into(),
        });
    }

    let periodic_irr = irr_bisection(&input.cash_flows);
    if periodic_irr.is_none() {
        warnings.push(format!(
            "No sign change in NPV between {IRR_BRACKET_LOW} and {IRR_BRACKET_HIGH}; IRR undefined"
        ));
    }
    let annualized_irr = periodic_irr.and_then(|r| annualize_periodic_rate(r, periods_per_year));
    if periodic_irr.is_some() && annualized_irr.is_none() {
        warnings.push(format!(
            "IRR compounded over {periods_per_year} periods is not representable"
        ));
    }

    let npv_at_discount_rate = match input.discount_rate {
        Some(rate) => Some(npv(rate, &input.cash_flows)?),
        None => None,
    };

    let output = IrrOutput {
        periodic_irr,
        annualized_irr,
        npv_at_discount_rate,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "IRR (bisection)",
        &serde_json::json!({
            "periods": input.cash_flows.len(),
            "periods_per_year": periods_per_year,
            "bracket": [IRR_BRACKET_LOW.to_string(), IRR_BRACKET_HIGH.to_string()],
        }),
        warnings,
        elapsed,
        output,
    ))
}

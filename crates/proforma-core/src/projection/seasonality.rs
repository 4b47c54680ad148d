use rust_decimal::Decimal;

use crate::types::MONTHS_IN_YEAR;

/// Neutral seasonality: every month carries the same weight.
pub const NEUTRAL_SEASONALITY: [Decimal; MONTHS_IN_YEAR] = [Decimal::ONE; MONTHS_IN_YEAR];

/// Rescale twelve monthly weights to a mean of one.
///
/// Missing entries (`None`) are read as 1. Anything other than exactly twelve
/// weights, or weights averaging zero, yields [`NEUTRAL_SEASONALITY`].
pub fn normalize_seasonality(weights: Option<&[Option<Decimal>]>) -> [Decimal; MONTHS_IN_YEAR] {
    let Some(weights) = weights.filter(|w| w.len() == MONTHS_IN_YEAR) else {
        return NEUTRAL_SEASONALITY;
    };

    let mut safe = NEUTRAL_SEASONALITY;
    for (slot, weight) in safe.iter_mut().zip(weights) {
        *slot = weight.unwrap_or(Decimal::ONE);
    }

    let mean = safe.iter().copied().sum::<Decimal>() / Decimal::from(MONTHS_IN_YEAR as u32);
    if mean.is_zero() {
        return NEUTRAL_SEASONALITY;
    }

    safe.map(|w| w / mean)
}

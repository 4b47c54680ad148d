use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::equity::MonthlyRecord;
use crate::types::{Money, MONTHS_IN_YEAR};

/// One projection year (the final year may be partial).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRecord {
    /// 1-based year
    pub year: u32,
    /// Months in this bucket, 12 except possibly the last
    pub months: u32,
    pub revenue: Money,
    pub ebitda: Money,
    pub pre_tax_income: Money,
    /// Total distributions including any exit proceeds
    pub distributions: Money,
    /// Cash at the end of the year's last month
    pub ending_cash: Money,
}

/// Roll monthly records up into consecutive twelve-month buckets.
pub fn aggregate_years(months: &[MonthlyRecord]) -> Vec<YearlyRecord> {
    months
        .chunks(MONTHS_IN_YEAR)
        .enumerate()
        .map(|(i, bucket)| YearlyRecord {
            year: i as u32 + 1,
            months: bucket.len() as u32,
            revenue: bucket.iter().map(|m| m.operating.revenue).sum(),
            ebitda: bucket.iter().map(|m| m.operating.ebitda).sum(),
            pre_tax_income: bucket.iter().map(|m| m.operating.pre_tax_income).sum(),
            distributions: bucket.iter().map(|m| m.distribution_total).sum(),
            ending_cash: bucket
                .last()
                .map(|m| m.operating.ending_cash)
                .unwrap_or(Decimal::ZERO),
        })
        .collect()
}

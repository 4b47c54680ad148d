use rust_decimal::{Decimal, RoundingStrategy};
use std::io;

use proforma_core::projection::equity::MonthlyRecord;
use proforma_core::projection::simulator::Dscr;

/// Column order of the monthly export.
pub const MONTHLY_HEADERS: [&str; 19] = [
    "Month",
    "Core",
    "Events",
    "Subs",
    "Revenue",
    "COGS",
    "VarLabor",
    "ProcFees",
    "Contribution",
    "EBITDA",
    "Interest",
    "Principal",
    "PreTax",
    "IncomeTax",
    "SalesTax",
    "DeltaNWC",
    "DistTotal",
    "Cash",
    "DSCR",
];

fn rounded(value: Decimal, dp: u32) -> Decimal {
    let r = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    if r.is_zero() {
        Decimal::ZERO
    } else {
        r
    }
}

fn money(value: Decimal) -> String {
    format!("{:.2}", rounded(value, 2))
}

/// Undefined coverage is written as the infinity sign, never as a number.
fn dscr_cell(dscr: &Dscr) -> String {
    match dscr {
        Dscr::Finite(ratio) => format!("{:.4}", rounded(*ratio, 4)),
        Dscr::Undefined => "∞".to_string(),
    }
}

fn monthly_row(record: &MonthlyRecord) -> Vec<String> {
    let m = &record.operating;
    let mut row = vec![m.month.to_string()];
    row.extend(
        [
            m.core,
            m.events,
            m.subscriptions,
            m.revenue,
            m.cogs,
            m.variable_labor,
            m.processing_fees,
            m.contribution,
            m.ebitda,
            m.interest,
            m.principal,
            m.pre_tax_income,
            m.income_tax,
            m.sales_tax,
            m.delta_nwc,
            record.distribution_total,
            m.ending_cash,
        ]
        .into_iter()
        .map(money),
    );
    row.push(dscr_cell(&m.dscr));
    row
}

/// Write the monthly series as CSV with a header row.
pub fn write_monthly_csv<W: io::Write>(writer: W, months: &[MonthlyRecord]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(MONTHLY_HEADERS)?;
    for record in months {
        wtr.write_record(monthly_row(record))?;
    }
    wtr.flush()?;
    Ok(())
}

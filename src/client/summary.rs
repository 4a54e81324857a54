//! Values derived from the fetched income and expense collections.
//!
//! Everything here is a pure function of the two collections so that the
//! totals, charts and history can never disagree with the records shown.

use std::{collections::BTreeMap, sync::OnceLock};

use numfmt::{Formatter, Precision};
use time::Month;

use crate::ledger::{LedgerRecord, RecordKind};

/// The number of entries shown in the recent activity list.
pub const RECENT_ENTRY_COUNT: usize = 5;

/// The sum of the amounts of `records`.
pub fn total(records: &[LedgerRecord]) -> f64 {
    records.iter().map(|record| record.amount).sum()
}

/// Total income minus total expenses.
pub fn balance(income: &[LedgerRecord], expense: &[LedgerRecord]) -> f64 {
    total(income) - total(expense)
}

/// Every record of both kinds, newest date first.
///
/// The sort is stable and incomes are placed before expenses, so on the same
/// date incomes come first and each kind keeps its fetched order.
pub fn merged_history(income: &[LedgerRecord], expense: &[LedgerRecord]) -> Vec<LedgerRecord> {
    let mut entries: Vec<LedgerRecord> = income.iter().chain(expense).cloned().collect();
    entries.sort_by(|a, b| b.date.cmp(&a.date));
    entries
}

/// Which kinds of record to keep when filtering the history.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KindFilter {
    /// Keep both kinds.
    #[default]
    All,
    /// Keep income only.
    Income,
    /// Keep expenses only.
    Expense,
}

impl KindFilter {
    /// Whether a record of `kind` passes the filter.
    pub fn allows(&self, kind: RecordKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Income => kind == RecordKind::Income,
            KindFilter::Expense => kind == RecordKind::Expense,
        }
    }
}

/// The entries whose title contains `search`, ignoring case, and whose kind
/// passes `filter`. An empty search matches every title.
pub fn filter_history(
    entries: &[LedgerRecord],
    search: &str,
    filter: KindFilter,
) -> Vec<LedgerRecord> {
    let search = search.trim().to_lowercase();

    entries
        .iter()
        .filter(|entry| filter.allows(entry.kind))
        .filter(|entry| search.is_empty() || entry.title.to_lowercase().contains(&search))
        .cloned()
        .collect()
}

/// The first `count` entries of an already sorted history.
pub fn recent(entries: &[LedgerRecord], count: usize) -> &[LedgerRecord] {
    &entries[..count.min(entries.len())]
}

/// Income and expense totals for one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyBucket {
    /// The year of the month.
    pub year: i32,
    /// The month.
    pub month: Month,
    /// Total income dated in the month.
    pub income: f64,
    /// Total expenses dated in the month.
    pub expense: f64,
}

impl MonthlyBucket {
    /// The label for the month, e.g. "Jan 2024".
    pub fn label(&self) -> String {
        month_label(self.year, self.month)
    }
}

/// Group both collections by the calendar month of their date, oldest month
/// first. Months without records are omitted.
pub fn monthly_buckets(income: &[LedgerRecord], expense: &[LedgerRecord]) -> Vec<MonthlyBucket> {
    let mut buckets: BTreeMap<(i32, u8), MonthlyBucket> = BTreeMap::new();

    for record in income.iter().chain(expense) {
        let (year, month) = (record.date.year(), record.date.month());
        let bucket = buckets
            .entry((year, u8::from(month)))
            .or_insert_with(|| MonthlyBucket {
                year,
                month,
                income: 0.0,
                expense: 0.0,
            });

        match record.kind {
            RecordKind::Income => bucket.income += record.amount,
            RecordKind::Expense => bucket.expense += record.amount,
        }
    }

    buckets.into_values().collect()
}

/// Render a month as its three letter abbreviation and year, e.g. "Jan 2024".
pub fn month_label(year: i32, month: Month) -> String {
    let name = month.to_string();
    format!("{} {year}", &name[..3])
}

/// numfmt switches to scientific notation outside of this range.
const GROUPED_RANGE: std::ops::Range<f64> = 1.0..1e12;

/// Format a number as a dollar amount with thousands separators and two
/// decimal places, e.g. "$1,000.00" or "-$400.00".
///
/// The amount is rounded to the nearest cent, so amounts under half a cent
/// are shown as "$0.00".
pub fn format_currency(number: f64) -> String {
    static FORMATTER: OnceLock<Option<Formatter>> = OnceLock::new();

    let formatter = FORMATTER.get_or_init(|| {
        Formatter::currency("$")
            .ok()
            .map(|formatter| formatter.precision(Precision::Decimals(2)))
    });

    let cents = (number.abs() * 100.0).round();
    if cents == 0.0 {
        return "$0.00".to_owned();
    }

    // Whole cents are printed with at most two decimals, so numfmt's
    // truncation leaves them unchanged.
    let dollars = cents / 100.0;
    let formatted_string = match formatter {
        Some(formatter) if GROUPED_RANGE.contains(&dollars) => {
            pad_cents(formatter.fmt_string(dollars))
        }
        _ => format!("${dollars:.2}"),
    };

    if number < 0.0 {
        format!("-{formatted_string}")
    } else {
        formatted_string
    }
}

/// numfmt drops trailing zeros from the decimal part, e.g. "12.30" is
/// rendered as "12.3" and "12.00" as "12".
fn pad_cents(mut formatted_string: String) -> String {
    match formatted_string.rfind('.') {
        None => formatted_string.push_str(".00"),
        Some(point) => {
            let decimals = formatted_string.len() - point - 1;
            for _ in decimals..2 {
                formatted_string.push('0');
            }
        }
    }

    formatted_string
}

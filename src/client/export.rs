//! CSV export of the merged history.

use std::io::Write;

use serde::Serialize;

use crate::ledger::{LedgerRecord, RecordKind, format_date};

#[derive(Serialize)]
struct HistoryRow<'a> {
    date: String,
    #[serde(rename = "type")]
    kind: RecordKind,
    title: &'a str,
    category: &'a str,
    description: &'a str,
    amount: String,
}

impl<'a> From<&'a LedgerRecord> for HistoryRow<'a> {
    fn from(entry: &'a LedgerRecord) -> Self {
        Self {
            date: format_date(entry.date),
            kind: entry.kind,
            title: &entry.title,
            category: &entry.category,
            description: &entry.description,
            amount: format!("{:.2}", entry.amount),
        }
    }
}

/// Write `entries` to `writer` as CSV with the header
/// `date,type,title,category,description,amount`, one row per entry.
///
/// # Errors
/// Returns an error if a row cannot be written.
pub fn write_history_csv(entries: &[LedgerRecord], writer: impl Write) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    if entries.is_empty() {
        writer.write_record(["date", "type", "title", "category", "description", "amount"])?;
    }

    for entry in entries {
        writer.serialize(HistoryRow::from(entry))?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use time::{OffsetDateTime, macros::date};

    use crate::{
        UserID,
        client::write_history_csv,
        ledger::{LedgerRecord, RecordId, RecordKind},
    };

    fn rent() -> LedgerRecord {
        LedgerRecord {
            id: RecordId::new(1),
            owner_id: UserID::new(1),
            title: "Rent, January".to_owned(),
            amount: 400.0,
            kind: RecordKind::Expense,
            category: "Housing".to_owned(),
            description: String::new(),
            date: date!(2024 - 01 - 16),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn writes_header_and_one_row_per_entry() {
        let mut salary = rent();
        salary.kind = RecordKind::Income;
        salary.title = "Salary".to_owned();
        salary.amount = 1000.5;
        salary.category = "Work".to_owned();
        salary.description = "Monthly pay".to_owned();
        let mut output = Vec::new();

        write_history_csv(&[salary, rent()], &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert_eq!(
            csv,
            "date,type,title,category,description,amount\n\
             2024-01-16,income,Salary,Work,Monthly pay,1000.50\n\
             2024-01-16,expense,\"Rent, January\",Housing,,400.00\n"
        );
    }

    #[test]
    fn empty_history_still_has_header() {
        let mut output = Vec::new();

        write_history_csv(&[], &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "date,type,title,category,description,amount\n"
        );
    }
}

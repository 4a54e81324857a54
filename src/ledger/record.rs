//! Defines the ledger record model and the validation shared by income and expenses.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};
use unicode_segmentation::UnicodeSegmentation;

use crate::{Error, UserID};

/// The max number of graphemes in a record title.
pub const MAX_TITLE_LENGTH: usize = 50;
/// The max number of graphemes in a record category.
pub const MAX_CATEGORY_LENGTH: usize = 20;
/// The max number of graphemes in a record description.
pub const MAX_DESCRIPTION_LENGTH: usize = 200;

pub(crate) const REQUIRED_FIELDS_MSG: &str = "Title, Amount, Category, and Date are required";
pub(crate) const INVALID_AMOUNT_MSG: &str = "Amount must be a positive number";

/// Whether a record is money earned or money spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
}

impl RecordKind {
    /// Both kinds, income first.
    pub const ALL: [RecordKind; 2] = [RecordKind::Income, RecordKind::Expense];

    /// The lowercase name used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Income => "income",
            RecordKind::Expense => "expense",
        }
    }

    /// The capitalised name used in messages shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            RecordKind::Income => "Income",
            RecordKind::Expense => "Expense",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" => Ok(RecordKind::Income),
            "expense" => Ok(RecordKind::Expense),
            other => Err(format!("\"{other}\" is not a record type, use income or expense")),
        }
    }
}

impl ToSql for RecordKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RecordKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A newtype wrapper for integer ledger record IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct RecordId(i64);

impl RecordId {
    /// Create a new record ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the record ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Parse a record ID from a URL path segment.
    ///
    /// Returns `None` for anything that is not a positive integer.
    pub fn parse(raw_id: &str) -> Option<Self> {
        raw_id.parse().ok().filter(|id| *id > 0).map(Self)
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

mod date_format {
    //! Serializes a [time::Date] as "YYYY-MM-DD".
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

    pub const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = date.format(DATE_FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Date::parse(&s, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

mod timestamp_format {
    //! Serializes a [time::OffsetDateTime] as an RFC 3339 string.
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{OffsetDateTime, format_description::well_known::Rfc3339};

    pub fn serialize<S>(dt: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = dt.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

/// An income or expense entry owned by exactly one user.
///
/// The owner and kind of a record never change after it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    /// The ID of the record.
    pub id: RecordId,
    /// The user that created the record.
    pub owner_id: UserID,
    /// A short name for the record, e.g. "Salary" or "Rent".
    pub title: String,
    /// The amount of money earned or spent, always positive.
    pub amount: f64,
    /// Whether the record is income or an expense.
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// A free-form grouping, e.g. "Housing".
    pub category: String,
    /// An optional longer explanation, empty if not given.
    pub description: String,
    /// When the money was earned or spent.
    #[serde(with = "date_format")]
    pub date: Date,
    /// When the record was created.
    #[serde(with = "timestamp_format")]
    pub created_at: OffsetDateTime,
    /// When the record was last changed.
    #[serde(with = "timestamp_format")]
    pub updated_at: OffsetDateTime,
}

/// The raw, unvalidated fields of a record as sent by a client.
///
/// Every field is optional so that the same form serves both creation, where
/// the required fields are checked, and partial updates, where missing fields
/// keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordForm {
    /// The record title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The amount, either a JSON number or a numeric string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    /// The record category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// The optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The date as "YYYY-MM-DD" or an RFC 3339 date-time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Record fields that have passed validation and are ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    /// The trimmed, non-empty title.
    pub title: String,
    /// A finite amount greater than zero.
    pub amount: f64,
    /// The trimmed, non-empty category.
    pub category: String,
    /// The trimmed description, possibly empty.
    pub description: String,
    /// The calendar date.
    pub date: Date,
}

impl RecordForm {
    /// Check the form against the record schema.
    ///
    /// # Errors
    /// Returns a [Error::Validation] if:
    /// - title, amount, category or date is missing or blank,
    /// - the amount is not a number greater than zero,
    /// - a text field is longer than its limit,
    /// - or the date cannot be parsed.
    pub fn validate(self) -> Result<ValidatedRecord, Error> {
        let title = non_blank(self.title.as_deref());
        let category = non_blank(self.category.as_deref());
        let date = non_blank(self.date.as_deref());
        let amount = self.amount.filter(|amount| !is_blank_value(amount));

        let (Some(title), Some(amount), Some(category), Some(date)) =
            (title, amount, category, date)
        else {
            return Err(Error::Validation(REQUIRED_FIELDS_MSG.to_owned()));
        };

        let amount = parse_amount(&amount)?;
        let description = self.description.as_deref().unwrap_or_default().trim();

        check_length("Title", title, MAX_TITLE_LENGTH)?;
        check_length("Category", category, MAX_CATEGORY_LENGTH)?;
        check_length("Description", description, MAX_DESCRIPTION_LENGTH)?;

        Ok(ValidatedRecord {
            title: title.to_owned(),
            amount,
            category: category.to_owned(),
            description: description.to_owned(),
            date: parse_date(date)?,
        })
    }

    /// Fill the fields missing from this form with the values of `existing`.
    ///
    /// Used for partial updates, the result should be validated like a new record.
    pub fn merged_with(self, existing: &LedgerRecord) -> RecordForm {
        RecordForm {
            title: self.title.or_else(|| Some(existing.title.clone())),
            amount: self.amount.or_else(|| {
                serde_json::Number::from_f64(existing.amount).map(Value::Number)
            }),
            category: self.category.or_else(|| Some(existing.category.clone())),
            description: self
                .description
                .or_else(|| Some(existing.description.clone())),
            date: self.date.or_else(|| {
                existing.date.format(date_format::DATE_FORMAT).ok()
            }),
        }
    }
}

impl From<&LedgerRecord> for RecordForm {
    fn from(record: &LedgerRecord) -> Self {
        RecordForm::default().merged_with(record)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(string) => string.trim().is_empty(),
        _ => false,
    }
}

fn parse_amount(value: &Value) -> Result<f64, Error> {
    let amount = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(string) => string.trim().parse::<f64>().ok(),
        _ => None,
    };

    match amount {
        Some(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        _ => Err(Error::Validation(INVALID_AMOUNT_MSG.to_owned())),
    }
}

fn check_length(field: &str, value: &str, max_length: usize) -> Result<(), Error> {
    if value.graphemes(true).count() > max_length {
        return Err(Error::Validation(format!(
            "{field} cannot exceed {max_length} characters"
        )));
    }

    Ok(())
}

/// Parse a calendar date from either "YYYY-MM-DD" or an RFC 3339 date-time.
pub(crate) fn parse_date(raw_date: &str) -> Result<Date, Error> {
    Date::parse(raw_date, date_format::DATE_FORMAT)
        .or_else(|_| OffsetDateTime::parse(raw_date, &Rfc3339).map(|dt| dt.date()))
        .map_err(|_| Error::Validation(format!("\"{raw_date}\" is not a valid date")))
}

/// Format a date the same way it is sent over the wire.
pub fn format_date(date: Date) -> String {
    date.format(date_format::DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

//! Database operations for income and expense records.
//!
//! Every query is scoped to an owner and a kind, so a record that belongs to
//! another user looks exactly like one that does not exist.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error, UserID,
    ledger::record::{LedgerRecord, RecordId, RecordKind, ValidatedRecord},
};

const RECORD_COLUMNS: &str =
    "id, user_id, title, amount, kind, category, description, date, created_at, updated_at";

/// Initialize the ledger record table and indexes.
pub fn create_ledger_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS ledger_record (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            amount REAL NOT NULL CHECK (amount > 0),
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            category TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_ledger_record_owner_kind_date
            ON ledger_record(user_id, kind, date);",
    )?;

    Ok(())
}

/// Create a record owned by `owner_id` and return it with its generated ID.
pub fn create_record(
    owner_id: UserID,
    kind: RecordKind,
    fields: ValidatedRecord,
    connection: &Connection,
) -> Result<LedgerRecord, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(&format!(
            "INSERT INTO ledger_record
                (user_id, title, amount, kind, category, description, date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             RETURNING {RECORD_COLUMNS}"
        ))?
        .query_row(
            (
                owner_id.as_i64(),
                &fields.title,
                fields.amount,
                kind,
                &fields.category,
                &fields.description,
                fields.date,
                now,
            ),
            map_record_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve a single record of `kind` owned by `owner_id`.
///
/// # Errors
/// Returns [Error::RecordNotFound] if the record does not exist, is of the
/// other kind, or belongs to another user.
pub fn get_record(
    record_id: RecordId,
    owner_id: UserID,
    kind: RecordKind,
    connection: &Connection,
) -> Result<LedgerRecord, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM ledger_record
             WHERE id = ?1 AND user_id = ?2 AND kind = ?3"
        ))?
        .query_row((record_id.as_i64(), owner_id.as_i64(), kind), map_record_row)
        .map_err(|error| not_found_as(kind, error.into()))
}

/// Retrieve all records of `kind` owned by `owner_id`, newest date first.
///
/// Records on the same date are ordered newest first by ID.
pub fn list_records(
    owner_id: UserID,
    kind: RecordKind,
    connection: &Connection,
) -> Result<Vec<LedgerRecord>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM ledger_record
             WHERE user_id = ?1 AND kind = ?2
             ORDER BY date DESC, id DESC"
        ))?
        .query_map((owner_id.as_i64(), kind), map_record_row)?
        .map(|maybe_record| maybe_record.map_err(|error| error.into()))
        .collect()
}

/// Overwrite the fields of a record and refresh its `updated_at` timestamp.
///
/// # Errors
/// Returns [Error::RecordNotFound] if no record matches `(record_id, owner_id, kind)`.
pub fn update_record(
    record_id: RecordId,
    owner_id: UserID,
    kind: RecordKind,
    fields: ValidatedRecord,
    connection: &Connection,
) -> Result<LedgerRecord, Error> {
    connection
        .prepare(&format!(
            "UPDATE ledger_record
             SET title = ?1, amount = ?2, category = ?3, description = ?4, date = ?5, updated_at = ?6
             WHERE id = ?7 AND user_id = ?8 AND kind = ?9
             RETURNING {RECORD_COLUMNS}"
        ))?
        .query_row(
            (
                &fields.title,
                fields.amount,
                &fields.category,
                &fields.description,
                fields.date,
                OffsetDateTime::now_utc(),
                record_id.as_i64(),
                owner_id.as_i64(),
                kind,
            ),
            map_record_row,
        )
        .map_err(|error| not_found_as(kind, error.into()))
}

/// Delete a record of `kind` owned by `owner_id`.
///
/// # Errors
/// Returns [Error::RecordNotFound] if no record matches `(record_id, owner_id, kind)`.
pub fn delete_record(
    record_id: RecordId,
    owner_id: UserID,
    kind: RecordKind,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM ledger_record WHERE id = ?1 AND user_id = ?2 AND kind = ?3",
        (record_id.as_i64(), owner_id.as_i64(), kind),
    )?;

    if rows_affected == 0 {
        return Err(Error::RecordNotFound(kind));
    }

    Ok(())
}

fn not_found_as(kind: RecordKind, error: Error) -> Error {
    match error {
        Error::NotFound => Error::RecordNotFound(kind),
        error => error,
    }
}

fn map_record_row(row: &Row) -> Result<LedgerRecord, rusqlite::Error> {
    Ok(LedgerRecord {
        id: RecordId::new(row.get(0)?),
        owner_id: UserID::new(row.get(1)?),
        title: row.get(2)?,
        amount: row.get(3)?,
        kind: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        date: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{
        Error,
        ledger::{
            db::{create_record, delete_record, get_record, list_records, update_record},
            record::{RecordId, RecordKind, ValidatedRecord},
        },
        test_utils::{create_test_user, get_test_connection},
    };

    fn fields(title: &str, amount: f64, date: time::Date) -> ValidatedRecord {
        ValidatedRecord {
            title: title.to_owned(),
            amount,
            category: "General".to_owned(),
            description: String::new(),
            date,
        }
    }

    #[test]
    fn create_record_returns_stored_record() {
        let connection = get_test_connection();
        let owner = create_test_user("a@x.com", &connection).id;

        let record = create_record(
            owner,
            RecordKind::Income,
            fields("Salary", 1000.0, date!(2024 - 01 - 15)),
            &connection,
        )
        .unwrap();

        assert!(record.id.as_i64() > 0);
        assert_eq!(record.owner_id, owner);
        assert_eq!(record.kind, RecordKind::Income);
        assert_eq!(record.amount, 1000.0);
        assert_eq!(record.date, date!(2024 - 01 - 15));
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(
            get_record(record.id, owner, RecordKind::Income, &connection),
            Ok(record)
        );
    }

    #[test]
    fn list_records_is_scoped_and_ordered() {
        let connection = get_test_connection();
        let owner = create_test_user("a@x.com", &connection).id;
        let other = create_test_user("b@x.com", &connection).id;
        let older = create_record(
            owner,
            RecordKind::Expense,
            fields("Groceries", 50.0, date!(2024 - 01 - 10)),
            &connection,
        )
        .unwrap();
        let newer = create_record(
            owner,
            RecordKind::Expense,
            fields("Rent", 400.0, date!(2024 - 01 - 16)),
            &connection,
        )
        .unwrap();
        let same_day = create_record(
            owner,
            RecordKind::Expense,
            fields("Coffee", 4.0, date!(2024 - 01 - 16)),
            &connection,
        )
        .unwrap();
        create_record(
            owner,
            RecordKind::Income,
            fields("Salary", 1000.0, date!(2024 - 01 - 15)),
            &connection,
        )
        .unwrap();
        create_record(
            other,
            RecordKind::Expense,
            fields("Rent", 900.0, date!(2024 - 01 - 20)),
            &connection,
        )
        .unwrap();

        let got = list_records(owner, RecordKind::Expense, &connection).unwrap();

        assert_eq!(got, vec![same_day, newer, older]);
    }

    #[test]
    fn list_records_is_empty_for_new_user() {
        let connection = get_test_connection();
        let owner = create_test_user("a@x.com", &connection).id;

        let got = list_records(owner, RecordKind::Income, &connection).unwrap();

        assert!(got.is_empty());
    }

    #[test]
    fn update_record_changes_fields_and_timestamp() {
        let connection = get_test_connection();
        let owner = create_test_user("a@x.com", &connection).id;
        let record = create_record(
            owner,
            RecordKind::Expense,
            fields("Rent", 400.0, date!(2024 - 01 - 16)),
            &connection,
        )
        .unwrap();

        let updated = update_record(
            record.id,
            owner,
            RecordKind::Expense,
            fields("Rent", 450.0, date!(2024 - 01 - 16)),
            &connection,
        )
        .unwrap();

        assert_eq!(updated.id, record.id);
        assert_eq!(updated.amount, 450.0);
        assert_eq!(updated.created_at, record.created_at);
        assert!(updated.updated_at >= record.updated_at);
    }

    #[test]
    fn other_users_records_are_not_found() {
        let connection = get_test_connection();
        let owner = create_test_user("a@x.com", &connection).id;
        let intruder = create_test_user("b@x.com", &connection).id;
        let record = create_record(
            owner,
            RecordKind::Expense,
            fields("Rent", 400.0, date!(2024 - 01 - 16)),
            &connection,
        )
        .unwrap();
        let want = Err(Error::RecordNotFound(RecordKind::Expense));

        assert_eq!(
            get_record(record.id, intruder, RecordKind::Expense, &connection),
            want
        );
        assert_eq!(
            update_record(
                record.id,
                intruder,
                RecordKind::Expense,
                fields("Mine now", 1.0, date!(2024 - 01 - 16)),
                &connection,
            ),
            want
        );
        assert_eq!(
            delete_record(record.id, intruder, RecordKind::Expense, &connection),
            Err(Error::RecordNotFound(RecordKind::Expense))
        );
        assert_eq!(
            get_record(record.id, owner, RecordKind::Expense, &connection),
            Ok(record)
        );
    }

    #[test]
    fn records_are_not_found_under_the_other_kind() {
        let connection = get_test_connection();
        let owner = create_test_user("a@x.com", &connection).id;
        let record = create_record(
            owner,
            RecordKind::Income,
            fields("Salary", 1000.0, date!(2024 - 01 - 15)),
            &connection,
        )
        .unwrap();

        assert_eq!(
            delete_record(record.id, owner, RecordKind::Expense, &connection),
            Err(Error::RecordNotFound(RecordKind::Expense))
        );
    }

    #[test]
    fn delete_record_removes_it() {
        let connection = get_test_connection();
        let owner = create_test_user("a@x.com", &connection).id;
        let record = create_record(
            owner,
            RecordKind::Income,
            fields("Salary", 1000.0, date!(2024 - 01 - 15)),
            &connection,
        )
        .unwrap();

        delete_record(record.id, owner, RecordKind::Income, &connection).unwrap();

        assert_eq!(
            get_record(record.id, owner, RecordKind::Income, &connection),
            Err(Error::RecordNotFound(RecordKind::Income))
        );
        assert_eq!(
            delete_record(RecordId::new(999), owner, RecordKind::Income, &connection),
            Err(Error::RecordNotFound(RecordKind::Income))
        );
    }
}

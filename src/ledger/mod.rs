//! Income and expense records: the model, its storage and the HTTP handlers.

mod db;
mod endpoints;
mod record;

pub use db::{
    create_ledger_table, create_record, delete_record, get_record, list_records, update_record,
};
pub use endpoints::{LedgerState, ledger_router};
pub use record::{
    LedgerRecord, MAX_CATEGORY_LENGTH, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH, RecordForm,
    RecordId, RecordKind, ValidatedRecord, format_date,
};

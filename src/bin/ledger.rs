use std::{fs::File, io, path::PathBuf, process::ExitCode};

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use pocket_ledger::{
    LedgerRecord, LogInData, RecordForm, RecordId, RecordKind, RegisterForm, format_date,
    client::{
        ClientStore, DEFAULT_REQUEST_TIMEOUT, FileTokenStore, HttpLedgerApi, Notice,
        summary::{
            KindFilter, RECENT_ENTRY_COUNT, balance, filter_history, format_currency,
            merged_history, monthly_buckets, recent, total,
        },
        write_history_csv,
    },
};

/// A terminal client for the Pocket Ledger API.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The base URL of the API server.
    #[arg(long, env = "LEDGER_SERVER_URL", default_value = "http://localhost:4000")]
    server_url: String,

    /// The file the session token is kept in between runs.
    #[arg(long, env = "LEDGER_TOKEN_PATH", default_value = ".pocket_ledger_token.json")]
    token_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and sign in. The password is read from the terminal.
    Register {
        /// Your display name.
        #[arg(long)]
        name: String,
        /// Your email address.
        #[arg(long)]
        email: String,
    },
    /// Sign in. The password is read from the terminal.
    LogIn {
        /// Your email address.
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget the saved session.
    LogOut,
    /// Record income or an expense.
    Add {
        /// Either "income" or "expense".
        kind: RecordKind,
        #[command(flatten)]
        fields: RecordFields,
    },
    /// List the income or expenses, newest first.
    List {
        /// Either "income" or "expense".
        kind: RecordKind,
    },
    /// Change some fields of a record.
    Edit {
        /// Either "income" or "expense".
        kind: RecordKind,
        /// The ID shown by `list`.
        #[arg(value_parser = parse_record_id)]
        id: RecordId,
        #[command(flatten)]
        fields: RecordFields,
    },
    /// Delete a record.
    Delete {
        /// Either "income" or "expense".
        kind: RecordKind,
        /// The ID shown by `list`.
        #[arg(value_parser = parse_record_id)]
        id: RecordId,
    },
    /// Show the totals, balance and most recent activity.
    Summary,
    /// Show income and expenses together, newest first.
    History {
        /// Only show entries whose title contains this text.
        #[arg(long, default_value = "")]
        search: String,
        /// Only show entries of this type.
        #[arg(long = "type", value_enum, default_value_t = KindFilter::All)]
        kind: KindFilter,
    },
    /// Show income and expenses per month.
    Monthly,
    /// Write the history as CSV.
    Export {
        /// The file to write to, standard output if omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// The fields of a record. For `add` every field but the description is required.
#[derive(ClapArgs, Debug)]
struct RecordFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    amount: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// YYYY-MM-DD.
    #[arg(long)]
    date: Option<String>,
}

impl From<RecordFields> for RecordForm {
    fn from(fields: RecordFields) -> Self {
        RecordForm {
            title: fields.title,
            amount: fields.amount.map(Value::String),
            category: fields.category,
            description: fields.description,
            date: fields.date,
        }
    }
}

type Store = ClientStore<HttpLedgerApi, FileTokenStore>;

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let args = Args::parse();

    let api = match HttpLedgerApi::new(&args.server_url, DEFAULT_REQUEST_TIMEOUT) {
        Ok(api) => api,
        Err(error) => {
            print_error(error);
            return ExitCode::FAILURE;
        }
    };
    let mut store = ClientStore::new(api, FileTokenStore::new(&args.token_path));

    let succeeded = run(args.command, &mut store).await;
    print_notices(&mut store);

    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn setup_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(command: Command, store: &mut Store) -> bool {
    match command {
        Command::Register { name, email } => {
            let Some(password) = prompt_password("Password: ") else {
                return false;
            };
            let form = RegisterForm {
                name: Some(name),
                email: Some(email),
                password: Some(password),
            };
            store.register(form).await.is_ok()
        }
        Command::LogIn { email } => {
            let Some(password) = prompt_password("Password: ") else {
                return false;
            };
            let credentials = LogInData {
                email: Some(email),
                password: Some(password),
            };
            store.log_in(credentials).await.is_ok()
        }
        Command::LogOut => {
            store.log_out();
            true
        }
        command => {
            if !resume_session(store).await {
                return false;
            }
            run_with_session(command, store).await
        }
    }
}

async fn resume_session(store: &mut Store) -> bool {
    if store.restore().await.is_err() {
        return false;
    }

    if !store.is_logged_in() {
        print_error("You must log in first, run `ledger log-in --email <EMAIL>`.");
        return false;
    }

    true
}

async fn run_with_session(command: Command, store: &mut Store) -> bool {
    match command {
        Command::Add { kind, fields } => store.add(kind, fields.into()).await.is_ok(),
        Command::Edit { kind, id, fields } => store.update(kind, id, fields.into()).await.is_ok(),
        Command::Delete { kind, id } => store.delete(kind, id).await.is_ok(),
        Command::List { kind } => {
            print_records(store.records(kind));
            true
        }
        Command::Summary => {
            print_summary(store);
            true
        }
        Command::History { search, kind } => {
            let history = merged_history(store.income(), store.expense());
            print_records(&filter_history(&history, &search, kind));
            true
        }
        Command::Monthly => {
            for bucket in monthly_buckets(store.income(), store.expense()) {
                println!(
                    "{:<10}  income {:>14}  expense {:>14}",
                    bucket.label(),
                    format_currency(bucket.income),
                    format_currency(bucket.expense)
                );
            }
            true
        }
        Command::Export { output } => export(store, output),
        Command::Register { .. } | Command::LogIn { .. } | Command::LogOut => true,
    }
}

fn print_summary(store: &Store) {
    let (income, expense) = (store.income(), store.expense());

    if let Some(user) = store.user() {
        println!("Signed in as {} <{}>\n", user.name, user.email);
    }
    println!("Total income:   {:>14}", format_currency(total(income)));
    println!("Total expenses: {:>14}", format_currency(total(expense)));
    println!("Balance:        {:>14}", format_currency(balance(income, expense)));

    let history = merged_history(income, expense);
    println!("\nRecent activity:");
    print_records(recent(&history, RECENT_ENTRY_COUNT));
}

fn print_records(records: &[LedgerRecord]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }

    for record in records {
        let amount = match record.kind {
            RecordKind::Income => format_currency(record.amount),
            RecordKind::Expense => format_currency(-record.amount),
        };
        println!(
            "{:>5}  {}  {:<7}  {:<30}  {:<20}  {:>14}",
            record.id,
            format_date(record.date),
            record.kind.as_str(),
            record.title,
            record.category,
            amount
        );
    }
}

fn export(store: &Store, output: Option<PathBuf>) -> bool {
    let history = merged_history(store.income(), store.expense());

    let result = match &output {
        Some(path) => match File::create(path) {
            Ok(file) => write_history_csv(&history, file),
            Err(error) => {
                print_error(format!("Could not create {}: {error}", path.display()));
                return false;
            }
        },
        None => write_history_csv(&history, io::stdout().lock()),
    };

    match result {
        Ok(()) => {
            if let Some(path) = output {
                println!("Exported {} entries to {}", history.len(), path.display());
            }
            true
        }
        Err(error) => {
            print_error(format!("Could not export history: {error}"));
            false
        }
    }
}

fn parse_record_id(raw_id: &str) -> Result<RecordId, String> {
    RecordId::parse(raw_id).ok_or_else(|| format!("\"{raw_id}\" is not a record ID"))
}

/// Read a password without echoing it, `None` if it could not be read.
fn prompt_password(prompt: &str) -> Option<String> {
    match rpassword::prompt_password(prompt) {
        Ok(password) => Some(password),
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn print_notices(store: &mut Store) {
    for notice in store.take_notices() {
        match notice {
            Notice::Success(message) => println!("\x1b[32;1m{message}\x1b[0m"),
            Notice::Error(message) => print_error(message),
        }
    }
}

fn print_error(error: impl ToString) {
    eprintln!("\x1b[31;1m{}\x1b[0m", error.to_string())
}

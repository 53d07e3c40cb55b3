//! Command-line entry point over the library API.
//!
//! # Responsibility
//! - Map subcommands onto `LibraryApi` handlers and print the JSON body.
//! - Resolve configuration from flags first, then `SHELFDESK_*` variables.
//!
//! # Invariants
//! - Exit status is non-zero whenever the handler returned an error status.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use shelfdesk_api::{ApiResponse, BorrowRequest, LibraryApi, ReturnRequest};
use shelfdesk_core::config::{ENV_DB_PATH, ENV_LOAN_PERIOD_DAYS, ENV_LOG_DIR, ENV_LOG_LEVEL};
use shelfdesk_core::{
    init_logging_from_config, BookPatch, CirculationService, ConfigError, CoreConfig, ErrorKind,
    NewBook, NewMember, NoopPublisher, SqliteLoanRepository,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Library circulation desk.
#[derive(Parser)]
#[command(name = "shelfdesk", version, about = "Library circulation desk")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Lending window for new loans, in days.
    #[arg(long, global = true)]
    loan_days: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness check.
    Health,
    /// Catalog, member and loan counters.
    Dashboard,
    /// List every book in the catalog.
    Books,
    /// Show one book.
    Book { id: String },
    /// Case-insensitive search over title, author and category.
    Search { query: String },
    /// Books in exactly this category.
    Category { name: String },
    /// Add a book to the catalog.
    AddBook(BookFields),
    /// Edit a book; omitted fields keep their value.
    UpdateBook {
        id: String,
        #[command(flatten)]
        fields: BookPatchFields,
    },
    /// Remove a book with no copies on loan.
    DeleteBook { id: String },
    /// List every member.
    Members,
    /// Show one member.
    Member { id: String },
    /// Register a member.
    AddMember(MemberFields),
    /// Lend one copy of a book to a member.
    Borrow {
        #[arg(long)]
        book: String,
        #[arg(long)]
        member: String,
    },
    /// Return a loan.
    Return {
        #[arg(long)]
        loan: String,
    },
    /// Open loans, soonest due first.
    Active,
    /// Every loan of one member.
    History { member: String },
    /// A member's notification feed, newest first.
    Notifications { member: String },
    /// Report books whose availability disagrees with their open loans.
    Audit,
}

#[derive(Args)]
struct BookFields {
    #[arg(long)]
    title: String,
    #[arg(long)]
    author: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    copies: Option<u32>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args)]
struct BookPatchFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    copies: Option<u32>,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args)]
struct MemberFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip: Option<String>,
}

impl Cli {
    /// Flag values keyed by the environment variable they override.
    fn overrides(&self) -> HashMap<&'static str, String> {
        let mut overrides = HashMap::new();
        if let Some(db) = &self.db {
            overrides.insert(ENV_DB_PATH, db.display().to_string());
        }
        if let Some(dir) = &self.log_dir {
            overrides.insert(ENV_LOG_DIR, dir.display().to_string());
        }
        if let Some(level) = &self.log_level {
            overrides.insert(ENV_LOG_LEVEL, level.clone());
        }
        if let Some(days) = self.loan_days {
            overrides.insert(ENV_LOAN_PERIOD_DAYS, days.to_string());
        }
        overrides
    }

    /// Flags win over `env`; anything neither sets keeps its default.
    fn resolve_config(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<CoreConfig, ConfigError> {
        let overrides = self.overrides();
        CoreConfig::from_lookup(|key| overrides.get(key).cloned().or_else(|| env(key)))
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .resolve_config(|key| std::env::var(key).ok())
        .context("invalid configuration")?;

    init_logging_from_config(&config).context("failed to start logging")?;

    let api = LibraryApi::from_config(&config, Arc::new(NoopPublisher))
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    let response = dispatch(&api, cli.command);
    print_response(&response)
}

fn dispatch(api: &LibraryApi, command: Commands) -> ApiResponse {
    match command {
        Commands::Health => api.health(),
        Commands::Dashboard => api.dashboard(),
        Commands::Books => api.list_books(),
        Commands::Book { id } => api.get_book(&id),
        Commands::Search { query } => api.search_books(&query),
        Commands::Category { name } => api.books_by_category(&name),
        Commands::AddBook(fields) => api.add_book(NewBook {
            title: fields.title,
            author: fields.author,
            category: fields.category,
            publish_year: fields.year,
            isbn: fields.isbn,
            description: fields.description,
            total_copies: fields.copies,
        }),
        Commands::UpdateBook { id, fields } => api.update_book(
            &id,
            &BookPatch {
                title: fields.title,
                author: fields.author,
                category: fields.category,
                publish_year: fields.year,
                isbn: fields.isbn,
                description: fields.description,
                total_copies: fields.copies,
            },
        ),
        Commands::DeleteBook { id } => api.delete_book(&id),
        Commands::Members => api.list_members(),
        Commands::Member { id } => api.get_member(&id),
        Commands::AddMember(fields) => api.add_member(NewMember {
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            address: fields.address,
            city: fields.city,
            state: fields.state,
            zip_code: fields.zip,
        }),
        Commands::Borrow { book, member } => api.borrow(&BorrowRequest::new(book, member)),
        Commands::Return { loan } => api.return_book(&ReturnRequest::new(loan)),
        Commands::Active => api.active_loans(),
        Commands::History { member } => api.borrowing_history(&member),
        Commands::Notifications { member } => api.notifications(&member),
        Commands::Audit => audit(api)
            .unwrap_or_else(|err| ApiResponse::failure(ErrorKind::StorageError, format!("{err:#}"))),
    }
}

/// Availability audit runs against the core directly; it is an operator
/// tool, not a library route.
fn audit(api: &LibraryApi) -> Result<ApiResponse> {
    let mut conn = api.store().connection()?;
    let service =
        CirculationService::new(SqliteLoanRepository::new(&mut conn), Arc::new(NoopPublisher));
    let drift = service.audit_availability()?;
    Ok(ApiResponse::ok(&drift))
}

fn print_response(response: &ApiResponse) -> Result<ExitCode> {
    let rendered = serde_json::to_string_pretty(&response.body)?;
    if response.is_success() {
        println!("{rendered}");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("error {}: {rendered}", response.status);
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;
    use shelfdesk_core::config::{ENV_DB_PATH, ENV_LOAN_PERIOD_DAYS, ENV_LOG_LEVEL};
    use shelfdesk_core::LogLevel;
    use std::path::PathBuf;

    fn env(key: &str) -> Option<String> {
        match key {
            ENV_DB_PATH => Some("/srv/env/library.db".to_string()),
            ENV_LOAN_PERIOD_DAYS => Some("21".to_string()),
            ENV_LOG_LEVEL => Some("error".to_string()),
            _ => None,
        }
    }

    #[test]
    fn flags_override_environment() {
        let cli = Cli::try_parse_from([
            "shelfdesk",
            "--loan-days",
            "7",
            "--log-level",
            "warn",
            "health",
        ])
        .unwrap();
        let config = cli.resolve_config(env).unwrap();

        assert_eq!(config.loan_period_days, 7);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.db_path, PathBuf::from("/srv/env/library.db"));
    }

    #[test]
    fn environment_applies_without_flags() {
        let cli = Cli::try_parse_from(["shelfdesk", "books", "--db", "/srv/flag.db"]).unwrap();
        let config = cli.resolve_config(env).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/srv/flag.db"));
        assert_eq!(config.loan_period_days, 21);
        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn out_of_range_flag_is_rejected() {
        let cli = Cli::try_parse_from(["shelfdesk", "--loan-days", "0", "health"]).unwrap();
        assert!(cli.resolve_config(env).is_err());
    }
}

//! Core domain logic for Shelfdesk.
//! This crate is the single source of truth for circulation invariants.

pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{DbError, RecordStore};
pub use events::{
    ChannelPublisher, EventBuffer, EventPublisher, EventSubscription, LibraryEvent, NoopPublisher,
    DEFAULT_EVENT_CAPACITY,
};
pub use logging::{
    init_logging, init_logging_from_config, logging_status, LogLevel, LogSettings, LoggingError,
};
pub use model::book::{Book, BookId, BookPatch, NewBook};
pub use model::loan::{
    is_overdue, AvailabilityDrift, CirculationStats, EnrichedLoan, Loan, LoanId, LoanReceipt,
    LoanStatus, ReturnReceipt, DEFAULT_LOAN_PERIOD_DAYS,
};
pub use model::member::{Member, MemberId, MemberStatus, NewMember};
pub use model::notification::{Notification, NotificationKind};
pub use model::{now_epoch_ms, EpochMs, ValidationError, DAY_MS, UNKNOWN_REFERENCE};
pub use repo::book_repo::{BookListQuery, BookRepository, SqliteBookRepository};
pub use repo::loan_repo::{
    BorrowOutcome, BorrowedLoan, LoanRepository, ReturnOutcome, ReturnedLoan,
    SqliteLoanRepository,
};
pub use repo::member_repo::{MemberRepository, SqliteMemberRepository};
pub use repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
pub use repo::{RepoError, RepoResult};
pub use service::catalog_service::{CatalogError, CatalogService};
pub use service::circulation_service::{CirculationError, CirculationService};
pub use service::member_service::{MemberError, MemberService};
pub use service::notification_service::NotificationService;
pub use service::ErrorKind;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

//! Use-case API for transport adapters (HTTP routes, sockets, CLI).
//!
//! # Responsibility
//! - Expose one function per library route, each returning [`ApiResponse`].
//! - Parse identifiers and classify errors at a single boundary.
//!
//! # Invariants
//! - Handlers never panic; every failure becomes a status plus error body.
//! - Each handler holds the store lock for exactly one unit of work.
//! - Events reach the configured publisher only after that lock is released.
//! - JSON bodies use camelCase field names.

use crate::requests::{parse_id, BorrowRequest, ReturnRequest};
use crate::response::{from_error, ApiResponse};
use log::{debug, error, warn};
use rusqlite::Connection;
use serde_json::json;
use shelfdesk_core::{
    core_version, now_epoch_ms, BookPatch, CatalogError, CatalogService, CirculationError,
    CirculationService, CoreConfig, DbError, ErrorKind, EventBuffer, EventPublisher, MemberError,
    MemberService, NewBook, NewMember, NotificationService, RecordStore, RepoError,
    SqliteBookRepository, SqliteLoanRepository, SqliteMemberRepository,
    SqliteNotificationRepository, DEFAULT_LOAN_PERIOD_DAYS,
};
use std::sync::{Arc, MutexGuard};

type Handled = Result<ApiResponse, ApiResponse>;

/// Library request handlers over one shared record store.
pub struct LibraryApi {
    store: Arc<RecordStore>,
    events: Arc<dyn EventPublisher>,
    loan_period_days: u32,
}

impl LibraryApi {
    pub fn new(store: Arc<RecordStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            events,
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
        }
    }

    /// Opens the configured store and applies the configured loan period.
    pub fn from_config(
        config: &CoreConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self, DbError> {
        let store = RecordStore::open(&config.db_path)?;
        Ok(Self::new(Arc::new(store), events).with_loan_period_days(config.loan_period_days))
    }

    pub fn with_loan_period_days(mut self, days: u32) -> Self {
        self.loan_period_days = days;
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// `POST /loans/borrow` → 201 with the loan receipt.
    pub fn borrow(&self, request: &BorrowRequest) -> ApiResponse {
        respond("borrow", || {
            let book_id = parse_id("bookId", &request.book_id).map_err(|err| from_error(&err))?;
            let member_id =
                parse_id("memberId", &request.member_id).map_err(|err| from_error(&err))?;
            let receipt = self.with_circulation(|service| service.borrow(book_id, member_id))?;
            Ok(ApiResponse::created(&receipt))
        })
    }

    /// `POST /loans/return` → 200 `{success, loanId}`.
    pub fn return_book(&self, request: &ReturnRequest) -> ApiResponse {
        respond("return", || {
            let loan_id = parse_id("loanId", &request.loan_id).map_err(|err| from_error(&err))?;
            if request.member_id.is_some() {
                debug!("event=api_return module=api status=ignored field=memberId loan_id={loan_id}");
            }
            let receipt = self.with_circulation(|service| service.return_loan(loan_id))?;
            Ok(ApiResponse::ok(&receipt))
        })
    }

    /// `GET /loans/active` → open loans, soonest due first.
    pub fn active_loans(&self) -> ApiResponse {
        respond("active_loans", || {
            let loans = self.with_circulation(|service| service.active_loans())?;
            Ok(ApiResponse::ok(&loans))
        })
    }

    /// `GET /loans/history/:memberId` → every loan of the member.
    pub fn borrowing_history(&self, member_id: &str) -> ApiResponse {
        respond("borrowing_history", || {
            let member_id = parse_id("memberId", member_id).map_err(|err| from_error(&err))?;
            let loans = self.with_circulation(|service| service.borrowing_history(member_id))?;
            Ok(ApiResponse::ok(&loans))
        })
    }

    /// `GET /notifications/:memberId` → feed, newest first.
    pub fn notifications(&self, member_id: &str) -> ApiResponse {
        respond("notifications", || {
            let member_id = parse_id("memberId", member_id).map_err(|err| from_error(&err))?;
            let conn = self.lock()?;
            let feed = NotificationService::new(SqliteNotificationRepository::new(&conn));
            let entries = feed.list(member_id).map_err(|err: RepoError| from_error(&err))?;
            Ok(ApiResponse::ok(&entries))
        })
    }

    pub fn list_books(&self) -> ApiResponse {
        respond("list_books", || {
            let books = self.with_catalog(|catalog| catalog.list_books())?;
            Ok(ApiResponse::ok(&books))
        })
    }

    pub fn get_book(&self, book_id: &str) -> ApiResponse {
        respond("get_book", || {
            let book_id = parse_id("bookId", book_id).map_err(|err| from_error(&err))?;
            match self.with_catalog(|catalog| catalog.get_book(book_id))? {
                Some(book) => Ok(ApiResponse::ok(&book)),
                None => Err(ApiResponse::failure(ErrorKind::NotFound, "Book not found")),
            }
        })
    }

    pub fn search_books(&self, query: &str) -> ApiResponse {
        respond("search_books", || {
            let books = self.with_catalog(|catalog| catalog.search_books(query))?;
            Ok(ApiResponse::ok(&books))
        })
    }

    pub fn books_by_category(&self, category: &str) -> ApiResponse {
        respond("books_by_category", || {
            let books = self.with_catalog(|catalog| catalog.list_by_category(category))?;
            Ok(ApiResponse::ok(&books))
        })
    }

    /// `POST /books` → 201 with the stored book.
    pub fn add_book(&self, input: NewBook) -> ApiResponse {
        respond("add_book", || {
            let book = self.with_catalog(|catalog| catalog.create_book(input))?;
            Ok(ApiResponse::created(&book))
        })
    }

    pub fn update_book(&self, book_id: &str, patch: &BookPatch) -> ApiResponse {
        respond("update_book", || {
            let book_id = parse_id("bookId", book_id).map_err(|err| from_error(&err))?;
            let book = self.with_catalog(|catalog| catalog.update_book(book_id, patch))?;
            Ok(ApiResponse::ok(&book))
        })
    }

    /// `DELETE /books/:id` → `{success: true}`; 409 while copies are out.
    pub fn delete_book(&self, book_id: &str) -> ApiResponse {
        respond("delete_book", || {
            let book_id = parse_id("bookId", book_id).map_err(|err| from_error(&err))?;
            self.with_catalog(|catalog| catalog.delete_book(book_id))?;
            Ok(ApiResponse::ok(&json!({ "success": true })))
        })
    }

    pub fn list_members(&self) -> ApiResponse {
        respond("list_members", || {
            let members = self.with_members(|members| members.list_members())?;
            Ok(ApiResponse::ok(&members))
        })
    }

    pub fn get_member(&self, member_id: &str) -> ApiResponse {
        respond("get_member", || {
            let member_id = parse_id("memberId", member_id).map_err(|err| from_error(&err))?;
            match self.with_members(|members| members.get_member(member_id))? {
                Some(member) => Ok(ApiResponse::ok(&member)),
                None => Err(ApiResponse::failure(ErrorKind::NotFound, "Member not found")),
            }
        })
    }

    /// `POST /members` → 201 with the stored member.
    pub fn add_member(&self, input: NewMember) -> ApiResponse {
        respond("add_member", || {
            let member = self.with_members(|members| members.create_member(input))?;
            Ok(ApiResponse::created(&member))
        })
    }

    /// `GET /dashboard/stats` → catalog, member and loan counters.
    pub fn dashboard(&self) -> ApiResponse {
        respond("dashboard", || {
            let now = now_epoch_ms();
            let stats = self.with_circulation(|service| service.dashboard_stats(now))?;
            Ok(ApiResponse::ok(&stats))
        })
    }

    /// `GET /health` → liveness check; never touches the store.
    pub fn health(&self) -> ApiResponse {
        ApiResponse::ok(&json!({
            "status": "running",
            "timestamp": now_epoch_ms(),
            "version": core_version(),
        }))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ApiResponse> {
        self.store.connection().map_err(|err| from_error(&err))
    }

    /// Runs `unit` against a buffering publisher and forwards the collected
    /// events only after `unit`, and with it the store lock, has finished.
    fn publish_after<T>(&self, unit: impl FnOnce(Arc<dyn EventPublisher>) -> T) -> T {
        let pending = Arc::new(EventBuffer::new());
        let outcome = unit(Arc::clone(&pending) as Arc<dyn EventPublisher>);
        pending.flush_into(self.events.as_ref());
        outcome
    }

    fn with_catalog<T>(
        &self,
        f: impl FnOnce(&CatalogService<SqliteBookRepository<'_>>) -> Result<T, CatalogError>,
    ) -> Result<T, ApiResponse> {
        self.publish_after(|events| -> Result<T, ApiResponse> {
            let conn = self.lock()?;
            let service = CatalogService::new(SqliteBookRepository::new(&conn), events);
            f(&service).map_err(|err| from_error(&err))
        })
    }

    fn with_members<T>(
        &self,
        f: impl FnOnce(&MemberService<SqliteMemberRepository<'_>>) -> Result<T, MemberError>,
    ) -> Result<T, ApiResponse> {
        self.publish_after(|events| -> Result<T, ApiResponse> {
            let conn = self.lock()?;
            let service = MemberService::new(SqliteMemberRepository::new(&conn), events);
            f(&service).map_err(|err| from_error(&err))
        })
    }

    fn with_circulation<T>(
        &self,
        f: impl FnOnce(&mut CirculationService<SqliteLoanRepository<'_>>) -> Result<T, CirculationError>,
    ) -> Result<T, ApiResponse> {
        self.publish_after(|events| -> Result<T, ApiResponse> {
            let mut conn = self.lock()?;
            let mut service = CirculationService::new(SqliteLoanRepository::new(&mut conn), events)
                .with_loan_period_days(self.loan_period_days);
            f(&mut service).map_err(|err| from_error(&err))
        })
    }
}

fn respond(operation: &'static str, handler: impl FnOnce() -> Handled) -> ApiResponse {
    let response = match handler() {
        Ok(response) | Err(response) => response,
    };
    let kind = response.error_kind().unwrap_or("none");
    if response.status >= 500 {
        error!(
            "event=api_request module=api status=error op={operation} code={} kind={kind}",
            response.status
        );
    } else if response.status >= 400 {
        warn!(
            "event=api_request module=api status=rejected op={operation} code={} kind={kind}",
            response.status
        );
    } else {
        debug!(
            "event=api_request module=api status=ok op={operation} code={}",
            response.status
        );
    }
    response
}

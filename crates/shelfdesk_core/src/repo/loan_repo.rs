//! Loan repository: the transactional half of circulation.
//!
//! # Responsibility
//! - Apply borrow and return as single `IMMEDIATE` transactions spanning
//!   `books`, `loans` and `notifications`.
//! - Serve enriched loan reads joined with book and member display fields.
//!
//! # Invariants
//! - `books.available_copies == total_copies - open loans` before and after
//!   every committed transaction.
//! - Preconditions are checked inside the transaction before the first write;
//!   a failed precondition rolls back with nothing applied.
//! - `borrowed -> returned` is a guarded update and can happen only once.

use crate::model::book::{Book, BookId};
use crate::model::loan::{
    AvailabilityDrift, CirculationStats, EnrichedLoan, Loan, LoanId, LoanStatus,
};
use crate::model::member::MemberId;
use crate::model::notification::Notification;
use crate::model::{EpochMs, UNKNOWN_REFERENCE};
use crate::repo::book_repo::load_book;
use crate::repo::member_repo::load_member;
use crate::repo::notification_repo::insert_notification;
use crate::repo::{parse_count, parse_uuid, RepoError, RepoResult};
use log::warn;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};

const ENRICHED_LOAN_SELECT_SQL: &str = "SELECT
    l.id AS id,
    l.book_id AS book_id,
    l.member_id AS member_id,
    l.borrow_date AS borrow_date,
    l.due_date AS due_date,
    l.status AS status,
    l.return_date AS return_date,
    COALESCE(b.title, ?1) AS title,
    COALESCE(b.author, ?1) AS author,
    COALESCE(m.name, ?1) AS member_name,
    COALESCE(m.email, '') AS member_email
FROM loans l
LEFT JOIN books b ON b.id = l.book_id
LEFT JOIN members m ON m.id = l.member_id";

/// Committed borrow with the display data resolved inside the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowedLoan {
    pub loan: Loan,
    /// Book as stored after the decrement.
    pub book: Book,
    pub member_name: String,
    pub notification: Notification,
}

/// Outcome of a borrow attempt. Every non-`Borrowed` variant rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowOutcome {
    Borrowed(BorrowedLoan),
    BookNotFound(BookId),
    MemberNotFound(MemberId),
    NoCopiesAvailable(BookId),
}

/// Committed return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedLoan {
    pub loan: Loan,
    /// `false` when the book was deleted after the loan was opened.
    pub book_restocked: bool,
    pub notification: Notification,
}

/// Outcome of a return attempt. Every non-`Returned` variant rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    Returned(ReturnedLoan),
    LoanNotFound(LoanId),
    AlreadyReturned { loan_id: LoanId, returned_at: EpochMs },
}

/// Repository interface for loans and circulation reads.
pub trait LoanRepository {
    /// Decrements availability, records `loan` and its borrow notice atomically.
    fn borrow_copy(&mut self, loan: &Loan) -> RepoResult<BorrowOutcome>;
    /// Closes the loan, restocks its book and records the return notice atomically.
    fn return_loan(&mut self, loan_id: LoanId, returned_at: EpochMs) -> RepoResult<ReturnOutcome>;
    fn get_loan(&self, loan_id: LoanId) -> RepoResult<Option<Loan>>;
    /// Open loans, soonest due first.
    fn list_active_loans(&self) -> RepoResult<Vec<EnrichedLoan>>;
    /// Every loan of one member in insertion order.
    fn list_member_loans(&self, member_id: MemberId) -> RepoResult<Vec<EnrichedLoan>>;
    fn circulation_stats(&self, now: EpochMs) -> RepoResult<CirculationStats>;
    /// Books whose stored availability disagrees with their open loans.
    fn availability_drift(&self) -> RepoResult<Vec<AvailabilityDrift>>;
}

/// SQLite-backed loan repository.
pub struct SqliteLoanRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteLoanRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl LoanRepository for SqliteLoanRepository<'_> {
    fn borrow_copy(&mut self, loan: &Loan) -> RepoResult<BorrowOutcome> {
        loan.validate()?;
        if !loan.is_open() {
            return Err(RepoError::InvalidData(format!(
                "loan {} must be open to be borrowed",
                loan.id
            )));
        }

        // IMMEDIATE takes the write lock up front, so the availability check
        // below cannot interleave with another borrow or return.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(book) = load_book(&tx, loan.book_id)? else {
            return Ok(BorrowOutcome::BookNotFound(loan.book_id));
        };
        let Some(member) = load_member(&tx, loan.member_id)? else {
            return Ok(BorrowOutcome::MemberNotFound(loan.member_id));
        };

        let decremented = tx.execute(
            "UPDATE books
             SET available_copies = available_copies - 1
             WHERE id = ?1
               AND available_copies > 0;",
            [loan.book_id.to_string()],
        )?;
        if decremented == 0 {
            return Ok(BorrowOutcome::NoCopiesAvailable(loan.book_id));
        }

        tx.execute(
            "INSERT INTO loans (
                id,
                book_id,
                member_id,
                borrow_date,
                due_date,
                status,
                return_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL);",
            params![
                loan.id.to_string(),
                loan.book_id.to_string(),
                loan.member_id.to_string(),
                loan.borrow_date,
                loan.due_date,
                LoanStatus::Borrowed.as_str(),
            ],
        )?;

        let notification = Notification::borrow_notice(member.id, &book, loan.borrow_date)?;
        insert_notification(&tx, &notification)?;

        let book = load_book(&tx, loan.book_id)?.ok_or(RepoError::NotFound(loan.book_id))?;
        tx.commit()?;

        Ok(BorrowOutcome::Borrowed(BorrowedLoan {
            loan: loan.clone(),
            book,
            member_name: member.name,
            notification,
        }))
    }

    fn return_loan(&mut self, loan_id: LoanId, returned_at: EpochMs) -> RepoResult<ReturnOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut loan) = load_loan(&tx, loan_id)? else {
            return Ok(ReturnOutcome::LoanNotFound(loan_id));
        };
        if let Some(returned_at) = loan.return_date {
            return Ok(ReturnOutcome::AlreadyReturned {
                loan_id,
                returned_at,
            });
        }

        let closed = tx.execute(
            "UPDATE loans
             SET status = 'returned', return_date = ?2
             WHERE id = ?1
               AND status = 'borrowed';",
            params![loan_id.to_string(), returned_at],
        )?;
        if closed == 0 {
            return Err(RepoError::InvalidData(format!(
                "loan {loan_id} changed state during return"
            )));
        }
        loan.status = LoanStatus::Returned;
        loan.return_date = Some(returned_at);

        let restocked = tx.execute(
            "UPDATE books
             SET available_copies = available_copies + 1
             WHERE id = ?1
               AND available_copies < total_copies;",
            [loan.book_id.to_string()],
        )?;
        let book_restocked = if restocked == 1 {
            true
        } else if load_book(&tx, loan.book_id)?.is_some() {
            // Book exists but is already fully stocked: the count drifted.
            return Err(RepoError::InvalidData(format!(
                "book {} is fully stocked while loan {loan_id} is open",
                loan.book_id
            )));
        } else {
            warn!(
                "event=return_orphan module=circulation status=inconsistent loan_id={} book_id={}",
                loan_id, loan.book_id
            );
            false
        };

        let notification = Notification::return_notice(loan.member_id, returned_at)?;
        insert_notification(&tx, &notification)?;
        tx.commit()?;

        Ok(ReturnOutcome::Returned(ReturnedLoan {
            loan,
            book_restocked,
            notification,
        }))
    }

    fn get_loan(&self, loan_id: LoanId) -> RepoResult<Option<Loan>> {
        load_loan(self.conn, loan_id)
    }

    fn list_active_loans(&self) -> RepoResult<Vec<EnrichedLoan>> {
        query_enriched(
            self.conn,
            &format!(
                "{ENRICHED_LOAN_SELECT_SQL}
                 WHERE l.status = 'borrowed'
                 ORDER BY l.due_date ASC, l.seq ASC;"
            ),
            Vec::new(),
        )
    }

    fn list_member_loans(&self, member_id: MemberId) -> RepoResult<Vec<EnrichedLoan>> {
        query_enriched(
            self.conn,
            &format!(
                "{ENRICHED_LOAN_SELECT_SQL}
                 WHERE l.member_id = ?2
                 ORDER BY l.seq ASC;"
            ),
            vec![Value::Text(member_id.to_string())],
        )
    }

    fn circulation_stats(&self, now: EpochMs) -> RepoResult<CirculationStats> {
        let (total_books, total_members, active_loans, overdue_loans): (i64, i64, i64, i64) =
            self.conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM books),
                    (SELECT COUNT(*) FROM members),
                    (SELECT COUNT(*) FROM loans WHERE status = 'borrowed'),
                    (SELECT COUNT(*) FROM loans WHERE status = 'borrowed' AND due_date < ?1);",
                [now],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(CirculationStats {
            total_books: parse_count(total_books, "books.count")?,
            total_members: parse_count(total_members, "members.count")?,
            active_loans: parse_count(active_loans, "loans.count")?,
            overdue_loans: parse_count(overdue_loans, "loans.count")?,
        })
    }

    fn availability_drift(&self) -> RepoResult<Vec<AvailabilityDrift>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, total_copies, available_copies, open_loans
             FROM (
                SELECT
                    b.seq,
                    b.id,
                    b.total_copies,
                    b.available_copies,
                    (SELECT COUNT(*)
                     FROM loans l
                     WHERE l.book_id = b.id AND l.status = 'borrowed') AS open_loans
                FROM books b
             )
             WHERE available_copies != total_copies - open_loans
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut drift = Vec::new();
        while let Some(row) = rows.next()? {
            drift.push(AvailabilityDrift {
                book_id: parse_uuid(&row.get::<_, String>("id")?, "books.id")?,
                total_copies: parse_count(row.get("total_copies")?, "books.total_copies")?,
                available_copies: parse_count(
                    row.get("available_copies")?,
                    "books.available_copies",
                )?,
                open_loans: parse_count(row.get("open_loans")?, "loans.count")?,
            });
        }
        Ok(drift)
    }
}

fn load_loan(conn: &Connection, loan_id: LoanId) -> RepoResult<Option<Loan>> {
    let mut stmt = conn.prepare(
        "SELECT id, book_id, member_id, borrow_date, due_date, status, return_date
         FROM loans
         WHERE id = ?1;",
    )?;
    let mut rows = stmt.query([loan_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_loan_row(row)?));
    }
    Ok(None)
}

fn query_enriched(
    conn: &Connection,
    sql: &str,
    extra_binds: Vec<Value>,
) -> RepoResult<Vec<EnrichedLoan>> {
    let mut bind_values = vec![Value::Text(UNKNOWN_REFERENCE.to_string())];
    bind_values.extend(extra_binds);

    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut loans = Vec::new();
    while let Some(row) = rows.next()? {
        loans.push(EnrichedLoan {
            loan: parse_loan_row(row)?,
            title: row.get("title")?,
            author: row.get("author")?,
            member_name: row.get("member_name")?,
            member_email: row.get("member_email")?,
        });
    }
    Ok(loans)
}

fn parse_loan_row(row: &Row<'_>) -> RepoResult<Loan> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("status")?;
    let status = LoanStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid loan status `{status_text}` in loans.status"))
    })?;

    let loan = Loan {
        id: parse_uuid(&id_text, "loans.id")?,
        book_id: parse_uuid(&row.get::<_, String>("book_id")?, "loans.book_id")?,
        member_id: parse_uuid(&row.get::<_, String>("member_id")?, "loans.member_id")?,
        borrow_date: row.get("borrow_date")?,
        due_date: row.get("due_date")?,
        status,
        return_date: row.get("return_date")?,
    };
    loan.validate()
        .map_err(|err| RepoError::InvalidData(format!("loan {id_text}: {err}")))?;
    Ok(loan)
}

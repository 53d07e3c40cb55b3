use shelfdesk_core::{
    BookId, CatalogService, CirculationService, ErrorKind, LoanId, MemberId, MemberService,
    NewBook, NewMember, NoopPublisher, RecordStore, SqliteBookRepository, SqliteLoanRepository,
    SqliteMemberRepository,
};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

fn seed(store: &RecordStore, total_copies: u32, borrowers: usize) -> (BookId, Vec<MemberId>) {
    let conn = store.connection().unwrap();
    let book = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher))
        .create_book(NewBook {
            title: "The Last Copy".to_string(),
            author: "A. Librarian".to_string(),
            total_copies: Some(total_copies),
            ..NewBook::default()
        })
        .unwrap();
    let members = MemberService::new(SqliteMemberRepository::new(&conn), Arc::new(NoopPublisher));
    let member_ids = (0..borrowers)
        .map(|index| {
            members
                .create_member(NewMember {
                    name: format!("Reader {index}"),
                    ..NewMember::default()
                })
                .unwrap()
                .id
        })
        .collect();
    (book.id, member_ids)
}

fn borrow(store: &RecordStore, book_id: BookId, member_id: MemberId) -> Result<LoanId, ErrorKind> {
    let mut conn = store.connection().unwrap();
    let mut circulation =
        CirculationService::new(SqliteLoanRepository::new(&mut conn), Arc::new(NoopPublisher));
    circulation
        .borrow(book_id, member_id)
        .map(|receipt| receipt.loan_id)
        .map_err(|err| err.kind())
}

fn return_loan(store: &RecordStore, loan_id: LoanId) -> Result<(), ErrorKind> {
    let mut conn = store.connection().unwrap();
    let mut circulation =
        CirculationService::new(SqliteLoanRepository::new(&mut conn), Arc::new(NoopPublisher));
    circulation
        .return_loan(loan_id)
        .map(|_| ())
        .map_err(|err| err.kind())
}

fn available_and_drift(path: &Path, book_id: BookId) -> (u32, usize) {
    let store = RecordStore::open(path).unwrap();
    let available = {
        let conn = store.connection().unwrap();
        CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher))
            .get_book(book_id)
            .unwrap()
            .unwrap()
            .available_copies
    };
    let drift = {
        let mut conn = store.connection().unwrap();
        CirculationService::new(SqliteLoanRepository::new(&mut conn), Arc::new(NoopPublisher))
            .audit_availability()
            .unwrap()
            .len()
    };
    store.close().unwrap();
    (available, drift)
}

#[test]
fn concurrent_borrows_of_last_copy_from_separate_stores_yield_one_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("library.db");
    let (book_id, member_ids) = {
        let store = RecordStore::open(&path).unwrap();
        let seeded = seed(&store, 1, 8);
        store.close().unwrap();
        seeded
    };

    let barrier = Arc::new(Barrier::new(member_ids.len()));
    let handles: Vec<_> = member_ids
        .into_iter()
        .map(|member_id| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = RecordStore::open(&path).unwrap();
                barrier.wait();
                borrow(&store, book_id, member_id)
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1, "results: {results:?}");
    assert!(results
        .iter()
        .filter_map(|result| result.err())
        .all(|kind| kind == ErrorKind::BookUnavailable));
    assert_eq!(available_and_drift(&path, book_id), (0, 0));
}

#[test]
fn shared_store_never_lends_more_copies_than_exist() {
    let store = Arc::new(RecordStore::open_in_memory().unwrap());
    let (book_id, member_ids) = seed(&store, 3, 10);

    let barrier = Arc::new(Barrier::new(member_ids.len()));
    let handles: Vec<_> = member_ids
        .into_iter()
        .map(|member_id| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                borrow(&store, book_id, member_id)
            })
        })
        .collect();
    let loans: Vec<LoanId> = handles
        .into_iter()
        .filter_map(|handle| handle.join().unwrap().ok())
        .collect();
    assert_eq!(loans.len(), 3);

    let mut conn = store.connection().unwrap();
    let circulation =
        CirculationService::new(SqliteLoanRepository::new(&mut conn), Arc::new(NoopPublisher));
    assert_eq!(circulation.active_loans().unwrap().len(), 3);
    assert!(circulation.audit_availability().unwrap().is_empty());
}

#[test]
fn concurrent_returns_of_same_loan_restock_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("returns.db");
    let (book_id, loan_id) = {
        let store = RecordStore::open(&path).unwrap();
        let (book_id, member_ids) = seed(&store, 2, 1);
        let loan_id = borrow(&store, book_id, member_ids[0]).unwrap();
        store.close().unwrap();
        (book_id, loan_id)
    };

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = RecordStore::open(&path).unwrap();
                barrier.wait();
                return_loan(&store, loan_id)
            })
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.err())
        .all(|kind| kind == ErrorKind::AlreadyReturned));
    assert_eq!(available_and_drift(&path, book_id), (2, 0));
}

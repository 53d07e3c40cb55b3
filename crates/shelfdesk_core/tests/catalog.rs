use shelfdesk_core::{
    Book, BookPatch, CatalogError, CatalogService, ChannelPublisher, CirculationService,
    ErrorKind, MemberService, NewBook, NewMember, NoopPublisher, RecordStore,
    SqliteBookRepository, SqliteLoanRepository, SqliteMemberRepository, ValidationError,
};
use std::sync::Arc;
use uuid::Uuid;

fn new_book(title: &str, author: &str, category: &str, total_copies: u32) -> NewBook {
    NewBook {
        title: title.to_string(),
        author: author.to_string(),
        category: Some(category.to_string()),
        total_copies: Some(total_copies),
        ..NewBook::default()
    }
}

fn seed_catalog(store: &RecordStore) -> Vec<Book> {
    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));
    [
        new_book("Dune", "Frank Herbert", "Science Fiction", 2),
        new_book("Emma", "Jane Austen", "Classic", 1),
        new_book("Foundation", "Isaac Asimov", "Science Fiction", 3),
        new_book("Persuasion", "Jane Austen", "Classic", 1),
    ]
    .into_iter()
    .map(|input| catalog.create_book(input).unwrap())
    .collect()
}

fn lend(store: &RecordStore, book: &Book) -> Uuid {
    let member = {
        let conn = store.connection().unwrap();
        MemberService::new(SqliteMemberRepository::new(&conn), Arc::new(NoopPublisher))
            .create_member(NewMember {
                name: "Borrower".to_string(),
                ..NewMember::default()
            })
            .unwrap()
    };
    let mut conn = store.connection().unwrap();
    let mut circulation =
        CirculationService::new(SqliteLoanRepository::new(&mut conn), Arc::new(NoopPublisher));
    circulation.borrow(book.id, member.id).unwrap().loan_id
}

#[test]
fn list_books_returns_store_order() {
    let store = RecordStore::open_in_memory().unwrap();
    let seeded = seed_catalog(&store);

    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));
    let listed = catalog.list_books().unwrap();
    assert_eq!(listed, seeded);
}

#[test]
fn search_is_case_insensitive_over_title_author_and_category() {
    let store = RecordStore::open_in_memory().unwrap();
    seed_catalog(&store);
    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));

    let titles = |query: &str| -> Vec<String> {
        catalog
            .search_books(query)
            .unwrap()
            .into_iter()
            .map(|book| book.title)
            .collect()
    };

    assert_eq!(titles("AUSTEN"), vec!["Emma", "Persuasion"]);
    assert_eq!(titles("fiction"), vec!["Dune", "Foundation"]);
    assert_eq!(titles("dun"), vec!["Dune"]);
    assert!(titles("tolstoy").is_empty());
}

#[test]
fn category_filter_is_exact() {
    let store = RecordStore::open_in_memory().unwrap();
    seed_catalog(&store);
    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));

    assert_eq!(catalog.list_by_category("Classic").unwrap().len(), 2);
    assert!(catalog.list_by_category("classic").unwrap().is_empty());
    assert!(catalog.list_by_category("Science").unwrap().is_empty());
}

#[test]
fn create_rejects_blank_title_and_zero_copies() {
    let store = RecordStore::open_in_memory().unwrap();
    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));

    let err = catalog
        .create_book(new_book("  ", "Someone", "Misc", 1))
        .unwrap_err();
    assert!(matches!(err, CatalogError::Validation(ValidationError::BlankField("title"))));
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = catalog
        .create_book(new_book("Title", "Someone", "Misc", 0))
        .unwrap_err();
    assert!(matches!(err, CatalogError::Validation(ValidationError::ZeroCopies)));
    assert!(catalog.list_books().unwrap().is_empty());
}

#[test]
fn update_merges_fields_and_shifts_availability_by_delta() {
    let store = RecordStore::open_in_memory().unwrap();
    let books = seed_catalog(&store);
    let foundation = &books[2];
    lend(&store, foundation);

    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));
    let updated = catalog
        .update_book(
            foundation.id,
            &BookPatch {
                description: Some("Psychohistory".to_string()),
                total_copies: Some(5),
                ..BookPatch::default()
            },
        )
        .unwrap();

    assert_eq!(updated.title, "Foundation");
    assert_eq!(updated.description.as_deref(), Some("Psychohistory"));
    assert_eq!((updated.total_copies, updated.available_copies), (5, 4));
    assert_eq!(catalog.get_book(foundation.id).unwrap().unwrap(), updated);
}

#[test]
fn update_cannot_shrink_below_open_loans() {
    let store = RecordStore::open_in_memory().unwrap();
    let books = seed_catalog(&store);
    let dune = &books[0];
    lend(&store, dune);
    lend(&store, dune);

    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));
    let err = catalog
        .update_book(
            dune.id,
            &BookPatch {
                title: Some("Dune (revised)".to_string()),
                total_copies: Some(1),
                ..BookPatch::default()
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        CatalogError::Validation(ValidationError::CopiesBelowOpenLoans { total: 1, open_loans: 2 })
    ));
    let stored = catalog.get_book(dune.id).unwrap().unwrap();
    assert_eq!(stored.title, "Dune");
    assert_eq!((stored.total_copies, stored.available_copies), (2, 0));
}

#[test]
fn update_and_delete_of_missing_book_are_not_found() {
    let store = RecordStore::open_in_memory().unwrap();
    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));
    let missing = Uuid::new_v4();

    let err = catalog
        .update_book(missing, &BookPatch::default())
        .unwrap_err();
    assert!(matches!(err, CatalogError::BookNotFound(id) if id == missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = catalog.delete_book(missing).unwrap_err();
    assert!(matches!(err, CatalogError::BookNotFound(id) if id == missing));
}

#[test]
fn delete_is_blocked_while_copies_are_on_loan() {
    let store = RecordStore::open_in_memory().unwrap();
    let books = seed_catalog(&store);
    let emma = &books[1];
    let loan_id = lend(&store, emma);

    {
        let conn = store.connection().unwrap();
        let catalog =
            CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));
        let err = catalog.delete_book(emma.id).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::HasOpenLoans { book_id, open_loans: 1 } if book_id == emma.id
        ));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(catalog.get_book(emma.id).unwrap().is_some());
    }

    {
        let mut conn = store.connection().unwrap();
        let mut circulation = CirculationService::new(
            SqliteLoanRepository::new(&mut conn),
            Arc::new(NoopPublisher),
        );
        circulation.return_loan(loan_id).unwrap();
    }

    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), Arc::new(NoopPublisher));
    catalog.delete_book(emma.id).unwrap();
    assert!(catalog.get_book(emma.id).unwrap().is_none());
}

#[test]
fn catalog_mutations_publish_events() {
    let store = RecordStore::open_in_memory().unwrap();
    let events = Arc::new(ChannelPublisher::new());
    let mut inbox = events.subscribe();
    let conn = store.connection().unwrap();
    let catalog = CatalogService::new(SqliteBookRepository::new(&conn), events.clone());

    let book = catalog
        .create_book(new_book("Middlemarch", "George Eliot", "Classic", 1))
        .unwrap();
    catalog
        .update_book(
            book.id,
            &BookPatch {
                publish_year: Some(1871),
                ..BookPatch::default()
            },
        )
        .unwrap();
    catalog.delete_book(book.id).unwrap();

    let names: Vec<&str> = inbox.drain().iter().map(|event| event.name()).collect();
    assert_eq!(names, vec!["book_added", "book_updated", "book_deleted"]);

    assert!(catalog.delete_book(book.id).is_err());
    assert!(inbox.try_recv().is_none());
}

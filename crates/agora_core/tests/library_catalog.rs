use agora_core::model::library::{BookFilter, BookInput, BookOrdering, BookPatch};
use agora_core::model::user::{NewUser, User};
use agora_core::{
    open_db_in_memory, LibraryRepository, LibraryService, PageRequest, ServiceError,
    SqliteLibraryRepository, SqliteUserRepository, UserRepository,
};
use rusqlite::Connection;

fn create_user(conn: &mut Connection, username: &str, is_staff: bool) -> User {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    repo.create_user(&NewUser {
        username: username.to_string(),
        email: String::new(),
        password_hash: "unused".to_string(),
        bio: String::new(),
        is_staff,
    })
    .unwrap()
}

fn book(title: &str, year: i32, author_id: i64) -> BookInput {
    BookInput {
        title: title.to_string(),
        publication_year: year,
        isbn: String::new(),
        author_id,
    }
}

#[test]
fn catalog_writes_require_staff() {
    let mut conn = open_db_in_memory().unwrap();
    let reader = create_user(&mut conn, "reader", false);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());

    assert!(matches!(
        service.create_author(&reader, "Ursula K. Le Guin"),
        Err(ServiceError::PermissionDenied(_))
    ));
    assert!(matches!(
        service.create_library(&reader, "Central"),
        Err(ServiceError::PermissionDenied(_))
    ));
    assert!(service.list_authors().unwrap().is_empty());
}

#[test]
fn book_title_is_unique_per_author() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());
    let orwell = service.create_author(&staff, "George Orwell").unwrap();
    let huxley = service.create_author(&staff, "Aldous Huxley").unwrap();

    service.create_book(&staff, book("1984", 1949, orwell.id)).unwrap();
    assert!(matches!(
        service.create_book(&staff, book("1984", 1950, orwell.id)),
        Err(ServiceError::Conflict(_))
    ));
    service.create_book(&staff, book("1984", 1990, huxley.id)).unwrap();
}

#[test]
fn publication_year_cannot_be_in_the_future() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let repo = SqliteLibraryRepository::try_new(&conn).unwrap();
    let this_year = repo.current_year().unwrap();
    let service = LibraryService::new(repo);
    let author = service.create_author(&staff, "Future Writer").unwrap();

    match service.create_book(&staff, book("Tomorrow", this_year + 1, author.id)) {
        Err(ServiceError::Validation(err)) => assert_eq!(err.field, "publication_year"),
        other => panic!("unexpected result: {other:?}"),
    }
    service.create_book(&staff, book("Today", this_year, author.id)).unwrap();
}

#[test]
fn unknown_author_and_bad_isbn_are_validation_errors() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());

    match service.create_book(&staff, book("Ghost", 2000, 999)) {
        Err(ServiceError::Validation(err)) => assert_eq!(err.field, "author_id"),
        other => panic!("unexpected result: {other:?}"),
    }

    let author = service.create_author(&staff, "Someone").unwrap();
    let mut bad_isbn = book("Numbers", 2001, author.id);
    bad_isbn.isbn = "12-34".to_string();
    match service.create_book(&staff, bad_isbn) {
        Err(ServiceError::Validation(err)) => assert_eq!(err.field, "isbn"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn deleting_an_author_cascades_to_books_and_holdings() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());
    let author = service.create_author(&staff, "George Orwell").unwrap();
    let animal_farm = service
        .create_book(&staff, book("Animal Farm", 1945, author.id))
        .unwrap();
    let library = service.create_library(&staff, "Central").unwrap();
    service.add_book(&staff, library.id, animal_farm.id).unwrap();

    service.delete_author(&staff, author.id).unwrap();

    assert!(matches!(
        service.get_book(animal_farm.id),
        Err(ServiceError::NotFound { entity: "book", .. })
    ));
    assert!(service.get_library(library.id).unwrap().books.is_empty());
}

#[test]
fn book_listing_filters_and_orders() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());
    let orwell = service.create_author(&staff, "George Orwell").unwrap();
    let huxley = service.create_author(&staff, "Aldous Huxley").unwrap();
    service.create_book(&staff, book("Nineteen Eighty-Four", 1949, orwell.id)).unwrap();
    service.create_book(&staff, book("Animal Farm", 1945, orwell.id)).unwrap();
    service.create_book(&staff, book("Brave New World", 1932, huxley.id)).unwrap();

    let page = PageRequest::default();
    let all = service.list_books(&BookFilter::default(), &page).unwrap();
    let titles = all.results.iter().map(|b| b.title.as_str()).collect::<Vec<_>>();
    assert_eq!(titles, vec!["Animal Farm", "Brave New World", "Nineteen Eighty-Four"]);

    let newest_first = service
        .list_books(
            &BookFilter {
                ordering: BookOrdering::YearDesc,
                ..BookFilter::default()
            },
            &page,
        )
        .unwrap();
    assert_eq!(newest_first.results[0].title, "Nineteen Eighty-Four");

    let by_author_name = service
        .list_books(
            &BookFilter {
                search: Some("orwell".to_string()),
                ..BookFilter::default()
            },
            &page,
        )
        .unwrap();
    assert_eq!(by_author_name.count, 2);

    let year_window = service
        .list_books(
            &BookFilter {
                min_year: Some(1940),
                max_year: Some(1946),
                ..BookFilter::default()
            },
            &page,
        )
        .unwrap();
    assert_eq!(year_window.count, 1);
    assert_eq!(year_window.results[0].title, "Animal Farm");

    let by_title = service
        .list_books(
            &BookFilter {
                title: Some("new".to_string()),
                author_id: Some(huxley.id),
                ..BookFilter::default()
            },
            &page,
        )
        .unwrap();
    assert_eq!(by_title.count, 1);
}

#[test]
fn author_detail_and_books_by_author_name() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());
    let orwell = service.create_author(&staff, "George Orwell").unwrap();
    service.create_book(&staff, book("Nineteen Eighty-Four", 1949, orwell.id)).unwrap();
    service.create_book(&staff, book("Animal Farm", 1945, orwell.id)).unwrap();

    let detail = service.get_author(orwell.id).unwrap();
    assert_eq!(detail.books.len(), 2);
    assert_eq!(detail.books[0].title, "Animal Farm");

    assert_eq!(service.books_by_author("george orwell").unwrap().len(), 2);
    assert!(service.books_by_author("Nobody").unwrap().is_empty());
}

#[test]
fn book_patch_keeps_unspecified_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());
    let author = service.create_author(&staff, "George Orwell").unwrap();
    let created = service.create_book(&staff, book("1984", 1948, author.id)).unwrap();

    let updated = service
        .update_book(
            &staff,
            created.id,
            BookPatch {
                publication_year: Some(1949),
                ..BookPatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.title, "1984");
    assert_eq!(updated.publication_year, 1949);
}

#[test]
fn libraries_hold_books_and_one_librarian() {
    let mut conn = open_db_in_memory().unwrap();
    let staff = create_user(&mut conn, "staff", true);
    let service = LibraryService::new(SqliteLibraryRepository::try_new(&conn).unwrap());
    let author = service.create_author(&staff, "Octavia Butler").unwrap();
    let kindred = service.create_book(&staff, book("Kindred", 1979, author.id)).unwrap();
    let library = service.create_library(&staff, "Central").unwrap();
    assert!(matches!(
        service.create_library(&staff, "central"),
        Err(ServiceError::Conflict(_))
    ));

    service.add_book(&staff, library.id, kindred.id).unwrap();
    let detail = service.add_book(&staff, library.id, kindred.id).unwrap();
    assert_eq!(detail.books.len(), 1);
    assert!(detail.librarian.is_none());

    let first = service.assign_librarian(&staff, library.id, "Ada").unwrap();
    let second = service.assign_librarian(&staff, library.id, "Grace").unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(
        service.get_library(library.id).unwrap().librarian.unwrap().name,
        "Grace"
    );

    let detail = service.remove_book(&staff, library.id, kindred.id).unwrap();
    assert!(detail.books.is_empty());
    assert!(matches!(
        service.remove_book(&staff, library.id, kindred.id),
        Err(ServiceError::NotFound { .. })
    ));
}

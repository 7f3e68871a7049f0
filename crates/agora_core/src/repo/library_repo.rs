//! Library catalog repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Deleting an author deletes their books (FK cascade).
//! - `(title, author_id)` conflicts surface as `RepoError::Conflict`.
//! - A library keeps at most one librarian; assigning replaces it.

use super::{
    count_to_u64, ensure_tables, is_foreign_key_violation, like_pattern, map_unique_violation,
    RepoError, RepoResult,
};
use crate::model::ValidationError;
use crate::model::library::{
    Author, AuthorId, Book, BookFilter, BookId, BookInput, Librarian, Library, LibraryId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const BOOK_SELECT_SQL: &str = "SELECT
    books.id AS id,
    books.title AS title,
    books.publication_year AS publication_year,
    books.isbn AS isbn,
    books.author_id AS author_id
FROM books
INNER JOIN authors ON authors.id = books.author_id";

const BOOK_CONFLICT_MESSAGE: &str = "a book with this title already exists for this author";

/// Repository interface for catalog operations.
pub trait LibraryRepository {
    fn create_author(&self, name: &str) -> RepoResult<Author>;
    fn get_author(&self, id: AuthorId) -> RepoResult<Option<Author>>;
    fn find_author_by_name(&self, name: &str) -> RepoResult<Option<Author>>;
    /// Lists authors ordered by name.
    fn list_authors(&self) -> RepoResult<Vec<Author>>;
    fn update_author(&self, id: AuthorId, name: &str) -> RepoResult<Author>;
    fn delete_author(&self, id: AuthorId) -> RepoResult<()>;

    fn create_book(&self, input: &BookInput) -> RepoResult<Book>;
    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>>;
    fn list_books(&self, filter: &BookFilter, limit: i64, offset: i64) -> RepoResult<Vec<Book>>;
    fn count_books(&self, filter: &BookFilter) -> RepoResult<u64>;
    fn books_by_author(&self, author_id: AuthorId) -> RepoResult<Vec<Book>>;
    fn update_book(&self, id: BookId, input: &BookInput) -> RepoResult<Book>;
    fn delete_book(&self, id: BookId) -> RepoResult<()>;

    fn create_library(&self, name: &str) -> RepoResult<Library>;
    fn get_library(&self, id: LibraryId) -> RepoResult<Option<Library>>;
    fn list_libraries(&self) -> RepoResult<Vec<Library>>;
    fn library_books(&self, id: LibraryId) -> RepoResult<Vec<Book>>;
    /// Returns `false` when the book was already held.
    fn add_book_to_library(&self, library_id: LibraryId, book_id: BookId) -> RepoResult<bool>;
    fn remove_book_from_library(&self, library_id: LibraryId, book_id: BookId)
        -> RepoResult<bool>;
    fn assign_librarian(&self, library_id: LibraryId, name: &str) -> RepoResult<Librarian>;
    fn librarian_for(&self, library_id: LibraryId) -> RepoResult<Option<Librarian>>;

    /// Current UTC calendar year according to SQLite's clock.
    fn current_year(&self) -> RepoResult<i32>;
}

/// SQLite-backed catalog repository.
pub struct SqliteLibraryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLibraryRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(
            conn,
            &["authors", "books", "libraries", "library_books", "librarians"],
        )?;
        Ok(Self { conn })
    }
}

impl LibraryRepository for SqliteLibraryRepository<'_> {
    fn create_author(&self, name: &str) -> RepoResult<Author> {
        self.conn
            .execute("INSERT INTO authors (name) VALUES (?1);", [name])?;
        Ok(Author {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn get_author(&self, id: AuthorId) -> RepoResult<Option<Author>> {
        let author = self
            .conn
            .query_row(
                "SELECT id, name FROM authors WHERE id = ?1;",
                [id],
                parse_author_row,
            )
            .optional()?;
        Ok(author)
    }

    fn find_author_by_name(&self, name: &str) -> RepoResult<Option<Author>> {
        let author = self
            .conn
            .query_row(
                "SELECT id, name
                 FROM authors
                 WHERE name = ?1 COLLATE NOCASE
                 ORDER BY id ASC
                 LIMIT 1;",
                [name],
                parse_author_row,
            )
            .optional()?;
        Ok(author)
    }

    fn list_authors(&self) -> RepoResult<Vec<Author>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM authors ORDER BY name COLLATE NOCASE ASC, id ASC;")?;
        let authors = stmt
            .query_map([], parse_author_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(authors)
    }

    fn update_author(&self, id: AuthorId, name: &str) -> RepoResult<Author> {
        let changed = self
            .conn
            .execute("UPDATE authors SET name = ?2 WHERE id = ?1;", params![id, name])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "author", id });
        }
        Ok(Author {
            id,
            name: name.to_string(),
        })
    }

    fn delete_author(&self, id: AuthorId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM authors WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "author", id });
        }
        Ok(())
    }

    fn create_book(&self, input: &BookInput) -> RepoResult<Book> {
        self.conn
            .execute(
                "INSERT INTO books (title, publication_year, isbn, author_id)
                 VALUES (?1, ?2, ?3, ?4);",
                params![input.title, input.publication_year, input.isbn, input.author_id],
            )
            .map_err(map_book_write_error)?;
        Ok(Book {
            id: self.conn.last_insert_rowid(),
            title: input.title.clone(),
            publication_year: input.publication_year,
            isbn: input.isbn.clone(),
            author_id: input.author_id,
        })
    }

    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>> {
        let book = self
            .conn
            .query_row(
                &format!("{BOOK_SELECT_SQL} WHERE books.id = ?1;"),
                [id],
                parse_book_row,
            )
            .optional()?;
        Ok(book)
    }

    fn list_books(&self, filter: &BookFilter, limit: i64, offset: i64) -> RepoResult<Vec<Book>> {
        let mut sql = format!("{BOOK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values = book_filter_bindings(&mut sql, filter);
        sql.push_str(" ORDER BY ");
        sql.push_str(filter.ordering.sql());
        sql.push_str(" LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(limit));
        bind_values.push(Value::Integer(offset));

        let mut stmt = self.conn.prepare(&sql)?;
        let books = stmt
            .query_map(params_from_iter(bind_values), parse_book_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn count_books(&self, filter: &BookFilter) -> RepoResult<u64> {
        let mut sql = String::from(
            "SELECT COUNT(*)
             FROM books
             INNER JOIN authors ON authors.id = books.author_id
             WHERE 1 = 1",
        );
        let bind_values = book_filter_bindings(&mut sql, filter);
        let count: i64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(count_to_u64(count))
    }

    fn books_by_author(&self, author_id: AuthorId) -> RepoResult<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BOOK_SELECT_SQL}
             WHERE books.author_id = ?1
             ORDER BY books.title COLLATE NOCASE ASC, books.publication_year ASC;"
        ))?;
        let books = stmt
            .query_map([author_id], parse_book_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn update_book(&self, id: BookId, input: &BookInput) -> RepoResult<Book> {
        let changed = self
            .conn
            .execute(
                "UPDATE books
                 SET title = ?2, publication_year = ?3, isbn = ?4, author_id = ?5
                 WHERE id = ?1;",
                params![
                    id,
                    input.title,
                    input.publication_year,
                    input.isbn,
                    input.author_id
                ],
            )
            .map_err(map_book_write_error)?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "book", id });
        }
        Ok(Book {
            id,
            title: input.title.clone(),
            publication_year: input.publication_year,
            isbn: input.isbn.clone(),
            author_id: input.author_id,
        })
    }

    fn delete_book(&self, id: BookId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM books WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "book", id });
        }
        Ok(())
    }

    fn create_library(&self, name: &str) -> RepoResult<Library> {
        self.conn
            .execute("INSERT INTO libraries (name) VALUES (?1);", [name])
            .map_err(|err| map_unique_violation(err, "a library with this name already exists"))?;
        Ok(Library {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn get_library(&self, id: LibraryId) -> RepoResult<Option<Library>> {
        let library = self
            .conn
            .query_row(
                "SELECT id, name FROM libraries WHERE id = ?1;",
                [id],
                parse_library_row,
            )
            .optional()?;
        Ok(library)
    }

    fn list_libraries(&self) -> RepoResult<Vec<Library>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM libraries ORDER BY name COLLATE NOCASE ASC;")?;
        let libraries = stmt
            .query_map([], parse_library_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(libraries)
    }

    fn library_books(&self, id: LibraryId) -> RepoResult<Vec<Book>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BOOK_SELECT_SQL}
             INNER JOIN library_books lb ON lb.book_id = books.id
             WHERE lb.library_id = ?1
             ORDER BY books.title COLLATE NOCASE ASC, books.id ASC;"
        ))?;
        let books = stmt
            .query_map([id], parse_book_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn add_book_to_library(&self, library_id: LibraryId, book_id: BookId) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO library_books (library_id, book_id) VALUES (?1, ?2);",
            params![library_id, book_id],
        )?;
        Ok(inserted == 1)
    }

    fn remove_book_from_library(
        &self,
        library_id: LibraryId,
        book_id: BookId,
    ) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM library_books WHERE library_id = ?1 AND book_id = ?2;",
            params![library_id, book_id],
        )?;
        Ok(removed == 1)
    }

    fn assign_librarian(&self, library_id: LibraryId, name: &str) -> RepoResult<Librarian> {
        self.conn.execute(
            "INSERT INTO librarians (name, library_id)
             VALUES (?1, ?2)
             ON CONFLICT (library_id) DO UPDATE SET name = excluded.name;",
            params![name, library_id],
        )?;
        self.librarian_for(library_id)?.ok_or(RepoError::NotFound {
            entity: "library",
            id: library_id,
        })
    }

    fn librarian_for(&self, library_id: LibraryId) -> RepoResult<Option<Librarian>> {
        let librarian = self
            .conn
            .query_row(
                "SELECT id, name, library_id FROM librarians WHERE library_id = ?1;",
                [library_id],
                |row| {
                    Ok(Librarian {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        library_id: row.get("library_id")?,
                    })
                },
            )
            .optional()?;
        Ok(librarian)
    }

    fn current_year(&self) -> RepoResult<i32> {
        let year = self.conn.query_row(
            "SELECT CAST(strftime('%Y', 'now') AS INTEGER);",
            [],
            |row| row.get::<_, i32>(0),
        )?;
        Ok(year)
    }
}

fn map_book_write_error(err: rusqlite::Error) -> RepoError {
    if is_foreign_key_violation(&err) {
        return ValidationError::new("author_id", "invalid pk - object does not exist").into();
    }
    map_unique_violation(err, BOOK_CONFLICT_MESSAGE)
}

fn book_filter_bindings(sql: &mut String, filter: &BookFilter) -> Vec<Value> {
    let mut bind_values = Vec::new();
    if let Some(author_id) = filter.author_id {
        sql.push_str(" AND books.author_id = ?");
        bind_values.push(Value::Integer(author_id));
    }
    if let Some(title) = filter.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        sql.push_str(" AND books.title LIKE ? ESCAPE '\\'");
        bind_values.push(Value::Text(like_pattern(title)));
    }
    if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        sql.push_str(" AND (books.title LIKE ? ESCAPE '\\' OR authors.name LIKE ? ESCAPE '\\')");
        let pattern = like_pattern(term);
        bind_values.push(Value::Text(pattern.clone()));
        bind_values.push(Value::Text(pattern));
    }
    if let Some(min_year) = filter.min_year {
        sql.push_str(" AND books.publication_year >= ?");
        bind_values.push(Value::Integer(i64::from(min_year)));
    }
    if let Some(max_year) = filter.max_year {
        sql.push_str(" AND books.publication_year <= ?");
        bind_values.push(Value::Integer(i64::from(max_year)));
    }
    bind_values
}

fn parse_author_row(row: &Row<'_>) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

fn parse_book_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get("id")?,
        title: row.get("title")?,
        publication_year: row.get("publication_year")?,
        isbn: row.get("isbn")?,
        author_id: row.get("author_id")?,
    })
}

fn parse_library_row(row: &Row<'_>) -> rusqlite::Result<Library> {
    Ok(Library {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

//! Library catalog model: authors, books, libraries and librarians.
//!
//! # Invariants
//! - `(title, author_id)` is unique across books.
//! - `publication_year` is never later than the current year.
//! - A library has at most one librarian.

use super::{require_text, ValidationError};
use serde::{Deserialize, Serialize};

pub type AuthorId = i64;
pub type BookId = i64;
pub type LibraryId = i64;

pub const NAME_MAX_CHARS: usize = 200;
pub const TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
}

/// Author with the books written by them, ordered by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorDetail {
    pub id: AuthorId,
    pub name: String,
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub publication_year: i32,
    pub isbn: String,
    pub author_id: AuthorId,
}

/// Full book payload used by create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub publication_year: i32,
    #[serde(default)]
    pub isbn: String,
    pub author_id: AuthorId,
}

impl BookInput {
    /// Validates everything except the future-year rule, which needs a clock.
    pub fn normalized(self) -> Result<Self, ValidationError> {
        let title = self.title.trim().to_string();
        require_text("title", &title, TITLE_MAX_CHARS)?;
        let isbn = self.isbn.trim().to_string();
        validate_isbn(&isbn)?;
        Ok(Self {
            title,
            publication_year: self.publication_year,
            isbn,
            author_id: self.author_id,
        })
    }
}

/// Partial book update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BookPatch {
    pub title: Option<String>,
    pub publication_year: Option<i32>,
    pub isbn: Option<String>,
    pub author_id: Option<AuthorId>,
}

impl BookPatch {
    pub fn apply_to(self, book: &Book) -> BookInput {
        BookInput {
            title: self.title.unwrap_or_else(|| book.title.clone()),
            publication_year: self.publication_year.unwrap_or(book.publication_year),
            isbn: self.isbn.unwrap_or_else(|| book.isbn.clone()),
            author_id: self.author_id.unwrap_or(book.author_id),
        }
    }
}

/// Sort keys accepted by book listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookOrdering {
    #[default]
    TitleAsc,
    TitleDesc,
    YearAsc,
    YearDesc,
}

impl BookOrdering {
    /// Parses `title`, `-title`, `publication_year`, `-publication_year`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "title" => Some(Self::TitleAsc),
            "-title" => Some(Self::TitleDesc),
            "publication_year" => Some(Self::YearAsc),
            "-publication_year" => Some(Self::YearDesc),
            _ => None,
        }
    }

    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::TitleAsc => "books.title COLLATE NOCASE ASC, books.publication_year ASC, books.id ASC",
            Self::TitleDesc => "books.title COLLATE NOCASE DESC, books.publication_year ASC, books.id ASC",
            Self::YearAsc => "books.publication_year ASC, books.title COLLATE NOCASE ASC, books.id ASC",
            Self::YearDesc => "books.publication_year DESC, books.title COLLATE NOCASE ASC, books.id ASC",
        }
    }
}

/// Filters for book listing. All filters combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub author_id: Option<AuthorId>,
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Case-insensitive substring of the title or author name.
    pub search: Option<String>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub ordering: BookOrdering,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Librarian {
    pub id: i64,
    pub name: String,
    pub library_id: LibraryId,
}

/// Library with its holdings and librarian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryDetail {
    pub id: LibraryId,
    pub name: String,
    pub books: Vec<Book>,
    pub librarian: Option<Librarian>,
}

pub fn validate_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    require_text(field, name, NAME_MAX_CHARS)
}

pub fn validate_isbn(isbn: &str) -> Result<(), ValidationError> {
    if isbn.is_empty() {
        return Ok(());
    }
    let digits = isbn.chars().filter(|c| *c != '-').collect::<String>();
    let well_formed = matches!(digits.len(), 10 | 13)
        && digits
            .chars()
            .enumerate()
            .all(|(idx, c)| c.is_ascii_digit() || (c == 'X' && idx == 9 && digits.len() == 10));
    if !well_formed {
        return Err(ValidationError::new("isbn", "enter a 10 or 13 digit ISBN"));
    }
    Ok(())
}

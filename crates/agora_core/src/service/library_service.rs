//! Library catalog use-cases.
//!
//! # Invariants
//! - Reads are open to everyone; every write requires a staff actor.
//! - A book's publication year is never later than the current year.

use super::{ServiceError, ServiceResult};
use crate::model::library::{
    validate_name, Author, AuthorDetail, AuthorId, Book, BookFilter, BookId, BookInput, BookPatch,
    Librarian, Library, LibraryDetail, LibraryId,
};
use crate::model::page::{Page, PageRequest, DEFAULT_PAGE_SIZE};
use crate::model::user::User;
use crate::repo::library_repo::LibraryRepository;

pub struct LibraryService<R: LibraryRepository> {
    repo: R,
}

impl<R: LibraryRepository> LibraryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_author(&self, actor: &User, name: &str) -> ServiceResult<Author> {
        ensure_staff(actor)?;
        let name = name.trim();
        validate_name("name", name)?;
        Ok(self.repo.create_author(name)?)
    }

    /// Author with their books ordered by title.
    pub fn get_author(&self, id: AuthorId) -> ServiceResult<AuthorDetail> {
        let author = self.find_author(id)?;
        let books = self.repo.books_by_author(id)?;
        Ok(AuthorDetail {
            id: author.id,
            name: author.name,
            books,
        })
    }

    pub fn list_authors(&self) -> ServiceResult<Vec<Author>> {
        Ok(self.repo.list_authors()?)
    }

    pub fn update_author(&self, actor: &User, id: AuthorId, name: &str) -> ServiceResult<Author> {
        ensure_staff(actor)?;
        let name = name.trim();
        validate_name("name", name)?;
        Ok(self.repo.update_author(id, name)?)
    }

    /// Deletes the author and, through the FK cascade, their books.
    pub fn delete_author(&self, actor: &User, id: AuthorId) -> ServiceResult<()> {
        ensure_staff(actor)?;
        self.repo.delete_author(id)?;
        log::info!("event=author_delete module=library status=ok author_id={id}");
        Ok(())
    }

    pub fn create_book(&self, actor: &User, input: BookInput) -> ServiceResult<Book> {
        ensure_staff(actor)?;
        let input = self.checked_book(input)?;
        Ok(self.repo.create_book(&input)?)
    }

    pub fn get_book(&self, id: BookId) -> ServiceResult<Book> {
        self.repo
            .get_book(id)?
            .ok_or(ServiceError::NotFound { entity: "book", id })
    }

    pub fn list_books(&self, filter: &BookFilter, page: &PageRequest) -> ServiceResult<Page<Book>> {
        let (limit, offset) = page.window(DEFAULT_PAGE_SIZE);
        let count = self.repo.count_books(filter)?;
        let results = self.repo.list_books(filter, limit, offset)?;
        Ok(Page::new(page, DEFAULT_PAGE_SIZE, count, results))
    }

    pub fn update_book(&self, actor: &User, id: BookId, patch: BookPatch) -> ServiceResult<Book> {
        ensure_staff(actor)?;
        let current = self.get_book(id)?;
        let input = self.checked_book(patch.apply_to(&current))?;
        Ok(self.repo.update_book(id, &input)?)
    }

    pub fn delete_book(&self, actor: &User, id: BookId) -> ServiceResult<()> {
        ensure_staff(actor)?;
        Ok(self.repo.delete_book(id)?)
    }

    /// Books by the first author whose name matches case-insensitively.
    /// An unknown name yields an empty list.
    pub fn books_by_author(&self, name: &str) -> ServiceResult<Vec<Book>> {
        match self.repo.find_author_by_name(name.trim())? {
            Some(author) => Ok(self.repo.books_by_author(author.id)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn create_library(&self, actor: &User, name: &str) -> ServiceResult<Library> {
        ensure_staff(actor)?;
        let name = name.trim();
        validate_name("name", name)?;
        Ok(self.repo.create_library(name)?)
    }

    pub fn list_libraries(&self) -> ServiceResult<Vec<Library>> {
        Ok(self.repo.list_libraries()?)
    }

    pub fn get_library(&self, id: LibraryId) -> ServiceResult<LibraryDetail> {
        let library = self
            .repo
            .get_library(id)?
            .ok_or(ServiceError::NotFound { entity: "library", id })?;
        Ok(LibraryDetail {
            id: library.id,
            name: library.name,
            books: self.repo.library_books(id)?,
            librarian: self.repo.librarian_for(id)?,
        })
    }

    /// Adds a book to a library's holdings. Adding a held book is a no-op.
    pub fn add_book(
        &self,
        actor: &User,
        library_id: LibraryId,
        book_id: BookId,
    ) -> ServiceResult<LibraryDetail> {
        ensure_staff(actor)?;
        self.ensure_library(library_id)?;
        if self.repo.get_book(book_id)?.is_none() {
            return Err(ServiceError::validation(
                "book_id",
                "invalid pk - object does not exist",
            ));
        }
        self.repo.add_book_to_library(library_id, book_id)?;
        self.get_library(library_id)
    }

    pub fn remove_book(
        &self,
        actor: &User,
        library_id: LibraryId,
        book_id: BookId,
    ) -> ServiceResult<LibraryDetail> {
        ensure_staff(actor)?;
        self.ensure_library(library_id)?;
        if !self.repo.remove_book_from_library(library_id, book_id)? {
            return Err(ServiceError::NotFound {
                entity: "library book",
                id: book_id,
            });
        }
        self.get_library(library_id)
    }

    /// Assigns a librarian, replacing any previous one.
    pub fn assign_librarian(
        &self,
        actor: &User,
        library_id: LibraryId,
        name: &str,
    ) -> ServiceResult<Librarian> {
        ensure_staff(actor)?;
        self.ensure_library(library_id)?;
        let name = name.trim();
        validate_name("name", name)?;
        Ok(self.repo.assign_librarian(library_id, name)?)
    }

    fn find_author(&self, id: AuthorId) -> ServiceResult<Author> {
        self.repo
            .get_author(id)?
            .ok_or(ServiceError::NotFound { entity: "author", id })
    }

    fn ensure_library(&self, id: LibraryId) -> ServiceResult<()> {
        match self.repo.get_library(id)? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound { entity: "library", id }),
        }
    }

    fn checked_book(&self, input: BookInput) -> ServiceResult<BookInput> {
        let input = input.normalized()?;
        let current_year = self.repo.current_year()?;
        if input.publication_year > current_year {
            return Err(ServiceError::validation(
                "publication_year",
                "publication year cannot be in the future",
            ));
        }
        if self.repo.get_author(input.author_id)?.is_none() {
            return Err(ServiceError::validation(
                "author_id",
                "invalid pk - object does not exist",
            ));
        }
        Ok(input)
    }
}

fn ensure_staff(actor: &User) -> ServiceResult<()> {
    if actor.is_staff {
        Ok(())
    } else {
        Err(ServiceError::PermissionDenied(
            "staff privileges are required to modify the catalog",
        ))
    }
}

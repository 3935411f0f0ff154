use bookshelf_db::{Database, PersistenceError};

use super::models::{Author, AuthorDto, AuthorId, Book, BookDto, BookId};
use super::repository::{AuthorRepository, BookRepository};

/// Author use cases. Absence is reported as `None`, never as an error.
#[derive(Debug, Clone)]
pub struct AuthorService {
    db: Database,
    authors: AuthorRepository,
}

impl AuthorService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            authors: AuthorRepository,
        }
    }

    pub async fn find_by_id(&self, id: AuthorId) -> Result<Option<AuthorDto>, PersistenceError> {
        let mut conn = self.db.pool().acquire().await?;
        let author = self.authors.find_by_id(&mut conn, id).await?;
        Ok(author.map(AuthorDto::from))
    }

    pub async fn find_all(&self) -> Result<Vec<AuthorDto>, PersistenceError> {
        let mut conn = self.db.pool().acquire().await?;
        let authors = self.authors.find_all(&mut conn).await?;
        Ok(authors.iter().map(AuthorDto::from).collect())
    }

    /// Persist a new author. Rejecting DTOs with a preset id is the
    /// caller's job.
    pub async fn save(&self, dto: AuthorDto) -> Result<AuthorDto, PersistenceError> {
        let mut conn = self.db.pool().acquire().await?;
        let saved = self.authors.save(&mut conn, Author::from(dto)).await?;
        tracing::info!(author_id = ?saved.id, "author created");
        Ok(AuthorDto::from(saved))
    }

    /// Delete an author together with its books.
    pub async fn delete_by_id(&self, id: AuthorId) -> Result<bool, PersistenceError> {
        let mut conn = self.db.pool().acquire().await?;
        let deleted = self.authors.delete_by_id(&mut conn, id).await?;
        if deleted {
            tracing::info!(author_id = id, "author deleted with its books");
        }
        Ok(deleted)
    }
}

/// Book use cases scoped to an owning author.
#[derive(Debug, Clone)]
pub struct BookService {
    db: Database,
    authors: AuthorRepository,
    books: BookRepository,
}

impl BookService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            authors: AuthorRepository,
            books: BookRepository,
        }
    }

    /// Books of `author_id`; an unknown author yields an empty list.
    pub async fn find_all_books_for_author_with_id(
        &self,
        author_id: AuthorId,
    ) -> Result<Vec<BookDto>, PersistenceError> {
        let mut conn = self.db.pool().acquire().await?;
        let books = self
            .books
            .find_books_by_author_id(&mut conn, author_id)
            .await?;
        Ok(books.into_iter().map(BookDto::from).collect())
    }

    /// A single book, only if it belongs to `author_id`.
    pub async fn find_book_for_author(
        &self,
        author_id: AuthorId,
        book_id: BookId,
    ) -> Result<Option<BookDto>, PersistenceError> {
        let mut conn = self.db.pool().acquire().await?;
        let book = self.books.find_by_id(&mut conn, book_id).await?;
        Ok(book
            .filter(|b| b.author_id == Some(author_id))
            .map(BookDto::from))
    }

    /// Create a book owned by `author_id`. Rejecting DTOs with a preset id
    /// is the caller's job.
    ///
    /// The author lookup and the insert share one transaction; `None` means
    /// the author does not exist and nothing was written.
    /// The write lock is taken up front so concurrent creators wait on the
    /// busy timeout instead of failing with `SQLITE_BUSY`.
    pub async fn save_book_for_author_with_id(
        &self,
        dto: BookDto,
        author_id: AuthorId,
    ) -> Result<Option<BookDto>, PersistenceError> {
        let mut tx = self.db.pool().begin_with("BEGIN IMMEDIATE").await?;

        let Some(author) = self.authors.find_by_id(&mut tx, author_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };

        let mut book = Book::from(dto);
        book.author_id = author.id;

        let saved = self.books.save(&mut tx, book).await?;
        tx.commit().await?;

        tracing::info!(author_id, book_id = ?saved.id, "book created for author");
        Ok(Some(BookDto::from(saved)))
    }
}

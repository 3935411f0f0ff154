use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type AuthorId = i64;
pub type BookId = i64;

/// Shallow author row. Carries no books; see [`AuthorWithBooks`] for the
/// hydrated aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: Option<AuthorId>,
    pub first_name: String,
    pub last_name: String,
}

impl Author {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// A book row. The owning author is referenced by id only.
#[derive(Debug, Clone)]
pub struct Book {
    pub id: Option<BookId>,
    pub title: String,
    pub price: Decimal,
    pub publish_date: NaiveDate,
    pub author_id: Option<AuthorId>,
}

impl Book {
    pub fn new(title: impl Into<String>, price: Decimal, publish_date: NaiveDate) -> Self {
        Self {
            id: None,
            title: title.into(),
            price,
            publish_date,
            author_id: None,
        }
    }
}

/// Persisted books compare by id so edits to title or price do not change
/// collection membership. Transient books compare by value.
impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => {
                self.title == other.title
                    && self.price == other.price
                    && self.publish_date == other.publish_date
                    && self.author_id == other.author_id
            }
            _ => false,
        }
    }
}

impl Eq for Book {}

/// An author together with every book it owns.
///
/// Invariant: each book's `author_id` equals `author.id`. Books leave the
/// aggregate only through [`AuthorWithBooks::remove_book`]; saving the
/// aggregate deletes them from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorWithBooks {
    pub author: Author,
    books: Vec<Book>,
}

impl AuthorWithBooks {
    pub fn new(author: Author) -> Self {
        Self {
            author,
            books: Vec::new(),
        }
    }

    /// Rebuild an aggregate from stored rows, re-linking every book.
    pub(crate) fn from_parts(author: Author, books: Vec<Book>) -> Self {
        let mut aggregate = Self::new(author);
        for book in books {
            aggregate.add_book(book);
        }
        aggregate
    }

    pub fn id(&self) -> Option<AuthorId> {
        self.author.id
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Take ownership of `book`, pointing it at this author.
    pub fn add_book(&mut self, mut book: Book) {
        book.author_id = self.author.id;
        self.books.push(book);
    }

    /// Detach the persisted book `book_id`, clearing its author link.
    pub fn remove_book(&mut self, book_id: BookId) -> Option<Book> {
        let index = self.books.iter().position(|b| b.id == Some(book_id))?;
        let mut book = self.books.remove(index);
        book.author_id = None;
        Some(book)
    }

    /// Assign the author id once the row exists and propagate it to the books.
    pub(crate) fn set_id(&mut self, id: AuthorId) {
        self.author.id = Some(id);
        for book in &mut self.books {
            book.author_id = Some(id);
        }
    }

    pub(crate) fn books_mut(&mut self) -> &mut [Book] {
        &mut self.books
    }

    pub fn into_parts(self) -> (Author, Vec<Book>) {
        (self.author, self.books)
    }
}

/// Author transfer shape; books are reached through `/authors/{id}/books`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDto {
    #[serde(default)]
    pub id: Option<AuthorId>,
    pub first_name: String,
    pub last_name: String,
}

/// Book transfer shape. No author reference; linkage lives in the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDto {
    #[serde(default)]
    pub id: Option<BookId>,
    pub title: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
    pub publish_date: NaiveDate,
}

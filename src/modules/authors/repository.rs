//! SQLite repositories for authors and books.
//!
//! Methods borrow a `SqliteConnection`, so the caller decides whether they
//! run on a pooled connection or inside an open transaction. Hydration is
//! explicit: `find_by_id` returns a shallow [`Author`], the `*_with_books`,
//! `find_all` and `find_by_first_name` queries return full
//! [`AuthorWithBooks`] graphs from a single LEFT JOIN, or fail.

use std::collections::HashSet;
use std::str::FromStr;

use bookshelf_db::PersistenceError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Connection, SqliteConnection};

use super::models::{Author, AuthorId, AuthorWithBooks, Book, BookId};

const DATE_FORMAT: &str = "%Y-%m-%d";

const AUTHOR_GRAPH_SELECT: &str = r#"
    SELECT a.id AS author_id, a.first_name, a.last_name,
           b.id AS book_id, b.title, b.price, b.publish_date
    FROM author a
    LEFT JOIN book b ON b.author_id = a.id
"#;

fn encode_price(price: &Decimal) -> String {
    price.to_string()
}

fn decode_price(raw: &str) -> Result<Decimal, PersistenceError> {
    Decimal::from_str(raw).map_err(|e| PersistenceError::corrupt("price", e))
}

fn encode_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn decode_date(raw: &str) -> Result<NaiveDate, PersistenceError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| PersistenceError::corrupt("publish_date", e))
}

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: i64,
    first_name: String,
    last_name: String,
}

impl From<AuthorRow> for Author {
    fn from(r: AuthorRow) -> Self {
        Self {
            id: Some(r.id),
            first_name: r.first_name,
            last_name: r.last_name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    price: String,
    publish_date: String,
    author_id: Option<i64>,
}

impl TryFrom<BookRow> for Book {
    type Error = PersistenceError;

    fn try_from(r: BookRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(r.id),
            title: r.title,
            price: decode_price(&r.price)?,
            publish_date: decode_date(&r.publish_date)?,
            author_id: r.author_id,
        })
    }
}

/// One row of the author/book LEFT JOIN; book columns are NULL for authors
/// without books.
#[derive(sqlx::FromRow)]
struct AuthorBookRow {
    author_id: i64,
    first_name: String,
    last_name: String,
    book_id: Option<i64>,
    title: Option<String>,
    price: Option<String>,
    publish_date: Option<String>,
}

impl AuthorBookRow {
    fn book(&self) -> Result<Option<Book>, PersistenceError> {
        let Some(book_id) = self.book_id else {
            return Ok(None);
        };
        let (Some(title), Some(price), Some(publish_date)) =
            (&self.title, &self.price, &self.publish_date)
        else {
            return Err(PersistenceError::corrupt(
                "book",
                format!("book {book_id} is missing required columns"),
            ));
        };

        Ok(Some(Book {
            id: Some(book_id),
            title: title.clone(),
            price: decode_price(price)?,
            publish_date: decode_date(publish_date)?,
            author_id: Some(self.author_id),
        }))
    }
}

/// Fold joined rows (ordered by author id) into aggregates.
fn assemble(rows: Vec<AuthorBookRow>) -> Result<Vec<AuthorWithBooks>, PersistenceError> {
    let mut grouped: Vec<(Author, Vec<Book>)> = Vec::new();

    for row in rows {
        let book = row.book()?;
        let same_author = grouped
            .last()
            .is_some_and(|(author, _)| author.id == Some(row.author_id));

        if !same_author {
            grouped.push((
                Author {
                    id: Some(row.author_id),
                    first_name: row.first_name,
                    last_name: row.last_name,
                },
                Vec::new(),
            ));
        }

        if let (Some(book), Some((_, books))) = (book, grouped.last_mut()) {
            books.push(book);
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(author, books)| AuthorWithBooks::from_parts(author, books))
        .collect())
}

/// Queries over the `author` table and its owned books.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorRepository;

impl AuthorRepository {
    /// Shallow lookup; the returned author carries no books.
    pub async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: AuthorId,
    ) -> Result<Option<Author>, PersistenceError> {
        let row: Option<AuthorRow> =
            sqlx::query_as("SELECT id, first_name, last_name FROM author WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(row.map(Author::from))
    }

    /// Author and all of its books in one round trip.
    pub async fn find_by_id_with_books(
        &self,
        conn: &mut SqliteConnection,
        id: AuthorId,
    ) -> Result<Option<AuthorWithBooks>, PersistenceError> {
        let rows: Vec<AuthorBookRow> =
            sqlx::query_as(&format!("{AUTHOR_GRAPH_SELECT} WHERE a.id = ? ORDER BY b.id"))
                .bind(id)
                .fetch_all(&mut *conn)
                .await?;

        Ok(assemble(rows)?.into_iter().next())
    }

    /// Every author with its books, fetch-joined.
    pub async fn find_all(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<AuthorWithBooks>, PersistenceError> {
        let rows: Vec<AuthorBookRow> =
            sqlx::query_as(&format!("{AUTHOR_GRAPH_SELECT} ORDER BY a.id, b.id"))
                .fetch_all(&mut *conn)
                .await?;

        assemble(rows)
    }

    pub async fn find_by_first_name(
        &self,
        conn: &mut SqliteConnection,
        first_name: &str,
    ) -> Result<Vec<AuthorWithBooks>, PersistenceError> {
        let rows: Vec<AuthorBookRow> = sqlx::query_as(&format!(
            "{AUTHOR_GRAPH_SELECT} WHERE a.first_name = ? ORDER BY a.id, b.id"
        ))
        .bind(first_name)
        .fetch_all(&mut *conn)
        .await?;

        assemble(rows)
    }

    /// Delete every author named `first_name`; their books go with them
    /// through the `ON DELETE CASCADE` foreign key. Returns authors removed.
    pub async fn delete_by_first_name(
        &self,
        conn: &mut SqliteConnection,
        first_name: &str,
    ) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM author WHERE first_name = ?")
            .bind(first_name)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete one author and its books. Returns whether the author existed.
    pub async fn delete_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: AuthorId,
    ) -> Result<bool, PersistenceError> {
        let result = sqlx::query("DELETE FROM author WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert or update the author row only; books are left untouched.
    pub async fn save(
        &self,
        conn: &mut SqliteConnection,
        mut author: Author,
    ) -> Result<Author, PersistenceError> {
        match author.id {
            None => {
                let result = sqlx::query("INSERT INTO author (first_name, last_name) VALUES (?, ?)")
                    .bind(&author.first_name)
                    .bind(&author.last_name)
                    .execute(&mut *conn)
                    .await?;
                author.id = Some(result.last_insert_rowid());
            }
            Some(id) => {
                let result =
                    sqlx::query("UPDATE author SET first_name = ?, last_name = ? WHERE id = ?")
                        .bind(&author.first_name)
                        .bind(&author.last_name)
                        .bind(id)
                        .execute(&mut *conn)
                        .await?;
                if result.rows_affected() == 0 {
                    return Err(sqlx::Error::RowNotFound.into());
                }
            }
        }

        Ok(author)
    }

    /// Persist the whole aggregate atomically: the author row, every book it
    /// owns (inserted or updated), and deletion of books previously linked to
    /// the author but no longer in its collection.
    pub async fn save_with_books(
        &self,
        conn: &mut SqliteConnection,
        aggregate: AuthorWithBooks,
    ) -> Result<AuthorWithBooks, PersistenceError> {
        let mut tx = conn.begin().await?;
        let books = BookRepository;

        let (author, owned) = aggregate.into_parts();
        let author = self.save(&mut tx, author).await?;
        let author_id = author.id.ok_or(sqlx::Error::RowNotFound)?;

        let mut saved = AuthorWithBooks::new(author);
        for book in owned {
            saved.add_book(book);
        }
        saved.set_id(author_id);

        for book in saved.books_mut() {
            *book = books.save(&mut tx, book.clone()).await?;
        }

        let kept: HashSet<BookId> = saved.books().iter().filter_map(|b| b.id).collect();
        let linked: Vec<(i64,)> = sqlx::query_as("SELECT id FROM book WHERE author_id = ?")
            .bind(author_id)
            .fetch_all(&mut *tx)
            .await?;

        for (orphan,) in linked.into_iter().filter(|(id,)| !kept.contains(id)) {
            sqlx::query("DELETE FROM book WHERE id = ?")
                .bind(orphan)
                .execute(&mut *tx)
                .await?;
            tracing::debug!(author_id, book_id = orphan, "orphaned book removed");
        }

        tx.commit().await?;
        Ok(saved)
    }

    pub async fn count(&self, conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM author")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

/// Queries over the `book` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookRepository;

impl BookRepository {
    pub async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: BookId,
    ) -> Result<Option<Book>, PersistenceError> {
        let row: Option<BookRow> = sqlx::query_as(
            "SELECT id, title, price, publish_date, author_id FROM book WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(Book::try_from).transpose()
    }

    pub async fn find_all(&self, conn: &mut SqliteConnection) -> Result<Vec<Book>, PersistenceError> {
        let rows: Vec<BookRow> =
            sqlx::query_as("SELECT id, title, price, publish_date, author_id FROM book ORDER BY id")
                .fetch_all(&mut *conn)
                .await?;

        rows.into_iter().map(Book::try_from).collect()
    }

    pub async fn find_by_title(
        &self,
        conn: &mut SqliteConnection,
        title: &str,
    ) -> Result<Vec<Book>, PersistenceError> {
        let rows: Vec<BookRow> = sqlx::query_as(
            "SELECT id, title, price, publish_date, author_id FROM book WHERE title = ? ORDER BY id",
        )
        .bind(title)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Book::try_from).collect()
    }

    /// Books owned by `author_id`, without loading the author.
    pub async fn find_books_by_author_id(
        &self,
        conn: &mut SqliteConnection,
        author_id: AuthorId,
    ) -> Result<Vec<Book>, PersistenceError> {
        let rows: Vec<BookRow> = sqlx::query_as(
            "SELECT id, title, price, publish_date, author_id FROM book WHERE author_id = ? ORDER BY id",
        )
        .bind(author_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Book::try_from).collect()
    }

    /// Insert a transient book or update a persisted one, including its
    /// author link.
    pub async fn save(
        &self,
        conn: &mut SqliteConnection,
        mut book: Book,
    ) -> Result<Book, PersistenceError> {
        let price = encode_price(&book.price);
        let publish_date = encode_date(&book.publish_date);

        match book.id {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO book (title, price, publish_date, author_id)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(&book.title)
                .bind(price)
                .bind(publish_date)
                .bind(book.author_id)
                .execute(&mut *conn)
                .await?;
                book.id = Some(result.last_insert_rowid());
            }
            Some(id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE book
                    SET title = ?, price = ?, publish_date = ?, author_id = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&book.title)
                .bind(price)
                .bind(publish_date)
                .bind(book.author_id)
                .bind(id)
                .execute(&mut *conn)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(sqlx::Error::RowNotFound.into());
                }
            }
        }

        Ok(book)
    }

    pub async fn count(&self, conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM book")
            .fetch_one(&mut *conn)
            .await?;
        Ok(row.0)
    }
}

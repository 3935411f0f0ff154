//! Entity <-> DTO conversions.
//!
//! Each mapping covers one entity type and never copies relationship
//! fields: a book mapped from a DTO is unassigned, and an author DTO never
//! carries books. Absent inputs stay absent via `Option::map`.

use super::models::{Author, AuthorDto, AuthorWithBooks, Book, BookDto};

impl From<&Author> for AuthorDto {
    fn from(author: &Author) -> Self {
        Self {
            id: author.id,
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
        }
    }
}

impl From<Author> for AuthorDto {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            first_name: author.first_name,
            last_name: author.last_name,
        }
    }
}

impl From<&AuthorWithBooks> for AuthorDto {
    fn from(aggregate: &AuthorWithBooks) -> Self {
        Self::from(&aggregate.author)
    }
}

impl From<AuthorDto> for Author {
    fn from(dto: AuthorDto) -> Self {
        Self {
            id: dto.id,
            first_name: dto.first_name,
            last_name: dto.last_name,
        }
    }
}

impl From<&Book> for BookDto {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            price: book.price,
            publish_date: book.publish_date,
        }
    }
}

impl From<Book> for BookDto {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            title: book.title,
            price: book.price,
            publish_date: book.publish_date,
        }
    }
}

impl From<BookDto> for Book {
    fn from(dto: BookDto) -> Self {
        Self {
            id: dto.id,
            title: dto.title,
            price: dto.price,
            publish_date: dto.publish_date,
            author_id: None,
        }
    }
}

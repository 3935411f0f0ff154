pub mod mapper;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use bookshelf_db::Database;
use bookshelf_kernel::{InitCtx, Migration, Module};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;

use models::{Author, AuthorWithBooks, Book};
use repository::AuthorRepository;

const SCHEMA_V1: &str = r#"
    CREATE TABLE author (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name  TEXT NOT NULL
    );
    CREATE TABLE book (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        title        TEXT NOT NULL,
        price        TEXT NOT NULL,
        publish_date TEXT NOT NULL,
        author_id    INTEGER REFERENCES author(id) ON DELETE CASCADE
    );
    CREATE INDEX book_author_id_idx ON book(author_id);
    CREATE INDEX book_title_idx ON book(title);
    CREATE INDEX author_first_name_idx ON author(first_name);
"#;

/// Authors and their books
pub struct AuthorsModule;

impl AuthorsModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for AuthorsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for AuthorsModule {
    fn name(&self) -> &'static str {
        "authors"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "authors module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        routes::router(routes::AuthorsState::new(ctx.db))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: SCHEMA_V1,
        }]
    }

    async fn start(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        if ctx.settings.database.seed {
            seed(ctx.db).await.context("failed to seed authors")?;
        }
        tracing::info!(module = self.name(), "authors module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "authors module stopped");
        Ok(())
    }
}

/// Insert the sample author and book unless authors already exist.
///
/// Returns whether anything was written.
pub async fn seed(db: &Database) -> anyhow::Result<bool> {
    let authors = AuthorRepository;
    let mut conn = db.pool().acquire().await?;

    if authors.count(&mut conn).await? > 0 {
        tracing::debug!("authors present, skipping seed data");
        return Ok(false);
    }

    tracing::debug!("initializing sample data");
    let mut craig = AuthorWithBooks::new(Author::new("Craig", "Walls"));
    craig.add_book(Book::new(
        "Spring in Action",
        Decimal::from_str("51.40")?,
        NaiveDate::from_ymd_opt(2022, 3, 1).context("invalid seed date")?,
    ));
    let saved = authors.save_with_books(&mut conn, craig).await?;

    tracing::info!(author_id = ?saved.id(), books = saved.books().len(), "sample data initialized");
    Ok(true)
}

fn openapi_fragment() -> serde_json::Value {
    let error = json!({
        "description": "Error",
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    });
    let author = json!({
        "application/json": { "schema": { "$ref": "#/components/schemas/AuthorDTO" } }
    });
    let authors = json!({
        "application/json": {
            "schema": { "type": "array", "items": { "$ref": "#/components/schemas/AuthorDTO" } }
        }
    });
    let book = json!({
        "application/json": { "schema": { "$ref": "#/components/schemas/BookDTO" } }
    });
    let books = json!({
        "application/json": {
            "schema": { "type": "array", "items": { "$ref": "#/components/schemas/BookDTO" } }
        }
    });
    let id_param = json!({
        "name": "id", "in": "path", "required": true,
        "schema": { "type": "integer", "format": "int64" }
    });

    json!({
        "paths": {
            "/": {
                "get": {
                    "summary": "Get all authors",
                    "tags": ["Authors"],
                    "responses": {
                        "200": { "description": "Found all authors", "content": authors },
                        "500": error
                    }
                },
                "post": {
                    "summary": "Create author",
                    "tags": ["Authors"],
                    "requestBody": { "required": true, "content": author },
                    "responses": {
                        "201": { "description": "Created author", "content": author },
                        "400": error
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Authors health check",
                    "tags": ["Authors"],
                    "responses": {
                        "200": {
                            "description": "OK",
                            "content": { "text/plain": { "schema": { "type": "string" } } }
                        }
                    }
                }
            },
            "/{id}": {
                "get": {
                    "summary": "Get an author by its id",
                    "tags": ["Authors"],
                    "parameters": [id_param],
                    "responses": {
                        "200": { "description": "Found the author", "content": author },
                        "404": error
                    }
                },
                "delete": {
                    "summary": "Delete an author and its books",
                    "tags": ["Authors"],
                    "parameters": [id_param],
                    "responses": {
                        "204": { "description": "Deleted" },
                        "404": error
                    }
                }
            },
            "/{id}/books": {
                "get": {
                    "summary": "Get all books for author",
                    "tags": ["Authors"],
                    "parameters": [id_param],
                    "responses": {
                        "200": { "description": "Found all books", "content": books }
                    }
                },
                "post": {
                    "summary": "Create a book for author",
                    "tags": ["Authors"],
                    "parameters": [id_param],
                    "requestBody": { "required": true, "content": book },
                    "responses": {
                        "201": { "description": "Created book", "content": book },
                        "400": error,
                        "404": error
                    }
                }
            },
            "/{id}/books/{book_id}": {
                "get": {
                    "summary": "Get one book of an author",
                    "tags": ["Authors"],
                    "parameters": [
                        id_param,
                        {
                            "name": "book_id", "in": "path", "required": true,
                            "schema": { "type": "integer", "format": "int64" }
                        }
                    ],
                    "responses": {
                        "200": { "description": "Found the book", "content": book },
                        "404": error
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "AuthorDTO": {
                    "type": "object",
                    "properties": {
                        "id": { "type": ["integer", "null"], "format": "int64", "description": "Server-assigned identifier" },
                        "firstName": { "type": "string" },
                        "lastName": { "type": "string" }
                    },
                    "required": ["firstName", "lastName"]
                },
                "BookDTO": {
                    "type": "object",
                    "properties": {
                        "id": { "type": ["integer", "null"], "format": "int64", "description": "Server-assigned identifier" },
                        "title": { "type": "string" },
                        "price": { "type": "number", "description": "Exact decimal, scale preserved" },
                        "publishDate": { "type": "string", "format": "date" }
                    },
                    "required": ["title", "price", "publishDate"]
                }
            }
        }
    })
}

/// Create a new instance of the authors module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AuthorsModule::new())
}

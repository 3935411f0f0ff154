use std::str::FromStr;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bookshelf_app::authors::models::{Author, AuthorWithBooks, Book};
use bookshelf_app::authors::repository::{AuthorRepository, BookRepository};
use bookshelf_db::Database;
use bookshelf_kernel::{settings::Settings, InitCtx};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: Database,
    author1: AuthorWithBooks,
}

struct TestResponse {
    status: StatusCode,
    location: Option<String>,
    body: Value,
}

fn author(n: u32, price: &str, month: u32) -> AuthorWithBooks {
    let mut aggregate = AuthorWithBooks::new(Author::new(
        format!("Author {n} first name"),
        format!("Author {n} last name"),
    ));
    aggregate.add_book(Book::new(
        format!("Book {n} book title"),
        Decimal::from_str(price).unwrap(),
        NaiveDate::from_ymd_opt(2024, month, 10 + n).unwrap(),
    ));
    aggregate
}

async fn setup() -> TestApp {
    let settings = Settings::default();
    let db = Database::connect_in_memory().await.unwrap();
    let registry = bookshelf_app::app::registry();
    db.run_migrations(&registry.collect_migrations())
        .await
        .unwrap();

    let mut conn = db.pool().acquire().await.unwrap();
    let author1 = AuthorRepository
        .save_with_books(&mut conn, author(1, "11.00", 1))
        .await
        .unwrap();
    AuthorRepository
        .save_with_books(&mut conn, author(2, "12.00", 2))
        .await
        .unwrap();
    AuthorRepository
        .save_with_books(&mut conn, author(3, "13.00", 3))
        .await
        .unwrap();
    drop(conn);

    let ctx = InitCtx {
        settings: &settings,
        db: &db,
    };
    let router = bookshelf_http::build_router(&registry, &ctx);

    TestApp {
        router,
        db,
        author1,
    }
}

impl TestApp {
    fn author1_id(&self) -> i64 {
        self.author1.id().unwrap()
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            location,
            body,
        }
    }

    async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, json: &str) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn book_count(&self) -> i64 {
        let mut conn = self.db.pool().acquire().await.unwrap();
        BookRepository.count(&mut conn).await.unwrap()
    }

    async fn author_count(&self) -> i64 {
        let mut conn = self.db.pool().acquire().await.unwrap();
        AuthorRepository.count(&mut conn).await.unwrap()
    }
}

#[tokio::test]
async fn get_author_with_existing_id() {
    let app = setup().await;
    let id = app.author1_id();

    let response = app.get(&format!("/api/authors/{id}")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["id"], id);
    assert_eq!(response.body["firstName"], "Author 1 first name");
    assert_eq!(response.body["lastName"], "Author 1 last name");
}

#[tokio::test]
async fn get_author_with_non_existing_id() {
    let app = setup().await;

    let response = app.get("/api/authors/0").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"]["code"], "not_found");
    assert_eq!(
        response.body["error"]["message"],
        "Author with id: '0' not found!"
    );
}

#[tokio::test]
async fn get_all_authors() {
    let app = setup().await;

    let response = app.get("/api/authors").await;

    assert_eq!(response.status, StatusCode::OK);
    let authors = response.body.as_array().unwrap();
    assert_eq!(authors.len(), 3);
    assert!(authors.iter().all(|a| a.get("books").is_none()));
}

#[tokio::test]
async fn get_books_for_author_with_id() {
    let app = setup().await;
    let id = app.author1_id();

    let response = app.get(&format!("/api/authors/{id}/books")).await;

    assert_eq!(response.status, StatusCode::OK);
    let books = response.body.as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "Book 1 book title");
    assert_eq!(books[0]["price"].to_string(), "11.00");
    assert_eq!(books[0]["publishDate"], "2024-01-11");
    assert!(books[0].get("author").is_none());
}

#[tokio::test]
async fn get_books_for_unknown_author_is_empty() {
    let app = setup().await;

    let response = app.get("/api/authors/999/books").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, serde_json::json!([]));
}

#[tokio::test]
async fn create_author() {
    let app = setup().await;

    let response = app
        .post(
            "/api/authors",
            r#"{"firstName":"Author 1 created first name","lastName":"Author 1 created last name"}"#,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["firstName"], "Author 1 created first name");
    assert_eq!(response.body["lastName"], "Author 1 created last name");
    let id = response.body["id"].as_i64().unwrap();
    assert_eq!(response.location.as_deref(), Some(format!("/api/authors/{id}").as_str()));

    let fetched = app.get(&format!("/api/authors/{id}")).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, response.body);
    assert_eq!(app.author_count().await, 4);
}

#[tokio::test]
async fn create_author_with_id_set() {
    let app = setup().await;

    let response = app
        .post(
            "/api/authors",
            r#"{"id":1,"firstName":"Author 1 created first name","lastName":"Author 1 created last name"}"#,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], "bad_request");
    assert_eq!(app.author_count().await, 3);
}

#[tokio::test]
async fn create_author_with_malformed_body() {
    let app = setup().await;

    let response = app.post("/api/authors", r#"{"firstName":"#).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"]["code"], "bad_request");
    assert_eq!(app.author_count().await, 3);
}

#[tokio::test]
async fn create_book_for_author_with_id() {
    let app = setup().await;
    let id = app.author1_id();

    let response = app
        .post(
            &format!("/api/authors/{id}/books"),
            r#"{"title":"Book 1.1 book title","price":11.11,"publishDate":"2024-11-11"}"#,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["title"], "Book 1.1 book title");
    assert_eq!(response.body["price"].to_string(), "11.11");
    assert_eq!(response.body["publishDate"], "2024-11-11");
    let book_id = response.body["id"].as_i64().unwrap();

    assert_eq!(app.book_count().await, 4);
    let mut conn = app.db.pool().acquire().await.unwrap();
    let stored = BookRepository
        .find_by_id(&mut conn, book_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.author_id, Some(id));
    assert_eq!(stored.price, Decimal::from_str("11.11").unwrap());
    let hydrated = AuthorRepository
        .find_by_id_with_books(&mut conn, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hydrated.books().len(), 2);
    drop(conn);

    let location = response.location.unwrap();
    assert_eq!(location, format!("/api/authors/{id}/books/{book_id}"));
    let fetched = app.get(&location).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["title"], "Book 1.1 book title");

    let listed = app.get(&format!("/api/authors/{id}/books")).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn create_book_for_author_with_not_existing_id() {
    let app = setup().await;

    let response = app
        .post(
            "/api/authors/0/books",
            r#"{"title":"Book 1.1 book title","price":11.11,"publishDate":"2024-11-11"}"#,
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.book_count().await, 3);
}

#[tokio::test]
async fn create_book_with_id_set() {
    let app = setup().await;
    let id = app.author1_id();

    let response = app
        .post(
            &format!("/api/authors/{id}/books"),
            r#"{"id":1,"title":"Hijack","price":1.00,"publishDate":"2024-11-11"}"#,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.book_count().await, 3);
}

#[tokio::test]
async fn book_of_another_author_is_not_found() {
    let app = setup().await;
    let id = app.author1_id();
    let foreign_book = {
        let mut conn = app.db.pool().acquire().await.unwrap();
        BookRepository
            .find_by_title(&mut conn, "Book 2 book title")
            .await
            .unwrap()[0]
            .id
            .unwrap()
    };

    let response = app
        .get(&format!("/api/authors/{id}/books/{foreign_book}"))
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_author_removes_its_books() {
    let app = setup().await;
    let id = app.author1_id();

    let response = app
        .send(
            Request::delete(format!("/api/authors/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&format!("/api/authors/{id}")).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.book_count().await, 2);
    let books = app.get(&format!("/api/authors/{id}/books")).await;
    assert_eq!(books.body, serde_json::json!([]));

    let again = app
        .send(
            Request::delete(format!("/api/authors/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn openapi_document_lists_author_routes() {
    let app = setup().await;

    let response = app.get("/docs/openapi.json").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["paths"]["/api/authors"]["post"].is_object());
    assert!(response.body["paths"]["/api/authors/{id}/books"]["get"].is_object());
    assert!(response.body["components"]["schemas"]["BookDTO"].is_object());
}

#[tokio::test]
async fn module_health_check() {
    let app = setup().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/api/authors/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unparsable_author_id_is_bad_request() {
    let app = setup().await;

    for uri in [
        "/api/authors/abc",
        "/api/authors/99999999999999999999/books",
        "/api/authors/1/books/xyz",
    ] {
        let response = app.get(uri).await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(response.body["error"]["code"], "bad_request", "{uri}");
    }
}

#[tokio::test]
async fn failed_book_insert_is_server_error_and_persists_nothing() {
    let app = setup().await;
    let id = app.author1_id();
    sqlx::raw_sql(
        "CREATE TRIGGER fail_book BEFORE INSERT ON book BEGIN SELECT RAISE(ABORT, 'boom'); END",
    )
    .execute(app.db.pool())
    .await
    .unwrap();

    let response = app
        .post(
            &format!("/api/authors/{id}/books"),
            r#"{"title":"Doomed","price":1.00,"publishDate":"2024-11-11"}"#,
        )
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error"]["code"], "database_error");
    assert_eq!(app.book_count().await, 3);
}

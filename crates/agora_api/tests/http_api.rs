use agora_api::{router, AppState};
use agora_core::{open_db_in_memory, AccountService, SqliteUserRepository};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const STAFF_PASSWORD: &str = "catalog-keeper";

fn app() -> Router {
    let mut conn = open_db_in_memory().unwrap();
    AccountService::new(SqliteUserRepository::try_new(&mut conn).unwrap())
        .create_staff("keeper", "keeper@example.com", STAFF_PASSWORD)
        .unwrap();
    router(AppState::new(conn))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Token {token}"));
    }
    let body = match body {
        Some(value) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, username: &str) -> (i64, String) {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/accounts/register",
        None,
        Some(json!({"username": username, "password": "s3cret-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn staff_token(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/accounts/login",
        None,
        Some(json!({"username": "keeper", "password": STAFF_PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_core_status() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pong");
    assert_eq!(body["version"], agora_core::core_version());
}

#[tokio::test]
async fn register_login_and_profile_round_trip() {
    let app = app();
    let (alice, token) = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/accounts/login",
        None,
        Some(json!({"username": "alice", "password": "s3cret-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], token.as_str());

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/accounts/profile",
        Some(&token),
        Some(json!({"bio": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], alice);
    assert_eq!(body["bio"], "hello");
    assert_eq!(body["followers_count"], 0);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/accounts/login",
        None,
        Some(json!({"username": "alice", "password": "wrong-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn other_users_profiles_omit_the_email() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/accounts/register",
        None,
        Some(json!({
            "username": "dana",
            "email": "dana@example.com",
            "password": "s3cret-pass"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let dana = body["user"]["id"].as_i64().unwrap();
    let (_, token) = register(&app, "eve").await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/accounts/users/{dana}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "dana");
    assert_eq!(body["followers_count"], 0);
    assert!(body.get("email").is_none());
}

#[tokio::test]
async fn missing_or_unknown_tokens_are_unauthorized() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/accounts/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/accounts/profile",
        Some("0000000000000000000000000000000000000000"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Anonymous reads still reject a bad token.
    let (status, _) = send(&app, Method::GET, "/api/blog/posts", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn validation_errors_name_the_field() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/accounts/register",
        None,
        Some(json!({"username": "bad name!", "password": "s3cret-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "username");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/accounts/register",
        None,
        Some(json!({"username": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follow_and_like_produce_notifications() {
    let app = app();
    let (alice, alice_token) = register(&app, "alice").await;
    let (bob, bob_token) = register(&app, "bob").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/accounts/follow/{alice}"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Now following alice.");

    let (status, post) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&alice_token),
        Some(json!({"title": "Hello", "content": "First post"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = post["id"].as_i64().unwrap();
    assert_eq!(post["author"]["id"], alice);

    let like_uri = format!("/api/posts/{post_id}/like");
    let (status, body) = send(&app, Method::POST, &like_uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["likes_count"], 1);
    let (status, body) = send(&app, Method::POST, &like_uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);
    assert_eq!(body["likes_count"], 1);

    let (status, feed) = send(&app, Method::GET, "/api/feed", Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed["count"], 1);
    assert_eq!(feed["results"][0]["id"], post_id);

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/notifications/unread-count",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(body["unread"], 2);

    let (_, inbox) = send(
        &app,
        Method::GET,
        "/api/notifications?unread=true",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(inbox["count"], 2);
    assert_eq!(inbox["results"][0]["actor"]["id"], bob);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/notifications/read-all",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 2);

    let (_, body) = send(
        &app,
        Method::POST,
        &format!("/api/posts/{post_id}/unlike"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(body["removed"], true);
    assert_eq!(body["likes_count"], 0);
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
    let app = app();
    let (_, alice_token) = register(&app, "alice").await;
    let (_, bob_token) = register(&app, "bob").await;

    let (_, post) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&alice_token),
        Some(json!({"title": "Mine", "content": "Hands off"})),
    )
    .await;
    let uri = format!("/api/posts/{}", post["id"]);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&bob_token),
        Some(json!({"title": "Stolen"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_are_listed_per_post() {
    let app = app();
    let (_, alice_token) = register(&app, "alice").await;
    let (_, bob_token) = register(&app, "bob").await;
    let (_, post) = send(
        &app,
        Method::POST,
        "/api/posts",
        Some(&alice_token),
        Some(json!({"title": "Talk", "content": "Say something"})),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    let (status, comment) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(&bob_token),
        Some(json!({"post": post_id, "content": "  nice  "})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["content"], "nice");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/comments",
        Some(&bob_token),
        Some(json!({"post": 9999, "content": "lost"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "post");

    let (_, listing) = send(
        &app,
        Method::GET,
        &format!("/api/comments?post={post_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(listing["count"], 1);

    let (_, post) = send(
        &app,
        Method::GET,
        &format!("/api/posts/{post_id}"),
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(post["comments_count"], 1);
}

#[tokio::test]
async fn library_reads_are_public_and_writes_need_staff() {
    let app = app();
    let (_, user_token) = register(&app, "reader").await;
    let staff = staff_token(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/authors",
        Some(&user_token),
        Some(json!({"name": "George Orwell"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, author) = send(
        &app,
        Method::POST,
        "/api/authors",
        Some(&staff),
        Some(json!({"name": "George Orwell"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let author_id = author["id"].as_i64().unwrap();

    let book = json!({"title": "1984", "publication_year": 1949, "author_id": author_id});
    let (status, created) = send(&app, Method::POST, "/api/books", Some(&staff), Some(book.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, "/api/books", Some(&staff), Some(book)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/books",
        Some(&staff),
        Some(json!({"title": "Later", "publication_year": 9999, "author_id": author_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "publication_year");

    let (status, listing) = send(&app, Method::GET, "/api/books?search=orwell", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["results"][0]["id"], created["id"]);

    let (status, body) = send(&app, Method::GET, "/api/books?ordering=price", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "ordering");

    let (_, by_author) = send(
        &app,
        Method::GET,
        "/api/books/by-author?name=george%20orwell",
        None,
        None,
    )
    .await;
    assert_eq!(by_author.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn library_holdings_and_librarian() {
    let app = app();
    let staff = staff_token(&app).await;
    let (_, author) = send(
        &app,
        Method::POST,
        "/api/authors",
        Some(&staff),
        Some(json!({"name": "Ursula K. Le Guin"})),
    )
    .await;
    let (_, book) = send(
        &app,
        Method::POST,
        "/api/books",
        Some(&staff),
        Some(json!({"title": "The Dispossessed", "publication_year": 1974, "author_id": author["id"]})),
    )
    .await;
    let (status, library) = send(
        &app,
        Method::POST,
        "/api/libraries",
        Some(&staff),
        Some(json!({"name": "Central"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let library_id = library["id"].as_i64().unwrap();

    let (status, detail) = send(
        &app,
        Method::POST,
        &format!("/api/libraries/{library_id}/books"),
        Some(&staff),
        Some(json!({"book_id": book["id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["books"][0]["title"], "The Dispossessed");

    let (status, librarian) = send(
        &app,
        Method::PUT,
        &format!("/api/libraries/{library_id}/librarian"),
        Some(&staff),
        Some(json!({"name": "Ada"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(librarian["library_id"], library_id);

    let (_, detail) = send(&app, Method::GET, &format!("/api/libraries/{library_id}"), None, None).await;
    assert_eq!(detail["librarian"]["name"], "Ada");

    let (status, detail) = send(
        &app,
        Method::DELETE,
        &format!("/api/libraries/{library_id}/books/{}", book["id"]),
        Some(&staff),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["books"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn blog_drafts_stay_hidden_until_published() {
    let app = app();
    let (_, alice_token) = register(&app, "alice").await;
    let (_, bob_token) = register(&app, "bob").await;

    let (status, draft) = send(
        &app,
        Method::POST,
        "/api/blog/posts",
        Some(&alice_token),
        Some(json!({
            "title": "Rust Ownership Explained",
            "content": "<p>Borrowing rules in depth</p>",
            "tags": ["Rust", " rust ", "memory"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(draft["slug"], "rust-ownership-explained");
    assert_eq!(draft["status"], "draft");
    assert_eq!(draft["excerpt"], "Borrowing rules in depth");
    assert_eq!(draft["tags"], json!(["memory", "rust"]));
    let uri = format!("/api/blog/posts/{}", draft["id"]);

    let (status, _) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&bob_token),
        Some(json!({"status": "published"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, published) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(&alice_token),
        Some(json!({"status": "published"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published["status"], "published");

    let (_, read) = send(&app, Method::GET, &uri, None, None).await;
    assert_eq!(read["view_count"], 1);

    let (_, listing) = send(&app, Method::GET, "/api/blog/posts?tag=RUST", None, None).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["page_size"], 5);

    let (_, hits) = send(&app, Method::GET, "/api/blog/search?q=borrowing", None, None).await;
    assert_eq!(hits.as_array().map(Vec::len), Some(1));
    let (_, hits) = send(&app, Method::GET, "/api/blog/search?q=", None, None).await;
    assert_eq!(hits, json!([]));

    let (_, stats) = send(&app, Method::GET, "/api/blog/stats", None, None).await;
    assert_eq!(stats["published"], 1);

    let (_, tags) = send(&app, Method::GET, "/api/blog/tags", None, None).await;
    assert_eq!(tags.as_array().map(Vec::len), Some(2));

    let (status, retagged) = send(
        &app,
        Method::PUT,
        &format!("{uri}/tags"),
        Some(&alice_token),
        Some(json!({"tags": ["Ownership"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retagged["tags"], json!(["ownership"]));
}

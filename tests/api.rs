mod support;

use axum::http::StatusCode;
use serde_json::{Value, json};

use support::{TestApp, body_json, body_text, get, json_request};

async fn create_post(app: &TestApp, cookie: &str, body: Value) -> Value {
    let response = app
        .send(json_request("POST", "/api/admin/posts", cookie, body))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

#[tokio::test]
async fn create_then_read_published_post_by_slug() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;

    let post = create_post(
        &app,
        &cookie,
        json!({
            "title": "Hello, World",
            "content": "Some *markdown*.",
            "published": true,
            "tags": ["rust", " rust ", "notes"],
        }),
    )
    .await;
    assert_eq!(post["slug"], "hello-world");
    assert_eq!(post["tags"], json!(["rust", "notes"]));
    assert!(post["content_html"].as_str().unwrap_or_default().contains("<em>markdown</em>"));
    assert!(post["published_at"].is_string());

    let response = app.send(get("/api/posts/hello-world", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], post["id"]);
}

#[tokio::test]
async fn drafts_are_hidden_from_public_reads() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;

    let draft = create_post(
        &app,
        &cookie,
        json!({ "title": "Work in progress", "content": "tbd" }),
    )
    .await;
    assert!(draft["published_at"].is_null());

    let public = app.send(get("/api/posts/work-in-progress", None)).await;
    assert_eq!(public.status(), StatusCode::NOT_FOUND);
    let body = body_json(public).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "not_found");

    let page = app
        .send(get(&format!("/posts/{}", draft["id"].as_str().unwrap_or_default()), None))
        .await;
    assert_eq!(page.status(), StatusCode::NOT_FOUND);

    let admin = app
        .send(get(
            &format!("/api/admin/posts/{}", draft["id"].as_str().unwrap_or_default()),
            Some(&cookie),
        ))
        .await;
    assert_eq!(admin.status(), StatusCode::OK);

    let listing = body_json(app.send(get("/api/posts", None)).await).await;
    assert_eq!(listing["meta"]["total"], 0);
}

#[tokio::test]
async fn listing_reports_page_meta_and_year_groups() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;

    for title in ["First", "Second", "Third"] {
        create_post(
            &app,
            &cookie,
            json!({ "title": title, "content": "body", "published": true }),
        )
        .await;
    }

    let response = app.send(get("/api/posts?page=1&limit=2", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["meta"], json!({ "page": 1, "total_pages": 2, "total": 3 }));
    assert_eq!(body["data"]["posts"].as_array().map(Vec::len), Some(2));

    let years = body["data"]["years"].as_object().cloned().unwrap_or_default();
    assert_eq!(years.len(), 1);
    let grouped: usize = years
        .values()
        .filter_map(Value::as_array)
        .map(Vec::len)
        .sum();
    assert_eq!(grouped, 2);
}

#[tokio::test]
async fn paging_bounds_are_validation_errors() {
    let app = TestApp::new();

    for uri in [
        "/api/posts?page=0",
        "/api/posts?limit=0",
        "/api/posts?limit=101",
        "/api/feed?limit=500",
        "/api/posts/search?q=ab",
    ] {
        let response = app.send(get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_error", "{uri}");
    }
}

#[tokio::test]
async fn search_without_matches_is_an_empty_page() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;
    create_post(
        &app,
        &cookie,
        json!({ "title": "Borrow checker notes", "content": "lifetimes", "published": true }),
    )
    .await;

    let hit = body_json(app.send(get("/api/posts/search?q=borrow", None)).await).await;
    assert_eq!(hit["meta"]["total"], 1);

    let miss = app.send(get("/api/posts/search?q=garbage-collector", None)).await;
    assert_eq!(miss.status(), StatusCode::OK);
    let body = body_json(miss).await;
    assert_eq!(body["data"]["posts"], json!([]));
    assert_eq!(body["meta"]["total"], 0);
    assert_eq!(body["meta"]["total_pages"], 0);
}

#[tokio::test]
async fn explicit_slug_collisions_conflict_and_derived_ones_are_suffixed() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;

    create_post(&app, &cookie, json!({ "title": "Same title", "content": "a" })).await;
    let second = create_post(&app, &cookie, json!({ "title": "Same title", "content": "b" })).await;
    assert_eq!(second["slug"], "same-title-2");

    let response = app
        .send(json_request(
            "POST",
            "/api/admin/posts",
            &cookie,
            json!({ "title": "Other", "content": "c", "slug": "same-title" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "conflict");
}

#[tokio::test]
async fn blank_titles_are_rejected() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;

    let response = app
        .send(json_request(
            "POST",
            "/api/admin/posts",
            &cookie,
            json!({ "title": "   ", "content": "body" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.posts.len().await, 0);
}

#[tokio::test]
async fn feed_entries_carry_window_meta() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;

    for content in ["first note", "second note", "third note"] {
        let response = app
            .send(json_request(
                "POST",
                "/api/admin/feed",
                &cookie,
                json!({ "content": content }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let body = body_json(app.send(get("/api/feed?limit=2&offset=1", None)).await).await;
    assert_eq!(body["meta"], json!({ "limit": 2, "offset": 1, "total": 3 }));
    let entries = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["content"], "second note");
    assert_eq!(entries[0]["author_name"], "ada");

    let id = entries[0]["id"].as_str().unwrap_or_default().to_string();
    let deleted = app
        .send(json_request("DELETE", &format!("/api/admin/feed/{id}"), &cookie, json!(null)))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let again = app
        .send(json_request("DELETE", &format!("/api/admin/feed/{id}"), &cookie, json!(null)))
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn feed_page_lists_entries_escaped() {
    let app = TestApp::new();
    let empty = body_text(app.send(get("/feed", None)).await).await;
    assert!(empty.contains("Nothing here yet."));

    let cookie = app.session_for("ada", true).await;
    let response = app
        .send(json_request(
            "POST",
            "/api/admin/feed",
            &cookie,
            json!({ "content": "<b>soon</b>" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let page = app.send(get("/feed", None)).await;
    assert_eq!(page.status(), StatusCode::OK);
    let html = body_text(page).await;
    assert!(html.contains("&lt;b&gt;soon&lt;&#47;b&gt;"));
    assert!(!html.contains("<b>soon</b>"));
    assert!(html.contains(">ada "));
}

#[tokio::test]
async fn tags_count_only_published_posts() {
    let app = TestApp::new();
    let cookie = app.session_for("ada", true).await;

    create_post(
        &app,
        &cookie,
        json!({ "title": "One", "content": "x", "published": true, "tags": ["rust"] }),
    )
    .await;
    create_post(
        &app,
        &cookie,
        json!({ "title": "Two", "content": "x", "tags": ["rust"] }),
    )
    .await;

    let body = body_json(app.send(get("/api/tags", None)).await).await;
    assert_eq!(body["data"][0]["name"], "rust");
    assert_eq!(body["data"][0]["published_posts"], 1);
}

#[tokio::test]
async fn health_reflects_the_database() {
    let app = TestApp::new();

    let healthy = app.send(get("/health", None)).await;
    assert_eq!(healthy.status(), StatusCode::NO_CONTENT);

    app.health
        .down
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let down = app.send(get("/health", None)).await;
    assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn storage_outages_surface_as_unavailable() {
    let app = TestApp::new();
    app.posts
        .unavailable
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let response = app.send(get("/api/posts", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "service_unavailable");
}

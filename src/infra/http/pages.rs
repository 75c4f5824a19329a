//! Server-rendered HTML pages.
//!
//! Markup is deliberately small. Every interpolated value goes through
//! `ammonia::clean_text` except rendered post bodies, which were sanitised
//! when the post was written.

use std::fmt::Write as _;

use axum::{
    Router,
    extract::{Extension, Path, State},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Cookie;
use uuid::Uuid;

use crate::application::auth::Identity;
use crate::application::error::AppError;
use crate::application::feed::FeedWindow;
use crate::application::pagination::{MAX_PAGE_SIZE, PageRequest};
use crate::application::repos::PostListFilter;
use crate::domain::entities::{FeedEntryRecord, PostRecord};

use super::AppState;
use super::api::handlers::group_by_year;
use super::session::LOGIN_ERROR_COOKIE;

pub fn build_page_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/posts/{id}", get(post_detail))
        .route("/feed", get(feed))
        .route("/about", get(about))
        .route("/login", get(login))
        .route("/admin/hub", get(writer_hub))
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let page = state
        .posts
        .list(PostListFilter::published(), PageRequest::new(1, MAX_PAGE_SIZE))
        .await?;

    let mut body = String::new();
    if page.items.is_empty() {
        body.push_str("<p>Nothing published yet.</p>");
    }
    for (year, posts) in group_by_year(&page.items).iter().rev() {
        let _ = write!(body, "<h2>{year}</h2>");
        push_post_list(&mut body, posts);
    }
    Ok(layout(&state.author.name, &body))
}

async fn post_detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let post = match state.posts.get_by_id(id).await? {
        Some(post) if post.published => post,
        _ => return Err(AppError::NotFound),
    };

    let mut body = String::new();
    let _ = write!(body, "<article><h1>{}</h1>", escape(&post.title));
    if let Some(published_at) = post.published_at {
        let _ = write!(body, "<p><time>{}</time></p>", published_at.date());
    }
    body.push_str(&post.content_html);
    if !post.tags.is_empty() {
        let tags: Vec<String> = post.tags.iter().map(|tag| escape(tag)).collect();
        let _ = write!(body, "<p>Tags: {}</p>", tags.join(", "));
    }
    body.push_str("</article>");
    Ok(layout(&post.title, &body))
}

async fn feed(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let entries = state.feed.list(FeedWindow::default()).await?;

    let mut body = String::from("<h1>Feed</h1>");
    if entries.items.is_empty() {
        body.push_str("<p>Nothing here yet.</p>");
    }
    push_feed_entries(&mut body, &entries.items);
    Ok(layout("Feed", &body))
}

async fn about(State(state): State<AppState>) -> Html<String> {
    let author = &state.author;
    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>{}</h1><p>{}</p>",
        escape(&author.name),
        escape(&author.bio)
    );
    if let Some(github) = &author.github {
        let _ = write!(
            body,
            "<p><a href=\"https://github.com/{0}\">github.com/{0}</a></p>",
            escape(github)
        );
    }
    if let Some(website) = &author.website {
        let _ = write!(body, "<p><a href=\"{0}\">{0}</a></p>", escape(website));
    }
    layout("About", &body)
}

/// Login form. A pending error from the last failed attempt is shown once.
async fn login(jar: PrivateCookieJar) -> Response {
    let flash = jar
        .get(LOGIN_ERROR_COOKIE)
        .map(|cookie| login_error_message(cookie.value()));
    let jar = jar.remove(Cookie::build(LOGIN_ERROR_COOKIE).path("/"));

    let mut body = String::from("<h1>Log in</h1>");
    if let Some(message) = flash {
        let _ = write!(body, "<p role=\"alert\">{message}</p>");
    }
    body.push_str(
        "<form method=\"post\" action=\"/api/login\">\
         <label>Username <input name=\"username\" required></label>\
         <label>Password <input name=\"password\" type=\"password\" required></label>\
         <button type=\"submit\">Log in</button></form>",
    );
    (jar, layout("Log in", &body)).into_response()
}

fn login_error_message(code: &str) -> &'static str {
    match code {
        "too_many_attempts" => "Too many login attempts. Please try again later.",
        _ => "Invalid username or password",
    }
}

/// The signed-in admin's drafts and published posts.
async fn writer_hub(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Html<String>, AppError> {
    let page = PageRequest::new(1, MAX_PAGE_SIZE);
    let author_id = Some(identity.user.id);
    let (drafts, published) = futures::try_join!(
        state.posts.list(
            PostListFilter {
                published: Some(false),
                author_id,
            },
            page,
        ),
        state.posts.list(
            PostListFilter {
                published: Some(true),
                author_id,
            },
            page,
        ),
    )?;

    let mut body = String::new();
    let _ = write!(
        body,
        "<h1>Writer hub</h1><p>Signed in as {}.</p>",
        escape(&identity.user.username)
    );
    let _ = write!(body, "<h2>Drafts ({})</h2>", drafts.total);
    push_post_list(&mut body, &drafts.items);
    let _ = write!(body, "<h2>Published ({})</h2>", published.total);
    push_post_list(&mut body, &published.items);
    body.push_str(
        "<form method=\"post\" action=\"/api/logout\"><button type=\"submit\">Log out</button></form>",
    );
    Ok(layout("Writer hub", &body))
}

fn push_post_list(body: &mut String, posts: &[PostRecord]) {
    body.push_str("<ul>");
    for post in posts {
        let _ = write!(
            body,
            "<li><a href=\"/posts/{}\">{}</a></li>",
            post.id,
            escape(&post.title)
        );
    }
    body.push_str("</ul>");
}

fn push_feed_entries(body: &mut String, entries: &[FeedEntryRecord]) {
    body.push_str("<ul>");
    for entry in entries {
        let _ = write!(
            body,
            "<li><p>{}</p><p><small>{} &middot; <time>{}</time></small></p></li>",
            escape(&entry.content),
            escape(&entry.author_name),
            entry.created_at.date()
        );
    }
    body.push_str("</ul>");
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{}</title></head><body>\
         <nav><a href=\"/\">Posts</a> <a href=\"/feed\">Feed</a> <a href=\"/about\">About</a></nav>\
         <main>{body}</main></body></html>",
        escape(title)
    ))
}

fn escape(text: &str) -> String {
    ammonia::clean_text(text)
}

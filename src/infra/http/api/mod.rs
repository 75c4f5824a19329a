pub mod envelope;
pub mod error;
pub mod handlers;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::infra::http::AppState;

pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/admin/check", get(handlers::admin_check))
        .route("/api/feed", get(handlers::list_feed))
        .route("/api/admin/feed", post(handlers::create_feed_entry))
        .route("/api/admin/feed/{id}", delete(handlers::delete_feed_entry))
        .route("/api/posts", get(handlers::list_posts))
        .route("/api/posts/search", get(handlers::search_posts))
        .route("/api/posts/{slug}", get(handlers::get_post))
        .route("/api/tags", get(handlers::list_tags))
        .route("/api/admin/posts", post(handlers::create_post))
        .route(
            "/api/admin/posts/bulk-delete",
            post(handlers::bulk_delete_posts),
        )
        .route(
            "/api/admin/posts/{id}",
            get(handlers::get_post_by_id)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
}

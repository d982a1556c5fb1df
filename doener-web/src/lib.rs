//! doener-web library: döner review service
//!
//! JSON API over the review store: search with attribute filters, listing
//! pages, review submission, favorites and admin moderation.

use axum::Router;
use doener_common::FileUrlResolver;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod aggregate;
pub mod api;
pub mod search;
pub mod views;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Turns stored file ids into image URLs
    pub files: FileUrlResolver,
}

impl AppState {
    pub fn new(db: SqlitePool, files: FileUrlResolver) -> Self {
        Self { db, files }
    }
}

/// Build application router
///
/// Routes under the identity middleware answer 401 without a known
/// `x-user-id`; admin routes additionally answer 403 for non-admins.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post, put};

    let admin = Router::new()
        .route("/api/admin/restaurants", get(api::admin::list_restaurants))
        .route("/api/admin/restaurants/:id", delete(api::admin::delete_restaurant))
        .route(
            "/api/admin/restaurants/:id/recompute",
            post(api::admin::recompute_restaurant),
        )
        .route("/api/admin/reviews", get(api::admin::list_reviews))
        .route("/api/admin/reviews/:id", delete(api::admin::delete_review))
        .route("/api/admin/recompute", post(api::admin::recompute_all))
        .route_layer(middleware::from_fn(api::require_admin));

    // Signed-in routes
    let protected = Router::new()
        .route("/api/restaurants", post(api::restaurants::create_restaurant))
        .route("/api/restaurants/:id", put(api::restaurants::update_restaurant))
        .route("/api/restaurants/:id/reviews", post(api::restaurants::create_review))
        .route("/api/reviews", post(api::reviews::submit_review))
        .route(
            "/api/reviews/:id",
            put(api::reviews::update_review).delete(api::reviews::delete_review),
        )
        .route("/api/my-reviews", get(api::reviews::my_reviews))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::identity_middleware,
        ));

    // Public routes
    let public = Router::new()
        .route("/api/search", get(api::search::search))
        .route("/api/restaurants/:id", get(api::restaurants::get_restaurant))
        .route("/api/favorites", get(api::favorites::get_favorites))
        .route("/api/place-link", get(api::place_link::parse_link))
        .route("/api/files/*key", get(api::files::file_placeholder))
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

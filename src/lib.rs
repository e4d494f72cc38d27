pub mod analytics;
pub mod auth;
pub mod bookings;
pub mod config;
pub mod errors;
pub mod models;
pub mod permissions;
pub mod prelude;
pub mod reviews;
pub mod schema;

pub mod analytics_routes;
pub mod bookings_routes;
pub mod listings_routes;
pub mod reviews_routes;
pub mod users_routes;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use diesel::PgConnection;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::errors::ApiError;

/// Shared application state: the connection pool plus startup config.
#[derive(Clone)]
pub struct Context {
    pub pool: deadpool_diesel::postgres::Pool,
    pub config: Arc<Config>,
}

impl Context {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let manager = deadpool_diesel::postgres::Manager::new(
            &config.database_url,
            deadpool_diesel::Runtime::Tokio1,
        );
        let pool = deadpool_diesel::postgres::Pool::builder(manager)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build connection pool: {e}"))?;
        Ok(Context {
            pool,
            config: Arc::new(config),
        })
    }

    /// Run a blocking diesel closure on a pooled connection.
    pub async fn db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, ApiError> + Send + 'static,
    {
        let conn = self.pool.get().await?;
        conn.interact(f).await?
    }
}

pub fn app(ctx: Context) -> Router {
    Router::new()
        .route("/api/users/register", post(users_routes::register))
        .route("/api/login", post(users_routes::login))
        .route("/api/logout", post(users_routes::logout))
        .route(
            "/api/users/me",
            get(users_routes::me).patch(users_routes::update_me),
        )
        .route("/api/users", get(users_routes::list_users))
        .route("/api/users/:id", patch(users_routes::admin_update_user))
        .route("/api/listings", get(listings_routes::list_listings))
        .route("/api/listings/:id", get(listings_routes::get_listing))
        .route(
            "/api/my-listings",
            get(listings_routes::my_listings).post(listings_routes::create_listing),
        )
        .route(
            "/api/my-listings/:id",
            get(listings_routes::get_my_listing)
                .patch(listings_routes::update_listing)
                .delete(listings_routes::delete_listing),
        )
        .route(
            "/api/bookings",
            get(bookings_routes::list_bookings).post(bookings_routes::create_booking),
        )
        .route(
            "/api/bookings/:id",
            get(bookings_routes::get_booking).patch(bookings_routes::update_booking),
        )
        .route("/api/bookings/:id/confirm", post(bookings_routes::confirm_booking))
        .route("/api/bookings/:id/reject", post(bookings_routes::reject_booking))
        .route("/api/bookings/:id/cancel", post(bookings_routes::cancel_booking))
        .route(
            "/api/reviews",
            get(reviews_routes::list_reviews).post(reviews_routes::create_review),
        )
        .route(
            "/api/reviews/:id",
            get(reviews_routes::get_review)
                .patch(reviews_routes::update_review)
                .delete(reviews_routes::delete_review),
        )
        .route(
            "/api/analytics/search-history",
            get(analytics_routes::list_search_history).post(analytics_routes::create_search_entry),
        )
        .route(
            "/api/analytics/listing-views",
            get(analytics_routes::list_listing_views).post(analytics_routes::create_listing_view),
        )
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            auth::middleware::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

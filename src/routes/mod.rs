// Route definitions

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::AppState;

mod api;
mod auth;
mod extract;
mod pages;

pub fn create_router(app_state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(app_state.settings.max_upload_bytes());
    let api_router = Router::new()
        .route("/catalog", get(api::get_catalog))
        .route("/search", get(api::search_listings))
        .route("/search/export", get(api::export_search))
        .route("/listings", post(api::create_listing))
        .route("/listings/featured", get(api::get_featured))
        .route("/listings/:id", get(api::get_listing))
        .route("/stats", get(api::get_stats))
        // Routes requiring a session
        .route("/my-listings", get(api::get_my_listings))
        .route("/auth/me", get(auth::current_user))
        .route("/auth/logout", post(auth::logout))
        // Sign-in and sign-up
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route(
            "/auth/register-shop-owner",
            post(auth::register_shop_owner).layer(upload_limit),
        );

    Router::new()
        .route("/", get(pages::home_page))
        .route("/search", get(pages::search_page))
        .route("/sell", get(pages::sell_page))
        .route("/login", get(pages::login_page))
        .route("/listings/:id", get(pages::listing_page))
        .nest("/api", api_router)
        .with_state(app_state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::Body,
        http::{Request, Response},
    };
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use super::create_router;
    use crate::{
        AppState,
        config::{Settings, test_settings},
        mock_backend::MockBackend,
    };

    pub fn router(backend: Arc<MockBackend>) -> axum::Router {
        router_with(test_settings(), backend)
    }

    pub fn router_with(settings: Settings, backend: Arc<MockBackend>) -> axum::Router {
        create_router(AppState::new(Arc::new(settings), backend))
    }

    pub async fn send(router: axum::Router, request: Request<Body>) -> Response<Body> {
        router.oneshot(request).await.unwrap()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}

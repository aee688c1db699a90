// Client for the PhoneFlip REST backend (listings, auth, stats)

use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder, StatusCode,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    config::Settings,
    models::{AuthResponse, CreatedListing, Credentials, Listing, NewListing, PlatformStats, ShopOwnerSignup, User},
    registration::{NormalSignup, ShopOwnerApplication},
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("unexpected backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Everything the web front end asks of the backend.
///
/// Handlers only see this trait so they can be exercised against an
/// in-memory implementation.
#[async_trait]
pub trait MarketplaceBackend: Send + Sync {
    async fn list_listings(&self) -> BackendResult<Vec<Listing>>;

    async fn listings_by_seller(&self, seller_email: &str) -> BackendResult<Vec<Listing>>;

    async fn featured_listings(&self, limit: u32) -> BackendResult<Vec<Listing>>;

    async fn get_listing(&self, id: &str) -> BackendResult<Listing>;

    async fn create_listing(&self, listing: &NewListing) -> BackendResult<CreatedListing>;

    async fn login(&self, credentials: &Credentials) -> BackendResult<AuthResponse>;

    async fn register(&self, signup: &NormalSignup) -> BackendResult<AuthResponse>;

    async fn register_shop_owner(&self, application: &ShopOwnerApplication) -> BackendResult<ShopOwnerSignup>;

    async fn current_user(&self, access_token: &str) -> BackendResult<User>;

    async fn stats(&self) -> BackendResult<PlatformStats>;
}

pub struct BackendClient {
    http: Arc<Client>,
    settings: Arc<Settings>,
}

impl BackendClient {
    pub fn new(http: Arc<Client>, settings: Arc<Settings>) -> Self {
        Self { http, settings }
    }

    fn url(&self, path: &str) -> String {
        self.settings.api_url(path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> BackendResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = extract_detail(&body, status);
            tracing::warn!("[BACKEND] Request failed with {}: {}", status, detail);
            return Err(BackendError::Status { status, detail });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

// The backend reports errors as {"detail": "..."}; validation errors carry a
// list of {"msg": ...} entries instead of a string.
pub fn extract_detail(body: &str, status: StatusCode) -> String {
    let fallback = || format!("Request failed with status {}", status.as_u16());
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };
    match value.get("detail") {
        Some(Value::String(detail)) => detail.clone(),
        Some(Value::Array(entries)) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|e| e.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                fallback()
            } else {
                messages.join("; ")
            }
        }
        _ => fallback(),
    }
}

// One malformed record must not hide the rest of the collection
pub fn decode_listings(records: Vec<Value>) -> Vec<Listing> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Listing>(record) {
            Ok(listing) => Some(listing),
            Err(e) => {
                tracing::warn!("[BACKEND] Skipping malformed listing: {}", e);
                None
            }
        })
        .collect()
}

// Field names follow what the browser sign-up form has always posted
fn shop_owner_form(application: &ShopOwnerApplication) -> BackendResult<Form> {
    let basic = &application.basic;
    let business = &application.business;
    let mut form = Form::new()
        .text("name", basic.name.clone())
        .text("email", basic.email.clone())
        .text("password", basic.password.clone())
        .text("phone", basic.phone.clone())
        .text("city", basic.city.clone())
        .text("businessName", business.business_name.clone())
        .text("businessAddress", business.business_address.clone())
        .text("businessType", business.business_type.clone())
        .text("yearsInBusiness", business.years_in_business.to_string())
        .text("cnicNumber", business.cnic_number.clone());

    for (field, document) in application.documents.fields() {
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(&document.content_type)?;
        form = form.part(field, part);
    }
    Ok(form)
}

#[async_trait]
impl MarketplaceBackend for BackendClient {
    async fn list_listings(&self) -> BackendResult<Vec<Listing>> {
        tracing::debug!("[BACKEND] GET /api/listings");
        let records: Vec<Value> = self.send(self.http.get(self.url("/listings"))).await?;
        let listings = decode_listings(records);
        tracing::info!("[BACKEND] Fetched {} listings.", listings.len());
        Ok(listings)
    }

    async fn listings_by_seller(&self, seller_email: &str) -> BackendResult<Vec<Listing>> {
        tracing::debug!("[BACKEND] GET /api/listings?seller_email={}", seller_email);
        let request = self
            .http
            .get(self.url("/listings"))
            .query(&[("seller_email", seller_email)]);
        Ok(decode_listings(self.send(request).await?))
    }

    async fn featured_listings(&self, limit: u32) -> BackendResult<Vec<Listing>> {
        tracing::debug!("[BACKEND] GET /api/listings/featured?limit={}", limit);
        let request = self
            .http
            .get(self.url("/listings/featured"))
            .query(&[("limit", limit)]);
        Ok(decode_listings(self.send(request).await?))
    }

    async fn get_listing(&self, id: &str) -> BackendResult<Listing> {
        tracing::debug!("[BACKEND] GET /api/listings/{}", id);
        self.send(self.http.get(self.url(&format!("/listings/{}", id)))).await
    }

    async fn create_listing(&self, listing: &NewListing) -> BackendResult<CreatedListing> {
        tracing::info!("[BACKEND] POST /api/listings for {} {}", listing.brand, listing.model);
        let created: CreatedListing = self
            .send(self.http.post(self.url("/listings")).json(listing))
            .await?;
        tracing::info!("[BACKEND] Listing created with id {}", created.listing_id);
        Ok(created)
    }

    async fn login(&self, credentials: &Credentials) -> BackendResult<AuthResponse> {
        tracing::debug!("[BACKEND] POST /api/auth/login for {}", credentials.email);
        self.send(self.http.post(self.url("/auth/login")).json(credentials))
            .await
    }

    async fn register(&self, signup: &NormalSignup) -> BackendResult<AuthResponse> {
        tracing::debug!("[BACKEND] POST /api/auth/register for {}", signup.email);
        self.send(self.http.post(self.url("/auth/register")).json(signup))
            .await
    }

    async fn register_shop_owner(&self, application: &ShopOwnerApplication) -> BackendResult<ShopOwnerSignup> {
        tracing::debug!(
            "[BACKEND] POST /api/auth/register-shop-owner for {}",
            application.basic.email
        );
        let form = shop_owner_form(application)?;
        self.send(
            self.http
                .post(self.url("/auth/register-shop-owner"))
                .multipart(form),
        )
        .await
    }

    async fn current_user(&self, access_token: &str) -> BackendResult<User> {
        tracing::debug!("[BACKEND] GET /api/auth/me");
        self.send(self.http.get(self.url("/auth/me")).bearer_auth(access_token))
            .await
    }

    async fn stats(&self) -> BackendResult<PlatformStats> {
        tracing::debug!("[BACKEND] GET /api/stats");
        self.send(self.http.get(self.url("/stats"))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string_is_passed_through() {
        let detail = extract_detail(r#"{"detail": "Invalid email or password"}"#, StatusCode::UNAUTHORIZED);
        assert_eq!(detail, "Invalid email or password");
    }

    #[test]
    fn validation_detail_list_is_joined() {
        let body = r#"{"detail": [{"loc": ["body", "price"], "msg": "field required"},
                                  {"loc": ["body", "city"], "msg": "field required"}]}"#;
        assert_eq!(
            extract_detail(body, StatusCode::UNPROCESSABLE_ENTITY),
            "field required; field required"
        );
    }

    #[test]
    fn malformed_listings_are_skipped_not_fatal() {
        let records: Vec<Value> = serde_json::from_str(
            r#"[
                {"id": 1, "brand": "Apple", "model": "iPhone 14", "condition": "Like New",
                 "price": 160000, "storage": "128GB", "ram": "6GB", "city": "Lahore"},
                {"id": 2, "brand": "Vivo", "model": "Y36", "condition": "Good",
                 "price": "call me", "storage": "128GB", "ram": "8GB", "city": "Multan"},
                {"id": 3, "brand": "Xiaomi", "model": "Redmi Note 13", "condition": "Good",
                 "price": 55000, "storage": "256GB", "ram": "8GB", "city": "Karachi"}
            ]"#,
        )
        .unwrap();

        let listings = decode_listings(records);
        let ids: Vec<String> = listings.iter().map(|l| l.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(listings[0].condition, "Like New");
    }

    #[test]
    fn non_json_body_falls_back_to_status() {
        assert_eq!(
            extract_detail("<html>Bad Gateway</html>", StatusCode::BAD_GATEWAY),
            "Request failed with status 502"
        );
    }
}

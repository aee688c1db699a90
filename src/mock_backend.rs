//! In-memory [`MarketplaceBackend`] for tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    backend::{BackendError, BackendResult, MarketplaceBackend},
    models::{
        AuthResponse, CreatedListing, Credentials, Listing, ListingId, NamedCount, NewListing, PendingReview,
        PlatformStats, ShopOwnerSignup, User,
    },
    registration::{NormalSignup, ShopOwnerApplication},
};

#[derive(Default)]
pub struct MockBackend {
    listings: Mutex<Vec<Listing>>,
    users: Mutex<HashMap<String, User>>,
    created: Mutex<Vec<NewListing>>,
    shop_applications: Mutex<Vec<ShopOwnerApplication>>,
    fail_listings: AtomicBool,
    list_calls: AtomicUsize,
}

fn status(status: StatusCode, detail: &str) -> BackendError {
    BackendError::Status {
        status,
        detail: detail.to_string(),
    }
}

impl MockBackend {
    pub fn with_listings(listings: Vec<Listing>) -> Self {
        let backend = Self::default();
        *backend.listings.lock().unwrap() = listings;
        backend
    }

    pub fn with_user(self, token: &str, user: User) -> Self {
        self.users.lock().unwrap().insert(token.to_string(), user);
        self
    }

    pub fn fail_listings(&self, fail: bool) {
        self.fail_listings.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<NewListing> {
        self.created.lock().unwrap().clone()
    }

    pub fn shop_applications(&self) -> Vec<ShopOwnerApplication> {
        self.shop_applications.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketplaceBackend for MockBackend {
    async fn list_listings(&self) -> BackendResult<Vec<Listing>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listings.load(Ordering::SeqCst) {
            return Err(status(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch listings"));
        }
        Ok(self.listings.lock().unwrap().clone())
    }

    async fn listings_by_seller(&self, seller_email: &str) -> BackendResult<Vec<Listing>> {
        Ok(self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.seller_email == seller_email)
            .cloned()
            .collect())
    }

    async fn featured_listings(&self, limit: u32) -> BackendResult<Vec<Listing>> {
        let listings = self.listings.lock().unwrap();
        let mut featured: Vec<Listing> = listings.iter().filter(|l| l.is_featured).cloned().collect();
        featured.extend(listings.iter().filter(|l| !l.is_featured).cloned());
        featured.truncate(limit as usize);
        Ok(featured)
    }

    async fn get_listing(&self, id: &str) -> BackendResult<Listing> {
        self.listings
            .lock()
            .unwrap()
            .iter()
            .find(|l| l.id.to_string() == id)
            .cloned()
            .ok_or_else(|| status(StatusCode::NOT_FOUND, "Listing not found"))
    }

    async fn create_listing(&self, listing: &NewListing) -> BackendResult<CreatedListing> {
        let mut created = self.created.lock().unwrap();
        created.push(listing.clone());
        Ok(CreatedListing {
            listing_id: ListingId::Text(format!("new-{}", created.len())),
            message: Some("Listing created successfully!".into()),
        })
    }

    async fn login(&self, credentials: &Credentials) -> BackendResult<AuthResponse> {
        let users = self.users.lock().unwrap();
        users
            .iter()
            .find(|(_, u)| u.email == credentials.email)
            .filter(|_| credentials.password == "Secret#123")
            .map(|(token, user)| AuthResponse {
                access_token: token.clone(),
                user: user.clone(),
            })
            .ok_or_else(|| status(StatusCode::UNAUTHORIZED, "Invalid email or password"))
    }

    async fn register(&self, signup: &NormalSignup) -> BackendResult<AuthResponse> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == signup.email) {
            return Err(status(StatusCode::BAD_REQUEST, "Email already registered"));
        }
        let user = User {
            id: Some(format!("u{}", users.len() + 1)),
            name: signup.name.clone(),
            email: signup.email.clone(),
            phone: Some(signup.phone.clone()),
            city: Some(signup.city.clone()),
            role: Some("normal_user".into()),
        };
        let token = format!("token-{}", users.len() + 1);
        users.insert(token.clone(), user.clone());
        Ok(AuthResponse { access_token: token, user })
    }

    async fn register_shop_owner(&self, application: &ShopOwnerApplication) -> BackendResult<ShopOwnerSignup> {
        self.shop_applications.lock().unwrap().push(application.clone());
        Ok(ShopOwnerSignup::PendingReview(PendingReview {
            message: "Application submitted for review".into(),
            status: Some("pending".into()),
        }))
    }

    async fn current_user(&self, access_token: &str) -> BackendResult<User> {
        self.users
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .ok_or_else(|| status(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
    }

    async fn stats(&self) -> BackendResult<PlatformStats> {
        let listings = self.listings.lock().unwrap();
        let mut brands: Vec<NamedCount> = Vec::new();
        for listing in listings.iter() {
            match brands.iter_mut().find(|b| b.name == listing.brand) {
                Some(entry) => entry.count += 1,
                None => brands.push(NamedCount {
                    name: listing.brand.clone(),
                    count: 1,
                }),
            }
        }
        brands.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(PlatformStats {
            total_listings: listings.len() as u64,
            brands,
            cities: Vec::new(),
        })
    }
}

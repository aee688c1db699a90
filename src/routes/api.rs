// Handlers for the browser-facing JSON API

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use super::extract::{AppJson, AppQuery};
use crate::{
    AppState, catalog,
    error::{AppError, AppResult},
    export,
    listing_form::ListingDraft,
    models::{Listing, ListingId},
    query::{self, FilterCriteria, PriceBucket, SortKey, facet},
    session::{MaybeSession, Session},
};

// --- Response Wrappers ---

#[derive(Serialize)]
struct SearchResponse {
    total: usize,
    active_filters: usize,
    sort: SortKey,
    load_failed: bool,
    listings: Vec<Listing>,
}

#[derive(Serialize)]
struct CreateListingResponse {
    success: bool,
    listing_id: ListingId,
    message: Option<String>,
}

// --- Request Structs ---

/// Query string shared by `/search`, `/api/search` and `/api/search/export`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub brand: Option<String>,
    pub city: Option<String>,
    pub condition: Option<String>,
    pub storage: Option<String>,
    pub ram: Option<String>,
    pub price_range: Option<String>,
    pub sort: Option<String>,
}

impl SearchParams {
    pub fn into_query(self) -> AppResult<(FilterCriteria, SortKey)> {
        let price_range = facet(self.price_range)
            .map(|label| label.parse::<PriceBucket>())
            .transpose()?;
        let sort = facet(self.sort)
            .map(|key| key.parse::<SortKey>())
            .transpose()?
            .unwrap_or_default();
        let criteria = FilterCriteria {
            query: facet(self.q),
            brand: facet(self.brand),
            city: facet(self.city),
            condition: facet(self.condition),
            storage: facet(self.storage),
            ram: facet(self.ram),
            price_range,
        };
        Ok((criteria, sort))
    }
}

#[derive(Deserialize)]
pub struct FeaturedQuery {
    limit: Option<u32>,
}

// Backend ids are ObjectId hex strings or integers
pub(super) fn is_plausible_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// --- API Handlers ---

pub async fn get_catalog() -> impl IntoResponse {
    Json(catalog::catalog())
}

pub async fn search_listings(
    State(app_state): State<AppState>,
    AppQuery(params): AppQuery<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let (criteria, sort) = params.into_query()?;
    tracing::info!("[HANDLER] /api/search - criteria: {:?}, sort: {:?}", criteria, sort);

    let feed = app_state.feed.current().await;
    let result = query::run_query(&feed.listings, &criteria, sort);
    tracing::info!(
        "[HANDLER] /api/search - {} of {} listings match.",
        result.total,
        feed.listings.len()
    );

    Ok(Json(SearchResponse {
        total: result.total,
        active_filters: result.active_filters,
        sort: result.sort,
        load_failed: feed.load_failed,
        listings: result.listings,
    }))
}

pub async fn export_search(
    State(app_state): State<AppState>,
    AppQuery(params): AppQuery<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let (criteria, sort) = params.into_query()?;
    let feed = app_state.feed.current().await;
    let result = query::run_query(&feed.listings, &criteria, sort);

    let csv = export::listings_to_csv(&result.listings)?;
    let file_name = export::export_file_name(chrono::Local::now());
    tracing::info!("[HANDLER] /api/search/export - {} rows as {}", result.total, file_name);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        csv,
    ))
}

pub async fn get_featured(
    State(app_state): State<AppState>,
    AppQuery(query): AppQuery<FeaturedQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = query
        .limit
        .unwrap_or(app_state.settings.featured_limit)
        .clamp(1, 50);
    let listings = app_state.backend.featured_listings(limit).await?;
    Ok(Json(listings))
}

pub async fn get_listing(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !is_plausible_id(&id) {
        return Err(AppError::NotFound("Listing not found".into()));
    }
    let listing = app_state.backend.get_listing(&id).await?;
    Ok(Json(listing))
}

pub async fn create_listing(
    State(app_state): State<AppState>,
    MaybeSession(session): MaybeSession,
    AppJson(mut draft): AppJson<ListingDraft>,
) -> AppResult<impl IntoResponse> {
    // Seller contact defaults to the signed-in user's profile
    if let Some(session) = &session {
        let profile = ListingDraft::for_user(Some(&session.user));
        for (field, fallback) in [
            (&mut draft.seller_name, profile.seller_name),
            (&mut draft.seller_phone, profile.seller_phone),
            (&mut draft.seller_email, profile.seller_email),
        ] {
            if field.trim().is_empty() {
                *field = fallback;
            }
        }
    }

    let listing = draft.validate()?;
    tracing::info!("[HANDLER] POST /api/listings - {} {} at {}", listing.brand, listing.model, listing.price);

    let created = app_state.backend.create_listing(&listing).await?;
    // the next search must include the new listing
    app_state.feed.invalidate().await;

    Ok(Json(CreateListingResponse {
        success: true,
        listing_id: created.listing_id,
        message: created.message,
    }))
}

pub async fn get_my_listings(
    State(app_state): State<AppState>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let email = &session.user.email;
    tracing::info!("[HANDLER] /api/my-listings for {}", email);
    let listings = app_state.backend.listings_by_seller(email).await?;
    Ok(Json(query::apply_sort(&listings, SortKey::Newest)))
}

pub async fn get_stats(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = app_state.backend.stats().await?;
    Ok(Json(stats))
}

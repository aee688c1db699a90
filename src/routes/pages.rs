use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse},
};
use serde::Serialize;

use super::{
    api::{SearchParams, is_plausible_id},
    extract::AppQuery,
};
use crate::{
    AppState, catalog,
    error::{AppError, AppResult},
    models::{Condition, Listing, NamedCount, PlatformStats},
    query::{self, FilterCriteria, PriceBucket, SortKey},
};

/// Display-ready projection of a listing for the card grid.
pub struct ListingCard {
    pub href: String,
    pub title: String,
    pub price: String,
    pub condition: String,
    pub storage: String,
    pub ram: String,
    pub city: String,
    pub views: u64,
    pub posted: String,
}

fn posted_on(listing: &Listing) -> String {
    listing
        .created_at
        .map(|ts| ts.format("%d %b %Y").to_string())
        .unwrap_or_default()
}

impl From<&Listing> for ListingCard {
    fn from(listing: &Listing) -> Self {
        ListingCard {
            href: format!("/listings/{}", listing.id),
            title: format!("{} {}", listing.brand, listing.model),
            price: format_rupees(listing.price),
            condition: listing.condition.clone(),
            storage: listing.storage.clone(),
            ram: listing.ram.clone(),
            city: listing.city.clone(),
            views: listing.views,
            posted: posted_on(listing),
        }
    }
}

pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn options(values: &[&'static str], current: Option<&str>) -> Vec<SelectOption> {
    values
        .iter()
        .map(|&v| SelectOption {
            value: v,
            label: v,
            selected: current == Some(v),
        })
        .collect()
}

/// A label with a link to the search page.
pub struct SearchLink {
    pub label: String,
    pub href: String,
}

// Same parameter names SearchParams reads back
#[derive(Serialize)]
struct SearchQueryString<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    q: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brand: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ram: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    price_range: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort: Option<&'static str>,
}

/// URL of the search page showing `criteria` under `sort`. The default sort
/// is left out.
pub fn search_href(criteria: &FilterCriteria, sort: SortKey) -> AppResult<String> {
    let params = SearchQueryString {
        q: criteria.query.as_deref(),
        brand: criteria.brand.as_deref(),
        city: criteria.city.as_deref(),
        condition: criteria.condition.as_deref(),
        storage: criteria.storage.as_deref(),
        ram: criteria.ram.as_deref(),
        price_range: criteria.price_range.map(PriceBucket::label),
        sort: (sort != SortKey::default()).then(|| sort.as_str()),
    };
    let encoded = serde_urlencoded::to_string(&params)
        .map_err(|e| AppError::InternalServerError(anyhow::Error::new(e).context("Failed to encode search link")))?;
    if encoded.is_empty() {
        Ok("/search".to_string())
    } else {
        Ok(format!("/search?{}", encoded))
    }
}

fn search_link(label: impl Into<String>, criteria: &FilterCriteria) -> AppResult<SearchLink> {
    Ok(SearchLink {
        label: label.into(),
        href: search_href(criteria, SortKey::default())?,
    })
}

fn count_links(
    counts: &[NamedCount],
    criteria: impl Fn(&str) -> FilterCriteria,
) -> AppResult<Vec<SearchLink>> {
    counts
        .iter()
        .map(|c| search_link(format!("{} ({})", c.name, c.count), &criteria(&c.name)))
        .collect()
}

/// `150000` → `₨150,000`
pub fn format_rupees(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("₨{}", grouped)
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    featured: Vec<ListingCard>,
    top_brands: Vec<SearchLink>,
    top_cities: Vec<SearchLink>,
    budgets: Vec<SearchLink>,
    total_listings: u64,
    cities: Vec<SelectOption>,
    price_ranges: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "search.html")]
struct SearchTemplate {
    query: String,
    brands: Vec<SelectOption>,
    cities: Vec<SelectOption>,
    conditions: Vec<SelectOption>,
    storage: Vec<SelectOption>,
    ram: Vec<SelectOption>,
    price_ranges: Vec<SelectOption>,
    sort_options: Vec<SelectOption>,
    active_filters: usize,
    clear_href: String,
    total: usize,
    load_failed: bool,
    results: Vec<ListingCard>,
}

#[derive(Template)]
#[template(path = "listing.html")]
struct ListingTemplate {
    title: String,
    price: String,
    city: String,
    posted: String,
    views: u64,
    description: String,
    features: Vec<String>,
    seller_name: String,
    seller_phone: String,
    specs: Vec<SearchLink>,
    same_model: SearchLink,
    brand_in_city: SearchLink,
}

#[derive(Template)]
#[template(path = "sell.html")]
struct SellTemplate {
    brands: Vec<SelectOption>,
    conditions: Vec<SelectOption>,
    storage: Vec<SelectOption>,
    ram: Vec<SelectOption>,
    cities: Vec<SelectOption>,
    features: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    cities: Vec<SelectOption>,
    business_types: Vec<SelectOption>,
}

fn render<T: Template>(template: T, name: &str) -> AppResult<Html<String>> {
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render {} template: {}", name, e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}

pub async fn home_page(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let (featured, stats) = futures::join!(
        app_state.backend.featured_listings(app_state.settings.featured_limit),
        app_state.backend.stats()
    );
    // The home page still renders when the backend is down
    let featured = featured.unwrap_or_else(|e| {
        tracing::warn!("Featured listings unavailable: {}", e);
        Vec::new()
    });
    let stats = stats.unwrap_or_else(|e| {
        tracing::warn!("Stats unavailable: {}", e);
        PlatformStats::default()
    });

    let budgets = PriceBucket::ALL
        .into_iter()
        .map(|bucket| search_link(bucket.label(), &FilterCriteria::default().with_price_range(bucket)))
        .collect::<AppResult<Vec<_>>>()?;

    render(
        HomeTemplate {
            featured: featured.iter().map(ListingCard::from).collect(),
            top_brands: count_links(&stats.brands, |name| FilterCriteria::default().with_brand(name))?,
            top_cities: count_links(&stats.cities, |name| FilterCriteria::default().with_city(name))?,
            budgets,
            total_listings: stats.total_listings,
            cities: options(&catalog::CITIES, None),
            price_ranges: options(&PriceBucket::ALL.map(PriceBucket::label), None),
        },
        "home",
    )
}

pub async fn search_page(
    State(app_state): State<AppState>,
    AppQuery(params): AppQuery<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let (criteria, sort) = params.into_query()?;
    let feed = app_state.feed.current().await;
    let result = query::run_query(&feed.listings, &criteria, sort);
    let clear_href = search_href(&query::clear_filters(), sort)?;

    let FilterCriteria {
        query,
        brand,
        city,
        condition,
        storage,
        ram,
        price_range,
    } = criteria;

    let sort_options = SortKey::ALL
        .iter()
        .map(|k| SelectOption {
            value: k.as_str(),
            label: k.label(),
            selected: *k == sort,
        })
        .collect();

    render(
        SearchTemplate {
            query: query.unwrap_or_default(),
            brands: options(&catalog::BRANDS, brand.as_deref()),
            cities: options(&catalog::CITIES, city.as_deref()),
            conditions: options(&Condition::ALL.map(Condition::label), condition.as_deref()),
            storage: options(&catalog::STORAGE_OPTIONS, storage.as_deref()),
            ram: options(&catalog::RAM_OPTIONS, ram.as_deref()),
            price_ranges: options(&PriceBucket::ALL.map(PriceBucket::label), price_range.map(PriceBucket::label)),
            sort_options,
            active_filters: result.active_filters,
            clear_href,
            total: result.total,
            load_failed: feed.load_failed,
            results: result.listings.iter().map(ListingCard::from).collect(),
        },
        "search",
    )
}

pub async fn listing_page(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if !is_plausible_id(&id) {
        return Err(AppError::NotFound("Listing not found".into()));
    }
    let listing = app_state.backend.get_listing(&id).await?;
    tracing::info!("[HANDLER] /listings/{} - {} {}", id, listing.brand, listing.model);

    let base = FilterCriteria::default();
    let specs = vec![
        search_link(listing.condition.as_str(), &base.clone().with_condition(listing.condition.as_str()))?,
        search_link(listing.storage.as_str(), &base.clone().with_storage(listing.storage.as_str()))?,
        search_link(format!("{} RAM", listing.ram), &base.clone().with_ram(listing.ram.as_str()))?,
    ];
    let same_model = search_link(
        format!("More {}", listing.model),
        &base.clone().with_query(listing.model.as_str()),
    )?;
    let brand_in_city = search_link(
        format!("{} phones in {}", listing.brand, listing.city),
        &base.with_brand(listing.brand.as_str()).with_city(listing.city.as_str()),
    )?;

    render(
        ListingTemplate {
            title: format!("{} {}", listing.brand, listing.model),
            price: format_rupees(listing.price),
            posted: posted_on(&listing),
            city: listing.city,
            views: listing.views,
            description: listing.description,
            features: listing.features,
            seller_name: listing.seller_name,
            seller_phone: listing.seller_phone,
            specs,
            same_model,
            brand_in_city,
        },
        "listing",
    )
}

// Seller contact is filled in by the page script from the stored token
pub async fn sell_page() -> AppResult<impl IntoResponse> {
    render(
        SellTemplate {
            brands: options(&catalog::BRANDS, None),
            conditions: options(&Condition::ALL.map(Condition::label), None),
            storage: options(&catalog::STORAGE_OPTIONS, None),
            ram: options(&catalog::RAM_OPTIONS, None),
            cities: options(&catalog::CITIES, None),
            features: options(&catalog::COMMON_FEATURES, None),
        },
        "sell",
    )
}

pub async fn login_page() -> AppResult<impl IntoResponse> {
    render(
        LoginTemplate {
            cities: options(&catalog::CITIES, None),
            business_types: options(&catalog::BUSINESS_TYPES, None),
        },
        "login",
    )
}

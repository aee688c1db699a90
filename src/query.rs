//! Listing query engine.
//!
//! Derives the visible, ordered subset of a listing collection from the
//! active filter criteria and sort key. Everything here is a pure function of
//! its inputs: no I/O, no hidden state, and the input collection is never
//! mutated.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::models::Listing;

/// Labeled price interval used by the price-range facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PriceBucket {
    Under50k,
    From50kTo100k,
    From100kTo200k,
    From200kTo300k,
    From300kTo500k,
    Above500k,
}

impl PriceBucket {
    pub const ALL: [PriceBucket; 6] = [
        PriceBucket::Under50k,
        PriceBucket::From50kTo100k,
        PriceBucket::From100kTo200k,
        PriceBucket::From200kTo300k,
        PriceBucket::From300kTo500k,
        PriceBucket::Above500k,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PriceBucket::Under50k => "Under ₨50,000",
            PriceBucket::From50kTo100k => "₨50,000 - ₨100,000",
            PriceBucket::From100kTo200k => "₨100,000 - ₨200,000",
            PriceBucket::From200kTo300k => "₨200,000 - ₨300,000",
            PriceBucket::From300kTo500k => "₨300,000 - ₨500,000",
            PriceBucket::Above500k => "Above ₨500,000",
        }
    }

    /// Lowest bucket is strictly below, highest strictly above, and the
    /// intermediate ranges are inclusive on both ends.
    pub fn contains(self, price: u64) -> bool {
        match self {
            PriceBucket::Under50k => price < 50_000,
            PriceBucket::From50kTo100k => (50_000..=100_000).contains(&price),
            PriceBucket::From100kTo200k => (100_000..=200_000).contains(&price),
            PriceBucket::From200kTo300k => (200_000..=300_000).contains(&price),
            PriceBucket::From300kTo500k => (300_000..=500_000).contains(&price),
            PriceBucket::Above500k => price > 500_000,
        }
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryParseError {
    #[error("unknown price range '{0}'")]
    PriceRange(String),
    #[error("unknown sort key '{0}'")]
    SortKey(String),
}

impl FromStr for PriceBucket {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriceBucket::ALL
            .into_iter()
            .find(|b| b.label() == s)
            .ok_or_else(|| QueryParseError::PriceRange(s.to_string()))
    }
}

impl TryFrom<String> for PriceBucket {
    type Error = QueryParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PriceBucket> for String {
    fn from(bucket: PriceBucket) -> Self {
        bucket.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    PriceLow,
    PriceHigh,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [SortKey::Newest, SortKey::Oldest, SortKey::PriceLow, SortKey::PriceHigh];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::PriceLow => "price_low",
            SortKey::PriceHigh => "price_high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Newest => "Newest First",
            SortKey::Oldest => "Oldest First",
            SortKey::PriceLow => "Price: Low to High",
            SortKey::PriceHigh => "Price: High to Low",
        }
    }
}

impl FromStr for SortKey {
    type Err = QueryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| QueryParseError::SortKey(s.to_string()))
    }
}

/// One optional constraint per facet. `None` (or an empty string) means the
/// facet does not restrict anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub query: Option<String>,
    pub brand: Option<String>,
    pub city: Option<String>,
    pub condition: Option<String>,
    pub storage: Option<String>,
    pub ram: Option<String>,
    pub price_range: Option<PriceBucket>,
}

// An empty form field counts as "no constraint". Whitespace is a value.
pub fn facet(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl FilterCriteria {
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = facet(Some(query.into()));
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = facet(Some(brand.into()));
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = facet(Some(city.into()));
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = facet(Some(condition.into()));
        self
    }

    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = facet(Some(storage.into()));
        self
    }

    pub fn with_ram(mut self, ram: impl Into<String>) -> Self {
        self.ram = facet(Some(ram.into()));
        self
    }

    pub fn with_price_range(mut self, bucket: PriceBucket) -> Self {
        self.price_range = Some(bucket);
        self
    }

    /// Free text matches brand or model, case-insensitively. Categorical
    /// facets compare exactly, case included.
    pub fn matches(&self, listing: &Listing) -> bool {
        if let Some(query) = active(&self.query) {
            let needle = query.to_lowercase();
            let hit = listing.brand.to_lowercase().contains(&needle)
                || listing.model.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        let exact = [
            (active(&self.brand), listing.brand.as_str()),
            (active(&self.city), listing.city.as_str()),
            (active(&self.condition), listing.condition.as_str()),
            (active(&self.storage), listing.storage.as_str()),
            (active(&self.ram), listing.ram.as_str()),
        ];
        if exact
            .iter()
            .any(|(wanted, actual)| matches!(wanted, Some(w) if w != actual))
        {
            return false;
        }

        self.price_range
            .map_or(true, |bucket| bucket.contains(listing.price))
    }
}

pub fn apply_filters(listings: &[Listing], criteria: &FilterCriteria) -> Vec<Listing> {
    listings
        .iter()
        .filter(|listing| criteria.matches(listing))
        .cloned()
        .collect()
}

/// Stable: listings that compare equal keep their input order. A listing
/// without a timestamp counts as the oldest.
pub fn apply_sort(listings: &[Listing], sort_key: SortKey) -> Vec<Listing> {
    let mut sorted = listings.to_vec();
    match sort_key {
        SortKey::Newest => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::Oldest => sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortKey::PriceLow => sorted.sort_by(|a, b| a.price.cmp(&b.price)),
        SortKey::PriceHigh => sorted.sort_by(|a, b| b.price.cmp(&a.price)),
    }
    sorted
}

pub fn count_active_filters(criteria: &FilterCriteria) -> usize {
    [
        active(&criteria.query).is_some(),
        active(&criteria.brand).is_some(),
        active(&criteria.city).is_some(),
        active(&criteria.condition).is_some(),
        active(&criteria.storage).is_some(),
        active(&criteria.ram).is_some(),
        criteria.price_range.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count()
}

pub fn clear_filters() -> FilterCriteria {
    FilterCriteria::default()
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub total: usize,
    pub active_filters: usize,
    pub sort: SortKey,
    pub listings: Vec<Listing>,
}

pub fn run_query(listings: &[Listing], criteria: &FilterCriteria, sort_key: SortKey) -> QueryResult {
    let filtered = apply_filters(listings, criteria);
    let sorted = apply_sort(&filtered, sort_key);
    QueryResult {
        total: sorted.len(),
        active_filters: count_active_filters(criteria),
        sort: sort_key,
        listings: sorted,
    }
}

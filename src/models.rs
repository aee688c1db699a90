// Wire types shared with the PhoneFlip backend and the browser

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

// Backend ids arrive either as Mongo ObjectId strings or as plain integers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListingId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingId::Number(n) => write!(f, "{}", n),
            ListingId::Text(s) => f.write_str(s),
        }
    }
}

/// Physical condition grade of a phone, serialized with its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::Excellent,
        Condition::VeryGood,
        Condition::Good,
        Condition::Fair,
        Condition::Poor,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Condition::Excellent => "Excellent",
            Condition::VeryGood => "Very Good",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
            Condition::Poor => "Poor",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition '{0}'")]
pub struct UnknownCondition(pub String);

// Exact, case-sensitive match on the display label
impl FromStr for Condition {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| UnknownCondition(s.to_string()))
    }
}

fn default_true() -> bool {
    true
}

/// One phone-for-sale advertisement as returned by `GET /api/listings`.
///
/// Listings are created by the backend and only ever read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(alias = "_id")]
    pub id: ListingId,
    pub brand: String,
    pub model: String,
    // Free-form on the backend; older listings carry grades outside `Condition`
    pub condition: String,
    pub storage: String,
    pub ram: String,
    pub city: String,
    pub price: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub seller_name: String,
    #[serde(default)]
    pub seller_phone: String,
    #[serde(default)]
    pub seller_email: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Parses RFC 3339 timestamps as well as the backend's naive ISO form
/// (`2024-05-01T10:15:30.123456`), which is UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s))),
    }
}

// Body of POST /api/listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub brand: String,
    pub model: String,
    pub condition: Condition,
    pub price: u64,
    pub storage: String,
    pub ram: String,
    pub city: String,
    pub description: String,
    pub seller_name: String,
    pub seller_phone: String,
    pub seller_email: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedListing {
    pub listing_id: ListingId,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: User,
}

// Shop owner accounts may be held for KYC review instead of being signed in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReview {
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShopOwnerSignup {
    SignedIn(AuthResponse),
    PendingReview(PendingReview),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCount {
    pub name: String,
    pub count: u64,
}

// GET /api/stats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformStats {
    #[serde(default)]
    pub total_listings: u64,
    #[serde(default)]
    pub brands: Vec<NamedCount>,
    #[serde(default)]
    pub cities: Vec<NamedCount>,
}

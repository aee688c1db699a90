// Fixed option lists offered by the search filters, the sell form and sign-up

use serde::Serialize;

use crate::{models::Condition, query::PriceBucket};

pub const BRANDS: [&str; 10] = [
    "Apple", "Samsung", "Xiaomi", "Oppo", "Vivo", "Realme", "OnePlus", "Huawei", "Nothing", "Google",
];

pub const STORAGE_OPTIONS: [&str; 6] = ["32GB", "64GB", "128GB", "256GB", "512GB", "1TB"];

pub const RAM_OPTIONS: [&str; 7] = ["3GB", "4GB", "6GB", "8GB", "12GB", "16GB", "18GB"];

pub const CITIES: [&str; 8] = [
    "Karachi", "Lahore", "Islamabad", "Rawalpindi", "Faisalabad", "Multan", "Peshawar", "Quetta",
];

pub const BUSINESS_TYPES: [&str; 5] = [
    "Mobile Phone Shop",
    "Electronics Store",
    "Repair Center",
    "Distributor",
    "Other",
];

pub const COMMON_FEATURES: [&str; 12] = [
    "Face ID",
    "Fingerprint Scanner",
    "Wireless Charging",
    "Fast Charging",
    "Dual SIM",
    "NFC",
    "Water Resistant",
    "Headphone Jack",
    "Expandable Storage",
    "Dual Camera",
    "Triple Camera",
    "Quad Camera",
];

pub fn is_supported_city(city: &str) -> bool {
    CITIES.contains(&city)
}

/// Everything the browser needs to populate its select boxes.
#[derive(Debug, Serialize)]
pub struct Catalog {
    pub brands: &'static [&'static str],
    pub conditions: Vec<&'static str>,
    pub storage: &'static [&'static str],
    pub ram: &'static [&'static str],
    pub cities: &'static [&'static str],
    pub price_ranges: Vec<&'static str>,
    pub business_types: &'static [&'static str],
    pub features: &'static [&'static str],
}

pub fn catalog() -> Catalog {
    Catalog {
        brands: &BRANDS,
        conditions: Condition::ALL.iter().map(|c| c.label()).collect(),
        storage: &STORAGE_OPTIONS,
        ram: &RAM_OPTIONS,
        cities: &CITIES,
        price_ranges: PriceBucket::ALL.iter().map(|b| b.label()).collect(),
        business_types: &BUSINESS_TYPES,
        features: &COMMON_FEATURES,
    }
}

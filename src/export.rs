// CSV rendering of a result view

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::Listing;

#[derive(Serialize)]
struct CsvRow<'a> {
    id: String,
    brand: &'a str,
    model: &'a str,
    condition: &'a str,
    storage: &'a str,
    ram: &'a str,
    city: &'a str,
    price: u64,
    views: u64,
    created_at: String,
    seller_name: &'a str,
    seller_phone: &'a str,
}

impl<'a> From<&'a Listing> for CsvRow<'a> {
    fn from(listing: &'a Listing) -> Self {
        CsvRow {
            id: listing.id.to_string(),
            brand: &listing.brand,
            model: &listing.model,
            condition: &listing.condition,
            storage: &listing.storage,
            ram: &listing.ram,
            city: &listing.city,
            price: listing.price,
            views: listing.views,
            created_at: listing
                .created_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
            seller_name: &listing.seller_name,
            seller_phone: &listing.seller_phone,
        }
    }
}

/// Writes the listings in the order given, header row first.
pub fn listings_to_csv(listings: &[Listing]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if listings.is_empty() {
        // serde only emits the header alongside the first record
        writer.write_record([
            "id", "brand", "model", "condition", "storage", "ram", "city", "price", "views", "created_at",
            "seller_name", "seller_phone",
        ])?;
    }
    for listing in listings {
        writer
            .serialize(CsvRow::from(listing))
            .with_context(|| format!("Failed to write listing {} to CSV", listing.id))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))
}

pub fn export_file_name(now: chrono::DateTime<chrono::Local>) -> String {
    format!("phoneflip_listings_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

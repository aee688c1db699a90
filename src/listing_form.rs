// Sell-a-phone form: typed draft, feature toggling and submit-time validation

use serde::{Deserialize, Serialize};

use crate::models::{Condition, NewListing, User};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Please enter a valid price")]
    InvalidPrice,
    #[error("Unknown condition '{0}'")]
    UnknownCondition(String),
}

/// What the user has typed so far. Every field is kept as entered until
/// `validate` turns the draft into a [`NewListing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingDraft {
    pub brand: String,
    pub model: String,
    pub condition: String,
    pub price: String,
    pub storage: String,
    pub ram: String,
    pub city: String,
    pub description: String,
    pub seller_name: String,
    pub seller_phone: String,
    pub seller_email: String,
    pub features: Vec<String>,
}

impl ListingDraft {
    pub fn for_user(user: Option<&User>) -> Self {
        let mut draft = ListingDraft::default();
        if let Some(user) = user {
            draft.seller_name = user.name.clone();
            draft.seller_phone = user.phone.clone().unwrap_or_default();
            draft.seller_email = user.email.clone();
        }
        draft
    }

    pub fn validate(&self) -> Result<NewListing, FormError> {
        let required = [
            ("Brand", &self.brand),
            ("Model", &self.model),
            ("Condition", &self.condition),
            ("Price", &self.price),
            ("Storage", &self.storage),
            ("Ram", &self.ram),
            ("City", &self.city),
            ("Description", &self.description),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(FormError::Required(*field));
        }

        let price = self
            .price
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or(FormError::InvalidPrice)?;
        let condition: Condition = self
            .condition
            .parse()
            .map_err(|_| FormError::UnknownCondition(self.condition.clone()))?;

        // duplicates carry no meaning
        let mut features: Vec<String> = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            if !features.contains(feature) {
                features.push(feature.clone());
            }
        }

        Ok(NewListing {
            brand: self.brand.trim().to_string(),
            model: self.model.trim().to_string(),
            condition,
            price,
            storage: self.storage.clone(),
            ram: self.ram.clone(),
            city: self.city.clone(),
            description: self.description.trim().to_string(),
            seller_name: self.seller_name.trim().to_string(),
            seller_phone: self.seller_phone.trim().to_string(),
            seller_email: self.seller_email.trim().to_string(),
            features,
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filters::{ListingType, PropertyType, RENT_PRICE_CEILING, SALE_PRICE_CEILING};

pub const MAX_TITLE_LEN: usize = 160;
pub const MAX_BEDROOMS: u32 = 20;
pub const MAX_BATHROOMS: u32 = 20;
pub const MAX_AREA_SQFT: u32 = 1_000_000;

/// Price fields keyed by listing type. A rent listing carries a monthly
/// rent and nothing else; a sale listing carries a sale price and
/// nothing else. The tag flattens into the listing as `listingType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "listingType", rename_all = "snake_case")]
pub enum ListingKind {
    #[serde(rename_all = "camelCase")]
    Rent { monthly_rent: u64 },
    #[serde(rename_all = "camelCase")]
    Sale { sale_price: u64 },
}

impl ListingKind {
    pub fn listing_type(&self) -> ListingType {
        match self {
            ListingKind::Rent { .. } => ListingType::Rent,
            ListingKind::Sale { .. } => ListingType::Sale,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            ListingKind::Rent { monthly_rent } => *monthly_rent,
            ListingKind::Sale { sale_price } => *sale_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub city: String,
    pub address: Option<String>,
    pub contact_phone: Option<String>,
    pub property_type: PropertyType,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area_sqft: Option<u32>,
    pub cover_image_url: Option<String>,
    #[serde(flatten)]
    pub kind: ListingKind,
    pub verified: bool,
    pub featured: bool,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-supplied listing body for create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub city: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    pub property_type: PropertyType,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default)]
    pub area_sqft: Option<u32>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(flatten)]
    pub kind: ListingKind,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub featured: bool,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ListingError {
    #[error("title must be between 3 and {} characters", MAX_TITLE_LEN)]
    TitleLength,
    #[error("city must not be empty")]
    CityMissing,
    #[error("bedrooms may not exceed {}", MAX_BEDROOMS)]
    TooManyBedrooms,
    #[error("bathrooms may not exceed {}", MAX_BATHROOMS)]
    TooManyBathrooms,
    #[error("monthly rent must be between 1 and {}", RENT_PRICE_CEILING)]
    RentOutOfRange,
    #[error("sale price must be between 1 and {}", SALE_PRICE_CEILING)]
    SalePriceOutOfRange,
    #[error("area may not exceed {} square feet", MAX_AREA_SQFT)]
    AreaOutOfRange,
}

impl ListingPayload {
    pub fn validate(&self) -> Result<(), ListingError> {
        let title_len = self.title.trim().chars().count();
        if !(3..=MAX_TITLE_LEN).contains(&title_len) {
            return Err(ListingError::TitleLength);
        }
        if self.city.trim().is_empty() {
            return Err(ListingError::CityMissing);
        }
        if self.bedrooms > MAX_BEDROOMS {
            return Err(ListingError::TooManyBedrooms);
        }
        if self.bathrooms > MAX_BATHROOMS {
            return Err(ListingError::TooManyBathrooms);
        }
        match self.kind {
            ListingKind::Rent { monthly_rent } => {
                if !(1..=RENT_PRICE_CEILING).contains(&monthly_rent) {
                    return Err(ListingError::RentOutOfRange);
                }
            }
            ListingKind::Sale { sale_price } => {
                if !(1..=SALE_PRICE_CEILING).contains(&sale_price) {
                    return Err(ListingError::SalePriceOutOfRange);
                }
            }
        }
        if let Some(area) = self.area_sqft {
            if area > MAX_AREA_SQFT {
                return Err(ListingError::AreaOutOfRange);
            }
        }
        Ok(())
    }
}

/// One page of search results plus the pagination bookkeeping every
/// list endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub properties: Vec<Listing>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl ListingPage {
    pub fn new(properties: Vec<Listing>, total: u64, page: u32, limit: u32) -> ListingPage {
        let limit = limit.max(1) as u64;
        let total_pages = (total.div_ceil(limit)) as u32;
        ListingPage {
            properties,
            total,
            page,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    pub fn empty(page: u32, limit: u32) -> ListingPage {
        ListingPage::new(Vec::new(), 0, page, limit)
    }
}

/// City facet row for the city dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCount {
    pub city: String,
    pub count: u64,
}

/// Marketplace-wide counters for the stats endpoint. Averages are
/// absent while the corresponding side of the market is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingStats {
    pub total: u64,
    pub for_rent: u64,
    pub for_sale: u64,
    pub cities: u64,
    pub average_rent: Option<u64>,
    pub average_sale_price: Option<u64>,
}

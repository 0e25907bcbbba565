use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Wire vocabulary: `q, lt, city, pt, beds, min, max, sort, page, limit`.
/// Canonical serialization emits keys in exactly this order.
pub const FILTER_KEYS: [&str; 10] = [
    "q", "lt", "city", "pt", "beds", "min", "max", "sort", "page", "limit",
];

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 60;
pub const MAX_BEDROOMS_FILTER: u32 = 20;

/// Monthly rents and sale prices live in distinct bounded ranges
/// (amounts in the market's base currency unit).
pub const RENT_PRICE_CEILING: u64 = 500_000;
pub const SALE_PRICE_CEILING: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Rent,
    Sale,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Rent => "rent",
            ListingType::Sale => "sale",
        }
    }
}

impl FromStr for ListingType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rent" => Ok(ListingType::Rent),
            "sale" => Ok(ListingType::Sale),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[serde(alias = "flat")]
    Apartment,
    House,
    Room,
    Studio,
    Duplex,
    Office,
    Shop,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Room => "room",
            PropertyType::Studio => "studio",
            PropertyType::Duplex => "duplex",
            PropertyType::Office => "office",
            PropertyType::Shop => "shop",
        }
    }
}

impl FromStr for PropertyType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // "flat" is what half the rental market calls an apartment
            "apartment" | "flat" => Ok(PropertyType::Apartment),
            "house" => Ok(PropertyType::House),
            "room" => Ok(PropertyType::Room),
            "studio" => Ok(PropertyType::Studio),
            "duplex" => Ok(PropertyType::Duplex),
            "office" => Ok(PropertyType::Office),
            "shop" => Ok(PropertyType::Shop),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    Created,
    Price,
    Bedrooms,
    Area,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Created => "created",
            SortKey::Price => "price",
            SortKey::Bedrooms => "beds",
            SortKey::Area => "area",
        }
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SortKey::Created),
            "price" => Ok(SortKey::Price),
            "beds" => Ok(SortKey::Bedrooms),
            "area" => Ok(SortKey::Area),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// Sort field and direction, encoded on the wire as `<key>_<dir>`
/// (e.g. `price_asc`). The default is creation time, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub key: SortKey,
    pub dir: SortDir,
}

impl SortSpec {
    pub fn parse(s: &str) -> Option<SortSpec> {
        let (key, dir) = s.rsplit_once('_')?;
        let key = key.parse().ok()?;
        let dir = match dir {
            "asc" => SortDir::Asc,
            "desc" => SortDir::Desc,
            _ => return None,
        };
        Some(SortSpec { key, dir })
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec {
            key: SortKey::Created,
            dir: SortDir::Desc,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.key.as_str(), self.dir.as_str())
    }
}

/// Inclusive price bounds. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PriceRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl PriceRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Price bounds tagged by listing type so rent-only and sale-only ranges
/// cannot coexist on one filter. The tag always agrees with
/// `FilterState::listing_type`: `min`/`max` are read into the rent band
/// when `lt=rent`, otherwise into the sale band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceBand {
    Rent(PriceRange),
    Sale(PriceRange),
}

impl PriceBand {
    pub fn range(&self) -> &PriceRange {
        match self {
            PriceBand::Rent(r) | PriceBand::Sale(r) => r,
        }
    }
}

/// Normalized search criteria. An absent field means "no constraint";
/// there are no sentinel values. Reconstructed from the URL on every
/// request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub query: Option<String>,
    pub listing_type: Option<ListingType>,
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    pub min_bedrooms: Option<u32>,
    pub price: Option<PriceBand>,
    pub sort: SortSpec,
    pub page: u32,
    pub limit: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        FilterState {
            query: None,
            listing_type: None,
            city: None,
            property_type: None,
            min_bedrooms: None,
            price: None,
            sort: SortSpec::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FilterState {
    /// Normalize a raw query string (without the leading `?`). Percent
    /// escapes and `+` are decoded before the pairs are interpreted.
    pub fn from_query_str(query: &str) -> FilterState {
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// Normalize decoded key/value pairs. Unknown keys are ignored and
    /// malformed values fall back to "unset"; this function never fails.
    /// When the same key repeats, the last occurrence wins.
    pub fn from_pairs<'a, I>(pairs: I) -> FilterState
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = None;
        let mut listing_type = None;
        let mut city = None;
        let mut property_type = None;
        let mut min_bedrooms = None;
        let mut raw_min = None;
        let mut raw_max = None;
        let mut sort = None;
        let mut page = None;
        let mut limit = None;

        for (key, value) in pairs {
            match key {
                "q" => query = non_blank(value),
                "lt" => listing_type = enum_param::<ListingType>(value),
                "city" => city = text_param(value),
                "pt" => property_type = enum_param::<PropertyType>(value),
                "beds" => min_bedrooms = positive_u32(value).map(|n| n.min(MAX_BEDROOMS_FILTER)),
                "min" => raw_min = positive_u64(value),
                "max" => raw_max = positive_u64(value),
                "sort" => sort = SortSpec::parse(value.trim()),
                "page" => page = positive_u32(value),
                "limit" => limit = positive_u32(value),
                _ => {} // unknown keys carry no meaning here
            }
        }

        let price = band_for(listing_type, raw_min, raw_max);

        FilterState {
            query,
            listing_type,
            city,
            property_type,
            min_bedrooms,
            price,
            sort: sort.unwrap_or_default(),
            page: page.unwrap_or(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        }
    }

    /// Canonical key/value pairs: only non-default fields, in the fixed
    /// wire order. Serializing and re-normalizing is the identity.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = &self.query {
            pairs.push(("q", q.clone()));
        }
        if let Some(lt) = self.listing_type {
            pairs.push(("lt", lt.as_str().to_string()));
        }
        if let Some(city) = &self.city {
            pairs.push(("city", city.clone()));
        }
        if let Some(pt) = self.property_type {
            pairs.push(("pt", pt.as_str().to_string()));
        }
        if let Some(beds) = self.min_bedrooms {
            pairs.push(("beds", beds.to_string()));
        }
        if let Some(band) = &self.price {
            let range = band.range();
            if let Some(min) = range.min {
                pairs.push(("min", min.to_string()));
            }
            if let Some(max) = range.max {
                pairs.push(("max", max.to_string()));
            }
        }
        if self.sort != SortSpec::default() {
            pairs.push(("sort", self.sort.to_string()));
        }
        if self.page > 1 {
            pairs.push(("page", self.page.to_string()));
        }
        if self.limit != DEFAULT_PAGE_SIZE {
            pairs.push(("limit", self.limit.to_string()));
        }
        pairs
    }

    /// Canonical query string without the leading `?`; empty when every
    /// field holds its default.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_query_pairs() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }

    /// Deterministic cache key for this filter content.
    pub fn cache_key(&self) -> String {
        self.to_query_string()
    }

    pub fn min_rent(&self) -> Option<u64> {
        match self.price {
            Some(PriceBand::Rent(range)) => range.min,
            _ => None,
        }
    }

    pub fn max_rent(&self) -> Option<u64> {
        match self.price {
            Some(PriceBand::Rent(range)) => range.max,
            _ => None,
        }
    }

    pub fn min_price(&self) -> Option<u64> {
        match self.price {
            Some(PriceBand::Sale(range)) => range.min,
            _ => None,
        }
    }

    pub fn max_price(&self) -> Option<u64> {
        match self.price {
            Some(PriceBand::Sale(range)) => range.max,
            _ => None,
        }
    }

    /// True when the two states differ on anything other than `page`.
    pub fn differs_beyond_page(&self, other: &FilterState) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.page = 1;
        b.page = 1;
        a != b
    }
}

fn band_for(
    listing_type: Option<ListingType>,
    min: Option<u64>,
    max: Option<u64>,
) -> Option<PriceBand> {
    if min.is_none() && max.is_none() {
        return None;
    }
    // Rent and sale bounds live in distinct ranges; out-of-range values
    // clamp to the band ceiling rather than erroring.
    match listing_type {
        Some(ListingType::Rent) => Some(PriceBand::Rent(PriceRange {
            min: min.map(|v| v.min(RENT_PRICE_CEILING)),
            max: max.map(|v| v.min(RENT_PRICE_CEILING)),
        })),
        _ => Some(PriceBand::Sale(PriceRange {
            min: min.map(|v| v.min(SALE_PRICE_CEILING)),
            max: max.map(|v| v.min(SALE_PRICE_CEILING)),
        })),
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Text filters treat the empty string and the literal `all` as the
/// "no constraint" default that UI select controls send.
fn text_param(value: &str) -> Option<String> {
    non_blank(value).filter(|v| !v.eq_ignore_ascii_case("all"))
}

fn enum_param<T: FromStr>(value: &str) -> Option<T> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return None;
    }
    trimmed.parse().ok()
}

fn positive_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

fn positive_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

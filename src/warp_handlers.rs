use serde::Serialize;
use warp::http::StatusCode;
use warp::{reject, Filter, Rejection, Reply};

use crate::auth::require_bearer;
use crate::db::DbPool;
use crate::filter_urls;
use crate::filters::{FilterState, ListingType, PropertyType};
use crate::listing_provider::ProviderError;
use crate::listing_types::{Listing, ListingPage, ListingPayload};
use crate::search_cache::SearchCache;
use crate::warp_helpers::{
    query_string, with_db, with_search_cache, DatabaseError, NotFoundError, UpstreamError,
    ValidationError,
};

/// Echo of the filters a search request resolved to, with price bounds
/// projected into the band the listing type selects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_type: Option<ListingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,
    pub sort: String,
    pub page: u32,
    pub limit: u32,
}

impl From<&FilterState> for AppliedFilters {
    fn from(state: &FilterState) -> Self {
        AppliedFilters {
            query: state.query.clone(),
            listing_type: state.listing_type,
            city: state.city.clone(),
            property_type: state.property_type,
            min_bedrooms: state.min_bedrooms,
            min_rent: state.min_rent(),
            max_rent: state.max_rent(),
            min_price: state.min_price(),
            max_price: state.max_price(),
            sort: state.sort.to_string(),
            page: state.page,
            limit: state.limit,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub self_href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub clear: String,
}

#[derive(Debug, Serialize)]
pub struct SearchPageResponse {
    pub filters: AppliedFilters,
    pub results: ListingPage,
    pub links: PageLinks,
}

fn page_links(state: &FilterState, has_next: bool) -> PageLinks {
    PageLinks {
        self_href: filter_urls::search_href(state),
        prev: (state.page > 1).then(|| filter_urls::page_href(state, state.page - 1)),
        next: has_next.then(|| filter_urls::page_href(state, state.page + 1)),
        clear: filter_urls::clear_href().to_string(),
    }
}

fn reject_provider(err: ProviderError) -> Rejection {
    match err {
        ProviderError::Store(e) => {
            log::error!("Database error: {}", e);
            reject::custom(DatabaseError {
                message: format!("Database error: {}", e),
            })
        }
        other => {
            log::error!("Provider error: {}", other);
            reject::custom(UpstreamError {
                message: other.to_string(),
            })
        }
    }
}

fn reject_db(err: crate::db::StoreError) -> Rejection {
    log::error!("Database error: {}", err);
    reject::custom(DatabaseError {
        message: format!("Database error: {}", err),
    })
}

pub async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn ready_check(db_pool: DbPool) -> Result<impl Reply, Rejection> {
    match db_pool.get() {
        Ok(_) => Ok(warp::reply::json(&serde_json::json!({
            "status": "ready",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))),
        Err(e) => {
            log::error!("Database not ready: {}", e);
            Err(reject::custom(DatabaseError {
                message: format!("Database not ready: {}", e),
            }))
        }
    }
}

pub async fn list_properties(raw_query: String, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let filters = FilterState::from_query_str(&raw_query);
    match Listing::search(&db_pool, &filters) {
        Ok(page) => Ok(warp::reply::json(&page)),
        Err(e) => Err(reject_db(e)),
    }
}

pub async fn get_property(id: i64, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    match Listing::find_by_id(&db_pool, id) {
        Ok(Some(listing)) => Ok(warp::reply::json(&listing)),
        Ok(None) => Err(reject::custom(NotFoundError)),
        Err(e) => Err(reject_db(e)),
    }
}

pub async fn create_property(
    payload: ListingPayload,
    db_pool: DbPool,
    search_cache: SearchCache,
) -> Result<impl Reply, Rejection> {
    if let Err(e) = payload.validate() {
        return Err(reject::custom(ValidationError {
            message: e.to_string(),
        }));
    }
    match Listing::create(&db_pool, &payload) {
        Ok(listing) => {
            search_cache.invalidate_all();
            Ok(warp::reply::with_status(
                warp::reply::json(&listing),
                StatusCode::CREATED,
            ))
        }
        Err(e) => Err(reject_db(e)),
    }
}

pub async fn update_property(
    id: i64,
    payload: ListingPayload,
    db_pool: DbPool,
    search_cache: SearchCache,
) -> Result<impl Reply, Rejection> {
    if let Err(e) = payload.validate() {
        return Err(reject::custom(ValidationError {
            message: e.to_string(),
        }));
    }
    match Listing::update(&db_pool, id, &payload) {
        Ok(Some(listing)) => {
            search_cache.invalidate_all();
            Ok(warp::reply::json(&listing))
        }
        Ok(None) => Err(reject::custom(NotFoundError)),
        Err(e) => Err(reject_db(e)),
    }
}

pub async fn delete_property(
    id: i64,
    db_pool: DbPool,
    search_cache: SearchCache,
) -> Result<impl Reply, Rejection> {
    match Listing::delete(&db_pool, id) {
        Ok(true) => {
            search_cache.invalidate_all();
            Ok(warp::reply::with_status("", StatusCode::NO_CONTENT))
        }
        Ok(false) => Err(reject::custom(NotFoundError)),
        Err(e) => Err(reject_db(e)),
    }
}

pub async fn get_cities(search_cache: SearchCache) -> Result<impl Reply, Rejection> {
    match search_cache.cities().await {
        Ok(cities) => Ok(warp::reply::json(&cities)),
        Err(e) => Err(reject_provider(e)),
    }
}

/// The controller surface: normalize the inbound query string, serve the
/// page through the cache, and hand back canonical navigation links.
pub async fn search_page(
    raw_query: String,
    search_cache: SearchCache,
) -> Result<impl Reply, Rejection> {
    let filters = FilterState::from_query_str(&raw_query);
    let results = match search_cache.search(&filters).await {
        Ok(page) => page,
        Err(e) => return Err(reject_provider(e)),
    };
    let links = page_links(&filters, results.has_next);
    Ok(warp::reply::json(&SearchPageResponse {
        filters: AppliedFilters::from(&filters),
        results,
        links,
    }))
}

pub async fn get_stats(
    db_pool: DbPool,
    search_cache: SearchCache,
) -> Result<impl Reply, Rejection> {
    let (hits, misses, entries) = search_cache.stats();
    match Listing::stats(&db_pool) {
        Ok(stats) => Ok(warp::reply::json(&serde_json::json!({
            "marketplace": stats,
            "cache": {
                "hits": hits,
                "misses": misses,
                "entries": entries,
                "provider": search_cache.provider_tag(),
            }
        }))),
        Err(e) => Err(reject_db(e)),
    }
}

pub fn build_health_routes(
    db_pool: DbPool,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::get())
        .and(with_db(db_pool))
        .and_then(ready_check);

    health.or(ready)
}

pub fn build_property_routes(
    db_pool: DbPool,
    search_cache: SearchCache,
    admin_token_hash: Option<[u8; 32]>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api_properties_list = warp::path("api")
        .and(warp::path("properties"))
        .and(warp::path::end())
        .and(warp::get())
        .and(query_string())
        .and(with_db(db_pool.clone()))
        .and_then(list_properties);

    let api_property_cities = warp::path("api")
        .and(warp::path("properties"))
        .and(warp::path("cities"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_search_cache(search_cache.clone()))
        .and_then(get_cities);

    let api_property_get = warp::path("api")
        .and(warp::path("properties"))
        .and(warp::path::param::<i64>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_property);

    let api_property_create = warp::path("api")
        .and(warp::path("properties"))
        .and(warp::path::end())
        .and(warp::post())
        .and(require_bearer(admin_token_hash))
        .and(warp::body::json::<ListingPayload>())
        .and(with_db(db_pool.clone()))
        .and(with_search_cache(search_cache.clone()))
        .and_then(create_property);

    let api_property_update = warp::path("api")
        .and(warp::path("properties"))
        .and(warp::path::param::<i64>())
        .and(warp::path::end())
        .and(warp::put())
        .and(require_bearer(admin_token_hash))
        .and(warp::body::json::<ListingPayload>())
        .and(with_db(db_pool.clone()))
        .and(with_search_cache(search_cache.clone()))
        .and_then(update_property);

    let api_property_delete = warp::path("api")
        .and(warp::path("properties"))
        .and(warp::path::param::<i64>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(require_bearer(admin_token_hash))
        .and(with_db(db_pool))
        .and(with_search_cache(search_cache))
        .and_then(delete_property);

    api_property_cities
        .or(api_properties_list)
        .or(api_property_get)
        .or(api_property_create)
        .or(api_property_update)
        .or(api_property_delete)
}

pub fn build_search_routes(
    search_cache: SearchCache,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("search")
        .and(warp::path::end())
        .and(warp::get())
        .and(query_string())
        .and(with_search_cache(search_cache))
        .and_then(search_page)
}

pub fn build_stats_routes(
    db_pool: DbPool,
    search_cache: SearchCache,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("api")
        .and(warp::path("stats"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool))
        .and(with_search_cache(search_cache))
        .and_then(get_stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{PriceBand, PriceRange};

    #[test]
    fn applied_filters_project_rent_band() {
        let filters = FilterState::from_query_str("lt=rent&min=10000&max=30000");
        let echo = AppliedFilters::from(&filters);
        assert_eq!(echo.min_rent, Some(10_000));
        assert_eq!(echo.max_rent, Some(30_000));
        assert_eq!(echo.min_price, None);
        assert_eq!(echo.max_price, None);
    }

    #[test]
    fn applied_filters_project_sale_band() {
        let filters = FilterState::from_query_str("lt=sale&min=5000000");
        let echo = AppliedFilters::from(&filters);
        assert_eq!(echo.min_price, Some(5_000_000));
        assert_eq!(echo.min_rent, None);
    }

    #[test]
    fn applied_filters_skip_unset_fields() {
        let echo = AppliedFilters::from(&FilterState::default());
        let value = serde_json::to_value(&echo).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("query"));
        assert!(!object.contains_key("listingType"));
        assert!(!object.contains_key("minRent"));
        assert_eq!(object["sort"], "created_desc");
        assert_eq!(object["page"], 1);
        assert_eq!(object["limit"], 12);
    }

    #[test]
    fn page_links_use_canonical_serialization() {
        let mut filters = FilterState::from_query_str("lt=rent&city=Dhaka&page=2");
        filters.price = Some(PriceBand::Rent(PriceRange {
            min: Some(10_000),
            max: None,
        }));

        let links = page_links(&filters, true);
        assert_eq!(links.self_href, "/search?lt=rent&city=Dhaka&min=10000&page=2");
        assert_eq!(
            links.prev.as_deref(),
            Some("/search?lt=rent&city=Dhaka&min=10000")
        );
        assert_eq!(
            links.next.as_deref(),
            Some("/search?lt=rent&city=Dhaka&min=10000&page=3")
        );
        assert_eq!(links.clear, "/search");
    }

    #[test]
    fn page_links_omit_prev_on_first_page() {
        let filters = FilterState::from_query_str("city=Dhaka");
        let links = page_links(&filters, false);
        assert_eq!(links.prev, None);
        assert_eq!(links.next, None);
        assert_eq!(links.self_href, "/search?city=Dhaka");
    }

    #[test]
    fn link_field_serializes_as_self() {
        let links = page_links(&FilterState::default(), false);
        let value = serde_json::to_value(&links).unwrap();
        assert_eq!(value["self"], "/search");
        assert!(value.get("prev").is_none());
    }
}

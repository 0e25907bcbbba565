use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use homefind::db::{create_db_pool, DbPool};
use homefind::filter_urls::{apply_changes, search_href};
use homefind::filters::{FilterState, ListingType, SortDir, SortKey};
use homefind::listing_provider::StoreListingProvider;
use homefind::listing_types::{Listing, ListingPayload};
use homefind::search_cache::SearchCache;

/// Helper: file backed pool in a temp dir. The dir must outlive the pool.
fn test_pool(dir: &TempDir) -> DbPool {
    let db_path = dir.path().join("homefind.db");
    create_db_pool(db_path.to_str().expect("utf8 temp path")).expect("failed to create pool")
}

fn payload(value: serde_json::Value) -> ListingPayload {
    serde_json::from_value(value).expect("valid listing payload")
}

/// Helper: a small mixed market, mostly Dhaka rentals.
fn seed_market(pool: &DbPool) {
    let listings = [
        serde_json::json!({
            "title": "Lake view flat", "city": "Dhaka", "propertyType": "apartment",
            "bedrooms": 2, "bathrooms": 2, "listingType": "rent", "monthlyRent": 32000
        }),
        serde_json::json!({
            "title": "Family flat in Uttara", "city": "Dhaka", "propertyType": "apartment",
            "bedrooms": 3, "bathrooms": 3, "listingType": "rent", "monthlyRent": 45000
        }),
        serde_json::json!({
            "title": "Sublet room", "city": "Dhaka", "propertyType": "room",
            "bedrooms": 1, "bathrooms": 1, "listingType": "rent", "monthlyRent": 9500
        }),
        serde_json::json!({
            "title": "Banani studio", "city": "Dhaka", "propertyType": "studio",
            "bedrooms": 1, "bathrooms": 1, "listingType": "rent", "monthlyRent": 18000
        }),
        serde_json::json!({
            "title": "Chattogram duplex", "city": "Chattogram", "propertyType": "duplex",
            "bedrooms": 4, "bathrooms": 4, "listingType": "sale", "salePrice": 26000000
        }),
        serde_json::json!({
            "title": "Sylhet corner house", "city": "Sylhet", "propertyType": "house",
            "bedrooms": 3, "bathrooms": 2, "listingType": "sale", "salePrice": 9800000
        }),
    ];
    for value in listings {
        Listing::create(pool, &payload(value)).expect("seed insert");
    }
}

fn cache_over(pool: &DbPool) -> SearchCache {
    let provider = Arc::new(StoreListingProvider::new(pool.clone()));
    SearchCache::new(
        provider,
        Duration::from_secs(60),
        Duration::from_secs(300),
        64,
    )
}

#[tokio::test]
async fn dhaka_rent_walkthrough() {
    let dir = TempDir::new().expect("temp dir");
    let pool = test_pool(&dir);
    seed_market(&pool);
    let cache = cache_over(&pool);

    // Inbound navigation URL resolves to a populated filter state.
    let filters = FilterState::from_query_str("lt=rent&city=Dhaka&beds=2&page=3");
    assert_eq!(filters.listing_type, Some(ListingType::Rent));
    assert_eq!(filters.city.as_deref(), Some("Dhaka"));
    assert_eq!(filters.min_bedrooms, Some(2));
    assert_eq!(filters.page, 3);

    // Two Dhaka rentals have at least two bedrooms; page 3 is past them.
    let page = cache.search(&filters).await.expect("search");
    assert_eq!(page.total, 2);
    assert!(page.properties.is_empty());
    assert!(!page.has_next);
    assert!(page.has_prev);

    // Widening the city resets the page and drops the default value.
    let widened = apply_changes(&filters, &[("city", "all")]);
    assert_eq!(widened.to_query_string(), "lt=rent&beds=2");
    assert_eq!(search_href(&widened), "/search?lt=rent&beds=2");

    let page = cache.search(&widened).await.expect("search");
    assert_eq!(page.total, 2);
    assert_eq!(page.page, 1);
    assert_eq!(page.properties.len(), 2);
}

#[tokio::test]
async fn repeat_queries_are_served_from_cache() {
    let dir = TempDir::new().expect("temp dir");
    let pool = test_pool(&dir);
    seed_market(&pool);
    let cache = cache_over(&pool);

    let filters = FilterState::from_query_str("lt=rent&city=Dhaka");
    let first = cache.search(&filters).await.expect("search");
    let second = cache.search(&filters).await.expect("search");
    assert_eq!(first.total, second.total);

    let (hits, misses, entries) = cache.stats();
    assert_eq!(hits, 1);
    assert_eq!(misses, 1);
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn invalidation_exposes_new_listings_immediately() {
    let dir = TempDir::new().expect("temp dir");
    let pool = test_pool(&dir);
    seed_market(&pool);
    let cache = cache_over(&pool);

    let filters = FilterState::from_query_str("lt=rent&city=Dhaka");
    let before = cache.search(&filters).await.expect("search");
    assert_eq!(before.total, 4);

    Listing::create(
        &pool,
        &payload(serde_json::json!({
            "title": "Gulshan two bed", "city": "Dhaka", "propertyType": "apartment",
            "bedrooms": 2, "bathrooms": 2, "listingType": "rent", "monthlyRent": 60000
        })),
    )
    .expect("create");
    cache.invalidate_all();

    let after = cache.search(&filters).await.expect("search");
    assert_eq!(after.total, 5);
}

#[tokio::test]
async fn envelope_arithmetic_matches_store_contents() {
    let dir = TempDir::new().expect("temp dir");
    let pool = test_pool(&dir);
    seed_market(&pool);
    let cache = cache_over(&pool);

    let filters = FilterState::from_query_str("lt=rent&limit=3&page=2");
    let page = cache.search(&filters).await.expect("search");
    assert_eq!(page.total, 4);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.properties.len(), 1);
    assert!(page.has_prev);
    assert!(!page.has_next);
}

#[tokio::test]
async fn price_sort_orders_across_rent_and_sale() {
    let dir = TempDir::new().expect("temp dir");
    let pool = test_pool(&dir);
    seed_market(&pool);
    let cache = cache_over(&pool);

    let filters = FilterState::from_query_str("sort=price_desc&limit=60");
    assert_eq!(filters.sort.key, SortKey::Price);
    assert_eq!(filters.sort.dir, SortDir::Desc);

    let page = cache.search(&filters).await.expect("search");
    let amounts: Vec<u64> = page.properties.iter().map(|l| l.kind.amount()).collect();
    let mut sorted = amounts.clone();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(amounts, sorted);
    assert_eq!(amounts.first().copied(), Some(26_000_000));
    assert_eq!(amounts.last().copied(), Some(9_500));
}

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Result as SqlResult, Row};

pub use crate::db_pool::{create_db_pool, vacuum_database, DbPool};

use crate::filters::{FilterState, PriceBand, SortDir, SortKey};
use crate::listing_types::{
    CityCount, Listing, ListingKind, ListingPage, ListingPayload, ListingStats,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// Column order must match the listings table definition; every query
// below selects with `SELECT *`.
impl Listing {
    pub fn from_row(row: &Row) -> SqlResult<Self> {
        let listing_type: String = row.get(11)?;
        let kind = match listing_type.as_str() {
            "rent" => ListingKind::Rent {
                monthly_rent: row.get::<_, i64>(12)?.max(0) as u64,
            },
            _ => ListingKind::Sale {
                sale_price: row.get::<_, i64>(13)?.max(0) as u64,
            },
        };

        Ok(Listing {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            city: row.get(3)?,
            address: row.get(4)?,
            contact_phone: row.get(5)?,
            property_type: row
                .get::<_, String>(6)?
                .parse()
                .map_err(|_| column_type_error(6, "property_type"))?,
            bedrooms: row.get::<_, i64>(7)?.max(0) as u32,
            bathrooms: row.get::<_, i64>(8)?.max(0) as u32,
            area_sqft: row.get::<_, Option<i64>>(9)?.map(|a| a.max(0) as u32),
            cover_image_url: row.get(10)?,
            kind,
            verified: row.get(14)?,
            featured: row.get(15)?,
            available: row.get(16)?,
            created_at: parse_timestamp(17, "created_at", row.get::<_, String>(17)?)?,
            updated_at: parse_timestamp(18, "updated_at", row.get::<_, String>(18)?)?,
        })
    }

    pub fn create(pool: &DbPool, payload: &ListingPayload) -> StoreResult<Listing> {
        let conn = pool.get()?;
        let (monthly_rent, sale_price) = price_columns(&payload.kind);
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO listings (
                title, description, city, address, contact_phone, property_type,
                bedrooms, bathrooms, area_sqft, cover_image_url,
                listing_type, monthly_rent, sale_price,
                verified, featured, available, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
            params![
                payload.title.trim(),
                payload.description,
                payload.city.trim(),
                payload.address,
                payload.contact_phone,
                payload.property_type.as_str(),
                payload.bedrooms as i64,
                payload.bathrooms as i64,
                payload.area_sqft.map(|a| a as i64),
                payload.cover_image_url,
                payload.kind.listing_type().as_str(),
                monthly_rent,
                sale_price,
                payload.verified,
                payload.featured,
                payload.available,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        Ok(listing_from_payload(id, payload, now, now))
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> StoreResult<Option<Listing>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare("SELECT * FROM listings WHERE id = ?")?;

        match stmt.query_row([id], Listing::from_row) {
            Ok(listing) => Ok(Some(listing)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Full replace of a listing's client-editable fields. Returns the
    /// updated row, or None when the id does not exist.
    pub fn update(pool: &DbPool, id: i64, payload: &ListingPayload) -> StoreResult<Option<Listing>> {
        let conn = pool.get()?;
        let (monthly_rent, sale_price) = price_columns(&payload.kind);

        let changed = conn.execute(
            r#"
            UPDATE listings SET
                title = ?, description = ?, city = ?, address = ?, contact_phone = ?,
                property_type = ?, bedrooms = ?, bathrooms = ?, area_sqft = ?,
                cover_image_url = ?, listing_type = ?, monthly_rent = ?, sale_price = ?,
                verified = ?, featured = ?, available = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![
                payload.title.trim(),
                payload.description,
                payload.city.trim(),
                payload.address,
                payload.contact_phone,
                payload.property_type.as_str(),
                payload.bedrooms as i64,
                payload.bathrooms as i64,
                payload.area_sqft.map(|a| a as i64),
                payload.cover_image_url,
                payload.kind.listing_type().as_str(),
                monthly_rent,
                sale_price,
                payload.verified,
                payload.featured,
                payload.available,
                Utc::now().to_rfc3339(),
                id,
            ],
        )?;

        if changed == 0 {
            return Ok(None);
        }
        // Hand the connection back before re-reading through the pool.
        drop(conn);
        Listing::find_by_id(pool, id)
    }

    pub fn delete(pool: &DbPool, id: i64) -> StoreResult<bool> {
        let conn = pool.get()?;
        let deleted = conn.execute("DELETE FROM listings WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    /// Runs a normalized filter against the store and returns one page
    /// of available listings plus the total match count.
    pub fn search(pool: &DbPool, filters: &FilterState) -> StoreResult<ListingPage> {
        let conn = pool.get()?;

        // Build the WHERE clause (reusable for both count and data queries)
        let mut where_clause = String::from(" WHERE available = 1");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref q) = filters.query {
            where_clause.push_str(" AND (title LIKE ? OR description LIKE ? OR address LIKE ?)");
            let pattern = format!("%{}%", q);
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        if let Some(lt) = filters.listing_type {
            where_clause.push_str(" AND listing_type = ?");
            params.push(Box::new(lt.as_str()));
        }

        if let Some(ref city) = filters.city {
            where_clause.push_str(" AND city = ? COLLATE NOCASE");
            params.push(Box::new(city.clone()));
        }

        if let Some(pt) = filters.property_type {
            where_clause.push_str(" AND property_type = ?");
            params.push(Box::new(pt.as_str()));
        }

        if let Some(beds) = filters.min_bedrooms {
            where_clause.push_str(" AND bedrooms >= ?");
            params.push(Box::new(beds as i64));
        }

        if let Some(band) = &filters.price {
            let (column, range) = match band {
                PriceBand::Rent(range) => ("monthly_rent", range),
                PriceBand::Sale(range) => ("sale_price", range),
            };
            if let Some(min) = range.min {
                where_clause.push_str(&format!(" AND {} >= ?", column));
                params.push(Box::new(min as i64));
            }
            if let Some(max) = range.max {
                where_clause.push_str(&format!(" AND {} <= ?", column));
                params.push(Box::new(max as i64));
            }
        }

        // Get total count
        let count_sql = format!("SELECT COUNT(*) FROM listings{}", where_clause);
        let mut count_stmt = conn.prepare(&count_sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let total: i64 = count_stmt.query_row(param_refs.as_slice(), |row| row.get(0))?;

        // Get the actual page
        let sort_field = match filters.sort.key {
            SortKey::Created => "created_at",
            SortKey::Price => "COALESCE(monthly_rent, sale_price)",
            SortKey::Bedrooms => "bedrooms",
            SortKey::Area => "area_sqft",
        };
        let sort_order = match filters.sort.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };

        // Secondary id ordering keeps pages stable when the sort key ties.
        let data_sql = format!(
            "SELECT * FROM listings{} ORDER BY {} {}, id DESC LIMIT ? OFFSET ?",
            where_clause, sort_field, sort_order
        );
        let offset = (filters.page as i64 - 1) * filters.limit as i64;
        params.push(Box::new(filters.limit as i64));
        params.push(Box::new(offset));

        let mut stmt = conn.prepare(&data_sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let listing_iter = stmt.query_map(param_refs.as_slice(), Listing::from_row)?;

        let mut listings = Vec::new();
        for listing in listing_iter {
            listings.push(listing?);
        }

        Ok(ListingPage::new(
            listings,
            total.max(0) as u64,
            filters.page,
            filters.limit,
        ))
    }

    pub fn cities(pool: &DbPool) -> StoreResult<Vec<CityCount>> {
        let conn = pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT city, COUNT(*) as count
             FROM listings
             WHERE available = 1
             GROUP BY city
             ORDER BY count DESC, city ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(CityCount {
                city: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
            })
        })?;

        let mut cities = Vec::new();
        for city in rows {
            cities.push(city?);
        }
        Ok(cities)
    }

    pub fn stats(pool: &DbPool) -> StoreResult<ListingStats> {
        let conn = pool.get()?;
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN listing_type = 'rent' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN listing_type = 'sale' THEN 1 ELSE 0 END), 0),
                    COUNT(DISTINCT city),
                    AVG(monthly_rent),
                    AVG(sale_price)
             FROM listings
             WHERE available = 1",
            [],
            |row| {
                Ok(ListingStats {
                    total: row.get::<_, i64>(0)?.max(0) as u64,
                    for_rent: row.get::<_, i64>(1)?.max(0) as u64,
                    for_sale: row.get::<_, i64>(2)?.max(0) as u64,
                    cities: row.get::<_, i64>(3)?.max(0) as u64,
                    average_rent: row.get::<_, Option<f64>>(4)?.map(|v| v.round() as u64),
                    average_sale_price: row.get::<_, Option<f64>>(5)?.map(|v| v.round() as u64),
                })
            },
        )
        .map_err(Into::into)
    }

    pub fn count(pool: &DbPool) -> StoreResult<u64> {
        let conn = pool.get()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(total.max(0) as u64)
    }
}

fn price_columns(kind: &ListingKind) -> (Option<i64>, Option<i64>) {
    match kind {
        ListingKind::Rent { monthly_rent } => (Some(*monthly_rent as i64), None),
        ListingKind::Sale { sale_price } => (None, Some(*sale_price as i64)),
    }
}

fn listing_from_payload(
    id: i64,
    payload: &ListingPayload,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Listing {
    Listing {
        id,
        title: payload.title.trim().to_string(),
        description: payload.description.clone(),
        city: payload.city.trim().to_string(),
        address: payload.address.clone(),
        contact_phone: payload.contact_phone.clone(),
        property_type: payload.property_type,
        bedrooms: payload.bedrooms,
        bathrooms: payload.bathrooms,
        area_sqft: payload.area_sqft,
        cover_image_url: payload.cover_image_url.clone(),
        kind: payload.kind,
        verified: payload.verified,
        featured: payload.featured,
        available: payload.available,
        created_at,
        updated_at,
    }
}

// Stored timestamps are RFC 3339; rows touched by raw SQL may carry
// SQLite's space-separated CURRENT_TIMESTAMP format instead.
fn parse_timestamp(idx: usize, name: &str, value: String) -> SqlResult<DateTime<Utc>> {
    if value.contains('T') {
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| column_type_error(idx, name))
    } else {
        NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S")
            .map(|dt| dt.and_utc())
            .map_err(|_| column_type_error(idx, name))
    }
}

fn column_type_error(idx: usize, name: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
}

#[cfg(test)]
pub fn create_test_db_pool() -> Result<DbPool, Box<dyn std::error::Error>> {
    crate::db_pool::create_in_memory_pool()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::PropertyType;

    fn rent_payload(title: &str, city: &str, bedrooms: u32, monthly_rent: u64) -> ListingPayload {
        ListingPayload {
            title: title.to_string(),
            description: Some(format!("{} in {}", title, city)),
            city: city.to_string(),
            address: None,
            contact_phone: Some("+8801700000000".to_string()),
            property_type: PropertyType::Apartment,
            bedrooms,
            bathrooms: 1,
            area_sqft: Some(900),
            cover_image_url: None,
            kind: ListingKind::Rent { monthly_rent },
            verified: false,
            featured: false,
            available: true,
        }
    }

    fn sale_payload(title: &str, city: &str, bedrooms: u32, sale_price: u64) -> ListingPayload {
        ListingPayload {
            title: title.to_string(),
            description: None,
            city: city.to_string(),
            address: Some("Plot 4, Block B".to_string()),
            contact_phone: None,
            property_type: PropertyType::House,
            bedrooms,
            bathrooms: 2,
            area_sqft: Some(2200),
            cover_image_url: Some("/media/covers/plot-4.jpg".to_string()),
            kind: ListingKind::Sale { sale_price },
            verified: true,
            featured: false,
            available: true,
        }
    }

    fn seeded_pool() -> DbPool {
        let pool = create_test_db_pool().unwrap();
        Listing::create(&pool, &rent_payload("Lake view flat", "Dhaka", 2, 25_000)).unwrap();
        Listing::create(&pool, &rent_payload("Family flat", "Dhaka", 3, 40_000)).unwrap();
        Listing::create(&pool, &rent_payload("Compact studio", "Chattogram", 1, 12_000)).unwrap();
        Listing::create(&pool, &sale_payload("South facing house", "Dhaka", 4, 18_000_000))
            .unwrap();
        Listing::create(&pool, &sale_payload("Corner plot house", "Khulna", 5, 25_000_000))
            .unwrap();
        pool
    }

    #[test]
    fn create_and_find_round_trip() {
        let pool = create_test_db_pool().unwrap();
        let created =
            Listing::create(&pool, &rent_payload("Lake view flat", "Dhaka", 2, 25_000)).unwrap();

        let found = Listing::find_by_id(&pool, created.id).unwrap().unwrap();
        assert_eq!(found.title, "Lake view flat");
        assert_eq!(found.kind, ListingKind::Rent { monthly_rent: 25_000 });
        assert_eq!(found.city, "Dhaka");
        assert_eq!(found.contact_phone.as_deref(), Some("+8801700000000"));
        assert!(!found.verified);
        assert!(found.available);

        assert!(Listing::find_by_id(&pool, 9999).unwrap().is_none());
    }

    #[test]
    fn search_filters_by_city_case_insensitively() {
        let pool = seeded_pool();
        let page = Listing::search(&pool, &FilterState::from_query_str("city=dhaka")).unwrap();
        assert_eq!(page.total, 3);
        assert!(page.properties.iter().all(|l| l.city == "Dhaka"));
    }

    #[test]
    fn search_filters_by_listing_type_and_bedrooms() {
        let pool = seeded_pool();
        let page =
            Listing::search(&pool, &FilterState::from_query_str("lt=rent&beds=2")).unwrap();
        assert_eq!(page.total, 2);
        assert!(page
            .properties
            .iter()
            .all(|l| matches!(l.kind, ListingKind::Rent { .. }) && l.bedrooms >= 2));
    }

    #[test]
    fn rent_band_bounds_apply_to_monthly_rent() {
        let pool = seeded_pool();
        let page = Listing::search(
            &pool,
            &FilterState::from_query_str("lt=rent&min=20000&max=30000"),
        )
        .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.properties[0].title, "Lake view flat");
    }

    #[test]
    fn sale_band_bounds_exclude_rent_listings() {
        let pool = seeded_pool();
        let page = Listing::search(&pool, &FilterState::from_query_str("min=1000000")).unwrap();
        assert_eq!(page.total, 2);
        assert!(page
            .properties
            .iter()
            .all(|l| matches!(l.kind, ListingKind::Sale { .. })));
    }

    #[test]
    fn text_query_matches_title_and_description() {
        let pool = seeded_pool();
        let page = Listing::search(&pool, &FilterState::from_query_str("q=studio")).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.properties[0].title, "Compact studio");
    }

    #[test]
    fn price_sort_orders_across_both_price_columns() {
        let pool = seeded_pool();
        let page = Listing::search(&pool, &FilterState::from_query_str("sort=price_asc")).unwrap();
        let amounts: Vec<u64> = page.properties.iter().map(|l| l.kind.amount()).collect();
        let mut sorted = amounts.clone();
        sorted.sort();
        assert_eq!(amounts, sorted);
        assert_eq!(amounts[0], 12_000);
    }

    #[test]
    fn pagination_slices_and_reports_totals() {
        let pool = seeded_pool();
        let page = Listing::search(&pool, &FilterState::from_query_str("limit=2&page=3")).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.properties.len(), 1);
        assert!(page.has_prev);
        assert!(!page.has_next);

        // Past the end is an empty page, not an error.
        let past = Listing::search(&pool, &FilterState::from_query_str("limit=2&page=9")).unwrap();
        assert_eq!(past.total, 5);
        assert!(past.properties.is_empty());
    }

    #[test]
    fn unavailable_listings_are_hidden_from_search() {
        let pool = seeded_pool();
        let mut delisted = rent_payload("Lake view flat", "Dhaka", 2, 25_000);
        delisted.available = false;
        let created = Listing::create(&pool, &delisted).unwrap();

        let page = Listing::search(&pool, &FilterState::from_query_str("city=Dhaka")).unwrap();
        assert_eq!(page.total, 3);

        // Direct lookup still works for delisted rows.
        assert!(Listing::find_by_id(&pool, created.id).unwrap().is_some());
    }

    #[test]
    fn update_replaces_fields_and_flips_listing_type() {
        let pool = create_test_db_pool().unwrap();
        let created =
            Listing::create(&pool, &rent_payload("Lake view flat", "Dhaka", 2, 25_000)).unwrap();

        let updated = Listing::update(
            &pool,
            created.id,
            &sale_payload("Lake view flat", "Dhaka", 2, 9_500_000),
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.kind, ListingKind::Sale { sale_price: 9_500_000 });
        assert_eq!(updated.created_at, created.created_at);

        assert!(Listing::update(&pool, 9999, &rent_payload("x x x", "Dhaka", 1, 1000))
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_removes_the_row() {
        let pool = create_test_db_pool().unwrap();
        let created =
            Listing::create(&pool, &rent_payload("Lake view flat", "Dhaka", 2, 25_000)).unwrap();

        assert!(Listing::delete(&pool, created.id).unwrap());
        assert!(!Listing::delete(&pool, created.id).unwrap());
        assert!(Listing::find_by_id(&pool, created.id).unwrap().is_none());
    }

    #[test]
    fn cities_facet_counts_available_listings() {
        let pool = seeded_pool();
        let cities = Listing::cities(&pool).unwrap();
        assert_eq!(cities[0].city, "Dhaka");
        assert_eq!(cities[0].count, 3);
        assert_eq!(cities.len(), 3);
    }

    #[test]
    fn stats_summarize_both_market_sides() {
        let pool = seeded_pool();
        let stats = Listing::stats(&pool).unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.for_rent, 3);
        assert_eq!(stats.for_sale, 2);
        assert_eq!(stats.cities, 3);
        assert!(stats.average_rent.is_some());
        assert!(stats.average_sale_price.is_some());

        let empty = create_test_db_pool().unwrap();
        let stats = Listing::stats(&empty).unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_rent, None);
    }
}

use rusqlite::{Connection, Result as SqlResult};

// Schema definitions
pub const LISTINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,

    -- What is being offered
    title TEXT NOT NULL,
    description TEXT,
    city TEXT NOT NULL,
    address TEXT,
    contact_phone TEXT,
    property_type TEXT NOT NULL,
    bedrooms INTEGER NOT NULL DEFAULT 0,
    bathrooms INTEGER NOT NULL DEFAULT 0,
    area_sqft INTEGER,
    cover_image_url TEXT,

    -- Exactly one price column is set, matching listing_type
    listing_type TEXT NOT NULL CHECK(listing_type IN ('rent', 'sale')),
    monthly_rent INTEGER CHECK(monthly_rent IS NULL OR monthly_rent > 0),
    sale_price INTEGER CHECK(sale_price IS NULL OR sale_price > 0),

    -- Lifecycle
    verified BOOLEAN NOT NULL DEFAULT FALSE,
    featured BOOLEAN NOT NULL DEFAULT FALSE,
    available BOOLEAN NOT NULL DEFAULT TRUE,
    created_at DATETIME NOT NULL,
    updated_at DATETIME NOT NULL,

    CHECK(
        (listing_type = 'rent' AND monthly_rent IS NOT NULL AND sale_price IS NULL)
        OR (listing_type = 'sale' AND sale_price IS NOT NULL AND monthly_rent IS NULL)
    )
)
"#;

pub const SCHEMA_SQL: &[&str] = &[
    LISTINGS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_listings_city ON listings(city);",
    "CREATE INDEX IF NOT EXISTS idx_listings_listing_type ON listings(listing_type);",
    "CREATE INDEX IF NOT EXISTS idx_listings_property_type ON listings(property_type);",
    "CREATE INDEX IF NOT EXISTS idx_listings_bedrooms ON listings(bedrooms);",
    "CREATE INDEX IF NOT EXISTS idx_listings_available ON listings(available);",
    "CREATE INDEX IF NOT EXISTS idx_listings_created_at ON listings(created_at);",
];

pub fn initialize_schema(conn: &Connection) -> SqlResult<()> {
    for sql in SCHEMA_SQL {
        conn.execute(sql, [])?;
    }
    Ok(())
}

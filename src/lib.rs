pub mod auth;
pub mod config;
pub mod db;
pub mod db_pool;
pub mod db_schema;
pub mod filter_urls;
pub mod filters;
pub mod listing_provider;
pub mod listing_types;
pub mod scheduler;
pub mod search_cache;
pub mod seed;
pub mod warp_handlers;
pub mod warp_helpers;

use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

use homefind::auth::hash_token;
use homefind::config::Config;
use homefind::db::{create_db_pool, DbPool};
use homefind::listing_provider::{ListingProvider, RemoteListingProvider, StoreListingProvider};
use homefind::scheduler::HousekeepingScheduler;
use homefind::search_cache::SearchCache;
use homefind::seed;
use homefind::warp_handlers::{
    build_health_routes, build_property_routes, build_search_routes, build_stats_routes,
};
use homefind::warp_helpers::{cors, handle_rejection};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env()?;
    let port = config.port;
    let addr: SocketAddr = format!("{}:{}", config.host, port).parse()?;

    info!("Starting HomeFind server on Port {}", port);
    info!("Database: {}", config.db_path);
    match &config.upstream_url {
        Some(url) => info!("Listing provider: remote upstream at {}", url),
        None => info!("Listing provider: local store"),
    }

    // Check if port is available BEFORE initializing services
    if !is_port_available(addr) {
        error!(
            "Port {} is already in use. Please stop any existing HomeFind instances or use a different port.",
            port
        );
        error!(
            "You can check what's using the port with: lsof -i :{}",
            port
        );
        return Err(format!("Port {} is already in use", port).into());
    }

    let (db_pool, search_cache, admin_token_hash) = initialize_services(&config)?;

    let health_routes = build_health_routes(db_pool.clone());
    let property_routes =
        build_property_routes(db_pool.clone(), search_cache.clone(), admin_token_hash);
    let search_routes = build_search_routes(search_cache.clone());
    let stats_routes = build_stats_routes(db_pool, search_cache);

    let routes = health_routes
        .or(property_routes)
        .or(search_routes)
        .or(stats_routes)
        .with(cors())
        .with(warp::log("homefind"))
        .recover(handle_rejection);

    info!(
        "Server started successfully, listening on http://localhost:{}",
        port
    );

    warp::serve(routes).run(addr).await;

    Ok(())
}

fn is_port_available(addr: SocketAddr) -> bool {
    TcpListener::bind(addr).is_ok()
}

type InitServicesResult = (DbPool, SearchCache, Option<[u8; 32]>);

fn initialize_services(config: &Config) -> Result<InitServicesResult, Box<dyn std::error::Error>> {
    let db_pool = create_db_pool(&config.db_path)?;
    info!("Database initialized successfully");

    match seed::seed_if_empty(&db_pool, Path::new(&config.seed_path)) {
        Ok(0) => {}
        Ok(n) => info!("Seeded store with {} listings", n),
        Err(e) => error!("Seed import failed: {:#}", e),
    }

    let provider: Arc<dyn ListingProvider> = match &config.upstream_url {
        Some(url) => Arc::new(RemoteListingProvider::new(url)),
        None => Arc::new(StoreListingProvider::new(db_pool.clone())),
    };

    let search_cache = SearchCache::new(
        provider,
        Duration::from_secs(config.cache.ttl_secs),
        Duration::from_secs(config.cache.retention_secs),
        config.cache.max_entries,
    );
    info!(
        "Search cache initialized ({} entries max, {}s TTL)",
        config.cache.max_entries, config.cache.ttl_secs
    );

    let scheduler = HousekeepingScheduler::new(db_pool.clone(), search_cache.clone());
    let _scheduler_handle = scheduler.start();

    let admin_token_hash = config.admin_token.as_deref().map(hash_token);
    if admin_token_hash.is_none() {
        info!("No admin token configured, mutation endpoints are disabled");
    }

    Ok((db_pool, search_cache, admin_token_hash))
}

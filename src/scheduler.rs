use clokwerk::{Job, Scheduler, TimeUnits};
use log::{error, info};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::db::{vacuum_database, DbPool};
use crate::search_cache::SearchCache;

const SWEEP_INTERVAL_MINUTES: u32 = 5;

/// Background housekeeping: periodic cache sweeps plus a nightly vacuum.
pub struct HousekeepingScheduler {
    db_pool: DbPool,
    search_cache: SearchCache,
}

impl HousekeepingScheduler {
    pub fn new(db_pool: DbPool, search_cache: SearchCache) -> Self {
        Self {
            db_pool,
            search_cache,
        }
    }

    pub fn start(&self) -> JoinHandle<()> {
        let mut scheduler = Scheduler::new();

        let search_cache = self.search_cache.clone();
        scheduler.every(SWEEP_INTERVAL_MINUTES.minutes()).run(move || {
            search_cache.sweep();
        });

        // Vacuum in the quiet hours, after the day's mutations.
        let db_pool = self.db_pool.clone();
        scheduler.every(1.day()).at("00:05").run(move || {
            info!("Starting scheduled database vacuum");
            match vacuum_database(&db_pool) {
                Ok(_) => info!("Database vacuum completed successfully"),
                Err(e) => error!("Database vacuum failed: {}", e),
            }
        });

        let handle = thread::spawn(move || loop {
            scheduler.run_pending();
            thread::sleep(Duration::from_secs(60));
        });

        info!(
            "Housekeeping scheduler started - cache sweep every {} minutes, vacuum at 00:05",
            SWEEP_INTERVAL_MINUTES
        );
        handle
    }
}

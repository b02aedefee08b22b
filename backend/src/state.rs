use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    config::Config,
    db::connection::DbPool,
    services::{booking::BookingService, notifier::Notifier, session::SessionManager},
    utils::time::today_local,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub sessions: SessionManager,
    pub bookings: BookingService,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            sessions: SessionManager::new(pool.clone(), config.clone()),
            bookings: BookingService::new(pool.clone()),
            pool,
            config,
            notifier,
        }
    }

    /// Today's date in the makerspace's time zone.
    pub fn today(&self) -> NaiveDate {
        today_local(&self.config.time_zone)
    }
}

//! Shared application state.
//!
//! Constructed once in `main` and cloned into the router as an `Arc`. The
//! database handle sits behind a `Mutex`: SQLite writes are serialized and
//! every pipeline operation is a short transaction, so a plain lock is the
//! whole concurrency story. Handlers must not hold the lock across an
//! `.await` — gather under the lock, call upstream without it.

use std::sync::Mutex;

use crate::config::Config;
use crate::db::LeadDb;

pub struct AppState {
    pub config: Config,
    pub db: Mutex<LeadDb>,
    /// Shared outbound HTTP client (qualification model + email provider).
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, db: LeadDb) -> Self {
        Self {
            config,
            db: Mutex::new(db),
            http: reqwest::Client::new(),
        }
    }
}

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::activity::{DynActivityRepository, SqliteActivityRepository};
use crate::config::Config;
use crate::email::{DynEmailProvider, ResendProvider};
use crate::voucher::{DynEntitlementGranter, RevenueCatClient};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub activities: DynActivityRepository,
    pub mailer: DynEmailProvider,
    pub entitlements: DynEntitlementGranter,
}

impl AppState {
    /// Wire the production providers from config.
    pub fn new(db: DbPool, config: Config) -> Self {
        let mailer = Arc::new(ResendProvider::new(config.email.clone()));
        let entitlements = Arc::new(RevenueCatClient::new(config.revenuecat.clone()));
        Self {
            activities: Arc::new(SqliteActivityRepository::new(db.clone())),
            db,
            config,
            mailer,
            entitlements,
        }
    }

    pub fn with_mailer(mut self, mailer: DynEmailProvider) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_entitlements(mut self, entitlements: DynEntitlementGranter) -> Self {
        self.entitlements = entitlements;
        self
    }
}

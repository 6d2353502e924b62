//! Use cases behind the HTTP handlers.

mod accounts;
mod catalog;
mod content;
mod relations;

pub use catalog::TRENDING_WINDOW_DAYS;
pub use relations::parse_ids;

use crate::envelope::{PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::errors::{ApiError, Result};
use crate::ledger::{Counter, LedgerPolicy};
use crate::models::{StatisticRecord, User};
use crate::shortener::UrlShortener;
use crate::store::Store;
use crate::verification::SecurityCodes;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub policy: LedgerPolicy,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub public_base_url: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            policy: LedgerPolicy::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            public_base_url: "http://localhost:8090".to_string(),
        }
    }
}

pub struct AdvisoryService {
    store: Arc<dyn Store>,
    codes: SecurityCodes,
    shortener: Arc<dyn UrlShortener>,
    settings: ServiceSettings,
}

impl AdvisoryService {
    pub fn new(
        store: Arc<dyn Store>,
        codes: SecurityCodes,
        shortener: Arc<dyn UrlShortener>,
        settings: ServiceSettings,
    ) -> Self {
        AdvisoryService {
            store,
            codes,
            shortener,
            settings,
        }
    }

    pub fn page(&self, page: Option<u32>, page_size: Option<u32>) -> Result<PageRequest> {
        PageRequest::from_query(
            page,
            page_size,
            self.settings.default_page_size,
            self.settings.max_page_size,
        )
    }

    /// The caller behind a token; a token for a deleted user is rejected.
    async fn acting_user(&self, user_id: i64) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ApiError::Unauthorized)
    }

    pub async fn get_statistic(&self, user_id: i64) -> Result<StatisticRecord> {
        self.store
            .get_statistic(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("statistic".to_string()))
    }

    /// Recounts every counter from its source rows and reports where the
    /// ledger disagrees. Never used on the read path.
    pub async fn audit_statistic(&self, user_id: i64) -> Result<Vec<(Counter, i64, i64)>> {
        let ledger = self.get_statistic(user_id).await?;
        let actual = self.store.recount_statistic(user_id).await?;
        let drift = ledger.drift(&actual);

        for (counter, recorded, counted) in &drift {
            warn!(user_id, counter = counter.column(), recorded, counted, "ledger drift detected");
        }
        Ok(drift)
    }
}

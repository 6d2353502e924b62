//! Persistence seam.
//!
//! Every mutating method runs as one transaction: the row change, guarded by
//! its idempotency check, and the ledger [`Adjustment`](crate::ledger::Adjustment)s
//! it implies commit together or not at all.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::envelope::{Page, PageRequest};
use crate::errors::Result;
use crate::ledger::{ContentRef, Relation};
use crate::models::{
    AdviserBrief, AdviserCard, AdviserInfo, AdviserKpi, Gender, JobApplication, NewPortfolio,
    NewRecommendation, NewUser, NewViewpoint, Portfolio, Recommendation, StatisticRecord, User,
    Viewpoint,
};
use crate::sorting::{AdviserSort, PortfolioSort, RecommendationOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationFilter {
    pub owner: Option<i64>,
    /// Only recommendations created at or after this instant
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewJobApplication {
    pub real_name: String,
    pub phone: String,
    pub title_certificate: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts the user together with its zeroed statistic record.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Removes the user, its statistic record, profile, content and every
    /// edge touching it; counterpart counters are adjusted in the same
    /// transaction. Returns false when the user did not exist.
    async fn delete_user(&self, user_id: i64) -> Result<bool>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>>;

    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>>;

    async fn update_profile(
        &self,
        user_id: i64,
        nick_name: Option<String>,
        gender: Option<Gender>,
    ) -> Result<User>;

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()>;

    async fn set_mobile(&self, user_id: i64, mobile: &str) -> Result<()>;

    async fn get_statistic(&self, user_id: i64) -> Result<Option<StatisticRecord>>;

    /// Counts every source set from scratch. Audit only.
    async fn recount_statistic(&self, user_id: i64) -> Result<StatisticRecord>;

    async fn save_adviser_profile(&self, info: AdviserInfo, kpi: AdviserKpi) -> Result<()>;

    /// Creates the edge. Returns false, changing nothing, when the edge
    /// already exists or its target does not.
    async fn link(&self, relation: Relation) -> Result<bool>;

    /// Removes the edge. Returns false, changing nothing, when it is absent.
    async fn unlink(&self, relation: Relation) -> Result<bool>;

    async fn followee_ids(&self, user_id: i64) -> Result<HashSet<i64>>;

    async fn contracted_adviser_ids(&self, user_id: i64) -> Result<HashSet<i64>>;

    async fn subscribed_portfolio_ids(&self, user_id: i64) -> Result<HashSet<i64>>;

    async fn create_portfolio(&self, portfolio: NewPortfolio) -> Result<Portfolio>;

    async fn create_viewpoint(&self, viewpoint: NewViewpoint) -> Result<Viewpoint>;

    async fn create_recommendation(&self, recommendation: NewRecommendation) -> Result<Recommendation>;

    /// Deletes content owned by `owner_id`. Returns false when there is no
    /// such row for that owner.
    async fn delete_content(&self, owner_id: i64, content: ContentRef) -> Result<bool>;

    async fn list_advisers(&self, sort: AdviserSort, page: PageRequest) -> Result<Page<AdviserCard>>;

    async fn get_adviser(&self, adviser_id: i64) -> Result<Option<AdviserCard>>;

    async fn get_adviser_info(&self, adviser_id: i64) -> Result<Option<AdviserInfo>>;

    /// One lookup for every owner appearing on a page.
    async fn adviser_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, AdviserBrief>>;

    async fn list_portfolios(
        &self,
        owner: Option<i64>,
        sort: PortfolioSort,
        page: PageRequest,
    ) -> Result<Page<Portfolio>>;

    async fn get_portfolio(&self, portfolio_id: i64) -> Result<Option<Portfolio>>;

    async fn list_viewpoints(&self, owner: Option<i64>, page: PageRequest) -> Result<Page<Viewpoint>>;

    async fn get_viewpoint(&self, viewpoint_id: i64) -> Result<Option<Viewpoint>>;

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
        order: RecommendationOrder,
        page: PageRequest,
    ) -> Result<Page<Recommendation>>;

    async fn create_job_application(&self, application: NewJobApplication) -> Result<JobApplication>;
}

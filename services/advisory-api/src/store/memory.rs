use super::{NewJobApplication, RecommendationFilter, Store};
use crate::envelope::{Page, PageRequest};
use crate::errors::{ApiError, Result};
use crate::ledger::{self, Adjustment, ContentKind, ContentRef, LedgerError, Relation};
use crate::metrics;
use crate::models::{
    AdviserBrief, AdviserCard, AdviserInfo, AdviserKpi, Gender, JobApplication, JobStatus,
    NewPortfolio, NewRecommendation, NewUser, NewViewpoint, Portfolio, Recommendation,
    StatisticRecord, User, UserClass, Viewpoint,
};
use crate::sorting::{AdviserSort, PortfolioSort, RecommendationOrder};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    statistics: HashMap<i64, StatisticRecord>,
    adviser_infos: HashMap<i64, AdviserInfo>,
    adviser_kpis: HashMap<i64, AdviserKpi>,
    follows: BTreeSet<(i64, i64)>,
    contracts: BTreeSet<(i64, i64)>,
    subscriptions: BTreeSet<(i64, i64)>,
    portfolios: BTreeMap<i64, Portfolio>,
    viewpoints: BTreeMap<i64, Viewpoint>,
    recommendations: BTreeMap<i64, Recommendation>,
    job_applications: Vec<JobApplication>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Applies adjustments to copies of the affected records. Nothing is
    /// written unless every adjustment succeeds.
    fn stage(&self, adjustments: &[Adjustment]) -> std::result::Result<HashMap<i64, StatisticRecord>, LedgerError> {
        let mut staged: HashMap<i64, StatisticRecord> = HashMap::new();
        for adjustment in adjustments {
            let record = match staged.entry(adjustment.user_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let current = self
                        .statistics
                        .get(&adjustment.user_id)
                        .cloned()
                        .ok_or(LedgerError::MissingRecord(adjustment.user_id))?;
                    entry.insert(current)
                }
            };
            record.apply(adjustment.counter, adjustment.delta)?;
        }
        Ok(staged)
    }

    fn commit(&mut self, staged: HashMap<i64, StatisticRecord>) {
        self.statistics.extend(staged);
    }

    fn require_user(&self, user_id: i64) -> Result<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(ApiError::Integrity(format!("user {} does not exist", user_id)))
        }
    }

    fn adviser_card(&self, user: &User) -> AdviserCard {
        let info = self.adviser_infos.get(&user.id);
        let kpi = self.adviser_kpis.get(&user.id);
        AdviserCard {
            id: user.id,
            title: info.and_then(|i| i.title.clone()),
            title_certificate: info.map(|i| i.title_certificate.clone()).unwrap_or_default(),
            avatar: user.avatar.clone(),
            name: user.nick_name.clone(),
            success_ratio: kpi.map(|k| k.success_ratio).unwrap_or(Decimal::ZERO),
            accumulate_profit_ratio: kpi.map(|k| k.accumulate_profit_ratio).unwrap_or(Decimal::ZERO),
            fans: self.statistics.get(&user.id).map(|s| s.fans_count).unwrap_or(0),
        }
    }

    /// Owner of the counter the edge feeds, if the target qualifies.
    fn resolve_target(&self, relation: &Relation) -> Option<i64> {
        match *relation {
            Relation::Follow { followee, .. } => self.users.get(&followee).map(|u| u.id),
            Relation::Contract { adviser, .. } => self
                .users
                .get(&adviser)
                .filter(|u| u.user_class == UserClass::Adviser)
                .map(|u| u.id),
            Relation::Subscription { portfolio, .. } => self.portfolios.get(&portfolio).map(|p| p.owner_id),
        }
    }

    fn edges(&mut self, relation: &Relation) -> &mut BTreeSet<(i64, i64)> {
        match relation {
            Relation::Follow { .. } => &mut self.follows,
            Relation::Subscription { .. } => &mut self.subscriptions,
            Relation::Contract { .. } => &mut self.contracts,
        }
    }
}

/// Store backed by process memory. Each operation holds the table lock for
/// its whole duration, which gives it the atomicity of a transaction.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: overwrites a ratio set on a portfolio.
    pub async fn set_portfolio_ratios(&self, portfolio_id: i64, day: Decimal, week: Decimal, month: Decimal, accumulate: Decimal) {
        let mut tables = self.tables.write().await;
        if let Some(portfolio) = tables.portfolios.get_mut(&portfolio_id) {
            portfolio.curdate_ratio = day;
            portfolio.week_ratio = week;
            portfolio.month_ratio = month;
            portfolio.accumulate_ratio = accumulate;
        }
    }

    pub async fn set_recommendation_stats(&self, recommendation_id: i64, ctime: chrono::DateTime<Utc>, accumulate: Decimal) {
        let mut tables = self.tables.write().await;
        if let Some(recommendation) = tables.recommendations.get_mut(&recommendation_id) {
            recommendation.ctime = ctime;
            recommendation.accumulate_ratio = accumulate;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.username == user.username) {
            return Err(ApiError::Integrity(format!("username {} already exists", user.username)));
        }

        let id = tables.next_id();
        let created = User {
            id,
            username: user.username,
            user_class: user.user_class,
            mobile: user.mobile,
            email: user.email,
            nick_name: user.nick_name,
            avatar: user.avatar,
            gender: user.gender,
            password_hash: user.password_hash,
            is_active: true,
            date_joined: Utc::now(),
        };
        tables.users.insert(id, created.clone());
        tables.statistics.insert(id, StatisticRecord::new(id));

        metrics::USERS_CREATED.inc();
        Ok(created)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Ok(false);
        }

        let mut removed: Vec<(Relation, i64)> = Vec::new();
        for &(follower, followee) in tables.follows.iter() {
            if follower == user_id || followee == user_id {
                removed.push((Relation::Follow { follower, followee }, followee));
            }
        }
        for &(user, adviser) in tables.contracts.iter() {
            if user == user_id {
                removed.push((Relation::Contract { user, adviser }, adviser));
            }
        }
        for &(user, portfolio) in tables.subscriptions.iter() {
            if user != user_id {
                continue;
            }
            if let Some(owner) = tables.portfolios.get(&portfolio).map(|p| p.owner_id) {
                removed.push((Relation::Subscription { user, portfolio }, owner));
            }
        }
        let adjustments = ledger::on_user_deleted(user_id, &removed);

        let staged = tables.stage(&adjustments)?;
        tables.commit(staged);

        let owned_portfolios: HashSet<i64> = tables
            .portfolios
            .values()
            .filter(|p| p.owner_id == user_id)
            .map(|p| p.id)
            .collect();

        tables.follows.retain(|&(a, b)| a != user_id && b != user_id);
        tables.contracts.retain(|&(a, b)| a != user_id && b != user_id);
        tables
            .subscriptions
            .retain(|&(u, p)| u != user_id && !owned_portfolios.contains(&p));
        tables.portfolios.retain(|_, p| p.owner_id != user_id);
        tables.viewpoints.retain(|_, v| v.owner_id != user_id);
        tables.recommendations.retain(|_, r| r.owner_id != user_id);
        tables.adviser_infos.remove(&user_id);
        tables.adviser_kpis.remove(&user_id);
        tables.statistics.remove(&user_id);
        tables.users.remove(&user_id);

        Ok(true)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.mobile == mobile).cloned())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        nick_name: Option<String>,
        gender: Option<Gender>,
    ) -> Result<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| ApiError::NotFound("user".to_string()))?;
        if let Some(nick_name) = nick_name {
            user.nick_name = nick_name;
        }
        if let Some(gender) = gender {
            user.gender = gender;
        }
        Ok(user.clone())
    }

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn set_mobile(&self, user_id: i64, mobile: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.mobile = mobile.to_string();
        }
        Ok(())
    }

    async fn get_statistic(&self, user_id: i64) -> Result<Option<StatisticRecord>> {
        Ok(self.tables.read().await.statistics.get(&user_id).cloned())
    }

    async fn recount_statistic(&self, user_id: i64) -> Result<StatisticRecord> {
        let tables = self.tables.read().await;
        let count = |n: usize| n as i64;

        Ok(StatisticRecord {
            user_id,
            fans_count: count(tables.follows.iter().filter(|(_, e)| *e == user_id).count()),
            followings_count: count(tables.follows.iter().filter(|(f, _)| *f == user_id).count()),
            sign_contract_count: count(tables.contracts.iter().filter(|(_, a)| *a == user_id).count()),
            recommend_secs_count: count(tables.recommendations.values().filter(|r| r.owner_id == user_id).count()),
            portfolios_count: count(tables.portfolios.values().filter(|p| p.owner_id == user_id).count()),
            portfolios_bysubscribe_count: count(
                tables
                    .subscriptions
                    .iter()
                    .filter(|(_, p)| tables.portfolios.get(p).map(|p| p.owner_id) == Some(user_id))
                    .count(),
            ),
            viewpoints_count: count(tables.viewpoints.values().filter(|v| v.owner_id == user_id).count()),
        })
    }

    async fn save_adviser_profile(&self, info: AdviserInfo, kpi: AdviserKpi) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.require_user(info.user_id)?;
        tables.require_user(kpi.user_id)?;
        tables.adviser_infos.insert(info.user_id, info);
        tables.adviser_kpis.insert(kpi.user_id, kpi);
        Ok(())
    }

    async fn link(&self, relation: Relation) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let target_owner = match tables.resolve_target(&relation) {
            Some(owner) => owner,
            None => return Ok(false),
        };
        let key = (relation.user_id(), relation.target_id());
        if tables.edges(&relation).contains(&key) {
            return Ok(false);
        }

        let adjustments = ledger::on_link(&relation, target_owner);
        let staged = tables.stage(&adjustments)?;
        tables.edges(&relation).insert(key);
        tables.commit(staged);

        metrics::record_edge_change(relation.kind(), "link");
        metrics::record_adjustments(&adjustments);
        Ok(true)
    }

    async fn unlink(&self, relation: Relation) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let key = (relation.user_id(), relation.target_id());
        if !tables.edges(&relation).contains(&key) {
            return Ok(false);
        }
        let target_owner = match relation {
            Relation::Subscription { portfolio, .. } => tables
                .portfolios
                .get(&portfolio)
                .map(|p| p.owner_id)
                .ok_or_else(|| ApiError::Integrity(format!("portfolio {} does not exist", portfolio)))?,
            _ => relation.target_id(),
        };

        let adjustments = ledger::on_unlink(&relation, target_owner);
        let staged = tables.stage(&adjustments)?;
        tables.edges(&relation).remove(&key);
        tables.commit(staged);

        metrics::record_edge_change(relation.kind(), "unlink");
        metrics::record_adjustments(&adjustments);
        Ok(true)
    }

    async fn followee_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        let tables = self.tables.read().await;
        Ok(tables.follows.iter().filter(|(f, _)| *f == user_id).map(|(_, e)| *e).collect())
    }

    async fn contracted_adviser_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        let tables = self.tables.read().await;
        Ok(tables.contracts.iter().filter(|(u, _)| *u == user_id).map(|(_, a)| *a).collect())
    }

    async fn subscribed_portfolio_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        let tables = self.tables.read().await;
        Ok(tables.subscriptions.iter().filter(|(u, _)| *u == user_id).map(|(_, p)| *p).collect())
    }

    async fn create_portfolio(&self, portfolio: NewPortfolio) -> Result<Portfolio> {
        let mut tables = self.tables.write().await;
        tables.require_user(portfolio.owner_id)?;
        if let Some(uuid) = &portfolio.uuid {
            if tables.portfolios.values().any(|p| p.uuid.as_ref() == Some(uuid)) {
                return Err(ApiError::Integrity(format!("portfolio uuid {} already exists", uuid)));
            }
        }

        let adjustments = ledger::on_content_created(ContentKind::Portfolio, portfolio.owner_id);
        let staged = tables.stage(&adjustments)?;

        let id = tables.next_id();
        let created = Portfolio {
            id,
            owner_id: portfolio.owner_id,
            uuid: portfolio.uuid,
            name: portfolio.name,
            topics: portfolio.topics,
            note: portfolio.note,
            ctime: Utc::now(),
            curdate_ratio: Decimal::ZERO,
            week_ratio: Decimal::ZERO,
            month_ratio: Decimal::ZERO,
            accumulate_ratio: Decimal::ZERO,
            success_ratio: Decimal::ZERO,
        };
        tables.portfolios.insert(id, created.clone());
        tables.commit(staged);

        metrics::record_content_change(ContentKind::Portfolio, "create");
        metrics::record_adjustments(&adjustments);
        Ok(created)
    }

    async fn create_viewpoint(&self, viewpoint: NewViewpoint) -> Result<Viewpoint> {
        let mut tables = self.tables.write().await;
        tables.require_user(viewpoint.owner_id)?;

        let adjustments = ledger::on_content_created(ContentKind::Viewpoint, viewpoint.owner_id);
        let staged = tables.stage(&adjustments)?;

        let id = tables.next_id();
        let created = Viewpoint {
            id,
            owner_id: viewpoint.owner_id,
            title: viewpoint.title,
            digest: viewpoint.digest,
            content: viewpoint.content,
            pub_daytime: viewpoint.pub_daytime,
            sub_picture: viewpoint.sub_picture,
        };
        tables.viewpoints.insert(id, created.clone());
        tables.commit(staged);

        metrics::record_content_change(ContentKind::Viewpoint, "create");
        metrics::record_adjustments(&adjustments);
        Ok(created)
    }

    async fn create_recommendation(&self, recommendation: NewRecommendation) -> Result<Recommendation> {
        let mut tables = self.tables.write().await;
        tables.require_user(recommendation.owner_id)?;

        let adjustments = ledger::on_content_created(ContentKind::Recommendation, recommendation.owner_id);
        let staged = tables.stage(&adjustments)?;

        let id = tables.next_id();
        let created = Recommendation {
            id,
            owner_id: recommendation.owner_id,
            sec_idxid: recommendation.sec_idxid,
            buy_daytime: recommendation.buy_daytime,
            buy_price: recommendation.buy_price,
            sell_daytime: recommendation.sell_daytime,
            sell_price: recommendation.sell_price,
            ctime: Utc::now(),
            curdate_ratio: Decimal::ZERO,
            week_ratio: Decimal::ZERO,
            month_ratio: Decimal::ZERO,
            accumulate_ratio: Decimal::ZERO,
        };
        tables.recommendations.insert(id, created.clone());
        tables.commit(staged);

        metrics::record_content_change(ContentKind::Recommendation, "create");
        metrics::record_adjustments(&adjustments);
        Ok(created)
    }

    async fn delete_content(&self, owner_id: i64, content: ContentRef) -> Result<bool> {
        let mut tables = self.tables.write().await;

        let owned = match content.kind {
            ContentKind::Portfolio => tables.portfolios.get(&content.id).map(|p| p.owner_id),
            ContentKind::Viewpoint => tables.viewpoints.get(&content.id).map(|v| v.owner_id),
            ContentKind::Recommendation => tables.recommendations.get(&content.id).map(|r| r.owner_id),
        };
        if owned != Some(owner_id) {
            return Ok(false);
        }

        let cascaded = if content.kind == ContentKind::Portfolio {
            tables.subscriptions.iter().filter(|(_, p)| *p == content.id).count() as i64
        } else {
            0
        };

        let adjustments = ledger::on_content_deleted(content.kind, owner_id, cascaded);
        let staged = tables.stage(&adjustments)?;

        match content.kind {
            ContentKind::Portfolio => {
                tables.subscriptions.retain(|(_, p)| *p != content.id);
                tables.portfolios.remove(&content.id);
            }
            ContentKind::Viewpoint => {
                tables.viewpoints.remove(&content.id);
            }
            ContentKind::Recommendation => {
                tables.recommendations.remove(&content.id);
            }
        }
        tables.commit(staged);

        metrics::record_content_change(content.kind, "delete");
        metrics::record_adjustments(&adjustments);
        Ok(true)
    }

    async fn list_advisers(&self, sort: AdviserSort, page: PageRequest) -> Result<Page<AdviserCard>> {
        let tables = self.tables.read().await;
        let mut cards: Vec<AdviserCard> = tables
            .users
            .values()
            .filter(|u| u.user_class == UserClass::Adviser && u.is_active)
            .map(|u| tables.adviser_card(u))
            .collect();
        cards.sort_by(|a, b| sort.compare(a, b));
        Ok(page.slice(&cards))
    }

    async fn get_adviser(&self, adviser_id: i64) -> Result<Option<AdviserCard>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&adviser_id)
            .filter(|u| u.user_class == UserClass::Adviser && u.is_active)
            .map(|u| tables.adviser_card(u)))
    }

    async fn get_adviser_info(&self, adviser_id: i64) -> Result<Option<AdviserInfo>> {
        Ok(self.tables.read().await.adviser_infos.get(&adviser_id).cloned())
    }

    async fn adviser_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, AdviserBrief>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id))
            .map(|u| {
                let brief = AdviserBrief {
                    id: u.id,
                    avatar: u.avatar.clone(),
                    name: u.nick_name.clone(),
                    title: tables.adviser_infos.get(&u.id).and_then(|i| i.title.clone()),
                };
                (u.id, brief)
            })
            .collect())
    }

    async fn list_portfolios(
        &self,
        owner: Option<i64>,
        sort: PortfolioSort,
        page: PageRequest,
    ) -> Result<Page<Portfolio>> {
        let tables = self.tables.read().await;
        let mut portfolios: Vec<Portfolio> = tables
            .portfolios
            .values()
            .filter(|p| owner.map_or(true, |o| p.owner_id == o))
            .cloned()
            .collect();
        portfolios.sort_by(|a, b| sort.compare(a, b));
        Ok(page.slice(&portfolios))
    }

    async fn get_portfolio(&self, portfolio_id: i64) -> Result<Option<Portfolio>> {
        Ok(self.tables.read().await.portfolios.get(&portfolio_id).cloned())
    }

    async fn list_viewpoints(&self, owner: Option<i64>, page: PageRequest) -> Result<Page<Viewpoint>> {
        let tables = self.tables.read().await;
        let mut viewpoints: Vec<Viewpoint> = tables
            .viewpoints
            .values()
            .filter(|v| owner.map_or(true, |o| v.owner_id == o))
            .cloned()
            .collect();
        // NULLS LAST, then newest id
        viewpoints.sort_by(|a, b| match (a.pub_daytime, b.pub_daytime) {
            (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });
        Ok(page.slice(&viewpoints))
    }

    async fn get_viewpoint(&self, viewpoint_id: i64) -> Result<Option<Viewpoint>> {
        Ok(self.tables.read().await.viewpoints.get(&viewpoint_id).cloned())
    }

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
        order: RecommendationOrder,
        page: PageRequest,
    ) -> Result<Page<Recommendation>> {
        let tables = self.tables.read().await;
        let mut recommendations: Vec<Recommendation> = tables
            .recommendations
            .values()
            .filter(|r| filter.owner.map_or(true, |o| r.owner_id == o))
            .filter(|r| filter.since.map_or(true, |since| r.ctime >= since))
            .cloned()
            .collect();
        recommendations.sort_by(|a, b| order.compare(a, b));
        Ok(page.slice(&recommendations))
    }

    async fn create_job_application(&self, application: NewJobApplication) -> Result<JobApplication> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let created = JobApplication {
            id,
            real_name: application.real_name,
            phone: application.phone,
            title_certificate: application.title_certificate,
            status: JobStatus::Waiting,
            ctime: Utc::now(),
        };
        tables.job_applications.push(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, class: UserClass) -> NewUser {
        NewUser {
            username: username.to_string(),
            user_class: class,
            mobile: String::new(),
            email: String::new(),
            nick_name: username.to_string(),
            avatar: None,
            gender: Gender::Secret,
            password_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn test_failed_adjustment_leaves_no_trace() {
        let store = MemoryStore::new();
        let fan = store.create_user(new_user("fan", UserClass::Investor)).await.unwrap();
        let adviser = store.create_user(new_user("adv", UserClass::Adviser)).await.unwrap();

        // Simulate a ledger row gone missing mid-flight.
        store.tables.write().await.statistics.remove(&adviser.id);

        let relation = Relation::Follow { follower: fan.id, followee: adviser.id };
        let err = store.link(relation).await.unwrap_err();
        assert!(matches!(err, ApiError::Integrity(_)));
        assert!(store.followee_ids(fan.id).await.unwrap().is_empty());
        assert_eq!(store.get_statistic(fan.id).await.unwrap().unwrap().followings_count, 0);
    }

    #[tokio::test]
    async fn test_contract_requires_adviser_target() {
        let store = MemoryStore::new();
        let a = store.create_user(new_user("a", UserClass::Investor)).await.unwrap();
        let b = store.create_user(new_user("b", UserClass::Investor)).await.unwrap();
        let linked = store.link(Relation::Contract { user: a.id, adviser: b.id }).await.unwrap();
        assert!(!linked);
        assert_eq!(store.get_statistic(b.id).await.unwrap().unwrap().sign_contract_count, 0);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_integrity_error() {
        let store = MemoryStore::new();
        store.create_user(new_user("same", UserClass::Investor)).await.unwrap();
        let err = store.create_user(new_user("same", UserClass::Investor)).await.unwrap_err();
        assert!(matches!(err, ApiError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_viewpoints_without_pub_time_sort_last() {
        let store = MemoryStore::new();
        let adviser = store.create_user(new_user("adv", UserClass::Adviser)).await.unwrap();
        for (title, pub_daytime) in [("undated", None), ("dated", Some(Utc::now()))] {
            store
                .create_viewpoint(NewViewpoint {
                    owner_id: adviser.id,
                    title: title.to_string(),
                    digest: String::new(),
                    content: String::new(),
                    pub_daytime,
                    sub_picture: None,
                })
                .await
                .unwrap();
        }
        let page = store.list_viewpoints(Some(adviser.id), PageRequest::default()).await.unwrap();
        assert_eq!(page.results[0].title, "dated");
        assert_eq!(page.results[1].title, "undated");
    }
}

use super::{NewJobApplication, RecommendationFilter, Store};
use crate::envelope::{Page, PageRequest};
use crate::errors::Result;
use crate::ledger::{self, Adjustment, ContentKind, ContentRef, LedgerError, Relation};
use crate::metrics;
use crate::models::{
    AdviserBrief, AdviserCard, AdviserInfo, AdviserKpi, Gender, JobApplication, JobStatus,
    NewPortfolio, NewRecommendation, NewUser, NewViewpoint, Portfolio, Recommendation,
    StatisticRecord, User, UserClass, Viewpoint,
};
use crate::sorting::{AdviserSort, PortfolioSort, RecommendationOrder};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

const USER_COLUMNS: &str = "id, username, user_class, mobile, email, nick_name, avatar, gender, \
                            password_hash, is_active, date_joined";

const PORTFOLIO_COLUMNS: &str = "id, owner_id, uuid, name, topics, note, ctime, curdate_ratio, \
                                 week_ratio, month_ratio, accumulate_ratio, success_ratio";

const VIEWPOINT_COLUMNS: &str = "id, owner_id, title, digest, content, pub_daytime, sub_picture";

const RECOMMENDATION_COLUMNS: &str = "id, owner_id, sec_idxid, buy_daytime, buy_price, sell_daytime, \
                                      sell_price, ctime, curdate_ratio, week_ratio, month_ratio, \
                                      accumulate_ratio";

const ADVISER_CARD_SELECT: &str = r#"
    SELECT u.id,
           i.title,
           COALESCE(i.title_certificate, '') AS title_certificate,
           u.avatar,
           u.nick_name AS name,
           COALESCE(k.success_ratio, 0) AS success_ratio,
           COALESCE(k.accumulate_profit_ratio, 0) AS accumulate_profit_ratio,
           COALESCE(s.fans_count, 0) AS fans
    FROM users u
    LEFT JOIN adviser_infos i ON i.user_id = u.id
    LEFT JOIN adviser_kpis k ON k.user_id = u.id
    LEFT JOIN user_statistics s ON s.user_id = u.id
    WHERE u.user_class = 2 AND u.is_active
"#;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(PgStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Applies ledger adjustments as relative updates. A missing statistic row
/// aborts the transaction; a negative result trips the CHECK constraint.
async fn apply_adjustments(tx: &mut Transaction<'_, Postgres>, adjustments: &[Adjustment]) -> Result<()> {
    for adjustment in adjustments {
        let column = adjustment.counter.column();
        let sql = format!(
            "UPDATE user_statistics SET {column} = {column} + $1 WHERE user_id = $2",
            column = column
        );
        let result = sqlx::query(&sql)
            .bind(adjustment.delta)
            .bind(adjustment.user_id)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() != 1 {
            return Err(LedgerError::MissingRecord(adjustment.user_id).into());
        }
    }
    Ok(())
}

/// Locks the edge target and returns the user whose counter the edge
/// feeds, or None when the target does not qualify.
async fn resolve_target(tx: &mut Transaction<'_, Postgres>, relation: &Relation) -> Result<Option<i64>> {
    let owner = match *relation {
        Relation::Follow { followee, .. } => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR SHARE")
                .bind(followee)
                .fetch_optional(&mut **tx)
                .await?
        }
        Relation::Contract { adviser, .. } => {
            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM users WHERE id = $1 AND user_class = $2 FOR SHARE",
            )
            .bind(adviser)
            .bind(UserClass::Adviser)
            .fetch_optional(&mut **tx)
            .await?
        }
        Relation::Subscription { portfolio, .. } => {
            sqlx::query_scalar::<_, i64>("SELECT owner_id FROM portfolios WHERE id = $1 FOR SHARE")
                .bind(portfolio)
                .fetch_optional(&mut **tx)
                .await?
        }
    };
    Ok(owner)
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, user_class, mobile, email, nick_name, avatar, gender, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(user.user_class)
        .bind(&user.mobile)
        .bind(&user.email)
        .bind(&user.nick_name)
        .bind(&user.avatar)
        .bind(user.gender)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO user_statistics (user_id) VALUES ($1)")
            .bind(created.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        metrics::USERS_CREATED.inc();
        info!(user_id = created.id, username = %created.username, "user created");
        Ok(created)
    }

    async fn delete_user(&self, user_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Ok(false);
        }

        // Counterpart adjustments come from the edge rows this transaction
        // actually removed, so an edge a concurrent unlink already took is
        // never counted twice.
        let mut removed: Vec<(Relation, i64)> = Vec::new();

        let followees = sqlx::query_scalar::<_, i64>(
            "DELETE FROM follows WHERE follower_id = $1 RETURNING followee_id",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        removed.extend(
            followees
                .into_iter()
                .map(|followee| (Relation::Follow { follower: user_id, followee }, followee)),
        );

        let followers = sqlx::query_scalar::<_, i64>(
            "DELETE FROM follows WHERE followee_id = $1 RETURNING follower_id",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        removed.extend(
            followers
                .into_iter()
                .map(|follower| (Relation::Follow { follower, followee: user_id }, user_id)),
        );

        let advisers = sqlx::query_scalar::<_, i64>(
            "DELETE FROM contracts WHERE user_id = $1 RETURNING adviser_id",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        removed.extend(
            advisers
                .into_iter()
                .map(|adviser| (Relation::Contract { user: user_id, adviser }, adviser)),
        );

        let subscribed = sqlx::query_as::<_, (i64, i64)>(
            r#"
            DELETE FROM subscriptions sb USING portfolios p
            WHERE sb.user_id = $1 AND p.id = sb.portfolio_id
            RETURNING sb.portfolio_id, p.owner_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        removed.extend(
            subscribed
                .into_iter()
                .map(|(portfolio, owner)| (Relation::Subscription { user: user_id, portfolio }, owner)),
        );

        let adjustments = ledger::on_user_deleted(user_id, &removed);
        apply_adjustments(&mut tx, &adjustments).await?;

        // Whatever is left only feeds the deleted user's own counters.
        for sql in [
            "DELETE FROM contracts WHERE adviser_id = $1",
            "DELETE FROM subscriptions \
             WHERE portfolio_id IN (SELECT id FROM portfolios WHERE owner_id = $1)",
            "DELETE FROM portfolios WHERE owner_id = $1",
            "DELETE FROM viewpoints WHERE owner_id = $1",
            "DELETE FROM recommendations WHERE owner_id = $1",
            "DELETE FROM adviser_infos WHERE user_id = $1",
            "DELETE FROM adviser_kpis WHERE user_id = $1",
            "DELETE FROM user_statistics WHERE user_id = $1",
            "DELETE FROM users WHERE id = $1",
        ] {
            sqlx::query(sql).bind(user_id).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        metrics::record_adjustments(&adjustments);
        info!(user_id, removed_edges = removed.len(), "user deleted");
        Ok(true)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE mobile = $1 ORDER BY id LIMIT 1",
            USER_COLUMNS
        ))
        .bind(mobile)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_profile(
        &self,
        user_id: i64,
        nick_name: Option<String>,
        gender: Option<Gender>,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET nick_name = COALESCE($1, nick_name),
                gender = COALESCE($2, gender)
            WHERE id = $3
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(nick_name)
        .bind(gender)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_mobile(&self, user_id: i64, mobile: &str) -> Result<()> {
        sqlx::query("UPDATE users SET mobile = $1 WHERE id = $2")
            .bind(mobile)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_statistic(&self, user_id: i64) -> Result<Option<StatisticRecord>> {
        let record = sqlx::query_as::<_, StatisticRecord>(
            r#"
            SELECT user_id, fans_count, followings_count, sign_contract_count, recommend_secs_count,
                   portfolios_count, portfolios_bysubscribe_count, viewpoints_count
            FROM user_statistics WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn recount_statistic(&self, user_id: i64) -> Result<StatisticRecord> {
        let record = sqlx::query_as::<_, StatisticRecord>(
            r#"
            SELECT $1::BIGINT AS user_id,
                   (SELECT COUNT(*) FROM follows WHERE followee_id = $1) AS fans_count,
                   (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS followings_count,
                   (SELECT COUNT(*) FROM contracts WHERE adviser_id = $1) AS sign_contract_count,
                   (SELECT COUNT(*) FROM recommendations WHERE owner_id = $1) AS recommend_secs_count,
                   (SELECT COUNT(*) FROM portfolios WHERE owner_id = $1) AS portfolios_count,
                   (SELECT COUNT(*) FROM subscriptions sb JOIN portfolios p ON p.id = sb.portfolio_id
                     WHERE p.owner_id = $1) AS portfolios_bysubscribe_count,
                   (SELECT COUNT(*) FROM viewpoints WHERE owner_id = $1) AS viewpoints_count
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn save_adviser_profile(&self, info: AdviserInfo, kpi: AdviserKpi) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO adviser_infos (user_id, title, title_certificate, experience, good_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET title = EXCLUDED.title,
                title_certificate = EXCLUDED.title_certificate,
                experience = EXCLUDED.experience,
                good_at = EXCLUDED.good_at
            "#,
        )
        .bind(info.user_id)
        .bind(&info.title)
        .bind(&info.title_certificate)
        .bind(&info.experience)
        .bind(&info.good_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO adviser_kpis (user_id, success_ratio, accumulate_profit_ratio)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET success_ratio = EXCLUDED.success_ratio,
                accumulate_profit_ratio = EXCLUDED.accumulate_profit_ratio
            "#,
        )
        .bind(kpi.user_id)
        .bind(kpi.success_ratio)
        .bind(kpi.accumulate_profit_ratio)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn link(&self, relation: Relation) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Serializes against delete_user, which holds the user row FOR UPDATE.
        let actor = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR SHARE")
            .bind(relation.user_id())
            .fetch_optional(&mut *tx)
            .await?;
        if actor.is_none() {
            debug!(kind = relation.kind(), user_id = relation.user_id(), "link actor missing");
            return Ok(false);
        }

        let target_owner = match resolve_target(&mut tx, &relation).await? {
            Some(owner) => owner,
            None => {
                debug!(kind = relation.kind(), target = relation.target_id(), "link target missing");
                return Ok(false);
            }
        };

        let sql = match relation {
            Relation::Follow { .. } => {
                "INSERT INTO follows (follower_id, followee_id) VALUES ($1, $2) \
                 ON CONFLICT (follower_id, followee_id) DO NOTHING"
            }
            Relation::Subscription { .. } => {
                "INSERT INTO subscriptions (user_id, portfolio_id) VALUES ($1, $2) \
                 ON CONFLICT (user_id, portfolio_id) DO NOTHING"
            }
            Relation::Contract { .. } => {
                "INSERT INTO contracts (user_id, adviser_id) VALUES ($1, $2) \
                 ON CONFLICT (user_id, adviser_id) DO NOTHING"
            }
        };

        let inserted = sqlx::query(sql)
            .bind(relation.user_id())
            .bind(relation.target_id())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if inserted == 0 {
            return Ok(false);
        }

        let adjustments = ledger::on_link(&relation, target_owner);
        apply_adjustments(&mut tx, &adjustments).await?;
        tx.commit().await?;

        metrics::record_edge_change(relation.kind(), "link");
        metrics::record_adjustments(&adjustments);
        Ok(true)
    }

    async fn unlink(&self, relation: Relation) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // DELETE .. RETURNING decides whether this call removed the row.
        let removed = match relation {
            Relation::Follow { follower, followee } => sqlx::query_scalar::<_, i64>(
                "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2 RETURNING followee_id",
            )
            .bind(follower)
            .bind(followee)
            .fetch_optional(&mut *tx)
            .await?,
            Relation::Subscription { user, portfolio } => sqlx::query_scalar::<_, i64>(
                r#"
                DELETE FROM subscriptions sb USING portfolios p
                WHERE sb.user_id = $1 AND sb.portfolio_id = $2 AND p.id = sb.portfolio_id
                RETURNING p.owner_id
                "#,
            )
            .bind(user)
            .bind(portfolio)
            .fetch_optional(&mut *tx)
            .await?,
            Relation::Contract { user, adviser } => sqlx::query_scalar::<_, i64>(
                "DELETE FROM contracts WHERE user_id = $1 AND adviser_id = $2 RETURNING adviser_id",
            )
            .bind(user)
            .bind(adviser)
            .fetch_optional(&mut *tx)
            .await?,
        };

        let target_owner = match removed {
            Some(owner) => owner,
            None => return Ok(false),
        };

        let adjustments = ledger::on_unlink(&relation, target_owner);
        apply_adjustments(&mut tx, &adjustments).await?;
        tx.commit().await?;

        metrics::record_edge_change(relation.kind(), "unlink");
        metrics::record_adjustments(&adjustments);
        Ok(true)
    }

    async fn followee_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT followee_id FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn contracted_adviser_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT adviser_id FROM contracts WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn subscribed_portfolio_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT portfolio_id FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    async fn create_portfolio(&self, portfolio: NewPortfolio) -> Result<Portfolio> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Portfolio>(&format!(
            r#"
            INSERT INTO portfolios (owner_id, uuid, name, topics, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PORTFOLIO_COLUMNS
        ))
        .bind(portfolio.owner_id)
        .bind(&portfolio.uuid)
        .bind(&portfolio.name)
        .bind(&portfolio.topics)
        .bind(&portfolio.note)
        .fetch_one(&mut *tx)
        .await?;

        let adjustments = ledger::on_content_created(ContentKind::Portfolio, created.owner_id);
        apply_adjustments(&mut tx, &adjustments).await?;
        tx.commit().await?;

        metrics::record_content_change(ContentKind::Portfolio, "create");
        metrics::record_adjustments(&adjustments);
        Ok(created)
    }

    async fn create_viewpoint(&self, viewpoint: NewViewpoint) -> Result<Viewpoint> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Viewpoint>(&format!(
            r#"
            INSERT INTO viewpoints (owner_id, title, digest, content, pub_daytime, sub_picture)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            VIEWPOINT_COLUMNS
        ))
        .bind(viewpoint.owner_id)
        .bind(&viewpoint.title)
        .bind(&viewpoint.digest)
        .bind(&viewpoint.content)
        .bind(viewpoint.pub_daytime)
        .bind(&viewpoint.sub_picture)
        .fetch_one(&mut *tx)
        .await?;

        let adjustments = ledger::on_content_created(ContentKind::Viewpoint, created.owner_id);
        apply_adjustments(&mut tx, &adjustments).await?;
        tx.commit().await?;

        metrics::record_content_change(ContentKind::Viewpoint, "create");
        metrics::record_adjustments(&adjustments);
        Ok(created)
    }

    async fn create_recommendation(&self, recommendation: NewRecommendation) -> Result<Recommendation> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Recommendation>(&format!(
            r#"
            INSERT INTO recommendations (owner_id, sec_idxid, buy_daytime, buy_price, sell_daytime, sell_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            RECOMMENDATION_COLUMNS
        ))
        .bind(recommendation.owner_id)
        .bind(&recommendation.sec_idxid)
        .bind(recommendation.buy_daytime)
        .bind(recommendation.buy_price)
        .bind(recommendation.sell_daytime)
        .bind(recommendation.sell_price)
        .fetch_one(&mut *tx)
        .await?;

        let adjustments = ledger::on_content_created(ContentKind::Recommendation, created.owner_id);
        apply_adjustments(&mut tx, &adjustments).await?;
        tx.commit().await?;

        metrics::record_content_change(ContentKind::Recommendation, "create");
        metrics::record_adjustments(&adjustments);
        Ok(created)
    }

    async fn delete_content(&self, owner_id: i64, content: ContentRef) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT id FROM {} WHERE id = $1 AND owner_id = $2 FOR UPDATE",
            content.kind.table()
        ))
        .bind(content.id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let cascaded = if content.kind == ContentKind::Portfolio {
            sqlx::query("DELETE FROM subscriptions WHERE portfolio_id = $1")
                .bind(content.id)
                .execute(&mut *tx)
                .await?
                .rows_affected() as i64
        } else {
            0
        };

        sqlx::query(&format!("DELETE FROM {} WHERE id = $1", content.kind.table()))
            .bind(content.id)
            .execute(&mut *tx)
            .await?;

        let adjustments = ledger::on_content_deleted(content.kind, owner_id, cascaded);
        apply_adjustments(&mut tx, &adjustments).await?;
        tx.commit().await?;

        metrics::record_content_change(content.kind, "delete");
        metrics::record_adjustments(&adjustments);
        Ok(true)
    }

    async fn list_advisers(&self, sort: AdviserSort, page: PageRequest) -> Result<Page<AdviserCard>> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE user_class = 2 AND is_active",
        )
        .fetch_one(&self.pool)
        .await?;

        let results = sqlx::query_as::<_, AdviserCard>(&format!(
            "{} ORDER BY {} LIMIT $1 OFFSET $2",
            ADVISER_CARD_SELECT,
            sort.order_by()
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page { count, results })
    }

    async fn get_adviser(&self, adviser_id: i64) -> Result<Option<AdviserCard>> {
        let card = sqlx::query_as::<_, AdviserCard>(&format!("{} AND u.id = $1", ADVISER_CARD_SELECT))
            .bind(adviser_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }

    async fn get_adviser_info(&self, adviser_id: i64) -> Result<Option<AdviserInfo>> {
        let info = sqlx::query_as::<_, AdviserInfo>(
            "SELECT user_id, title, title_certificate, experience, good_at FROM adviser_infos WHERE user_id = $1",
        )
        .bind(adviser_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(info)
    }

    async fn adviser_briefs(&self, ids: &[i64]) -> Result<HashMap<i64, AdviserBrief>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let briefs = sqlx::query_as::<_, AdviserBrief>(
            r#"
            SELECT u.id, u.avatar, u.nick_name AS name, i.title
            FROM users u
            LEFT JOIN adviser_infos i ON i.user_id = u.id
            WHERE u.id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(briefs.into_iter().map(|b| (b.id, b)).collect())
    }

    async fn list_portfolios(
        &self,
        owner: Option<i64>,
        sort: PortfolioSort,
        page: PageRequest,
    ) -> Result<Page<Portfolio>> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM portfolios WHERE ($1::BIGINT IS NULL OR owner_id = $1)",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        let results = sqlx::query_as::<_, Portfolio>(&format!(
            r#"
            SELECT {} FROM portfolios
            WHERE ($1::BIGINT IS NULL OR owner_id = $1)
            ORDER BY {}
            LIMIT $2 OFFSET $3
            "#,
            PORTFOLIO_COLUMNS,
            sort.order_by()
        ))
        .bind(owner)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page { count, results })
    }

    async fn get_portfolio(&self, portfolio_id: i64) -> Result<Option<Portfolio>> {
        let portfolio = sqlx::query_as::<_, Portfolio>(&format!(
            "SELECT {} FROM portfolios WHERE id = $1",
            PORTFOLIO_COLUMNS
        ))
        .bind(portfolio_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(portfolio)
    }

    async fn list_viewpoints(&self, owner: Option<i64>, page: PageRequest) -> Result<Page<Viewpoint>> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM viewpoints WHERE ($1::BIGINT IS NULL OR owner_id = $1)",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;

        let results = sqlx::query_as::<_, Viewpoint>(&format!(
            r#"
            SELECT {} FROM viewpoints
            WHERE ($1::BIGINT IS NULL OR owner_id = $1)
            ORDER BY pub_daytime DESC NULLS LAST, id DESC
            LIMIT $2 OFFSET $3
            "#,
            VIEWPOINT_COLUMNS
        ))
        .bind(owner)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page { count, results })
    }

    async fn get_viewpoint(&self, viewpoint_id: i64) -> Result<Option<Viewpoint>> {
        let viewpoint = sqlx::query_as::<_, Viewpoint>(&format!(
            "SELECT {} FROM viewpoints WHERE id = $1",
            VIEWPOINT_COLUMNS
        ))
        .bind(viewpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(viewpoint)
    }

    async fn list_recommendations(
        &self,
        filter: RecommendationFilter,
        order: RecommendationOrder,
        page: PageRequest,
    ) -> Result<Page<Recommendation>> {
        const WHERE: &str = "($1::BIGINT IS NULL OR owner_id = $1) \
                             AND ($2::TIMESTAMPTZ IS NULL OR ctime >= $2)";

        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM recommendations WHERE {}",
            WHERE
        ))
        .bind(filter.owner)
        .bind(filter.since)
        .fetch_one(&self.pool)
        .await?;

        let results = sqlx::query_as::<_, Recommendation>(&format!(
            "SELECT {} FROM recommendations WHERE {} ORDER BY {} LIMIT $3 OFFSET $4",
            RECOMMENDATION_COLUMNS,
            WHERE,
            order.order_by()
        ))
        .bind(filter.owner)
        .bind(filter.since)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page { count, results })
    }

    async fn create_job_application(&self, application: NewJobApplication) -> Result<JobApplication> {
        let created = sqlx::query_as::<_, JobApplication>(
            r#"
            INSERT INTO job_applications (real_name, phone, title_certificate, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, real_name, phone, title_certificate, status, ctime
            "#,
        )
        .bind(&application.real_name)
        .bind(&application.phone)
        .bind(&application.title_certificate)
        .bind(JobStatus::Waiting)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgStore::connect(&url, 5, 1).await.unwrap();
        sqlx::migrate!("./migrations").run(store.pool()).await.unwrap();
        store
    }

    fn new_user(username: &str, class: UserClass) -> NewUser {
        NewUser {
            username: username.to_string(),
            user_class: class,
            mobile: String::new(),
            email: String::new(),
            nick_name: username.to_string(),
            avatar: None,
            gender: Gender::Secret,
            password_hash: "x".to_string(),
        }
    }

    fn unique(prefix: &str) -> String {
        format!("{}_{}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_follow_is_idempotent_against_postgres() {
        let store = store().await;
        let fan = store.create_user(new_user(&unique("fan"), UserClass::Investor)).await.unwrap();
        let adviser = store.create_user(new_user(&unique("adv"), UserClass::Adviser)).await.unwrap();
        let relation = Relation::Follow { follower: fan.id, followee: adviser.id };

        assert!(store.link(relation).await.unwrap());
        assert!(!store.link(relation).await.unwrap());
        assert_eq!(store.get_statistic(adviser.id).await.unwrap().unwrap().fans_count, 1);

        assert!(store.unlink(relation).await.unwrap());
        assert!(!store.unlink(relation).await.unwrap());
        assert_eq!(store.get_statistic(adviser.id).await.unwrap().unwrap().fans_count, 0);

        store.delete_user(fan.id).await.unwrap();
        store.delete_user(adviser.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_delete_user_keeps_counterparts_consistent() {
        let store = store().await;
        let fan = store.create_user(new_user(&unique("fan"), UserClass::Investor)).await.unwrap();
        let adviser = store.create_user(new_user(&unique("adv"), UserClass::Adviser)).await.unwrap();
        store
            .save_adviser_profile(
                AdviserInfo { user_id: adviser.id, ..Default::default() },
                AdviserKpi { user_id: adviser.id, success_ratio: Decimal::ONE, ..Default::default() },
            )
            .await
            .unwrap();

        let portfolio = store
            .create_portfolio(NewPortfolio {
                owner_id: adviser.id,
                uuid: None,
                name: "growth".to_string(),
                topics: String::new(),
                note: String::new(),
            })
            .await
            .unwrap();
        store.link(Relation::Follow { follower: fan.id, followee: adviser.id }).await.unwrap();
        store.link(Relation::Contract { user: fan.id, adviser: adviser.id }).await.unwrap();
        store.link(Relation::Subscription { user: fan.id, portfolio: portfolio.id }).await.unwrap();

        assert!(store.delete_user(fan.id).await.unwrap());
        assert!(store.get_statistic(fan.id).await.unwrap().is_none());

        let ledger = store.get_statistic(adviser.id).await.unwrap().unwrap();
        assert_eq!(ledger, store.recount_statistic(adviser.id).await.unwrap());
        assert_eq!(ledger.portfolios_count, 1);
        assert_eq!(ledger.fans_count, 0);

        store.delete_user(adviser.id).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore] // Requires database
    async fn test_concurrent_links_count_exactly_against_postgres() {
        let store = Arc::new(store().await);
        let adviser = store.create_user(new_user(&unique("adv"), UserClass::Adviser)).await.unwrap();

        let mut fans = Vec::new();
        for i in 0..16 {
            fans.push(store.create_user(new_user(&unique(&format!("fan{}", i)), UserClass::Investor)).await.unwrap());
        }

        let mut handles = Vec::new();
        for fan in &fans {
            let store = store.clone();
            let relation = Relation::Follow { follower: fan.id, followee: adviser.id };
            handles.push(tokio::spawn(async move { store.link(relation).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        let ledger = store.get_statistic(adviser.id).await.unwrap().unwrap();
        assert_eq!(ledger.fans_count, 16);
        assert_eq!(ledger, store.recount_statistic(adviser.id).await.unwrap());

        for fan in &fans {
            store.delete_user(fan.id).await.unwrap();
        }
        let ledger = store.get_statistic(adviser.id).await.unwrap().unwrap();
        assert_eq!(ledger.fans_count, 0);
        store.delete_user(adviser.id).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore] // Requires database
    async fn test_delete_user_waits_for_pending_unlink() {
        let store = Arc::new(store().await);
        let leaving = store.create_user(new_user(&unique("leaving"), UserClass::Investor)).await.unwrap();
        let staying = store.create_user(new_user(&unique("staying"), UserClass::Investor)).await.unwrap();
        let adviser = store.create_user(new_user(&unique("adv"), UserClass::Adviser)).await.unwrap();
        let relation = Relation::Follow { follower: leaving.id, followee: adviser.id };
        store.link(relation).await.unwrap();
        store.link(Relation::Follow { follower: staying.id, followee: adviser.id }).await.unwrap();

        // An unlink that has removed the edge but not yet committed.
        let mut pending = store.pool().begin().await.unwrap();
        let owner = sqlx::query_scalar::<_, i64>(
            "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2 RETURNING followee_id",
        )
        .bind(leaving.id)
        .bind(adviser.id)
        .fetch_one(&mut *pending)
        .await
        .unwrap();
        apply_adjustments(&mut pending, &ledger::on_unlink(&relation, owner)).await.unwrap();

        let deleting = {
            let store = store.clone();
            let user_id = leaving.id;
            tokio::spawn(async move { store.delete_user(user_id).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        pending.commit().await.unwrap();
        assert!(deleting.await.unwrap().unwrap());

        let ledger = store.get_statistic(adviser.id).await.unwrap().unwrap();
        assert_eq!(ledger.fans_count, 1);
        assert_eq!(ledger, store.recount_statistic(adviser.id).await.unwrap());

        store.delete_user(staying.id).await.unwrap();
        store.delete_user(adviser.id).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore] // Requires database
    async fn test_unlink_racing_delete_user_keeps_ledger_exact() {
        let store = Arc::new(store().await);
        let adviser = store.create_user(new_user(&unique("adv"), UserClass::Adviser)).await.unwrap();
        let staying = store.create_user(new_user(&unique("staying"), UserClass::Investor)).await.unwrap();
        store.link(Relation::Follow { follower: staying.id, followee: adviser.id }).await.unwrap();

        for _ in 0..10 {
            let leaving = store.create_user(new_user(&unique("leaving"), UserClass::Investor)).await.unwrap();
            let relation = Relation::Follow { follower: leaving.id, followee: adviser.id };
            store.link(relation).await.unwrap();
            store.link(Relation::Contract { user: leaving.id, adviser: adviser.id }).await.unwrap();

            let unlinking = {
                let store = store.clone();
                tokio::spawn(async move { store.unlink(relation).await })
            };
            let deleting = {
                let store = store.clone();
                tokio::spawn(async move { store.delete_user(leaving.id).await })
            };
            unlinking.await.unwrap().unwrap();
            assert!(deleting.await.unwrap().unwrap());

            let ledger = store.get_statistic(adviser.id).await.unwrap().unwrap();
            assert_eq!(ledger, store.recount_statistic(adviser.id).await.unwrap());
            assert_eq!(ledger.fans_count, 1);
            assert_eq!(ledger.sign_contract_count, 0);
        }

        store.delete_user(staying.id).await.unwrap();
        store.delete_user(adviser.id).await.unwrap();
    }
}

//! Statistic ledger.
//!
//! Every counted relation maps to exactly one counter on one user. The
//! functions here compute the [`Adjustment`]s a change implies; stores apply
//! them as relative updates inside the same transaction as the row change.

use crate::models::StatisticRecord;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("counter {counter:?} of user {user_id} would drop below zero")]
    Underflow { user_id: i64, counter: Counter },

    #[error("statistic record missing for user {0}")]
    MissingRecord(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Fans,
    Followings,
    SignContract,
    RecommendSecs,
    Portfolios,
    PortfoliosBySubscribe,
    Viewpoints,
}

impl Counter {
    pub const ALL: [Counter; 7] = [
        Counter::Fans,
        Counter::Followings,
        Counter::SignContract,
        Counter::RecommendSecs,
        Counter::Portfolios,
        Counter::PortfoliosBySubscribe,
        Counter::Viewpoints,
    ];

    /// Column in `user_statistics`
    pub fn column(&self) -> &'static str {
        match self {
            Counter::Fans => "fans_count",
            Counter::Followings => "followings_count",
            Counter::SignContract => "sign_contract_count",
            Counter::RecommendSecs => "recommend_secs_count",
            Counter::Portfolios => "portfolios_count",
            Counter::PortfoliosBySubscribe => "portfolios_bysubscribe_count",
            Counter::Viewpoints => "viewpoints_count",
        }
    }
}

/// Relative change of one counter of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub user_id: i64,
    pub counter: Counter,
    pub delta: i64,
}

impl Adjustment {
    pub fn new(user_id: i64, counter: Counter, delta: i64) -> Self {
        Self { user_id, counter, delta }
    }
}

/// A counted edge between a user and a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Follow { follower: i64, followee: i64 },
    Subscription { user: i64, portfolio: i64 },
    Contract { user: i64, adviser: i64 },
}

impl Relation {
    /// Acting user of the edge
    pub fn user_id(&self) -> i64 {
        match *self {
            Relation::Follow { follower, .. } => follower,
            Relation::Subscription { user, .. } => user,
            Relation::Contract { user, .. } => user,
        }
    }

    pub fn target_id(&self) -> i64 {
        match *self {
            Relation::Follow { followee, .. } => followee,
            Relation::Subscription { portfolio, .. } => portfolio,
            Relation::Contract { adviser, .. } => adviser,
        }
    }

    /// Subscriptions point at portfolios, never at users.
    pub fn is_self_edge(&self) -> bool {
        match *self {
            Relation::Follow { follower, followee } => follower == followee,
            Relation::Contract { user, adviser } => user == adviser,
            Relation::Subscription { .. } => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Relation::Follow { .. } => "follow",
            Relation::Subscription { .. } => "subscription",
            Relation::Contract { .. } => "contract",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Portfolio,
    Viewpoint,
    Recommendation,
}

impl ContentKind {
    pub fn counter(&self) -> Counter {
        match self {
            ContentKind::Portfolio => Counter::Portfolios,
            ContentKind::Viewpoint => Counter::Viewpoints,
            ContentKind::Recommendation => Counter::RecommendSecs,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            ContentKind::Portfolio => "portfolios",
            ContentKind::Viewpoint => "viewpoints",
            ContentKind::Recommendation => "recommendations",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Portfolio => "portfolio",
            ContentKind::Viewpoint => "viewpoint",
            ContentKind::Recommendation => "recommendation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentRef {
    pub kind: ContentKind,
    pub id: i64,
}

/// Policy knobs for edge creation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerPolicy {
    pub allow_self_edges: bool,
}

impl LedgerPolicy {
    pub fn permits(&self, relation: &Relation) -> bool {
        self.allow_self_edges || !relation.is_self_edge()
    }
}

fn edge_adjustments(relation: &Relation, target_owner: i64, delta: i64) -> Vec<Adjustment> {
    match *relation {
        Relation::Follow { follower, followee } => vec![
            Adjustment::new(follower, Counter::Followings, delta),
            Adjustment::new(followee, Counter::Fans, delta),
        ],
        Relation::Subscription { .. } => {
            vec![Adjustment::new(target_owner, Counter::PortfoliosBySubscribe, delta)]
        }
        Relation::Contract { adviser, .. } => {
            vec![Adjustment::new(adviser, Counter::SignContract, delta)]
        }
    }
}

/// Adjustments for a newly inserted edge. `target_owner` is the owner of the
/// subscribed portfolio; ignored for the user-to-user edges.
pub fn on_link(relation: &Relation, target_owner: i64) -> Vec<Adjustment> {
    edge_adjustments(relation, target_owner, 1)
}

pub fn on_unlink(relation: &Relation, target_owner: i64) -> Vec<Adjustment> {
    edge_adjustments(relation, target_owner, -1)
}

/// Adjustments for the edges removed while deleting `deleted`. The deleted
/// user's own row goes away with it, so only counterparts are touched. One
/// adjustment per counter, ordered by user id so concurrent deletes lock
/// statistic rows in the same order.
pub fn on_user_deleted(deleted: i64, removed: &[(Relation, i64)]) -> Vec<Adjustment> {
    let mut totals: HashMap<(i64, Counter), i64> = HashMap::new();
    for (relation, target_owner) in removed {
        for adjustment in on_unlink(relation, *target_owner) {
            if adjustment.user_id != deleted {
                *totals.entry((adjustment.user_id, adjustment.counter)).or_default() += adjustment.delta;
            }
        }
    }

    let mut adjustments: Vec<Adjustment> = totals
        .into_iter()
        .map(|((user_id, counter), delta)| Adjustment::new(user_id, counter, delta))
        .collect();
    adjustments.sort_by_key(|a| (a.user_id, a.counter.column()));
    adjustments
}

pub fn on_content_created(kind: ContentKind, owner: i64) -> Vec<Adjustment> {
    vec![Adjustment::new(owner, kind.counter(), 1)]
}

/// Deleting a portfolio also drops its subscriptions, so the owner's
/// by-subscribe counter falls by `cascaded_subscriptions`.
pub fn on_content_deleted(kind: ContentKind, owner: i64, cascaded_subscriptions: i64) -> Vec<Adjustment> {
    let mut adjustments = vec![Adjustment::new(owner, kind.counter(), -1)];
    if kind == ContentKind::Portfolio && cascaded_subscriptions > 0 {
        adjustments.push(Adjustment::new(
            owner,
            Counter::PortfoliosBySubscribe,
            -cascaded_subscriptions,
        ));
    }
    adjustments
}

impl StatisticRecord {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    pub fn get(&self, counter: Counter) -> i64 {
        match counter {
            Counter::Fans => self.fans_count,
            Counter::Followings => self.followings_count,
            Counter::SignContract => self.sign_contract_count,
            Counter::RecommendSecs => self.recommend_secs_count,
            Counter::Portfolios => self.portfolios_count,
            Counter::PortfoliosBySubscribe => self.portfolios_bysubscribe_count,
            Counter::Viewpoints => self.viewpoints_count,
        }
    }

    fn slot(&mut self, counter: Counter) -> &mut i64 {
        match counter {
            Counter::Fans => &mut self.fans_count,
            Counter::Followings => &mut self.followings_count,
            Counter::SignContract => &mut self.sign_contract_count,
            Counter::RecommendSecs => &mut self.recommend_secs_count,
            Counter::Portfolios => &mut self.portfolios_count,
            Counter::PortfoliosBySubscribe => &mut self.portfolios_bysubscribe_count,
            Counter::Viewpoints => &mut self.viewpoints_count,
        }
    }

    /// Applies a relative change, refusing to go negative.
    pub fn apply(&mut self, counter: Counter, delta: i64) -> Result<(), LedgerError> {
        let user_id = self.user_id;
        let slot = self.slot(counter);
        match slot.checked_add(delta) {
            Some(value) if value >= 0 => {
                *slot = value;
                Ok(())
            }
            _ => Err(LedgerError::Underflow { user_id, counter }),
        }
    }

    /// Counters where `self` (the ledger) disagrees with `actual` (a recount).
    pub fn drift(&self, actual: &StatisticRecord) -> Vec<(Counter, i64, i64)> {
        Counter::ALL
            .iter()
            .filter(|c| self.get(**c) != actual.get(**c))
            .map(|c| (*c, self.get(*c), actual.get(*c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_touches_both_sides() {
        let relation = Relation::Follow { follower: 1, followee: 2 };
        let adjustments = on_link(&relation, 0);
        assert_eq!(
            adjustments,
            vec![
                Adjustment::new(1, Counter::Followings, 1),
                Adjustment::new(2, Counter::Fans, 1),
            ]
        );
        let reversed = on_unlink(&relation, 0);
        assert!(reversed.iter().all(|a| a.delta == -1));
    }

    #[test]
    fn test_subscription_credits_portfolio_owner() {
        let relation = Relation::Subscription { user: 7, portfolio: 40 };
        let adjustments = on_link(&relation, 3);
        assert_eq!(adjustments, vec![Adjustment::new(3, Counter::PortfoliosBySubscribe, 1)]);
    }

    #[test]
    fn test_contract_credits_adviser_only() {
        let relation = Relation::Contract { user: 7, adviser: 3 };
        assert_eq!(on_link(&relation, 0), vec![Adjustment::new(3, Counter::SignContract, 1)]);
    }

    #[test]
    fn test_user_deleted_touches_counterparts_only() {
        let removed = [
            (Relation::Follow { follower: 1, followee: 2 }, 2),
            (Relation::Follow { follower: 3, followee: 1 }, 1),
            (Relation::Follow { follower: 1, followee: 1 }, 1),
            (Relation::Contract { user: 1, adviser: 2 }, 2),
            (Relation::Subscription { user: 1, portfolio: 10 }, 2),
            (Relation::Subscription { user: 1, portfolio: 11 }, 2),
            (Relation::Subscription { user: 1, portfolio: 12 }, 1),
        ];
        assert_eq!(
            on_user_deleted(1, &removed),
            vec![
                Adjustment::new(2, Counter::Fans, -1),
                Adjustment::new(2, Counter::PortfoliosBySubscribe, -2),
                Adjustment::new(2, Counter::SignContract, -1),
                Adjustment::new(3, Counter::Followings, -1),
            ]
        );
        assert!(on_user_deleted(1, &[]).is_empty());
    }

    #[test]
    fn test_portfolio_delete_cascades_subscriptions() {
        let adjustments = on_content_deleted(ContentKind::Portfolio, 5, 4);
        assert_eq!(
            adjustments,
            vec![
                Adjustment::new(5, Counter::Portfolios, -1),
                Adjustment::new(5, Counter::PortfoliosBySubscribe, -4),
            ]
        );
        assert_eq!(on_content_deleted(ContentKind::Viewpoint, 5, 0).len(), 1);
    }

    #[test]
    fn test_apply_refuses_negative() {
        let mut record = StatisticRecord::new(9);
        record.apply(Counter::Fans, 1).unwrap();
        record.apply(Counter::Fans, -1).unwrap();
        let err = record.apply(Counter::Fans, -1).unwrap_err();
        assert_eq!(err, LedgerError::Underflow { user_id: 9, counter: Counter::Fans });
        assert_eq!(record.fans_count, 0);
    }

    #[test]
    fn test_self_edge_policy() {
        let own = Relation::Follow { follower: 1, followee: 1 };
        assert!(!LedgerPolicy::default().permits(&own));
        assert!(LedgerPolicy { allow_self_edges: true }.permits(&own));
        assert!(LedgerPolicy::default().permits(&Relation::Subscription { user: 1, portfolio: 1 }));
    }

    #[test]
    fn test_drift_reports_mismatches() {
        let mut ledger = StatisticRecord::new(1);
        ledger.fans_count = 3;
        let mut actual = StatisticRecord::new(1);
        actual.fans_count = 2;
        assert_eq!(ledger.drift(&actual), vec![(Counter::Fans, 3, 2)]);
        assert!(actual.drift(&actual.clone()).is_empty());
    }
}

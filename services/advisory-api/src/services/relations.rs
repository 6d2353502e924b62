use super::AdvisoryService;
use crate::errors::Result;
use crate::ledger::Relation;
use crate::models::IdsRequest;
use std::collections::HashSet;
use tracing::{debug, info};
use validator::Validate;

/// Parses `1,2,3`. Non-numeric entries are dropped and duplicates collapse
/// onto their first occurrence.
pub fn parse_ids(raw: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(id) = part.parse::<i64>() {
            if seen.insert(id) {
                ids.push(id);
            }
        }
    }
    ids
}

impl AdvisoryService {
    /// Links or unlinks each id in its own transaction and returns the ids
    /// that actually changed. A store error stops the batch; ids committed
    /// before it stay committed.
    async fn apply_batch<F>(&self, user_id: i64, request: &IdsRequest, cancel: bool, edge: F) -> Result<Vec<i64>>
    where
        F: Fn(i64, i64) -> Relation,
    {
        request.validate()?;
        self.acting_user(user_id).await?;

        let mut changed = Vec::new();
        for target in parse_ids(&request.ids) {
            let relation = edge(user_id, target);
            let applied = if cancel {
                self.store.unlink(relation).await?
            } else if !self.settings.policy.permits(&relation) {
                debug!(kind = relation.kind(), user_id, "self edge skipped");
                false
            } else {
                self.store.link(relation).await?
            };

            if applied {
                changed.push(target);
            }
        }

        info!(user_id, cancel, changed = changed.len(), "edge batch processed");
        Ok(changed)
    }

    pub async fn follow_advisers(&self, user_id: i64, request: &IdsRequest, cancel: bool) -> Result<Vec<i64>> {
        self.apply_batch(user_id, request, cancel, |follower, followee| Relation::Follow {
            follower,
            followee,
        })
        .await
    }

    pub async fn subscribe_portfolios(&self, user_id: i64, request: &IdsRequest, cancel: bool) -> Result<Vec<i64>> {
        self.apply_batch(user_id, request, cancel, |user, portfolio| Relation::Subscription {
            user,
            portfolio,
        })
        .await
    }

    pub async fn sign_contracts(&self, user_id: i64, request: &IdsRequest, cancel: bool) -> Result<Vec<i64>> {
        self.apply_batch(user_id, request, cancel, |user, adviser| Relation::Contract { user, adviser })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("1,2,3"), vec![1, 2, 3]);
        assert_eq!(parse_ids(" 4 , x, ,4,-5,6"), vec![4, 6]);
        assert!(parse_ids("").is_empty());
        assert!(parse_ids("99999999999999999999").is_empty());
    }

    #[test]
    fn test_parse_ids_keeps_first_occurrence() {
        assert_eq!(parse_ids("3,1,3,2,1"), vec![3, 1, 2]);

        let raw: Vec<String> = (0..20_000).map(|i| (i % 5_000).to_string()).collect();
        let ids = parse_ids(&raw.join(","));
        assert_eq!(ids.len(), 5_000);
        assert_eq!(ids[..3], [0, 1, 2]);
    }
}

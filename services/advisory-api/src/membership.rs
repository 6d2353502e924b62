use crate::errors::Result;
use crate::store::Store;
use std::collections::HashSet;

/// Edge sets of the requesting user, loaded once per request.
#[derive(Debug, Clone, Default)]
pub struct Membership {
    followees: HashSet<i64>,
    contracted: HashSet<i64>,
    subscribed: HashSet<i64>,
}

impl Membership {
    /// Anonymous viewers belong to nothing.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub async fn load(store: &dyn Store, viewer: Option<i64>) -> Result<Self> {
        let user_id = match viewer {
            Some(id) => id,
            None => return Ok(Self::anonymous()),
        };

        Ok(Self {
            followees: store.followee_ids(user_id).await?,
            contracted: store.contracted_adviser_ids(user_id).await?,
            subscribed: store.subscribed_portfolio_ids(user_id).await?,
        })
    }

    pub fn from_sets(followees: HashSet<i64>, contracted: HashSet<i64>, subscribed: HashSet<i64>) -> Self {
        Self {
            followees,
            contracted,
            subscribed,
        }
    }

    pub fn follows(&self, adviser_id: i64) -> bool {
        self.followees.contains(&adviser_id)
    }

    pub fn has_contract(&self, adviser_id: i64) -> bool {
        self.contracted.contains(&adviser_id)
    }

    pub fn subscribes(&self, portfolio_id: i64) -> bool {
        self.subscribed.contains(&portfolio_id)
    }
}

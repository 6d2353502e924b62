use super::AdvisoryService;
use crate::errors::{ApiError, Result};
use crate::ledger::{ContentKind, ContentRef};
use crate::models::{
    CreatePortfolioRequest, CreateRecommendationRequest, CreateViewpointRequest, NewPortfolio,
    NewRecommendation, NewViewpoint, Portfolio, Recommendation, User, Viewpoint,
};
use crate::presenters::viewpoint_url;
use tracing::info;
use validator::Validate;

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl AdvisoryService {
    async fn require_adviser(&self, user_id: i64) -> Result<User> {
        let user = self.acting_user(user_id).await?;
        if !user.is_adviser() {
            return Err(ApiError::Forbidden("only advisers can manage content".to_string()));
        }
        Ok(user)
    }

    pub async fn create_portfolio(&self, owner_id: i64, request: CreatePortfolioRequest) -> Result<Portfolio> {
        request.validate()?;
        self.require_adviser(owner_id).await?;

        let portfolio = self
            .store
            .create_portfolio(NewPortfolio {
                owner_id,
                uuid: blank_to_none(request.uuid),
                name: request.name.trim().to_string(),
                topics: request.topics,
                note: request.note,
            })
            .await?;

        info!(owner_id, portfolio_id = portfolio.id, "portfolio created");
        Ok(portfolio)
    }

    pub async fn create_viewpoint(&self, owner_id: i64, request: CreateViewpointRequest) -> Result<Viewpoint> {
        request.validate()?;
        self.require_adviser(owner_id).await?;

        let viewpoint = self
            .store
            .create_viewpoint(NewViewpoint {
                owner_id,
                title: request.title.trim().to_string(),
                digest: request.digest,
                content: request.content,
                pub_daytime: request.pub_daytime,
                sub_picture: blank_to_none(request.sub_picture),
            })
            .await?;

        info!(owner_id, viewpoint_id = viewpoint.id, "viewpoint created");
        Ok(viewpoint)
    }

    pub async fn create_recommendation(
        &self,
        owner_id: i64,
        request: CreateRecommendationRequest,
    ) -> Result<Recommendation> {
        request.validate()?;
        if let Some(sell_daytime) = request.sell_daytime {
            if sell_daytime < request.buy_daytime {
                return Err(ApiError::Validation("sell_daytime: must not precede buy_daytime".to_string()));
            }
        }
        if request.sell_price.is_some() != request.sell_daytime.is_some() {
            return Err(ApiError::Validation(
                "sell_price: sell price and sell time go together".to_string(),
            ));
        }
        self.require_adviser(owner_id).await?;

        let recommendation = self
            .store
            .create_recommendation(NewRecommendation {
                owner_id,
                sec_idxid: request.sec_idxid,
                buy_daytime: request.buy_daytime,
                buy_price: request.buy_price,
                sell_daytime: request.sell_daytime,
                sell_price: request.sell_price,
            })
            .await?;

        info!(owner_id, recommendation_id = recommendation.id, "recommendation created");
        Ok(recommendation)
    }

    /// Owner-only. Missing rows, or rows of another owner, are NotFound.
    pub async fn delete_content(&self, owner_id: i64, kind: ContentKind, content_id: i64) -> Result<()> {
        self.require_adviser(owner_id).await?;

        let deleted = self
            .store
            .delete_content(owner_id, ContentRef { kind, id: content_id })
            .await?;
        if !deleted {
            return Err(ApiError::NotFound(kind.as_str().to_string()));
        }

        info!(owner_id, content_id, kind = kind.as_str(), "content deleted");
        Ok(())
    }

    /// Short link to the public viewpoint page. No fallback to the long URL.
    pub async fn share_viewpoint(&self, viewpoint_id: i64) -> Result<String> {
        let viewpoint = self
            .store
            .get_viewpoint(viewpoint_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("viewpoint".to_string()))?;

        let long_url = viewpoint_url(&self.settings.public_base_url, viewpoint.id);
        self.shortener.shorten(&long_url).await
    }
}

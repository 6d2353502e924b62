use super::AdvisoryService;
use crate::envelope::{Page, PageRequest};
use crate::errors::{ApiError, Result};
use crate::membership::Membership;
use crate::models::AdviserBrief;
use crate::presenters::{AdviserResume, AdviserView, PortfolioView, RecommendationView, ViewpointView};
use crate::sorting::{members_first, AdviserSort, PortfolioSort, RecommendationOrder};
use crate::store::RecommendationFilter;
use chrono::{Duration, Utc};
use std::collections::HashMap;

/// Trending recommendations only look this far back.
pub const TRENDING_WINDOW_DAYS: i64 = 60;

const FEATURED_ADVISERS: u32 = 3;
const HOME_RECOMMENDATIONS: u32 = 3;

impl AdvisoryService {
    async fn briefs_for(&self, owner_ids: impl Iterator<Item = i64>) -> Result<HashMap<i64, AdviserBrief>> {
        let mut ids: Vec<i64> = owner_ids.collect();
        ids.sort_unstable();
        ids.dedup();
        self.store.adviser_briefs(&ids).await
    }

    /// Home page: the three advisers with the most fans.
    pub async fn featured_advisers(&self, viewer: Option<i64>) -> Result<Vec<AdviserView>> {
        let membership = Membership::load(self.store.as_ref(), viewer).await?;
        let page = self
            .store
            .list_advisers(AdviserSort::Fans, PageRequest::first(FEATURED_ADVISERS))
            .await?;

        Ok(page
            .results
            .into_iter()
            .map(|card| AdviserView::new(card, &membership))
            .collect())
    }

    pub async fn search_advisers(
        &self,
        viewer: Option<i64>,
        sort: AdviserSort,
        page: PageRequest,
    ) -> Result<Page<AdviserView>> {
        let membership = Membership::load(self.store.as_ref(), viewer).await?;
        let page = self.store.list_advisers(sort, page).await?;
        let mut views = page.map(|card| AdviserView::new(card, &membership));

        if viewer.is_some() {
            views.results = members_first(views.results, |v| v.is_follow);
        }
        Ok(views)
    }

    pub async fn adviser_base_info(&self, viewer: Option<i64>, adviser_id: i64) -> Result<AdviserView> {
        let card = self
            .store
            .get_adviser(adviser_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("adviser".to_string()))?;
        let membership = Membership::load(self.store.as_ref(), viewer).await?;
        Ok(AdviserView::new(card, &membership))
    }

    pub async fn adviser_resume(&self, adviser_id: i64) -> Result<AdviserResume> {
        let info = self
            .store
            .get_adviser_info(adviser_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("adviser".to_string()))?;
        Ok(AdviserResume {
            experience: info.experience,
            good_at: info.good_at,
        })
    }

    pub async fn adviser_viewpoints(&self, adviser_id: i64, page: PageRequest) -> Result<Page<ViewpointView>> {
        let page = self.store.list_viewpoints(Some(adviser_id), page).await?;
        let base_url = self.settings.public_base_url.clone();
        Ok(page.map(|v| ViewpointView::new(v, None, &base_url)))
    }

    pub async fn adviser_recommendations(
        &self,
        adviser_id: i64,
        page: PageRequest,
    ) -> Result<Page<RecommendationView>> {
        let filter = RecommendationFilter {
            owner: Some(adviser_id),
            since: None,
        };
        let page = self
            .store
            .list_recommendations(filter, RecommendationOrder::Newest, page)
            .await?;
        Ok(page.map(|r| RecommendationView::new(r, None)))
    }

    pub async fn adviser_portfolios(
        &self,
        viewer: Option<i64>,
        adviser_id: i64,
        page: PageRequest,
    ) -> Result<Page<PortfolioView>> {
        let membership = Membership::load(self.store.as_ref(), viewer).await?;
        let page = self
            .store
            .list_portfolios(Some(adviser_id), PortfolioSort::Newest, page)
            .await?;
        Ok(page.map(|p| PortfolioView::new(p, None, &membership)))
    }

    /// Best performing recent recommendations. `page` of None is the home
    /// variant: the top three, unpaginated.
    pub async fn trending_recommendations(&self, page: Option<PageRequest>) -> Result<Page<RecommendationView>> {
        let filter = RecommendationFilter {
            owner: None,
            since: Some(Utc::now() - Duration::days(TRENDING_WINDOW_DAYS)),
        };
        let request = page.unwrap_or_else(|| PageRequest::first(HOME_RECOMMENDATIONS));
        let page = self
            .store
            .list_recommendations(filter, RecommendationOrder::Trending, request)
            .await?;

        let briefs = self.briefs_for(page.results.iter().map(|r| r.owner_id)).await?;
        Ok(page.map(|r| {
            let brief = briefs.get(&r.owner_id).cloned();
            RecommendationView::new(r, brief)
        }))
    }

    pub async fn search_portfolios(
        &self,
        viewer: Option<i64>,
        sort: PortfolioSort,
        page: PageRequest,
    ) -> Result<Page<PortfolioView>> {
        let membership = Membership::load(self.store.as_ref(), viewer).await?;
        let page = self.store.list_portfolios(None, sort, page).await?;
        let briefs = self.briefs_for(page.results.iter().map(|p| p.owner_id)).await?;

        let mut views = page.map(|p| {
            let brief = briefs.get(&p.owner_id).cloned();
            PortfolioView::new(p, brief, &membership)
        });
        if viewer.is_some() {
            views.results = members_first(views.results, |v| v.is_subscribe);
        }
        Ok(views)
    }

    pub async fn portfolio_base_info(&self, viewer: Option<i64>, portfolio_id: i64) -> Result<PortfolioView> {
        let portfolio = self
            .store
            .get_portfolio(portfolio_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("portfolio".to_string()))?;
        let membership = Membership::load(self.store.as_ref(), viewer).await?;
        let brief = self
            .store
            .adviser_briefs(&[portfolio.owner_id])
            .await?
            .remove(&portfolio.owner_id);

        Ok(PortfolioView::new(portfolio, brief, &membership))
    }
}

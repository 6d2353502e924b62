use crate::auth::{AuthUser, MaybeUser};
use crate::envelope::Envelope;
use crate::errors::ApiError;
use crate::ledger::ContentKind;
use crate::metrics;
use crate::models::{
    ActionQuery, ApplyJobRequest, CreatePortfolioRequest, CreateRecommendationRequest,
    CreateViewpointRequest, ForgetPasswordRequest, IdsRequest, ListQuery, RebindMobileRequest,
    RegisterRequest, SendSecurityCodeRequest, SetPasswordRequest, UpdateBaseInfoRequest,
};
use crate::services::AdvisoryService;
use crate::sorting::{AdviserSort, PortfolioSort};
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::sync::Arc;

type Service = web::Data<Arc<AdvisoryService>>;
type HandlerResult = Result<HttpResponse, ApiError>;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "advisory-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint() -> HttpResponse {
    match metrics::metrics_handler() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(Envelope::fail(format!(
            "failed to gather metrics: {}",
            e
        ))),
    }
}

// --- accounts -------------------------------------------------------------

pub async fn send_security_code(service: Service, request: web::Json<SendSecurityCodeRequest>) -> HandlerResult {
    let ttl = service.send_security_code(request.into_inner()).await?;
    Ok(Envelope::ok_msg("security code sent", json!({ "expire_secs": ttl })).into_response())
}

pub async fn register(service: Service, request: web::Json<RegisterRequest>) -> HandlerResult {
    let user = service.register(request.into_inner()).await?;
    Ok(Envelope::ok_msg("registered", user).into_response())
}

pub async fn forget_password(service: Service, request: web::Json<ForgetPasswordRequest>) -> HandlerResult {
    service.forget_password(request.into_inner()).await?;
    Ok(Envelope::done().into_response())
}

pub async fn current_user_info(service: Service, user: AuthUser) -> HandlerResult {
    let view = service.current_user(user.id()).await?;
    Ok(Envelope::ok(view).into_response())
}

pub async fn update_base_info(
    service: Service,
    user: AuthUser,
    request: web::Json<UpdateBaseInfoRequest>,
) -> HandlerResult {
    let view = service.update_base_info(user.id(), request.into_inner()).await?;
    Ok(Envelope::ok(view).into_response())
}

pub async fn set_password(service: Service, user: AuthUser, request: web::Json<SetPasswordRequest>) -> HandlerResult {
    service.set_password(user.id(), request.into_inner()).await?;
    Ok(Envelope::done().into_response())
}

pub async fn rebind_mobile(service: Service, user: AuthUser, request: web::Json<RebindMobileRequest>) -> HandlerResult {
    service.rebind_mobile(user.id(), request.into_inner()).await?;
    Ok(Envelope::done().into_response())
}

pub async fn apply_job(service: Service, request: web::Json<ApplyJobRequest>) -> HandlerResult {
    let application = service.apply_adviser_job(request.into_inner()).await?;
    Ok(Envelope::ok(json!({ "id": application.id, "status": application.status })).into_response())
}

// --- relations ------------------------------------------------------------

/// Picks the response key for the changed ids.
fn ids_payload(cancel: bool, link_key: &str, cancel_key: &str, ids: Vec<i64>) -> serde_json::Value {
    let key = if cancel { cancel_key } else { link_key };
    let mut payload = serde_json::Map::new();
    payload.insert(key.to_string(), json!(ids));
    serde_json::Value::Object(payload)
}

pub async fn follow_advisers(
    service: Service,
    user: AuthUser,
    action: web::Query<ActionQuery>,
    request: web::Json<IdsRequest>,
) -> HandlerResult {
    let cancel = action.is_cancel();
    let ids = service.follow_advisers(user.id(), &request, cancel).await?;
    Ok(Envelope::ok(ids_payload(cancel, "followeeids", "cancel_followeeids", ids)).into_response())
}

pub async fn subscribe_portfolios(
    service: Service,
    user: AuthUser,
    action: web::Query<ActionQuery>,
    request: web::Json<IdsRequest>,
) -> HandlerResult {
    let cancel = action.is_cancel();
    let ids = service.subscribe_portfolios(user.id(), &request, cancel).await?;
    Ok(Envelope::ok(ids_payload(cancel, "subscribeids", "cancelids", ids)).into_response())
}

pub async fn sign_contracts(
    service: Service,
    user: AuthUser,
    action: web::Query<ActionQuery>,
    request: web::Json<IdsRequest>,
) -> HandlerResult {
    let cancel = action.is_cancel();
    let ids = service.sign_contracts(user.id(), &request, cancel).await?;
    Ok(Envelope::ok(ids_payload(cancel, "signids", "cancelids", ids)).into_response())
}

pub async fn user_statistic(service: Service, user_id: web::Path<i64>) -> HandlerResult {
    let statistic = service.get_statistic(*user_id).await?;
    Ok(Envelope::ok(statistic).into_response())
}

// --- advisers -------------------------------------------------------------

pub async fn featured_advisers(service: Service, viewer: MaybeUser) -> HandlerResult {
    let advisers = service.featured_advisers(viewer.id()).await?;
    Ok(Envelope::ok(json!({ "advisers": advisers })).into_response())
}

pub async fn search_advisers(service: Service, viewer: MaybeUser, query: web::Query<ListQuery>) -> HandlerResult {
    let page = service.page(query.page, query.page_size)?;
    let sort = AdviserSort::from_param(query.kind.as_deref());
    let advisers = service.search_advisers(viewer.id(), sort, page).await?;
    Ok(Envelope::ok(json!({ "advisers": advisers })).into_response())
}

pub async fn adviser_base_info(service: Service, viewer: MaybeUser, adviser_id: web::Path<i64>) -> HandlerResult {
    let adviser = service.adviser_base_info(viewer.id(), *adviser_id).await?;
    Ok(Envelope::ok(adviser).into_response())
}

pub async fn adviser_resume(service: Service, adviser_id: web::Path<i64>) -> HandlerResult {
    let resume = service.adviser_resume(*adviser_id).await?;
    Ok(Envelope::ok(resume).into_response())
}

pub async fn adviser_viewpoints(
    service: Service,
    adviser_id: web::Path<i64>,
    query: web::Query<ListQuery>,
) -> HandlerResult {
    let page = service.page(query.page, query.page_size)?;
    let viewpoints = service.adviser_viewpoints(*adviser_id, page).await?;
    Ok(Envelope::ok(json!({ "viewpoints": viewpoints })).into_response())
}

pub async fn adviser_recommendations(
    service: Service,
    adviser_id: web::Path<i64>,
    query: web::Query<ListQuery>,
) -> HandlerResult {
    let page = service.page(query.page, query.page_size)?;
    let recommendations = service.adviser_recommendations(*adviser_id, page).await?;
    Ok(Envelope::ok(json!({ "recommend_secs": recommendations })).into_response())
}

pub async fn adviser_portfolios(
    service: Service,
    viewer: MaybeUser,
    adviser_id: web::Path<i64>,
    query: web::Query<ListQuery>,
) -> HandlerResult {
    let page = service.page(query.page, query.page_size)?;
    let portfolios = service.adviser_portfolios(viewer.id(), *adviser_id, page).await?;
    Ok(Envelope::ok(json!({ "portfolios": portfolios })).into_response())
}

// --- recommendations and portfolios ---------------------------------------

pub async fn home_recommendations(service: Service) -> HandlerResult {
    let recommendations = service.trending_recommendations(None).await?;
    Ok(Envelope::ok(json!({ "recommend_secs": recommendations })).into_response())
}

pub async fn trending_recommendations(service: Service, query: web::Query<ListQuery>) -> HandlerResult {
    let page = service.page(query.page, query.page_size)?;
    let recommendations = service.trending_recommendations(Some(page)).await?;
    Ok(Envelope::ok(json!({ "recommend_secs": recommendations })).into_response())
}

pub async fn search_portfolios(service: Service, viewer: MaybeUser, query: web::Query<ListQuery>) -> HandlerResult {
    let page = service.page(query.page, query.page_size)?;
    let sort = PortfolioSort::from_param(query.kind.as_deref());
    let portfolios = service.search_portfolios(viewer.id(), sort, page).await?;
    Ok(Envelope::ok(json!({ "portfolios": portfolios })).into_response())
}

pub async fn portfolio_base_info(service: Service, viewer: MaybeUser, portfolio_id: web::Path<i64>) -> HandlerResult {
    let portfolio = service.portfolio_base_info(viewer.id(), *portfolio_id).await?;
    Ok(Envelope::ok(portfolio).into_response())
}

// --- adviser content ------------------------------------------------------

pub async fn create_portfolio(
    service: Service,
    user: AuthUser,
    request: web::Json<CreatePortfolioRequest>,
) -> HandlerResult {
    let portfolio = service.create_portfolio(user.id(), request.into_inner()).await?;
    Ok(Envelope::ok(portfolio).into_response())
}

pub async fn create_viewpoint(
    service: Service,
    user: AuthUser,
    request: web::Json<CreateViewpointRequest>,
) -> HandlerResult {
    let viewpoint = service.create_viewpoint(user.id(), request.into_inner()).await?;
    Ok(Envelope::ok(json!({ "id": viewpoint.id })).into_response())
}

pub async fn create_recommendation(
    service: Service,
    user: AuthUser,
    request: web::Json<CreateRecommendationRequest>,
) -> HandlerResult {
    let recommendation = service.create_recommendation(user.id(), request.into_inner()).await?;
    Ok(Envelope::ok(recommendation).into_response())
}

async fn delete_content(service: Service, user: AuthUser, kind: ContentKind, content_id: i64) -> HandlerResult {
    service.delete_content(user.id(), kind, content_id).await?;
    Ok(Envelope::done().into_response())
}

pub async fn delete_portfolio(service: Service, user: AuthUser, id: web::Path<i64>) -> HandlerResult {
    delete_content(service, user, ContentKind::Portfolio, *id).await
}

pub async fn delete_viewpoint(service: Service, user: AuthUser, id: web::Path<i64>) -> HandlerResult {
    delete_content(service, user, ContentKind::Viewpoint, *id).await
}

pub async fn delete_recommendation(service: Service, user: AuthUser, id: web::Path<i64>) -> HandlerResult {
    delete_content(service, user, ContentKind::Recommendation, *id).await
}

pub async fn share_viewpoint(service: Service, viewpoint_id: web::Path<i64>) -> HandlerResult {
    let url = service.share_viewpoint(*viewpoint_id).await?;
    Ok(Envelope::ok(json!({ "url": url })).into_response())
}

/// Malformed JSON bodies and query strings answer 200 with `success=false`.
fn extractor_configs(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|_err, _req| ApiError::NotFound("resource".to_string()).into()),
    );
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    extractor_configs(cfg);

    cfg.service(
        web::scope("/api/v1")
            .route("/send_securitycode", web::post().to(send_security_code))
            .route("/user_register", web::post().to(register))
            .route("/forget_passwd", web::post().to(forget_password))
            .route("/cur_user_info", web::get().to(current_user_info))
            .route("/user/updatebaseinfo", web::post().to(update_base_info))
            .route("/user/setpasswd", web::post().to(set_password))
            .route("/user/rebindmobile", web::post().to(rebind_mobile))
            .route("/user/follow_invest_adviser", web::post().to(follow_advisers))
            .route("/user/subscribe_portfolio", web::post().to(subscribe_portfolios))
            .route("/user/sign_contract", web::post().to(sign_contracts))
            .route("/user/{id}/statistic", web::get().to(user_statistic))
            .route("/invest_adviser/4index", web::get().to(featured_advisers))
            .route("/invest_adviser/search", web::get().to(search_advisers))
            .route("/invest_adviser/{id}/base_info", web::get().to(adviser_base_info))
            .route("/invest_adviser/{id}/resume", web::get().to(adviser_resume))
            .route("/invest_adviser/{id}/invest_viewpoint", web::get().to(adviser_viewpoints))
            .route("/invest_adviser/{id}/recommend_security", web::get().to(adviser_recommendations))
            .route("/invest_adviser/{id}/portfolio", web::get().to(adviser_portfolios))
            .route("/recommend_security/4index", web::get().to(home_recommendations))
            .route("/recommend_security", web::get().to(trending_recommendations))
            .route("/portfolio/search", web::get().to(search_portfolios))
            .route("/portfolio/{id}/baseinfo", web::get().to(portfolio_base_info))
            .route("/adviser/portfolio", web::post().to(create_portfolio))
            .route("/adviser/portfolio/{id}", web::delete().to(delete_portfolio))
            .route("/adviser/viewpoint", web::post().to(create_viewpoint))
            .route("/adviser/viewpoint/{id}", web::delete().to(delete_viewpoint))
            .route("/adviser/recommend_security", web::post().to(create_recommendation))
            .route("/adviser/recommend_security/{id}", web::delete().to(delete_recommendation))
            .route("/invest_viewpoint/{id}/share", web::get().to(share_viewpoint))
            .route("/other/apply_job", web::post().to(apply_job)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}

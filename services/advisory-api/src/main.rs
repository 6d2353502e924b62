use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use advisory_api::{
    auth::{JwtAuth, JwtKeys},
    cache::RedisCodeCache,
    config::Config,
    handlers, metrics,
    services::AdvisoryService,
    shortener::SinaShortener,
    store::PgStore,
    verification::SecurityCodes,
};
use anyhow::{anyhow, Context};
use dotenv::dotenv;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .json()
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    config.validate().map_err(|e| anyhow!("invalid configuration: {}", e))?;
    metrics::init();

    info!(port = config.server.port, "starting advisory api");

    let store = PgStore::connect(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(store.pool())
        .await
        .context("failed to run migrations")?;
    info!("database connected and migrated");

    let redis_client = redis::Client::open(config.redis.url.clone()).context("invalid redis url")?;
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .context("failed to connect to redis")?;
    info!("redis connected");

    let codes = SecurityCodes::new(
        Arc::new(RedisCodeCache::new(redis_conn)),
        config.verification_settings(),
    );
    let shortener = SinaShortener::new(
        config.shortener.endpoint.clone(),
        config.shortener.app_key.clone(),
        config.shortener.timeout_secs,
    )?;

    let service = Arc::new(AdvisoryService::new(
        Arc::new(store),
        codes,
        Arc::new(shortener),
        config.service_settings(),
    ));
    let keys = Arc::new(JwtKeys::new(&config.auth.jwt_secret, config.auth.token_ttl_secs));

    HttpServer::new(move || {
        App::new()
            .wrap(JwtAuth::new(keys.clone()))
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(service.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod attendance;
mod auth;
mod config;
mod db;
mod docs;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::attendance::biometric::CosineVerifier;
use crate::attendance::geocode::NoopGeocoder;
use crate::attendance::notify::InAppNotifier;
use crate::attendance::service::AttendanceService;
use crate::attendance::store::{SessionStore, ShiftStore, TemplateStore};
use crate::docs::ApiDoc;
use crate::utils::shift_cache::ShiftCache;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance service is running"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    // Explicitly constructed and injected; no module-level state.
    let shift_cache = ShiftCache::new(
        ShiftStore::new(pool.clone()),
        config.shift_cache_capacity,
        config.shift_cache_ttl_secs,
    );

    let service = Data::new(AttendanceService::new(
        SessionStore::new(pool.clone()),
        TemplateStore::new(pool.clone()),
        shift_cache.clone(),
        Arc::new(CosineVerifier),
        Arc::new(NoopGeocoder),
        Arc::new(InAppNotifier::new(pool.clone())),
        config.biometric_threshold,
        Duration::from_secs(config.external_timeout_secs),
    ));

    let cache_for_warmup = shift_cache.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = cache_for_warmup.warmup(500).await {
            eprintln!("Failed to warm up shift cache: {:?}", e);
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(shift_cache.clone()))
            .app_data(service.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}

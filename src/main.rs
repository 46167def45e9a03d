use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod accounts;
mod api;
mod auth;
mod bootstrap;
mod config;
mod db;
mod docs;
mod error;
mod history;
mod model;
mod models;
mod routes;
mod store;
mod utils;
mod workflow;

#[cfg(test)]
mod test_support;

use crate::docs::ApiDoc;
use config::Config;
use routes::{AppServices, RateLimits};
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Leave Tracker"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let store = db::open_store(&config).await.context("opening record store")?;
    let gate = bootstrap::run(store.as_ref(), config.bootstrap_super.as_ref()).await?;
    let limits = RateLimits::from_config(&config)?;
    let services = AppServices::new(config.clone(), store, gate);

    let usernames = services.usernames.clone();
    let warmup_batch = config.username_warmup_batch;
    actix_web::rt::spawn(async move {
        if let Err(e) = usernames.warmup(warmup_batch).await {
            error!(error = %e, "Failed to warm up username index");
        }
    });

    let server_addr = config.server_addr.clone();
    info!(addr = %server_addr, "Listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .configure(|cfg| services.register(cfg))
            .service(index)
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(&server_addr)
    .with_context(|| format!("binding {server_addr}"))?
    .run()
    .await?;

    Ok(())
}

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use chrono::Datelike;
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod engine;
mod gateway;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;
use gateway::MySqlSessionGateway;

use crate::docs::ApiDoc;
use crate::utils::holiday_cache;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Hello World!"
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

    let pool_for_warmup = pool.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    actix_web::rt::spawn(async move {
        // Warm this year's declared holidays in batches of 50
        let year = chrono::Local::now().year();
        if let Err(e) = holiday_cache::warmup_holiday_cache(&pool_for_warmup, year, 50).await {
            eprintln!("Failed to warmup holiday cache: {:?}", e);
        }
    });

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
            .app_data(Data::new(MySqlSessionGateway::new(pool.clone())))
            .service(index)
            // Attendance routes behind auth + rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}

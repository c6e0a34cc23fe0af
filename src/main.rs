mod config;
mod controller;
mod naming;
mod routes;
mod storage;


#[macro_use]
extern crate tracing;

use std::sync::Arc;

use clap::Parser;
use mimalloc::MiMalloc;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::{EndpointExt, Route, Server};
use poem_openapi::OpenApiService;

use crate::config::{RuntimeConfig, ServerConfig};
use crate::controller::AlbumController;
use crate::storage::StorageBackend;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Builds the full route tree for the given storage backend.
pub fn build_app(storage: Arc<dyn StorageBackend>, public_url: Option<String>) -> Route {
    let controller = Arc::new(AlbumController::new(storage, public_url));

    let api_service = OpenApiService::new(
        routes::AlbumApi::new(controller),
        "Album API",
        env!("CARGO_PKG_VERSION"),
    );
    let ui = api_service.redoc();

    Route::new()
        .nest("/", api_service)
        .nest("/docs", ui)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: ServerConfig = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let cfg = RuntimeConfig::load(args.config.as_deref()).await?;
    let storage = cfg.backend.connect().await?;

    let app = build_app(storage, args.public_url.clone()).with(Tracing);

    let bind = format!("{}:{}", args.host, args.port);
    info!("Album server running at http://{}", &bind);

    Server::new(TcpListener::bind(bind))
        .run(app)
        .await?;

    Ok(())
}

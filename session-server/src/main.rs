// session-server/src/main.rs
mod anchor_rpc;
mod api;
mod auth;
mod middleware;
mod registry;

use actix::Actor;
use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use middleware::rate_limiter::RateLimiter;
use registry::SessionRegistryActor;
use session_engine::{ChainAnchor, MockAnchor};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();

    // Save address before moving config into web::Data
    let server_addr = config.session_server_addr.clone();

    // Pick the chain anchor implementation
    let anchor: Arc<dyn ChainAnchor> = if config.anchor.mode == "rpc" {
        match anchor_rpc::RpcAnchor::new(
            config.anchor.rpc_url.clone(),
            config.anchor.request_timeout_secs,
        ) {
            Ok(anchor) => {
                tracing::info!("Using RPC anchor at {}", config.anchor.rpc_url);
                Arc::new(anchor)
            }
            Err(e) => {
                tracing::error!("Failed to build RPC anchor client: {}", e);
                return Err(std::io::Error::new(std::io::ErrorKind::Other, e));
            }
        }
    } else {
        tracing::info!("Using mock anchor (gasless network endpoint not live yet)");
        Arc::new(MockAnchor::new())
    };

    // Start the session registry actor
    let registry = SessionRegistryActor::new(anchor, config.sessions.clone()).start();

    tracing::info!("Starting Session Server on {}", server_addr);

    // Create data references
    let config_data = web::Data::new(config);
    let registry_data = web::Data::new(registry);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(config_data.clone())
            .app_data(registry_data.clone())
            .wrap(RateLimiter::new(vec!["/api/session".to_string()]))
            .configure(api::configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}

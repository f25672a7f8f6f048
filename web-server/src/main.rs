// web-server/src/main.rs
#[cfg(test)]
#[macro_use]
mod test_support;

mod api;
mod auth;
mod client_registry;
mod error;
mod middleware;
mod routing;
mod static_files;
mod utils;

use std::sync::Arc;

use actix::Actor;
use actix_web::middleware::{Compress, Condition};
use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use vts_client::{AgentClientFactory, BootstrapSettings, ClientFactory, RouteGuard, SessionBootstrap};

use crate::client_registry::{ClientRegistryActor, RegistryIdentityStore};
use crate::middleware::session_guard::SessionGuard;

fn startup_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    setup_tracing();

    let config = Config::from_env();
    config.validate().map_err(startup_error)?;

    let settings = BootstrapSettings::from_config(&config).map_err(startup_error)?;
    let factory = AgentClientFactory::from_config(&config).await.map_err(startup_error)?;
    let clients: Arc<dyn ClientFactory> = Arc::new(factory);
    let clients = web::Data::from(clients);

    let registry = ClientRegistryActor::new().with_ttl(config.session_ttl_secs).start();
    let store = RegistryIdentityStore::new(registry.clone());
    let guard = RouteGuard::new(Arc::new(SessionBootstrap::new(store, settings)));

    let secure_cookies = config.public_url.starts_with("https://");
    let server_addr = config.web_server_addr.clone();

    tracing::info!(
        "Starting VTS portal on {} for canister {} at {}",
        server_addr,
        config.vts_canister_id,
        config.icp_node_endpoint
    );

    HttpServer::new(move || {
        App::new()
            .wrap(SessionGuard::new(
                guard.clone(),
                registry.clone(),
                secure_cookies,
                config.session_ttl_secs,
            ))
            .wrap(Condition::new(config.static_files.enable_compression, Compress::default()))
            .app_data(web::Data::new(guard.clone()))
            .app_data(web::Data::new(registry.clone()))
            .app_data(clients.clone())
            .configure(|cfg| routing::configure(cfg, &config.static_files))
    })
    .bind(&server_addr)?
    .run()
    .await
}

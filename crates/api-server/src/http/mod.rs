use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;

use axum::routing::get;
use axum::{Router, middleware};
use shared::repos::Store;

mod client_ip;
mod errors;
mod files;
mod health;
mod observability;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub files_dir: PathBuf,
    pub trusted_proxy_ips: HashSet<IpAddr>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/d/{slug}", get(files::download_file))
        .route("/api/v1/files/{slug}/data", get(files::download_file))
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
        .with_state(app_state)
}

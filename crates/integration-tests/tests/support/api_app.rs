use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use api_server::http::{AppState, build_router};
use shared::repos::Store;

pub fn build_test_router(store: Store, files_dir: &Path) -> axum::Router {
    build_router(AppState {
        store,
        files_dir: files_dir.to_path_buf(),
        trusted_proxy_ips: HashSet::<IpAddr>::new(),
    })
}

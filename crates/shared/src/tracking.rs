//! Best-effort download tracking.
//!
//! Recording a download must never fail the request that served it, so
//! persistence errors are logged here and never returned.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;

use tracing::{debug, warn};

use crate::models::DownloadEvent;
use crate::repos::StoreError;

pub type DownloadInsertFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

/// Persistence handle able to insert a single download row.
pub trait DownloadExecutor: Send + Sync {
    fn insert_download<'a>(&'a self, event: &'a DownloadEvent) -> DownloadInsertFuture<'a>;
}

/// Origin of the request being tracked.
pub trait RemoteAddress {
    fn remote_address(&self) -> String;
}

impl RemoteAddress for IpAddr {
    fn remote_address(&self) -> String {
        self.to_string()
    }
}

// Ports are not tracked.
impl RemoteAddress for SocketAddr {
    fn remote_address(&self) -> String {
        self.ip().to_string()
    }
}

/// Stores one download record for `file_id`.
///
/// Failures are logged with a `failed to track download` prefix and
/// swallowed; the caller cannot tell whether the row was written.
pub async fn record_download<E, C>(executor: &E, file_id: &str, request: &C, cache_hit: bool)
where
    E: DownloadExecutor + ?Sized,
    C: RemoteAddress + ?Sized,
{
    let event = DownloadEvent {
        file_id: file_id.to_string(),
        ip: request.remote_address(),
        cache_hit,
    };

    match executor.insert_download(&event).await {
        Ok(()) => debug!(
            file_id = %event.file_id,
            ip = %event.ip,
            cache_hit = event.cache_hit,
            "download tracked"
        ),
        Err(err) => warn!(
            file_id = %event.file_id,
            ip = %event.ip,
            cache_hit = event.cache_hit,
            "failed to track download: {err}"
        ),
    }
}

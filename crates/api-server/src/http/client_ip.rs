use std::collections::HashSet;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

use super::AppState;

/// Address of the client that sent the request, if it could be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ClientIp(pub(super) Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Self(peer.map(|peer| {
            TrustedProxies(&state.trusted_proxy_ips).client_behind(peer, &parts.headers)
        })))
    }
}

/// Peers whose forwarding headers are believed.
struct TrustedProxies<'a>(&'a HashSet<IpAddr>);

impl TrustedProxies<'_> {
    fn trusts(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }

    /// Client a request from `peer` was sent on behalf of.
    ///
    /// Headers from untrusted peers are ignored. Behind a trusted proxy the
    /// `X-Forwarded-For` hops are walked from the right to the first
    /// untrusted one, then `X-Real-IP` is consulted, then the peer itself.
    fn client_behind(&self, peer: IpAddr, headers: &HeaderMap) -> IpAddr {
        if !self.trusts(&peer) {
            return peer;
        }

        let hops = forwarded_hops(headers);
        hops.iter()
            .rev()
            .find(|hop| !self.trusts(hop))
            .copied()
            .or_else(|| real_ip(headers))
            .unwrap_or(peer)
    }
}

fn forwarded_hops(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect()
}

fn real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<IpAddr>().ok())
}

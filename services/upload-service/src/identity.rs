// /forum-platform/services/upload-service/src/identity.rs
// ===== CLIENT IDENTITY =====

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::AppState;

/// Key untuk rate limit dan concurrent tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKey {
    Addr(IpAddr),
    // Request tanpa peer address, hanya terjadi kalau server tidak serve dengan ConnectInfo
    Unresolved,
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKey::Addr(addr) => write!(f, "{}", addr),
            ClientKey::Unresolved => f.write_str("unknown"),
        }
    }
}

impl Serialize for ClientKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reverse proxy yang boleh mengirim x-forwarded-for / x-real-ip
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(HashSet<IpAddr>);

impl TrustedProxies {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(addrs.into_iter().collect())
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.0.contains(addr)
    }
}

/// Identitas client untuk rate limiting dan audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientIdentity {
    pub key: ClientKey,
    pub user_agent: String,
}

impl ClientIdentity {
    /// Peer address adalah identitas. Header forwarded hanya dibaca kalau peer
    /// adalah trusted proxy.
    pub fn resolve(headers: &HeaderMap, peer: Option<IpAddr>, trusted: &TrustedProxies) -> Self {
        let key = match peer {
            None => ClientKey::Unresolved,
            Some(peer) if !trusted.contains(&peer) => ClientKey::Addr(peer),
            Some(peer) => ClientKey::Addr(forwarded_client(headers, trusted).unwrap_or(peer)),
        };

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self { key, user_agent }
    }
}

// Jalan dari hop paling kanan, berhenti di hop pertama yang bukan proxy kita.
// Entry di kiri hop itu ditulis oleh client sendiri dan tidak dipercaya.
fn forwarded_client(headers: &HeaderMap, trusted: &TrustedProxies) -> Option<IpAddr> {
    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    if hops.is_empty() {
        return headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
    }

    let mut nearest = None;
    for hop in hops.iter().rev() {
        match hop.parse::<IpAddr>() {
            Ok(addr) if trusted.contains(&addr) => nearest = Some(addr),
            Ok(addr) => return Some(addr),
            // Hop rusak: pakai proxy terakhir yang masih bisa dipercaya
            Err(_) => return nearest,
        }
    }

    nearest
}

/// Resolve identity sekali per request, disimpan di request extensions
pub async fn identity_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let identity = ClientIdentity::resolve(req.headers(), peer, &state.trusted_proxies);
    if identity.key == ClientKey::Unresolved {
        tracing::warn!("Peer address tidak tersedia, request memakai identity bersama");
    }

    req.extensions_mut().insert(identity);
    next.run(req).await
}

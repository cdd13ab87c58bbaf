//! Outbound HTTP client construction.
//!
//! Every collaborator gets its client from here so that the timeout, TLS
//! and address-family settings of [`TransportConfig`] apply uniformly.

use std::net::{IpAddr, Ipv4Addr};

use reqwest::header::HeaderMap;
use reqwest::Client;

use crate::config::TransportConfig;

/// Builder options beyond the shared transport settings.
#[derive(Debug, Default)]
pub struct ClientOptions {
    /// Keep a cookie jar (session-authenticated APIs).
    pub cookie_store: bool,
    /// Headers sent with every request.
    pub default_headers: HeaderMap,
}

/// Build a reqwest client honoring the transport settings.
pub fn build_http_client(
    transport: &TransportConfig,
    options: ClientOptions,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(transport.timeout())
        .cookie_store(options.cookie_store)
        .default_headers(options.default_headers)
        .danger_accept_invalid_certs(transport.tls_insecure_skip_verify);

    if transport.prefer_ipv4 {
        builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    builder.build()
}

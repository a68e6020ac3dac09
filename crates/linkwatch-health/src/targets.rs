//! Parsing of comma-separated target lists.

use std::collections::HashSet;
use std::net::IpAddr;

use http::Uri;

use crate::error::{WatchdogError, WatchdogResult};

/// Split a comma-separated list, trimming items and skipping empty ones.
pub fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Resolve one address item: an IP literal or a host name.
///
/// Host names resolve through the system resolver and may yield
/// several addresses.
pub async fn resolve_address(item: &str) -> WatchdogResult<Vec<IpAddr>> {
    if let Ok(address) = item.parse::<IpAddr>() {
        return Ok(vec![address]);
    }
    if item.contains(|c: char| c.is_whitespace() || c == '/' || c == ':') {
        return Err(WatchdogError::InvalidAddress(item.to_string()));
    }

    let resolved = tokio::net::lookup_host((item, 0))
        .await
        .map_err(|source| WatchdogError::Resolve {
            host: item.to_string(),
            source,
        })?;

    let mut seen = HashSet::new();
    Ok(resolved
        .map(|addr| addr.ip())
        .filter(|ip| seen.insert(*ip))
        .collect())
}

/// Resolve every item of a comma-separated address list.
///
/// Fails on the first item that does not parse or resolve.
pub async fn resolve_address_list(list: &str) -> WatchdogResult<Vec<IpAddr>> {
    let mut addresses = Vec::new();
    for item in split_list(list) {
        addresses.extend(resolve_address(item).await?);
    }
    Ok(addresses)
}

/// Parse one endpoint URL. Scheme and host are mandatory.
pub fn parse_endpoint(item: &str) -> WatchdogResult<Uri> {
    let uri: Uri = item.parse().map_err(|e: http::uri::InvalidUri| {
        WatchdogError::InvalidEndpoint {
            endpoint: item.to_string(),
            reason: e.to_string(),
        }
    })?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(WatchdogError::InvalidEndpoint {
            endpoint: item.to_string(),
            reason: "missing scheme or host".to_string(),
        });
    }
    Ok(uri)
}

/// Parse every item of a comma-separated endpoint list.
pub fn parse_endpoint_list(list: &str) -> WatchdogResult<Vec<Uri>> {
    split_list(list).map(parse_endpoint).collect()
}

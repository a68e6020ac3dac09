//! Single-target reachability probes.
//!
//! Every probe answers with a plain `bool`. Timeouts, refused or reset
//! connections, TLS failures and error statuses all collapse to
//! "not reachable" and are only visible in the debug log.

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::uri::Authority;
use http::{Method, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

use crate::config::WatchdogConfig;
use crate::error::{WatchdogError, WatchdogResult};
use crate::interface::NetworkInterface;

/// TCP echo port, the unprivileged stand-in for an ICMP echo request.
pub const ECHO_PORT: u16 = 7;

const USER_AGENT_VALUE: &str = concat!("linkwatch/", env!("CARGO_PKG_VERSION"));

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Reachability test for addresses and endpoints.
///
/// `NetworkProber` is the real implementation; tests plug in fakes.
pub trait Prober: Send + Sync {
    fn probe_address(&self, address: IpAddr) -> ProbeFuture<'_>;

    fn probe_endpoint<'a>(&'a self, endpoint: &'a Uri) -> ProbeFuture<'a>;
}

/// Probes the real network with the interface and timeouts of one watchdog.
pub struct NetworkProber {
    interface: Option<NetworkInterface>,
    timeout: Duration,
    endpoint_timeout: Duration,
    tls: TlsConnector,
}

impl NetworkProber {
    /// Resolve the configured interface and prepare the TLS client.
    pub fn new(config: &WatchdogConfig) -> WatchdogResult<Self> {
        let interface = config
            .interface
            .as_deref()
            .map(NetworkInterface::by_name)
            .transpose()?;

        Ok(Self {
            interface,
            timeout: config.probe_timeout(),
            endpoint_timeout: config.endpoint_probe_timeout(),
            tls: tls_connector()?,
        })
    }

    pub fn interface(&self) -> Option<&NetworkInterface> {
        self.interface.as_ref()
    }

    /// Address probe timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Prober for NetworkProber {
    fn probe_address(&self, address: IpAddr) -> ProbeFuture<'_> {
        Box::pin(address_probe(address, self.interface.as_ref(), self.timeout))
    }

    fn probe_endpoint<'a>(&'a self, endpoint: &'a Uri) -> ProbeFuture<'a> {
        Box::pin(endpoint_probe(endpoint, &self.tls, self.endpoint_timeout))
    }
}

fn tls_connector() -> WatchdogResult<TlsConnector> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(
        rustls::crypto::ring::default_provider().into(),
    )
    .with_safe_default_protocol_versions()
    .map_err(|e| WatchdogError::Tls(e.to_string()))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Check whether a host answers on the network.
///
/// Opens a TCP connection to the echo port. Both an accepted connection
/// and an active refusal prove the host is up; anything else, including
/// hitting `timeout`, means it is not reachable.
pub async fn address_probe(
    address: IpAddr,
    interface: Option<&NetworkInterface>,
    timeout: Duration,
) -> bool {
    let target = SocketAddr::new(address, ECHO_PORT);

    let result = tokio::time::timeout(timeout, async {
        let socket = if address.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if let Some(nic) = interface {
            nic.bind(&socket)?;
        }
        socket.connect(target).await
    })
    .await;

    match result {
        Ok(Ok(_stream)) => {
            trace!(%address, "address OK");
            true
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            trace!(%address, "address OK (echo refused)");
            true
        }
        Ok(Err(e)) => {
            debug!(%address, error = %e, "address can't be reached");
            false
        }
        Err(_) => {
            debug!(%address, timeout_ms = timeout.as_millis() as u64, "address probe timed out");
            false
        }
    }
}

/// Check whether an `http`/`https` endpoint can be opened and read.
///
/// Sends a `GET`, requires a status below 400 and waits for the first
/// body frame (or the end of an empty body).
pub async fn endpoint_probe(uri: &Uri, tls: &TlsConnector, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, open_endpoint(uri, tls)).await {
        Ok(Ok(())) => {
            trace!(%uri, "endpoint OK");
            true
        }
        Ok(Err(e)) => {
            debug!(%uri, error = %e, "endpoint can't be reached");
            false
        }
        Err(_) => {
            debug!(%uri, "endpoint probe timed out");
            false
        }
    }
}

async fn open_endpoint(uri: &Uri, tls: &TlsConnector) -> anyhow::Result<()> {
    let secure = match uri.scheme_str() {
        Some("http") => false,
        Some("https") => true,
        Some(other) => bail!("unsupported scheme {other}"),
        None => bail!("endpoint has no scheme"),
    };
    let authority = uri
        .authority()
        .ok_or_else(|| anyhow!("endpoint has no host"))?;
    let host = authority
        .host()
        .trim_start_matches('[')
        .trim_end_matches(']');
    let port = authority.port_u16().unwrap_or(if secure { 443 } else { 80 });
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let host_value = host_header(authority);

    let stream = TcpStream::connect((host, port)).await?;

    if secure {
        let server_name = rustls::pki_types::ServerName::try_from(host.to_string())?;
        let stream = tls.connect(server_name, stream).await?;
        read_first_frame(stream, &host_value, path).await
    } else {
        read_first_frame(stream, &host_value, path).await
    }
}

/// `Host` header value: host and explicit port, never userinfo.
fn host_header(authority: &Authority) -> String {
    match authority.port_u16() {
        Some(port) => format!("{}:{port}", authority.host()),
        None => authority.host().to_string(),
    }
}

async fn read_first_frame<S>(stream: S, host: &str, path: &str) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) =
        hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(io).await?;

    // Drive the connection in the background.
    let driver = tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(HOST, host)
        .header(USER_AGENT, USER_AGENT_VALUE)
        .body(Empty::<Bytes>::new())?;

    let result = async {
        let resp = sender.send_request(req).await?;
        let status = resp.status();
        if status.is_client_error() || status.is_server_error() {
            bail!("endpoint answered {status}");
        }
        resp.into_body().frame().await.transpose()?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    driver.abort();
    result
}

//! HTTP CONNECT tunnels through forward proxies
//!
//! Before TLS can be spoken through a forward proxy, the proxy is asked to open
//! a raw pipe to the target with a CONNECT request. Only a `200` reply opens the
//! tunnel; anything else leaves the transport unusable.

use super::{read_response, Error, HttpRequest, HttpResponse, Method, Result};
use base64::Engine;
use std::fmt;
use std::io::Write;

/// Forward proxy settings
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    host: String,
    port: u16,
    user: Option<String>,
    password: Option<String>,
}

impl ProxyConfig {
    /// Proxy listening at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ProxyConfig {
            host: host.into(),
            port,
            user: None,
            password: None,
        }
    }

    /// Set both proxy credentials
    pub fn credentials(self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user(user).password(password)
    }

    /// Set the proxy user
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the proxy password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `Proxy-Authorization` value, present when a user or a password is set
    ///
    /// A missing half of the pair is encoded as an empty string.
    pub fn authorization(&self) -> Option<String> {
        if self.user.is_none() && self.password.is_none() {
            return None;
        }

        let credentials = format!(
            "{}:{}",
            self.user.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default()
        );
        // The standard engine never wraps lines, so the value is a single header line.
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());
        Some(format!("Basic {}", encoded))
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Build the CONNECT request asking the proxy for a tunnel to `host_port`
pub fn connect_request(host_port: &str, proxy: &ProxyConfig) -> HttpRequest {
    let mut builder = HttpRequest::builder(Method::Connect, host_port).header("Host", host_port);

    if let Some(authorization) = proxy.authorization() {
        builder = builder.header("Proxy-Authorization", authorization);
    }

    builder.header("Proxy-Connection", "Keep-Alive").build()
}

/// Negotiate a CONNECT tunnel to `host_port` over `transport`
///
/// Writes the CONNECT request, then consumes exactly one response. Any status
/// other than `200` is an error and the transport must be discarded.
pub fn establish_tunnel<S: std::io::Read + Write + ?Sized>(
    transport: &mut S,
    host_port: &str,
    proxy: &ProxyConfig,
) -> Result<HttpResponse> {
    let request = connect_request(host_port, proxy).to_wire();
    log::trace!("CONNECT request: {:?}", String::from_utf8_lossy(&request));

    transport.write_all(&request)?;
    transport.flush()?;

    let response = read_response(transport, Method::Connect)?;
    if response.status().code() != 200 {
        log::debug!(
            "Proxy {}:{} refused tunnel to {}: {} {}",
            proxy.host(),
            proxy.port(),
            host_port,
            response.status().code(),
            response.reason()
        );
        return Err(Error::TunnelRejected {
            status: response.status().code(),
            reason: response.reason().to_string(),
        });
    }

    log::debug!(
        "Tunnel to {} established through {}:{}",
        host_port,
        proxy.host(),
        proxy.port()
    );
    Ok(response)
}

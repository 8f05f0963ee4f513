//! Connection configuration
//!
//! This module provides [`ConnectionParams`], the per-connection settings the
//! TLS layer reads, together with its builder and the TLS error type.

use super::revocation::{RevocationDescriptor, RevocationError};
use std::path::{Path, PathBuf};

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// SSL 3.0 (deprecated, rarely used)
    Ssl3,
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Parse TLS version from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "SSLV3" | "SSL3" => Ok(TlsVersion::Ssl3),
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> openssl::ssl::SslVersion {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Ssl3 => SslVersion::SSL3,
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Ssl3 => "SSLv3",
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

/// Failure class of a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any network I/O
    Configuration,
    /// The proxy did not open a tunnel
    ProxyTunnel,
    /// TLS negotiation or certificate chain verification failed
    Handshake,
    /// The chain verified but names a different host
    IdentityMismatch,
    /// The transport failed outside of the steps above
    Io,
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Revocation check unavailable: {0}")]
    Revocation(#[from] RevocationError),

    #[error("Proxy tunnel failed: {0}")]
    ProxyTunnel(#[from] crate::http::Error),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Peer certificate is not valid for host {host}")]
    IdentityMismatch { host: String },
}

impl TlsError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TlsError::OpenSsl(_)
            | TlsError::InvalidVersion(_)
            | TlsError::InvalidConfig(_)
            | TlsError::Certificate(_)
            | TlsError::Revocation(_) => ErrorKind::Configuration,
            TlsError::ProxyTunnel(_) => ErrorKind::ProxyTunnel,
            TlsError::HandshakeFailed(_) => ErrorKind::Handshake,
            TlsError::IdentityMismatch { .. } => ErrorKind::IdentityMismatch,
            TlsError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    pub fn is_proxy_tunnel(&self) -> bool {
        self.kind() == ErrorKind::ProxyTunnel
    }

    pub fn is_handshake(&self) -> bool {
        self.kind() == ErrorKind::Handshake
    }

    pub fn is_identity_mismatch(&self) -> bool {
        self.kind() == ErrorKind::IdentityMismatch
    }
}

/// Settings for one secure connection (immutable after building)
///
/// The only field that changes after `build()` is the non-blocking flag: the
/// capability guard clears it when the TLS engine cannot honour it, and the
/// owning `SecureSocket` may set it again. Nothing else writes it.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    host: String,
    host_port: String,
    nonblock: bool,
    verify_peer: bool,
    ca_path: Option<PathBuf>,
    ca_file: Option<PathBuf>,
    client_cert: Option<PathBuf>,
    client_key: Option<PathBuf>,
    min_version: Option<TlsVersion>,
    max_version: Option<TlsVersion>,
    revocation: Option<RevocationDescriptor>,
}

impl ConnectionParams {
    /// Start building parameters for a connection to `host:port`
    pub fn builder(host: impl Into<String>, port: u16) -> ConnectionParamsBuilder {
        ConnectionParamsBuilder::new(host.into(), port)
    }

    /// Target host, used for SNI and the hostname check
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target `host:port`, used as the tunnel target
    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// Whether reads and writes should be non-blocking
    pub fn nonblock(&self) -> bool {
        self.nonblock
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn ca_path(&self) -> Option<&Path> {
        self.ca_path.as_deref()
    }

    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    pub fn client_cert(&self) -> Option<&Path> {
        self.client_cert.as_deref()
    }

    pub fn client_key(&self) -> Option<&Path> {
        self.client_key.as_deref()
    }

    pub fn min_version(&self) -> Option<TlsVersion> {
        self.min_version
    }

    pub fn max_version(&self) -> Option<TlsVersion> {
        self.max_version
    }

    /// Revocation plugin settings (`ssl_verify_dapple`)
    pub fn revocation(&self) -> Option<&RevocationDescriptor> {
        self.revocation.as_ref()
    }

    pub(crate) fn set_nonblock(&mut self, nonblock: bool) {
        self.nonblock = nonblock;
    }
}

/// Builder for [`ConnectionParams`]
#[derive(Debug, Clone)]
pub struct ConnectionParamsBuilder {
    host: String,
    port: u16,
    host_port: Option<String>,
    nonblock: bool,
    verify_peer: bool,
    ca_path: Option<PathBuf>,
    ca_file: Option<PathBuf>,
    client_cert: Option<PathBuf>,
    client_key: Option<PathBuf>,
    min_version: Option<TlsVersion>,
    max_version: Option<TlsVersion>,
    revocation: Option<RevocationDescriptor>,
}

impl ConnectionParamsBuilder {
    fn new(host: String, port: u16) -> Self {
        ConnectionParamsBuilder {
            host,
            port,
            host_port: None,
            nonblock: false,
            verify_peer: true,
            ca_path: None,
            ca_file: None,
            client_cert: None,
            client_key: None,
            min_version: None,
            max_version: None,
            revocation: None,
        }
    }

    /// Override the target host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the tunnel target (defaults to `host:port`)
    pub fn host_port(mut self, host_port: impl Into<String>) -> Self {
        self.host_port = Some(host_port.into());
        self
    }

    /// Request non-blocking reads and writes
    pub fn nonblock(mut self, nonblock: bool) -> Self {
        self.nonblock = nonblock;
        self
    }

    /// Enable/disable certificate chain and hostname verification
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    /// Directory of hashed CA certificates; takes precedence over `ca_file`
    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// PEM bundle of CA certificates
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// PEM client certificate for mutual TLS (requires `client_key`)
    pub fn client_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(path.into());
        self
    }

    /// PEM private key for mutual TLS (requires `client_cert`)
    pub fn client_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.client_key = Some(path.into());
        self
    }

    /// Pin the TLS version (both min and max)
    pub fn version(self, version: TlsVersion) -> Self {
        self.version_range(version, version)
    }

    /// Set TLS version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.min_version = Some(min);
        self.max_version = Some(max);
        self
    }

    /// Check the peer chain with a revocation validator as well
    pub fn revocation(mut self, descriptor: RevocationDescriptor) -> Self {
        self.revocation = Some(descriptor);
        self
    }

    /// Apply a string option by its configuration key
    pub fn option(self, key: &str, value: &str) -> Result<Self, TlsError> {
        Ok(match key {
            "host" => self.host(value),
            "host_port" => self.host_port(value),
            "nonblock" => {
                let flag = parse_bool(key, value)?;
                self.nonblock(flag)
            }
            "ssl_verify_peer" => {
                let flag = parse_bool(key, value)?;
                self.verify_peer(flag)
            }
            "ssl_ca_path" => self.ca_path(value),
            "ssl_ca_file" => self.ca_file(value),
            "client_cert" => self.client_cert(value),
            "client_key" => self.client_key(value),
            "ssl_version" => {
                let version = TlsVersion::from_str(value)?;
                self.version(version)
            }
            "ssl_verify_dapple" => {
                return Err(TlsError::InvalidConfig(
                    "ssl_verify_dapple takes a revocation descriptor, use revocation()".to_string(),
                ))
            }
            _ => return Err(TlsError::InvalidConfig(format!("Unknown option: {}", key))),
        })
    }

    /// Validate and build the parameters
    pub fn build(self) -> Result<ConnectionParams, TlsError> {
        if self.host.is_empty() {
            return Err(TlsError::InvalidConfig("host must not be empty".to_string()));
        }

        let host_port = match self.host_port {
            Some(host_port) if host_port.is_empty() => {
                return Err(TlsError::InvalidConfig("host_port must not be empty".to_string()))
            }
            Some(host_port) => host_port,
            None => join_host_port(&self.host, self.port),
        };

        // Both end up verbatim in the CONNECT line and the SNI extension
        check_target("host", &self.host)?;
        check_target("host_port", &host_port)?;

        match (&self.client_cert, &self.client_key) {
            (Some(_), None) => {
                return Err(TlsError::InvalidConfig(
                    "client_cert is set but client_key is missing".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(TlsError::InvalidConfig(
                    "client_key is set but client_cert is missing".to_string(),
                ))
            }
            _ => {}
        }

        if let (Some(min), Some(max)) = (self.min_version, self.max_version) {
            if min > max {
                return Err(TlsError::InvalidConfig(format!(
                    "minimum TLS version {} is above maximum {}",
                    min.as_str(),
                    max.as_str()
                )));
            }
        }

        if self.revocation.is_some() && !self.verify_peer {
            return Err(TlsError::InvalidConfig(
                "ssl_verify_dapple requires ssl_verify_peer".to_string(),
            ));
        }

        Ok(ConnectionParams {
            host: self.host,
            host_port,
            nonblock: self.nonblock,
            verify_peer: self.verify_peer,
            ca_path: self.ca_path,
            ca_file: self.ca_file,
            client_cert: self.client_cert,
            client_key: self.client_key,
            min_version: self.min_version,
            max_version: self.max_version,
            revocation: self.revocation,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, TlsError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(TlsError::InvalidConfig(format!(
            "{} expects a boolean, got {:?}",
            key, value
        ))),
    }
}

fn check_target(key: &str, value: &str) -> Result<(), TlsError> {
    if value.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(TlsError::InvalidConfig(format!(
            "{} contains whitespace or control characters: {:?}",
            key, value
        )));
    }
    Ok(())
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

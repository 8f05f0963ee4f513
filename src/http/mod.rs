//! HTTP/1.1 plumbing for secure client connections
//!
//! This module holds the pieces of HTTP/1.1 needed to bootstrap a connection:
//! the CONNECT request sent to a forward proxy and the parser that consumes the
//! proxy's reply. The TLS layer itself lives in [`tls`].
//!
//! # Architecture
//!
//! Connection setup is a linear pipeline over a [`Transport`]:
//!
//! - `ConnectionParams` describe the target and the verification policy
//! - `TlsContext` is built from them before any byte is written
//! - `establish_tunnel` negotiates a CONNECT tunnel when a proxy is configured
//! - `SecureSocket` performs the handshake and the post-connection hostname check
//!
//! # Examples
//!
//! ```no_run
//! use securesock::http::proxy::ProxyConfig;
//! use std::io::Write;
//! use securesock::http::tls::{ConnectionParams, Connector};
//! use std::net::TcpStream;
//!
//! let params = ConnectionParams::builder("example.com", 443)
//!     .ca_file("/etc/ssl/certs/ca-certificates.crt")
//!     .build()
//!     .unwrap();
//! let proxy = ProxyConfig::new("proxy.internal", 3128).credentials("user", "secret");
//!
//! let stream = TcpStream::connect("proxy.internal:3128").unwrap();
//! let mut socket = Connector::new().connect(stream, params, Some(&proxy)).unwrap();
//! socket.write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! ```

pub mod headers;
pub mod message;
pub mod parser;
pub mod proxy;
pub mod tls;
pub mod transport;

pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::{read_response, ResponseParser};
pub use transport::{PollEvents, Transport};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Response head exceeds {0} bytes")]
    HeadTooLarge(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Proxy refused tunnel: {status} {reason}")]
    TunnelRejected { status: u16, reason: String },
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// Maximum size of a response status line plus headers
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

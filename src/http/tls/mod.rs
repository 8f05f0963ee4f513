//! TLS support for HTTP client connections
//!
//! This module turns a connected plain transport into an authenticated TLS
//! connection, optionally through a forward-proxy CONNECT tunnel.
//!
//! # Architecture
//!
//! 1. `ConnectionParams` define the target and the verification policy
//! 2. `TlsCapabilities` describe what the linked OpenSSL can do and guard the
//!    non-blocking flag against it
//! 3. `TlsContext` compiles the policy (trust source, client identity,
//!    revocation callback) into an OpenSSL context
//! 4. `SecureSocket` runs the handshake and the hostname check and then carries
//!    the encrypted traffic
//! 5. `Connector` sequences all of the above for one connection attempt
//!
//! # Features
//!
//! - TLS 1.0 through TLS 1.3 support (OpenSSL version dependent)
//! - CA directory, CA bundle or system trust store
//! - Client certificates for mutual TLS
//! - SNI (Server Name Indication)
//! - Hostname verification with RFC 6125 wildcard rules
//! - Pluggable revocation checking
//!
//! # Examples
//!
//! ## Verified connection with a client certificate
//!
//! ```no_run
//! use securesock::http::tls::{ConnectionParams, Connector, TlsVersion};
//! use std::net::TcpStream;
//!
//! let params = ConnectionParams::builder("api.internal", 8443)
//!     .ca_file("ca.pem")
//!     .client_cert("client.pem")
//!     .client_key("client.key")
//!     .version_range(TlsVersion::Tls12, TlsVersion::Tls13)
//!     .build()
//!     .unwrap();
//!
//! let stream = TcpStream::connect("api.internal:8443").unwrap();
//! let socket = Connector::new().connect(stream, params, None).unwrap();
//! println!("{:?}", socket.info());
//! ```
//!
//! ## Revocation checking
//!
//! ```no_run
//! use securesock::http::tls::{
//!     ConnectionParams, Connector, FnProvider, FnValidator, RevocationDescriptor,
//!     RevocationError, RevocationValidator, TrustSource,
//! };
//! use openssl::x509::X509;
//! use std::net::TcpStream;
//!
//! let connector = Connector::new().with_revocation_provider(FnProvider(
//!     |_: &TrustSource, _: &RevocationDescriptor| {
//!         let validator: Box<dyn RevocationValidator> =
//!             Box::new(FnValidator(|chain: &[X509]| !chain.is_empty()));
//!         Ok::<_, RevocationError>(validator)
//!     },
//! ));
//!
//! let params = ConnectionParams::builder("example.com", 443)
//!     .revocation(RevocationDescriptor::new("http://ocsp.example.com"))
//!     .build()
//!     .unwrap();
//!
//! let stream = TcpStream::connect("example.com:443").unwrap();
//! let _socket = connector.connect(stream, params, None).unwrap();
//! ```

pub mod capability;
pub mod cert;
pub mod config;
pub mod connector;
pub mod context;
pub mod revocation;
pub mod session;

pub use capability::TlsCapabilities;
pub use cert::{verify_certificate_identity, CertInfo};
pub use config::{ConnectionParams, ConnectionParamsBuilder, ErrorKind, TlsError, TlsVersion};
pub use connector::Connector;
pub use context::{TlsContext, TrustSource};
pub use revocation::{
    FnProvider, FnValidator, RevocationDescriptor, RevocationError, RevocationProvider,
    RevocationValidator,
};
pub use session::{SecureSocket, SessionInfo};

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;

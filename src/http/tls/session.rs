//! TLS sessions over a plain transport
//!
//! [`SecureSocket`] owns the transport it was handshaked over. Reads and writes
//! go through the TLS engine; closing the socket sends `close_notify` and then
//! shuts the transport down.

use super::capability::TlsCapabilities;
use super::cert::{get_cert_chain, verify_certificate_identity, CertInfo};
use super::config::{ConnectionParams, TlsError};
use super::context::TlsContext;
use crate::http::transport::{PollEvents, Transport};
use openssl::ssl::{HandshakeError, NameType, Ssl, SslStream};
use openssl::x509::{X509VerifyResult, X509};
use std::io::{self, Read, Write};
use std::net::IpAddr;
use std::time::Duration;

/// Negotiated session parameters
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Negotiated protocol version (e.g., "TLSv1.3")
    pub version: String,

    /// Negotiated cipher suite
    pub cipher: Option<String>,

    /// Server name sent with the client hello
    pub servername: Option<String>,

    /// Peer certificate first, then the rest of the presented chain
    pub cert_chain: Vec<CertInfo>,

    /// Whether a previous session was resumed
    pub sess_reused: bool,
}

/// Established TLS connection over a transport
pub struct SecureSocket<S: Transport> {
    stream: SslStream<S>,
    params: ConnectionParams,
    capabilities: TlsCapabilities,
    applied_nonblock: bool,
    failed: bool,
}

impl<S: Transport> SecureSocket<S> {
    /// Upgrade `transport` to TLS
    ///
    /// The transport must be in blocking mode. The context is consumed: it
    /// configures this handshake only. With peer verification on, the peer
    /// certificate is checked against the target host once the handshake is
    /// through.
    pub(crate) fn handshake(
        transport: S,
        context: TlsContext,
        params: ConnectionParams,
        capabilities: TlsCapabilities,
    ) -> Result<Self, TlsError> {
        let mut ssl = Ssl::new(context.ssl_context())
            .map_err(|e| TlsError::HandshakeFailed(format!("Failed to create session: {}", e)))?;

        if capabilities.sni() && sni_applicable(params.host()) {
            ssl.set_hostname(params.host()).map_err(|e| {
                TlsError::HandshakeFailed(format!("Failed to set SNI {}: {}", params.host(), e))
            })?;
        }

        let mut stream = match ssl.connect(transport) {
            Ok(stream) => stream,
            Err(HandshakeError::SetupFailure(e)) => {
                return Err(TlsError::HandshakeFailed(format!("Setup failed: {}", e)));
            }
            Err(HandshakeError::Failure(mid)) => {
                let verify = mid.ssl().verify_result();
                let reason = if verify != X509VerifyResult::OK {
                    format!("{} (certificate verify: {})", mid.error(), verify.error_string())
                } else {
                    mid.error().to_string()
                };
                log::debug!("Handshake with {} failed: {}", params.host_port(), reason);
                return Err(TlsError::HandshakeFailed(reason));
            }
            Err(HandshakeError::WouldBlock(_)) => {
                return Err(TlsError::HandshakeFailed(
                    "Transport would block during handshake".to_string(),
                ));
            }
        };

        if context.verify_peer() {
            let identity_ok = stream
                .ssl()
                .peer_certificate()
                .is_some_and(|cert| verify_certificate_identity(&cert, params.host()));

            if !identity_ok {
                log::debug!("Peer certificate does not match {}", params.host());
                if let Err(e) = stream.shutdown() {
                log::debug!("TLS shutdown with {} failed: {}", params.host_port(), e);
            }
                return Err(TlsError::IdentityMismatch {
                    host: params.host().to_string(),
                });
            }
            log::debug!("Hostname {} verified", params.host());
        }

        log::debug!(
            "TLS established with {}: {} {}",
            params.host_port(),
            stream.ssl().version_str(),
            stream
                .ssl()
                .current_cipher()
                .map(|c| c.name())
                .unwrap_or("<none>")
        );

        let mut socket = SecureSocket {
            stream,
            params,
            capabilities,
            applied_nonblock: false,
            failed: false,
        };
        socket.sync_blocking_mode()?;
        Ok(socket)
    }

    /// Parameters this socket was connected with
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Whether reads and writes are currently non-blocking
    pub fn nonblock(&self) -> bool {
        self.applied_nonblock
    }

    /// Request blocking or non-blocking I/O
    ///
    /// Returns the effective mode, which stays blocking when the engine cannot
    /// do non-blocking I/O.
    pub fn set_nonblock(&mut self, nonblock: bool) -> io::Result<bool> {
        self.params.set_nonblock(nonblock);
        self.sync_blocking_mode()?;
        Ok(self.applied_nonblock)
    }

    /// Wait until the session is ready for `events`
    ///
    /// Plaintext already decrypted inside the engine counts as readable.
    pub fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> io::Result<bool> {
        if matches!(events, PollEvents::Read | PollEvents::Both) && self.stream.ssl().pending() > 0
        {
            return Ok(true);
        }
        self.stream.get_ref().poll(events, timeout)
    }

    /// Send `close_notify` and shut down the transport
    pub fn close(&mut self) -> io::Result<()> {
        if !self.failed {
            if let Err(e) = self.stream.shutdown() {
                log::debug!("TLS shutdown with {} failed: {}", self.params.host_port(), e);
            }
        }
        Transport::shutdown(self.stream.get_mut())
    }

    /// Whether a read or write failed on this session
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Negotiated session parameters
    pub fn info(&self) -> SessionInfo {
        let ssl = self.stream.ssl();
        SessionInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl.current_cipher().map(|c| c.name().to_string()),
            servername: ssl.servername(NameType::HOST_NAME).map(|s| s.to_string()),
            cert_chain: get_cert_chain(ssl),
            sess_reused: ssl.session_reused(),
        }
    }

    pub fn peer_certificate(&self) -> Option<X509> {
        self.stream.ssl().peer_certificate()
    }

    /// Get reference to underlying transport
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Get mutable reference to underlying transport
    pub fn get_mut(&mut self) -> &mut S {
        self.stream.get_mut()
    }

    /// Re-run the capability guard and bring the transport in line with it
    fn sync_blocking_mode(&mut self) -> io::Result<()> {
        let nonblock = self.capabilities.guard_nonblock(&mut self.params);
        if nonblock != self.applied_nonblock {
            self.stream.get_ref().set_nonblocking(nonblock)?;
            self.applied_nonblock = nonblock;
        }
        Ok(())
    }

    fn record_error(&mut self, e: io::Error) -> io::Error {
        if !matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) {
            self.failed = true;
        }
        e
    }
}

impl<S: Transport> Read for SecureSocket<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.sync_blocking_mode()?;
        self.stream.read(buf).map_err(|e| self.record_error(e))
    }
}

impl<S: Transport> Write for SecureSocket<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sync_blocking_mode()?;
        self.stream.write(buf).map_err(|e| self.record_error(e))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync_blocking_mode()?;
        self.stream.flush().map_err(|e| self.record_error(e))
    }
}

impl<S: Transport> std::fmt::Debug for SecureSocket<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSocket")
            .field("host_port", &self.params.host_port())
            .field("version", &self.stream.ssl().version_str())
            .field("nonblock", &self.applied_nonblock)
            .field("failed", &self.failed)
            .finish()
    }
}

/// SNI carries DNS names only
fn sni_applicable(host: &str) -> bool {
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().is_err()
}

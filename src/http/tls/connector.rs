//! Connection bootstrap
//!
//! [`Connector::connect`] runs the whole sequence for one connection attempt:
//!
//! 1. capability guard on the non-blocking flag
//! 2. TLS context construction (all configuration errors surface here, before I/O)
//! 3. CONNECT tunnel through the forward proxy, when one is configured
//! 4. TLS handshake with SNI
//! 5. hostname check against the peer certificate, when peer verification is on
//!
//! Any failure is terminal for the attempt. Nothing is retried.

use super::capability::TlsCapabilities;
use super::config::{ConnectionParams, TlsError};
use super::context::TlsContext;
use super::revocation::RevocationProvider;
use super::session::SecureSocket;
use crate::http::proxy::{establish_tunnel, ProxyConfig};
use crate::http::transport::Transport;
use std::fmt;

/// Establishes secure connections over caller-supplied transports
///
/// A connector holds no per-connection state and can be shared between threads.
pub struct Connector {
    capabilities: TlsCapabilities,
    revocation: Option<Box<dyn RevocationProvider>>,
}

impl Connector {
    /// Connector for the linked TLS engine, without revocation support
    pub fn new() -> Self {
        Connector {
            capabilities: TlsCapabilities::engine(),
            revocation: None,
        }
    }

    /// Override the detected engine capabilities
    pub fn with_capabilities(mut self, capabilities: TlsCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Install the provider used for `ssl_verify_dapple`
    pub fn with_revocation_provider(mut self, provider: impl RevocationProvider + 'static) -> Self {
        self.revocation = Some(Box::new(provider));
        self
    }

    pub fn capabilities(&self) -> TlsCapabilities {
        self.capabilities
    }

    /// Build the TLS context `params` describe
    pub fn context(&self, params: &ConnectionParams) -> Result<TlsContext, TlsError> {
        TlsContext::build(params, self.revocation.as_deref())
    }

    /// Establish a secure connection over `transport`
    ///
    /// The transport must already be connected to the target, or to `proxy`
    /// when one is given. It is owned by the returned socket; on failure it is
    /// dropped and must not be reused.
    pub fn connect<S: Transport>(
        &self,
        mut transport: S,
        mut params: ConnectionParams,
        proxy: Option<&ProxyConfig>,
    ) -> Result<SecureSocket<S>, TlsError> {
        self.capabilities.guard_nonblock(&mut params);

        let context = self.context(&params)?;

        // Tunnel and handshake run blocking; the requested mode applies afterwards
        transport.set_nonblocking(false)?;

        if let Some(proxy) = proxy {
            establish_tunnel(&mut transport, params.host_port(), proxy)?;
        }

        SecureSocket::handshake(transport, context, params, self.capabilities)
    }
}

impl Default for Connector {
    fn default() -> Self {
        Connector::new()
    }
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("capabilities", &self.capabilities)
            .field("revocation", &self.revocation.is_some())
            .finish()
    }
}

//! TLS engine capabilities
//!
//! What the linked TLS engine can do is fixed for the life of the process, so
//! it is probed once and then consulted as a plain value.

use super::config::ConnectionParams;
use std::sync::OnceLock;

/// First OpenSSL release with the server name indication extension (0.9.8f)
const SNI_MIN_VERSION: i64 = 0x0090_806f;

/// Features of the TLS engine the connection layer depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsCapabilities {
    nonblock: bool,
    sni: bool,
}

impl TlsCapabilities {
    pub const fn new(nonblock: bool, sni: bool) -> Self {
        TlsCapabilities { nonblock, sni }
    }

    /// Capabilities of the linked OpenSSL, probed on first use
    pub fn engine() -> TlsCapabilities {
        static ENGINE: OnceLock<TlsCapabilities> = OnceLock::new();

        *ENGINE.get_or_init(|| {
            let caps = TlsCapabilities {
                // SslStream surfaces WANT_READ/WANT_WRITE as WouldBlock
                nonblock: true,
                sni: openssl::version::number() >= SNI_MIN_VERSION,
            };
            log::debug!("TLS engine {}: {:?}", openssl::version::version(), caps);
            caps
        })
    }

    /// Whether reads and writes may return would-block
    pub fn nonblock(&self) -> bool {
        self.nonblock
    }

    /// Whether a hostname can be sent with the client hello
    pub fn sni(&self) -> bool {
        self.sni
    }

    /// Clear a non-blocking request the engine cannot honour
    ///
    /// Returns the effective flag. Safe to call before every operation: the
    /// warning is emitted only when the flag is actually cleared.
    pub fn guard_nonblock(&self, params: &mut ConnectionParams) -> bool {
        if params.nonblock() && !self.nonblock {
            log::warn!(
                "nonblock is not supported by this TLS engine ({}), using blocking I/O",
                openssl::version::version()
            );
            params.set_nonblock(false);
        }
        params.nonblock()
    }
}

impl Default for TlsCapabilities {
    fn default() -> Self {
        TlsCapabilities::engine()
    }
}

//! TLS context construction
//!
//! A [`TlsContext`] is the handshake configuration derived from one set of
//! [`ConnectionParams`]: verification mode, trust source, client identity and
//! the optional revocation callback. Everything that can fail here fails before
//! the first byte goes out on the transport.

use super::config::{ConnectionParams, TlsError};
use super::revocation::{RevocationError, RevocationProvider, RevocationValidator};
use openssl::pkey::PKey;
use openssl::ssl::{SslContext, SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode};
use openssl::x509::store::X509Lookup;
use openssl::x509::{X509VerifyResult, X509};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Where trusted CA certificates come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustSource {
    /// Peer verification is off; nothing is trusted or checked
    None,
    /// Directory of hashed CA certificates
    CaPath(PathBuf),
    /// PEM bundle of CA certificates
    CaFile(PathBuf),
    /// The engine's default verify paths
    SystemDefault,
}

impl TrustSource {
    /// Select the trust source: CA path, then CA file, then the engine default
    pub fn from_params(params: &ConnectionParams) -> Self {
        if !params.verify_peer() {
            return TrustSource::None;
        }

        if let Some(path) = params.ca_path() {
            TrustSource::CaPath(path.to_path_buf())
        } else if let Some(file) = params.ca_file() {
            TrustSource::CaFile(file.to_path_buf())
        } else {
            TrustSource::SystemDefault
        }
    }

    /// The CA bundle file, when that is the trust source
    pub fn ca_file(&self) -> Option<&Path> {
        match self {
            TrustSource::CaFile(file) => Some(file),
            _ => None,
        }
    }

    fn load(&self, builder: &mut SslContextBuilder) -> Result<(), TlsError> {
        match self {
            TrustSource::None => {}
            TrustSource::CaPath(dir) => {
                let dir_str = dir.to_str().ok_or_else(|| {
                    TlsError::InvalidConfig(format!("CA path is not valid UTF-8: {}", dir.display()))
                })?;
                builder
                    .cert_store_mut()
                    .add_lookup(X509Lookup::hash_dir())?
                    .add_dir(dir_str, SslFiletype::PEM)?;
            }
            TrustSource::CaFile(file) => {
                builder.set_ca_file(file).map_err(|e| {
                    TlsError::Certificate(format!(
                        "Failed to load CA file {}: {}",
                        file.display(),
                        e
                    ))
                })?;
            }
            TrustSource::SystemDefault => builder.set_default_verify_paths()?,
        }
        Ok(())
    }
}

/// Handshake configuration for a single connection attempt
///
/// Built fresh for every attempt and consumed by the handshake; never shared.
pub struct TlsContext {
    ctx: SslContext,
    verify_peer: bool,
    trust: TrustSource,
    client_identity: bool,
    revocation_check: bool,
}

impl TlsContext {
    /// Build the context for `params`
    ///
    /// `revocation` supplies the validator when `params` ask for revocation
    /// checking; asking without a provider is a configuration error.
    pub fn build(
        params: &ConnectionParams,
        revocation: Option<&dyn RevocationProvider>,
    ) -> Result<Self, TlsError> {
        let mut builder = SslContextBuilder::new(SslMethod::tls_client())?;

        if let Some(min) = params.min_version() {
            builder.set_min_proto_version(Some(min.to_openssl_version()))?;
        }
        if let Some(max) = params.max_version() {
            builder.set_max_proto_version(Some(max.to_openssl_version()))?;
        }

        let trust = TrustSource::from_params(params);
        if params.verify_peer() {
            builder.set_verify(SslVerifyMode::PEER);
            trust.load(&mut builder)?;
        } else {
            builder.set_verify(SslVerifyMode::NONE);
        }

        let revocation_check = match params.revocation() {
            Some(descriptor) => {
                let provider = revocation.ok_or(RevocationError::Unavailable)?;
                let mut validator = provider.create(&trust, descriptor)?;
                validator.prepare()?;
                bind_revocation(&mut builder, validator);
                true
            }
            None => false,
        };

        let client_identity = match (params.client_cert(), params.client_key()) {
            (Some(cert), Some(key)) => {
                load_client_identity(&mut builder, cert, key)?;
                true
            }
            (None, None) => false,
            _ => {
                return Err(TlsError::InvalidConfig(
                    "client_cert and client_key must be set together".to_string(),
                ))
            }
        };

        log::debug!(
            "TLS context for {}: verify_peer={} trust={:?} client_identity={} revocation={}",
            params.host(),
            params.verify_peer(),
            trust,
            client_identity,
            revocation_check
        );

        Ok(TlsContext {
            ctx: builder.build(),
            verify_peer: params.verify_peer(),
            trust,
            client_identity,
            revocation_check,
        })
    }

    /// Verification mode the handshake runs with
    pub fn verify_mode(&self) -> SslVerifyMode {
        self.ctx.verify_mode()
    }

    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn trust_source(&self) -> &TrustSource {
        &self.trust
    }

    /// Whether a client certificate is presented for mutual TLS
    pub fn has_client_identity(&self) -> bool {
        self.client_identity
    }

    /// Whether a revocation validator is bound into chain verification
    pub fn has_revocation_check(&self) -> bool {
        self.revocation_check
    }

    pub(crate) fn ssl_context(&self) -> &SslContext {
        &self.ctx
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("verify_mode", &self.verify_mode())
            .field("trust", &self.trust)
            .field("client_identity", &self.client_identity)
            .field("revocation_check", &self.revocation_check)
            .finish()
    }
}

/// Accept a chain only if the engine verified it and the validator agrees
fn bind_revocation(builder: &mut SslContextBuilder, validator: Box<dyn RevocationValidator>) {
    builder.set_verify_callback(SslVerifyMode::PEER, move |preverify_ok, x509_ctx| {
        if !preverify_ok {
            return false;
        }

        // The callback runs once per chain depth; the whole chain is only known good at the leaf.
        if x509_ctx.error_depth() > 0 {
            return true;
        }

        let chain: Vec<X509> = x509_ctx
            .chain()
            .map(|stack| stack.iter().map(|cert| cert.to_owned()).collect())
            .unwrap_or_default();

        if validator.validate(&chain) {
            true
        } else {
            log::debug!("Revocation validator rejected a chain of {} certificates", chain.len());
            x509_ctx.set_error(X509VerifyResult::APPLICATION_VERIFICATION);
            false
        }
    });
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|e| {
        TlsError::Certificate(format!("Failed to read {} {}: {}", what, path.display(), e))
    })
}

fn load_client_identity(
    builder: &mut SslContextBuilder,
    cert_path: &Path,
    key_path: &Path,
) -> Result<(), TlsError> {
    let cert_pem = read_pem(cert_path, "client certificate")?;
    let cert = X509::from_pem(&cert_pem).map_err(|e| {
        TlsError::Certificate(format!(
            "Failed to load client certificate {}: {}",
            cert_path.display(),
            e
        ))
    })?;

    let key_pem = read_pem(key_path, "client key")?;
    let key = PKey::private_key_from_pem(&key_pem).map_err(|e| {
        TlsError::Certificate(format!(
            "Failed to load client key {}: {}",
            key_path.display(),
            e
        ))
    })?;

    builder.set_certificate(&cert)?;
    builder.set_private_key(&key)?;
    builder.check_private_key().map_err(|e| {
        TlsError::Certificate(format!("Client key does not match certificate: {}", e))
    })?;

    Ok(())
}

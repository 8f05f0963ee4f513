//! Pluggable certificate revocation checks
//!
//! Revocation checking (OCSP and friends) is not done by this crate. A caller
//! that wants it installs a [`RevocationProvider`] on the connector; when the
//! connection parameters carry a [`RevocationDescriptor`], the provider builds a
//! [`RevocationValidator`] that the handshake consults after the engine's own
//! chain verification has passed.

use super::context::TrustSource;
use openssl::x509::X509;
use std::fmt;

/// Revocation plugin errors
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    #[error("requested revocation checking, but no revocation validator is available")]
    Unavailable,

    #[error("revocation validator setup failed: {0}")]
    Setup(String),
}

/// Settings used to construct a revocation validator
///
/// The contents are passed through to the provider untouched.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RevocationDescriptor {
    responder: String,
    ocsp_key: Vec<u8>,
    ocsp_nonce: Vec<u8>,
    signatures: Vec<Vec<u8>>,
}

impl RevocationDescriptor {
    /// Descriptor for the responder at `responder`
    pub fn new(responder: impl Into<String>) -> Self {
        RevocationDescriptor {
            responder: responder.into(),
            ..Default::default()
        }
    }

    /// Key material the responder signs with
    pub fn ocsp_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.ocsp_key = key.into();
        self
    }

    pub fn ocsp_nonce(mut self, nonce: impl Into<Vec<u8>>) -> Self {
        self.ocsp_nonce = nonce.into();
        self
    }

    /// Add one expected signature
    pub fn signature(mut self, signature: impl Into<Vec<u8>>) -> Self {
        self.signatures.push(signature.into());
        self
    }

    pub fn responder(&self) -> &str {
        &self.responder
    }

    pub fn key(&self) -> &[u8] {
        &self.ocsp_key
    }

    pub fn nonce(&self) -> &[u8] {
        &self.ocsp_nonce
    }

    pub fn signatures(&self) -> &[Vec<u8>] {
        &self.signatures
    }
}

impl fmt::Debug for RevocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevocationDescriptor")
            .field("responder", &self.responder)
            .field("ocsp_key_len", &self.ocsp_key.len())
            .field("ocsp_nonce_len", &self.ocsp_nonce.len())
            .field("signatures", &self.signatures.len())
            .finish()
    }
}

/// Decides whether a peer certificate chain has been revoked
pub trait RevocationValidator: Send + Sync {
    /// One-time setup before the handshake, such as priming a response cache
    fn prepare(&mut self) -> Result<(), RevocationError> {
        Ok(())
    }

    /// Accept (`true`) or reject the chain, leaf first
    fn validate(&self, chain: &[X509]) -> bool;
}

/// Builds revocation validators from connection settings
pub trait RevocationProvider: Send + Sync {
    fn create(
        &self,
        trust: &TrustSource,
        descriptor: &RevocationDescriptor,
    ) -> Result<Box<dyn RevocationValidator>, RevocationError>;
}

/// Validator backed by a closure
pub struct FnValidator<F>(pub F);

impl<F> RevocationValidator for FnValidator<F>
where
    F: Fn(&[X509]) -> bool + Send + Sync,
{
    fn validate(&self, chain: &[X509]) -> bool {
        (self.0)(chain)
    }
}

/// Provider backed by a closure
pub struct FnProvider<F>(pub F);

impl<F> RevocationProvider for FnProvider<F>
where
    F: Fn(&TrustSource, &RevocationDescriptor) -> Result<Box<dyn RevocationValidator>, RevocationError>
        + Send
        + Sync,
{
    fn create(
        &self,
        trust: &TrustSource,
        descriptor: &RevocationDescriptor,
    ) -> Result<Box<dyn RevocationValidator>, RevocationError> {
        (self.0)(trust, descriptor)
    }
}

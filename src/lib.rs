//! securesock - secure, optionally proxied HTTP client transport
//!
//! This crate establishes a single TLS connection for an HTTP client: it wraps a
//! raw byte-stream transport, negotiates an HTTP CONNECT tunnel when a forward
//! proxy is configured, performs the TLS handshake with configurable peer
//! verification and hands back the authenticated transport.

pub mod http;

//! Certificate identity
//!
//! This module extracts the names a certificate is issued for and checks them
//! against the host a connection was meant to reach. The check runs after the
//! handshake and is independent of chain verification: a chain can be perfectly
//! valid and still belong to someone else.

use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref};
use std::net::IpAddr;

/// Names carried by a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject Common Name
    pub subject: Option<String>,
    /// Issuer Common Name
    pub issuer: Option<String>,
    /// DNS subject alternative names
    pub dns_names: Vec<String>,
    /// IP address subject alternative names
    pub ip_addresses: Vec<IpAddr>,
}

impl CertInfo {
    /// Extract certificate information from an X.509 certificate
    pub fn from_x509(cert: &X509Ref) -> Self {
        let mut dns_names = Vec::new();
        let mut ip_addresses = Vec::new();

        if let Some(san_ext) = cert.subject_alt_names() {
            for name in &san_ext {
                if let Some(dns) = name.dnsname() {
                    dns_names.push(dns.to_string());
                } else if let Some(ip) = name.ipaddress() {
                    if let Some(addr) = ip_from_bytes(ip) {
                        ip_addresses.push(addr);
                    }
                }
            }
        }

        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            dns_names,
            ip_addresses,
        }
    }

    /// Whether the certificate is valid for `host`
    ///
    /// IP literals match IP SANs only. DNS names match DNS SANs when the
    /// certificate has any SAN, and fall back to the subject CN otherwise.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(addr) = host.parse::<IpAddr>() {
            return self.ip_addresses.contains(&addr);
        }

        let host = host.strip_suffix('.').unwrap_or(host);
        if host.is_empty() {
            return false;
        }

        if !self.dns_names.is_empty() || !self.ip_addresses.is_empty() {
            return self
                .dns_names
                .iter()
                .any(|pattern| hostname_matches(pattern, host));
        }

        self.subject
            .as_deref()
            .is_some_and(|cn| hostname_matches(cn, host))
    }
}

/// Check the peer certificate against the intended host
pub fn verify_certificate_identity(cert: &X509Ref, host: &str) -> bool {
    CertInfo::from_x509(cert).matches_host(host)
}

/// Peer certificate first, then the rest of the presented chain
pub fn get_cert_chain(ssl: &openssl::ssl::SslRef) -> Vec<CertInfo> {
    let mut chain = Vec::new();

    if let Some(peer_cert) = ssl.peer_certificate() {
        chain.push(CertInfo::from_x509(&peer_cert));
    }

    // Client-side, the presented chain repeats the peer certificate at index 0
    if let Some(cert_chain) = ssl.peer_cert_chain() {
        chain.extend(cert_chain.iter().skip(1).map(CertInfo::from_x509));
    }

    chain
}

/// First Common Name of `name`
///
/// A CN with an embedded NUL is treated as absent: the UTF-8 conversion stops
/// at the NUL and would leave only the prefix to match against.
fn common_name(name: &X509NameRef) -> Option<String> {
    let entry = name.entries_by_nid(Nid::COMMONNAME).next()?;
    if entry.data().as_slice().contains(&0) {
        return None;
    }
    entry.data().as_utf8().ok().map(|s| s.to_string())
}

fn ip_from_bytes(ip: &[u8]) -> Option<IpAddr> {
    match ip.len() {
        4 => <[u8; 4]>::try_from(ip).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(ip).ok().map(IpAddr::from),
        _ => None,
    }
}

/// Match one certificate name against a host
///
/// A `*` is honoured only as the whole left-most label, covers exactly one
/// label and needs at least two labels after it.
fn hostname_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.strip_suffix('.').unwrap_or(pattern);

    let Some(suffix) = pattern.strip_prefix("*.") else {
        return pattern.eq_ignore_ascii_case(host);
    };

    if suffix.split('.').count() < 2 || suffix.contains('*') {
        return false;
    }

    match host.split_once('.') {
        Some((label, rest)) => !label.is_empty() && rest.eq_ignore_ascii_case(suffix),
        None => false,
    }
}

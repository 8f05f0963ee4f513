//! Shared fixtures for the integration tests
//!
//! Certificates are generated per test run: a CA, leaves signed by it, and
//! PEM copies in a temporary directory for the file-based settings.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{NameType, SslAcceptor, SslMethod, SslVerifyMode};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use securesock::http::{PollEvents, Transport};
use std::cell::RefCell;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

static SERIAL: AtomicU32 = AtomicU32::new(1);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Certificate, key and their PEM files
pub struct Identity {
    pub cert: X509,
    pub key: PKey<Private>,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Test certificate authority
pub struct Pki {
    pub dir: TempDir,
    pub ca: Identity,
}

impl Pki {
    pub fn new(ca_name: &str) -> Pki {
        let dir = tempfile::tempdir().unwrap();
        let key = generate_key();
        let name = name(ca_name);

        let mut builder = base_builder(&key);
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(None, None))
            .unwrap();
        builder.append_extension(ski).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        let ca = write_identity(&dir, "ca", builder.build(), key);
        Pki { dir, ca }
    }

    /// Server certificate for `cn` with the given SANs (IP literals become IP SANs)
    pub fn server(&self, cn: &str, sans: &[&str]) -> Identity {
        self.issue(cn, sans, ExtendedKeyUsage::new().server_auth().build().unwrap())
    }

    pub fn client(&self, cn: &str) -> Identity {
        self.issue(cn, &[], ExtendedKeyUsage::new().client_auth().build().unwrap())
    }

    /// Hashed CA directory usable as `ssl_ca_path`
    pub fn ca_dir(&self) -> PathBuf {
        let dir = self.dir.path().join("certs");
        fs::create_dir_all(&dir).unwrap();
        let hash = self.ca.cert.subject_name_hash();
        fs::write(
            dir.join(format!("{:08x}.0", hash)),
            self.ca.cert.to_pem().unwrap(),
        )
        .unwrap();
        dir
    }

    fn issue(&self, cn: &str, sans: &[&str], eku: openssl::x509::X509Extension) -> Identity {
        let key = generate_key();

        let mut builder = base_builder(&key);
        builder.set_subject_name(&name(cn)).unwrap();
        builder
            .set_issuer_name(self.ca.cert.subject_name())
            .unwrap();
        builder
            .append_extension(BasicConstraints::new().build().unwrap())
            .unwrap();
        builder
            .append_extension(KeyUsage::new().critical().digital_signature().build().unwrap())
            .unwrap();
        builder.append_extension(eku).unwrap();

        if !sans.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for entry in sans {
                if entry.parse::<IpAddr>().is_ok() {
                    san.ip(entry);
                } else {
                    san.dns(entry);
                }
            }
            let san = san
                .build(&builder.x509v3_context(Some(&self.ca.cert), None))
                .unwrap();
            builder.append_extension(san).unwrap();
        }

        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(Some(&self.ca.cert), None))
            .unwrap();
        builder.append_extension(ski).unwrap();
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(&self.ca.cert), None))
            .unwrap();
        builder.append_extension(aki).unwrap();

        builder.sign(&self.ca.key, MessageDigest::sha256()).unwrap();

        let file_stem = cn.replace(|c: char| !c.is_ascii_alphanumeric(), "_");
        write_identity(&self.dir, &file_stem, builder.build(), key)
    }
}

fn generate_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(cn: &str) -> openssl::x509::X509Name {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    name.build()
}

fn base_builder(key: &PKey<Private>) -> X509Builder {
    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(SERIAL.fetch_add(1, Ordering::Relaxed))
        .unwrap()
        .to_asn1_integer()
        .unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder
}

fn write_identity(dir: &TempDir, stem: &str, cert: X509, key: PKey<Private>) -> Identity {
    let cert_file = dir.path().join(format!("{}.pem", stem));
    let key_file = dir.path().join(format!("{}.key", stem));
    fs::write(&cert_file, cert.to_pem().unwrap()).unwrap();
    fs::write(&key_file, key.private_key_to_pem_pkcs8().unwrap()).unwrap();
    Identity {
        cert,
        key,
        cert_file,
        key_file,
    }
}

/// What the loopback TLS server saw
#[derive(Debug, Default)]
pub struct ServerOutcome {
    pub servername: Option<String>,
    pub client_cn: Option<String>,
    pub received: Vec<u8>,
    pub error: Option<String>,
}

/// One-shot TLS server answering `ping` with `pong`
pub struct TlsServer {
    pub addr: SocketAddr,
    handle: JoinHandle<ServerOutcome>,
}

impl TlsServer {
    /// Serve `identity`; with `client_ca`, require a client certificate it issued
    pub fn spawn(identity: &Identity, client_ca: Option<&X509>) -> TlsServer {
        let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls_server()).unwrap();
        acceptor.set_certificate(&identity.cert).unwrap();
        acceptor.set_private_key(&identity.key).unwrap();
        acceptor.check_private_key().unwrap();
        if let Some(ca) = client_ca {
            acceptor.cert_store_mut().add_cert(ca.clone()).unwrap();
            acceptor.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        }
        let acceptor = acceptor.build();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut outcome = ServerOutcome::default();
            let (stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();

            let mut tls = match acceptor.accept(stream) {
                Ok(tls) => tls,
                Err(e) => {
                    outcome.error = Some(e.to_string());
                    return outcome;
                }
            };

            outcome.servername = tls
                .ssl()
                .servername(NameType::HOST_NAME)
                .map(|s| s.to_string());
            outcome.client_cn = tls.ssl().peer_certificate().and_then(|cert| {
                cert.subject_name()
                    .entries_by_nid(Nid::COMMONNAME)
                    .next()
                    .and_then(|entry| entry.data().as_utf8().ok())
                    .map(|s| s.to_string())
            });

            let mut buf = [0u8; 4];
            match tls.read_exact(&mut buf) {
                Ok(()) => {
                    outcome.received.extend_from_slice(&buf);
                    if &buf == b"ping" {
                        let _ = tls.write_all(b"pong");
                        let _ = tls.flush();
                    }
                }
                Err(e) => outcome.error = Some(e.to_string()),
            }

            // Wait for the client to hang up
            let mut rest = Vec::new();
            let _ = tls.read_to_end(&mut rest);
            outcome
        });

        TlsServer { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).unwrap()
    }

    pub fn join(self) -> ServerOutcome {
        self.handle.join().unwrap()
    }
}

/// One-shot forward proxy
///
/// Records the CONNECT request head, answers with `status` and, on 200, relays
/// bytes to `upstream`.
pub struct Proxy {
    pub addr: SocketAddr,
    handle: JoinHandle<Vec<u8>>,
}

impl Proxy {
    pub fn spawn(status: &'static str, upstream: Option<SocketAddr>) -> Proxy {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (mut client, _) = listener.accept().unwrap();
            client
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();

            let mut head = Vec::new();
            let mut byte = [0u8; 1];
            while !head.ends_with(b"\r\n\r\n") {
                match client.read(&mut byte) {
                    Ok(1) => head.push(byte[0]),
                    _ => return head,
                }
            }

            let reply = format!("HTTP/1.1 {}\r\nContent-Length: 0\r\n\r\n", status);
            client.write_all(reply.as_bytes()).unwrap();

            if let (true, Some(upstream)) = (status.starts_with("200"), upstream) {
                relay(client, TcpStream::connect(upstream).unwrap());
            }
            head
        });

        Proxy { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).unwrap()
    }

    /// The CONNECT request head the proxy received
    pub fn join(self) -> String {
        String::from_utf8(self.handle.join().unwrap()).unwrap()
    }
}

fn relay(mut client: TcpStream, mut upstream: TcpStream) {
    let mut client_rx = client.try_clone().unwrap();
    let mut upstream_tx = upstream.try_clone().unwrap();

    let outbound = thread::spawn(move || {
        let _ = io::copy(&mut client_rx, &mut upstream_tx);
        let _ = upstream_tx.shutdown(Shutdown::Write);
    });

    let _ = io::copy(&mut upstream, &mut client);
    let _ = client.shutdown(Shutdown::Write);
    let _ = outbound.join();
}

/// In-memory transport replaying a canned reply and recording writes
#[derive(Default)]
pub struct ScriptedTransport {
    reply: Cursor<Vec<u8>>,
    pub written: Vec<u8>,
    pub blocking_changes: RefCell<Vec<bool>>,
    pub shutdown_calls: usize,
}

impl ScriptedTransport {
    pub fn new(reply: &[u8]) -> Self {
        ScriptedTransport {
            reply: Cursor::new(reply.to_vec()),
            ..Default::default()
        }
    }

    /// Whether anything resembling a TLS record was written
    pub fn saw_tls_record(&self) -> bool {
        self.written.windows(2).any(|w| w == [0x16, 0x03])
    }
}

impl Read for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reply.read(buf)
    }
}

impl Write for ScriptedTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    fn poll(&self, _events: PollEvents, _timeout: Option<Duration>) -> io::Result<bool> {
        Ok(true)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        self.blocking_changes.borrow_mut().push(nonblocking);
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.shutdown_calls += 1;
        Ok(())
    }
}

/// Send `ping`, expect `pong`
pub fn ping<S: Read + Write>(socket: &mut S) {
    socket.write_all(b"ping").unwrap();
    socket.flush().unwrap();
    let mut buf = [0u8; 4];
    socket.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"pong");
}

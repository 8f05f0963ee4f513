//! HTTP response parsing
//!
//! The parser consumes exactly one response and never reads past it: whatever
//! follows on the stream (the TLS handshake, once a tunnel is up) belongs to the
//! next layer.

use super::{
    Error, Headers, HttpResponse, Method, Result, Status, Version, MAX_HEADERS, MAX_HEAD_BYTES,
};
use std::io::{self, Read};

/// Find the next CRLF in a buffer
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON\r\n
/// Example: HTTP/1.1 200 Connection established\r\n
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = Version::from_str(parts[0])?;
    let status_code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(status_code)?;
    let reason = match parts.get(2).map(|r| r.trim()) {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    StatusLine,
    Headers,
    Body { remaining: usize },
    Complete,
}

/// Incremental HTTP response parser
///
/// The request method decides whether a body follows the head: a successful
/// reply to CONNECT never has one. Bodies are only consumed when delimited by
/// `Content-Length`; chunked or close-delimited bodies are left on the stream.
pub struct ResponseParser {
    method: Method,
    state: ParserState,
    buffer: Vec<u8>,
    head_len: usize,
    version: Option<Version>,
    status: Option<Status>,
    reason: Option<String>,
    headers: Headers,
}

impl ResponseParser {
    /// Create a parser for a response to `method`
    pub fn for_method(method: Method) -> Self {
        ResponseParser {
            method,
            state: ParserState::StatusLine,
            buffer: Vec::new(),
            head_len: 0,
            version: None,
            status: None,
            reason: None,
            headers: Headers::new(),
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(response)) when a complete response is parsed,
    /// Ok(None) if more data is needed, or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpResponse>> {
        self.buffer.extend_from_slice(data);

        loop {
            match self.state {
                ParserState::StatusLine => {
                    let Some(line) = self.take_line()? else {
                        return Ok(None);
                    };
                    let (version, status, reason) = parse_status_line(&line)?;
                    self.version = Some(version);
                    self.status = Some(status);
                    self.reason = Some(reason);
                    self.state = ParserState::Headers;
                }
                ParserState::Headers => {
                    let Some(line) = self.take_line()? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        self.state = ParserState::Body {
                            remaining: self.body_length()?,
                        };
                    } else {
                        // Dropping a header could lose Content-Length and desync the stream
                        if self.headers.len() >= MAX_HEADERS {
                            return Err(Error::Parse(format!(
                                "Response has more than {} headers",
                                MAX_HEADERS
                            )));
                        }
                        let (name, value) = Headers::parse_header_line(&line)?;
                        self.headers.insert(name, value);
                    }
                }
                ParserState::Body { remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }
                    let body: Vec<u8> = self.buffer.drain(..remaining).collect();
                    self.state = ParserState::Complete;
                    return self.finish(body).map(Some);
                }
                ParserState::Complete => return Ok(None),
            }
        }
    }

    /// Number of bytes the parser can accept without reading past the response
    pub fn bytes_wanted(&self) -> usize {
        match self.state {
            ParserState::StatusLine | ParserState::Headers => 1,
            ParserState::Body { remaining } => remaining.saturating_sub(self.buffer.len()),
            ParserState::Complete => 0,
        }
    }

    fn take_line(&mut self) -> Result<Option<String>> {
        match find_crlf(&self.buffer) {
            Some(pos) => {
                let line = String::from_utf8_lossy(&self.buffer[..pos]).to_string();
                self.buffer.drain(..pos + 2);
                self.head_len += pos + 2;
                Ok(Some(line))
            }
            None if self.head_len + self.buffer.len() > MAX_HEAD_BYTES => {
                Err(Error::HeadTooLarge(MAX_HEAD_BYTES))
            }
            None => Ok(None),
        }
    }

    fn body_length(&self) -> Result<usize> {
        let status = self.status.unwrap_or(Status::OK);
        if !self.method.response_has_body(status) {
            return Ok(0);
        }

        match self.headers.get("Content-Length") {
            Some(cl_str) => cl_str
                .parse::<usize>()
                .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", cl_str))),
            None => Ok(0),
        }
    }

    fn finish(&mut self, body: Vec<u8>) -> Result<HttpResponse> {
        let missing = || Error::Parse("Response completed without a status line".to_string());

        Ok(HttpResponse::new(
            self.version.take().ok_or_else(missing)?,
            self.status.take().ok_or_else(missing)?,
            self.reason.take().ok_or_else(missing)?,
            std::mem::take(&mut self.headers),
            body,
        ))
    }
}

/// Read exactly one response to `method` from `reader`
///
/// Bytes are pulled no faster than the parser can use them, so the stream is
/// left positioned right after the response.
pub fn read_response<R: Read + ?Sized>(reader: &mut R, method: Method) -> Result<HttpResponse> {
    let mut parser = ResponseParser::for_method(method);
    let mut chunk = vec![0u8; 4096];

    loop {
        let wanted = parser.bytes_wanted().clamp(1, chunk.len());
        let n = match reader.read(&mut chunk[..wanted]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        if let Some(response) = parser.parse(&chunk[..n])? {
            return Ok(response);
        }
    }
}

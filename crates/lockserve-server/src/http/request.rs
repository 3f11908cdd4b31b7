//! HTTP/1.1 request head parsing
//!
//! Grammar accepted:
//!
//! ```text
//! request-line = method SP uri SP version CRLF
//! method       = 1*8 ALPHA
//! uri          = "/" *63( ALNUM / "." / "_" / "-" / "/" )
//! version      = "HTTP/" DIGIT "." DIGIT
//! header       = key ":" SP value CRLF
//! key          = 1*128( ALNUM / "." / "-" )
//! value        = *128( printable ASCII )
//! ```
//!
//! The head ends at the first empty line. URIs may not contain empty,
//! `.` or `..` segments, so a target can never escape the served root.

use core::fmt;
use std::io;

use super::response::Status;

/// Largest request head (request line + headers + blank line)
pub const MAX_HEAD_LEN: usize = 2048;

/// Longest URI including the leading `/`
pub const MAX_URI_LEN: usize = 64;

const MAX_METHOD_LEN: usize = 8;
const MAX_KEY_LEN: usize = 128;
const MAX_VALUE_LEN: usize = 128;

/// Header carrying the client's correlation id
pub const REQUEST_ID_HEADER: &str = "Request-Id";

/// Request method, as far as the server cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    /// Syntactically valid but not served
    Other(String),
}

impl Method {
    fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "PUT" => Method::Put,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Other(m) => m,
        }
    }
}

/// Why a request head was rejected
#[derive(Debug)]
pub enum ParseError {
    /// Head does not follow the grammar
    Malformed(&'static str),

    /// Head did not end within `MAX_HEAD_LEN` bytes
    HeadTooLarge,

    /// Well-formed version other than HTTP/1.1
    VersionNotSupported(String),

    /// Reading the head from the socket failed
    Io(io::Error),
}

impl ParseError {
    /// Status sent back for this error
    pub fn status(&self) -> Status {
        match self {
            ParseError::VersionNotSupported(_) => Status::VersionNotSupported,
            _ => Status::BadRequest,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed(why) => write!(f, "malformed request: {}", why),
            ParseError::HeadTooLarge => write!(f, "request head exceeds {} bytes", MAX_HEAD_LEN),
            ParseError::VersionNotSupported(v) => write!(f, "unsupported version {}", v),
            ParseError::Io(e) => write!(f, "reading request: {}", e),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        ParseError::Io(e)
    }
}

/// A parsed request head
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    headers: Vec<(String, String)>,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Resource name: the URI without its leading `/`
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Value of the first header named exactly `key`
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Correlation id for the audit log, `"0"` when absent
    pub fn request_id(&self) -> &str {
        self.header(REQUEST_ID_HEADER).unwrap_or("0")
    }

    /// Parsed `Content-Length`, if present
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }
}

/// Parse a request head (everything before the blank line)
pub fn parse_head(head: &[u8]) -> Result<Request, ParseError> {
    let text = std::str::from_utf8(head).map_err(|_| ParseError::Malformed("non-ASCII head"))?;
    let text = text
        .strip_suffix("\r\n\r\n")
        .ok_or(ParseError::Malformed("head not terminated by blank line"))?;

    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or("");
    let (method, target, version) = parse_request_line(request_line)?;

    let mut headers = Vec::new();
    for line in lines {
        headers.push(parse_header_line(line)?);
    }

    if version != "HTTP/1.1" {
        return Err(ParseError::VersionNotSupported(version.to_string()));
    }

    let request = Request {
        method: Method::from_token(method),
        target: target.to_string(),
        headers,
    };

    if request.method == Method::Put {
        let valid = request
            .header("Content-Length")
            .map(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) && v.parse::<u64>().is_ok())
            .unwrap_or(false);
        if !valid {
            return Err(ParseError::Malformed("PUT without valid Content-Length"));
        }
    }

    Ok(request)
}

fn parse_request_line(line: &str) -> Result<(&str, &str, &str), ParseError> {
    let mut parts = line.split(' ');
    let (Some(method), Some(uri), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::Malformed("request line needs three fields"));
    };

    if method.is_empty()
        || method.len() > MAX_METHOD_LEN
        || !method.bytes().all(|b| b.is_ascii_alphabetic())
    {
        return Err(ParseError::Malformed("bad method"));
    }

    let target = validate_uri(uri)?;

    let v = version.as_bytes();
    let version_ok = v.len() == 8
        && version.starts_with("HTTP/")
        && v[5].is_ascii_digit()
        && v[6] == b'.'
        && v[7].is_ascii_digit();
    if !version_ok {
        return Err(ParseError::Malformed("bad version"));
    }

    Ok((method, target, version))
}

fn validate_uri(uri: &str) -> Result<&str, ParseError> {
    let target = uri
        .strip_prefix('/')
        .ok_or(ParseError::Malformed("uri must start with /"))?;
    if uri.len() > MAX_URI_LEN {
        return Err(ParseError::Malformed("uri too long"));
    }
    let allowed = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-' | b'/');
    if !target.bytes().all(allowed) {
        return Err(ParseError::Malformed("bad character in uri"));
    }
    if !target.is_empty() && target.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(ParseError::Malformed("bad path segment in uri"));
    }
    Ok(target)
}

fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    let (key, value) = line
        .split_once(": ")
        .ok_or(ParseError::Malformed("header without ': '"))?;

    if key.is_empty()
        || key.len() > MAX_KEY_LEN
        || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return Err(ParseError::Malformed("bad header key"));
    }
    if value.len() > MAX_VALUE_LEN || !value.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(ParseError::Malformed("bad header value"));
    }
    Ok((key.to_string(), value.to_string()))
}

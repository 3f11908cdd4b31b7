//! Response status codes and serialization

use std::io::{self, Write};

/// Every status the server can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Created,
    BadRequest,
    Forbidden,
    NotFound,
    InternalServerError,
    NotImplemented,
    VersionNotSupported,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
            Status::NotImplemented => 501,
            Status::VersionNotSupported => 505,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Created => "Created",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
            Status::NotImplemented => "Not Implemented",
            Status::VersionNotSupported => "Version Not Supported",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// Write a status line and `Content-Length` header, ending the head
pub fn write_head<W: Write>(w: &mut W, status: Status, content_length: u64) -> io::Result<()> {
    write!(
        w,
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n\r\n",
        status.code(),
        status.reason(),
        content_length
    )
}

/// Write a complete status-only response; the body is the reason phrase
pub fn write_status<W: Write>(w: &mut W, status: Status) -> io::Result<()> {
    let body = format!("{}\n", status.reason());
    write_head(w, status, body.len() as u64)?;
    w.write_all(body.as_bytes())?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::Created.code(), 201);
        assert_eq!(Status::Forbidden.code(), 403);
        assert_eq!(Status::NotImplemented.code(), 501);
        assert_eq!(Status::VersionNotSupported.to_string(), "505 Version Not Supported");
    }

    #[test]
    fn test_write_status() {
        let mut out = Vec::new();
        write_status(&mut out, Status::NotFound).unwrap();
        assert_eq!(out, b"HTTP/1.1 404 Not Found\r\nContent-Length: 10\r\n\r\nNot Found\n");
    }

    #[test]
    fn test_write_head_only() {
        let mut out = Vec::new();
        write_head(&mut out, Status::Ok, 5).unwrap();
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n");
    }
}

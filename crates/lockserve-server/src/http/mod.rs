//! Minimal HTTP/1.1 wire layer: request heads, status responses, and the
//! per-connection reader/writer.
//!
//! One request per connection; no keep-alive, no chunked bodies.

pub mod conn;
pub mod request;
pub mod response;

pub use conn::Connection;
pub use request::{parse_head, Method, ParseError, Request, REQUEST_ID_HEADER};
pub use response::Status;

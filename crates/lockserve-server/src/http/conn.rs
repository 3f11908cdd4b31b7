//! One client connection: reads the request head, receives the body and
//! sends exactly one response
//!
//! Generic over the stream so the coordinator can be driven by a
//! `TcpStream` in production and by an in-memory stream in tests.

use std::io::{self, Read, Write};

use super::request::{parse_head, ParseError, Request, MAX_HEAD_LEN};
use super::response::{write_head, write_status, Status};
use crate::io::pass_n_bytes;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

pub struct Connection<S> {
    stream: S,
    /// Bytes read past the end of the head (start of the body)
    pending: Vec<u8>,
    /// Set once any response bytes went out
    responded: bool,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            responded: false,
        }
    }

    /// Read and parse the request head
    ///
    /// Anything read beyond the blank line is kept for `recv_body`.
    pub fn read_request(&mut self) -> Result<Request, ParseError> {
        let mut head = [0u8; MAX_HEAD_LEN];
        let mut filled = 0;

        loop {
            if let Some(pos) = head[..filled]
                .windows(HEAD_TERMINATOR.len())
                .position(|w| w == HEAD_TERMINATOR)
            {
                let end = pos + HEAD_TERMINATOR.len();
                self.pending = head[end..filled].to_vec();
                return parse_head(&head[..end]);
            }
            if filled == head.len() {
                return Err(ParseError::HeadTooLarge);
            }

            let n = match self.stream.read(&mut head[filled..]) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ParseError::Io(e)),
            };
            if n == 0 {
                return Err(ParseError::Malformed("connection closed before end of head"));
            }
            filled += n;
        }
    }

    /// Copy exactly `len` body bytes into `dst`
    pub fn recv_body<W: Write + ?Sized>(&mut self, dst: &mut W, len: u64) -> io::Result<()> {
        let buffered = self.pending.len().min(usize::try_from(len).unwrap_or(usize::MAX));
        dst.write_all(&self.pending[..buffered])?;
        self.pending.drain(..buffered);
        pass_n_bytes(&mut self.stream, dst, len - buffered as u64)?;
        Ok(())
    }

    /// Send a status-only response
    pub fn send_status(&mut self, status: Status) -> io::Result<()> {
        self.responded = true;
        write_status(&mut self.stream, status)
    }

    /// Send `200 OK` followed by exactly `len` bytes from `src`
    pub fn send_file<R: Read + ?Sized>(&mut self, src: &mut R, len: u64) -> io::Result<()> {
        self.responded = true;
        write_head(&mut self.stream, Status::Ok, len)?;
        pass_n_bytes(src, &mut self.stream, len)?;
        self.stream.flush()
    }

    /// True once a response has started going out
    pub fn responded(&self) -> bool {
        self.responded
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> S {
        self.stream
    }
}

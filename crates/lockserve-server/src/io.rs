//! Byte-copy helpers and OS error classification

use std::io::{self, Read, Write};

use nix::errno::Errno;

/// Copy exactly `n` bytes from `src` to `dst`
///
/// Fails with `UnexpectedEof` if `src` ends early.
pub fn pass_n_bytes<R, W>(src: &mut R, dst: &mut W, n: u64) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let copied = io::copy(&mut (&mut *src).take(n), dst)?;
    if copied < n {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, got {}", n, copied),
        ));
    }
    Ok(copied)
}

/// True if `err` carries the given OS error number
#[inline]
pub fn is_errno(err: &io::Error, errno: Errno) -> bool {
    err.raw_os_error() == Some(errno as i32)
}

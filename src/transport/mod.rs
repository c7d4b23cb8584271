//! Byte source adapter over any blocking reader.

use std::io::{self, Read};

/// Wraps a blocking reader and guarantees fill-exact read semantics.
///
/// Serial devices routinely deliver fewer bytes than requested per call, so
/// every read here loops until the destination is filled or the stream ends.
pub struct ByteSource<R> {
    inner: R,
}

impl<R: Read> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Fill `dst` completely or fail. A stream that ends before the
    /// destination is full yields `ErrorKind::UnexpectedEof`.
    pub fn read_exact(&mut self, dst: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < dst.len() {
            match self.inner.read(&mut dst[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended mid-read",
                    ));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

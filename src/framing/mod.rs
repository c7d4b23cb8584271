//! SML file framing: escape-delimited frame extraction from a byte stream.

pub mod crc;

use crate::transport::ByteSource;
use log::debug;
use std::io::{self, Read};
use thiserror::Error;

/// Maximum size of one SML file, START and END sequences included.
pub const MAX_FILE_SIZE: usize = 512;

/// Escape prefix shared by the START and END sequences.
pub const ESCAPE_SEQUENCE: [u8; 4] = [0x1B, 0x1B, 0x1B, 0x1B];

/// Full file start: the escape followed by four version-1 bytes.
pub const START_SEQUENCE: [u8; 8] = [0x1B, 0x1B, 0x1B, 0x1B, 0x01, 0x01, 0x01, 0x01];

/// First byte after the escape in an END block.
pub const END_MARKER: u8 = 0x1A;

#[derive(Error, Debug)]
pub enum FrameError {
    /// Source exhausted. Normal termination of the read loop.
    #[error("end of stream")]
    Eof,
    /// Escape found inside the body that does not open an END block.
    #[error("unrecognized sequence")]
    UnrecognizedSequence,
    /// No END within the maximum file size.
    #[error("max sequence length exceeded")]
    SequenceTooLong,
    /// Underlying read failed.
    #[error("read failed: {0}")]
    Io(io::Error),
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::Eof
        } else {
            FrameError::Io(err)
        }
    }
}

/// Extracts escape-delimited SML files from a byte stream, one per call.
///
/// Frames are captured into an internal fixed buffer, so per-frame work is
/// bounded and allocation-free. After a recoverable error the extractor
/// simply resumes scanning for the next START on the following call.
pub struct FrameExtractor<R> {
    source: ByteSource<R>,
    buf: [u8; MAX_FILE_SIZE],
}

impl<R: Read> FrameExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            source: ByteSource::new(reader),
            buf: [0; MAX_FILE_SIZE],
        }
    }

    /// Read up to and including the next complete SML file and return it,
    /// START and END included.
    pub fn next_file(&mut self) -> Result<&[u8], FrameError> {
        let Self { source, buf } = self;
        let mut len = 0usize;

        // Hunt for the start sequence byte by byte; any mismatch resets.
        while len < START_SEQUENCE.len() {
            buf[len] = source.read_byte()?;
            if (buf[len] == 0x1B && len < 4) || (buf[len] == 0x01 && len >= 4) {
                len += 1;
            } else {
                len = 0;
            }
        }

        // The body arrives in 4-byte chunks; an escape chunk must open an
        // END block. Escaped escape sequences inside the body are not part
        // of this protocol version.
        while len + 8 < MAX_FILE_SIZE {
            source.read_exact(&mut buf[len..len + 4])?;
            if buf[len..len + 4] == ESCAPE_SEQUENCE {
                len += 4;
                source.read_exact(&mut buf[len..len + 4])?;
                if buf[len] == END_MARKER {
                    len += 4;
                    let file = &buf[..len];
                    check_crc(file);
                    return Ok(file);
                }
                return Err(FrameError::UnrecognizedSequence);
            }
            len += 4;
        }

        Err(FrameError::SequenceTooLong)
    }
}

/// Advisory transport checksum. Frame boundaries come from the escape
/// protocol alone; a mismatch is only logged.
fn check_crc(file: &[u8]) {
    let computed = crc::crc16(&file[..file.len() - 2]);
    let received = u16::from_be_bytes([file[file.len() - 2], file[file.len() - 1]]);
    if computed != received {
        debug!(
            "frame crc mismatch: computed 0x{:04x}, received 0x{:04x}",
            computed, received
        );
    }
}

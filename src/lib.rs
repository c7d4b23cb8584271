//! Streaming decoder for SML (Smart Message Language), the framing and
//! data-encoding protocol of European smart electricity meters
//! (DIN EN 62056-58/-21).
//!
//! Bytes from a serial-attached optical reader (or any other reader) are
//! scanned for escape-delimited SML files; each file's TLV structure is
//! parsed into typed messages, and the list entries of every
//! `GetListResponse` are handed to callbacks registered by OBIS code
//! prefix. One malformed transmission never aborts the stream: bad frames
//! are skipped and decoding resumes at the next start sequence.
//!
//! ```no_run
//! use smlreader::SmlReader;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let mut reader = SmlReader::new();
//! // Total energy imported, OBIS 1-0:1.8.0.
//! reader.register(&[1, 0, 1, 8, 0], |entry| {
//!     println!("{} {:.1} Wh", entry.object_name(), entry.to_float());
//! });
//!
//! let port = BufReader::new(File::open("/dev/ttyUSB0").unwrap());
//! reader.read(port).unwrap();
//! ```

pub mod framing;
pub mod message;
pub mod obis;
pub mod reader;
pub mod tlv;
pub mod transport;

// Re-export the common types for easier access
pub use message::structs::{
    GetListResponse, ListEntry, Message, MessageBody, OctetString, Time, Value,
};
pub use reader::SmlReader;

//! Driver loop: frames to messages to OBIS callback dispatch.

use crate::framing::{FrameError, FrameExtractor, START_SEQUENCE};
use crate::message::{self, structs::ListEntry, structs::MessageBody};
use crate::obis::ObisTree;
use log::{debug, warn};
use std::io::{self, Read};

/// Streaming SML reader with per-OBIS-prefix callbacks.
///
/// Callbacks are registered up front; [`SmlReader::read`] then drains a
/// byte source synchronously, firing them inline on the calling thread as
/// matching list entries are decoded.
#[derive(Default)]
pub struct SmlReader<'a> {
    tree: ObisTree<'a>,
}

impl<'a> SmlReader<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every list entry whose OBIS code starts
    /// with `code` (zero to six bytes; empty matches every entry).
    /// Callbacks fire in registration order per prefix, shallower prefixes
    /// first.
    pub fn register<F>(&mut self, code: &[u8], callback: F)
    where
        F: FnMut(&ListEntry) + 'a,
    {
        self.tree.register(code, Box::new(callback));
    }

    /// Drain `reader` until end of stream, dispatching matching list
    /// entries along the way.
    ///
    /// Malformed frames — framing faults as well as TLV parse faults — are
    /// discarded and scanning continues with the next frame; a meter that
    /// transmits garbage can never abort a long-running collector. Only an
    /// underlying I/O failure is returned.
    pub fn read<R: Read>(&mut self, reader: R) -> io::Result<()> {
        let mut frames = FrameExtractor::new(reader);

        loop {
            let file = match frames.next_file() {
                Ok(file) => file,
                Err(FrameError::Eof) => return Ok(()),
                Err(err @ (FrameError::UnrecognizedSequence | FrameError::SequenceTooLong)) => {
                    debug!("resynchronising after framing error: {}", err);
                    continue;
                }
                Err(FrameError::Io(err)) => return Err(err),
            };

            // Parse without the escaped start and end sequences.
            let payload = &file[START_SEQUENCE.len()..file.len() - 8];
            let messages = match message::parse_file(payload) {
                Ok(messages) => messages,
                Err(err) => {
                    warn!("discarding malformed frame: {}", err);
                    continue;
                }
            };

            for msg in messages {
                if let MessageBody::GetListResponse(list) = msg.body {
                    for entry in &list.val_list {
                        if !entry.obj_name.is_empty() {
                            self.tree.dispatch(&entry.obj_name, entry);
                        }
                    }
                }
            }
        }
    }
}

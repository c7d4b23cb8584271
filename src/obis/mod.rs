//! OBIS callback dispatch tree and rendering helpers.

use crate::message::structs::ListEntry;
use std::collections::HashMap;

/// Callback invoked with a borrowed list entry; the loan ends with the
/// call, so implementations copy out whatever they need to keep.
pub type ObisCallback<'a> = Box<dyn FnMut(&ListEntry) + 'a>;

/// Prefix trie of callbacks keyed by OBIS code bytes.
///
/// Registering with an empty code attaches a wildcard at the current node.
/// Dispatch fires every callback on the path from the root down the
/// observed code, shallowest first, and stops as soon as either the code is
/// exhausted or no child matches.
#[derive(Default)]
pub struct ObisTree<'a> {
    callbacks: Vec<ObisCallback<'a>>,
    children: HashMap<u8, ObisTree<'a>>,
}

impl<'a> ObisTree<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, code: &[u8], callback: ObisCallback<'a>) {
        match code.split_first() {
            None => self.callbacks.push(callback),
            Some((first, rest)) => self
                .children
                .entry(*first)
                .or_default()
                .register(rest, callback),
        }
    }

    pub fn dispatch(&mut self, code: &[u8], entry: &ListEntry) {
        for callback in &mut self.callbacks {
            callback(entry);
        }
        if let Some((first, rest)) = code.split_first() {
            if let Some(child) = self.children.get_mut(first) {
                child.dispatch(rest, entry);
            }
        }
    }
}

/// Render a six-byte OBIS code as `A-B:C.D.E*F`; anything else falls back
/// to plain hex.
pub fn format_obis_code(code: &[u8]) -> String {
    match code {
        [a, b, c, d, e, f] => format!("{}-{}:{}.{}.{}*{}", a, b, c, d, e, f),
        _ => hex::encode(code),
    }
}

/// Symbol for a DLMS unit code (IEC 62056-6-2), covering the codes
/// electricity meters actually emit.
pub fn unit_name(unit: u8) -> Option<&'static str> {
    match unit {
        1 => Some("a"),
        2 => Some("mo"),
        3 => Some("wk"),
        4 => Some("d"),
        5 => Some("h"),
        6 => Some("min"),
        7 => Some("s"),
        8 => Some("°"),
        9 => Some("°C"),
        11 => Some("m"),
        12 => Some("m/s"),
        13 => Some("m³"),
        15 => Some("m³/h"),
        18 => Some("l"),
        19 => Some("kg"),
        20 => Some("N"),
        23 => Some("Pa"),
        24 => Some("bar"),
        25 => Some("J"),
        27 => Some("W"),
        28 => Some("VA"),
        29 => Some("var"),
        30 => Some("Wh"),
        31 => Some("VAh"),
        32 => Some("varh"),
        33 => Some("A"),
        34 => Some("C"),
        35 => Some("V"),
        36 => Some("V/m"),
        37 => Some("F"),
        38 => Some("Ω"),
        44 => Some("Hz"),
        45 => Some("1/(Wh)"),
        47 => Some("1/(VAh)"),
        52 => Some("K"),
        56 => Some("%"),
        57 => Some("Ah"),
        255 => Some(""),
        _ => None,
    }
}

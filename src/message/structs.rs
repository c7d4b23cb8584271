//! SML data model: the outer message envelope and the bodies the decoder
//! understands.

use crate::obis;
use std::fmt;

/// Immutable byte sequence used for identifiers, OBIS codes and signatures.
pub type OctetString = Vec<u8>;

/// Seconds value carried by an SML time choice; zero when absent.
pub type Time = u32;

// Message type tags (body discriminators).
pub const MESSAGE_OPEN_REQUEST: u32 = 0x0000_0100;
pub const MESSAGE_OPEN_RESPONSE: u32 = 0x0000_0101;
pub const MESSAGE_CLOSE_REQUEST: u32 = 0x0000_0200;
pub const MESSAGE_CLOSE_RESPONSE: u32 = 0x0000_0201;
pub const MESSAGE_GET_PROFILE_PACK_REQUEST: u32 = 0x0000_0300;
pub const MESSAGE_GET_PROFILE_PACK_RESPONSE: u32 = 0x0000_0301;
pub const MESSAGE_GET_PROFILE_LIST_REQUEST: u32 = 0x0000_0400;
pub const MESSAGE_GET_PROFILE_LIST_RESPONSE: u32 = 0x0000_0401;
pub const MESSAGE_GET_PROC_PARAMETER_REQUEST: u32 = 0x0000_0500;
pub const MESSAGE_GET_PROC_PARAMETER_RESPONSE: u32 = 0x0000_0501;
pub const MESSAGE_SET_PROC_PARAMETER_REQUEST: u32 = 0x0000_0600;
pub const MESSAGE_GET_LIST_REQUEST: u32 = 0x0000_0700;
pub const MESSAGE_GET_LIST_RESPONSE: u32 = 0x0000_0701;
pub const MESSAGE_ATTENTION_RESPONSE: u32 = 0x0000_FF01;

/// A single SML data value, keeping the original type family and width so
/// that later rendering can tell a `u32` from an `i64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(OctetString),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl Value {
    /// Numeric payload for the integer families, `None` otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v.into()),
            Value::I16(v) => Some(v.into()),
            Value::I32(v) => Some(v.into()),
            Value::I64(v) => Some(v),
            Value::U8(v) => Some(v.into()),
            Value::U16(v) => Some(v.into()),
            Value::U32(v) => Some(v.into()),
            Value::U64(v) => Some(v as i64),
            Value::Bytes(_) | Value::Bool(_) => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Bytes(OctetString::new())
    }
}

/// One measurement from a `GetListResponse` value list.
///
/// Callbacks receive this borrowed; copy the fields out if they need to
/// outlive the call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListEntry {
    /// OBIS code, usually six bytes.
    pub obj_name: OctetString,
    /// Meter state bits; zero when absent.
    pub status: i64,
    pub val_time: Time,
    /// DLMS unit code, e.g. 30 = Wh.
    pub unit: u8,
    /// Decimal exponent: effective value = raw * 10^scaler.
    pub scaler: i8,
    pub value: Value,
    pub value_signature: OctetString,
}

impl ListEntry {
    /// OBIS code rendered as `A-B:C.D.E*F`.
    pub fn object_name(&self) -> String {
        obis::format_obis_code(&self.obj_name)
    }

    /// Decimal factor encoded by the scaler: exactly `10^scaler`.
    pub fn scale(&self) -> f64 {
        10f64.powi(i32::from(self.scaler))
    }

    /// Scaled reading; `0.0` when the value is not numeric.
    pub fn to_float(&self) -> f64 {
        match self.value.as_i64() {
            Some(raw) => raw as f64 * self.scale(),
            None => 0.0,
        }
    }

    /// Human-oriented rendering of the carried value.
    pub fn value_string(&self) -> String {
        match &self.value {
            Value::Bytes(bytes) => bytes
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect::<Vec<_>>()
                .join(" "),
            Value::Bool(b) => b.to_string(),
            _ => format!("{:12.1}", self.to_float()),
        }
    }
}

impl fmt::Display for ListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<22}{}", self.object_name(), self.value_string())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetListResponse {
    pub client_id: OctetString,
    pub server_id: OctetString,
    pub list_name: OctetString,
    pub act_sensor_time: Time,
    pub val_list: Vec<ListEntry>,
    pub list_signature: OctetString,
    pub act_gateway_time: Time,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenResponse {
    pub codepage: OctetString,
    pub client_id: OctetString,
    pub req_file_id: OctetString,
    pub server_id: OctetString,
    pub ref_time: Time,
    pub sml_version: u8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CloseResponse {
    pub global_signature: OctetString,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttentionResponse {
    pub server_id: OctetString,
    pub attention_number: OctetString,
    pub attention_message: OctetString,
    /// Raw attention-details element, TL included; opaque to the decoder.
    pub attention_details: OctetString,
}

/// Body of an SML message, discriminated by the u32 type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    OpenResponse(OpenResponse),
    CloseResponse(CloseResponse),
    GetListResponse(GetListResponse),
    AttentionResponse(AttentionResponse),
    /// Any other tag. The element is skipped generically so the cursor
    /// advances exactly; the encoded bytes are kept as-is.
    Other { tag: u32, data: OctetString },
}

impl MessageBody {
    pub fn tag(&self) -> u32 {
        match self {
            MessageBody::OpenResponse(_) => MESSAGE_OPEN_RESPONSE,
            MessageBody::CloseResponse(_) => MESSAGE_CLOSE_RESPONSE,
            MessageBody::GetListResponse(_) => MESSAGE_GET_LIST_RESPONSE,
            MessageBody::AttentionResponse(_) => MESSAGE_ATTENTION_RESPONSE,
            MessageBody::Other { tag, .. } => *tag,
        }
    }
}

/// Outer SML message envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub transaction_id: OctetString,
    pub group_no: u8,
    pub abort_on_error: u8,
    pub body: MessageBody,
    /// Envelope checksum as transmitted; stored, never verified.
    pub crc: u16,
}

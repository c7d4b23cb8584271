//! SML message envelope parsing and body dispatch by type tag.

pub mod structs;

use crate::tlv::{Buffer, ParseError, TYPE_LIST};
use log::debug;
use structs::*;

/// End-of-message marker, also used as inter-message padding.
pub const MESSAGE_END: u8 = 0x00;

/// Parse every message in one SML file payload (START and END sequences
/// already stripped). Any parse fault abandons the whole file.
pub fn parse_file(payload: &[u8]) -> Result<Vec<Message>, ParseError> {
    let mut buf = Buffer::new(payload);
    let mut messages = Vec::new();

    while !buf.is_empty() {
        // Files are padded to a multiple of four with zero bytes.
        if buf.peek() == Ok(MESSAGE_END) {
            buf.take_byte()?;
            continue;
        }
        messages.push(parse_message(&mut buf)?);
    }

    Ok(messages)
}

/// Parse one message: a list of six terminated by a raw zero byte.
pub fn parse_message(buf: &mut Buffer<'_>) -> Result<Message, ParseError> {
    buf.expect(TYPE_LIST, 6)?;
    let transaction_id = buf.parse_octet_string()?;
    let group_no = buf.parse_u8()?;
    let abort_on_error = buf.parse_u8()?;
    let body = parse_message_body(buf)?;
    let crc = buf.parse_u16()?;
    if buf.take_byte()? != MESSAGE_END {
        return Err(ParseError::MissingEndOfMessage);
    }

    Ok(Message {
        transaction_id,
        group_no,
        abort_on_error,
        body,
        crc,
    })
}

fn parse_message_body(buf: &mut Buffer<'_>) -> Result<MessageBody, ParseError> {
    buf.expect(TYPE_LIST, 2)?;
    // Meters commonly transmit the tag in two bytes; width expansion covers
    // both encodings.
    let tag = buf.parse_u32()?;

    match tag {
        MESSAGE_GET_LIST_RESPONSE => Ok(MessageBody::GetListResponse(parse_get_list_response(
            buf,
        )?)),
        MESSAGE_OPEN_RESPONSE => Ok(MessageBody::OpenResponse(parse_open_response(buf)?)),
        MESSAGE_CLOSE_RESPONSE => Ok(MessageBody::CloseResponse(parse_close_response(buf)?)),
        MESSAGE_ATTENTION_RESPONSE => Ok(MessageBody::AttentionResponse(
            parse_attention_response(buf)?,
        )),
        _ => {
            debug!("skipping message body with tag 0x{:08x}", tag);
            let data = buf.skip_element_raw()?.to_vec();
            Ok(MessageBody::Other { tag, data })
        }
    }
}

fn parse_get_list_response(buf: &mut Buffer<'_>) -> Result<GetListResponse, ParseError> {
    buf.expect(TYPE_LIST, 7)?;
    let client_id = buf.parse_octet_string()?;
    let server_id = buf.parse_octet_string()?;
    let list_name = buf.parse_octet_string()?;
    let act_sensor_time = buf.parse_time()?;
    let val_list = parse_val_list(buf)?;
    let list_signature = buf.parse_octet_string()?;
    let act_gateway_time = buf.parse_time()?;

    Ok(GetListResponse {
        client_id,
        server_id,
        list_name,
        act_sensor_time,
        val_list,
        list_signature,
        act_gateway_time,
    })
}

fn parse_val_list(buf: &mut Buffer<'_>) -> Result<Vec<ListEntry>, ParseError> {
    if buf.optional_is_skipped() {
        return Ok(Vec::new());
    }
    let (family, elems) = buf.parse_type_length()?;
    if family != TYPE_LIST {
        return Err(ParseError::TypeMismatch {
            expected: TYPE_LIST,
            found: family,
        });
    }

    let mut entries = Vec::new();
    for _ in 0..elems {
        entries.push(parse_list_entry(buf)?);
    }
    Ok(entries)
}

fn parse_list_entry(buf: &mut Buffer<'_>) -> Result<ListEntry, ParseError> {
    buf.expect(TYPE_LIST, 7)?;
    let obj_name = buf.parse_octet_string()?;
    let status = buf.parse_status()?;
    let val_time = buf.parse_time()?;
    let unit = buf.parse_u8()?;
    let scaler = buf.parse_i8()?;
    let value = buf.parse_value()?;
    let value_signature = buf.parse_octet_string()?;

    Ok(ListEntry {
        obj_name,
        status,
        val_time,
        unit,
        scaler,
        value,
        value_signature,
    })
}

fn parse_open_response(buf: &mut Buffer<'_>) -> Result<OpenResponse, ParseError> {
    buf.expect(TYPE_LIST, 6)?;
    let codepage = buf.parse_octet_string()?;
    let client_id = buf.parse_octet_string()?;
    let req_file_id = buf.parse_octet_string()?;
    let server_id = buf.parse_octet_string()?;
    let ref_time = buf.parse_time()?;
    let sml_version = buf.parse_u8()?;

    Ok(OpenResponse {
        codepage,
        client_id,
        req_file_id,
        server_id,
        ref_time,
        sml_version,
    })
}

fn parse_close_response(buf: &mut Buffer<'_>) -> Result<CloseResponse, ParseError> {
    buf.expect(TYPE_LIST, 1)?;
    let global_signature = buf.parse_octet_string()?;
    Ok(CloseResponse { global_signature })
}

fn parse_attention_response(buf: &mut Buffer<'_>) -> Result<AttentionResponse, ParseError> {
    buf.expect(TYPE_LIST, 4)?;
    let server_id = buf.parse_octet_string()?;
    let attention_number = buf.parse_octet_string()?;
    let attention_message = buf.parse_octet_string()?;
    let attention_details = if buf.optional_is_skipped() {
        OctetString::new()
    } else {
        buf.skip_element_raw()?.to_vec()
    };

    Ok(AttentionResponse {
        server_id,
        attention_number,
        attention_message,
        attention_details,
    })
}

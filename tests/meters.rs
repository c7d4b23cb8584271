//! End-to-end decoding scenarios over synthesised meter transmissions.
//!
//! The fixtures mirror the shapes of real optical-probe captures: a DZG
//! DVS-7412.2-style file (five-byte signed energy registers), an EMH
//! eHZ-style stream of many small files, and an ISKRA MT175-style file
//! with per-phase power entries.

use smlreader::framing::crc::crc16;
use smlreader::SmlReader;
use std::cell::{Cell, RefCell};

// ---------------------------------------------------------------------------
// TLV and frame builders
// ---------------------------------------------------------------------------

fn octet(data: &[u8]) -> Vec<u8> {
    let mut element = vec![(data.len() + 1) as u8];
    element.extend_from_slice(data);
    element
}

fn unsigned8(value: u8) -> Vec<u8> {
    vec![0x62, value]
}

fn unsigned16(value: u16) -> Vec<u8> {
    let mut element = vec![0x63];
    element.extend_from_slice(&value.to_be_bytes());
    element
}

fn unsigned32(value: u32) -> Vec<u8> {
    let mut element = vec![0x65];
    element.extend_from_slice(&value.to_be_bytes());
    element
}

fn signed8(value: i8) -> Vec<u8> {
    vec![0x52, value as u8]
}

fn signed32(value: i32) -> Vec<u8> {
    let mut element = vec![0x55];
    element.extend_from_slice(&value.to_be_bytes());
    element
}

/// Five-byte signed integer, as DZG meters encode energy registers.
fn signed40(value: i64) -> Vec<u8> {
    let mut element = vec![0x56];
    element.extend_from_slice(&value.to_be_bytes()[3..]);
    element
}

fn list(elements: u8) -> Vec<u8> {
    vec![0x70 | elements]
}

fn skipped() -> Vec<u8> {
    vec![0x01]
}

/// SML time choice: secIndex tag plus seconds.
fn sec_time(seconds: u32) -> Vec<u8> {
    let mut element = list(2);
    element.extend(unsigned8(0x01));
    element.extend(unsigned32(seconds));
    element
}

fn list_entry(obis: &[u8], status: Vec<u8>, unit: u8, scaler: i8, value: Vec<u8>) -> Vec<u8> {
    let mut entry = list(7);
    entry.extend(octet(obis));
    entry.extend(status);
    entry.extend(skipped()); // val time
    entry.extend(unsigned8(unit));
    entry.extend(signed8(scaler));
    entry.extend(value);
    entry.extend(skipped()); // value signature
    entry
}

fn envelope(transaction: u8, tag: u16, body_data: Vec<u8>) -> Vec<u8> {
    let mut message = list(6);
    message.extend(octet(&[transaction, 0x00, 0x00, 0x5D]));
    message.extend(unsigned8(0x00)); // group no
    message.extend(unsigned8(0x00)); // abort on error
    message.extend(list(2));
    message.extend(unsigned16(tag));
    message.extend(body_data);
    message.extend(unsigned16(0x0000)); // envelope crc, advisory
    message.push(0x00); // end of message
    message
}

fn open_response(server_id: &[u8]) -> Vec<u8> {
    let mut body = list(6);
    body.extend(skipped()); // codepage
    body.extend(skipped()); // client id
    body.extend(octet(&[0x07, 0x00, 0x11, 0x03])); // req file id
    body.extend(octet(server_id));
    body.extend(skipped()); // ref time
    body.extend(skipped()); // sml version
    envelope(0x01, 0x0101, body)
}

fn close_response() -> Vec<u8> {
    let mut body = list(1);
    body.extend(skipped());
    envelope(0x03, 0x0201, body)
}

fn get_list_response(server_id: &[u8], sensor_time: u32, entries: &[Vec<u8>]) -> Vec<u8> {
    let mut body = list(7);
    body.extend(skipped()); // client id
    body.extend(octet(server_id));
    body.extend(skipped()); // list name
    body.extend(sec_time(sensor_time));
    body.extend(list(entries.len() as u8));
    for entry in entries {
        body.extend(entry.clone());
    }
    body.extend(skipped()); // list signature
    body.extend(skipped()); // act gateway time
    envelope(0x02, 0x0701, body)
}

/// Wrap message payloads into one escape-delimited SML file, padded to a
/// multiple of four with a valid transport checksum.
fn frame(messages: &[Vec<u8>]) -> Vec<u8> {
    let mut file = vec![0x1B, 0x1B, 0x1B, 0x1B, 0x01, 0x01, 0x01, 0x01];
    for message in messages {
        file.extend(message.clone());
    }
    let mut padding = 0u8;
    while (file.len() - 8) % 4 != 0 {
        file.push(0x00);
        padding += 1;
    }
    file.extend_from_slice(&[0x1B, 0x1B, 0x1B, 0x1B, 0x1A, padding]);
    let crc = crc16(&file);
    file.extend_from_slice(&crc.to_be_bytes());
    file
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const OBIS_ENERGY_IMPORT: [u8; 6] = [1, 0, 1, 8, 0, 255];
const OBIS_ENERGY_EXPORT: [u8; 6] = [1, 0, 2, 8, 0, 255];
const OBIS_POWER_TOTAL: [u8; 6] = [1, 0, 16, 7, 0, 255];
const OBIS_POWER_L1: [u8; 6] = [1, 0, 36, 7, 0, 255];
const OBIS_POWER_L2: [u8; 6] = [1, 0, 56, 7, 0, 255];
const OBIS_POWER_L3: [u8; 6] = [1, 0, 76, 7, 0, 255];

const UNIT_WH: u8 = 30;
const UNIT_W: u8 = 27;

fn dzg_file() -> Vec<u8> {
    let server_id = [0x0A, 0x01, 0x44, 0x5A, 0x47, 0x00, 0x02, 0x8A, 0x1F, 0x90];
    let entries = [
        list_entry(
            &OBIS_ENERGY_IMPORT,
            unsigned32(0x0001_0182),
            UNIT_WH,
            -1,
            signed40(87_824_004),
        ),
        list_entry(&OBIS_ENERGY_EXPORT, skipped(), UNIT_WH, -1, signed40(1_204_664)),
        list_entry(&OBIS_POWER_TOTAL, skipped(), UNIT_W, 0, signed32(2460)),
    ];
    frame(&[
        open_response(&server_id),
        get_list_response(&server_id, 42_317_554, &entries),
        close_response(),
    ])
}

fn emh_file(sensor_time: u32) -> Vec<u8> {
    let server_id = [0x06, 0x45, 0x4D, 0x48, 0x01, 0x02, 0x9A, 0x7B, 0x3C, 0x4D];
    let entries = [
        list_entry(
            &[129, 129, 199, 130, 3, 255],
            skipped(),
            255,
            0,
            octet(b"EMH"),
        ),
        list_entry(
            &OBIS_ENERGY_IMPORT,
            unsigned32(0x0182),
            UNIT_WH,
            -1,
            signed40(53_309_184),
        ),
        list_entry(&OBIS_POWER_TOTAL, skipped(), UNIT_W, 0, signed32(186)),
    ];
    frame(&[
        open_response(&server_id),
        get_list_response(&server_id, sensor_time, &entries),
        close_response(),
    ])
}

fn iskra_file() -> Vec<u8> {
    let server_id = [0x09, 0x01, 0x49, 0x53, 0x4B, 0x00, 0x04, 0x71, 0x22, 0x33];
    let entries = [
        list_entry(
            &OBIS_ENERGY_IMPORT,
            unsigned32(0x0182),
            UNIT_WH,
            -1,
            signed40(12_345_678),
        ),
        list_entry(&OBIS_POWER_TOTAL, skipped(), UNIT_W, 0, signed32(512)),
        list_entry(&OBIS_POWER_L1, skipped(), UNIT_W, 0, signed32(170)),
        list_entry(&OBIS_POWER_L2, skipped(), UNIT_W, 0, signed32(160)),
        list_entry(&OBIS_POWER_L3, skipped(), UNIT_W, 0, signed32(182)),
    ];
    frame(&[
        open_response(&server_id),
        get_list_response(&server_id, 9_177_101, &entries),
        close_response(),
    ])
}

fn all_fixtures() -> Vec<Vec<u8>> {
    vec![dzg_file(), emh_file(1000), iskra_file()]
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_dzg_readings() {
    let import = Cell::new(0i64);
    let export = Cell::new(0i64);
    let power = Cell::new(false);

    let mut reader = SmlReader::new();
    reader.register(&[1, 0, 1, 8, 0], |entry| {
        import.set(entry.value.as_i64().unwrap_or(0));
    });
    reader.register(&[1, 0, 2, 8, 0], |entry| {
        export.set(entry.value.as_i64().unwrap_or(0));
    });
    reader.register(&[1, 0, 16, 7, 0], |_| power.set(true));

    reader.read(&dzg_file()[..]).unwrap();

    assert!(import.get() > 0, "Bezug should be positive");
    assert!(export.get() > 0, "Einspeisung should be positive");
    assert!(power.get(), "Leistung entry missing");
}

#[test]
fn test_emh_stream_of_files() {
    let mut data = Vec::new();
    for i in 0..6u32 {
        data.extend(emh_file(1000 + i));
    }

    let count = Cell::new(0u32);
    let mut reader = SmlReader::new();
    reader.register(&[1, 0, 1, 8, 0], |entry| {
        count.set(count.get() + 1);
        assert_eq!(entry.unit, UNIT_WH);
        assert!(entry.value.as_i64().unwrap_or(0) > 0);
    });

    reader.read(&data[..]).unwrap();
    assert!(count.get() >= 5, "expected one hit per file, got {}", count.get());
}

#[test]
fn test_iskra_per_phase_entries() {
    let hits = RefCell::new(Vec::new());
    let mut reader = SmlReader::new();
    reader.register(&[1, 0, 1, 8, 0], |_| hits.borrow_mut().push("1.8.0"));
    reader.register(&[1, 0, 16, 7, 0], |_| hits.borrow_mut().push("16.7.0"));
    reader.register(&[1, 0, 36, 7, 0], |_| hits.borrow_mut().push("36.7.0"));
    reader.register(&[1, 0, 56, 7, 0], |_| hits.borrow_mut().push("56.7.0"));
    reader.register(&[1, 0, 76, 7, 0], |_| hits.borrow_mut().push("76.7.0"));

    reader.read(&iskra_file()[..]).unwrap();

    let hits = hits.borrow();
    for code in ["1.8.0", "16.7.0", "36.7.0", "56.7.0", "76.7.0"] {
        assert!(hits.contains(&code), "missing OBIS 1-0:{}", code);
    }
}

#[test]
fn test_corrupt_frame_then_valid_frame() {
    // A well-framed file whose payload is TLV garbage, followed by a good
    // capture. The bad frame must cost nothing but itself.
    let mut data = frame(&[vec![0x76, 0xFF, 0xFF, 0xFF]]);
    data.extend(dzg_file());

    let count = Cell::new(0u32);
    let mut reader = SmlReader::new();
    reader.register(&[1, 0, 1, 8, 0], |_| count.set(count.get() + 1));

    reader.read(&data[..]).unwrap();
    assert!(count.get() >= 1);
}

#[test]
fn test_garbage_prefix_then_valid_frame() {
    let mut data = vec![0xDE, 0xAD, 0x1B, 0x1B, 0x1B, 0x00, 0x42];
    data.extend(dzg_file());

    let count = Cell::new(0u32);
    let mut reader = SmlReader::new();
    reader.register(&[1, 0, 1, 8, 0], |_| count.set(count.get() + 1));

    reader.read(&data[..]).unwrap();
    assert_eq!(count.get(), 1);
}

#[test]
fn test_overlong_sequence_is_skipped() {
    // A START with no END within the size cap, then a good capture.
    let mut data = vec![0x1B, 0x1B, 0x1B, 0x1B, 0x01, 0x01, 0x01, 0x01];
    data.extend_from_slice(&vec![0u8; 600]);
    data.extend(dzg_file());

    let count = Cell::new(0u32);
    let mut reader = SmlReader::new();
    reader.register(&[1, 0, 1, 8, 0], |_| count.set(count.get() + 1));

    reader.read(&data[..]).unwrap();
    assert_eq!(count.get(), 1);
}

#[test]
fn test_empty_reader() {
    let fired = Cell::new(false);
    let mut reader = SmlReader::new();
    reader.register(&[], |_| fired.set(true));

    reader.read(&[][..]).unwrap();
    assert!(!fired.get());
}

#[test]
fn test_all_fixtures_scaler_sanity() {
    for fixture in all_fixtures() {
        let mut reader = SmlReader::new();
        reader.register(&[], |entry| {
            let scale = entry.scale();
            let log = scale.abs().log10();
            assert!(
                (log - log.round()).abs() < 1e-9,
                "{}: scale {} is not a power of ten",
                entry.object_name(),
                scale
            );
        });
        reader.read(&fixture[..]).unwrap();
    }
}

#[test]
fn test_wildcard_sees_every_entry() {
    let count = Cell::new(0u32);
    let mut reader = SmlReader::new();
    reader.register(&[], |_| count.set(count.get() + 1));

    reader.read(&dzg_file()[..]).unwrap();
    assert_eq!(count.get(), 3);
}

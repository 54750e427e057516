//! Offset index codec.
//!
//! An index file is a concatenation of fixed-width text records, one per
//! stored message, mapping a message offset to the byte position of its
//! record in the data file. The fixed width makes the record for offset
//! `o` addressable at byte `(o - segment_start_offset) * INDEX_RECORD_LEN`
//! without any scan.

use crate::error::{StoreError, StoreResult};

/// Width of one index record: `"<message_offset>,<byte_position>"`
/// right-padded with NUL bytes. Two full i64s plus the comma.
pub const INDEX_RECORD_LEN: usize = 39;

/// Encodes one index record.
pub fn encode_index(message_offset: i64, byte_position: i64) -> [u8; INDEX_RECORD_LEN] {
    let mut record = [0u8; INDEX_RECORD_LEN];
    let text = format!("{},{}", message_offset, byte_position);
    record[..text.len()].copy_from_slice(text.as_bytes());
    record
}

/// Decodes one index record into `(message_offset, byte_position)`.
///
/// A record that fails to parse is corruption, fatal to the read that
/// touched it; no repair is attempted here.
pub fn decode_index(record: &[u8]) -> StoreResult<(i64, i64)> {
    if record.len() != INDEX_RECORD_LEN {
        return Err(StoreError::CorruptIndex(format!(
            "index record length {} != {}",
            record.len(),
            INDEX_RECORD_LEN
        )));
    }
    let text_len = record
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(INDEX_RECORD_LEN);
    let text = std::str::from_utf8(&record[..text_len])
        .map_err(|e| StoreError::CorruptIndex(format!("index record not utf-8: {}", e)))?;

    let (message_offset, byte_position) = text
        .split_once(',')
        .ok_or_else(|| StoreError::CorruptIndex(format!("index record without comma: {:?}", text)))?;

    let message_offset = message_offset.parse().map_err(|_| {
        StoreError::CorruptIndex(format!("index record message offset: {:?}", message_offset))
    })?;
    let byte_position = byte_position.parse().map_err(|_| {
        StoreError::CorruptIndex(format!("index record byte position: {:?}", byte_position))
    })?;

    Ok((message_offset, byte_position))
}

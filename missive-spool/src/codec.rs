//! On-disk representation of a queued record.
//!
//! A record is written as a JSON object
//! `{from, to, pluginId, ownerParameters, subject, body, footer, createdTime}`
//! and gzip-compressed. The store-assigned id is not part of the payload.

use std::io::{Read, Write};

use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::{error::CodecError, message::MessageRecord};

/// Serialise and compress `record`.
///
/// # Errors
/// If the record cannot be serialised or the compressor fails.
pub fn encode(record: &MessageRecord) -> Result<Vec<u8>, CodecError> {
    let json = serde_json::to_vec(record)?;

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json).map_err(CodecError::Compression)?;
    encoder.finish().map_err(CodecError::Compression)
}

/// Decompress and parse a payload produced by [`encode`].
///
/// The returned record has no id; the store fills it in.
///
/// # Errors
/// If the payload is not valid gzip or does not hold a record.
pub fn decode(bytes: &[u8]) -> Result<MessageRecord, CodecError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(CodecError::Compression)?;

    Ok(serde_json::from_slice(&json)?)
}

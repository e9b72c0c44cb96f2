use crate::bitwriter::BitWriter;
use crate::error::{Error, Result};

pub const OBU_META_ITUT_T35: u64 = 4;

const OBU_HAS_SIZE_FIELD: u8 = 1 << 1;
const OBU_EXTENSION_FLAG: u8 = 1 << 2;
const TRAILING_BITS: u8 = 0x80;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObuType {
    Metadata = 5,
}

impl ObuType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            5 => Some(Self::Metadata),
            _ => None,
        }
    }
}

pub fn leb128_encode(mut value: u64) -> Vec<u8> {
    let mut result = Vec::new();
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        result.push(byte);
        if value == 0 {
            break;
        }
    }
    result
}

/// Returns the value and the number of bytes consumed.
pub fn leb128_decode(data: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    // AV1 caps leb128() at 8 bytes.
    for (i, &byte) in data.iter().take(8).enumerate() {
        value |= ((byte & 0x7F) as u64) << (i * 7);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::InvalidPayload("unterminated leb128 value".into()))
}

pub fn obu_wrap(obu_type: ObuType, payload: &[u8]) -> Vec<u8> {
    let header_byte = (obu_type as u8) << 3 | OBU_HAS_SIZE_FIELD;
    let size_bytes = leb128_encode(payload.len() as u64);
    let mut result = Vec::with_capacity(1 + size_bytes.len() + payload.len());
    result.push(header_byte);
    result.extend_from_slice(&size_bytes);
    result.extend_from_slice(payload);
    result
}

/// Splits a single size-delimited OBU into its type and payload.
pub fn obu_unwrap(data: &[u8]) -> Result<(ObuType, &[u8])> {
    let (&header, rest) = data
        .split_first()
        .ok_or_else(|| Error::InvalidPayload("empty OBU".into()))?;

    if header & 0x80 != 0 {
        return Err(Error::InvalidPayload("obu_forbidden_bit is set".into()));
    }
    if header & OBU_HAS_SIZE_FIELD == 0 {
        return Err(Error::InvalidPayload("OBU without size field".into()));
    }
    let obu_type = ObuType::from_u8((header >> 3) & 0x0F).ok_or_else(|| {
        Error::InvalidPayload(format!("unexpected OBU type {}", (header >> 3) & 0x0F))
    })?;

    let rest = if header & OBU_EXTENSION_FLAG != 0 {
        rest.get(1..)
            .ok_or_else(|| Error::InvalidPayload("truncated OBU extension".into()))?
    } else {
        rest
    };

    let (size, consumed) = leb128_decode(rest)?;
    let payload = &rest[consumed..];
    if payload.len() as u64 != size {
        return Err(Error::InvalidPayload(format!(
            "OBU size {size} does not match {} remaining byte(s)",
            payload.len()
        )));
    }

    Ok((obu_type, payload))
}

/// `metadata_obu()` carrying `metadata_type` and its already byte-aligned
/// payload, closed with `trailing_bits()`.
pub fn encode_metadata_obu(metadata_type: u64, payload: &[u8]) -> Vec<u8> {
    let mut body = leb128_encode(metadata_type);
    let mut w = BitWriter::with_capacity(payload.len() + 1);
    for &byte in payload {
        w.write_bits(byte as u64, 8);
    }
    body.extend_from_slice(&w.trailing_bits());
    obu_wrap(ObuType::Metadata, &body)
}

/// Inverse of [`encode_metadata_obu`].
pub fn decode_metadata_obu(data: &[u8]) -> Result<(u64, &[u8])> {
    let (ObuType::Metadata, body) = obu_unwrap(data)?;

    let (metadata_type, consumed) = leb128_decode(body)?;
    match body[consumed..].split_last() {
        Some((&TRAILING_BITS, payload)) => Ok((metadata_type, payload)),
        _ => Err(Error::InvalidPayload(
            "metadata OBU does not end with trailing bits".into(),
        )),
    }
}

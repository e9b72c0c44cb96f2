//! ITU-T T.35 envelope around the metadata body, and its AV1 metadata OBU
//! framing.

use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::obu;

/// Output framing of a produced payload.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Provider codes and body, without `itu_t_t35_country_code`.
    Raw = 0,
    /// Country code, provider codes and body: the full `metadata_itut_t35()`.
    Complete = 1,
    /// A whole AV1 metadata OBU wrapping the [`PayloadMode::Complete`] bytes.
    Obu = 2,
}

impl TryFrom<u32> for PayloadMode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Complete),
            2 => Ok(Self::Obu),
            _ => Err(Error::UnsupportedMode(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapOptions {
    pub mode: PayloadMode,
    /// NAL-style start code emulation prevention, for byte-stream consumers.
    pub emulation_prevention: bool,
}

impl WrapOptions {
    pub fn new(mode: PayloadMode) -> Self {
        Self {
            mode,
            emulation_prevention: false,
        }
    }
}

impl From<PayloadMode> for WrapOptions {
    fn from(mode: PayloadMode) -> Self {
        Self::new(mode)
    }
}

/// Frames an encoded metadata body.
pub fn wrap(body: &[u8], config: &MetadataConfig, opts: WrapOptions) -> Result<Vec<u8>> {
    if opts.emulation_prevention && opts.mode == PayloadMode::Obu {
        return Err(Error::UnsupportedMode(PayloadMode::Obu as u32));
    }

    let mut out = Vec::with_capacity(body.len() + 8);
    match opts.mode {
        PayloadMode::Raw => write_provider_codes(&mut out, config),
        PayloadMode::Complete | PayloadMode::Obu => {
            out.push(config.itu_t_t35_country_code);
            write_provider_codes(&mut out, config);
        }
    }
    out.extend_from_slice(body);

    if opts.mode == PayloadMode::Obu {
        out = obu::encode_metadata_obu(obu::OBU_META_ITUT_T35, &out);
    }

    if opts.emulation_prevention {
        add_emulation_prevention(&mut out);
    }

    Ok(out)
}

fn write_provider_codes(out: &mut Vec<u8>, config: &MetadataConfig) {
    out.extend_from_slice(&config.itu_t_t35_terminal_provider_code.to_be_bytes());
    out.extend_from_slice(&config.itu_t_t35_terminal_provider_oriented_code.to_be_bytes());
}

/// Strips the framing added by [`wrap`] and returns the metadata body.
pub fn unwrap(data: &[u8], config: &MetadataConfig, opts: WrapOptions) -> Result<Vec<u8>> {
    if opts.emulation_prevention && opts.mode == PayloadMode::Obu {
        return Err(Error::UnsupportedMode(PayloadMode::Obu as u32));
    }

    let data = if opts.emulation_prevention {
        remove_emulation_prevention(data)
    } else {
        data.to_vec()
    };

    let t35 = match opts.mode {
        PayloadMode::Raw => &data[..],
        PayloadMode::Complete => strip_country_code(&data, config)?,
        PayloadMode::Obu => {
            let (metadata_type, payload) = obu::decode_metadata_obu(&data)?;
            if metadata_type != obu::OBU_META_ITUT_T35 {
                return Err(Error::InvalidPayload(format!(
                    "metadata_type {metadata_type} is not ITU-T T.35"
                )));
            }
            strip_country_code(payload, config)?
        }
    };

    let provider_code = read_u16(t35, 0)?;
    let oriented_code = read_u16(t35, 2)?;
    if provider_code != config.itu_t_t35_terminal_provider_code
        || oriented_code != config.itu_t_t35_terminal_provider_oriented_code
    {
        return Err(Error::InvalidPayload(format!(
            "terminal provider {provider_code:#06x}/{oriented_code:#06x} is not HDR10+"
        )));
    }

    Ok(t35[4..].to_vec())
}

fn strip_country_code<'a>(data: &'a [u8], config: &MetadataConfig) -> Result<&'a [u8]> {
    match data.split_first() {
        Some((&code, rest)) if code == config.itu_t_t35_country_code => Ok(rest),
        Some((&code, _)) => Err(Error::InvalidPayload(format!(
            "itu_t_t35_country_code {code:#04x}, expected {:#04x}",
            config.itu_t_t35_country_code
        ))),
        None => Err(Error::InvalidPayload("empty T.35 payload".into())),
    }
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::InvalidPayload("truncated T.35 header".into()))
}

/// Inserts `0x03` wherever two zero bytes are followed by a byte `<= 0x03`,
/// and after a trailing pair of zero bytes.
pub fn add_emulation_prevention(data: &mut Vec<u8>) {
    let mut out = Vec::with_capacity(data.len() + data.len() / 16);
    let mut zeros = 0;

    for &byte in data.iter() {
        if zeros >= 2 && byte <= 0x03 {
            out.push(0x03);
            zeros = 0;
        }
        out.push(byte);
        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }
    if zeros >= 2 {
        out.push(0x03);
    }

    *data = out;
}

pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;

    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        out.push(byte);
        zeros = if byte == 0 { zeros + 1 } else { 0 };
    }

    out
}

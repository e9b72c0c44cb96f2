use serde_json::Value;
use tracing::debug;

use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::json;
use crate::metadata::{Hdr10PlusMetadata, Profile};
use crate::payload;
use crate::t35::{self, PayloadMode, WrapOptions};

/// A fully validated HDR10+ JSON document, one metadata entry per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataDocument {
    frames: Vec<Hdr10PlusMetadata>,
    config: MetadataConfig,
}

impl MetadataDocument {
    pub fn from_value(value: &Value, config: &MetadataConfig) -> Result<Self> {
        Ok(Self {
            frames: json::frames_from_value(value, config)?,
            config: config.clone(),
        })
    }

    pub fn from_json_slice(data: &[u8], config: &MetadataConfig) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)?;
        Self::from_value(&value, config)
    }

    pub fn from_json_str(text: &str, config: &MetadataConfig) -> Result<Self> {
        Self::from_json_slice(text.as_bytes(), config)
    }

    /// Wraps already built frames, validating each one.
    pub fn from_frames(frames: Vec<Hdr10PlusMetadata>, config: &MetadataConfig) -> Result<Self> {
        if frames.is_empty() {
            return Err(Error::Structural("document contains no frames".into()));
        }
        for meta in &frames {
            meta.validate()?;
        }

        Ok(Self {
            frames,
            config: config.clone(),
        })
    }

    pub fn frames(&self) -> &[Hdr10PlusMetadata] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    pub fn profile(&self) -> Profile {
        json::document_profile(&self.frames)
    }

    pub fn frame(&self, index: usize) -> Result<&Hdr10PlusMetadata> {
        self.frames.get(index).ok_or(Error::IndexOutOfBounds {
            index,
            len: self.frames.len(),
        })
    }

    /// The raw metadata body of one frame.
    pub fn encode_frame(&self, index: usize) -> Result<Vec<u8>> {
        payload::encode(self.frame(index)?, &self.config)
    }

    /// Encodes and frames one frame. Every call returns a fresh buffer.
    pub fn produce_payload(&self, index: usize, opts: impl Into<WrapOptions>) -> Result<Vec<u8>> {
        let opts = opts.into();
        let body = self.encode_frame(index)?;
        let out = t35::wrap(&body, &self.config, opts)?;

        debug!(index, mode = ?opts.mode, len = out.len(), "produced HDR10+ payload");

        Ok(out)
    }

    /// Same as [`Self::produce_payload`] with the mode given as its numeric value.
    pub fn produce_payload_with_mode(&self, index: usize, mode: u32) -> Result<Vec<u8>> {
        self.produce_payload(index, PayloadMode::try_from(mode)?)
    }

    pub fn to_json(&self, tool_name: &str, tool_version: &str) -> Value {
        json::generate_json(&self.frames, tool_name, tool_version)
    }
}

/// Reads back a payload produced in `mode`.
pub fn decode_payload(
    data: &[u8],
    config: &MetadataConfig,
    opts: impl Into<WrapOptions>,
) -> Result<Hdr10PlusMetadata> {
    let body = t35::unwrap(data, config, opts.into())?;
    payload::decode(&body, config)
}

//! HDR10+ dynamic metadata (SMPTE ST 2094-40) from the LLC JSON convention
//! to ITU-T T.35 payloads and AV1 metadata OBUs.
//!
//! ```no_run
//! use hdr10plus::{MetadataConfig, MetadataDocument, PayloadMode};
//!
//! let text = std::fs::read_to_string("metadata.json")?;
//! let doc = MetadataDocument::from_json_str(&text, &MetadataConfig::default())?;
//! let t35 = doc.produce_payload(0, PayloadMode::Complete)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

pub mod bitreader;
pub mod bitwriter;
pub mod config;
pub mod document;
pub mod error;
pub mod json;
pub mod metadata;
pub mod obu;
pub mod payload;
pub mod t35;

pub use config::{DEFAULT_CONFIG, MetadataConfig};
pub use document::{MetadataDocument, decode_payload};
pub use error::{Error, Result};
pub use metadata::{
    BezierCurve, DistributionMaxRgb, Hdr10PlusMetadata, PeakBrightnessSource,
    PeakLuminanceTable, ProcessingWindow, Profile,
};
pub use t35::{PayloadMode, WrapOptions};

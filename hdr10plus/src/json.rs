//! Mapping between the HDR10+ LLC JSON convention and [`Hdr10PlusMetadata`].
//!
//! Errors name fields by their JSON path, e.g.
//! `SceneInfo[3].LuminanceParameters.MaxScl[1]`. Unknown keys are ignored and
//! `null` counts as absent.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::metadata::{
    BezierCurve, DistributionMaxRgb, Hdr10PlusMetadata, ProcessingWindow, Profile,
    check_non_decreasing, limits,
};

const UNSIGNED_INTEGER: &str = "unsigned integer";

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn uint(value: &Value, path: &str, min: u64, max: u64) -> Result<u64> {
    let Value::Number(n) = value else {
        return Err(Error::TypeMismatch {
            field: path.to_string(),
            expected: UNSIGNED_INTEGER,
            actual: type_name(value),
        });
    };

    let v = match (n.as_u64(), n.as_i64()) {
        (Some(u), _) => u as i128,
        (None, Some(i)) => i as i128,
        (None, None) => {
            return Err(Error::TypeMismatch {
                field: path.to_string(),
                expected: UNSIGNED_INTEGER,
                actual: "float",
            });
        }
    };

    if v < min as i128 || v > max as i128 {
        return Err(Error::out_of_range(path, v, min, max));
    }
    Ok(v as u64)
}

fn array<'a>(value: &'a Value, path: &str) -> Result<&'a [Value]> {
    value.as_array().map(Vec::as_slice).ok_or_else(|| Error::TypeMismatch {
        field: path.to_string(),
        expected: "array",
        actual: type_name(value),
    })
}

fn uint_list(value: &Value, path: &str, max: u64) -> Result<Vec<u64>> {
    array(value, path)?
        .iter()
        .enumerate()
        .map(|(i, v)| uint(v, &format!("{path}[{i}]"), 0, max))
        .collect()
}

/// A JSON object together with its path in the document.
struct Obj<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Obj<'a> {
    fn new(value: &'a Value, path: String) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            other => Err(Error::TypeMismatch {
                field: if path.is_empty() { "$".into() } else { path },
                expected: "object",
                actual: type_name(other),
            }),
        }
    }

    fn path(&self, key: &str) -> String {
        join(&self.path, key)
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn required(&self, key: &str) -> Result<&'a Value> {
        self.get(key)
            .ok_or_else(|| Error::MissingField(self.path(key)))
    }

    fn uint(&self, key: &str, min: u64, max: u64) -> Result<u64> {
        uint(self.required(key)?, &self.path(key), min, max)
    }

    fn uint_or(&self, key: &str, max: u64, default: u64) -> Result<u64> {
        match self.get(key) {
            Some(v) => uint(v, &self.path(key), 0, max),
            None => Ok(default),
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(Error::TypeMismatch {
                field: self.path(key),
                expected: "boolean",
                actual: type_name(other),
            }),
            None => Ok(default),
        }
    }

    fn object(&self, key: &str) -> Result<Obj<'a>> {
        Obj::new(self.required(key)?, self.path(key))
    }

    fn optional_object(&self, key: &str) -> Result<Option<Obj<'a>>> {
        self.get(key)
            .map(|v| Obj::new(v, self.path(key)))
            .transpose()
    }
}

/// Maps a whole document: an LLC object with `SceneInfo`, a bare array of
/// frames, or a single frame object.
pub fn frames_from_value(root: &Value, config: &MetadataConfig) -> Result<Vec<Hdr10PlusMetadata>> {
    let frames: Vec<(&Value, String)> = match root {
        Value::Object(map) if map.get("SceneInfo").is_some_and(|v| !v.is_null()) => {
            array(&map["SceneInfo"], "SceneInfo")?
                .iter()
                .enumerate()
                .map(|(i, v)| (v, format!("SceneInfo[{i}]")))
                .collect()
        }
        Value::Object(_) => vec![(root, String::new())],
        Value::Array(list) => list
            .iter()
            .enumerate()
            .map(|(i, v)| (v, format!("[{i}]")))
            .collect(),
        other => {
            return Err(Error::TypeMismatch {
                field: "$".into(),
                expected: "object or array",
                actual: type_name(other),
            });
        }
    };

    if frames.is_empty() {
        return Err(Error::Structural("document contains no frames".into()));
    }

    let metadata = frames
        .into_iter()
        .map(|(value, path)| frame_from_value(value, path, config))
        .collect::<Result<Vec<_>>>()?;

    debug!(frames = metadata.len(), "mapped HDR10+ JSON document");

    Ok(metadata)
}

/// Maps one frame object, checking fields in bitstream order.
pub fn frame_from_value(
    value: &Value,
    path: String,
    config: &MetadataConfig,
) -> Result<Hdr10PlusMetadata> {
    let frame = Obj::new(value, path)?;

    let application_version = frame.uint_or(
        "ApplicationVersion",
        limits::MAX_APPLICATION_VERSION as u64,
        config.default_application_version as u64,
    )? as u8;

    let num_windows = frame.uint(
        "NumberOfWindows",
        limits::MIN_WINDOWS as u64,
        limits::MAX_WINDOWS as u64,
    )? as u8;
    if application_version == 1 && num_windows != 1 {
        return Err(Error::Structural(format!(
            "{}: application version 1 allows a single window, got {num_windows}",
            frame.path("NumberOfWindows")
        )));
    }

    let processing_windows = processing_windows(&frame, num_windows)?;

    let targeted_system_display_maximum_luminance = frame.uint_or(
        "TargetedSystemDisplayMaximumLuminance",
        limits::MAX_TARGETED_SYSTEM_DISPLAY_LUMINANCE as u64,
        config.default_targeted_system_display_maximum_luminance as u64,
    )? as u32;

    let lp = frame.object("LuminanceParameters")?;
    let max_scl = uint_list(
        lp.required("MaxScl")?,
        &lp.path("MaxScl"),
        limits::MAX_LUMINANCE_VALUE as u64,
    )?;
    let maxscl: [u32; 3] = match max_scl.as_slice() {
        &[r, g, b] => [r as u32, g as u32, b as u32],
        other => {
            return Err(Error::Structural(format!(
                "{} must contain exactly 3 elements, got {}",
                lp.path("MaxScl"),
                other.len()
            )));
        }
    };
    let average_maxrgb = lp.uint("AverageRGB", 0, limits::MAX_LUMINANCE_VALUE as u64)? as u32;
    let distribution_maxrgb = luminance_distributions(&lp.object("LuminanceDistributions")?)?;

    let fraction_bright_pixels = frame.uint_or(
        "FractionBrightPixels",
        limits::MAX_FRACTION_BRIGHT_PIXELS as u64,
        0,
    )? as u16;

    let bezier_curve = frame
        .optional_object("BezierCurveData")?
        .map(|bc| bezier_curve(&bc))
        .transpose()?;

    let meta = Hdr10PlusMetadata {
        application_version,
        num_windows,
        processing_windows,
        targeted_system_display_maximum_luminance,
        actual_targeted_system_display: None,
        maxscl,
        average_maxrgb,
        distribution_maxrgb,
        fraction_bright_pixels,
        actual_mastering_display: None,
        tone_mapping_flag: bezier_curve.is_some(),
        bezier_curve,
        color_saturation_weight: None,
    };

    meta.validate().map_err(|e| match e {
        Error::Structural(msg) if !frame.path.is_empty() => {
            Error::Structural(format!("{}: {msg}", frame.path))
        }
        e => e,
    })?;

    Ok(meta)
}

fn processing_windows(frame: &Obj, num_windows: u8) -> Result<Vec<ProcessingWindow>> {
    let key = "ProcessingWindows";
    let expected = num_windows as usize - 1;

    let list = match frame.get(key) {
        Some(v) => array(v, &frame.path(key))?,
        None if expected == 0 => return Ok(Vec::new()),
        None => {
            return Err(Error::Structural(format!(
                "{} window(s) need {key} with {expected} entries",
                num_windows
            )));
        }
    };
    if list.len() != expected {
        return Err(Error::Structural(format!(
            "{} has {} entries, NumberOfWindows {num_windows} needs {expected}",
            frame.path(key),
            list.len()
        )));
    }

    list.iter()
        .enumerate()
        .map(|(i, v)| {
            let pw = Obj::new(v, format!("{}[{i}]", frame.path(key)))?;
            let coord = |k: &str| pw.uint(k, 0, u16::MAX as u64).map(|v| v as u16);
            Ok(ProcessingWindow {
                window_upper_left_corner_x: coord("WindowUpperLeftCornerX")?,
                window_upper_left_corner_y: coord("WindowUpperLeftCornerY")?,
                window_lower_right_corner_x: coord("WindowLowerRightCornerX")?,
                window_lower_right_corner_y: coord("WindowLowerRightCornerY")?,
                center_of_ellipse_x: coord("CenterOfEllipseX")?,
                center_of_ellipse_y: coord("CenterOfEllipseY")?,
                rotation_angle: pw.uint("RotationAngle", 0, limits::MAX_ROTATION_ANGLE as u64)?
                    as u8,
                semimajor_axis_internal_ellipse: coord("SemimajorAxisInternalEllipse")?,
                semimajor_axis_external_ellipse: coord("SemimajorAxisExternalEllipse")?,
                semiminor_axis_external_ellipse: coord("SemiminorAxisExternalEllipse")?,
                overlap_process_option: pw.bool_or("OverlapProcessOption", false)?,
            })
        })
        .collect()
}

fn luminance_distributions(dists: &Obj) -> Result<Vec<DistributionMaxRgb>> {
    let indexes = uint_list(
        dists.required("DistributionIndex")?,
        &dists.path("DistributionIndex"),
        limits::MAX_PERCENTAGE as u64,
    )?;
    let values = uint_list(
        dists.required("DistributionValues")?,
        &dists.path("DistributionValues"),
        limits::MAX_LUMINANCE_VALUE as u64,
    )?;

    if indexes.len() != values.len() {
        return Err(Error::Structural(format!(
            "{}: DistributionIndex has {} entries but DistributionValues has {}",
            dists.path,
            indexes.len(),
            values.len()
        )));
    }

    let list: Vec<DistributionMaxRgb> = indexes
        .iter()
        .zip(&values)
        .map(|(&percentage, &percentile)| DistributionMaxRgb {
            percentage: percentage as u8,
            percentile: percentile as u32,
        })
        .collect();

    match DistributionMaxRgb::expected_indexes(list.len()) {
        Some(expected) if DistributionMaxRgb::distribution_index(&list) == expected => Ok(list),
        Some(expected) => Err(Error::Structural(format!(
            "{} must be {expected:?}",
            dists.path("DistributionIndex")
        ))),
        None => Err(Error::Structural(format!(
            "{} must have 9 or 10 entries, got {}",
            dists.path("DistributionIndex"),
            list.len()
        ))),
    }
}

fn bezier_curve(bc: &Obj) -> Result<BezierCurve> {
    let knee_point_x = bc.uint("KneePointX", 0, limits::MAX_KNEE_POINT as u64)? as u16;
    let knee_point_y = bc.uint("KneePointY", 0, limits::MAX_KNEE_POINT as u64)? as u16;

    let path = bc.path("Anchors");
    let raw = array(bc.required("Anchors")?, &path)?;
    if raw.len() > limits::MAX_BEZIER_ANCHORS {
        return Err(Error::out_of_range(
            path,
            raw.len() as u64,
            0u64,
            limits::MAX_BEZIER_ANCHORS as u64,
        ));
    }
    let anchors = raw
        .iter()
        .enumerate()
        .map(|(i, v)| {
            uint(v, &format!("{path}[{i}]"), 0, limits::MAX_BEZIER_ANCHOR as u64).map(|v| v as u16)
        })
        .collect::<Result<Vec<u16>>>()?;
    check_non_decreasing(&anchors, &path)?;

    Ok(BezierCurve {
        knee_point_x,
        knee_point_y,
        anchors,
    })
}

/// Profile shared by every frame, or [`Profile::Unknown`].
pub fn document_profile(frames: &[Hdr10PlusMetadata]) -> Profile {
    let mut profiles = frames.iter().map(Hdr10PlusMetadata::profile);
    match profiles.next() {
        Some(first) if profiles.all(|p| p == first) => first,
        _ => Profile::Unknown,
    }
}

/// The frame object for `meta`, without scene indexes.
///
/// Peak luminance tables and color saturation have no JSON representation
/// and are left out.
pub fn frame_to_value(meta: &Hdr10PlusMetadata) -> Value {
    let dists = &meta.distribution_maxrgb;
    let mut frame = json!({
        "LuminanceParameters": {
            "AverageRGB": meta.average_maxrgb,
            "LuminanceDistributions": {
                "DistributionIndex": DistributionMaxRgb::distribution_index(dists),
                "DistributionValues": DistributionMaxRgb::distribution_values(dists),
            },
            "MaxScl": meta.maxscl,
        },
        "NumberOfWindows": meta.num_windows,
        "TargetedSystemDisplayMaximumLuminance": meta.targeted_system_display_maximum_luminance,
    });

    let Some(map) = frame.as_object_mut() else {
        return frame;
    };

    if let Some(bc) = &meta.bezier_curve {
        map.insert(
            "BezierCurveData".into(),
            json!({
                "Anchors": bc.anchors,
                "KneePointX": bc.knee_point_x,
                "KneePointY": bc.knee_point_y,
            }),
        );
    }
    if meta.application_version != 1 {
        map.insert("ApplicationVersion".into(), json!(meta.application_version));
    }
    if meta.fraction_bright_pixels != 0 {
        map.insert("FractionBrightPixels".into(), json!(meta.fraction_bright_pixels));
    }
    if !meta.processing_windows.is_empty() {
        let windows: Vec<Value> = meta
            .processing_windows
            .iter()
            .map(|pw| {
                json!({
                    "WindowUpperLeftCornerX": pw.window_upper_left_corner_x,
                    "WindowUpperLeftCornerY": pw.window_upper_left_corner_y,
                    "WindowLowerRightCornerX": pw.window_lower_right_corner_x,
                    "WindowLowerRightCornerY": pw.window_lower_right_corner_y,
                    "CenterOfEllipseX": pw.center_of_ellipse_x,
                    "CenterOfEllipseY": pw.center_of_ellipse_y,
                    "RotationAngle": pw.rotation_angle,
                    "SemimajorAxisInternalEllipse": pw.semimajor_axis_internal_ellipse,
                    "SemimajorAxisExternalEllipse": pw.semimajor_axis_external_ellipse,
                    "SemiminorAxisExternalEllipse": pw.semiminor_axis_external_ellipse,
                    "OverlapProcessOption": pw.overlap_process_option,
                })
            })
            .collect();
        map.insert("ProcessingWindows".into(), Value::Array(windows));
    }

    frame
}

/// Builds a full LLC document with scene information.
///
/// A new scene starts whenever a frame's metadata differs from the previous
/// frame's.
pub fn generate_json(frames: &[Hdr10PlusMetadata], tool_name: &str, tool_version: &str) -> Value {
    let profile = document_profile(frames);
    let version = frames.first().map_or(1, |m| m.application_version);

    let mut scene_info = Vec::with_capacity(frames.len());
    let mut first_frames: Vec<usize> = Vec::new();
    let mut scene_id = 0usize;
    let mut scene_frame_index = 0usize;
    let mut previous: Option<Value> = None;

    for (sequence_frame_index, meta) in frames.iter().enumerate() {
        let mut frame = frame_to_value(meta);

        match &previous {
            Some(prev) if *prev != frame => {
                scene_id += 1;
                scene_frame_index = 0;
                first_frames.push(sequence_frame_index);
            }
            Some(_) => {}
            None => first_frames.push(sequence_frame_index),
        }
        previous = Some(frame.clone());

        if let Some(map) = frame.as_object_mut() {
            map.insert("SceneFrameIndex".into(), json!(scene_frame_index));
            map.insert("SceneId".into(), json!(scene_id));
            map.insert("SequenceFrameIndex".into(), json!(sequence_frame_index));
        }
        scene_info.push(frame);
        scene_frame_index += 1;
    }

    let scene_lengths: Vec<usize> = first_frames
        .iter()
        .enumerate()
        .map(|(i, &start)| first_frames.get(i + 1).copied().unwrap_or(frames.len()) - start)
        .collect();

    json!({
        "JSONInfo": {
            "HDR10plusProfile": profile.to_string(),
            "Version": format!("{version}.0"),
        },
        "SceneInfo": scene_info,
        "SceneInfoSummary": {
            "SceneFirstFrameIndex": first_frames,
            "SceneFrameNumbers": scene_lengths,
        },
        "ToolInfo": {
            "Tool": tool_name,
            "Version": tool_version,
        },
    })
}

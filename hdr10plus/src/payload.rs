//! ST 2094-40 `user_data_registered_itu_t_t35` body, starting at
//! `application_identifier`.
//!
//! Bits are packed MSB first. The last byte is padded with zero bits.

use tracing::{debug, warn};

use crate::bitreader::BitReader;
use crate::bitwriter::BitWriter;
use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::metadata::{
    BezierCurve, DistributionMaxRgb, Hdr10PlusMetadata, PeakLuminanceTable, ProcessingWindow,
};

const APPLICATION_IDENTIFIER_BITS: u8 = 8;
const APPLICATION_VERSION_BITS: u8 = 8;
const NUM_WINDOWS_BITS: u8 = 2;
const WINDOW_COORD_BITS: u8 = 16;
const ROTATION_ANGLE_BITS: u8 = 8;
const TARGETED_LUMINANCE_BITS: u8 = 27;
const PEAK_TABLE_DIM_BITS: u8 = 5;
const PEAK_TABLE_ENTRY_BITS: u8 = 4;
const MAXSCL_BITS: u8 = 17;
const AVERAGE_MAXRGB_BITS: u8 = 17;
const NUM_PERCENTILES_BITS: u8 = 4;
const PERCENTAGE_BITS: u8 = 7;
const PERCENTILE_BITS: u8 = 17;
const FRACTION_BRIGHT_PIXELS_BITS: u8 = 10;
const KNEE_POINT_BITS: u8 = 12;
const NUM_ANCHORS_BITS: u8 = 4;
const ANCHOR_BITS: u8 = 10;
const COLOR_SATURATION_WEIGHT_BITS: u8 = 6;

fn put(w: &mut BitWriter, field: &str, value: u64, bits: u8) -> Result<()> {
    let max = (1u64 << bits) - 1;
    if value > max {
        return Err(Error::out_of_range(field, value, 0u64, max));
    }
    w.write_bits(value, bits);
    Ok(())
}

/// Validates `meta` and packs it into the metadata body.
pub fn encode(meta: &Hdr10PlusMetadata, config: &MetadataConfig) -> Result<Vec<u8>> {
    meta.validate()?;

    let mut w = BitWriter::with_capacity(64);

    put(
        &mut w,
        "application_identifier",
        config.application_identifier as u64,
        APPLICATION_IDENTIFIER_BITS,
    )?;
    put(
        &mut w,
        "application_version",
        meta.application_version as u64,
        APPLICATION_VERSION_BITS,
    )?;
    put(&mut w, "num_windows", meta.num_windows as u64, NUM_WINDOWS_BITS)?;

    if meta.processing_windows.len() + 1 != meta.num_windows as usize {
        return Err(Error::Structural(format!(
            "num_windows {} does not match {} processing window(s)",
            meta.num_windows,
            meta.processing_windows.len()
        )));
    }
    for pw in &meta.processing_windows {
        encode_processing_window(&mut w, pw)?;
    }

    put(
        &mut w,
        "targeted_system_display_maximum_luminance",
        meta.targeted_system_display_maximum_luminance as u64,
        TARGETED_LUMINANCE_BITS,
    )?;
    encode_peak_table(
        &mut w,
        "targeted_system_display_actual_peak_luminance",
        meta.actual_targeted_system_display.as_ref(),
    )?;

    for _ in 0..meta.num_windows {
        for (i, &v) in meta.maxscl.iter().enumerate() {
            put(&mut w, &format!("maxscl[{i}]"), v as u64, MAXSCL_BITS)?;
        }
        put(
            &mut w,
            "average_maxrgb",
            meta.average_maxrgb as u64,
            AVERAGE_MAXRGB_BITS,
        )?;

        put(
            &mut w,
            "num_distribution_maxrgb_percentiles",
            meta.distribution_maxrgb.len() as u64,
            NUM_PERCENTILES_BITS,
        )?;
        for d in &meta.distribution_maxrgb {
            put(&mut w, "percentage", d.percentage as u64, PERCENTAGE_BITS)?;
            put(&mut w, "percentile", d.percentile as u64, PERCENTILE_BITS)?;
        }

        put(
            &mut w,
            "fraction_bright_pixels",
            meta.fraction_bright_pixels as u64,
            FRACTION_BRIGHT_PIXELS_BITS,
        )?;
    }

    encode_peak_table(
        &mut w,
        "mastering_display_actual_peak_luminance",
        meta.actual_mastering_display.as_ref(),
    )?;

    for _ in 0..meta.num_windows {
        w.write_bit(meta.tone_mapping_flag);
        if meta.tone_mapping_flag {
            let Some(bc) = &meta.bezier_curve else {
                return Err(Error::Structural(
                    "tone_mapping_flag set without Bezier curve data".into(),
                ));
            };
            encode_bezier_curve(&mut w, bc)?;
        }
    }

    w.write_bit(meta.color_saturation_weight.is_some());
    if let Some(weight) = meta.color_saturation_weight {
        put(
            &mut w,
            "color_saturation_weight",
            weight as u64,
            COLOR_SATURATION_WEIGHT_BITS,
        )?;
    }

    let bits = w.bit_len();
    if bits > config.max_payload_bits() {
        return Err(Error::EncodeOverflow {
            bits,
            max_bits: config.max_payload_bits(),
        });
    }

    debug!(bits, "encoded HDR10+ metadata body");

    Ok(w.finalize())
}

fn encode_processing_window(w: &mut BitWriter, pw: &ProcessingWindow) -> Result<()> {
    for (field, v) in [
        ("window_upper_left_corner_x", pw.window_upper_left_corner_x),
        ("window_upper_left_corner_y", pw.window_upper_left_corner_y),
        ("window_lower_right_corner_x", pw.window_lower_right_corner_x),
        ("window_lower_right_corner_y", pw.window_lower_right_corner_y),
        ("center_of_ellipse_x", pw.center_of_ellipse_x),
        ("center_of_ellipse_y", pw.center_of_ellipse_y),
    ] {
        put(w, field, v as u64, WINDOW_COORD_BITS)?;
    }
    put(w, "rotation_angle", pw.rotation_angle as u64, ROTATION_ANGLE_BITS)?;
    for (field, v) in [
        ("semimajor_axis_internal_ellipse", pw.semimajor_axis_internal_ellipse),
        ("semimajor_axis_external_ellipse", pw.semimajor_axis_external_ellipse),
        ("semiminor_axis_external_ellipse", pw.semiminor_axis_external_ellipse),
    ] {
        put(w, field, v as u64, WINDOW_COORD_BITS)?;
    }
    w.write_bit(pw.overlap_process_option);
    Ok(())
}

fn encode_peak_table(
    w: &mut BitWriter,
    field: &str,
    table: Option<&PeakLuminanceTable>,
) -> Result<()> {
    w.write_bit(table.is_some());
    let Some(table) = table else {
        return Ok(());
    };

    let cols = table.num_cols();
    put(w, field, table.num_rows() as u64, PEAK_TABLE_DIM_BITS)?;
    put(w, field, cols as u64, PEAK_TABLE_DIM_BITS)?;
    for row in &table.rows {
        if row.len() != cols {
            return Err(Error::Structural(format!("{field}: ragged rows")));
        }
        for &v in row {
            put(w, field, v as u64, PEAK_TABLE_ENTRY_BITS)?;
        }
    }
    Ok(())
}

fn encode_bezier_curve(w: &mut BitWriter, bc: &BezierCurve) -> Result<()> {
    put(w, "knee_point_x", bc.knee_point_x as u64, KNEE_POINT_BITS)?;
    put(w, "knee_point_y", bc.knee_point_y as u64, KNEE_POINT_BITS)?;
    put(
        w,
        "num_bezier_curve_anchors",
        bc.anchors.len() as u64,
        NUM_ANCHORS_BITS,
    )?;
    for &a in &bc.anchors {
        put(w, "bezier_curve_anchors", a as u64, ANCHOR_BITS)?;
    }
    Ok(())
}

/// Unpacks a metadata body produced by [`encode`] or found in a stream.
///
/// The model carries one set of per-window statistics: when windows disagree,
/// the first window wins. The result is not validated.
pub fn decode(data: &[u8], config: &MetadataConfig) -> Result<Hdr10PlusMetadata> {
    let mut r = BitReader::new(data);

    let application_identifier = r.read_bits(APPLICATION_IDENTIFIER_BITS)? as u8;
    if application_identifier != config.application_identifier {
        return Err(Error::InvalidPayload(format!(
            "application_identifier {application_identifier}, expected {}",
            config.application_identifier
        )));
    }

    let application_version = r.read_bits(APPLICATION_VERSION_BITS)? as u8;
    let num_windows = r.read_bits(NUM_WINDOWS_BITS)? as u8;
    if num_windows == 0 {
        return Err(Error::InvalidPayload("num_windows is zero".into()));
    }

    let mut processing_windows = Vec::with_capacity(num_windows as usize - 1);
    for _ in 1..num_windows {
        processing_windows.push(decode_processing_window(&mut r)?);
    }

    let targeted_system_display_maximum_luminance = r.read_bits(TARGETED_LUMINANCE_BITS)? as u32;
    let actual_targeted_system_display = decode_peak_table(&mut r)?;

    let mut stats = Vec::with_capacity(num_windows as usize);
    for _ in 0..num_windows {
        let mut maxscl = [0u32; 3];
        for v in &mut maxscl {
            *v = r.read_bits(MAXSCL_BITS)? as u32;
        }
        let average_maxrgb = r.read_bits(AVERAGE_MAXRGB_BITS)? as u32;

        let count = r.read_bits(NUM_PERCENTILES_BITS)? as usize;
        let mut distribution = Vec::with_capacity(count);
        for _ in 0..count {
            distribution.push(DistributionMaxRgb {
                percentage: r.read_bits(PERCENTAGE_BITS)? as u8,
                percentile: r.read_bits(PERCENTILE_BITS)? as u32,
            });
        }

        let fraction_bright_pixels = r.read_bits(FRACTION_BRIGHT_PIXELS_BITS)? as u16;
        stats.push((maxscl, average_maxrgb, distribution, fraction_bright_pixels));
    }

    let actual_mastering_display = decode_peak_table(&mut r)?;

    let mut curves = Vec::with_capacity(num_windows as usize);
    for _ in 0..num_windows {
        let tone_mapping_flag = r.read_bit()?;
        let curve = if tone_mapping_flag {
            Some(decode_bezier_curve(&mut r)?)
        } else {
            None
        };
        curves.push((tone_mapping_flag, curve));
    }

    let color_saturation_weight = if r.read_bit()? {
        Some(r.read_bits(COLOR_SATURATION_WEIGHT_BITS)? as u8)
    } else {
        None
    };

    if r.remaining_bits() >= 8 {
        return Err(Error::InvalidPayload(format!(
            "{} unexpected trailing byte(s)",
            r.remaining_bits() / 8
        )));
    }

    if stats.windows(2).any(|w| w[0] != w[1]) || curves.windows(2).any(|w| w[0] != w[1]) {
        warn!(num_windows, "per-window statistics differ, keeping the first window");
    }

    let (maxscl, average_maxrgb, distribution_maxrgb, fraction_bright_pixels) =
        stats.swap_remove(0);
    let (tone_mapping_flag, bezier_curve) = curves.swap_remove(0);

    Ok(Hdr10PlusMetadata {
        application_version,
        num_windows,
        processing_windows,
        targeted_system_display_maximum_luminance,
        actual_targeted_system_display,
        maxscl,
        average_maxrgb,
        distribution_maxrgb,
        fraction_bright_pixels,
        actual_mastering_display,
        tone_mapping_flag,
        bezier_curve,
        color_saturation_weight,
    })
}

fn decode_processing_window(r: &mut BitReader) -> Result<ProcessingWindow> {
    Ok(ProcessingWindow {
        window_upper_left_corner_x: r.read_bits(WINDOW_COORD_BITS)? as u16,
        window_upper_left_corner_y: r.read_bits(WINDOW_COORD_BITS)? as u16,
        window_lower_right_corner_x: r.read_bits(WINDOW_COORD_BITS)? as u16,
        window_lower_right_corner_y: r.read_bits(WINDOW_COORD_BITS)? as u16,
        center_of_ellipse_x: r.read_bits(WINDOW_COORD_BITS)? as u16,
        center_of_ellipse_y: r.read_bits(WINDOW_COORD_BITS)? as u16,
        rotation_angle: r.read_bits(ROTATION_ANGLE_BITS)? as u8,
        semimajor_axis_internal_ellipse: r.read_bits(WINDOW_COORD_BITS)? as u16,
        semimajor_axis_external_ellipse: r.read_bits(WINDOW_COORD_BITS)? as u16,
        semiminor_axis_external_ellipse: r.read_bits(WINDOW_COORD_BITS)? as u16,
        overlap_process_option: r.read_bit()?,
    })
}

fn decode_peak_table(r: &mut BitReader) -> Result<Option<PeakLuminanceTable>> {
    if !r.read_bit()? {
        return Ok(None);
    }

    let num_rows = r.read_bits(PEAK_TABLE_DIM_BITS)? as usize;
    let num_cols = r.read_bits(PEAK_TABLE_DIM_BITS)? as usize;
    let mut rows = Vec::with_capacity(num_rows);
    for _ in 0..num_rows {
        let mut row = Vec::with_capacity(num_cols);
        for _ in 0..num_cols {
            row.push(r.read_bits(PEAK_TABLE_ENTRY_BITS)? as u8);
        }
        rows.push(row);
    }

    Ok(Some(PeakLuminanceTable { rows }))
}

fn decode_bezier_curve(r: &mut BitReader) -> Result<BezierCurve> {
    let knee_point_x = r.read_bits(KNEE_POINT_BITS)? as u16;
    let knee_point_y = r.read_bits(KNEE_POINT_BITS)? as u16;
    let count = r.read_bits(NUM_ANCHORS_BITS)? as usize;
    let mut anchors = Vec::with_capacity(count);
    for _ in 0..count {
        anchors.push(r.read_bits(ANCHOR_BITS)? as u16);
    }

    Ok(BezierCurve {
        knee_point_x,
        knee_point_y,
        anchors,
    })
}

//! Round trip and determinism over generated metadata.

use hdr10plus::metadata::{DISTRIBUTION_INDEXES_9, DISTRIBUTION_INDEXES_10, limits};
use hdr10plus::{
    BezierCurve, DistributionMaxRgb, Hdr10PlusMetadata, MetadataConfig, MetadataDocument,
    PayloadMode, PeakLuminanceTable, ProcessingWindow, WrapOptions, decode_payload, payload,
};
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

const MODES: [PayloadMode; 3] = [PayloadMode::Raw, PayloadMode::Complete, PayloadMode::Obu];

fn processing_window() -> impl Strategy<Value = ProcessingWindow> {
    (
        (any::<u16>(), any::<u16>(), any::<u16>(), any::<u16>()),
        (any::<u16>(), any::<u16>(), 0..=limits::MAX_ROTATION_ANGLE),
        (any::<u16>(), any::<u16>(), any::<u16>(), any::<bool>()),
    )
        .prop_map(|((x0, y0, x1, y1), (cx, cy, rotation_angle), (a, b, c, overlap))| {
            ProcessingWindow {
                window_upper_left_corner_x: x0.min(x1),
                window_upper_left_corner_y: y0.min(y1),
                window_lower_right_corner_x: x0.max(x1),
                window_lower_right_corner_y: y0.max(y1),
                center_of_ellipse_x: cx,
                center_of_ellipse_y: cy,
                rotation_angle,
                semimajor_axis_internal_ellipse: a,
                semimajor_axis_external_ellipse: b,
                semiminor_axis_external_ellipse: c,
                overlap_process_option: overlap,
            }
        })
}

fn peak_table() -> impl Strategy<Value = PeakLuminanceTable> {
    let dim = limits::MIN_PEAK_LUMINANCE_DIM as usize..=limits::MAX_PEAK_LUMINANCE_DIM as usize;
    (dim.clone(), dim).prop_flat_map(|(rows, cols)| {
        vec(vec(0..=limits::MAX_PEAK_LUMINANCE_ENTRY, cols), rows)
            .prop_map(|rows| PeakLuminanceTable { rows })
    })
}

fn distribution() -> impl Strategy<Value = Vec<DistributionMaxRgb>> {
    prop_oneof![
        Just(&DISTRIBUTION_INDEXES_9[..]),
        Just(&DISTRIBUTION_INDEXES_10[..]),
    ]
    .prop_flat_map(|indexes| {
        vec(0..=limits::MAX_LUMINANCE_VALUE, indexes.len()).prop_map(move |values| {
            indexes
                .iter()
                .zip(values)
                .map(|(&percentage, percentile)| DistributionMaxRgb {
                    percentage,
                    percentile,
                })
                .collect()
        })
    })
}

/// Target luminance and curve of a profile B frame.
fn tone_mapping() -> impl Strategy<Value = (u32, BezierCurve)> {
    (
        1..=limits::MAX_TARGETED_SYSTEM_DISPLAY_LUMINANCE,
        0..=limits::MAX_KNEE_POINT,
        0..=limits::MAX_KNEE_POINT,
        vec(0..=limits::MAX_BEZIER_ANCHOR, 0..=limits::MAX_BEZIER_ANCHORS),
    )
        .prop_map(|(target, knee_point_x, knee_point_y, mut anchors)| {
            anchors.sort_unstable();
            (
                target,
                BezierCurve {
                    knee_point_x,
                    knee_point_y,
                    anchors,
                },
            )
        })
}

/// Any structurally valid frame. Version 1 frames are single window without
/// peak tables or color saturation.
fn metadata() -> impl Strategy<Value = Hdr10PlusMetadata> {
    (0..=limits::MAX_APPLICATION_VERSION).prop_flat_map(|application_version| {
        let version_0 = application_version == 0;
        let extra_windows = if version_0 { 0..=2usize } else { 0..=0usize };
        let extras = if version_0 { 0.5 } else { 0.0 };

        (
            (
                Just(application_version),
                vec(processing_window(), extra_windows),
                option::weighted(extras, peak_table()),
                option::weighted(extras, peak_table()),
                option::weighted(extras, 0..=limits::MAX_COLOR_SATURATION_WEIGHT),
            ),
            (
                proptest::array::uniform3(0..=limits::MAX_LUMINANCE_VALUE),
                0..=limits::MAX_LUMINANCE_VALUE,
                distribution(),
                0..=limits::MAX_FRACTION_BRIGHT_PIXELS,
                option::of(tone_mapping()),
            ),
        )
            .prop_map(
                |(
                    (application_version, windows, targeted, mastering, saturation),
                    (maxscl, average_maxrgb, distribution_maxrgb, fraction, tone_mapping),
                )| {
                    let (target, bezier_curve) = match tone_mapping {
                        Some((target, curve)) => (target, Some(curve)),
                        None => (0, None),
                    };
                    Hdr10PlusMetadata {
                        application_version,
                        num_windows: windows.len() as u8 + 1,
                        processing_windows: windows,
                        targeted_system_display_maximum_luminance: target,
                        actual_targeted_system_display: targeted,
                        maxscl,
                        average_maxrgb,
                        distribution_maxrgb,
                        fraction_bright_pixels: fraction,
                        actual_mastering_display: mastering,
                        tone_mapping_flag: bezier_curve.is_some(),
                        bezier_curve,
                        color_saturation_weight: saturation,
                    }
                },
            )
    })
}

proptest! {
    #[test]
    fn generated_metadata_is_valid(meta in metadata()) {
        prop_assert!(meta.validate().is_ok(), "{:?}", meta.validate());
    }

    #[test]
    fn body_roundtrip(meta in metadata()) {
        let config = MetadataConfig::default();
        let body = payload::encode(&meta, &config).unwrap();
        prop_assert_eq!(payload::decode(&body, &config).unwrap(), meta);
    }

    #[test]
    fn roundtrip_and_determinism_for_every_mode(meta in metadata()) {
        let config = MetadataConfig::default();
        let doc = MetadataDocument::from_frames(vec![meta.clone()], &config).unwrap();

        for mode in MODES {
            let first = doc.produce_payload(0, mode).unwrap();
            let second = doc.produce_payload(0, mode).unwrap();
            prop_assert_eq!(&first, &second);

            let decoded = decode_payload(&first, &config, mode).unwrap();
            prop_assert_eq!(&decoded, &meta);
        }
    }

    #[test]
    fn emulation_prevention_roundtrip(meta in metadata()) {
        let config = MetadataConfig::default();
        let doc = MetadataDocument::from_frames(vec![meta.clone()], &config).unwrap();

        for mode in [PayloadMode::Raw, PayloadMode::Complete] {
            let opts = WrapOptions {
                mode,
                emulation_prevention: true,
            };
            let out = doc.produce_payload(0, opts).unwrap();
            prop_assert!(!out.windows(3).any(|w| w[0] == 0 && w[1] == 0 && w[2] <= 0x02));
            prop_assert_eq!(decode_payload(&out, &config, opts).unwrap(), meta.clone());
        }
    }
}

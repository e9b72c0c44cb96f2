use std::fmt;

use crate::error::{Error, Result};

pub const DISTRIBUTION_INDEXES_9: [u8; 9] = [1, 5, 10, 25, 50, 75, 90, 95, 99];
pub const DISTRIBUTION_INDEXES_10: [u8; 10] = [1, 5, 10, 25, 50, 75, 90, 95, 98, 99];

/// Numeric bounds from SMPTE ST 2094-40, inclusive.
pub mod limits {
    pub const MAX_APPLICATION_VERSION: u8 = 1;
    pub const MIN_WINDOWS: u8 = 1;
    pub const MAX_WINDOWS: u8 = 3;
    pub const MAX_TARGETED_SYSTEM_DISPLAY_LUMINANCE: u32 = 10_000;
    /// MaxSCL, average MaxRGB and percentile values, in 0.1 cd/m².
    pub const MAX_LUMINANCE_VALUE: u32 = 100_000;
    pub const MAX_PERCENTAGE: u8 = 100;
    pub const MAX_FRACTION_BRIGHT_PIXELS: u16 = 1023;
    pub const MAX_KNEE_POINT: u16 = 4095;
    pub const MAX_BEZIER_ANCHORS: usize = 9;
    pub const MAX_BEZIER_ANCHOR: u16 = 1023;
    pub const MAX_ROTATION_ANGLE: u8 = 179;
    pub const MIN_PEAK_LUMINANCE_DIM: u8 = 2;
    pub const MAX_PEAK_LUMINANCE_DIM: u8 = 25;
    pub const MAX_PEAK_LUMINANCE_ENTRY: u8 = 15;
    pub const MAX_COLOR_SATURATION_WEIGHT: u8 = 63;
}

/// One frame of HDR10+ dynamic metadata (ST 2094-40 application 4).
///
/// The T.35 envelope identifiers and `application_identifier` are not part of
/// the model, they come from [`crate::MetadataConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hdr10PlusMetadata {
    pub application_version: u8,
    pub num_windows: u8,
    /// Windows 1.. (window 0 is the full frame), `num_windows - 1` entries.
    pub processing_windows: Vec<ProcessingWindow>,
    pub targeted_system_display_maximum_luminance: u32,
    pub actual_targeted_system_display: Option<PeakLuminanceTable>,
    pub maxscl: [u32; 3],
    pub average_maxrgb: u32,
    pub distribution_maxrgb: Vec<DistributionMaxRgb>,
    pub fraction_bright_pixels: u16,
    pub actual_mastering_display: Option<PeakLuminanceTable>,
    pub tone_mapping_flag: bool,
    pub bezier_curve: Option<BezierCurve>,
    /// `Some` when `color_saturation_mapping_flag` is set.
    pub color_saturation_weight: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingWindow {
    pub window_upper_left_corner_x: u16,
    pub window_upper_left_corner_y: u16,
    pub window_lower_right_corner_x: u16,
    pub window_lower_right_corner_y: u16,
    pub center_of_ellipse_x: u16,
    pub center_of_ellipse_y: u16,
    pub rotation_angle: u8,
    pub semimajor_axis_internal_ellipse: u16,
    pub semimajor_axis_external_ellipse: u16,
    pub semiminor_axis_external_ellipse: u16,
    pub overlap_process_option: bool,
}

/// Actual peak luminance grid for the targeted or the mastering display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeakLuminanceTable {
    pub rows: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributionMaxRgb {
    pub percentage: u8,
    pub percentile: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BezierCurve {
    pub knee_point_x: u16,
    pub knee_point_y: u16,
    pub anchors: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// No tone mapping curve.
    A,
    /// Bezier tone mapping curve with a targeted display.
    B,
    Unknown,
}

/// How to extract the peak brightness from the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakBrightnessSource {
    /// Largest percentile value of the histogram.
    Histogram,
    /// Last percentile of the histogram, usually 99.98%.
    Histogram99,
    /// Largest `maxscl` component.
    MaxScl,
    /// Luminance of the `maxscl` components, BT.2020 primaries.
    MaxSclLuminance,
}

impl Hdr10PlusMetadata {
    /// A profile A frame with a single window and the given statistics.
    pub fn new(maxscl: [u32; 3], average_maxrgb: u32, percentiles: &[u32]) -> Self {
        let indexes: &[u8] = if percentiles.len() == DISTRIBUTION_INDEXES_10.len() {
            &DISTRIBUTION_INDEXES_10
        } else {
            &DISTRIBUTION_INDEXES_9
        };

        Self {
            application_version: limits::MAX_APPLICATION_VERSION,
            num_windows: 1,
            processing_windows: Vec::new(),
            targeted_system_display_maximum_luminance: 0,
            actual_targeted_system_display: None,
            maxscl,
            average_maxrgb,
            distribution_maxrgb: indexes
                .iter()
                .zip(percentiles)
                .map(|(&percentage, &percentile)| DistributionMaxRgb {
                    percentage,
                    percentile,
                })
                .collect(),
            fraction_bright_pixels: 0,
            actual_mastering_display: None,
            tone_mapping_flag: false,
            bezier_curve: None,
            color_saturation_weight: None,
        }
    }

    /// Turns the frame into profile B.
    pub fn with_bezier_curve(mut self, target_luminance: u32, curve: BezierCurve) -> Self {
        self.targeted_system_display_maximum_luminance = target_luminance;
        self.tone_mapping_flag = true;
        self.bezier_curve = Some(curve);
        self
    }

    /// Checks every range and cross-field rule, stopping at the first
    /// violation in declaration order.
    pub fn validate(&self) -> Result<()> {
        if self.application_version > limits::MAX_APPLICATION_VERSION {
            return Err(Error::out_of_range(
                "application_version",
                self.application_version,
                0,
                limits::MAX_APPLICATION_VERSION,
            ));
        }

        if !(limits::MIN_WINDOWS..=limits::MAX_WINDOWS).contains(&self.num_windows) {
            return Err(Error::out_of_range(
                "num_windows",
                self.num_windows,
                limits::MIN_WINDOWS,
                limits::MAX_WINDOWS,
            ));
        }
        if self.application_version == 1 && self.num_windows != 1 {
            return Err(Error::Structural(format!(
                "application version 1 allows a single window, got {}",
                self.num_windows
            )));
        }
        if self.processing_windows.len() != self.num_windows as usize - 1 {
            return Err(Error::Structural(format!(
                "{} window(s) need {} processing window(s), got {}",
                self.num_windows,
                self.num_windows - 1,
                self.processing_windows.len()
            )));
        }
        for (i, pw) in self.processing_windows.iter().enumerate() {
            pw.validate(&format!("processing_windows[{i}]"))?;
        }

        if self.targeted_system_display_maximum_luminance
            > limits::MAX_TARGETED_SYSTEM_DISPLAY_LUMINANCE
        {
            return Err(Error::out_of_range(
                "targeted_system_display_maximum_luminance",
                self.targeted_system_display_maximum_luminance,
                0,
                limits::MAX_TARGETED_SYSTEM_DISPLAY_LUMINANCE,
            ));
        }

        if let Some(table) = &self.actual_targeted_system_display {
            self.require_version_0("targeted_system_display_actual_peak_luminance_flag")?;
            table.validate("targeted_system_display_actual_peak_luminance")?;
        }

        for (i, &v) in self.maxscl.iter().enumerate() {
            check_luminance(&format!("maxscl[{i}]"), v)?;
        }
        check_luminance("average_maxrgb", self.average_maxrgb)?;
        DistributionMaxRgb::validate(&self.distribution_maxrgb)?;

        if self.fraction_bright_pixels > limits::MAX_FRACTION_BRIGHT_PIXELS {
            return Err(Error::out_of_range(
                "fraction_bright_pixels",
                self.fraction_bright_pixels,
                0,
                limits::MAX_FRACTION_BRIGHT_PIXELS,
            ));
        }

        if let Some(table) = &self.actual_mastering_display {
            self.require_version_0("mastering_display_actual_peak_luminance_flag")?;
            table.validate("mastering_display_actual_peak_luminance")?;
        }

        match (&self.bezier_curve, self.tone_mapping_flag) {
            (Some(_), false) => {
                return Err(Error::Structural(
                    "Bezier curve data present without tone_mapping_flag".into(),
                ));
            }
            (None, true) => {
                return Err(Error::Structural(
                    "tone_mapping_flag set without Bezier curve data".into(),
                ));
            }
            (Some(bc), true) => {
                bc.validate()?;
                if self.targeted_system_display_maximum_luminance == 0 {
                    return Err(Error::Structural(
                        "tone mapping needs a non-zero targeted_system_display_maximum_luminance"
                            .into(),
                    ));
                }
            }
            (None, false) => {
                if self.targeted_system_display_maximum_luminance != 0 {
                    return Err(Error::Structural(format!(
                        "targeted_system_display_maximum_luminance must be zero \
                         without tone mapping, got {}",
                        self.targeted_system_display_maximum_luminance
                    )));
                }
            }
        }

        if let Some(weight) = self.color_saturation_weight {
            self.require_version_0("color_saturation_mapping_flag")?;
            if weight > limits::MAX_COLOR_SATURATION_WEIGHT {
                return Err(Error::out_of_range(
                    "color_saturation_weight",
                    weight,
                    0,
                    limits::MAX_COLOR_SATURATION_WEIGHT,
                ));
            }
        }

        Ok(())
    }

    fn require_version_0(&self, flag: &str) -> Result<()> {
        if self.application_version == 1 {
            return Err(Error::Structural(format!(
                "{flag} must be unset for application version 1"
            )));
        }
        Ok(())
    }

    pub fn profile(&self) -> Profile {
        let target = self.targeted_system_display_maximum_luminance;
        match (&self.bezier_curve, self.tone_mapping_flag) {
            (Some(bc), true) if target > 0 && !bc.anchors.is_empty() => Profile::B,
            (None, false) if target == 0 => Profile::A,
            _ => Profile::Unknown,
        }
    }

    pub fn peak_brightness_nits(&self, source: PeakBrightnessSource) -> Option<f64> {
        match source {
            PeakBrightnessSource::Histogram => self
                .distribution_maxrgb
                .iter()
                .map(|d| d.percentile)
                .max()
                .map(|v| v as f64 / 10.0),
            PeakBrightnessSource::Histogram99 => self
                .distribution_maxrgb
                .last()
                .map(|d| d.percentile as f64 / 10.0),
            PeakBrightnessSource::MaxScl => self.maxscl.iter().max().map(|&v| v as f64 / 10.0),
            PeakBrightnessSource::MaxSclLuminance => {
                let [r, g, b] = self.maxscl.map(f64::from);
                Some((0.2627 * r + 0.678 * g + 0.0593 * b) / 10.0)
            }
        }
    }
}

fn check_luminance(field: &str, value: u32) -> Result<()> {
    if value > limits::MAX_LUMINANCE_VALUE {
        return Err(Error::out_of_range(
            field,
            value,
            0,
            limits::MAX_LUMINANCE_VALUE,
        ));
    }
    Ok(())
}

impl ProcessingWindow {
    fn validate(&self, field: &str) -> Result<()> {
        if self.rotation_angle > limits::MAX_ROTATION_ANGLE {
            return Err(Error::out_of_range(
                format!("{field}.rotation_angle"),
                self.rotation_angle,
                0,
                limits::MAX_ROTATION_ANGLE,
            ));
        }
        if self.window_upper_left_corner_x > self.window_lower_right_corner_x
            || self.window_upper_left_corner_y > self.window_lower_right_corner_y
        {
            return Err(Error::Structural(format!(
                "{field}: upper left corner lies after the lower right corner"
            )));
        }
        Ok(())
    }
}

impl PeakLuminanceTable {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    fn validate(&self, field: &str) -> Result<()> {
        let dims =
            limits::MIN_PEAK_LUMINANCE_DIM as usize..=limits::MAX_PEAK_LUMINANCE_DIM as usize;
        for (name, n) in [("rows", self.num_rows()), ("cols", self.num_cols())] {
            if !dims.contains(&n) {
                return Err(Error::out_of_range(
                    format!("{field}.{name}"),
                    n as u64,
                    limits::MIN_PEAK_LUMINANCE_DIM,
                    limits::MAX_PEAK_LUMINANCE_DIM,
                ));
            }
        }
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.num_cols() {
                return Err(Error::Structural(format!(
                    "{field}: row {i} has {} entries, expected {}",
                    row.len(),
                    self.num_cols()
                )));
            }
            if let Some((j, &v)) = row
                .iter()
                .enumerate()
                .find(|&(_, &v)| v > limits::MAX_PEAK_LUMINANCE_ENTRY)
            {
                return Err(Error::out_of_range(
                    format!("{field}[{i}][{j}]"),
                    v,
                    0,
                    limits::MAX_PEAK_LUMINANCE_ENTRY,
                ));
            }
        }
        Ok(())
    }
}

impl DistributionMaxRgb {
    pub fn distribution_index(list: &[Self]) -> Vec<u8> {
        list.iter().map(|v| v.percentage).collect()
    }

    pub fn distribution_values(list: &[Self]) -> Vec<u32> {
        list.iter().map(|v| v.percentile).collect()
    }

    /// The only index lists in use are the 9 and 10 entry variants.
    pub fn expected_indexes(count: usize) -> Option<&'static [u8]> {
        match count {
            9 => Some(&DISTRIBUTION_INDEXES_9),
            10 => Some(&DISTRIBUTION_INDEXES_10),
            _ => None,
        }
    }

    fn validate(list: &[Self]) -> Result<()> {
        let Some(expected) = Self::expected_indexes(list.len()) else {
            return Err(Error::Structural(format!(
                "invalid number of percentiles: {}, expected 9 or 10",
                list.len()
            )));
        };

        let indexes = Self::distribution_index(list);
        if indexes != expected {
            return Err(Error::Structural(format!(
                "invalid distribution indexes {indexes:?}, expected {expected:?}"
            )));
        }

        for (i, d) in list.iter().enumerate() {
            check_luminance(&format!("distribution_maxrgb[{i}].percentile"), d.percentile)?;
        }

        Ok(())
    }
}

impl BezierCurve {
    fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("knee_point_x", self.knee_point_x),
            ("knee_point_y", self.knee_point_y),
        ] {
            if v > limits::MAX_KNEE_POINT {
                return Err(Error::out_of_range(
                    format!("bezier_curve.{name}"),
                    v,
                    0,
                    limits::MAX_KNEE_POINT,
                ));
            }
        }

        if self.anchors.len() > limits::MAX_BEZIER_ANCHORS {
            return Err(Error::out_of_range(
                "bezier_curve.anchors",
                self.anchors.len() as u64,
                0,
                limits::MAX_BEZIER_ANCHORS as u64,
            ));
        }

        for (i, &v) in self.anchors.iter().enumerate() {
            if v > limits::MAX_BEZIER_ANCHOR {
                return Err(Error::out_of_range(
                    format!("bezier_curve.anchors[{i}]"),
                    v,
                    0,
                    limits::MAX_BEZIER_ANCHOR,
                ));
            }
        }

        check_non_decreasing(&self.anchors, "bezier_curve.anchors")
    }
}

pub(crate) fn check_non_decreasing(anchors: &[u16], field: &str) -> Result<()> {
    if let Some(i) = anchors.windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::Structural(format!(
            "{field} must be non-decreasing, {} follows {} at position {}",
            anchors[i + 1],
            anchors[i],
            i + 1
        )));
    }
    Ok(())
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::A => f.write_str("A"),
            Profile::B => f.write_str("B"),
            Profile::Unknown => f.write_str("N/A"),
        }
    }
}

impl fmt::Display for PeakBrightnessSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Histogram => f.write_str("Histogram maximum value"),
            Self::Histogram99 => f.write_str("Histogram 99.98% percentile"),
            Self::MaxScl => f.write_str("MaxSCL maximum value"),
            Self::MaxSclLuminance => f.write_str("MaxSCL luminance from the components"),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PERCENTILES_9: [u32; 9] = [3, 43, 56, 219, 1036, 2714, 4668, 9024, 14445];

    pub(crate) fn profile_a() -> Hdr10PlusMetadata {
        Hdr10PlusMetadata::new([17830, 16895, 14252], 1037, &PERCENTILES_9)
    }

    pub(crate) fn profile_b() -> Hdr10PlusMetadata {
        profile_a().with_bezier_curve(
            400,
            BezierCurve {
                knee_point_x: 17,
                knee_point_y: 64,
                anchors: vec![265, 666, 741, 800, 848, 887, 920, 945, 957],
            },
        )
    }

    #[test]
    fn profiles() {
        assert_eq!(profile_a().profile(), Profile::A);
        assert_eq!(profile_b().profile(), Profile::B);

        let mut meta = profile_b();
        meta.bezier_curve.as_mut().unwrap().anchors.clear();
        assert_eq!(meta.profile(), Profile::Unknown);
        assert_eq!(meta.profile().to_string(), "N/A");
    }

    #[test]
    fn valid_frames_pass() {
        profile_a().validate().unwrap();
        profile_b().validate().unwrap();
    }

    #[test]
    fn maxscl_bounds() {
        let mut meta = profile_a();
        meta.maxscl[2] = limits::MAX_LUMINANCE_VALUE;
        meta.validate().unwrap();

        meta.maxscl[2] += 1;
        match meta.validate() {
            Err(Error::OutOfRange { field, value, .. }) => {
                assert_eq!(field, "maxscl[2]");
                assert_eq!(value, 100_001);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn knee_point_without_tone_mapping_flag() {
        let mut meta = profile_b();
        meta.tone_mapping_flag = false;
        assert!(matches!(meta.validate(), Err(Error::Structural(_))));
    }

    #[test]
    fn profile_b_needs_target_luminance() {
        let mut meta = profile_b();
        meta.targeted_system_display_maximum_luminance = 0;
        assert!(matches!(meta.validate(), Err(Error::Structural(_))));
    }

    #[test]
    fn decreasing_anchors_rejected() {
        let mut meta = profile_b();
        meta.bezier_curve.as_mut().unwrap().anchors = vec![100, 200, 150];
        assert!(matches!(meta.validate(), Err(Error::Structural(_))));
    }

    #[test]
    fn version_1_is_single_window() {
        let mut meta = profile_a();
        meta.num_windows = 2;
        meta.processing_windows.push(ProcessingWindow::default());
        assert!(matches!(meta.validate(), Err(Error::Structural(_))));

        meta.application_version = 0;
        meta.validate().unwrap();
    }

    #[test]
    fn wrong_distribution_indexes() {
        let mut meta = profile_a();
        meta.distribution_maxrgb[4].percentage = 51;
        assert!(matches!(meta.validate(), Err(Error::Structural(_))));

        meta.distribution_maxrgb.pop();
        assert!(matches!(meta.validate(), Err(Error::Structural(_))));
    }

    #[test]
    fn peak_luminance_table_needs_version_0() {
        let mut meta = profile_a();
        meta.actual_mastering_display = Some(PeakLuminanceTable {
            rows: vec![vec![1, 2], vec![3, 4]],
        });
        assert!(matches!(meta.validate(), Err(Error::Structural(_))));

        meta.application_version = 0;
        meta.validate().unwrap();

        meta.actual_mastering_display = Some(PeakLuminanceTable {
            rows: vec![vec![1, 2], vec![3, 16]],
        });
        assert!(matches!(
            meta.validate(),
            Err(Error::OutOfRange { field, .. })
                if field == "mastering_display_actual_peak_luminance[1][1]"
        ));
    }

    #[test]
    fn peak_brightness() {
        let meta = profile_a();
        assert_eq!(meta.peak_brightness_nits(PeakBrightnessSource::Histogram), Some(1444.5));
        assert_eq!(meta.peak_brightness_nits(PeakBrightnessSource::Histogram99), Some(1444.5));
        assert_eq!(meta.peak_brightness_nits(PeakBrightnessSource::MaxScl), Some(1783.0));

        let lum = meta
            .peak_brightness_nits(PeakBrightnessSource::MaxSclLuminance)
            .unwrap();
        assert!((lum - 1698.39).abs() < 0.01);
    }
}

//! Synthetic per-channel templates for emission-line signatures.
//!
//! Each line is rendered with the configured [`PeakShape`] at its calibrated
//! channel, truncated at [`WINDOW_FWHMS`] full widths on either side so every
//! contribution stays local. Escape peaks reuse the same shape at the shifted
//! energy, scaled by the escape intensity and the detector line weight.

mod footprint;

pub use footprint::{ChannelFootprint, ChannelSpan};

use crate::domain::{EmissionLine, EnergyCalibration, EscapePeakType, Signature};
use crate::fitting::{FittingParameters, PeakShape};

/// Half-width of the rendering window, in multiples of the line FWHM.
pub const WINDOW_FWHMS: f64 = 4.0;

/// Half-width of the overlap footprint, in multiples of the line FWHM.
pub const FOOTPRINT_FWHMS: f64 = 1.0;

/// A signature's template under one calibration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    signature: Signature,
    intensities: Vec<f64>,
}

impl Curve {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    pub fn max_intensity(&self) -> f64 {
        crate::numerics::max_value(&self.intensities)
    }

    pub fn scaled(&self, scale: f64) -> Vec<f64> {
        self.intensities.iter().map(|value| value * scale).collect()
    }
}

/// A line as it is deposited into a template: parent lines and their escapes.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RenderedLine {
    energy: f64,
    height: f64,
}

/// Renders signatures into curves and footprints for one parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurveGenerator {
    parameters: FittingParameters,
}

impl CurveGenerator {
    pub fn new(parameters: FittingParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &FittingParameters {
        &self.parameters
    }

    /// Output length always equals `calibration.channels()`. A zero-width
    /// calibration yields an all-zero template.
    pub fn generate(
        &self,
        signature: &Signature,
        calibration: &EnergyCalibration,
        escape: EscapePeakType,
    ) -> Curve {
        let mut intensities = vec![0.0; calibration.channels()];
        let per_channel = calibration.energy_per_channel();

        if per_channel > 0.0 {
            for line in self.rendered_lines(signature.lines(), escape) {
                self.deposit(&mut intensities, line, calibration, per_channel);
            }
        }

        Curve {
            signature: signature.clone(),
            intensities,
        }
    }

    /// Channels where the signature carries most of its signal, including escape peaks.
    pub fn footprint(
        &self,
        signature: &Signature,
        calibration: &EnergyCalibration,
        escape: EscapePeakType,
    ) -> ChannelFootprint {
        let mut spans = Vec::new();
        let per_channel = calibration.energy_per_channel();
        if per_channel <= 0.0 {
            return ChannelFootprint::new(spans);
        }

        for line in self.rendered_lines(signature.lines(), escape) {
            let half_width = FOOTPRINT_FWHMS * self.parameters.fwhm(line.energy);
            if let Some(span) =
                channel_span(calibration, line.energy - half_width, line.energy + half_width)
            {
                spans.push(span);
            }
        }

        ChannelFootprint::new(spans)
    }

    fn rendered_lines(&self, lines: &[EmissionLine], escape: EscapePeakType) -> Vec<RenderedLine> {
        let mut rendered = Vec::with_capacity(lines.len() * (1 + escape.escape_lines().len()));
        for line in lines {
            if line.relative_intensity <= 0.0 || !line.energy.is_finite() {
                continue;
            }
            rendered.push(RenderedLine {
                energy: line.energy,
                height: line.relative_intensity,
            });

            let Some(edge) = escape.absorption_edge() else {
                continue;
            };
            if line.energy <= edge {
                continue;
            }
            for detector_line in escape.escape_lines() {
                let energy = line.energy - detector_line.energy;
                if energy <= 0.0 {
                    continue;
                }
                rendered.push(RenderedLine {
                    energy,
                    height: line.relative_intensity
                        * self.parameters.escape_intensity
                        * detector_line.relative_intensity,
                });
            }
        }
        rendered
    }

    fn deposit(
        &self,
        intensities: &mut [f64],
        line: RenderedLine,
        calibration: &EnergyCalibration,
        per_channel: f64,
    ) {
        let fwhm = self.parameters.fwhm(line.energy);
        let half_window = WINDOW_FWHMS * fwhm;
        let Some(span) = channel_span(
            calibration,
            line.energy - half_window,
            line.energy + half_window,
        ) else {
            return;
        };

        let shape: PeakShape = self.parameters.shape;
        for channel in span.start..=span.end {
            let offset = calibration.energy_from_channel(channel) - line.energy;
            if offset.abs() > half_window + per_channel {
                continue;
            }
            intensities[channel] += line.height * shape.value(offset, fwhm);
        }
    }
}

/// Channels overlapping the energy interval `[low, high]`, clamped to the calibration.
fn channel_span(calibration: &EnergyCalibration, low: f64, high: f64) -> Option<ChannelSpan> {
    let channels = calibration.channels();
    if channels == 0 {
        return None;
    }
    let start = calibration.channel_position(low)?.round();
    let end = calibration.channel_position(high)?.round();
    let last = (channels - 1) as f64;
    if end < 0.0 || start > last {
        return None;
    }
    Some(ChannelSpan::new(
        start.max(0.0) as usize,
        end.min(last) as usize,
    ))
}

#[cfg(test)]
mod tests {
    use super::{CurveGenerator, WINDOW_FWHMS};
    use crate::common::elements::Element;
    use crate::domain::{EmissionLine, EnergyCalibration, EscapePeakType, ShellType, Signature};
    use crate::fitting::FittingParameters;

    fn calibration() -> EnergyCalibration {
        EnergyCalibration::new(0.0, 20.48, 2048).expect("calibration")
    }

    fn iron_k() -> Signature {
        Signature::new(
            Element::from_symbol("Fe").expect("Fe"),
            ShellType::K,
            vec![EmissionLine::new(6.40, 1.0), EmissionLine::new(7.06, 0.17)],
        )
    }

    #[test]
    fn curve_length_matches_channel_count_and_peaks_at_line_centre() {
        let curve = CurveGenerator::default().generate(
            &iron_k(),
            &calibration(),
            EscapePeakType::None,
        );

        assert_eq!(curve.len(), 2048);
        assert!((curve.intensities()[640] - 1.0).abs() < 1.0e-9);
        assert!((curve.intensities()[706] - 0.17).abs() < 1.0e-3);
        assert!(curve.intensities().iter().all(|value| *value >= 0.0));
    }

    #[test]
    fn contributions_are_localized_to_the_rendering_window() {
        let parameters = FittingParameters::default();
        let curve = CurveGenerator::new(parameters).generate(
            &iron_k(),
            &calibration(),
            EscapePeakType::None,
        );
        let reach = (WINDOW_FWHMS * parameters.fwhm(7.06) / 0.01).ceil() as usize + 1;

        assert_eq!(curve.intensities()[640 - reach - 5], 0.0);
        assert_eq!(curve.intensities()[706 + reach + 5], 0.0);
        assert_eq!(curve.intensities()[0], 0.0);
    }

    #[test]
    fn escape_mode_adds_shifted_low_amplitude_peak() {
        let generator = CurveGenerator::default();
        let plain = generator.generate(&iron_k(), &calibration(), EscapePeakType::None);
        let escaped = generator.generate(&iron_k(), &calibration(), EscapePeakType::Silicon);

        let escape_channel = 466;
        assert_eq!(plain.intensities()[escape_channel], 0.0);
        assert!(escaped.intensities()[escape_channel] > 0.0);
        assert!(escaped.intensities()[escape_channel] < 0.05);

        let germanium = generator.generate(&iron_k(), &calibration(), EscapePeakType::Germanium);
        assert_eq!(germanium, plain);
    }

    #[test]
    fn generation_is_deterministic() {
        let generator = CurveGenerator::default();
        let first = generator.generate(&iron_k(), &calibration(), EscapePeakType::Silicon);
        let second = generator.generate(&iron_k(), &calibration(), EscapePeakType::Silicon);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_calibration_renders_nothing() {
        let generator = CurveGenerator::default();
        let curve = generator.generate(&iron_k(), &EnergyCalibration::zero(), EscapePeakType::None);
        assert!(curve.is_empty());

        let flat = EnergyCalibration::new(5.0, 5.0, 16).expect("flat");
        let curve = generator.generate(&iron_k(), &flat, EscapePeakType::None);
        assert_eq!(curve.intensities(), &[0.0; 16]);
        assert!(generator
            .footprint(&iron_k(), &flat, EscapePeakType::None)
            .is_empty());
    }

    #[test]
    fn footprint_covers_each_line_and_escape() {
        let generator = CurveGenerator::default();
        let plain = generator.footprint(&iron_k(), &calibration(), EscapePeakType::None);
        let escaped = generator.footprint(&iron_k(), &calibration(), EscapePeakType::Silicon);

        assert_eq!(plain.spans().len(), 2);
        assert!(plain.contains(640));
        assert!(plain.contains(706));
        assert!(!plain.contains(466));
        assert_eq!(escaped.spans().len(), 4);
        assert!(escaped.contains(466));
    }

    #[test]
    fn lines_outside_the_calibrated_range_are_skipped() {
        let narrow = EnergyCalibration::new(0.0, 5.0, 500).expect("narrow");
        let generator = CurveGenerator::default();
        let curve = generator.generate(&iron_k(), &narrow, EscapePeakType::None);
        assert!(curve.intensities().iter().all(|value| *value == 0.0));
        assert!(generator
            .footprint(&iron_k(), &narrow, EscapePeakType::None)
            .is_empty());
    }
}

//! Calibration run configuration.
//!
//! Field names and defaults follow the steering parameters of the legacy
//! pedestal processor this engine replaces; the JSON surface uses camelCase
//! keys throughout.

use crate::domain::{CalResult, CalibError};
use serde::{Deserialize, Serialize};

/// Noise below this level marks a channel as non-responding rather than quiet.
pub const DEAD_PIXEL_FLOOR: f64 = 0.2;

/// Default firing-frequency threshold of the refinement pass.
pub const DEFAULT_FIRING_FREQUENCY: f64 = 0.25;

/// Pedestal/noise accumulation strategy, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationAlgorithm {
    /// Incremental per-pixel mean/variance; the reference behavior.
    IncrementalMeanVariance,
    /// Profile-bin accumulation. Its noise output is unverified; see
    /// [`crate::stats::bank::ProfileBank`].
    ProfileBased,
}

impl CalibrationAlgorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncrementalMeanVariance => "incrementalMeanVariance",
            Self::ProfileBased => "profileBased",
        }
    }
}

/// Bad-pixel threshold strategy applied after every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BadPixelAlgorithm {
    /// Threshold from the mean and spread of the good-pixel noise distribution.
    NoiseDistribution,
    /// Fixed absolute noise threshold.
    AbsoluteNoiseValue,
}

impl BadPixelAlgorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoiseDistribution => "noiseDistribution",
            Self::AbsoluteNoiseValue => "absoluteNoiseValue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalibrationConfig {
    pub algorithm: CalibrationAlgorithm,
    pub bad_pixel_algorithm: BadPixelAlgorithm,
    /// Number of common-mode suppression iterations after the raw pass.
    pub common_mode_iterations: u32,
    /// Hit rejection threshold in noise (SNR) units.
    pub hit_rejection_cut: f64,
    /// Maximum hit pixels per detector frame before the common-mode estimate
    /// is rejected and the frame skipped.
    pub max_rejected_pixels_per_frame: usize,
    /// Masking cut: sigma units for `noiseDistribution`, ADC units for
    /// `absoluteNoiseValue`.
    pub bad_pixel_mask_cut: f64,
    /// First event index of the calibration range (inclusive).
    pub first_event: u64,
    /// End of the event range (exclusive); `None` runs to the end-of-range
    /// marker of the source.
    pub last_event: Option<u64>,
    /// Run the extra firing-frequency masking pass after the last common-mode
    /// iteration.
    pub enable_refinement_pass: bool,
    /// Fraction of refinement-pass frames a pixel may fire in before it is
    /// masked.
    pub refinement_firing_frequency: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            algorithm: CalibrationAlgorithm::IncrementalMeanVariance,
            bad_pixel_algorithm: BadPixelAlgorithm::NoiseDistribution,
            common_mode_iterations: 1,
            hit_rejection_cut: 4.0,
            max_rejected_pixels_per_frame: 1000,
            bad_pixel_mask_cut: 3.5,
            first_event: 0,
            last_event: None,
            enable_refinement_pass: true,
            refinement_firing_frequency: DEFAULT_FIRING_FREQUENCY,
        }
    }
}

impl CalibrationConfig {
    /// Total number of passes over the event range: the raw pass, the
    /// common-mode iterations, and the optional refinement pass.
    pub fn loop_count(&self) -> u32 {
        self.common_mode_iterations + 1 + u32::from(self.enable_refinement_pass)
    }

    pub fn validate(&self) -> CalResult<()> {
        if !self.hit_rejection_cut.is_finite() || self.hit_rejection_cut <= 0.0 {
            return Err(CalibError::configuration(
                "INPUT.HIT_REJECTION_CUT",
                format!(
                    "hitRejectionCut must be finite and positive, got {}",
                    self.hit_rejection_cut
                ),
            ));
        }
        if !self.bad_pixel_mask_cut.is_finite() || self.bad_pixel_mask_cut <= 0.0 {
            return Err(CalibError::configuration(
                "INPUT.BAD_PIXEL_MASK_CUT",
                format!(
                    "badPixelMaskCut must be finite and positive, got {}",
                    self.bad_pixel_mask_cut
                ),
            ));
        }
        if let Some(last_event) = self.last_event
            && last_event <= self.first_event
        {
            return Err(CalibError::configuration(
                "INPUT.EVENT_RANGE",
                format!(
                    "event range [{}, {}) is empty",
                    self.first_event, last_event
                ),
            ));
        }
        if self.enable_refinement_pass
            && !(self.refinement_firing_frequency > 0.0 && self.refinement_firing_frequency <= 1.0)
        {
            return Err(CalibError::configuration(
                "INPUT.FIRING_FREQUENCY",
                format!(
                    "refinementFiringFrequency must be in (0, 1], got {}",
                    self.refinement_firing_frequency
                ),
            ));
        }
        Ok(())
    }

    /// Check the pass plan against the source's total event budget.
    ///
    /// Every pass re-reads the configured range, so a bounded range must fit
    /// `loop_count()` times into the budget. With an open-ended range the
    /// required record count is unknown; a warning is all that can be given.
    pub fn check_event_budget(&self, budget: Option<u64>) -> CalResult<()> {
        let Some(budget) = budget else {
            return Ok(());
        };
        match self.last_event {
            Some(last_event) => {
                let per_pass = last_event - self.first_event;
                let required = per_pass * u64::from(self.loop_count());
                if required > budget {
                    return Err(CalibError::configuration(
                        "INPUT.EVENT_BUDGET",
                        format!(
                            "calibration needs {} events ({} per pass over {} passes) but the source budget is {}",
                            required,
                            per_pass,
                            self.loop_count(),
                            budget
                        ),
                    ));
                }
            }
            None => {
                tracing::warn!(
                    budget,
                    loops = self.loop_count(),
                    "open-ended event range with a bounded source; at most {} events fit per pass",
                    budget / u64::from(self.loop_count())
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BadPixelAlgorithm, CalibrationAlgorithm, CalibrationConfig};
    use crate::domain::CalibErrorCategory;

    #[test]
    fn defaults_match_legacy_steering_parameters() {
        let config = CalibrationConfig::default();
        assert_eq!(config.algorithm, CalibrationAlgorithm::IncrementalMeanVariance);
        assert_eq!(config.bad_pixel_algorithm, BadPixelAlgorithm::NoiseDistribution);
        assert_eq!(config.common_mode_iterations, 1);
        assert_eq!(config.hit_rejection_cut, 4.0);
        assert_eq!(config.max_rejected_pixels_per_frame, 1000);
        assert_eq!(config.bad_pixel_mask_cut, 3.5);
        assert_eq!(config.first_event, 0);
        assert_eq!(config.last_event, None);
        assert!(config.enable_refinement_pass);
        assert_eq!(config.loop_count(), 3);
    }

    #[test]
    fn camel_case_json_round_trips() {
        let json = r#"{
            "algorithm": "profileBased",
            "badPixelAlgorithm": "absoluteNoiseValue",
            "commonModeIterations": 2,
            "hitRejectionCut": 3.0,
            "maxRejectedPixelsPerFrame": 50,
            "badPixelMaskCut": 2.5,
            "firstEvent": 10,
            "lastEvent": 110,
            "enableRefinementPass": false,
            "refinementFiringFrequency": 0.25
        }"#;
        let config: CalibrationConfig = serde_json::from_str(json).expect("config should parse");
        assert_eq!(config.algorithm, CalibrationAlgorithm::ProfileBased);
        assert_eq!(config.last_event, Some(110));
        assert_eq!(config.loop_count(), 3);

        let text = serde_json::to_string(&config).expect("config should serialize");
        let reparsed: CalibrationConfig = serde_json::from_str(&text).expect("round trip");
        assert_eq!(reparsed, config);
    }

    #[test]
    fn unknown_algorithm_is_rejected_by_serde() {
        let json = r#"{ "algorithm": "meanRms" }"#;
        assert!(serde_json::from_str::<CalibrationConfig>(json).is_err());
    }

    #[test]
    fn empty_event_range_fails_validation() {
        let config = CalibrationConfig {
            first_event: 5,
            last_event: Some(5),
            ..CalibrationConfig::default()
        };
        let error = config.validate().expect_err("empty range should fail");
        assert_eq!(error.category(), CalibErrorCategory::ConfigurationError);
        assert_eq!(error.placeholder(), "INPUT.EVENT_RANGE");
    }

    #[test]
    fn budget_check_accounts_for_every_pass() {
        let config = CalibrationConfig {
            common_mode_iterations: 1,
            enable_refinement_pass: true,
            first_event: 0,
            last_event: Some(100),
            ..CalibrationConfig::default()
        };
        // three passes over 100 events each
        assert!(config.check_event_budget(Some(300)).is_ok());
        let error = config
            .check_event_budget(Some(299))
            .expect_err("budget one short of the plan should fail");
        assert_eq!(error.placeholder(), "INPUT.EVENT_BUDGET");
        assert!(config.check_event_budget(None).is_ok());
    }
}

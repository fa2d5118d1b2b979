//! Per-frame, per-detector common-mode estimation.

use crate::domain::PixelStatus;

/// Cuts governing hit rejection during the estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommonModeCuts {
    /// A good pixel is a hit when its baseline deviation exceeds this many
    /// units of its own noise.
    pub hit_rejection_cut: f64,
    /// The estimate is rejected when more than this many pixels are hits.
    pub max_rejected_pixels: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommonModeOutcome {
    /// Mean baseline deviation of the good, non-hit pixels.
    Accepted { value: f64, hit_pixels: usize },
    /// Too many hits, or no eligible pixel at all; the frame must not touch
    /// the accumulators of this detector.
    Rejected {
        hit_pixels: usize,
        eligible_pixels: usize,
    },
}

impl CommonModeOutcome {
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Estimate the shared signal shift of one detector frame.
///
/// Bad pixels are ignored entirely. Good pixels whose deviation from the
/// baseline exceeds the hit cut look like real hits: they are excluded from
/// the average (but still receive the correction in the caller).
pub fn estimate(
    samples: &[f64],
    pedestal: &[f64],
    noise: &[f64],
    status: &[PixelStatus],
    cuts: &CommonModeCuts,
) -> CommonModeOutcome {
    debug_assert_eq!(samples.len(), pedestal.len());
    debug_assert_eq!(samples.len(), status.len());

    let mut deviation_sum = 0.0;
    let mut eligible_pixels = 0usize;
    let mut hit_pixels = 0usize;

    for (pixel, &value) in samples.iter().enumerate() {
        if !status[pixel].is_good() {
            continue;
        }
        let deviation = value - pedestal[pixel];
        if deviation > cuts.hit_rejection_cut * noise[pixel] {
            hit_pixels += 1;
        } else {
            deviation_sum += deviation;
            eligible_pixels += 1;
        }
    }

    if hit_pixels > cuts.max_rejected_pixels || eligible_pixels == 0 {
        CommonModeOutcome::Rejected {
            hit_pixels,
            eligible_pixels,
        }
    } else {
        CommonModeOutcome::Accepted {
            value: deviation_sum / eligible_pixels as f64,
            hit_pixels,
        }
    }
}

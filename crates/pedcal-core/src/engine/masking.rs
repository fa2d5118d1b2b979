//! Bad-pixel masking policies.
//!
//! Both threshold strategies run after every accumulation pass; the
//! firing-frequency strategy runs once, at the end of the refinement pass.
//! Masking is monotone: a pixel already bad stays bad.

use crate::common::config::{BadPixelAlgorithm, DEAD_PIXEL_FLOOR};
use crate::domain::PixelStatus;
use tracing::{debug, info};

/// Mean and population standard deviation of the noise of currently-good
/// pixels. `None` when no good pixel is left.
pub fn good_noise_stats(noise: &[f64], status: &[PixelStatus]) -> Option<(f64, f64)> {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for (pixel, &sigma) in noise.iter().enumerate() {
        if status[pixel].is_good() {
            sum += sigma;
            sum_sq += sigma * sigma;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
    Some((mean, variance.sqrt()))
}

/// Apply the configured threshold strategy to one detector.
///
/// Good pixels above the threshold, or quieter than the dead-pixel floor,
/// become bad. Returns the number of newly masked pixels.
pub fn mask_noisy_pixels(
    algorithm: BadPixelAlgorithm,
    cut: f64,
    noise: &[f64],
    status: &mut [PixelStatus],
) -> usize {
    let threshold = match algorithm {
        BadPixelAlgorithm::NoiseDistribution => {
            let Some((mean, std_dev)) = good_noise_stats(noise, status) else {
                return 0;
            };
            let threshold = mean + cut * std_dev;
            debug!(mean, std_dev, threshold, "noise-distribution masking threshold");
            threshold
        }
        BadPixelAlgorithm::AbsoluteNoiseValue => cut,
    };

    let mut masked = 0usize;
    for (pixel, &sigma) in noise.iter().enumerate() {
        if status[pixel].is_good() && (sigma > threshold || sigma < DEAD_PIXEL_FLOOR) {
            status[pixel] = PixelStatus::Bad;
            debug!(pixel, noise = sigma, threshold, "masking pixel");
            masked += 1;
        }
    }
    info!(masked, threshold, "masked bad pixels");
    masked
}

/// Refinement masking: flag pixels firing in too large a fraction of the
/// refinement-pass frames.
pub fn mask_firing_pixels(
    hit_counter: &[u32],
    frames: u64,
    max_frequency: f64,
    status: &mut [PixelStatus],
) -> usize {
    if frames == 0 {
        return 0;
    }
    let mut masked = 0usize;
    for (pixel, &hits) in hit_counter.iter().enumerate() {
        let frequency = f64::from(hits) / frames as f64;
        if status[pixel].is_good() && frequency > max_frequency {
            status[pixel] = PixelStatus::Bad;
            debug!(pixel, frequency, "masking loud pixel");
            masked += 1;
        }
    }
    info!(masked, frames, "masked loud pixels after refinement");
    masked
}

#[cfg(test)]
mod tests {
    use super::{good_noise_stats, mask_firing_pixels, mask_noisy_pixels};
    use crate::common::config::BadPixelAlgorithm;
    use crate::domain::PixelStatus;

    #[test]
    fn noise_distribution_scenario_masks_loud_and_dead_pixels() {
        // 100 pixels at 0.8 and 100 at 1.2 put the good-noise mean near 1.0
        // and the spread near 0.2; cut 3.5 lands the threshold around 1.79.
        let mut noise = Vec::new();
        for _ in 0..100 {
            noise.push(0.8);
            noise.push(1.2);
        }
        noise.extend([2.0, 0.05, 1.5]);
        let mut status = vec![PixelStatus::Good; noise.len()];

        let (mean, std_dev) = good_noise_stats(&noise, &status).expect("good pixels exist");
        let threshold = mean + 3.5 * std_dev;
        assert!(threshold > 1.5 && threshold < 2.0, "threshold was {threshold}");

        let masked = mask_noisy_pixels(
            BadPixelAlgorithm::NoiseDistribution,
            3.5,
            &noise,
            &mut status,
        );
        assert_eq!(masked, 2);
        assert_eq!(status[200], PixelStatus::Bad); // noise 2.0 above threshold
        assert_eq!(status[201], PixelStatus::Bad); // noise 0.05 below the floor
        assert_eq!(status[202], PixelStatus::Good); // noise 1.5 inside the band
    }

    #[test]
    fn absolute_strategy_uses_the_cut_directly() {
        let noise = [0.5, 1.5, 2.5, 0.1];
        let mut status = vec![PixelStatus::Good; 4];
        let masked =
            mask_noisy_pixels(BadPixelAlgorithm::AbsoluteNoiseValue, 2.0, &noise, &mut status);
        assert_eq!(masked, 2);
        assert_eq!(
            status,
            vec![
                PixelStatus::Good,
                PixelStatus::Good,
                PixelStatus::Bad, // 2.5 > 2.0
                PixelStatus::Bad, // 0.1 below the floor
            ]
        );
    }

    #[test]
    fn bad_pixels_do_not_contribute_to_the_threshold_statistics() {
        let noise = [1.0, 1.0, 100.0];
        let mut status = vec![PixelStatus::Good, PixelStatus::Good, PixelStatus::Bad];
        let (mean, std_dev) = good_noise_stats(&noise, &status).expect("good pixels exist");
        assert_eq!(mean, 1.0);
        assert_eq!(std_dev, 0.0);

        // re-masking is a no-op for the already-bad pixel
        let masked = mask_noisy_pixels(
            BadPixelAlgorithm::NoiseDistribution,
            3.5,
            &noise,
            &mut status,
        );
        assert_eq!(masked, 0);
        assert_eq!(status[2], PixelStatus::Bad);
    }

    #[test]
    fn all_bad_detector_yields_no_statistics() {
        let noise = [1.0, 2.0];
        let status = vec![PixelStatus::Bad; 2];
        assert!(good_noise_stats(&noise, &status).is_none());
    }

    #[test]
    fn firing_frequency_masks_strictly_above_the_limit() {
        let hit_counter = [2, 1, 0];
        let mut status = vec![PixelStatus::Good; 3];
        // 4 frames: frequencies 0.5, 0.25, 0.0 against a 0.25 limit
        let masked = mask_firing_pixels(&hit_counter, 4, 0.25, &mut status);
        assert_eq!(masked, 1);
        assert_eq!(
            status,
            vec![PixelStatus::Bad, PixelStatus::Good, PixelStatus::Good]
        );
    }

    #[test]
    fn firing_mask_with_no_frames_is_a_no_op() {
        let mut status = vec![PixelStatus::Good; 2];
        assert_eq!(mask_firing_pixels(&[5, 5], 0, 0.25, &mut status), 0);
        assert!(status.iter().all(|s| s.is_good()));
    }
}

//! Per-pixel online mean/variance state.
//!
//! One accumulator tracks one pixel across the frames of a single pass. The
//! incremental update reproduces the batch mean and population variance of
//! the values fed in, to floating-point rounding: with `n` the new entry
//! count,
//!
//! ```text
//! mean'   = ((n-1) * mean + value) / n
//! varAcc' = ((n-1) * varAcc + (value - mean) * (value - mean')) / n
//! ```
//!
//! The cross term multiplies the residual against the old and the new mean;
//! squaring only the new-mean residual would understate the variance on every
//! update.

/// Online statistics of a single pixel within one pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelAccumulator {
    entries: u64,
    mean: f64,
    var_acc: f64,
}

impl PixelAccumulator {
    /// Accumulator waiting for its first sample.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Accumulator carrying the previous pass's pedestal and noise with the
    /// entry count reset to one, the seeding rule of a continuing
    /// common-mode iteration.
    pub fn seeded(pedestal: f64, noise: f64) -> Self {
        Self {
            entries: 1,
            mean: pedestal,
            var_acc: noise * noise,
        }
    }

    pub fn update(&mut self, value: f64) {
        if self.entries == 0 {
            self.entries = 1;
            self.mean = value;
            self.var_acc = 0.0;
            return;
        }
        let n = (self.entries + 1) as f64;
        let old_mean = self.mean;
        let new_mean = ((n - 1.0) * old_mean + value) / n;
        self.var_acc = ((n - 1.0) * self.var_acc + (value - old_mean) * (value - new_mean)) / n;
        self.mean = new_mean;
        self.entries += 1;
    }

    pub const fn entries(&self) -> u64 {
        self.entries
    }

    pub const fn mean(&self) -> f64 {
        self.mean
    }

    pub const fn variance(&self) -> f64 {
        self.var_acc
    }

    pub fn noise(&self) -> f64 {
        self.var_acc.sqrt()
    }
}

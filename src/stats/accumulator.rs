//! Online moment accumulator with a log-scale histogram.

/// Number of histogram bins per accumulator.
pub const NUM_BINS: usize = 200;

/// Base of the logarithmic bin scale. Bin `i` covers `[BIN_BASE^i, BIN_BASE^(i+1))`.
pub const BIN_BASE: f64 = 1.08;

/// Histogram bin for `value`, clamped to `[0, NUM_BINS - 1]`.
///
/// Values below 1 (including zero, negatives and NaN) land in bin 0 and
/// values past the top of the scale, `+inf` included, land in the last bin.
#[inline]
pub fn bin_index(value: f64) -> usize {
    let scaled = value.ln() / BIN_BASE.ln();
    if !(scaled >= 0.0) {
        return 0;
    }
    // `as` saturates, so +inf becomes usize::MAX before the clamp
    (scaled as usize).min(NUM_BINS - 1)
}

/// Lower edge of bin `i`, i.e. `BIN_BASE^i`.
#[inline]
pub fn bin_lower_bound(i: usize) -> f64 {
    BIN_BASE.powf(i as f64)
}

/// Running statistics for one series of samples.
///
/// `avg` and `stdev` are snapshots taken by [`StatAccumulator::finalize`];
/// they stay NaN until then and are not refreshed by later `add` calls.
#[derive(Debug, Clone)]
pub struct StatAccumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
    avg: f64,
    stdev: f64,
    bins: [u64; NUM_BINS],
}

impl StatAccumulator {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            avg: f64::NAN,
            stdev: f64::NAN,
            bins: [0; NUM_BINS],
        }
    }

    /// Add one sample.
    #[inline]
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_sq += value * value;
        self.count += 1;
        if value > self.max {
            self.max = value;
        }
        if value < self.min {
            self.min = value;
        }
        self.bins[bin_index(value)] += 1;
    }

    /// Compute `avg` and the sample standard deviation from the running sums.
    ///
    /// With fewer than two samples the standard deviation is NaN (and with
    /// zero samples so is the average). This never panics.
    pub fn finalize(&mut self) {
        let count = self.count as f64;
        self.avg = self.sum / count;
        let variance = (self.sum_sq - self.sum * self.sum / count) / (count - 1.0);
        // cancellation can leave a tiny negative for constant series; NaN passes through
        self.stdev = if variance < 0.0 { 0.0 } else { variance.sqrt() };
    }

    /// Estimate the `p` quantile (`0.99` is the 99th percentile) from the histogram.
    ///
    /// Bins are walked upwards until the running count strictly exceeds
    /// `count * p`; a running count equal to the target does not stop the
    /// walk. The result is interpolated linearly inside the selected bin.
    /// When no bin qualifies (including `p >= 1` or an empty accumulator)
    /// the upper edge of the last bin is returned.
    pub fn percentile(&self, p: f64) -> f64 {
        let target = self.count as f64 * p.clamp(0.0, 1.0);
        let mut running: u64 = 0;

        for (i, &in_bin) in self.bins.iter().enumerate() {
            if in_bin == 0 {
                continue;
            }
            running += in_bin;

            if running as f64 > target {
                let left = target - (running - in_bin) as f64;
                let low = bin_lower_bound(i);
                let high = bin_lower_bound(i + 1);
                return low + left / in_bin as f64 * (high - low);
            }
        }

        bin_lower_bound(NUM_BINS)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn sum_sq(&self) -> f64 {
        self.sum_sq
    }

    /// Smallest sample, `+inf` when empty.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest sample, `-inf` when empty.
    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn avg(&self) -> f64 {
        self.avg
    }

    pub fn stdev(&self) -> f64 {
        self.stdev
    }

    pub fn bins(&self) -> &[u64; NUM_BINS] {
        &self.bins
    }
}

impl Default for StatAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

//! Multi-band count histograms used as per-point shape descriptors.
//!
//! A histogram quantizes fixed-length feature vectors ("bands") into a dense
//! multi-dimensional grid. Each band has its own bin count and `[min, max)`
//! range; out-of-range values are clamped into the first or last bin, so
//! every accumulated sample lands somewhere.
//!
//! The grid is stored flat. Band indices are combined by mixed-radix
//! encoding, band 0 being the least significant digit:
//!
//! ```text
//! index = i₀ + bins₀·(i₁ + bins₁·(i₂ + …))
//! ```

use crate::error::{MatchError, Result};

// ── Binning scheme ──────────────────────────────────────────────────────────

/// Quantization scheme shared by every histogram of a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Binning {
    bins: Vec<usize>,
    mins: Vec<f64>,
    maxes: Vec<f64>,
    size: usize,
}

impl Binning {
    /// Create a binning scheme with one entry per band in each slice.
    ///
    /// Rejects empty or inconsistent band lists, zero-bin bands and
    /// empty or non-finite ranges.
    pub fn new(bins: Vec<usize>, mins: Vec<f64>, maxes: Vec<f64>) -> Result<Self> {
        if bins.is_empty() {
            return Err(MatchError::InvalidBinning("no bands".to_string()));
        }
        if mins.len() != bins.len() || maxes.len() != bins.len() {
            return Err(MatchError::InvalidBinning(format!(
                "{} bin counts, {} minimums, {} maximums",
                bins.len(),
                mins.len(),
                maxes.len()
            )));
        }
        for band in 0..bins.len() {
            if bins[band] == 0 {
                return Err(MatchError::InvalidBinning(format!(
                    "band {} has zero bins",
                    band
                )));
            }
            let (lo, hi) = (mins[band], maxes[band]);
            if !lo.is_finite() || !hi.is_finite() || hi <= lo {
                return Err(MatchError::InvalidBinning(format!(
                    "band {} has range [{}, {})",
                    band, lo, hi
                )));
            }
        }
        let size = bins
            .iter()
            .try_fold(1usize, |acc, &b| acc.checked_mul(b))
            .ok_or_else(|| MatchError::InvalidBinning("bin grid overflows usize".to_string()))?;
        Ok(Self {
            bins,
            mins,
            maxes,
            size,
        })
    }

    /// Number of feature dimensions.
    pub fn bands(&self) -> usize {
        self.bins.len()
    }

    /// Total number of cells in the flat grid (product of per-band bins).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bins(&self) -> &[usize] {
        &self.bins
    }

    /// Flat grid index of a feature vector.
    ///
    /// Fails with [`MatchError::DimensionMismatch`] unless `features` has
    /// exactly one value per band.
    pub fn flat_index(&self, features: &[f64]) -> Result<usize> {
        if features.len() != self.bands() {
            return Err(MatchError::DimensionMismatch {
                expected: self.bands(),
                got: features.len(),
            });
        }
        let mut stride = 1usize;
        let mut index = 0usize;
        for (band, &value) in features.iter().enumerate() {
            let sub = quantize(value, self.bins[band], self.mins[band], self.maxes[band]);
            index += stride * sub;
            stride *= self.bins[band];
        }
        Ok(index)
    }
}

/// Linear bin index of `value` in `[min, max)` split into `bins` bins.
///
/// The result is clamped to `[0, bins - 1]`: values at or above `max`
/// saturate into the last bin, values below `min` (and NaN) fall in bin 0.
#[inline]
pub fn quantize(value: f64, bins: usize, min: f64, max: f64) -> usize {
    let scaled = ((value - min) / (max - min) * bins as f64).floor();
    if !(scaled > 0.0) {
        return 0;
    }
    // `as` saturates on overflow, so huge values still clamp correctly
    (scaled as usize).min(bins.saturating_sub(1))
}

// ── Histogram ───────────────────────────────────────────────────────────────

/// Accumulating count histogram over a [`Binning`].
///
/// Histograms only grow; there is no removal.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeHistogram {
    binning: Binning,
    counts: Vec<u32>,
    total: u64,
}

impl ShapeHistogram {
    /// Create an empty histogram. Empty histograms stand in for dummy points.
    pub fn new(binning: Binning) -> Self {
        let counts = vec![0; binning.size()];
        Self {
            binning,
            counts,
            total: 0,
        }
    }

    /// Add one feature sample, incrementing the bin it quantizes into.
    ///
    /// On a dimension mismatch the histogram is left untouched.
    pub fn add_point(&mut self, features: &[f64]) -> Result<()> {
        let index = self.binning.flat_index(features)?;
        self.counts[index] += 1;
        self.total += 1;
        Ok(())
    }

    /// Flat bin counts, indexed as described in the module docs.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Number of samples accumulated so far (the sum of all counts).
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn binning(&self) -> &Binning {
        &self.binning
    }

    /// Symmetric chi-square statistic `½ Σ (a-b)² / (a+b)` against `other`.
    ///
    /// Bins holding equal counts contribute nothing, which also covers the
    /// empty/empty case.
    pub fn chi_square(&self, other: &ShapeHistogram) -> Result<f64> {
        if self.counts.len() != other.counts.len() {
            return Err(MatchError::BinningMismatch {
                first: self.counts.len(),
                second: other.counts.len(),
            });
        }
        let mut sum = 0.0;
        for (&a, &b) in self.counts.iter().zip(&other.counts) {
            if a == b {
                continue;
            }
            let diff = a as f64 - b as f64;
            sum += diff * diff / (a as f64 + b as f64);
        }
        Ok(0.5 * sum)
    }
}

//! Per-point shape descriptors.
//!
//! A [`FeatureExtractor`] turns a shape into one [`ShapeHistogram`] per
//! point. The matcher only relies on the histograms, so the geometric basis
//! of the features is pluggable. The default is the classical log-polar
//! shape context ([`LogPolar`]): for every point, the distances and directions
//! of all other points, binned uniformly in log-distance and angle.
//!
//! Both shapes of a match are described at the same resolution, the padded
//! slot count N = max(|A|, |B|). Extractors may refine their binning as N
//! grows, so denser ink gets finer descriptors.

use std::f64::consts::TAU;

use crate::error::{MatchError, Result};
use crate::histogram::{Binning, ShapeHistogram};
use crate::point::{mean_pairwise_distance, Point};

/// Strategy that builds a descriptor histogram for every point of a shape.
pub trait FeatureExtractor {
    /// Binning shared by every histogram produced at `resolution`.
    fn binning(&self, resolution: usize) -> Result<Binning>;

    /// One histogram per point of `points`, in the same order, over
    /// [`binning(resolution)`](Self::binning).
    fn describe(&self, points: &[Point], resolution: usize) -> Result<Vec<ShapeHistogram>>;
}

/// Describe `points` at resolution `slots` and pad the result with empty
/// histograms up to `slots`.
///
/// The empty histograms are the dummy points used to square the cost matrix
/// when two shapes differ in size. Never truncates; `slots` below
/// `points.len()` is raised to it.
pub fn descriptors<E: FeatureExtractor + ?Sized>(
    extractor: &E,
    points: &[Point],
    slots: usize,
) -> Result<Vec<ShapeHistogram>> {
    let resolution = slots.max(points.len());
    let mut histograms = extractor.describe(points, resolution)?;
    if histograms.len() < resolution {
        let dummy = ShapeHistogram::new(extractor.binning(resolution)?);
        histograms.resize(resolution, dummy);
    }
    Ok(histograms)
}

// ── Log-polar shape context ─────────────────────────────────────────────────

/// Parameters of the log-polar shape context.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPolarConfig {
    /// Number of log-distance bins. Default 5.
    pub radial_bins: usize,
    /// Angle bins over the full turn for small shapes. Default 12.
    pub angular_bins: usize,
    /// Cap on the angle bins for dense shapes. Default 36.
    pub max_angular_bins: usize,
    /// Resolution per angle bin once the resolution outgrows
    /// `angular_bins`: a match at resolution N uses
    /// `clamp(N / points_per_angular_bin, angular_bins, max_angular_bins)`
    /// angle bins. Default 2.
    pub points_per_angular_bin: usize,
    /// Innermost bin edge, as a fraction of the shape's mean pairwise
    /// distance. Closer points saturate into the first radial bin. Default 0.125.
    pub inner_radius: f64,
    /// Outermost bin edge, as a fraction of the mean pairwise distance.
    /// Farther points saturate into the last radial bin. Default 2.0.
    pub outer_radius: f64,
}

impl Default for LogPolarConfig {
    fn default() -> Self {
        Self {
            radial_bins: 5,
            angular_bins: 12,
            max_angular_bins: 36,
            points_per_angular_bin: 2,
            inner_radius: 0.125,
            outer_radius: 2.0,
        }
    }
}

/// Log-polar shape context extractor.
///
/// Distances are normalized by the mean pairwise distance of the shape, so
/// the descriptor is invariant to translation and uniform scale. Angles are
/// absolute, so it is not rotation invariant.
#[derive(Debug, Clone)]
pub struct LogPolar {
    config: LogPolarConfig,
}

impl LogPolar {
    pub fn new(config: LogPolarConfig) -> Result<Self> {
        if config.points_per_angular_bin == 0 {
            return Err(MatchError::InvalidBinning(
                "points_per_angular_bin must be positive".to_string(),
            ));
        }
        if config.max_angular_bins < config.angular_bins {
            return Err(MatchError::InvalidBinning(format!(
                "max_angular_bins {} below angular_bins {}",
                config.max_angular_bins, config.angular_bins
            )));
        }
        let lp = Self { config };
        // ln of a non-positive radius is -inf/NaN, which Binning rejects
        lp.binning(0)?;
        Ok(lp)
    }

    pub fn config(&self) -> &LogPolarConfig {
        &self.config
    }

    /// Angle bins used at `resolution`.
    pub fn angular_bins_at(&self, resolution: usize) -> usize {
        (resolution / self.config.points_per_angular_bin)
            .clamp(self.config.angular_bins, self.config.max_angular_bins)
    }
}

impl FeatureExtractor for LogPolar {
    fn binning(&self, resolution: usize) -> Result<Binning> {
        Binning::new(
            vec![self.config.radial_bins, self.angular_bins_at(resolution)],
            vec![self.config.inner_radius.ln(), 0.0],
            vec![self.config.outer_radius.ln(), TAU],
        )
    }

    fn describe(&self, points: &[Point], resolution: usize) -> Result<Vec<ShapeHistogram>> {
        let binning = self.binning(resolution)?;
        let mean = mean_pairwise_distance(points);
        // A shape collapsed onto one location has no scale to normalize by
        let scale = if mean > 0.0 { mean } else { 1.0 };

        let mut histograms = Vec::with_capacity(points.len());
        for (i, origin) in points.iter().enumerate() {
            let mut hist = ShapeHistogram::new(binning.clone());
            for (j, other) in points.iter().enumerate() {
                if i == j {
                    continue;
                }
                let r = origin.distance(other) / scale;
                hist.add_point(&[r.ln(), origin.angle_to(other)])?;
            }
            histograms.push(hist);
        }
        Ok(histograms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrow() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 1.0),
            Point::new(1.0, 3.0),
            Point::new(0.0, 2.0),
        ]
    }

    #[test]
    fn test_each_point_counts_all_others() {
        let lp = LogPolar::new(LogPolarConfig::default()).unwrap();
        let shape = arrow();
        let hists = lp.describe(&shape, shape.len()).unwrap();
        assert_eq!(hists.len(), shape.len());
        for h in &hists {
            assert_eq!(h.total(), (shape.len() - 1) as u64);
            assert_eq!(h.counts().len(), 5 * 12);
        }
    }

    #[test]
    fn test_padding_with_dummies() {
        let lp = LogPolar::new(LogPolarConfig::default()).unwrap();
        let hists = descriptors(&lp, &arrow(), 8).unwrap();
        assert_eq!(hists.len(), 8);
        assert!(hists[..5].iter().all(|h| !h.is_empty()));
        assert!(hists[5..].iter().all(|h| h.is_empty()));

        // Fewer slots than points never truncates
        assert_eq!(descriptors(&lp, &arrow(), 2).unwrap().len(), 5);
    }

    #[test]
    fn test_translation_and_scale_invariance() {
        let lp = LogPolar::new(LogPolarConfig::default()).unwrap();
        let shape = arrow();
        let moved: Vec<Point> = shape
            .iter()
            .map(|p| Point::new(2.0 * p.x + 0.5, 2.0 * p.y - 1.5))
            .collect();
        let a = lp.describe(&shape, shape.len()).unwrap();
        let b = lp.describe(&moved, moved.len()).unwrap();
        for (ha, hb) in a.iter().zip(&b) {
            assert_eq!(ha.counts(), hb.counts());
        }
    }

    #[test]
    fn test_points_get_distinct_contexts() {
        let lp = LogPolar::new(LogPolarConfig::default()).unwrap();
        let hists = lp.describe(&arrow(), 5).unwrap();
        for i in 0..hists.len() {
            for j in (i + 1)..hists.len() {
                let d = hists[i].chi_square(&hists[j]).unwrap();
                assert!(d > 0.0, "points {} and {} share a descriptor", i, j);
            }
        }
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let config = LogPolarConfig {
            inner_radius: 0.0,
            ..Default::default()
        };
        assert!(LogPolar::new(config).is_err());
    }

    #[test]
    fn test_binning_follows_resolution() {
        let lp = LogPolar::new(LogPolarConfig::default()).unwrap();
        // Small shapes keep the base 5×12 layout
        assert_eq!(lp.binning(6).unwrap().size(), 5 * 12);
        assert_eq!(lp.binning(24).unwrap().size(), 5 * 12);
        // Denser ink gets more angle bins, up to the cap
        assert_eq!(lp.angular_bins_at(40), 20);
        assert_eq!(lp.binning(40).unwrap().size(), 5 * 20);
        assert_eq!(lp.binning(500).unwrap().size(), 5 * 36);

        // Both shapes of a match share the binning of the padded resolution
        let hists = descriptors(&lp, &arrow(), 40).unwrap();
        assert_eq!(hists.len(), 40);
        assert!(hists.iter().all(|h| h.counts().len() == 100));
        assert_eq!(hists[0].total(), 4);
    }

    #[test]
    fn test_invalid_angular_growth_rejected() {
        let config = LogPolarConfig {
            points_per_angular_bin: 0,
            ..Default::default()
        };
        assert!(matches!(
            LogPolar::new(config),
            Err(MatchError::InvalidBinning(_))
        ));
        let config = LogPolarConfig {
            max_angular_bins: 8,
            ..Default::default()
        };
        assert!(matches!(
            LogPolar::new(config),
            Err(MatchError::InvalidBinning(_))
        ));
    }
}

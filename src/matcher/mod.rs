//! Shape-context matching of two point sets.
//!
//! The matcher scores how well one shape can be deformed into another:
//!
//! 1. **Descriptors**: every point gets a histogram of where the other points
//!    of its shape lie. The smaller shape is padded with empty (dummy)
//!    histograms so both sets have N = max(|A|, |B|) entries.
//! 2. **Cost matrix**: chi-square distance between every pair of descriptors.
//! 3. **Assignment**: Munkres finds the minimum-cost one-to-one pairing.
//!    Pairs touching a dummy are dropped, leaving n = min(|A|, |B|) real
//!    correspondences.
//! 4. **Registration**: a thin-plate spline is fitted from the matched points
//!    of A onto their partners in B.
//! 5. **Distance**: `1.6·bending + shape_context_cost + 0.3·affine_distortion`.
//!
//! Reference: S. Belongie, J. Malik, J. Puzicha, "Shape Matching and Object
//! Recognition Using Shape Contexts", IEEE PAMI 24(4), 2002.

pub mod cost;
pub mod munkres;
pub mod rank;
pub mod spline;

use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::descriptor::{descriptors, FeatureExtractor, LogPolar, LogPolarConfig};
use crate::error::{MatchError, Result};
use crate::linalg::{LinearAlgebra, Nalgebra};
use crate::point::Point;

pub use cost::TieBreak;
pub use munkres::{Assignment, SolveLimits};
pub use rank::RankedTemplate;
pub use spline::SplineFit;

// ── Configuration ───────────────────────────────────────────────────────────

/// Parameters controlling a match.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Log-polar descriptor layout used by [`ShapeMatcher::new`].
    pub descriptor: LogPolarConfig,
    /// Weight of the bending energy in the final distance. Default 1.6.
    pub bending_weight: f64,
    /// Weight of the affine distortion in the final distance. Default 0.3.
    pub affine_weight: f64,
    /// Tie-breaking applied to the cost matrix. Default: none (deterministic).
    pub tie_break: TieBreak,
    /// Deadline for the assignment solver, measured from the start of the
    /// match. None = no deadline. Default None.
    pub timeout_ms: Option<u64>,
    /// Smallest reciprocal condition number accepted when inverting the
    /// spline system. Default 1e-12.
    pub rcond: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            descriptor: LogPolarConfig::default(),
            bending_weight: 1.6,
            affine_weight: 0.3,
            tie_break: TieBreak::None,
            timeout_ms: None,
            rcond: 1e-12,
        }
    }
}

// ── Result ──────────────────────────────────────────────────────────────────

/// Outcome of matching shape A against shape B.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Weighted combination of the energies below.
    pub distance: f64,
    /// Non-affine deformation of the fitted spline.
    pub bending_energy: f64,
    /// `ln` condition number of the spline's linear part.
    pub affine_distortion: f64,
    /// Larger of the mean row minimum and mean column minimum of the cost matrix.
    pub shape_context_cost: f64,
    /// Mean descriptor cost over the real correspondences.
    pub matched_cost: f64,
    /// Mean distance between warped A points and their B partners.
    pub warp_error: f64,
    /// Real correspondences `(index in A, index in B)`, ordered by A index.
    pub correspondences: Vec<(usize, usize)>,
    /// Wall-clock time spent on the match.
    pub match_time_ms: f32,
}

// ── Matcher ─────────────────────────────────────────────────────────────────

/// Computes shape-context distances.
///
/// Holds no per-match state, so one matcher can be shared across threads.
#[derive(Debug, Clone)]
pub struct ShapeMatcher<E = LogPolar, B = Nalgebra> {
    extractor: E,
    backend: B,
    config: MatchConfig,
}

impl ShapeMatcher {
    /// Matcher using the log-polar descriptor and nalgebra backend
    /// described by `config`.
    pub fn new(config: MatchConfig) -> Result<Self> {
        let extractor = LogPolar::new(config.descriptor.clone())?;
        let backend = Nalgebra {
            rcond: config.rcond,
        };
        Ok(Self {
            extractor,
            backend,
            config,
        })
    }
}

impl<E: FeatureExtractor, B: LinearAlgebra> ShapeMatcher<E, B> {
    /// Matcher with a custom descriptor strategy and numeric backend.
    ///
    /// `config.descriptor` and `config.rcond` are ignored here; the parts
    /// carry their own settings.
    pub fn with_parts(extractor: E, backend: B, config: MatchConfig) -> Self {
        Self {
            extractor,
            backend,
            config,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Match `a` against `b`, returning every intermediate score.
    pub fn match_shapes(&self, a: &[Point], b: &[Point]) -> Result<MatchResult> {
        self.run(a, b, None)
    }

    /// Like [`match_shapes`](Self::match_shapes), aborting with
    /// [`MatchError::Cancelled`] once `cancel` is set.
    pub fn match_shapes_cancellable(
        &self,
        a: &[Point],
        b: &[Point],
        cancel: &AtomicBool,
    ) -> Result<MatchResult> {
        self.run(a, b, Some(cancel))
    }

    /// Only the combined distance of [`match_shapes`](Self::match_shapes).
    pub fn distance(&self, a: &[Point], b: &[Point]) -> Result<f64> {
        self.match_shapes(a, b).map(|r| r.distance)
    }

    fn run(&self, a: &[Point], b: &[Point], cancel: Option<&AtomicBool>) -> Result<MatchResult> {
        let t0 = Instant::now();

        if a.is_empty() {
            return Err(MatchError::EmptyShape { which: "first" });
        }
        if b.is_empty() {
            return Err(MatchError::EmptyShape { which: "second" });
        }
        let big_n = a.len().max(b.len());
        let n = a.len().min(b.len());

        // ── Descriptors and costs over N slots (dummies included) ──
        let hist_a = descriptors(&self.extractor, a, big_n)?;
        let hist_b = descriptors(&self.extractor, b, big_n)?;
        let costs = cost::cost_matrix(&hist_a, &hist_b, self.config.tie_break)?;

        let limits = SolveLimits {
            deadline: self
                .config
                .timeout_ms
                .map(|ms| t0 + Duration::from_millis(ms)),
            cancel,
        };
        let assignment = munkres::solve_with_limits(&costs, &limits)?;

        // ── Keep the real correspondences only ──
        let correspondences = assignment.real_pairs(a.len(), b.len());
        let source: Vec<Point> = correspondences.iter().map(|&(i, _)| a[i]).collect();
        let target: Vec<Point> = correspondences.iter().map(|&(_, j)| b[j]).collect();

        // ── Non-rigid registration ──
        let beta = spline::regularization(&source);
        let fit = spline::fit(&source, &target, beta, &self.backend)?;
        let warped = fit.warp(&source);
        let warp_error = warped
            .iter()
            .zip(&target)
            .map(|(w, t)| w.distance(t))
            .sum::<f64>()
            / n as f64;

        let shape_context_cost = cost::shape_context_cost(&costs);
        let matched_cost = cost::matched_cost(&costs, &assignment, a.len(), b.len());
        let distance = self.config.bending_weight * fit.bending_energy
            + shape_context_cost
            + self.config.affine_weight * fit.affine_distortion;

        let match_time_ms = elapsed_ms(t0);
        debug!(
            "Matched {} vs {} points: bending={:.4e}, affine={:.4e}, sc={:.4}, distance={:.4} ({:.2} ms)",
            a.len(),
            b.len(),
            fit.bending_energy,
            fit.affine_distortion,
            shape_context_cost,
            distance,
            match_time_ms
        );

        Ok(MatchResult {
            distance,
            bending_energy: fit.bending_energy,
            affine_distortion: fit.affine_distortion,
            shape_context_cost,
            matched_cost,
            warp_error,
            correspondences,
            match_time_ms,
        })
    }
}

/// Shape-context distance between `a` and `b` with the default configuration.
pub fn match_distance(a: &[Point], b: &[Point]) -> Result<f64> {
    ShapeMatcher::new(MatchConfig::default())?.distance(a, b)
}

fn elapsed_ms(t0: Instant) -> f32 {
    t0.elapsed().as_secs_f32() * 1000.0
}

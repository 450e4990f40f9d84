//! Thin-plate-spline registration (Bookstein).
//!
//! Given paired source and target points, fit the smooth map
//!
//! ```text
//! f(p) = a₀ + a₁·x + a₂·y + Σᵢ wᵢ · (U(|p - xᵢ|²) + β),   U(r²) = r²·ln r²
//! ```
//!
//! taking every source point exactly onto its target. The coefficients come
//! from one (N+3)×(N+3) linear system:
//!
//! ```text
//! ┌ K + β   P ┐ ┌ w ┐   ┌ v ┐
//! └ Pᵀ      0 ┘ └ a ┘ = └ 0 ┘      P = [1 x y]
//! ```
//!
//! Two scalars summarise the fit: the bending energy `tr(wᵀ K w) / N`
//! (zero for a purely affine map) and the affine distortion
//! `ln cond([a₁ a₂])` (zero for a similarity transform).
//!
//! The system is solved on source coordinates centred and scaled to unit
//! spread, then mapped back, so device-sized coordinates stay well
//! conditioned. Collinear or duplicated source points make the system
//! singular; that is reported as an error rather than producing NaNs.

use nalgebra::{DMatrix, DMatrixView, Matrix2, Vector2};
use tracing::debug;

use crate::error::{MatchError, Result};
use crate::linalg::LinearAlgebra;
use crate::point::{centroid, mean_pairwise_distance, Point};

/// Radial basis `U(r²) = r²·ln r²`, with `U(0) = 0`.
#[inline]
pub fn kernel(r2: f64) -> f64 {
    if r2 > 0.0 {
        r2 * r2.ln()
    } else {
        0.0
    }
}

/// Default regularization for a source point set: its squared mean
/// pairwise distance.
pub fn regularization(points: &[Point]) -> f64 {
    let d = mean_pairwise_distance(points);
    d * d
}

/// A fitted thin-plate spline.
#[derive(Debug, Clone)]
pub struct SplineFit {
    control_points: Vec<Point>,
    /// (N+3)×2: rows `0..N` are warp weights, row `N` the translation,
    /// rows `N+1` and `N+2` the x and y linear terms.
    coefficients: DMatrix<f64>,
    regularization: f64,
    /// Non-affine deformation, `tr(wᵀ K w) / N`.
    pub bending_energy: f64,
    /// `ln` of the condition number of the 2×2 linear part.
    pub affine_distortion: f64,
}

/// Fit a thin-plate spline taking `source[i]` onto `target[i]`.
///
/// `beta` is added to every kernel entry; [`regularization`] gives the
/// usual choice.
pub fn fit<B: LinearAlgebra + ?Sized>(
    source: &[Point],
    target: &[Point],
    beta: f64,
    backend: &B,
) -> Result<SplineFit> {
    if source.is_empty() {
        return Err(MatchError::EmptyShape { which: "source" });
    }
    if source.len() != target.len() {
        return Err(MatchError::CorrespondenceMismatch {
            sources: source.len(),
            targets: target.len(),
        });
    }
    let n = source.len();

    // Solve in a frame centred on the source centroid and scaled by the mean
    // pairwise distance. In device units the kernel block grows like r²·ln r²
    // while the border stays [1 x y], which wrecks the condition number of L
    // without the configuration being degenerate.
    let center = centroid(source);
    let spread = mean_pairwise_distance(source);
    let scale = if spread > 0.0 { spread } else { 1.0 };
    let local: Vec<Point> = source
        .iter()
        .map(|p| Point::new((p.x - center.x) / scale, (p.y - center.y) / scale))
        .collect();
    let s2 = scale * scale;

    // Kernel matrix. The diagonal term r²·ln(r²+1) vanishes since r² = 0.
    let mut k = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let u = kernel(local[i].distance_squared(&local[j]));
            k[(i, j)] = u;
            k[(j, i)] = u;
        }
    }

    let local_beta = beta / s2;
    let mut l = DMatrix::<f64>::zeros(n + 3, n + 3);
    for i in 0..n {
        for j in 0..n {
            l[(i, j)] = k[(i, j)] + local_beta;
        }
        let p = local[i];
        for (col, basis) in [(n, 1.0), (n + 1, p.x), (n + 2, p.y)] {
            l[(i, col)] = basis;
            l[(col, i)] = basis;
        }
    }

    let v = DMatrix::<f64>::from_fn(n + 3, 2, |row, col| match (row < n, col) {
        (true, 0) => target[row].x,
        (true, _) => target[row].y,
        (false, _) => 0.0,
    });

    let l_inv = backend.invert(&l).ok_or_else(|| {
        debug!("Spline system for {} points is singular (beta={:.3e})", n, beta);
        MatchError::SingularSystem { points: n }
    })?;
    let local_coefficients = l_inv * v;

    // Affine rows of the solution are zero in the bordered kernel, so only
    // the warp weights enter the energy. U(s²r²) = s²·U(r²) + s²·ln s²·r²,
    // and the second term vanishes against weights orthogonal to [1 x y].
    let w = local_coefficients.rows(0, n).into_owned();
    let q = w.transpose() * &k * &w;
    let bending_energy = q.trace() / (n as f64 * s2);

    let coefficients = to_device_frame(&local_coefficients, &local, center, scale);

    let linear = DMatrix::from_row_slice(
        2,
        2,
        &[
            coefficients[(n + 1, 0)],
            coefficients[(n + 1, 1)],
            coefficients[(n + 2, 0)],
            coefficients[(n + 2, 1)],
        ],
    );
    let cond = backend.condition_number(&linear);
    if !cond.is_finite() {
        return Err(MatchError::DegenerateAffine);
    }
    let affine_distortion = cond.ln();

    Ok(SplineFit {
        control_points: source.to_vec(),
        coefficients,
        regularization: beta,
        bending_energy,
        affine_distortion,
    })
}

/// Rewrite coefficients solved on `local = (source - center) / scale` so
/// they apply to device coordinates with the unscaled kernel.
fn to_device_frame(
    local_coefficients: &DMatrix<f64>,
    local: &[Point],
    center: Point,
    scale: f64,
) -> DMatrix<f64> {
    let n = local.len();
    let s2 = scale * scale;
    let mut c = local_coefficients.clone();
    for dim in 0..2 {
        // Σ wᵢ·U(|p̂ - x̂ᵢ|²) = Σ (wᵢ/s²)·U(|p - xᵢ|²) - ln s² · Σ wᵢ·|x̂ᵢ|²
        let mut offset = 0.0;
        for (i, p) in local.iter().enumerate() {
            offset += local_coefficients[(i, dim)] * (p.x * p.x + p.y * p.y);
            c[(i, dim)] = local_coefficients[(i, dim)] / s2;
        }
        let ax = local_coefficients[(n + 1, dim)] / scale;
        let ay = local_coefficients[(n + 2, dim)] / scale;
        c[(n, dim)] = local_coefficients[(n, dim)] - ax * center.x - ay * center.y
            - s2.ln() * offset;
        c[(n + 1, dim)] = ax;
        c[(n + 2, dim)] = ay;
    }
    c
}

impl SplineFit {
    /// Map one point through the spline.
    pub fn transform(&self, p: Point) -> Point {
        let n = self.control_points.len();
        let c = &self.coefficients;
        let mut x = c[(n, 0)] + c[(n + 1, 0)] * p.x + c[(n + 2, 0)] * p.y;
        let mut y = c[(n, 1)] + c[(n + 1, 1)] * p.x + c[(n + 2, 1)] * p.y;
        for (i, cp) in self.control_points.iter().enumerate() {
            let u = kernel(p.distance_squared(cp)) + self.regularization;
            x += c[(i, 0)] * u;
            y += c[(i, 1)] * u;
        }
        Point::new(x, y)
    }

    /// Map every point of `points` through the spline.
    pub fn warp(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|&p| self.transform(p)).collect()
    }

    /// Linear part `M` of the affine component, `f(p) ≈ M·p + t` far from
    /// the control points.
    pub fn affine(&self) -> Matrix2<f64> {
        let n = self.control_points.len();
        let c = &self.coefficients;
        Matrix2::new(
            c[(n + 1, 0)],
            c[(n + 2, 0)],
            c[(n + 1, 1)],
            c[(n + 2, 1)],
        )
    }

    /// Translation `t` of the affine component.
    pub fn translation(&self) -> Vector2<f64> {
        let n = self.control_points.len();
        Vector2::new(self.coefficients[(n, 0)], self.coefficients[(n, 1)])
    }

    /// N×2 non-affine warp weights.
    pub fn weights(&self) -> DMatrixView<'_, f64> {
        self.coefficients.rows(0, self.control_points.len())
    }

    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    pub fn control_points(&self) -> &[Point] {
        &self.control_points
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }
}

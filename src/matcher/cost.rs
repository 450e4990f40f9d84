//! Cost matrix between two shapes' descriptors, and its summaries.
//!
//! Entry `(i, j)` is the chi-square distance between descriptor `i` of the
//! first shape and descriptor `j` of the second. Both descriptor sets are
//! padded to the same length beforehand, so the matrix is always square and
//! dummy rows/columns get finite costs (half the sample count of the real
//! descriptor they are compared against).

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{MatchError, Result};
use crate::histogram::ShapeHistogram;

use super::munkres::Assignment;

/// How ties between equal costs are broken.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TieBreak {
    /// No perturbation; identical inputs give identical matrices.
    #[default]
    None,
    /// Add a uniform `[0, amplitude)` offset to every entry, drawn from a
    /// generator seeded with `seed` so runs remain reproducible.
    Jitter { seed: u64, amplitude: f64 },
}

/// Pairwise chi-square costs between two equal-length descriptor sets.
pub fn cost_matrix(
    first: &[ShapeHistogram],
    second: &[ShapeHistogram],
    tie_break: TieBreak,
) -> Result<DMatrix<f64>> {
    if first.len() != second.len() {
        return Err(MatchError::HistogramCountMismatch {
            first: first.len(),
            second: second.len(),
        });
    }
    let n = first.len();
    let mut costs = DMatrix::<f64>::zeros(n, n);
    for (i, h1) in first.iter().enumerate() {
        for (j, h2) in second.iter().enumerate() {
            costs[(i, j)] = h1.chi_square(h2)?;
        }
    }

    if let TieBreak::Jitter { seed, amplitude } = tie_break {
        if amplitude > 0.0 && amplitude.is_finite() {
            let mut rng = StdRng::seed_from_u64(seed);
            for i in 0..n {
                for j in 0..n {
                    costs[(i, j)] += rng.random_range(0.0..amplitude);
                }
            }
        }
    }
    Ok(costs)
}

/// Shape-context cost: the larger of the mean row minimum and the mean
/// column minimum. Zero for an empty matrix.
pub fn shape_context_cost(costs: &DMatrix<f64>) -> f64 {
    if costs.is_empty() {
        return 0.0;
    }
    let row_mean = costs.row_iter().map(|row| row.min()).sum::<f64>() / costs.nrows() as f64;
    let col_mean =
        costs.column_iter().map(|col| col.min()).sum::<f64>() / costs.ncols() as f64;
    row_mean.max(col_mean)
}

/// Mean cost over the assigned pairs that link two real points.
///
/// Rows at or beyond `first_len` and columns at or beyond `second_len` are
/// dummies and are left out. The sum is divided by the number of real
/// correspondences, `min(first_len, second_len)`.
pub fn matched_cost(
    costs: &DMatrix<f64>,
    assignment: &Assignment,
    first_len: usize,
    second_len: usize,
) -> f64 {
    let count = first_len.min(second_len);
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = assignment
        .pairs()
        .filter(|&(row, col)| row < first_len && col < second_len)
        .map(|(row, col)| costs[(row, col)])
        .sum();
    sum / count as f64
}

//! Minimum-cost assignment on a square cost matrix (Hungarian / Munkres).
//!
//! The solver is a state machine. Each [`Step`] value is fed to a transition
//! function that mutates the working matrices and returns the next step:
//!
//! ```text
//! ReduceRows → StarZeros → CoverStarredColumns ─(all covered)→ Done
//!                                 ↑        │
//!                                 │        ↓
//!                 Augment ←── PrimeZeros ←── AdjustCosts
//!                                 └─(no zero)─→ AdjustCosts
//! ```
//!
//! The augmenting-path origin travels inside [`Step::Augment`], so a solver
//! holds no state outside its own stack frame and any number can run in
//! parallel.
//!
//! Runtime is O(N³). Limits (deadline, cancellation flag) are checked before
//! every transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nalgebra::DMatrix;
use tracing::trace;

use crate::error::{MatchError, Result};

// ── Assignment ──────────────────────────────────────────────────────────────

/// A permutation pairing every row of a square cost matrix with one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    mapping: Vec<usize>,
}

impl Assignment {
    /// Wrap a row → column mapping.
    pub fn from_mapping(mapping: Vec<usize>) -> Self {
        Self { mapping }
    }

    /// `mapping()[row]` is the column assigned to `row`.
    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// `(row, column)` pairs in row order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mapping.iter().copied().enumerate()
    }

    /// Sum of `costs[(row, mapping[row])]`.
    pub fn total_cost(&self, costs: &DMatrix<f64>) -> f64 {
        self.pairs().map(|(r, c)| costs[(r, c)]).sum()
    }

    /// Pairs linking a real row (`< rows`) to a real column (`< cols`).
    pub fn real_pairs(&self, rows: usize, cols: usize) -> Vec<(usize, usize)> {
        self.pairs().filter(|&(r, c)| r < rows && c < cols).collect()
    }

    pub fn into_inner(self) -> Vec<usize> {
        self.mapping
    }
}

// ── Limits ──────────────────────────────────────────────────────────────────

/// Optional bounds on how long a solve may run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveLimits<'a> {
    /// Abort with [`MatchError::Timeout`] once this instant has passed.
    pub deadline: Option<Instant>,
    /// Abort with [`MatchError::Cancelled`] once this flag is set.
    pub cancel: Option<&'a AtomicBool>,
}

impl SolveLimits<'_> {
    fn check(&self, steps: usize) -> Result<()> {
        if let Some(flag) = self.cancel {
            if flag.load(Ordering::Relaxed) {
                return Err(MatchError::Cancelled);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(MatchError::Timeout { steps });
            }
        }
        Ok(())
    }
}

// ── Entry points ────────────────────────────────────────────────────────────

/// Solve the assignment problem for a square cost matrix without limits.
pub fn solve(costs: &DMatrix<f64>) -> Result<Assignment> {
    solve_with_limits(costs, &SolveLimits::default())
}

/// Solve the assignment problem for a square cost matrix.
///
/// The returned mapping is a permutation of `0..N` minimising the summed
/// cost. Fails on non-square or non-finite input, or when a limit trips.
pub fn solve_with_limits(costs: &DMatrix<f64>, limits: &SolveLimits) -> Result<Assignment> {
    if !costs.is_square() {
        return Err(MatchError::NonSquareCostMatrix {
            rows: costs.nrows(),
            cols: costs.ncols(),
        });
    }
    for col in 0..costs.ncols() {
        for row in 0..costs.nrows() {
            if !costs[(row, col)].is_finite() {
                return Err(MatchError::NonFiniteCost { row, col });
            }
        }
    }

    let n = costs.nrows();
    if n == 0 {
        return Ok(Assignment::from_mapping(Vec::new()));
    }

    let mut solver = Solver::new(costs.clone());
    let mut step = Step::ReduceRows;
    let mut steps = 0usize;
    while step != Step::Done {
        limits.check(steps)?;
        step = solver.transition(step);
        steps += 1;
    }
    trace!("Munkres solved {}x{} in {} steps", n, n, steps);

    Ok(Assignment::from_mapping(solver.starred_mapping()?))
}

// ── State machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    ReduceRows,
    StarZeros,
    CoverStarredColumns,
    PrimeZeros,
    /// Augment along the alternating path starting at this primed zero.
    Augment { row: usize, col: usize },
    AdjustCosts,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    None,
    Star,
    Prime,
}

struct Solver {
    n: usize,
    costs: DMatrix<f64>,
    /// Row-major N×N marks.
    marks: Vec<Mark>,
    row_covered: Vec<bool>,
    col_covered: Vec<bool>,
}

impl Solver {
    fn new(costs: DMatrix<f64>) -> Self {
        let n = costs.nrows();
        Self {
            n,
            costs,
            marks: vec![Mark::None; n * n],
            row_covered: vec![false; n],
            col_covered: vec![false; n],
        }
    }

    #[inline]
    fn mark(&self, row: usize, col: usize) -> Mark {
        self.marks[row * self.n + col]
    }

    #[inline]
    fn set_mark(&mut self, row: usize, col: usize, mark: Mark) {
        self.marks[row * self.n + col] = mark;
    }

    fn transition(&mut self, step: Step) -> Step {
        match step {
            Step::ReduceRows => self.reduce_rows(),
            Step::StarZeros => self.star_zeros(),
            Step::CoverStarredColumns => self.cover_starred_columns(),
            Step::PrimeZeros => self.prime_zeros(),
            Step::Augment { row, col } => self.augment(row, col),
            Step::AdjustCosts => self.adjust_costs(),
            Step::Done => Step::Done,
        }
    }

    /// Subtract each row's minimum from the row.
    fn reduce_rows(&mut self) -> Step {
        for mut row in self.costs.row_iter_mut() {
            let min = row.min();
            row.add_scalar_mut(-min);
        }
        Step::StarZeros
    }

    /// Star one zero per row and column where possible.
    fn star_zeros(&mut self) -> Step {
        for row in 0..self.n {
            for col in 0..self.n {
                if self.costs[(row, col)] == 0.0 && !self.row_covered[row] && !self.col_covered[col]
                {
                    self.set_mark(row, col, Mark::Star);
                    self.row_covered[row] = true;
                    self.col_covered[col] = true;
                }
            }
        }
        self.clear_covers();
        Step::CoverStarredColumns
    }

    /// Cover starred columns; a full cover means the stars are optimal.
    fn cover_starred_columns(&mut self) -> Step {
        for row in 0..self.n {
            for col in 0..self.n {
                if self.mark(row, col) == Mark::Star {
                    self.col_covered[col] = true;
                }
            }
        }
        if self.col_covered.iter().all(|&c| c) {
            Step::Done
        } else {
            Step::PrimeZeros
        }
    }

    fn prime_zeros(&mut self) -> Step {
        loop {
            let Some((row, col)) = self.find_uncovered_zero() else {
                return Step::AdjustCosts;
            };
            self.set_mark(row, col, Mark::Prime);
            match self.star_in_row(row) {
                Some(star_col) => {
                    self.row_covered[row] = true;
                    self.col_covered[star_col] = false;
                }
                None => return Step::Augment { row, col },
            }
        }
    }

    /// Flip stars along the alternating prime/star path from `(row, col)`.
    fn augment(&mut self, row: usize, col: usize) -> Step {
        let mut path = vec![(row, col)];
        let mut col = col;
        while let Some(star_row) = self.star_in_col(col) {
            path.push((star_row, col));
            // A starred zero on the path always has a primed zero in its row
            let Some(prime_col) = self.prime_in_row(star_row) else {
                break;
            };
            path.push((star_row, prime_col));
            col = prime_col;
        }

        for &(r, c) in &path {
            let flipped = if self.mark(r, c) == Mark::Star {
                Mark::None
            } else {
                Mark::Star
            };
            self.set_mark(r, c, flipped);
        }
        self.clear_covers();
        for mark in self.marks.iter_mut() {
            if *mark == Mark::Prime {
                *mark = Mark::None;
            }
        }
        Step::CoverStarredColumns
    }

    /// Shift the smallest uncovered value out of the uncovered region.
    ///
    /// Equivalent to adding it to covered rows and subtracting it from
    /// uncovered columns, without touching cells where the two cancel.
    fn adjust_costs(&mut self) -> Step {
        let mut min = f64::INFINITY;
        for row in 0..self.n {
            if self.row_covered[row] {
                continue;
            }
            for col in 0..self.n {
                if !self.col_covered[col] && self.costs[(row, col)] < min {
                    min = self.costs[(row, col)];
                }
            }
        }
        for row in 0..self.n {
            for col in 0..self.n {
                match (self.row_covered[row], self.col_covered[col]) {
                    (true, true) => self.costs[(row, col)] += min,
                    (false, false) => self.costs[(row, col)] -= min,
                    _ => {}
                }
            }
        }
        Step::PrimeZeros
    }

    fn find_uncovered_zero(&self) -> Option<(usize, usize)> {
        for row in 0..self.n {
            if self.row_covered[row] {
                continue;
            }
            for col in 0..self.n {
                if !self.col_covered[col] && self.costs[(row, col)] == 0.0 {
                    return Some((row, col));
                }
            }
        }
        None
    }

    fn star_in_row(&self, row: usize) -> Option<usize> {
        (0..self.n).find(|&col| self.mark(row, col) == Mark::Star)
    }

    fn star_in_col(&self, col: usize) -> Option<usize> {
        (0..self.n).find(|&row| self.mark(row, col) == Mark::Star)
    }

    fn prime_in_row(&self, row: usize) -> Option<usize> {
        (0..self.n).find(|&col| self.mark(row, col) == Mark::Prime)
    }

    fn clear_covers(&mut self) {
        self.row_covered.fill(false);
        self.col_covered.fill(false);
    }

    /// Column starred in each row. Every row holds a star once the columns
    /// are fully covered.
    fn starred_mapping(&self) -> Result<Vec<usize>> {
        (0..self.n)
            .map(|row| {
                self.star_in_row(row)
                    .ok_or(MatchError::IncompleteAssignment { row })
            })
            .collect()
    }
}

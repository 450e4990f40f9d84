//! # shapematch
//!
//! Shape-context matching for hand-drawn ink, written in Rust.
//!
//! Given two ordered point sets (strokes or symbol outlines captured from a
//! pen), `shapematch` computes a scalar dissimilarity that a recognizer can
//! use to decide which template a user's ink most resembles. Capturing ink,
//! storing templates and picking acceptance thresholds are left to the
//! caller.
//!
//! ## Features
//!
//! - **Shape contexts**: per-point log-polar histograms, invariant to
//!   translation and uniform scale, behind a pluggable [`FeatureExtractor`]
//! - **Optimal correspondence**: Hungarian/Munkres assignment with dummy
//!   padding for shapes of different sizes, deadline and cancellation support
//! - **Non-rigid registration**: Bookstein thin-plate-spline fit reporting
//!   bending energy and affine distortion
//! - **Deterministic**: no hidden randomness; optional seeded tie-breaking
//! - **Reentrant**: no global state; a [`ShapeMatcher`] can be shared
//!   across threads, and template ranking can run on rayon (`parallel`
//!   feature)
//!
//! ## Example
//!
//! ```
//! use shapematch::{MatchConfig, Point, ShapeMatcher};
//!
//! let square = [
//!     Point::new(0.0, 0.0),
//!     Point::new(1.0, 0.0),
//!     Point::new(1.0, 1.0),
//!     Point::new(0.0, 1.0),
//! ];
//! let moved: Vec<Point> = square.iter().map(|p| Point::new(p.x + 5.0, p.y + 5.0)).collect();
//!
//! let matcher = ShapeMatcher::new(MatchConfig::default()).unwrap();
//! let result = matcher.match_shapes(&square, &moved).unwrap();
//! assert!(result.distance.abs() < 1e-6);
//! assert_eq!(result.correspondences, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
//! ```
//!
//! ## Algorithm overview
//!
//! 1. **Descriptors**: for each point, histogram the log-distance and angle
//!    of every other point; pad the smaller shape with empty histograms
//! 2. **Cost matrix**: chi-square distance between every descriptor pair
//! 3. **Assignment**: Munkres picks the minimum-cost one-to-one pairing;
//!    pairs involving padding are dropped
//! 4. **Registration**: fit a thin-plate spline from the matched points of
//!    the first shape onto the second
//! 5. **Distance**: `1.6·bending + shape_context_cost + 0.3·affine_distortion`
//!

pub mod descriptor;
mod error;
pub mod histogram;
pub mod linalg;
pub mod matcher;
mod point;

pub use descriptor::{FeatureExtractor, LogPolar, LogPolarConfig};
pub use error::{MatchError, Result};
pub use histogram::{Binning, ShapeHistogram};
pub use linalg::{LinearAlgebra, Nalgebra};
pub use matcher::{
    match_distance, Assignment, MatchConfig, MatchResult, RankedTemplate, ShapeMatcher,
    SplineFit, TieBreak,
};
pub use point::*;

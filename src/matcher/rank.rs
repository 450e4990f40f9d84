//! Rank a query shape against a library of templates.
//!
//! Each template is matched independently, so with the `parallel` feature
//! the matches are spread over the rayon thread pool. Templates whose match
//! fails (empty, degenerate) are skipped; choosing a cut-off distance is
//! left to the caller.

use tracing::debug;

use crate::descriptor::FeatureExtractor;
use crate::linalg::LinearAlgebra;
use crate::point::Point;

use super::ShapeMatcher;

/// A template's position in the input slice and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedTemplate {
    pub index: usize,
    pub distance: f64,
}

impl<E, B> ShapeMatcher<E, B>
where
    E: FeatureExtractor + Sync,
    B: LinearAlgebra + Sync,
{
    /// Distances from `query` to every template, closest first.
    ///
    /// Ties are ordered by template index. Templates that cannot be matched
    /// are left out of the result.
    pub fn rank<T: AsRef<[Point]> + Sync>(
        &self,
        query: &[Point],
        templates: &[T],
    ) -> Vec<RankedTemplate> {
        let score = |(index, template): (usize, &T)| match self.distance(query, template.as_ref())
        {
            Ok(distance) => Some(RankedTemplate { index, distance }),
            Err(e) => {
                debug!("Skipping template {}: {}", index, e);
                None
            }
        };

        #[cfg(feature = "parallel")]
        let mut ranked: Vec<RankedTemplate> = {
            use rayon::prelude::*;
            templates.par_iter().enumerate().filter_map(score).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let mut ranked: Vec<RankedTemplate> =
            templates.iter().enumerate().filter_map(score).collect();

        ranked.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
        ranked
    }

    /// The closest template, if any could be matched.
    pub fn best_match<T: AsRef<[Point]> + Sync>(
        &self,
        query: &[Point],
        templates: &[T],
    ) -> Option<RankedTemplate> {
        self.rank(query, templates).into_iter().next()
    }
}

//! Latin Hypercube design generation
//!
//! ## Algorithm
//!
//! 1. For each active parameter independently, split `[0, 1)` into N
//!    equal-width strata, assign them to the N runs through a random
//!    permutation, and draw one uniform value inside each assigned stratum.
//!    Every stratum is used exactly once per dimension.
//! 2. Map each unit column through the parameter's inverse CDF
//!    ([`Distribution`]) onto `[min, max)`.
//!
//! Step 2 never looks at how step 1 stratified, so new distributions plug in
//! without touching the sampler.
//!
//! References:
//! - McKay, Beckman & Conover (1979): A comparison of three methods for
//!   selecting values of input variables in the analysis of output from a
//!   computer code

mod distribution;

pub use distribution::{Distribution, DistributionKind, TruncatedNormal, Uniform};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{validate_specs, ParameterSpec};
use crate::{Error, Result};

/// N x d matrix of sampled parameter values.
///
/// Rows are runs (row `i` feeds run id `i + 1`), columns are active
/// parameters in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentDesign {
    parameters: Vec<String>,
    rows: Vec<Vec<f64>>,
    strata: Vec<Vec<usize>>,
    seed: u64,
}

impl ExperimentDesign {
    /// Number of runs (N).
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of sampled parameters (d).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.parameters.len()
    }

    /// Column names, in column order.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// One row, if in range.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// One row keyed by parameter name, in column order.
    #[must_use]
    pub fn row_map(&self, index: usize) -> Option<IndexMap<String, f64>> {
        self.row(index).map(|row| {
            self.parameters
                .iter()
                .cloned()
                .zip(row.iter().copied())
                .collect()
        })
    }

    /// One column, if in range.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        (index < self.dimension()).then(|| self.rows.iter().map(|row| row[index]).collect())
    }

    /// Stratum assigned to each run in one dimension.
    ///
    /// For a well-formed design this is a permutation of `0..N`.
    #[must_use]
    pub fn strata(&self, dimension: usize) -> Option<&[usize]> {
        self.strata.get(dimension).map(Vec::as_slice)
    }

    /// Seed the design was drawn with. Regenerating with this seed
    /// reproduces the design exactly.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }
}

/// Latin Hypercube sampler.
///
/// # Example
///
/// ```rust
/// use trueno_doe::config::ParameterSpec;
/// use trueno_doe::sampling::LatinHypercube;
///
/// # fn main() -> trueno_doe::Result<()> {
/// let specs = vec![
///     ParameterSpec::new("A", 0.0, 10.0),
///     ParameterSpec::new("B", -1.0, 1.0),
/// ];
/// let design = LatinHypercube::seeded(42).generate(&specs, 5)?;
/// assert_eq!(design.run_count(), 5);
/// assert_eq!(design.dimension(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LatinHypercube {
    seed: Option<u64>,
}

impl LatinHypercube {
    /// Create a sampler; `None` draws a fresh seed on every call.
    #[must_use]
    pub const fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    /// Create a reproducible sampler.
    #[must_use]
    pub const fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// Generate an N x d design over the active parameters in `specs`.
    ///
    /// All inputs are validated before any sampling happens.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRunCount`] if `run_count == 0`
    /// - [`Error::NoActiveParameters`] if no spec is active
    /// - [`Error::InvalidParameter`] / [`Error::DuplicateParameter`] for
    ///   malformed specs
    pub fn generate(&self, specs: &[ParameterSpec], run_count: usize) -> Result<ExperimentDesign> {
        if run_count == 0 {
            return Err(Error::InvalidRunCount(run_count));
        }
        validate_specs(specs)?;
        let active: Vec<&ParameterSpec> = specs.iter().filter(|s| s.is_active()).collect();
        if active.is_empty() {
            return Err(Error::NoActiveParameters);
        }

        let seed = self.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut strata = Vec::with_capacity(active.len());
        let mut columns = Vec::with_capacity(active.len());
        for spec in &active {
            let (assignment, unit) = stratified_column(&mut rng, run_count);
            let distribution = spec.distribution().over(spec.min(), spec.max());
            columns.push(
                unit.into_iter()
                    .map(|u| distribution.inverse_cdf(u))
                    .collect::<Vec<f64>>(),
            );
            strata.push(assignment);
        }

        let rows = (0..run_count)
            .map(|i| columns.iter().map(|column| column[i]).collect())
            .collect();

        debug!(seed, runs = run_count, dimension = active.len(), "generated latin hypercube design");

        Ok(ExperimentDesign {
            parameters: active.iter().map(|s| s.name().to_string()).collect(),
            rows,
            strata,
            seed,
        })
    }
}

/// One LHS dimension: a stratum permutation and a unit sample per run.
#[allow(clippy::cast_precision_loss)]
fn stratified_column(rng: &mut StdRng, n: usize) -> (Vec<usize>, Vec<f64>) {
    let mut assignment: Vec<usize> = (0..n).collect();
    assignment.shuffle(rng);

    let width = n as f64;
    let unit = assignment
        .iter()
        .map(|&stratum| {
            let lower = stratum as f64 / width;
            let upper = (stratum + 1) as f64 / width;
            let u = (stratum as f64 + rng.gen::<f64>()) / width;
            // Rounding must not push a sample into the next stratum
            if u < upper {
                u
            } else {
                lower
            }
        })
        .collect();

    (assignment, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("A", 0.0, 10.0),
            ParameterSpec::new("B", -1.0, 1.0),
        ]
    }

    #[test]
    fn test_design_shape() {
        let design = LatinHypercube::seeded(1).generate(&specs(), 5).unwrap();
        assert_eq!(design.run_count(), 5);
        assert_eq!(design.dimension(), 2);
        assert_eq!(design.parameters(), &["A".to_string(), "B".to_string()]);
        assert_eq!(design.seed(), 1);
    }

    #[test]
    fn test_strata_are_permutations() {
        let design = LatinHypercube::seeded(9).generate(&specs(), 17).unwrap();
        for dim in 0..design.dimension() {
            let mut strata = design.strata(dim).unwrap().to_vec();
            strata.sort_unstable();
            assert_eq!(strata, (0..17).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_values_in_bounds() {
        let design = LatinHypercube::seeded(3).generate(&specs(), 50).unwrap();
        for row in design.rows() {
            assert!((0.0..10.0).contains(&row[0]));
            assert!((-1.0..1.0).contains(&row[1]));
        }
    }

    #[test]
    fn test_same_seed_same_design() {
        let a = LatinHypercube::seeded(77).generate(&specs(), 8).unwrap();
        let b = LatinHypercube::seeded(77).generate(&specs(), 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseeded_designs_differ() {
        let a = LatinHypercube::new(None).generate(&specs(), 8).unwrap();
        let b = LatinHypercube::new(None).generate(&specs(), 8).unwrap();
        assert_ne!(a.rows(), b.rows());
        // The drawn seed reproduces the design
        let again = LatinHypercube::seeded(a.seed()).generate(&specs(), 8).unwrap();
        assert_eq!(a, again);
    }

    #[test]
    fn test_zero_runs_rejected() {
        let err = LatinHypercube::seeded(1).generate(&specs(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidRunCount(0)));
    }

    #[test]
    fn test_malformed_spec_rejected_before_sampling() {
        let bad = vec![ParameterSpec::new("A", 1.0, 0.0)];
        assert!(LatinHypercube::seeded(1).generate(&bad, 3).is_err());
    }

    #[test]
    fn test_ignored_parameters_not_sampled() {
        use crate::config::ParameterRole;
        let mut all = specs();
        all.push(ParameterSpec::new("C", 0.0, 1.0).with_role(ParameterRole::Ignored));
        let design = LatinHypercube::seeded(5).generate(&all, 4).unwrap();
        assert_eq!(design.dimension(), 2);

        let only_ignored = vec![ParameterSpec::new("C", 0.0, 1.0).with_role(ParameterRole::Ignored)];
        assert!(matches!(
            LatinHypercube::seeded(5).generate(&only_ignored, 4),
            Err(Error::NoActiveParameters)
        ));
    }

    #[test]
    fn test_single_run_design() {
        let design = LatinHypercube::seeded(2).generate(&specs(), 1).unwrap();
        assert_eq!(design.strata(0), Some(&[0usize][..]));
    }

    #[test]
    fn test_row_map_follows_column_order() {
        let design = LatinHypercube::seeded(4).generate(&specs(), 3).unwrap();
        let row = design.row_map(2).unwrap();
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys, vec!["A", "B"]);
        assert_eq!(row["A"], design.row(2).unwrap()[0]);
        assert!(design.row_map(3).is_none());
    }
}

//! Property-based tests for trueno-doe
//!
//! - Test sampling invariants (stratification, bounds, monotonicity)
//! - Test binding and dataset join integrity
//! - Run with ProptestConfig::with_cases(100)

use indexmap::IndexMap;
use proptest::prelude::*;
use trueno_doe::config::ParameterSpec;
use trueno_doe::dataset::DatasetAssembler;
use trueno_doe::experiment::{Metric, RunRecord};
use trueno_doe::sampling::{Distribution, DistributionKind, LatinHypercube};
use trueno_doe::template::{KeywordDeck, Manifest, Templater};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Generate a finite `[min, max)` range with `min < max`
fn arb_bounds() -> impl Strategy<Value = (f64, f64)> {
    (-1.0e6f64..1.0e6, 1.0e-6f64..1.0e6).prop_map(|(min, width)| (min, min + width))
}

/// Generate 1..=4 uniform parameter specs named p0, p1, ...
fn arb_specs() -> impl Strategy<Value = Vec<ParameterSpec>> {
    proptest::collection::vec(arb_bounds(), 1..=4).prop_map(|bounds| {
        bounds
            .into_iter()
            .enumerate()
            .map(|(i, (min, max))| ParameterSpec::new(format!("p{i}"), min, max))
            .collect()
    })
}

fn deck_for(specs: &[ParameterSpec]) -> KeywordDeck {
    let mut text = String::from("*KEYWORD\n*PARAMETER\n");
    for spec in specs {
        text.push_str(&format!("R {} 0.0\n", spec.name()));
    }
    text.push_str("*END\n");
    KeywordDeck::parse(&text).unwrap()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Sampling Properties
    // ========================================================================

    /// Property: each dimension's stratum assignment is a permutation of 0..N
    #[test]
    fn prop_strata_are_permutations(
        specs in arb_specs(),
        n in 1usize..200,
        seed in any::<u64>()
    ) {
        let design = LatinHypercube::seeded(seed).generate(&specs, n).unwrap();
        for dim in 0..design.dimension() {
            let mut strata = design.strata(dim).unwrap().to_vec();
            strata.sort_unstable();
            prop_assert_eq!(strata, (0..n).collect::<Vec<_>>());
        }
    }

    /// Property: every sampled value lies in its spec's [min, max)
    #[test]
    fn prop_values_within_bounds(
        specs in arb_specs(),
        n in 1usize..200,
        seed in any::<u64>()
    ) {
        let design = LatinHypercube::seeded(seed).generate(&specs, n).unwrap();
        for (dim, spec) in specs.iter().enumerate() {
            for value in design.column(dim).unwrap() {
                prop_assert!(value >= spec.min() && value < spec.max(),
                    "{} = {} outside [{}, {})", spec.name(), value, spec.min(), spec.max());
            }
        }
    }

    /// Property: the design value's stratum matches the recorded stratum
    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn prop_value_lies_in_assigned_stratum(
        n in 1usize..100,
        seed in any::<u64>()
    ) {
        let specs = vec![ParameterSpec::new("u", 0.0, 1.0)];
        let design = LatinHypercube::seeded(seed).generate(&specs, n).unwrap();
        let strata = design.strata(0).unwrap();
        for (value, &stratum) in design.column(0).unwrap().iter().zip(strata) {
            let lower = stratum as f64 / n as f64;
            let upper = (stratum + 1) as f64 / n as f64;
            prop_assert!(*value >= lower && *value < upper);
        }
    }

    /// Property: same seed, same design
    #[test]
    fn prop_seed_reproduces_design(
        specs in arb_specs(),
        n in 1usize..50,
        seed in any::<u64>()
    ) {
        let first = LatinHypercube::seeded(seed).generate(&specs, n).unwrap();
        let second = LatinHypercube::seeded(seed).generate(&specs, n).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: inverse CDF is monotone and stays in [min, max)
    #[test]
    fn prop_inverse_cdf_monotone(
        (min, max) in arb_bounds(),
        u1 in 0.0f64..1.0,
        u2 in 0.0f64..1.0,
        normal in any::<bool>()
    ) {
        let kind = if normal {
            DistributionKind::Normal { mean: (min + max) / 2.0, std_dev: (max - min) / 4.0 }
        } else {
            DistributionKind::Uniform
        };
        let distribution = kind.over(min, max);
        let (lo, hi) = if u1 <= u2 { (u1, u2) } else { (u2, u1) };
        let (a, b) = (distribution.inverse_cdf(lo), distribution.inverse_cdf(hi));
        prop_assert!(a <= b);
        prop_assert!(a >= min && b < max);
    }

    // ========================================================================
    // Binding and Join Properties
    // ========================================================================

    /// Property: a bound manifest recovers exactly the sampled row
    #[test]
    fn prop_binding_round_trip(
        specs in arb_specs(),
        n in 1usize..20,
        seed in any::<u64>()
    ) {
        let design = LatinHypercube::seeded(seed).generate(&specs, n).unwrap();
        let templater = Templater::new(deck_for(&specs), design.parameters()).unwrap();

        for index in 0..n {
            let row = design.row_map(index).unwrap();
            let bound = templater.bind(&row).unwrap();
            let parsed = Manifest::from_yaml(&bound.manifest.to_yaml().unwrap()).unwrap();
            prop_assert_eq!(parsed.values(), &row);

            let rendered = KeywordDeck::parse(&bound.artifact).unwrap();
            for (name, value) in &row {
                prop_assert_eq!(rendered.parameter(name), Some(*value));
            }
        }
    }

    /// Property: dataset rows equal manifests, one row per run, whatever fails
    #[test]
    fn prop_dataset_join_keeps_every_run(
        specs in arb_specs(),
        n in 1usize..30,
        seed in any::<u64>(),
        failed_mask in any::<u32>()
    ) {
        let design = LatinHypercube::seeded(seed).generate(&specs, n).unwrap();
        let runs: Vec<RunRecord> = (0..n)
            .rev()
            .map(|index| {
                let id = u32::try_from(index + 1).unwrap();
                let mut run = RunRecord::new(id, format!("run_{id}"), design.row_map(index).unwrap());
                run.mark_generated(format!("run_{id}/input.k"));
                let mut metrics = IndexMap::new();
                if failed_mask & (1 << (index % 32)) == 0 {
                    run.mark_executed();
                    metrics.insert("m".to_string(), Metric::Value(f64::from(id)));
                }
                run.record_metrics(metrics);
                run
            })
            .collect();

        let dataset = DatasetAssembler::new(design.parameters().to_vec(), vec!["m".to_string()])
            .assemble(&runs)
            .unwrap();

        prop_assert_eq!(dataset.len(), n);
        for (index, row) in dataset.rows().iter().enumerate() {
            prop_assert_eq!(row.run_id as usize, index + 1);
            prop_assert_eq!(row.inputs.as_slice(), design.row(index).unwrap());
        }
    }
}

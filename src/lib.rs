//! # Trueno-DOE: Design of Experiments for Parametric Simulation Sweeps
//!
//! **Version**: 0.1.0
//!
//! Trueno-DOE draws a space-filling design over a set of bounded input
//! parameters, binds each design row into a simulation input deck, drives an
//! external solver and post-processor once per row, and joins the sampled
//! inputs with the extracted metrics into one dataset for surrogate
//! modelling.
//!
//! ## Pipeline
//!
//! | Stage | Type |
//! |-------|------|
//! | Latin Hypercube sampling | [`sampling::LatinHypercube`] |
//! | Placeholder binding | [`template::Templater`] |
//! | Staging and external calls | [`orchestrator::RunOrchestrator`] |
//! | Metric extraction | [`collector::ResultCollector`] |
//! | Dataset join | [`dataset::DatasetAssembler`] |
//!
//! [`sweep::Sweep`] runs all of them from a settings file.
//!
//! ## Design Principles
//!
//! - **Fail fast**: settings, parameter specs and template placeholders are
//!   checked before the first run directory is written
//! - **Fault isolation**: a failing run is recorded, never fatal to the batch
//! - **No silent drops**: the dataset always has one row per run; missing
//!   metrics are explicit
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_doe::config::ParameterSpec;
//! use trueno_doe::sampling::LatinHypercube;
//!
//! let specs = vec![
//!     ParameterSpec::new("A", 0.0, 10.0),
//!     ParameterSpec::new("B", -1.0, 1.0),
//! ];
//! let design = LatinHypercube::seeded(42).generate(&specs, 5)?;
//! assert_eq!(design.run_count(), 5);
//! assert!(design.column(0).unwrap().iter().all(|a| (0.0..10.0).contains(a)));
//! # Ok::<(), trueno_doe::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod collector;
pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod orchestrator;
pub mod process;
pub mod sampling;
pub mod sweep;
pub mod template;

pub use error::{Error, Result};
pub use sweep::{Sweep, SweepOutcome};

//! Parameter specs - the declared, typed axes of a sweep

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sampling::DistributionKind;
use crate::{Error, Result};

/// Parameter-spec `type` values that mark a parameter as sampled.
pub const ACTIVE_TYPES: [&str; 2] = ["dynaParameter", "active"];

/// Whether a parameter participates in sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterRole {
    /// Sampled and bound into every run's artifact.
    Active,
    /// Declared but left untouched by the sweep.
    Ignored,
}

/// A declared simulation parameter with its sampling range.
///
/// Sampled values always lie in `[min, max)`, whatever the distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    name: String,
    min: f64,
    max: f64,
    role: ParameterRole,
    distribution: DistributionKind,
}

impl ParameterSpec {
    /// Create an active, uniformly distributed parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            role: ParameterRole::Active,
            distribution: DistributionKind::Uniform,
        }
    }

    /// Set the role.
    #[must_use]
    pub const fn with_role(mut self, role: ParameterRole) -> Self {
        self.role = role;
        self
    }

    /// Set the distribution used to map unit samples into `[min, max)`.
    #[must_use]
    pub const fn with_distribution(mut self, distribution: DistributionKind) -> Self {
        self.distribution = distribution;
        self
    }

    /// Get the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the inclusive lower bound.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Get the exclusive upper bound.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Get the role.
    #[must_use]
    pub const fn role(&self) -> ParameterRole {
        self.role
    }

    /// Get the distribution.
    #[must_use]
    pub const fn distribution(&self) -> DistributionKind {
        self.distribution
    }

    /// Whether this parameter is sampled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.role == ParameterRole::Active
    }

    /// Check the parameter is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for an empty name, non-finite
    /// bounds, `min >= max`, or a distribution that does not fit the range.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidParameter {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(invalid(format!(
                "bounds must be finite (min={}, max={})",
                self.min, self.max
            )));
        }
        if self.min >= self.max {
            return Err(invalid(format!(
                "min must be less than max (min={}, max={})",
                self.min, self.max
            )));
        }
        self.distribution
            .validate(self.min, self.max)
            .map_err(invalid)
    }

    /// Load parameter specs from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or any active entry is
    /// malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse parameter specs from YAML.
    ///
    /// The document holds a `parameters` mapping of name to
    /// `{type, min, max, distribution?}`. Entries are returned in
    /// declaration order; that order becomes the design's column order.
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed, an active entry lacks bounds,
    /// or validation fails.
    pub fn from_yaml(yaml: &str) -> Result<Vec<Self>> {
        let file: ParameterFile = serde_yaml::from_str(yaml)?;
        let mut specs = Vec::with_capacity(file.parameters.len());

        for (name, entry) in file.parameters {
            let role = if ACTIVE_TYPES.contains(&entry.kind.as_str()) {
                ParameterRole::Active
            } else {
                ParameterRole::Ignored
            };

            let (min, max) = match (entry.min, entry.max, role) {
                (Some(min), Some(max), _) => (min, max),
                (_, _, ParameterRole::Ignored) => {
                    debug!(parameter = %name, kind = %entry.kind, "skipping unbounded non-sampled entry");
                    continue;
                }
                (min, _, ParameterRole::Active) => {
                    let missing = if min.is_none() { "min" } else { "max" };
                    return Err(Error::InvalidParameter {
                        name,
                        reason: format!("active parameter is missing '{missing}'"),
                    });
                }
            };

            specs.push(Self {
                name,
                min,
                max,
                role,
                distribution: entry.distribution.unwrap_or_default(),
            });
        }

        validate_specs(&specs)?;
        Ok(specs)
    }
}

/// Validate a whole spec set: every active spec well formed, names unique.
///
/// # Errors
///
/// Returns the first [`Error::InvalidParameter`] or
/// [`Error::DuplicateParameter`] found.
pub fn validate_specs(specs: &[ParameterSpec]) -> Result<()> {
    let mut seen = HashSet::with_capacity(specs.len());
    for spec in specs {
        if !seen.insert(spec.name()) {
            return Err(Error::DuplicateParameter(spec.name().to_string()));
        }
        if spec.is_active() {
            spec.validate()?;
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ParameterFile {
    parameters: IndexMap<String, ParameterEntry>,
}

#[derive(Debug, Deserialize)]
struct ParameterEntry {
    #[serde(rename = "type")]
    kind: String,
    min: Option<f64>,
    max: Option<f64>,
    distribution: Option<DistributionKind>,
}

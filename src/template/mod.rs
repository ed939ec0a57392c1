//! Binding design rows into concrete simulation inputs
//!
//! A template is any [`KeyedDocument`]: a document with named placeholders.
//! The [`Templater`] checks the placeholder names against the declared
//! parameters once, up front, and refuses to bind on any mismatch. A sweep
//! over the wrong placeholders would silently corrupt every run, so a hard
//! stop is the only acceptable outcome.
//!
//! Binding is name-keyed and deterministic: the same template and row always
//! render the same bytes, so a single failed run can be regenerated without
//! re-sampling.

mod deck;

pub use deck::KeywordDeck;

use std::collections::HashSet;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A document with named numeric placeholders.
pub trait KeyedDocument: Clone {
    /// Placeholder names, in document order.
    fn placeholders(&self) -> Vec<&str>;

    /// Bind a placeholder. Returns `false` if no such placeholder exists.
    fn set(&mut self, name: &str, value: f64) -> bool;

    /// Render the document.
    fn render(&self) -> String;
}

/// Parameter name to the value bound into one run's artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(IndexMap<String, f64>);

impl Manifest {
    /// Wrap a name-to-value map.
    #[must_use]
    pub const fn new(values: IndexMap<String, f64>) -> Self {
        Self(values)
    }

    /// Get the bound values, in design order.
    #[must_use]
    pub const fn values(&self) -> &IndexMap<String, f64> {
        &self.0
    }

    /// Get one bound value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Unwrap into the underlying map.
    #[must_use]
    pub fn into_inner(self) -> IndexMap<String, f64> {
        self.0
    }

    /// Serialize as YAML.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Parse a YAML manifest.
    ///
    /// # Errors
    ///
    /// Returns error if the YAML is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Write the manifest to `path`.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Read a manifest from `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

/// One run's concrete input plus the manifest describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArtifact {
    /// Rendered simulation input
    pub artifact: String,
    /// Values bound into `artifact`
    pub manifest: Manifest,
}

/// Binds design rows into a checked template.
#[derive(Debug, Clone)]
pub struct Templater<D: KeyedDocument> {
    template: D,
    parameters: Vec<String>,
}

impl<D: KeyedDocument> Templater<D> {
    /// Pair a template with the declared parameter names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlaceholderMismatch`] if any declared parameter has
    /// no placeholder or any placeholder is not a declared parameter.
    pub fn new(template: D, parameters: &[String]) -> Result<Self> {
        let placeholders: HashSet<&str> = template.placeholders().into_iter().collect();
        let declared: HashSet<&str> = parameters.iter().map(String::as_str).collect();

        let missing_placeholders: Vec<String> = parameters
            .iter()
            .filter(|p| !placeholders.contains(p.as_str()))
            .cloned()
            .collect();
        let undeclared_placeholders: Vec<String> = template
            .placeholders()
            .into_iter()
            .filter(|p| !declared.contains(p))
            .map(str::to_string)
            .collect();

        if !missing_placeholders.is_empty() || !undeclared_placeholders.is_empty() {
            return Err(Error::PlaceholderMismatch {
                missing_placeholders,
                undeclared_placeholders,
            });
        }

        Ok(Self {
            template,
            parameters: parameters.to_vec(),
        })
    }

    /// Declared parameter names, in design order.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Bind one design row.
    ///
    /// The manifest lists values in declared-parameter order, regardless of
    /// the order of `row`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `row` lacks a declared
    /// parameter or carries an undeclared one.
    pub fn bind(&self, row: &IndexMap<String, f64>) -> Result<BoundArtifact> {
        if let Some(extra) = row.keys().find(|name| !self.parameters.contains(name)) {
            return Err(Error::InvalidParameter {
                name: extra.clone(),
                reason: "design row carries a parameter that is not declared".to_string(),
            });
        }

        let mut document = self.template.clone();
        let mut manifest = IndexMap::with_capacity(self.parameters.len());
        for name in &self.parameters {
            let value = *row.get(name).ok_or_else(|| Error::InvalidParameter {
                name: name.clone(),
                reason: "design row has no value for this parameter".to_string(),
            })?;
            // Placeholder presence was checked in `new`
            document.set(name, value);
            manifest.insert(name.clone(), value);
        }

        Ok(BoundArtifact {
            artifact: document.render(),
            manifest: Manifest::new(manifest),
        })
    }
}

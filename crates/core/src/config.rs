//! Per-table configuration
//!
//! A table is built from `{load_factor, max_neighbors}`. The orchestration
//! layer hands these over as a string property map (`LOADFACTOR`,
//! `MAXLIMITS`), so parsing and validation live here rather than in the
//! engine.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Property key for the buffer load factor
pub const PROP_LOAD_FACTOR: &str = "LOADFACTOR";
/// Property key for the neighbor list capacity
pub const PROP_MAX_NEIGHBORS: &str = "MAXLIMITS";
/// Property key for the score formula (optional)
pub const PROP_SCORE_FORMULA: &str = "SCOREFORMULA";

/// Default buffer load factor
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;
/// Default neighbor list capacity
pub const DEFAULT_MAX_NEIGHBORS: usize = 20;

/// Formula used to turn a dot product and two squared lengths into a score
///
/// All formulas are "higher = more similar". A zero-length vector on either
/// side always scores `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFormula {
    /// `dot² / (|a|² · |b|²)`, the score existing deployments were built on
    #[default]
    SquaredCosine,
    /// Standard cosine similarity: `dot / (|a| · |b|)`
    Cosine,
}

impl ScoreFormula {
    /// Human-readable name, as accepted by [`ScoreFormula::parse`]
    pub fn name(&self) -> &'static str {
        match self {
            ScoreFormula::SquaredCosine => "squared_cosine",
            ScoreFormula::Cosine => "cosine",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "squared_cosine" | "squared-cosine" | "cosine2" => Some(ScoreFormula::SquaredCosine),
            "cosine" => Some(ScoreFormula::Cosine),
            _ => None,
        }
    }
}

/// Configuration of one similarity table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Fraction of buffer capacity expected to be used after compaction.
    /// Must be in `(0, 1]`.
    pub load_factor: f64,

    /// Neighbor list capacity per document. Must be at least 1.
    pub max_neighbors: usize,

    /// Score formula used by the similarity scan
    #[serde(default)]
    pub score_formula: ScoreFormula,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            load_factor: DEFAULT_LOAD_FACTOR,
            max_neighbors: DEFAULT_MAX_NEIGHBORS,
            score_formula: ScoreFormula::default(),
        }
    }
}

impl TableConfig {
    /// Create a validated config with the default score formula
    pub fn new(load_factor: f64, max_neighbors: usize) -> SimResult<Self> {
        let config = TableConfig {
            load_factor,
            max_neighbors,
            score_formula: ScoreFormula::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Builder-style score formula override
    pub fn with_score_formula(mut self, formula: ScoreFormula) -> Self {
        self.score_formula = formula;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> SimResult<()> {
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 || self.load_factor > 1.0 {
            return Err(SimError::configuration(
                PROP_LOAD_FACTOR,
                format!("must be in (0, 1], got {}", self.load_factor),
            ));
        }
        if self.max_neighbors == 0 {
            return Err(SimError::configuration(
                PROP_MAX_NEIGHBORS,
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Build from the orchestration layer's string property map
    ///
    /// `LOADFACTOR` and `MAXLIMITS` are required; `SCOREFORMULA` is optional.
    pub fn from_properties(props: &HashMap<String, String>) -> SimResult<Self> {
        let load_factor = required(props, PROP_LOAD_FACTOR)?
            .trim()
            .parse::<f64>()
            .map_err(|e| SimError::configuration(PROP_LOAD_FACTOR, e.to_string()))?;
        let max_neighbors = required(props, PROP_MAX_NEIGHBORS)?
            .trim()
            .parse::<usize>()
            .map_err(|e| SimError::configuration(PROP_MAX_NEIGHBORS, e.to_string()))?;
        let score_formula = match props.get(PROP_SCORE_FORMULA) {
            Some(raw) => ScoreFormula::parse(raw).ok_or_else(|| {
                SimError::configuration(PROP_SCORE_FORMULA, format!("unknown formula '{}'", raw))
            })?,
            None => ScoreFormula::default(),
        };

        let config = TableConfig {
            load_factor,
            max_neighbors,
            score_formula,
        };
        config.validate()?;
        Ok(config)
    }
}

fn required<'a>(props: &'a HashMap<String, String>, key: &str) -> SimResult<&'a str> {
    props
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| SimError::configuration(key, "missing"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = TableConfig::default();
        assert_eq!(config.load_factor, 0.75);
        assert_eq!(config.max_neighbors, 20);
        assert_eq!(config.score_formula, ScoreFormula::SquaredCosine);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_rejects_bad_values() {
        assert!(TableConfig::new(0.0, 20).is_err());
        assert!(TableConfig::new(1.5, 20).is_err());
        assert!(TableConfig::new(f64::NAN, 20).is_err());
        assert!(TableConfig::new(0.75, 0).is_err());
        assert!(TableConfig::new(1.0, 1).is_ok());
    }

    #[test]
    fn test_from_properties() {
        let config =
            TableConfig::from_properties(&props(&[("LOADFACTOR", "0.5"), ("MAXLIMITS", "8")]))
                .unwrap();
        assert_eq!(config.load_factor, 0.5);
        assert_eq!(config.max_neighbors, 8);
        assert_eq!(config.score_formula, ScoreFormula::SquaredCosine);
    }

    #[test]
    fn test_from_properties_with_formula() {
        let config = TableConfig::from_properties(&props(&[
            ("LOADFACTOR", "0.75"),
            ("MAXLIMITS", "20"),
            ("SCOREFORMULA", "Cosine"),
        ]))
        .unwrap();
        assert_eq!(config.score_formula, ScoreFormula::Cosine);
    }

    #[test]
    fn test_from_properties_missing_key() {
        let err = TableConfig::from_properties(&props(&[("LOADFACTOR", "0.75")])).unwrap_err();
        assert!(matches!(
            err,
            SimError::Configuration { ref field, .. } if field == "MAXLIMITS"
        ));
    }

    #[test]
    fn test_from_properties_unparsable() {
        let err = TableConfig::from_properties(&props(&[
            ("LOADFACTOR", "lots"),
            ("MAXLIMITS", "20"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            SimError::Configuration { ref field, .. } if field == "LOADFACTOR"
        ));

        let err = TableConfig::from_properties(&props(&[
            ("LOADFACTOR", "0.75"),
            ("MAXLIMITS", "20"),
            ("SCOREFORMULA", "manhattan"),
        ]))
        .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_score_formula_parse() {
        assert_eq!(ScoreFormula::parse("cosine"), Some(ScoreFormula::Cosine));
        assert_eq!(
            ScoreFormula::parse("SQUARED_COSINE"),
            Some(ScoreFormula::SquaredCosine)
        );
        assert_eq!(ScoreFormula::parse("l2"), None);
        for formula in [ScoreFormula::Cosine, ScoreFormula::SquaredCosine] {
            assert_eq!(ScoreFormula::parse(formula.name()), Some(formula));
        }
    }

    #[test]
    fn test_score_formula_serde_name() {
        #[derive(Deserialize)]
        struct Wrapper {
            formula: ScoreFormula,
        }
        let w: Wrapper = toml::from_str("formula = \"squared_cosine\"").unwrap();
        assert_eq!(w.formula, ScoreFormula::SquaredCosine);
        let w: Wrapper = toml::from_str("formula = \"cosine\"").unwrap();
        assert_eq!(w.formula, ScoreFormula::Cosine);
    }
}

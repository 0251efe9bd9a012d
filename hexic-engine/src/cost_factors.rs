//! Planner tuning constants, optionally loaded from a TSV file.
//!
//! The file holds one `name<TAB>value` pair per line; `#`-prefixed lines
//! are comments. Unknown names are kept (an external planner may define
//! its own), missing names fall back to the built-in defaults. The engine
//! itself only exposes these through [`crate::ExecutionContext`]; the
//! query planner sitting on top consumes them.

use crate::error::{EngineError, Result};
use rustc_hash::FxHashMap;
use std::path::Path;

/// Named cost factors with defaults.
#[derive(Debug, Clone)]
pub struct CostFactors {
    values: FxHashMap<String, f64>,
}

const DEFAULTS: &[(&str, f64)] = &[
    ("FILTER_PUNISH", 2.0),
    ("NO_FILTER_PUNISH", 1.0),
    ("FILTER_SELECTIVITY", 0.1),
    ("HASH_MAP_OPERATION_COST", 50.0),
    ("JOIN_SIZE_ESTIMATE_CORRECTION_FACTOR", 0.7),
    ("DISK_RANDOM_ACCESS_COST", 200.0),
];

impl CostFactors {
    /// The built-in defaults.
    pub fn new() -> Self {
        Self {
            values: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    /// Defaults overridden by a cost-factors file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut factors = Self::new();
        factors.merge_tsv(&text)?;
        Ok(factors)
    }

    /// Merge `name<TAB>value` lines into this set.
    pub fn merge_tsv(&mut self, text: &str) -> Result<()> {
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, value) = line.split_once('\t').ok_or_else(|| {
                EngineError::BadQuery(format!(
                    "cost factors line {} is not name<TAB>value: {line:?}",
                    lineno + 1
                ))
            })?;
            let value: f64 = value.trim().parse().map_err(|_| {
                EngineError::BadQuery(format!(
                    "cost factor {name:?} has a non-numeric value {value:?}"
                ))
            })?;
            self.values.insert(name.trim().to_string(), value);
        }
        Ok(())
    }

    /// The value of a factor; 1.0 for names that were never defined.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(1.0)
    }
}

impl Default for CostFactors {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let f = CostFactors::new();
        assert_eq!(f.get("FILTER_PUNISH"), 2.0);
        assert_eq!(f.get("SOMETHING_ELSE"), 1.0);
    }

    #[test]
    fn test_merge_overrides_and_adds() {
        let mut f = CostFactors::new();
        f.merge_tsv("# comment\nFILTER_PUNISH\t3.5\nMY_FACTOR\t0.25\n\n")
            .unwrap();
        assert_eq!(f.get("FILTER_PUNISH"), 3.5);
        assert_eq!(f.get("MY_FACTOR"), 0.25);
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        let mut f = CostFactors::new();
        assert!(f.merge_tsv("NO_SEPARATOR 1.0").is_err());
        assert!(f.merge_tsv("NAME\tnot-a-number").is_err());
    }
}

//! Per-class weights of the distance components.

use crate::libs::error::BgcError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label of comparisons that mix all classes.
pub const MIX: &str = "mix";

/// Weights of one class: the three similarity components and the anchor boost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub jaccard: f64,
    pub dds: f64,
    pub ai: f64,
    pub anchor_boost: f64,
}

impl ClassWeights {
    pub fn new(jaccard: f64, dds: f64, ai: f64, anchor_boost: f64) -> Self {
        Self {
            jaccard,
            dds,
            ai,
            anchor_boost,
        }
    }
}

/// Per-class weights, with `mix` as the fallback for unknown labels.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    classes: BTreeMap<String, ClassWeights>,
}

impl Default for WeightTable {
    // Optimized values (2016-12-05) for the basic list of 4 anchor domains
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        for (class, w) in [
            ("PKSI", ClassWeights::new(0.22, 0.76, 0.02, 1.0)),
            ("PKSother", ClassWeights::new(0.0, 0.32, 0.68, 4.0)),
            ("NRPS", ClassWeights::new(0.0, 1.0, 0.0, 4.0)),
            ("RiPPs", ClassWeights::new(0.28, 0.71, 0.01, 1.0)),
            ("Saccharides", ClassWeights::new(0.0, 0.0, 1.0, 1.0)),
            ("Terpene", ClassWeights::new(0.2, 0.75, 0.05, 2.0)),
            ("PKS-NRP_Hybrids", ClassWeights::new(0.0, 0.78, 0.22, 1.0)),
            ("Others", ClassWeights::new(0.01, 0.97, 0.02, 4.0)),
            (MIX, ClassWeights::new(0.2, 0.75, 0.05, 2.0)),
        ] {
            classes.insert(class.to_string(), w);
        }
        Self { classes }
    }
}

impl WeightTable {
    pub fn get(&self, class: &str) -> ClassWeights {
        match self.classes.get(class) {
            Some(w) => *w,
            None => self.classes[MIX],
        }
    }

    pub fn set(&mut self, class: &str, weights: ClassWeights) {
        self.classes.insert(class.to_string(), weights);
    }

    /// Classes with their own weights, `mix` included.
    pub fn classes(&self) -> impl Iterator<Item = &String> {
        self.classes.keys()
    }

    /// Overrides entries from a TSV file: `class, jaccard, dds, ai, anchor_boost`.
    pub fn update_from_file(&mut self, path: &str) -> anyhow::Result<()> {
        for (i, line) in crate::libs::io::read_lines(path)?.iter().enumerate() {
            let fields: Vec<&str> = line.split('\t').map(|s| s.trim()).collect();
            if fields.len() != 5 {
                return Err(BgcError::Malformed {
                    file: path.to_string(),
                    line: i + 1,
                    message: format!("expected 5 columns, got {}", fields.len()),
                }
                .into());
            }
            let class = fields[0];
            let mut values = [0.0f64; 4];
            for (v, field) in values.iter_mut().zip(&fields[1..]) {
                *v = field.parse().map_err(|_| BgcError::InvalidWeights {
                    class: class.to_string(),
                    message: format!("'{}' is not a number", field),
                })?;
                if !v.is_finite() || *v < 0.0 {
                    return Err(BgcError::InvalidWeights {
                        class: class.to_string(),
                        message: format!("'{}' must be a non-negative number", field),
                    }
                    .into());
                }
            }
            log::debug!("Weights of {}: {:?}", class, values);
            self.set(
                class,
                ClassWeights::new(values[0], values[1], values[2], values[3]),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_and_fallback() {
        let table = WeightTable::default();
        assert_eq!(table.get("NRPS"), ClassWeights::new(0.0, 1.0, 0.0, 4.0));
        assert_eq!(table.get("unknown"), table.get(MIX));
        assert_eq!(table.classes().count(), 9);
    }

    #[test]
    fn test_update_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# class\tJ\tDDS\tAI\tboost").unwrap();
        writeln!(file, "NRPS\t0.5\t0.5\t0\t1").unwrap();
        writeln!(file, "Custom\t1\t0\t0\t1").unwrap();
        let path = file.path().display().to_string();

        let mut table = WeightTable::default();
        table.update_from_file(&path).unwrap();
        assert_eq!(table.get("NRPS"), ClassWeights::new(0.5, 0.5, 0.0, 1.0));
        assert_eq!(table.get("Custom").jaccard, 1.0);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "NRPS\t0.5\t-1\t0\t1").unwrap();
        let path = bad.path().display().to_string();
        assert!(table.update_from_file(&path).is_err());
    }
}

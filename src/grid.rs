//! Data-augmentation parameter grid
//!
//! A sweep visits every point of `transformations × replacements × probabilities`.
//! Iteration order is part of the contract: transformations vary slowest and
//! out-of-style probabilities fastest, so "the first two combinations" always
//! names the same parameter sets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One point in the augmentation sweep.
///
/// Immutable once constructed; a pipeline consumes one per item.
/// Deserialization goes through [`AugmentationParameterSet::new`], so the
/// value ranges hold for every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSet")]
pub struct AugmentationParameterSet {
    random_seed: u64,
    seed_example_sets: serde_json::Value,
    num_transformations: u32,
    num_replacements: u32,
    out_of_style_prob: f64,
}

impl AugmentationParameterSet {
    /// Create a parameter set, checking the value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if `num_transformations` or
    /// `num_replacements` is zero, or `out_of_style_prob` is outside `[0, 1]`.
    pub fn new(
        random_seed: u64,
        seed_example_sets: serde_json::Value,
        num_transformations: u32,
        num_replacements: u32,
        out_of_style_prob: f64,
    ) -> Result<Self> {
        check_transformations(num_transformations)?;
        check_replacements(num_replacements)?;
        check_probability(out_of_style_prob)?;
        Ok(Self {
            random_seed,
            seed_example_sets,
            num_transformations,
            num_replacements,
            out_of_style_prob,
        })
    }

    /// Seed forwarded to the augmentation step.
    #[must_use]
    pub const fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Opaque reference to the style-example sets.
    #[must_use]
    pub const fn seed_example_sets(&self) -> &serde_json::Value {
        &self.seed_example_sets
    }

    /// Augmentation transformations applied per example.
    #[must_use]
    pub const fn num_transformations(&self) -> u32 {
        self.num_transformations
    }

    /// Part replacements per transformation.
    #[must_use]
    pub const fn num_replacements(&self) -> u32 {
        self.num_replacements
    }

    /// Probability of drawing a replacement outside the preferred style.
    #[must_use]
    pub const fn out_of_style_prob(&self) -> f64 {
        self.out_of_style_prob
    }
}

#[derive(Deserialize)]
struct RawParameterSet {
    random_seed: u64,
    #[serde(default)]
    seed_example_sets: serde_json::Value,
    num_transformations: u32,
    num_replacements: u32,
    out_of_style_prob: f64,
}

impl TryFrom<RawParameterSet> for AugmentationParameterSet {
    type Error = Error;

    fn try_from(raw: RawParameterSet) -> Result<Self> {
        Self::new(
            raw.random_seed,
            raw.seed_example_sets,
            raw.num_transformations,
            raw.num_replacements,
            raw.out_of_style_prob,
        )
    }
}

impl fmt::Display for AugmentationParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "num_transformations={}, num_replacements={}, out_of_style_prob={}, \
             random_seed={}, seed_example_sets={}",
            self.num_transformations,
            self.num_replacements,
            self.out_of_style_prob,
            self.random_seed,
            self.seed_example_sets
        )
    }
}

/// Validated axes of the augmentation sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterGrid")]
pub struct ParameterGrid {
    num_transformations: Vec<u32>,
    num_replacements: Vec<u32>,
    out_of_style_probs: Vec<f64>,
}

#[derive(Deserialize)]
struct RawParameterGrid {
    num_transformations: Vec<u32>,
    num_replacements: Vec<u32>,
    out_of_style_probs: Vec<f64>,
}

impl TryFrom<RawParameterGrid> for ParameterGrid {
    type Error = Error;

    fn try_from(raw: RawParameterGrid) -> Result<Self> {
        Self::new(
            raw.num_transformations,
            raw.num_replacements,
            raw.out_of_style_probs,
        )
    }
}

impl ParameterGrid {
    /// Create a grid from its three axes.
    ///
    /// Empty axes are allowed and produce an empty sweep.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if any axis value violates the
    /// `AugmentationParameterSet` ranges.
    pub fn new(
        num_transformations: Vec<u32>,
        num_replacements: Vec<u32>,
        out_of_style_probs: Vec<f64>,
    ) -> Result<Self> {
        num_transformations
            .iter()
            .try_for_each(|&t| check_transformations(t))?;
        num_replacements
            .iter()
            .try_for_each(|&r| check_replacements(r))?;
        out_of_style_probs
            .iter()
            .try_for_each(|&o| check_probability(o))?;

        Ok(Self {
            num_transformations,
            num_replacements,
            out_of_style_probs,
        })
    }

    /// Transformation-count axis (outermost).
    #[must_use]
    pub fn num_transformations(&self) -> &[u32] {
        &self.num_transformations
    }

    /// Replacement-count axis (middle).
    #[must_use]
    pub fn num_replacements(&self) -> &[u32] {
        &self.num_replacements
    }

    /// Out-of-style probability axis (innermost).
    #[must_use]
    pub fn out_of_style_probs(&self) -> &[f64] {
        &self.out_of_style_probs
    }

    /// Number of combinations in the sweep.
    #[must_use]
    pub fn len(&self) -> usize {
        self.num_transformations.len()
            * self.num_replacements.len()
            * self.out_of_style_probs.len()
    }

    /// Check if the sweep has no combinations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand the grid into parameter sets in nested-loop order.
    ///
    /// `random_seed` and `seed_example_sets` are copied into every element.
    #[must_use]
    pub fn combinations(
        &self,
        random_seed: u64,
        seed_example_sets: &serde_json::Value,
    ) -> Vec<AugmentationParameterSet> {
        let mut combinations = Vec::with_capacity(self.len());
        for &t in &self.num_transformations {
            for &r in &self.num_replacements {
                for &o in &self.out_of_style_probs {
                    // Axes were range-checked in `new`.
                    combinations.push(AugmentationParameterSet {
                        random_seed,
                        seed_example_sets: seed_example_sets.clone(),
                        num_transformations: t,
                        num_replacements: r,
                        out_of_style_prob: o,
                    });
                }
            }
        }
        combinations
    }
}

/// Build the full sweep from raw axes.
///
/// # Errors
///
/// Returns `Error::InvalidParameter` if an axis value is out of range.
pub fn combinations(
    num_transformations: &[u32],
    num_replacements: &[u32],
    out_of_style_probs: &[f64],
    random_seed: u64,
    seed_example_sets: &serde_json::Value,
) -> Result<Vec<AugmentationParameterSet>> {
    let grid = ParameterGrid::new(
        num_transformations.to_vec(),
        num_replacements.to_vec(),
        out_of_style_probs.to_vec(),
    )?;
    Ok(grid.combinations(random_seed, seed_example_sets))
}

fn check_transformations(value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidParameter(
            "num_transformations must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn check_replacements(value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::InvalidParameter(
            "num_replacements must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn check_probability(value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidParameter(format!(
            "out_of_style_prob must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_set_rejects_zero_transformations() {
        let result = AugmentationParameterSet::new(0, serde_json::Value::Null, 0, 1, 0.5);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_parameter_set_rejects_nan_probability() {
        let result = AugmentationParameterSet::new(0, serde_json::Value::Null, 1, 1, f64::NAN);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_display_names_every_field() {
        let params =
            AugmentationParameterSet::new(7, serde_json::json!(["afro"]), 1, 2, 0.5).unwrap();
        let rendered = params.to_string();
        assert!(rendered.contains("num_transformations=1"));
        assert!(rendered.contains("num_replacements=2"));
        assert!(rendered.contains("out_of_style_prob=0.5"));
        assert!(rendered.contains("random_seed=7"));
        assert!(rendered.contains("[\"afro\"]"));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_parameter_set() {
        let json = r#"{"random_seed":1,"seed_example_sets":null,
            "num_transformations":0,"num_replacements":0,"out_of_style_prob":5.0}"#;
        let err = serde_json::from_str::<AugmentationParameterSet>(json).unwrap_err();
        assert!(err.to_string().contains("num_transformations must be at least 1"));
    }

    #[test]
    fn test_deserialize_accepts_valid_parameter_set() {
        let params = AugmentationParameterSet::new(3, serde_json::json!({"sets": 2}), 1, 4, 0.5)
            .unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: AugmentationParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_grid() {
        let json = r#"{"num_transformations":[1],"num_replacements":[1],
            "out_of_style_probs":[0.5, 1.5]}"#;
        let err = serde_json::from_str::<ParameterGrid>(json).unwrap_err();
        assert!(err.to_string().contains("out_of_style_prob must be within [0, 1]"));
    }

    #[test]
    fn test_grid_len() {
        let grid = ParameterGrid::new(vec![1, 2], vec![1, 2, 4], vec![0.0, 1.0]).unwrap();
        assert_eq!(grid.len(), 12);
        assert!(!grid.is_empty());
    }
}

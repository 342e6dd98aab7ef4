//! Capability contract for external transformers.
//!
//! Any transformer handed to a [`ColumnTransformer`](super::ColumnTransformer)
//! implements [`TableTransformer`]. The contract is checked once, by the type
//! system, when the wrapper is built; the only optional capability is
//! [`TableTransformer::support`], needed by the `subset` policy.

use crate::error::{PrepError, Result};
use polars::prelude::{DataFrame, Series};
use std::collections::BTreeMap;
use std::fmt;

/// Transformer parameters keyed by name.
pub type Params = BTreeMap<String, serde_json::Value>;

/// Which input columns a feature-selecting transformer kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Support {
    /// One flag per input column.
    Mask(Vec<bool>),
    /// Positions of the kept input columns.
    Indices(Vec<usize>),
}

impl Support {
    /// Convert to positions of kept columns, validated against the input width.
    pub fn indices(&self, n_inputs: usize) -> Result<Vec<usize>> {
        match self {
            Support::Mask(mask) => {
                if mask.len() != n_inputs {
                    return Err(PrepError::InvalidInputShape(format!(
                        "support mask has {} entries but {} columns were transformed",
                        mask.len(),
                        n_inputs
                    )));
                }
                Ok(mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, keep)| keep.then_some(i))
                    .collect())
            }
            Support::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&i| i >= n_inputs) {
                    return Err(PrepError::InvalidInputShape(format!(
                        "support index {bad} is out of range for {n_inputs} columns"
                    )));
                }
                Ok(indices.clone())
            }
        }
    }
}

/// An external transformer operating on a table slice.
///
/// `transform` returns a table; its column names only matter for the
/// `from_transformer` policy, every other policy renames the output.
pub trait TableTransformer: Send + Sync + fmt::Debug {
    /// Lower-case kind name used to generate output column names
    /// (`<kind>_component:<i>`).
    fn kind(&self) -> String;

    /// Learn from the selected columns.
    fn fit(&mut self, table: &DataFrame, target: Option<&Series>) -> Result<()>;

    /// Transform the selected columns. Must keep the number of rows.
    fn transform(&self, table: &DataFrame) -> Result<DataFrame>;

    fn get_params(&self) -> Params;

    fn set_params(&mut self, params: &Params) -> Result<()>;

    /// Support mask of a feature selector. `None` when the capability is absent.
    fn support(&self) -> Option<Support> {
        None
    }

    /// Independent copy, including any fitted state.
    fn clone_box(&self) -> Box<dyn TableTransformer>;
}

impl Clone for Box<dyn TableTransformer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_mask_to_indices() {
        let support = Support::Mask(vec![true, false, true]);
        assert_eq!(support.indices(3).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_support_mask_length_mismatch() {
        let support = Support::Mask(vec![true, false]);
        assert!(matches!(
            support.indices(3),
            Err(PrepError::InvalidInputShape(_))
        ));
    }

    #[test]
    fn test_support_indices_out_of_range() {
        let support = Support::Indices(vec![0, 4]);
        assert!(support.indices(3).is_err());
        assert_eq!(Support::Indices(vec![1]).indices(3).unwrap(), vec![1]);
    }
}

//! Column-subset transformer wrapper.
//!
//! [`ColumnTransformer`] applies one external transformer to the columns picked
//! by a [`ColumnSelector`] and reassembles the full table afterwards. Fitting
//! produces a separate [`FittedColumnTransformer`] that owns its own copy of
//! the transformer and the frozen column selection, so clones of a pipeline
//! never share fitted state.

use super::traits::{Params, Support, TableTransformer};
use crate::columns::{ColumnSelector, ColumnType, column_type_of, encode};
use crate::error::{PrepError, Result, ResultExt};
use crate::utils::column_names;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How the output columns of a wrapped transformer are named and typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnedFeatures {
    /// Output keeps the input column names (shape preserving).
    Same,
    /// Output is the subset of inputs given by the transformer's support mask.
    Subset,
    /// Generated `<kind>_component:<i>` names tagged `continuous`.
    #[default]
    Unknown,
    /// Generated names carrying the single type shared by all inputs.
    UnknownSameType,
    /// The transformer names (and tags) its own output.
    FromTransformer,
}

impl ReturnedFeatures {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Subset => "subset",
            Self::Unknown => "unknown",
            Self::UnknownSameType => "unknown_same_type",
            Self::FromTransformer => "from_transformer",
        }
    }
}

impl fmt::Display for ReturnedFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnedFeatures {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "same" => Ok(Self::Same),
            "subset" => Ok(Self::Subset),
            "unknown" => Ok(Self::Unknown),
            "unknown_same_type" => Ok(Self::UnknownSameType),
            "from_transformer" => Ok(Self::FromTransformer),
            other => Err(PrepError::UnsupportedPolicy(format!(
                "returned features can only be same, subset, unknown, unknown_same_type \
                 or from_transformer but was '{other}'"
            ))),
        }
    }
}

const TRANSFORM_COLUMN_PARAM: &str = "transform_column";
const RETURNED_FEATURES_PARAM: &str = "returned_features";

/// Applies a transformer to a selected, type-tagged subset of columns.
///
/// # Example
///
/// ```rust,ignore
/// use tabprep::{ColumnTransformer, ReturnedFeatures};
///
/// let wrapper = ColumnTransformer::new(Box::new(pca))
///     .with_columns("continuous")
///     .with_returned_features(ReturnedFeatures::Unknown);
///
/// let fitted = wrapper.fit(&train, Some(&y))?;
/// let out = fitted.transform(&test)?;
/// ```
#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    transformer: Box<dyn TableTransformer>,
    transform_column: ColumnSelector,
    returned_features: ReturnedFeatures,
}

impl ColumnTransformer {
    /// Wrap a transformer; defaults to all columns and `unknown` output.
    pub fn new(transformer: Box<dyn TableTransformer>) -> Self {
        Self {
            transformer,
            transform_column: ColumnSelector::default(),
            returned_features: ReturnedFeatures::default(),
        }
    }

    pub fn with_columns(mut self, selector: impl Into<ColumnSelector>) -> Self {
        self.transform_column = selector.into();
        self
    }

    pub fn with_returned_features(mut self, returned_features: ReturnedFeatures) -> Self {
        self.returned_features = returned_features;
        self
    }

    pub fn transformer(&self) -> &dyn TableTransformer {
        self.transformer.as_ref()
    }

    pub fn transform_column(&self) -> &ColumnSelector {
        &self.transform_column
    }

    pub fn returned_features(&self) -> ReturnedFeatures {
        self.returned_features
    }

    /// Wrapper parameters merged with the wrapped transformer's parameters.
    pub fn get_params(&self) -> Params {
        let mut params = self.transformer.get_params();
        params.insert(
            TRANSFORM_COLUMN_PARAM.to_string(),
            serde_json::to_value(&self.transform_column).unwrap_or(serde_json::Value::Null),
        );
        params.insert(
            RETURNED_FEATURES_PARAM.to_string(),
            serde_json::Value::String(self.returned_features.to_string()),
        );
        params
    }

    /// Consume the wrapper's own parameters and forward the rest.
    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        let mut rest = params.clone();

        if let Some(value) = rest.remove(TRANSFORM_COLUMN_PARAM) {
            self.transform_column = serde_json::from_value(value)?;
        }
        if let Some(value) = rest.remove(RETURNED_FEATURES_PARAM) {
            self.returned_features = match value {
                serde_json::Value::String(s) => s.parse()?,
                other => {
                    return Err(PrepError::UnsupportedPolicy(format!(
                        "returned features must be a string but was {other}"
                    )));
                }
            };
        }
        if !rest.is_empty() {
            self.transformer.set_params(&rest)?;
        }
        Ok(())
    }

    /// Resolve the columns against `table`, freeze them and fit a copy of the
    /// transformer on exactly that slice.
    pub fn fit(&self, table: &DataFrame, target: Option<&Series>) -> Result<FittedColumnTransformer> {
        let kind = self.transformer.kind();
        let columns = self.transform_column.resolve(&column_names(table))?;
        let column_type = self.shared_column_type(&columns)?;

        debug!(
            "Fitting '{}' on {} column(s) ({})",
            kind,
            columns.len(),
            self.returned_features
        );

        let slice = table
            .select(columns.iter().map(String::as_str))
            .context(format!("selecting columns for '{kind}'"))?;
        let mut transformer = self.transformer.clone_box();
        transformer.fit(&slice, target)?;

        if self.returned_features == ReturnedFeatures::Subset && transformer.support().is_none() {
            return Err(subset_unsupported(&kind));
        }

        Ok(FittedColumnTransformer {
            transformer,
            state: FittedColumns {
                columns,
                column_type,
            },
            returned_features: self.returned_features,
        })
    }

    /// Fit, then transform the same table.
    pub fn fit_transform(
        &self,
        table: &DataFrame,
        target: Option<&Series>,
    ) -> Result<(FittedColumnTransformer, DataFrame)> {
        let fitted = self.fit(table, target)?;
        let output = fitted.transform(table)?;
        Ok((fitted, output))
    }

    /// For `unknown_same_type`, the one type every selected column shares.
    fn shared_column_type(&self, columns: &[String]) -> Result<Option<ColumnType>> {
        if self.returned_features != ReturnedFeatures::UnknownSameType {
            return Ok(None);
        }
        if self.transform_column.is_multi_valued() {
            return Err(PrepError::HeterogeneousTypePolicy(format!(
                "the selected columns are given by '{}'",
                self.transform_column
            )));
        }

        let mut types = columns.iter().map(|c| column_type_of(c));
        let first = types.next().unwrap_or_default();
        if let Some(other) = types.find(|t| *t != first) {
            return Err(PrepError::HeterogeneousTypePolicy(format!(
                "found types '{first}' and '{other}'"
            )));
        }
        Ok(Some(first))
    }
}

/// Columns frozen at fit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FittedColumns {
    /// Concrete columns consumed at fit and at every later transform.
    pub columns: Vec<String>,
    /// Shared type of the columns (only for `unknown_same_type`).
    pub column_type: Option<ColumnType>,
}

/// A fitted wrapper. Transforms re-slice tables by the frozen columns.
#[derive(Debug, Clone)]
pub struct FittedColumnTransformer {
    transformer: Box<dyn TableTransformer>,
    state: FittedColumns,
    returned_features: ReturnedFeatures,
}

static_assertions::assert_impl_all!(ColumnTransformer: Send, Sync, Clone);
static_assertions::assert_impl_all!(FittedColumnTransformer: Send, Sync, Clone);

impl FittedColumnTransformer {
    pub fn state(&self) -> &FittedColumns {
        &self.state
    }

    pub fn resolved_columns(&self) -> &[String] {
        &self.state.columns
    }

    pub fn returned_features(&self) -> ReturnedFeatures {
        self.returned_features
    }

    pub fn transformer(&self) -> &dyn TableTransformer {
        self.transformer.as_ref()
    }

    pub fn support(&self) -> Option<Support> {
        self.transformer.support()
    }

    /// Transform the frozen columns of `table` and reassemble a new table.
    ///
    /// Columns of `table` that were not selected at fit time pass through
    /// untouched; `table` itself is never modified.
    pub fn transform(&self, table: &DataFrame) -> Result<DataFrame> {
        let kind = self.transformer.kind();
        let selected: HashSet<&str> = self.state.columns.iter().map(String::as_str).collect();

        let available = column_names(table);
        if let Some(missing) = self
            .state
            .columns
            .iter()
            .find(|c| !available.contains(*c))
        {
            return Err(PrepError::ColumnNotFound(missing.clone()));
        }

        let slice = table
            .select(self.state.columns.iter().map(String::as_str))
            .context(format!("selecting columns for '{kind}'"))?;
        let rest: Vec<Column> = table
            .get_columns()
            .iter()
            .filter(|c| !selected.contains(c.name().as_str()))
            .cloned()
            .collect();

        let output = self.transformer.transform(&slice)?;
        if output.width() > 0 && output.height() != table.height() {
            return Err(PrepError::InvalidInputShape(format!(
                "'{}' returned {} rows for {} input rows",
                kind,
                output.height(),
                table.height()
            )));
        }
        let transformed: Vec<Column> = output.get_columns().to_vec();

        let columns = match self.returned_features {
            ReturnedFeatures::Same => {
                if transformed.len() != self.state.columns.len() {
                    return Err(PrepError::InvalidInputShape(format!(
                        "'same' requires '{}' to keep {} columns but it returned {}",
                        kind,
                        self.state.columns.len(),
                        transformed.len()
                    )));
                }
                let mut renamed: HashMap<&str, Column> = self
                    .state
                    .columns
                    .iter()
                    .map(String::as_str)
                    .zip(transformed)
                    .map(|(name, column)| (name, column.with_name(name.into())))
                    .collect();
                table
                    .get_columns()
                    .iter()
                    .map(|c| {
                        renamed
                            .remove(c.name().as_str())
                            .unwrap_or_else(|| c.clone())
                    })
                    .collect()
            }
            ReturnedFeatures::Subset => {
                let support = self
                    .transformer
                    .support()
                    .ok_or_else(|| subset_unsupported(&kind))?;
                let kept = support.indices(self.state.columns.len())?;
                if kept.len() != transformed.len() {
                    return Err(PrepError::InvalidInputShape(format!(
                        "support of '{}' keeps {} columns but it returned {}",
                        kind,
                        kept.len(),
                        transformed.len()
                    )));
                }
                let names = kept.iter().map(|&i| self.state.columns[i].clone());
                rename_all(transformed, names).chain(rest).collect()
            }
            ReturnedFeatures::Unknown => {
                let names = component_names(&kind, transformed.len(), &ColumnType::Continuous);
                rename_all(transformed, names).chain(rest).collect()
            }
            ReturnedFeatures::UnknownSameType => {
                let column_type = self.state.column_type.clone().ok_or_else(|| {
                    PrepError::HeterogeneousTypePolicy(format!(
                        "no shared column type was recorded when fitting '{kind}'"
                    ))
                })?;
                let names = component_names(&kind, transformed.len(), &column_type);
                rename_all(transformed, names).chain(rest).collect()
            }
            ReturnedFeatures::FromTransformer => rest.into_iter().chain(transformed).collect(),
        };

        Ok(DataFrame::new(columns)?)
    }
}

fn subset_unsupported(kind: &str) -> PrepError {
    PrepError::UnsupportedPolicy(format!(
        "'subset' needs a transformer with a support mask, '{kind}' has none"
    ))
}

fn component_names(kind: &str, n: usize, column_type: &ColumnType) -> Vec<String> {
    (0..n)
        .map(|i| encode(&format!("{kind}_component:{i}"), column_type))
        .collect()
}

fn rename_all(
    columns: Vec<Column>,
    names: impl IntoIterator<Item = String>,
) -> impl Iterator<Item = Column> {
    columns
        .into_iter()
        .zip(names)
        .map(|(column, name)| column.with_name(name.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformers::testing::{Scale, SelectFirst, SumColumns};

    fn table() -> DataFrame {
        df![
            "a" => [1.0, 2.0, 3.0],
            "b__:type:__categorical" => [0.0, 1.0, 0.0],
            "c" => [10.0, 20.0, 30.0],
            "site__:type:__confound" => [1.0, 1.0, 2.0],
        ]
        .unwrap()
    }

    fn values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_returned_features_from_str() {
        assert_eq!(
            "unknown_same_type".parse::<ReturnedFeatures>().unwrap(),
            ReturnedFeatures::UnknownSameType
        );
        assert!(matches!(
            "whatever".parse::<ReturnedFeatures>(),
            Err(PrepError::UnsupportedPolicy(_))
        ));
    }

    #[test]
    fn test_same_preserves_names_and_order() {
        let wrapper = ColumnTransformer::new(Box::new(Scale::new(2.0)))
            .with_columns("continuous")
            .with_returned_features(ReturnedFeatures::Same);
        let input = table();
        let (fitted, out) = wrapper.fit_transform(&input, None).unwrap();

        assert_eq!(fitted.resolved_columns(), ["a", "c"]);
        assert_eq!(column_names(&out), column_names(&input));
        assert_eq!(values(&out, "a"), vec![2.0, 4.0, 6.0]);
        assert_eq!(values(&out, "c"), vec![20.0, 40.0, 60.0]);
        assert_eq!(values(&out, "b__:type:__categorical"), vec![0.0, 1.0, 0.0]);
        // input untouched
        assert_eq!(values(&input, "a"), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_transform_ignores_extra_columns() {
        let wrapper = ColumnTransformer::new(Box::new(Scale::new(2.0)))
            .with_columns("continuous")
            .with_returned_features(ReturnedFeatures::Same);
        let fitted = wrapper.fit(&table(), None).unwrap();

        let mut wider = table();
        wider
            .with_column(Series::new("d".into(), [5.0, 5.0, 5.0]))
            .unwrap();
        let out = fitted.transform(&wider).unwrap();

        // 'd' is continuous but was not selected at fit time
        assert_eq!(values(&out, "d"), vec![5.0, 5.0, 5.0]);
        assert_eq!(values(&out, "a"), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_transform_missing_frozen_column() {
        let wrapper = ColumnTransformer::new(Box::new(Scale::new(1.0))).with_columns("continuous");
        let fitted = wrapper.fit(&table(), None).unwrap();
        let narrow = table().drop("c").unwrap();
        assert!(matches!(
            fitted.transform(&narrow),
            Err(PrepError::ColumnNotFound(name)) if name == "c"
        ));
    }

    #[test]
    fn test_subset_uses_support_mask() {
        let wrapper = ColumnTransformer::new(Box::new(SelectFirst::default()))
            .with_columns(vec!["a", "c"])
            .with_returned_features(ReturnedFeatures::Subset);
        let (_, out) = wrapper.fit_transform(&table(), None).unwrap();

        assert_eq!(
            column_names(&out),
            vec!["a", "b__:type:__categorical", "site__:type:__confound"]
        );
    }

    #[test]
    fn test_subset_without_support_fails() {
        let wrapper = ColumnTransformer::new(Box::new(Scale::new(1.0)))
            .with_returned_features(ReturnedFeatures::Subset);
        let err = wrapper.fit(&table(), None).unwrap_err();
        assert!(matches!(err, PrepError::UnsupportedPolicy(_)));
    }

    #[test]
    fn test_unknown_generates_continuous_components() {
        let wrapper = ColumnTransformer::new(Box::new(SumColumns))
            .with_columns("all_features")
            .with_returned_features(ReturnedFeatures::Unknown);
        let (_, out) = wrapper.fit_transform(&table(), None).unwrap();

        assert_eq!(
            column_names(&out),
            vec![
                "sumcolumns_component:0__:type:__continuous",
                "site__:type:__confound"
            ]
        );
        assert_eq!(
            values(&out, "sumcolumns_component:0__:type:__continuous"),
            vec![11.0, 23.0, 33.0]
        );
    }

    #[test]
    fn test_unknown_same_type_inherits_tag() {
        let wrapper = ColumnTransformer::new(Box::new(SumColumns))
            .with_columns("confound")
            .with_returned_features(ReturnedFeatures::UnknownSameType);
        let (fitted, out) = wrapper.fit_transform(&table(), None).unwrap();

        assert_eq!(fitted.state().column_type, Some(ColumnType::Confound));
        assert!(
            column_names(&out).contains(&"sumcolumns_component:0__:type:__confound".to_string())
        );
    }

    #[test]
    fn test_unknown_same_type_rejects_mixed_columns() {
        let wrapper = ColumnTransformer::new(Box::new(SumColumns))
            .with_columns(vec!["a", "b__:type:__categorical"])
            .with_returned_features(ReturnedFeatures::UnknownSameType);
        let err = wrapper.fit(&table(), None).unwrap_err();
        assert!(matches!(err, PrepError::HeterogeneousTypePolicy(_)));
    }

    #[test]
    fn test_unknown_same_type_rejects_aggregate_keyword() {
        for selector in ["all", "all_features"] {
            let wrapper = ColumnTransformer::new(Box::new(SumColumns))
                .with_columns(selector)
                .with_returned_features(ReturnedFeatures::UnknownSameType);
            assert!(matches!(
                wrapper.fit(&table(), None),
                Err(PrepError::HeterogeneousTypePolicy(_))
            ));
        }
    }

    #[test]
    fn test_from_transformer_keeps_output_names() {
        let wrapper = ColumnTransformer::new(Box::new(SumColumns))
            .with_columns(vec!["a", "c"])
            .with_returned_features(ReturnedFeatures::FromTransformer);
        let (_, out) = wrapper.fit_transform(&table(), None).unwrap();
        assert_eq!(
            column_names(&out),
            vec!["b__:type:__categorical", "site__:type:__confound", "sum"]
        );
    }

    #[test]
    fn test_params_roundtrip_through_wrapper() {
        let mut wrapper = ColumnTransformer::new(Box::new(Scale::new(1.0)));
        let mut params = Params::new();
        params.insert("factor".to_string(), serde_json::json!(3.0));
        params.insert("returned_features".to_string(), serde_json::json!("same"));
        params.insert("transform_column".to_string(), serde_json::json!("continuous"));
        wrapper.set_params(&params).unwrap();

        let params = wrapper.get_params();
        assert_eq!(params["factor"], serde_json::json!(3.0));
        assert_eq!(params["returned_features"], serde_json::json!("same"));
        assert_eq!(params["transform_column"], serde_json::json!("continuous"));
        assert_eq!(wrapper.returned_features(), ReturnedFeatures::Same);
    }

    #[test]
    fn test_set_params_rejects_unknown_policy() {
        let mut wrapper = ColumnTransformer::new(Box::new(Scale::new(1.0)));
        let mut params = Params::new();
        params.insert("returned_features".to_string(), serde_json::json!("everything"));
        assert!(matches!(
            wrapper.set_params(&params),
            Err(PrepError::UnsupportedPolicy(_))
        ));
    }

    #[test]
    fn test_fitted_clones_are_independent() {
        let wrapper = ColumnTransformer::new(Box::new(Scale::new(1.0))).with_columns("continuous");
        let fitted = wrapper.fit(&table(), None).unwrap();
        let mut clone = fitted.clone();
        clone.state.columns.pop();
        assert_eq!(fitted.resolved_columns(), ["a", "c"]);
        assert_eq!(clone.resolved_columns(), ["a"]);
    }
}

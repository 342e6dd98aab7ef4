//! Input normalization.
//!
//! Raw input comes in one of two modes:
//!
//! - **Array mode**: no table; `X`, `y`, confounds and groups are numeric
//!   arrays. Columns are named by position (`feature_<i>`, `confound_<i>`).
//! - **Table mode**: a [`DataFrame`] plus column references into it.
//!
//! Both produce the same canonical [`NormalizedInput`]: a typed table holding
//! features and confounds (confounds tagged `confound`), the target series,
//! the optional groups series and the confound column names.

use crate::columns::{ColumnType, change_column_type, column_type_of, encode};
use crate::diagnostics::{PrepWarning, WarningKind};
use crate::error::{PrepError, Result};
use crate::utils::{DtypeCategory, array_columns, array_vector, get_dtype_category, n_samples};
use ndarray::{Array1, Array2, ArrayD};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Name of the target series in array mode.
pub const TARGET_NAME: &str = "y";
/// Name of the groups series in array mode.
pub const GROUPS_NAME: &str = "groups";

// =============================================================================
// Raw input
// =============================================================================

/// Data handed to the normalizer: an array or column references.
#[derive(Debug, Clone, PartialEq)]
pub enum DataRef {
    Array(ArrayD<f64>),
    Column(String),
    Columns(Vec<String>),
}

impl DataRef {
    fn kind(&self) -> &'static str {
        match self {
            DataRef::Array(_) => "an array",
            DataRef::Column(_) => "a column name",
            DataRef::Columns(_) => "a list of column names",
        }
    }

    /// Column names referenced, if this is a column reference.
    fn names(&self) -> Option<Vec<String>> {
        match self {
            DataRef::Array(_) => None,
            DataRef::Column(name) => Some(vec![name.clone()]),
            DataRef::Columns(names) => Some(names.clone()),
        }
    }
}

impl From<&str> for DataRef {
    fn from(name: &str) -> Self {
        DataRef::Column(name.to_string())
    }
}

impl From<String> for DataRef {
    fn from(name: String) -> Self {
        DataRef::Column(name)
    }
}

impl From<Vec<&str>> for DataRef {
    fn from(names: Vec<&str>) -> Self {
        DataRef::Columns(names.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for DataRef {
    fn from(names: Vec<String>) -> Self {
        DataRef::Columns(names)
    }
}

impl From<ArrayD<f64>> for DataRef {
    fn from(array: ArrayD<f64>) -> Self {
        DataRef::Array(array)
    }
}

impl From<Array1<f64>> for DataRef {
    fn from(array: Array1<f64>) -> Self {
        DataRef::Array(array.into_dyn())
    }
}

impl From<Array2<f64>> for DataRef {
    fn from(array: Array2<f64>) -> Self {
        DataRef::Array(array.into_dyn())
    }
}

/// Raw experiment input.
///
/// # Example
///
/// ```rust,ignore
/// use tabprep::RawInput;
///
/// let input = RawInput::table(df, vec!["age", "income"], "label")
///     .with_confounds("site")
///     .with_groups("subject");
/// ```
#[derive(Debug, Clone)]
pub struct RawInput {
    pub x: DataRef,
    pub y: DataRef,
    pub confounds: Option<DataRef>,
    pub groups: Option<DataRef>,
    pub data: Option<DataFrame>,
}

impl RawInput {
    /// Array-mode input.
    pub fn arrays(x: impl Into<DataRef>, y: impl Into<DataRef>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            confounds: None,
            groups: None,
            data: None,
        }
    }

    /// Table-mode input.
    pub fn table(data: DataFrame, x: impl Into<DataRef>, y: impl Into<DataRef>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            confounds: None,
            groups: None,
            data: Some(data),
        }
    }

    pub fn with_confounds(mut self, confounds: impl Into<DataRef>) -> Self {
        self.confounds = Some(confounds.into());
        self
    }

    pub fn with_groups(mut self, groups: impl Into<DataRef>) -> Self {
        self.groups = Some(groups.into());
        self
    }
}

// =============================================================================
// Positive labels
// =============================================================================

/// A single target label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Label {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Label::Int(v) => Some(*v as f64),
            Label::Float(v) => Some(*v),
            Label::Bool(_) | Label::Str(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Bool(v) => write!(f, "{v}"),
            Label::Int(v) => write!(f, "{v}"),
            Label::Float(v) => write!(f, "{v}"),
            Label::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Str(value.to_string())
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Label::Int(value)
    }
}

impl From<f64> for Label {
    fn from(value: f64) -> Self {
        Label::Float(value)
    }
}

impl From<bool> for Label {
    fn from(value: bool) -> Self {
        Label::Bool(value)
    }
}

/// One positive label or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PosLabels {
    One(Label),
    Many(Vec<Label>),
}

impl PosLabels {
    pub fn into_vec(self) -> Vec<Label> {
        match self {
            PosLabels::One(label) => vec![label],
            PosLabels::Many(labels) => labels,
        }
    }

    pub fn to_vec(&self) -> Vec<Label> {
        self.clone().into_vec()
    }
}

macro_rules! impl_pos_labels_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for PosLabels {
                fn from(label: $t) -> Self {
                    PosLabels::One(label.into())
                }
            }

            impl From<Vec<$t>> for PosLabels {
                fn from(labels: Vec<$t>) -> Self {
                    PosLabels::Many(labels.into_iter().map(Into::into).collect())
                }
            }
        )*
    };
}

impl_pos_labels_from!(Label, &str, i64, f64, bool);

/// Replace the target with a 0/1 indicator of membership in `pos_labels`.
///
/// Labels are compared in the target's own dtype: numeric targets against
/// numeric labels, string targets against string labels, boolean targets
/// against boolean labels. Nulls map to 0.
pub fn binarize_target(target: &Series, pos_labels: &[Label]) -> Result<Series> {
    let mask: Vec<bool> = match get_dtype_category(target.dtype()) {
        DtypeCategory::Numeric => {
            let wanted: Vec<f64> = pos_labels.iter().filter_map(Label::as_f64).collect();
            let values = target.cast(&DataType::Float64)?;
            values
                .f64()?
                .into_iter()
                .map(|v| v.is_some_and(|v| wanted.contains(&v)))
                .collect()
        }
        DtypeCategory::String => {
            let wanted: Vec<&str> = pos_labels
                .iter()
                .filter_map(|label| match label {
                    Label::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            let values = target.cast(&DataType::String)?;
            values
                .str()?
                .into_iter()
                .map(|v| v.is_some_and(|v| wanted.contains(&v)))
                .collect()
        }
        DtypeCategory::Boolean => {
            let wanted: Vec<bool> = pos_labels
                .iter()
                .filter_map(|label| match label {
                    Label::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            target
                .bool()?
                .into_iter()
                .map(|v| v.is_some_and(|v| wanted.contains(&v)))
                .collect()
        }
        DtypeCategory::Other => {
            return Err(PrepError::InvalidInputType(format!(
                "cannot compare positive labels with a target of type {}",
                target.dtype()
            )));
        }
    };

    let indicator: Vec<i64> = mask.into_iter().map(i64::from).collect();
    Ok(Series::new(target.name().clone(), indicator))
}

// =============================================================================
// Normalization
// =============================================================================

/// Canonical input handed to the rest of the preparation.
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    /// Features and confounds; confounds carry the `confound` tag.
    pub table: DataFrame,
    pub target: Series,
    pub groups: Option<Series>,
    /// Names of the confound columns in `table`.
    pub confound_names: Vec<String>,
    pub warnings: Vec<PrepWarning>,
}

/// Build the typed table, target and groups from raw input.
pub fn normalize(input: &RawInput, pos_labels: Option<&PosLabels>) -> Result<NormalizedInput> {
    let mut normalized = match &input.data {
        None => normalize_arrays(input)?,
        Some(data) => normalize_table(input, data)?,
    };

    if let Some(pos_labels) = pos_labels {
        let labels = pos_labels.to_vec();
        info!(
            "Setting the following as positive labels: {}",
            labels
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        normalized.target = binarize_target(&normalized.target, &labels)?;
    }

    Ok(normalized)
}

fn expect_array<'a>(data: &'a DataRef, what: &str) -> Result<&'a ArrayD<f64>> {
    match data {
        DataRef::Array(array) => Ok(array),
        other => Err(PrepError::InvalidInputType(format!(
            "{what} must be an array if no table is specified, got {}",
            other.kind()
        ))),
    }
}

fn check_samples(array: &ArrayD<f64>, expected: usize, what: &str) -> Result<()> {
    let found = n_samples(array).unwrap_or(0);
    if found != expected {
        return Err(PrepError::InvalidInputShape(format!(
            "the number of samples in X ({expected}) does not match {what} ({found})"
        )));
    }
    Ok(())
}

fn normalize_arrays(input: &RawInput) -> Result<NormalizedInput> {
    info!("Using arrays as input");

    let x = expect_array(&input.x, "X")?;
    let y = expect_array(&input.y, "y")?;
    let features = array_columns(x, "X")?;
    let target = array_vector(y, "y")?;

    let n = n_samples(x).unwrap_or(0);
    check_samples(y, n, "y")?;
    info!("# Samples: {}", n);
    info!("# Features: {}", features.len());

    let mut columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Column::new(format!("feature_{i}").into(), values))
        .collect();

    let mut confound_names = Vec::new();
    if let Some(confounds) = &input.confounds {
        let confounds = expect_array(confounds, "confounds")?;
        let values = array_columns(confounds, "confounds")?;
        check_samples(confounds, n, "confounds")?;
        info!("# Confounds: {}", values.len());
        for (i, values) in values.into_iter().enumerate() {
            let name = encode(&format!("confound_{i}"), &ColumnType::Confound);
            columns.push(Column::new(name.as_str().into(), values));
            confound_names.push(name);
        }
    }

    let groups = match &input.groups {
        Some(groups) => {
            let groups = expect_array(groups, "groups")?;
            let values = array_vector(groups, "groups")?;
            check_samples(groups, n, "groups")?;
            info!("Using groups");
            Some(Series::new(GROUPS_NAME.into(), values))
        }
        None => None,
    };

    Ok(NormalizedInput {
        table: DataFrame::new(columns)?,
        target: Series::new(TARGET_NAME.into(), target),
        groups,
        confound_names,
        warnings: Vec::new(),
    })
}

fn expect_names(data: &DataRef, what: &str, single: bool) -> Result<Vec<String>> {
    match (data, single) {
        (DataRef::Column(_), _) | (DataRef::Columns(_), false) => {
            Ok(data.names().unwrap_or_default())
        }
        (other, true) => Err(PrepError::InvalidInputType(format!(
            "{what} must be a column name when a table is specified, got {}",
            other.kind()
        ))),
        (other, false) => Err(PrepError::InvalidInputType(format!(
            "{what} must be a column name or a list of column names when a table is \
             specified, got {}",
            other.kind()
        ))),
    }
}

fn check_present(data: &DataFrame, names: &[String], what: &str) -> Result<()> {
    let missing: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|name| data.column(name).is_err())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    debug!("Missing {} columns: {:?}", what, missing);
    Err(PrepError::ColumnNotFound(missing.join(", ")))
}

fn normalize_table(input: &RawInput, data: &DataFrame) -> Result<NormalizedInput> {
    info!("Using a table as input");

    let x = expect_names(&input.x, "X", false)?;
    let y = expect_names(&input.y, "y", true)?.remove(0);
    let confounds = match &input.confounds {
        Some(confounds) => expect_names(confounds, "confounds", false)?,
        None => Vec::new(),
    };
    let groups = match &input.groups {
        Some(groups) => Some(expect_names(groups, "groups", true)?.remove(0)),
        None => None,
    };

    check_present(data, &x, "X")?;
    check_present(data, std::slice::from_ref(&y), "y")?;
    check_present(data, &confounds, "confounds")?;
    if let Some(groups) = &groups {
        check_present(data, std::slice::from_ref(groups), "groups")?;
    }

    info!("Features: {:?}", x);
    info!("Target: {}", y);

    let mut warnings = Vec::new();
    if x.contains(&y) {
        warnings.push(PrepWarning::new(
            WarningKind::TargetInFeatures,
            format!("y ('{y}') is part of X"),
        ));
    }
    if let Some(groups) = &groups {
        info!("Using '{}' as groups", groups);
        if *groups == y {
            warnings.push(PrepWarning::new(
                WarningKind::GroupsAreTarget,
                "y and groups are the same column",
            ));
        }
        if x.contains(groups) {
            warnings.push(PrepWarning::new(
                WarningKind::GroupsInFeatures,
                format!("groups ('{groups}') is part of X"),
            ));
        }
    }

    let overlapping: Vec<&String> = confounds.iter().filter(|c| x.contains(c)).collect();
    if !overlapping.is_empty() {
        warnings.push(PrepWarning::new(
            WarningKind::ConfoundsInFeatures,
            format!("X contains the following confounds: {overlapping:?}"),
        ));
    }
    if !confounds.is_empty() {
        info!("Confounds: {:?}", confounds);
    }

    let mut selected = x.clone();
    for confound in &confounds {
        if !selected.contains(confound) {
            selected.push(confound.clone());
        }
    }

    let mut columns = Vec::with_capacity(selected.len());
    let mut confound_names = Vec::with_capacity(confounds.len());
    for name in &selected {
        let column = data.column(name)?.clone();
        if confounds.contains(name) {
            let tagged = if column_type_of(name).is_confound() {
                name.clone()
            } else {
                change_column_type(name, &ColumnType::Confound)
            };
            columns.push(column.with_name(tagged.as_str().into()));
            confound_names.push(tagged);
        } else {
            columns.push(column);
        }
    }

    let target = data.column(&y)?.as_materialized_series().clone();
    let groups = match &groups {
        Some(groups) => Some(data.column(groups)?.as_materialized_series().clone()),
        None => None,
    };

    Ok(NormalizedInput {
        table: DataFrame::new(columns)?,
        target,
        groups,
        confound_names,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_names;
    use ndarray::{Array1, Array2};

    fn data() -> DataFrame {
        df![
            "age" => [20.0, 30.0, 40.0, 50.0],
            "income" => [1.0, 2.0, 3.0, 4.0],
            "site" => [1i64, 1, 2, 2],
            "label" => ["a", "b", "c", "a"],
            "subject" => [1i64, 2, 3, 4],
        ]
        .unwrap()
    }

    fn ints(series: &Series) -> Vec<i64> {
        series.i64().unwrap().into_no_null_iter().collect()
    }

    #[test]
    fn test_array_mode_names_columns_by_position() {
        let x = Array2::<f64>::zeros((10, 3));
        let y = Array1::<f64>::zeros(10);
        let normalized = normalize(&RawInput::arrays(x, y), None).unwrap();

        assert_eq!(
            column_names(&normalized.table),
            vec!["feature_0", "feature_1", "feature_2"]
        );
        assert!(
            column_names(&normalized.table)
                .iter()
                .all(|c| column_type_of(c) == ColumnType::Continuous)
        );
        assert_eq!(normalized.target.len(), 10);
        assert_eq!(normalized.target.name().as_str(), "y");
        assert!(normalized.groups.is_none());
        assert!(normalized.confound_names.is_empty());
    }

    #[test]
    fn test_array_mode_confounds_and_groups() {
        let x = Array1::from(vec![1.0, 2.0, 3.0]);
        let y = Array1::from(vec![0.0, 1.0, 0.0]);
        let confounds = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let groups = Array1::from(vec![1.0, 1.0, 2.0]);
        let input = RawInput::arrays(x, y)
            .with_confounds(confounds)
            .with_groups(groups);
        let normalized = normalize(&input, None).unwrap();

        assert_eq!(
            column_names(&normalized.table),
            vec![
                "feature_0",
                "confound_0__:type:__confound",
                "confound_1__:type:__confound"
            ]
        );
        assert_eq!(normalized.confound_names.len(), 2);
        assert_eq!(normalized.groups.unwrap().name().as_str(), "groups");
    }

    #[test]
    fn test_array_mode_sample_mismatch() {
        let x = Array2::<f64>::zeros((10, 3));
        let y = Array1::<f64>::zeros(9);
        let err = normalize(&RawInput::arrays(x, y), None).unwrap_err();
        assert!(matches!(err, PrepError::InvalidInputShape(_)));
    }

    #[test]
    fn test_array_mode_rejects_2d_target() {
        let x = Array2::<f64>::zeros((4, 2));
        let y = Array2::<f64>::zeros((4, 2));
        assert!(matches!(
            normalize(&RawInput::arrays(x, y), None),
            Err(PrepError::InvalidInputShape(_))
        ));
    }

    #[test]
    fn test_array_mode_rejects_column_vector_target_and_groups() {
        let x = Array2::<f64>::zeros((4, 2));
        let column = Array2::<f64>::zeros((4, 1));
        assert!(matches!(
            normalize(&RawInput::arrays(x.clone(), column.clone()), None),
            Err(PrepError::InvalidInputShape(_))
        ));

        let input = RawInput::arrays(x, Array1::<f64>::zeros(4)).with_groups(column);
        assert!(matches!(
            normalize(&input, None),
            Err(PrepError::InvalidInputShape(_))
        ));
    }

    #[test]
    fn test_array_mode_rejects_column_references() {
        let y = Array1::<f64>::zeros(4);
        let err = normalize(&RawInput::arrays("age", y), None).unwrap_err();
        assert!(matches!(err, PrepError::InvalidInputType(_)));
    }

    #[test]
    fn test_table_mode_tags_confounds() {
        let input = RawInput::table(data(), vec!["age", "income"], "label").with_confounds("site");
        let normalized = normalize(&input, None).unwrap();

        assert_eq!(
            column_names(&normalized.table),
            vec!["age", "income", "site__:type:__confound"]
        );
        assert_eq!(normalized.confound_names, vec!["site__:type:__confound"]);
        assert_eq!(normalized.target.name().as_str(), "label");
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn test_table_mode_overlap_warnings() {
        let input = RawInput::table(data(), vec!["age", "site", "label", "subject"], "label")
            .with_confounds(vec!["site"])
            .with_groups("subject");
        let normalized = normalize(&input, None).unwrap();

        let kinds: Vec<WarningKind> = normalized.warnings.iter().map(|w| w.kind).collect();
        assert!(kinds.contains(&WarningKind::TargetInFeatures));
        assert!(kinds.contains(&WarningKind::GroupsInFeatures));
        assert!(kinds.contains(&WarningKind::ConfoundsInFeatures));
        // overlap yields a single, confound-tagged column
        assert_eq!(
            column_names(&normalized.table),
            vec!["age", "site__:type:__confound", "label", "subject"]
        );
    }

    #[test]
    fn test_table_mode_groups_equal_target() {
        let input = RawInput::table(data(), "age", "label").with_groups("label");
        let normalized = normalize(&input, None).unwrap();
        assert_eq!(normalized.warnings[0].kind, WarningKind::GroupsAreTarget);
    }

    #[test]
    fn test_table_mode_missing_columns() {
        let input = RawInput::table(data(), vec!["age", "weight"], "label");
        let err = normalize(&input, None).unwrap_err();
        assert!(matches!(err, PrepError::ColumnNotFound(ref name) if name == "weight"));

        let input = RawInput::table(data(), "age", "outcome");
        assert!(matches!(
            normalize(&input, None),
            Err(PrepError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_table_mode_type_errors() {
        let input = RawInput::table(data(), "age", vec!["label", "site"]);
        assert!(matches!(
            normalize(&input, None),
            Err(PrepError::InvalidInputType(_))
        ));

        let input = RawInput::table(data(), Array1::<f64>::zeros(4), "label");
        assert!(matches!(
            normalize(&input, None),
            Err(PrepError::InvalidInputType(_))
        ));
    }

    #[test]
    fn test_pos_labels_on_strings() {
        let input = RawInput::table(data(), "age", "label");
        let normalized = normalize(&input, Some(&PosLabels::from(vec!["a", "c"]))).unwrap();
        assert_eq!(ints(&normalized.target), vec![1, 0, 1, 1]);
        assert_eq!(normalized.target.name().as_str(), "label");
    }

    #[test]
    fn test_pos_labels_on_numbers() {
        let input = RawInput::table(data(), "age", "site");
        let normalized = normalize(&input, Some(&PosLabels::from(2i64))).unwrap();
        assert_eq!(ints(&normalized.target), vec![0, 0, 1, 1]);

        let y = Array1::from(vec![0.5, 1.0, 1.5]);
        let x = Array1::from(vec![0.0, 0.0, 0.0]);
        let normalized = normalize(&RawInput::arrays(x, y), Some(&PosLabels::from(1.5))).unwrap();
        assert_eq!(ints(&normalized.target), vec![0, 0, 1]);
    }

    #[test]
    fn test_label_deserialization() {
        let labels: PosLabels = serde_json::from_str(r#"[1, "b", true, 2.5]"#).unwrap();
        assert_eq!(
            labels.into_vec(),
            vec![
                Label::Int(1),
                Label::Str("b".to_string()),
                Label::Bool(true),
                Label::Float(2.5)
            ]
        );
    }
}

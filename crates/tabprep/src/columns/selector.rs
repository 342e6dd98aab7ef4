//! Column selection against a concrete table.
//!
//! A [`ColumnSelector`] is late-bound: it stores either type keywords or
//! literal names and is resolved against the table it is given, so the same
//! selector can be reused on tables with different concrete columns.

use super::codec::{ColumnType, column_type_of};
use crate::error::{PrepError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Type keywords accepted in a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeSelector {
    Confound,
    Continuous,
    Categorical,
    /// Every column.
    All,
    /// Every column not tagged `confound`.
    AllFeatures,
}

impl TypeSelector {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "confound" => Some(Self::Confound),
            "continuous" => Some(Self::Continuous),
            "categorical" => Some(Self::Categorical),
            "all" => Some(Self::All),
            "all_features" => Some(Self::AllFeatures),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confound => "confound",
            Self::Continuous => "continuous",
            Self::Categorical => "categorical",
            Self::All => "all",
            Self::AllFeatures => "all_features",
        }
    }

    /// `all` and `all_features` span several semantic types.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::All | Self::AllFeatures)
    }

    fn matches(&self, column_type: &ColumnType) -> bool {
        match self {
            Self::All => true,
            Self::AllFeatures => !column_type.is_confound(),
            Self::Confound => *column_type == ColumnType::Confound,
            Self::Continuous => *column_type == ColumnType::Continuous,
            Self::Categorical => *column_type == ColumnType::Categorical,
        }
    }
}

/// Which columns a wrapped transformer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SelectorRepr", into = "SelectorRepr")]
pub enum ColumnSelector {
    /// One or more type keywords.
    Types(Vec<TypeSelector>),
    /// Literal column names.
    Names(Vec<String>),
}

impl Default for ColumnSelector {
    fn default() -> Self {
        Self::Types(vec![TypeSelector::All])
    }
}

impl ColumnSelector {
    /// Build a selector from raw strings.
    ///
    /// The strings are type keywords only if every one of them is a keyword;
    /// otherwise all are treated as literal column names.
    pub fn from_strs<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        let keywords: Option<Vec<TypeSelector>> = items
            .iter()
            .map(|s| TypeSelector::from_keyword(s))
            .collect();
        match keywords {
            Some(types) if !types.is_empty() => Self::Types(types),
            _ => Self::Names(items),
        }
    }

    pub fn types(types: impl Into<Vec<TypeSelector>>) -> Self {
        Self::Types(types.into())
    }

    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    /// Number of entries written in the selector (not resolved columns).
    pub fn len(&self) -> usize {
        match self {
            Self::Types(types) => types.len(),
            Self::Names(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for multi-valued selectors or the `all`/`all_features` keywords.
    pub fn is_multi_valued(&self) -> bool {
        match self {
            Self::Types(types) => types.len() > 1 || types.iter().any(TypeSelector::is_aggregate),
            Self::Names(names) => names.len() > 1,
        }
    }

    /// Resolve against the columns of a table, preserving selector order.
    pub fn resolve<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        match self {
            Self::Types(types) => {
                for selector in types {
                    for column in columns {
                        let column = column.as_ref();
                        if selector.matches(&column_type_of(column)) && seen.insert(column) {
                            resolved.push(column.to_string());
                        }
                    }
                }
            }
            Self::Names(names) => {
                let available: HashSet<&str> = columns.iter().map(AsRef::as_ref).collect();
                for name in names {
                    if !available.contains(name.as_str()) {
                        return Err(PrepError::ColumnNotFound(name.clone()));
                    }
                    if seen.insert(name.as_str()) {
                        resolved.push(name.clone());
                    }
                }
            }
        }

        if resolved.is_empty() {
            return Err(PrepError::EmptySelection {
                selector: self.to_string(),
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            });
        }
        Ok(resolved)
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = match self {
            Self::Types(types) => types.iter().map(TypeSelector::as_str).collect(),
            Self::Names(names) => names.iter().map(String::as_str).collect(),
        };
        write!(f, "{}", parts.join(","))
    }
}

impl From<&str> for ColumnSelector {
    fn from(item: &str) -> Self {
        Self::from_strs([item])
    }
}

impl From<TypeSelector> for ColumnSelector {
    fn from(selector: TypeSelector) -> Self {
        Self::Types(vec![selector])
    }
}

impl From<Vec<&str>> for ColumnSelector {
    fn from(items: Vec<&str>) -> Self {
        Self::from_strs(items)
    }
}

/// Serialized form: a single string or a list of strings.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectorRepr {
    One(String),
    Many(Vec<String>),
}

impl From<SelectorRepr> for ColumnSelector {
    fn from(repr: SelectorRepr) -> Self {
        match repr {
            SelectorRepr::One(item) => Self::from_strs([item]),
            SelectorRepr::Many(items) => Self::from_strs(items),
        }
    }
}

impl From<ColumnSelector> for SelectorRepr {
    fn from(selector: ColumnSelector) -> Self {
        let mut items: Vec<String> = match selector {
            ColumnSelector::Types(types) => types.iter().map(|t| t.as_str().to_string()).collect(),
            ColumnSelector::Names(names) => names,
        };
        if items.len() == 1 {
            SelectorRepr::One(items.remove(0))
        } else {
            SelectorRepr::Many(items)
        }
    }
}

static REGEX_META: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\.+*?()|\[\]{}^$]").expect("Invalid regex: metacharacters"));

/// Pick the columns whose names fully match any of the patterns.
///
/// Patterns are tried in order; a pattern that matches nothing fails with
/// [`PrepError::ColumnNotFound`]. The result has no duplicates.
pub fn pick_columns<P, S>(patterns: &[P], columns: &[S]) -> Result<Vec<String>>
where
    P: AsRef<str>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut picked = Vec::new();

    for pattern in patterns {
        let pattern = pattern.as_ref();
        let matched: Vec<&str> = if REGEX_META.is_match(pattern) {
            let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
                PrepError::InvalidConfig(format!("invalid column pattern '{pattern}': {e}"))
            })?;
            columns
                .iter()
                .map(AsRef::as_ref)
                .filter(|c| regex.is_match(c))
                .collect()
        } else {
            columns
                .iter()
                .map(AsRef::as_ref)
                .filter(|c| *c == pattern)
                .collect()
        };

        if matched.is_empty() {
            return Err(PrepError::ColumnNotFound(pattern.to_string()));
        }
        for column in matched {
            if seen.insert(column) {
                picked.push(column.to_string());
            }
        }
    }
    Ok(picked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<&'static str> {
        vec![
            "age",
            "income__:type:__continuous",
            "sex__:type:__categorical",
            "site__:type:__confound",
        ]
    }

    #[test]
    fn test_from_strs_keywords_vs_names() {
        assert_eq!(
            ColumnSelector::from_strs(["continuous", "confound"]),
            ColumnSelector::Types(vec![TypeSelector::Continuous, TypeSelector::Confound])
        );
        assert_eq!(
            ColumnSelector::from_strs(["continuous", "age"]),
            ColumnSelector::Names(vec!["continuous".to_string(), "age".to_string()])
        );
    }

    #[test]
    fn test_resolve_type_keyword() {
        let selected = ColumnSelector::from("continuous").resolve(&columns()).unwrap();
        assert_eq!(selected, vec!["age", "income__:type:__continuous"]);
    }

    #[test]
    fn test_resolve_all_features_excludes_confounds() {
        let selected = ColumnSelector::from(TypeSelector::AllFeatures)
            .resolve(&columns())
            .unwrap();
        assert_eq!(selected.len(), 3);
        assert!(!selected.contains(&"site__:type:__confound".to_string()));
    }

    #[test]
    fn test_resolve_multiple_types_without_duplicates() {
        let selected = ColumnSelector::from_strs(["all", "confound"])
            .resolve(&columns())
            .unwrap();
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_resolve_literal_names_is_idempotent() {
        let selector = ColumnSelector::names(["sex__:type:__categorical", "age"]);
        let first = selector.resolve(&columns()).unwrap();
        let second = selector.resolve(&columns()).unwrap();
        assert_eq!(first, vec!["sex__:type:__categorical", "age"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_missing_name() {
        let err = ColumnSelector::names(["weight"]).resolve(&columns()).unwrap_err();
        assert!(matches!(err, PrepError::ColumnNotFound(name) if name == "weight"));
    }

    #[test]
    fn test_resolve_empty_selection() {
        let err = ColumnSelector::from("categorical")
            .resolve(&["age", "site__:type:__confound"])
            .unwrap_err();
        assert!(matches!(err, PrepError::EmptySelection { .. }));
    }

    #[test]
    fn test_is_multi_valued() {
        assert!(ColumnSelector::from("all").is_multi_valued());
        assert!(ColumnSelector::from("all_features").is_multi_valued());
        assert!(ColumnSelector::names(["a", "b"]).is_multi_valued());
        assert!(!ColumnSelector::from("confound").is_multi_valued());
        assert!(!ColumnSelector::names(["a"]).is_multi_valued());
    }

    #[test]
    fn test_selector_serde() {
        let selector: ColumnSelector = serde_json::from_str("\"continuous\"").unwrap();
        assert_eq!(selector, ColumnSelector::from(TypeSelector::Continuous));
        let selector: ColumnSelector = serde_json::from_str(r#"["age", "sex"]"#).unwrap();
        assert_eq!(selector, ColumnSelector::names(["age", "sex"]));
        assert_eq!(serde_json::to_string(&selector).unwrap(), r#"["age","sex"]"#);
    }

    #[test]
    fn test_pick_columns_regex_and_literal() {
        let cols = ["score_1", "score_2", "age", "site"];
        let picked = pick_columns(&["score_.*", "age"], &cols).unwrap();
        assert_eq!(picked, vec!["score_1", "score_2", "age"]);
    }

    #[test]
    fn test_pick_columns_unmatched_pattern() {
        let err = pick_columns(&["weight"], &["age"]).unwrap_err();
        assert!(matches!(err, PrepError::ColumnNotFound(_)));
    }
}

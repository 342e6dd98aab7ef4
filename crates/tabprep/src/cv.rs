//! Cross-validation specification parsing.
//!
//! A CV specification is either an integer fold count, an explicit
//! [`CvScheme`], or a string. Strings are first tried as an integer fold
//! count and then parsed with the compact grammar
//! `repeat:<int>_nfolds:<int>` into a repeated k-fold scheme.

use crate::error::{PrepError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static CV_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^repeat:(\d+)_nfolds:(\d+)$").expect("Invalid regex: CV grammar")
});

/// Cross-validation splitter handed to the external executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CvScheme {
    KFold {
        n_splits: usize,
    },
    StratifiedKFold {
        n_splits: usize,
    },
    RepeatedKFold {
        n_splits: usize,
        n_repeats: usize,
    },
    RepeatedStratifiedKFold {
        n_splits: usize,
        n_repeats: usize,
    },
    LeaveOneOut,
    GroupKFold {
        n_splits: usize,
    },
    GroupShuffleSplit {
        n_splits: usize,
        test_size: f64,
    },
    LeaveOneGroupOut,
    LeavePGroupsOut {
        n_groups: usize,
    },
}

impl Default for CvScheme {
    fn default() -> Self {
        Self::KFold { n_splits: 5 }
    }
}

impl CvScheme {
    pub fn name(&self) -> &'static str {
        match self {
            Self::KFold { .. } => "k_fold",
            Self::StratifiedKFold { .. } => "stratified_k_fold",
            Self::RepeatedKFold { .. } => "repeated_k_fold",
            Self::RepeatedStratifiedKFold { .. } => "repeated_stratified_k_fold",
            Self::LeaveOneOut => "leave_one_out",
            Self::GroupKFold { .. } => "group_k_fold",
            Self::GroupShuffleSplit { .. } => "group_shuffle_split",
            Self::LeaveOneGroupOut => "leave_one_group_out",
            Self::LeavePGroupsOut { .. } => "leave_p_groups_out",
        }
    }

    /// Whether the splitter consumes a groups vector.
    pub fn is_group_aware(&self) -> bool {
        matches!(
            self,
            Self::GroupKFold { .. }
                | Self::GroupShuffleSplit { .. }
                | Self::LeaveOneGroupOut
                | Self::LeavePGroupsOut { .. }
        )
    }

    /// Folds per repetition, when the scheme has a fixed count.
    pub fn n_splits(&self) -> Option<usize> {
        match self {
            Self::KFold { n_splits }
            | Self::StratifiedKFold { n_splits }
            | Self::RepeatedKFold { n_splits, .. }
            | Self::RepeatedStratifiedKFold { n_splits, .. }
            | Self::GroupKFold { n_splits }
            | Self::GroupShuffleSplit { n_splits, .. } => Some(*n_splits),
            Self::LeaveOneOut | Self::LeaveOneGroupOut | Self::LeavePGroupsOut { .. } => None,
        }
    }

    pub fn n_repeats(&self) -> usize {
        match self {
            Self::RepeatedKFold { n_repeats, .. }
            | Self::RepeatedStratifiedKFold { n_repeats, .. } => *n_repeats,
            _ => 1,
        }
    }

    /// Check the scheme's own parameters.
    pub fn validate(&self) -> Result<()> {
        let n_splits = self.n_splits().unwrap_or(2);
        if n_splits < 2 && !matches!(self, Self::GroupShuffleSplit { .. }) {
            return Err(PrepError::InvalidConfig(format!(
                "{} needs at least 2 splits, got {n_splits}",
                self.name()
            )));
        }
        match self {
            Self::RepeatedKFold { n_repeats, .. } | Self::RepeatedStratifiedKFold { n_repeats, .. }
                if *n_repeats == 0 =>
            {
                Err(PrepError::InvalidConfig(format!(
                    "{} needs at least 1 repeat",
                    self.name()
                )))
            }
            Self::GroupShuffleSplit { n_splits, test_size } => {
                if *n_splits == 0 {
                    return Err(PrepError::InvalidConfig(
                        "group_shuffle_split needs at least 1 split".to_string(),
                    ));
                }
                if !(*test_size > 0.0 && *test_size < 1.0) {
                    return Err(PrepError::InvalidConfig(format!(
                        "group_shuffle_split test_size must be in (0, 1), got {test_size}"
                    )));
                }
                Ok(())
            }
            Self::LeavePGroupsOut { n_groups } if *n_groups == 0 => Err(PrepError::InvalidConfig(
                "leave_p_groups_out needs at least 1 group".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for CvScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KFold { n_splits }
            | Self::StratifiedKFold { n_splits }
            | Self::GroupKFold { n_splits } => write!(f, "{}(n_splits={n_splits})", self.name()),
            Self::RepeatedKFold {
                n_splits,
                n_repeats,
            }
            | Self::RepeatedStratifiedKFold {
                n_splits,
                n_repeats,
            } => write!(
                f,
                "{}(n_splits={n_splits}, n_repeats={n_repeats})",
                self.name()
            ),
            Self::GroupShuffleSplit {
                n_splits,
                test_size,
            } => write!(
                f,
                "{}(n_splits={n_splits}, test_size={test_size})",
                self.name()
            ),
            Self::LeavePGroupsOut { n_groups } => write!(f, "{}(n_groups={n_groups})", self.name()),
            Self::LeaveOneOut | Self::LeaveOneGroupOut => f.write_str(self.name()),
        }
    }
}

/// User-facing CV specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CvSpec {
    /// Number of folds of a plain k-fold.
    Folds(usize),
    /// An explicit splitter, passed through.
    Scheme(CvScheme),
    /// The `repeat:<int>_nfolds:<int>` grammar.
    Text(String),
}

impl Default for CvSpec {
    fn default() -> Self {
        Self::Folds(5)
    }
}

impl From<usize> for CvSpec {
    fn from(n_splits: usize) -> Self {
        Self::Folds(n_splits)
    }
}

impl From<CvScheme> for CvSpec {
    fn from(scheme: CvScheme) -> Self {
        Self::Scheme(scheme)
    }
}

impl From<&str> for CvSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Resolve a CV specification into a scheme.
///
/// # Example
///
/// ```rust,ignore
/// use tabprep::{parse_cv, CvScheme};
///
/// let scheme = parse_cv(&"repeat:5_nfolds:5".into())?;
/// assert_eq!(scheme, CvScheme::RepeatedKFold { n_splits: 5, n_repeats: 5 });
/// ```
pub fn parse_cv(spec: &CvSpec) -> Result<CvScheme> {
    match spec {
        CvSpec::Folds(n_splits) => folds(*n_splits),
        CvSpec::Scheme(scheme) => {
            scheme.validate()?;
            Ok(scheme.clone())
        }
        CvSpec::Text(text) => parse_grammar(text),
    }
}

fn folds(n_splits: usize) -> Result<CvScheme> {
    if n_splits < 2 {
        return Err(PrepError::InvalidConfig(format!(
            "the number of CV folds must be at least 2, got {n_splits}"
        )));
    }
    Ok(CvScheme::KFold { n_splits })
}

fn parse_grammar(text: &str) -> Result<CvScheme> {
    let grammar_error = || PrepError::CvGrammar(text.to_string());

    let captures = CV_GRAMMAR.captures(text).ok_or_else(grammar_error)?;
    let n_repeats: usize = captures[1].parse().map_err(|_| grammar_error())?;
    let n_splits: usize = captures[2].parse().map_err(|_| grammar_error())?;
    if n_repeats < 1 || n_splits < 2 {
        return Err(grammar_error());
    }

    Ok(CvScheme::RepeatedKFold {
        n_splits,
        n_repeats,
    })
}

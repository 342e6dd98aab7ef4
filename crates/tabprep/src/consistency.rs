//! Consistency checks between target, problem type and CV scheme.

use crate::config::ProblemType;
use crate::cv::CvScheme;
use crate::diagnostics::{PrepWarning, WarningKind};
use crate::error::{PrepError, Result};
use crate::utils::{is_numeric_dtype, n_distinct};
use polars::prelude::Series;
use tracing::debug;

/// What the checks look at.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyInput<'a> {
    pub problem_type: ProblemType,
    pub target: &'a Series,
    pub cv: &'a CvScheme,
    pub groups_present: bool,
    /// A target transformer is configured; target mismatches become warnings.
    pub target_transformed: bool,
}

/// Check that the target fits the problem type and that groups are used.
///
/// Fails with [`PrepError::InconsistentProblemType`] when the target cannot
/// serve the problem type and no target transformer is configured; every
/// other finding is returned as a warning.
pub fn check_consistency(input: ConsistencyInput<'_>) -> Result<Vec<PrepWarning>> {
    let mut warnings = Vec::new();

    match input.problem_type {
        ProblemType::BinaryClassification => {
            let n_classes = n_distinct(input.target)?;
            if n_classes != 2 {
                let message = format!(
                    "the number of classes ({n_classes}) is not suitable for a binary \
                     classification"
                );
                if !input.target_transformed {
                    return Err(PrepError::InconsistentProblemType(format!(
                        "{message}. You can either specify pos_labels, a suitable y \
                         transformer or change the problem type"
                    )));
                }
                warnings.push(PrepWarning::new(
                    WarningKind::ProblemTypeMismatch,
                    format!("{message}. However, a y transformer has been set"),
                ));
            }
        }
        ProblemType::MulticlassClassification => {
            if n_distinct(input.target)? == 2 {
                warnings.push(PrepWarning::new(
                    WarningKind::SuspiciousClassCount,
                    "a multiclass classification will be performed but only 2 classes are \
                     defined in y",
                ));
            }
        }
        ProblemType::Regression => {
            let dtype = input.target.dtype();
            if !is_numeric_dtype(dtype) {
                let message =
                    format!("the kind of values in y ({dtype}) is not suitable for a regression");
                if !input.target_transformed {
                    return Err(PrepError::InconsistentProblemType(format!(
                        "{message}. You can either specify a suitable y transformer or \
                         change the problem type"
                    )));
                }
                warnings.push(PrepWarning::new(
                    WarningKind::ProblemTypeMismatch,
                    format!("{message}. However, a y transformer has been set"),
                ));
            } else if n_distinct(input.target)? == 2 {
                warnings.push(PrepWarning::new(
                    WarningKind::SuspiciousClassCount,
                    "a regression will be performed but only 2 distinct values are defined in y",
                ));
            }
        }
    }

    if input.groups_present && !input.cv.is_group_aware() {
        warnings.push(PrepWarning::new(
            WarningKind::GroupsIgnoredByCv,
            format!(
                "the parameter groups was specified but the CV strategy ({}) will not \
                 consider them",
                input.cv.name()
            ),
        ));
    }

    debug!("Consistency checks produced {} warning(s)", warnings.len());
    Ok(warnings)
}

//! Hyperparameter path rewriting and model selection configuration.
//!
//! User-facing names are flat and scoped: `features__impute__n_neighbors`,
//! `confounds__zscore__with_mean`, `target__scaler__with_std`,
//! `svm__C`. The scope is rewritten to the branch of the assembled pipeline
//! it addresses:
//!
//! | scope          | branch                              |
//! |----------------|-------------------------------------|
//! | `features`     | `dataframe_pipeline`                |
//! | `confounds`    | `confound_dataframe_pipeline`       |
//! | `target`       | `y_transformer`                     |
//! | `<model_name>` | `dataframe_pipeline__<model_name>`  |
//!
//! The literal scope `model` is accepted as an alias for the active model.

use crate::cv::{CvScheme, CvSpec, parse_cv};
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// Separator between path segments of a hyperparameter name.
pub const PATH_SEP: &str = "__";

pub const FEATURES_BRANCH: &str = "dataframe_pipeline";
pub const CONFOUNDS_BRANCH: &str = "confound_dataframe_pipeline";
pub const TARGET_BRANCH: &str = "y_transformer";
/// Scope alias for the active model.
pub const MODEL_ALIAS: &str = "model";

/// Flat hyperparameter names mapped to a value or to a list of candidates.
pub type Hyperparameters = BTreeMap<String, Value>;

/// Rewritten hyperparameters split into fixed assignments and a search grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterPlan {
    /// Parameters set once on the pipeline.
    pub fixed: BTreeMap<String, Value>,
    /// Parameters with more than one candidate.
    pub grid: BTreeMap<String, Vec<Value>>,
}

impl HyperparameterPlan {
    /// Whether any parameter needs to be searched.
    pub fn is_tunable(&self) -> bool {
        !self.grid.is_empty()
    }

    /// Number of grid points, saturating at `usize::MAX`.
    pub fn n_candidates(&self) -> usize {
        grid_size(self.grid.values().map(Vec::len))
    }
}

fn grid_size(axes: impl IntoIterator<Item = usize>) -> usize {
    axes.into_iter().fold(1, usize::saturating_mul)
}

/// Rewrite a single flat name into the nested pipeline address.
pub fn rewrite_name(name: &str, model_name: &str) -> Result<String> {
    let (first, rest) = match name.split_once(PATH_SEP) {
        Some((first, rest)) => (first, Some(rest)),
        None => (name, None),
    };

    let branch = match first {
        "features" => FEATURES_BRANCH.to_string(),
        "confounds" => CONFOUNDS_BRANCH.to_string(),
        "target" => TARGET_BRANCH.to_string(),
        scope if scope == model_name || scope == MODEL_ALIAS => {
            format!("{FEATURES_BRANCH}{PATH_SEP}{model_name}")
        }
        _ => {
            return Err(PrepError::HyperparameterScope {
                name: name.to_string(),
                model_name: model_name.to_string(),
            });
        }
    };

    Ok(match rest {
        Some(rest) => format!("{branch}{PATH_SEP}{rest}"),
        None => branch,
    })
}

/// Rewrite every name and decide, per parameter, fixed value or grid axis.
///
/// Lists with more than one element become grid axes, lists with one element
/// are fixed to that element. Strings and other scalars are always fixed.
pub fn rewrite_hyperparameters(
    hyperparameters: &Hyperparameters,
    model_name: &str,
) -> Result<HyperparameterPlan> {
    let mut plan = HyperparameterPlan::default();

    for (name, value) in hyperparameters {
        let path = rewrite_name(name, model_name)?;
        match value {
            Value::Array(candidates) => match candidates.as_slice() {
                [] => {
                    return Err(PrepError::InvalidConfig(format!(
                        "hyperparameter '{name}' has no candidate values"
                    )));
                }
                [single] => {
                    info!("Setting hyperparameter {} = {}", path, single);
                    plan.fixed.insert(path, single.clone());
                }
                _ => {
                    plan.grid.insert(path, candidates.clone());
                }
            },
            scalar => {
                info!("Setting hyperparameter {} = {}", path, scalar);
                plan.fixed.insert(path, scalar.clone());
            }
        }
    }
    Ok(plan)
}

/// User-facing model selection settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSelectionSpec {
    pub hyperparameters: Option<Hyperparameters>,
    /// Inner CV of the search; the outer scheme is reused when absent.
    pub cv: Option<CvSpec>,
    /// Scoring name handed to the search engine unchanged.
    pub scoring: Option<String>,
}

/// Configuration of the grid search run by the external executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub grid: BTreeMap<String, Vec<Value>>,
    pub cv: CvScheme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<String>,
}

/// Result of [`prepare_model_selection`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    /// Assignments applied to the pipeline before any fitting.
    pub fixed: BTreeMap<String, Value>,
    /// Present only when at least one parameter has several candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchPlan>,
}

/// Rewrite the hyperparameters and, if any need tuning, configure the search.
pub fn prepare_model_selection(
    spec: &ModelSelectionSpec,
    model_name: &str,
    outer_cv: &CvScheme,
) -> Result<ModelSelection> {
    let hyperparameters = spec.hyperparameters.as_ref().ok_or_else(|| {
        PrepError::InvalidConfig(
            "the 'hyperparameters' value must be specified for model selection".to_string(),
        )
    })?;

    let plan = rewrite_hyperparameters(hyperparameters, model_name)?;
    if !plan.is_tunable() {
        return Ok(ModelSelection {
            fixed: plan.fixed,
            search: None,
        });
    }

    info!(
        "Tuning {} hyperparameter(s) with grid search ({} candidates)",
        plan.grid.len(),
        plan.n_candidates()
    );
    let cv = match &spec.cv {
        Some(inner) => {
            let scheme = parse_cv(inner)?;
            info!("Cross validating the search using {}", scheme);
            scheme
        }
        None => {
            info!("Cross validating the search using the same scheme as for model evaluation");
            outer_cv.clone()
        }
    };
    if let Some(scoring) = &spec.scoring {
        info!("Grid search scoring: {}", scoring);
    }

    Ok(ModelSelection {
        fixed: plan.fixed,
        search: Some(SearchPlan {
            grid: plan.grid,
            cv,
            scoring: spec.scoring.clone(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(value: Value) -> Hyperparameters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_rewrite_scopes() {
        assert_eq!(
            rewrite_name("features__impute__n_neighbors", "svm").unwrap(),
            "dataframe_pipeline__impute__n_neighbors"
        );
        assert_eq!(
            rewrite_name("confounds__zscore__with_mean", "svm").unwrap(),
            "confound_dataframe_pipeline__zscore__with_mean"
        );
        assert_eq!(
            rewrite_name("target__scaler__with_std", "svm").unwrap(),
            "y_transformer__scaler__with_std"
        );
        assert_eq!(rewrite_name("svm__C", "svm").unwrap(), "dataframe_pipeline__svm__C");
        assert_eq!(rewrite_name("model__C", "svm").unwrap(), "dataframe_pipeline__svm__C");
    }

    #[test]
    fn test_rewrite_unknown_scope() {
        let err = rewrite_name("rf__n_estimators", "svm").unwrap_err();
        assert!(matches!(
            err,
            PrepError::HyperparameterScope { ref name, ref model_name }
                if name == "rf__n_estimators" && model_name == "svm"
        ));
        // scope must match the whole first segment
        assert!(rewrite_name("featuresx__a", "svm").is_err());
    }

    #[test]
    fn test_grid_and_fixed_split() {
        let plan = rewrite_hyperparameters(
            &params(json!({
                "model__C": [0.1, 1, 10],
                "features__impute__n_neighbors": 5,
            })),
            "svm",
        )
        .unwrap();

        assert_eq!(plan.grid.len(), 1);
        assert_eq!(
            plan.grid["dataframe_pipeline__svm__C"],
            vec![json!(0.1), json!(1), json!(10)]
        );
        assert_eq!(plan.fixed.len(), 1);
        assert_eq!(
            plan.fixed["dataframe_pipeline__impute__n_neighbors"],
            json!(5)
        );
        assert_eq!(plan.n_candidates(), 3);
    }

    #[test]
    fn test_n_candidates_multiplies_axes() {
        let plan = rewrite_hyperparameters(
            &params(json!({
                "model__C": [0.1, 1, 10],
                "model__kernel": ["linear", "rbf"],
            })),
            "svm",
        )
        .unwrap();
        assert_eq!(plan.n_candidates(), 6);
    }

    #[test]
    fn test_grid_size_saturates() {
        assert_eq!(grid_size([usize::MAX, 2]), usize::MAX);
        assert_eq!(grid_size([]), 1);
    }

    #[test]
    fn test_single_candidate_and_strings_are_fixed() {
        let plan = rewrite_hyperparameters(
            &params(json!({
                "svm__kernel": "linear",
                "svm__C": [2.0],
            })),
            "svm",
        )
        .unwrap();
        assert!(!plan.is_tunable());
        assert_eq!(plan.fixed["dataframe_pipeline__svm__kernel"], json!("linear"));
        assert_eq!(plan.fixed["dataframe_pipeline__svm__C"], json!(2.0));
    }

    #[test]
    fn test_empty_candidate_list() {
        let err = rewrite_hyperparameters(&params(json!({"svm__C": []})), "svm").unwrap_err();
        assert!(matches!(err, PrepError::InvalidConfig(_)));
    }

    #[test]
    fn test_model_selection_requires_hyperparameters() {
        let err = prepare_model_selection(
            &ModelSelectionSpec::default(),
            "svm",
            &CvScheme::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PrepError::InvalidConfig(_)));
    }

    #[test]
    fn test_model_selection_reuses_outer_cv() {
        let outer = CvScheme::RepeatedKFold {
            n_splits: 5,
            n_repeats: 2,
        };
        let spec = ModelSelectionSpec {
            hyperparameters: Some(params(json!({"svm__C": [1, 10]}))),
            cv: None,
            scoring: Some("accuracy".to_string()),
        };
        let selection = prepare_model_selection(&spec, "svm", &outer).unwrap();
        let search = selection.search.unwrap();
        assert_eq!(search.cv, outer);
        assert_eq!(search.scoring.as_deref(), Some("accuracy"));
    }

    #[test]
    fn test_model_selection_inner_cv() {
        let spec = ModelSelectionSpec {
            hyperparameters: Some(params(json!({"svm__C": [1, 10], "svm__gamma": 0.1}))),
            cv: Some("repeat:2_nfolds:3".into()),
            scoring: None,
        };
        let selection = prepare_model_selection(&spec, "svm", &CvScheme::default()).unwrap();
        assert_eq!(
            selection.search.unwrap().cv,
            CvScheme::RepeatedKFold {
                n_splits: 3,
                n_repeats: 2
            }
        );
        assert_eq!(selection.fixed.len(), 1);
    }

    #[test]
    fn test_model_selection_without_grid() {
        let spec = ModelSelectionSpec {
            hyperparameters: Some(params(json!({"svm__C": 1}))),
            cv: Some("repeat:nope".into()),
            scoring: None,
        };
        // inner CV is only parsed when a search is needed
        let selection = prepare_model_selection(&spec, "svm", &CvScheme::default()).unwrap();
        assert!(selection.search.is_none());
    }
}

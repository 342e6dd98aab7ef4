//! Configuration types for experiment preparation.
//!
//! This module provides [`PrepareConfig`] and its builder, as well as the
//! [`ProblemType`] enum.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabprep::{PrepareConfig, ProblemType};
//!
//! let config = PrepareConfig::builder()
//!     .problem_type(ProblemType::Regression)
//!     .model_name("svm")
//!     .cv("repeat:5_nfolds:5")
//!     .preprocess_x(["zscore"])
//!     .build()?;
//! ```

use crate::cv::CvSpec;
use crate::error::{PrepError, Result};
use crate::hyperparams::{Hyperparameters, ModelSelectionSpec};
use crate::input::PosLabels;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The kind of learning problem the prepared data is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    /// Exactly two target classes.
    #[default]
    BinaryClassification,
    /// More than two target classes.
    MulticlassClassification,
    /// Numeric target.
    Regression,
}

impl ProblemType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemType::BinaryClassification => "binary_classification",
            ProblemType::MulticlassClassification => "multiclass_classification",
            ProblemType::Regression => "regression",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemType {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary_classification" => Ok(Self::BinaryClassification),
            "multiclass_classification" => Ok(Self::MulticlassClassification),
            "regression" => Ok(Self::Regression),
            other => Err(PrepError::InvalidConfig(format!(
                "unknown problem type '{other}', expected binary_classification, \
                 multiclass_classification or regression"
            ))),
        }
    }
}

/// Hyperparameter scopes that cannot double as a model name.
pub const RESERVED_SCOPES: [&str; 3] = ["features", "confounds", "target"];

/// Configuration for [`Preparation`](crate::Preparation).
///
/// Use [`PrepareConfig::builder()`] to construct and validate a configuration,
/// or load one from JSON with [`PrepareConfig::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareConfig {
    /// Problem type checked against the target values.
    pub problem_type: ProblemType,

    /// Name of the model; also the hyperparameter scope of the model branch.
    pub model_name: String,

    /// Target values mapped to 1 (everything else maps to 0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_labels: Option<PosLabels>,

    /// Outer cross-validation.
    pub cv: CvSpec,

    /// Flat, scoped hyperparameters. Presence enables model selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperparameters: Option<Hyperparameters>,

    /// Inner CV of the hyperparameter search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_cv: Option<CvSpec>,

    /// Scoring of the hyperparameter search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_scoring: Option<String>,

    /// Feature preprocessing steps, by factory name.
    pub preprocess_x: Vec<String>,

    /// Confound preprocessing steps, by factory name.
    pub preprocess_confounds: Vec<String>,

    /// Target preprocessing step, by factory name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preprocess_y: Option<String>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            problem_type: ProblemType::default(),
            model_name: "model".to_string(),
            pos_labels: None,
            cv: CvSpec::default(),
            hyperparameters: None,
            search_cv: None,
            search_scoring: None,
            preprocess_x: Vec::new(),
            preprocess_confounds: Vec::new(),
            preprocess_y: None,
        }
    }
}

impl PrepareConfig {
    #[must_use]
    pub fn builder() -> PrepareConfigBuilder {
        PrepareConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Model selection settings, when any of them is configured.
    pub fn model_selection(&self) -> Option<ModelSelectionSpec> {
        if self.hyperparameters.is_none()
            && self.search_cv.is_none()
            && self.search_scoring.is_none()
        {
            return None;
        }
        Some(ModelSelectionSpec {
            hyperparameters: self.hyperparameters.clone(),
            cv: self.search_cv.clone(),
            scoring: self.search_scoring.clone(),
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.model_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptyModelName);
        }
        if RESERVED_SCOPES.contains(&self.model_name.as_str()) {
            return Err(ConfigValidationError::ReservedModelName(
                self.model_name.clone(),
            ));
        }

        let steps = [
            ("preprocess_x", self.preprocess_x.as_slice()),
            ("preprocess_confounds", self.preprocess_confounds.as_slice()),
            ("preprocess_y", self.preprocess_y.as_slice()),
        ];
        for (field, names) in steps {
            if names.iter().any(|name| name.trim().is_empty()) {
                return Err(ConfigValidationError::EmptyStepName {
                    field: field.to_string(),
                });
            }
        }

        if let Some(scoring) = &self.search_scoring {
            if scoring.trim().is_empty() {
                return Err(ConfigValidationError::EmptyScoring);
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Model name must not be empty")]
    EmptyModelName,

    #[error("Model name '{0}' is reserved for a hyperparameter scope")]
    ReservedModelName(String),

    #[error("Empty step name in '{field}'")]
    EmptyStepName { field: String },

    #[error("Search scoring must not be empty")]
    EmptyScoring,
}

/// Builder for [`PrepareConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PrepareConfigBuilder {
    problem_type: Option<ProblemType>,
    model_name: Option<String>,
    pos_labels: Option<PosLabels>,
    cv: Option<CvSpec>,
    hyperparameters: Option<Hyperparameters>,
    search_cv: Option<CvSpec>,
    search_scoring: Option<String>,
    preprocess_x: Vec<String>,
    preprocess_confounds: Vec<String>,
    preprocess_y: Option<String>,
}

impl PrepareConfigBuilder {
    #[must_use]
    pub fn problem_type(mut self, problem_type: ProblemType) -> Self {
        self.problem_type = Some(problem_type);
        self
    }

    #[must_use]
    pub fn model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn pos_labels(mut self, labels: impl Into<PosLabels>) -> Self {
        self.pos_labels = Some(labels.into());
        self
    }

    /// Outer CV: a fold count, a scheme or a `repeat:<int>_nfolds:<int>` string.
    #[must_use]
    pub fn cv(mut self, cv: impl Into<CvSpec>) -> Self {
        self.cv = Some(cv.into());
        self
    }

    #[must_use]
    pub fn hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.hyperparameters = Some(hyperparameters);
        self
    }

    /// Set a single hyperparameter (a list value becomes a grid axis).
    #[must_use]
    pub fn hyperparameter(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.hyperparameters
            .get_or_insert_with(Hyperparameters::new)
            .insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn search_cv(mut self, cv: impl Into<CvSpec>) -> Self {
        self.search_cv = Some(cv.into());
        self
    }

    #[must_use]
    pub fn search_scoring(mut self, scoring: impl Into<String>) -> Self {
        self.search_scoring = Some(scoring.into());
        self
    }

    #[must_use]
    pub fn preprocess_x<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preprocess_x = steps.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn preprocess_confounds<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preprocess_confounds = steps.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn preprocess_y(mut self, step: impl Into<String>) -> Self {
        self.preprocess_y = Some(step.into());
        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> std::result::Result<PrepareConfig, ConfigValidationError> {
        let defaults = PrepareConfig::default();
        let config = PrepareConfig {
            problem_type: self.problem_type.unwrap_or(defaults.problem_type),
            model_name: self.model_name.unwrap_or(defaults.model_name),
            pos_labels: self.pos_labels,
            cv: self.cv.unwrap_or(defaults.cv),
            hyperparameters: self.hyperparameters,
            search_cv: self.search_cv,
            search_scoring: self.search_scoring,
            preprocess_x: self.preprocess_x,
            preprocess_confounds: self.preprocess_confounds,
            preprocess_y: self.preprocess_y,
        };

        config.validate()?;
        Ok(config)
    }
}

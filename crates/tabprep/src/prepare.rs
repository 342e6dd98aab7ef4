//! Experiment preparation orchestrator.
//!
//! [`Preparation`] runs the whole flow: normalize the raw input, resolve the
//! preprocessing steps, parse the CV scheme, rewrite the hyperparameters and
//! check consistency. Warnings from every stage are forwarded to the
//! configured [`WarningSink`] and also returned with the result.

use crate::config::PrepareConfig;
use crate::consistency::{ConsistencyInput, check_consistency};
use crate::cv::{CvScheme, parse_cv};
use crate::diagnostics::{ClosureWarningSink, PrepWarning, TracingSink, WarningSink};
use crate::error::{PrepError, Result, ResultExt};
use crate::hyperparams::{ModelSelection, SearchPlan, prepare_model_selection};
use crate::input::{RawInput, normalize};
use crate::preprocessing::{PreprocessingPlan, StepSpec, TargetStepSpec, TransformerFactory};
use crate::utils::column_names;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Prepares data and configuration for an external pipeline executor.
///
/// # Example
///
/// ```rust,ignore
/// use tabprep::{Preparation, PrepareConfig, RawInput};
/// use std::sync::Arc;
///
/// let prepared = Preparation::builder()
///     .config(PrepareConfig::builder().model_name("svm").preprocess_x(["zscore"]).build()?)
///     .factory(Arc::new(registry))
///     .on_warning(|w| eprintln!("warning: {w}"))
///     .build()?
///     .prepare(&RawInput::table(df, vec!["age", "income"], "label"))?;
/// ```
pub struct Preparation {
    config: PrepareConfig,
    factory: Option<Arc<dyn TransformerFactory>>,
    sink: Arc<dyn WarningSink>,
    feature_steps: Vec<StepSpec>,
    confound_steps: Vec<StepSpec>,
    target_step: Option<TargetStepSpec>,
}

static_assertions::assert_impl_all!(Preparation: Send, Sync);

impl Preparation {
    pub fn builder() -> PreparationBuilder {
        PreparationBuilder::default()
    }

    pub fn config(&self) -> &PrepareConfig {
        &self.config
    }

    /// Run the preparation on raw input.
    pub fn prepare(&self, input: &RawInput) -> Result<PreparedExperiment> {
        info!(
            "Preparing a {} experiment for model '{}'",
            self.config.problem_type, self.config.model_name
        );
        let mut warnings = Vec::new();

        let normalized = normalize(input, self.config.pos_labels.as_ref())
            .context("preparing input data")?;
        warnings.extend(normalized.warnings.iter().cloned());

        let preprocessing = self.preprocessing_plan()?;

        let cv = parse_cv(&self.config.cv).context("preparing cross-validation")?;
        info!("Cross validating using {}", cv);

        let model_selection = match self.config.model_selection() {
            Some(spec) => prepare_model_selection(&spec, &self.config.model_name, &cv)
                .context("preparing model selection")?,
            None => ModelSelection::default(),
        };

        warnings.extend(check_consistency(ConsistencyInput {
            problem_type: self.config.problem_type,
            target: &normalized.target,
            cv: &cv,
            groups_present: normalized.groups.is_some(),
            target_transformed: preprocessing.has_target_transform(),
        })?);

        for warning in &warnings {
            self.sink.warn(warning);
        }

        Ok(PreparedExperiment {
            table: normalized.table,
            target: normalized.target,
            groups: normalized.groups,
            confound_names: normalized.confound_names,
            preprocessing,
            cv,
            model_selection,
            warnings,
        })
    }

    fn preprocessing_plan(&self) -> Result<PreprocessingPlan> {
        let features = self
            .config
            .preprocess_x
            .iter()
            .map(|name| StepSpec::from(name.as_str()))
            .chain(self.feature_steps.iter().cloned())
            .collect();
        let confounds = self
            .config
            .preprocess_confounds
            .iter()
            .map(|name| StepSpec::from(name.as_str()))
            .chain(self.confound_steps.iter().cloned())
            .collect();
        let target = match (&self.config.preprocess_y, &self.target_step) {
            (Some(name), _) => Some(TargetStepSpec::from(name.as_str())),
            (None, step) => step.clone(),
        };

        PreprocessingPlan::build(features, confounds, target, self.factory.as_deref())
            .context("preparing preprocessing")
    }
}

/// Builder for [`Preparation`].
#[derive(Default)]
pub struct PreparationBuilder {
    config: Option<PrepareConfig>,
    factory: Option<Arc<dyn TransformerFactory>>,
    sink: Option<Arc<dyn WarningSink>>,
    feature_steps: Vec<StepSpec>,
    confound_steps: Vec<StepSpec>,
    target_step: Option<TargetStepSpec>,
}

impl PreparationBuilder {
    pub fn config(mut self, config: PrepareConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Factory used to resolve steps given by name.
    pub fn factory(mut self, factory: Arc<dyn TransformerFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sink receiving advisory warnings. Defaults to [`TracingSink`].
    pub fn warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Receive warnings through a closure.
    pub fn on_warning<F>(self, callback: F) -> Self
    where
        F: Fn(&PrepWarning) + Send + Sync + 'static,
    {
        self.warning_sink(Arc::new(ClosureWarningSink::new(callback)))
    }

    /// Feature step appended after the configured step names.
    pub fn feature_step(mut self, step: impl Into<StepSpec>) -> Self {
        self.feature_steps.push(step.into());
        self
    }

    /// Confound step appended after the configured step names.
    pub fn confound_step(mut self, step: impl Into<StepSpec>) -> Self {
        self.confound_steps.push(step.into());
        self
    }

    pub fn target_step(mut self, step: impl Into<TargetStepSpec>) -> Self {
        self.target_step = Some(step.into());
        self
    }

    pub fn build(self) -> Result<Preparation> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        if config.preprocess_y.is_some() && self.target_step.is_some() {
            return Err(PrepError::InvalidConfig(
                "the target step is given both by name and as a transformer".to_string(),
            ));
        }

        Ok(Preparation {
            config,
            factory: self.factory,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            feature_steps: self.feature_steps,
            confound_steps: self.confound_steps,
            target_step: self.target_step,
        })
    }
}

/// Everything the external executor needs to run the experiment.
#[derive(Debug, Clone)]
pub struct PreparedExperiment {
    /// Typed table of features and confounds.
    pub table: DataFrame,
    pub target: Series,
    pub groups: Option<Series>,
    pub confound_names: Vec<String>,
    pub preprocessing: PreprocessingPlan,
    pub cv: CvScheme,
    pub model_selection: ModelSelection,
    pub warnings: Vec<PrepWarning>,
}

impl PreparedExperiment {
    /// Serializable overview of the preparation.
    pub fn summary(&self) -> PreparationSummary {
        PreparationSummary {
            n_samples: self.table.height(),
            columns: column_names(&self.table),
            confound_names: self.confound_names.clone(),
            target: self.target.name().to_string(),
            groups: self.groups.as_ref().map(|g| g.name().to_string()),
            feature_steps: self.preprocessing.features.iter().map(|s| s.name.clone()).collect(),
            confound_steps: self
                .preprocessing
                .confounds
                .iter()
                .map(|s| s.name.clone())
                .collect(),
            target_step: self.preprocessing.target.as_ref().map(|t| t.name.clone()),
            cv: self.cv.clone(),
            fixed_hyperparameters: self.model_selection.fixed.clone(),
            search: self.model_selection.search.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// Overview of a [`PreparedExperiment`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparationSummary {
    pub n_samples: usize,
    pub columns: Vec<String>,
    pub confound_names: Vec<String>,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<String>,
    pub feature_steps: Vec<String>,
    pub confound_steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_step: Option<String>,
    pub cv: CvScheme,
    pub fixed_hyperparameters: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchPlan>,
    pub warnings: Vec<PrepWarning>,
}

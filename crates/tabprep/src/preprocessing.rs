//! Preprocessing step construction.
//!
//! User steps are given as factory names, transformer instances or pre-built
//! [`TransformStep`]s. They are turned into ordered, immutable step specs
//! for three branches: features, confounds and target.

use crate::columns::{ColumnSelector, TypeSelector};
use crate::error::{PrepError, Result, ResultExt};
use crate::transformers::{ColumnTransformer, ReturnedFeatures, TableTransformer, TransformerChain};
use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Step name that transforms both continuous and confound columns.
pub const REMOVE_CONFOUND: &str = "remove_confound";

/// Resolves step names to transformer instances.
pub trait TransformerFactory: Send + Sync {
    /// Transformer for the feature or confound branch, with its default policy.
    fn get_transformer(&self, name: &str) -> Result<(Box<dyn TableTransformer>, ReturnedFeatures)>;

    /// Transformer applied to the target.
    fn get_target_transformer(&self, name: &str) -> Result<Box<dyn TableTransformer>>;
}

type Constructor = Arc<dyn Fn() -> Box<dyn TableTransformer> + Send + Sync>;

/// A [`TransformerFactory`] backed by registered constructors.
///
/// # Example
///
/// ```rust,ignore
/// use tabprep::{ReturnedFeatures, TransformerRegistry};
///
/// let registry = TransformerRegistry::new()
///     .register("zscore", ReturnedFeatures::Same, || Box::new(ZScore::default()))
///     .register_target("zscore", || Box::new(ZScore::default()));
/// ```
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    transformers: HashMap<String, (Constructor, ReturnedFeatures)>,
    target_transformers: HashMap<String, Constructor>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: impl Into<String>, returned_features: ReturnedFeatures, ctor: F) -> Self
    where
        F: Fn() -> Box<dyn TableTransformer> + Send + Sync + 'static,
    {
        self.transformers
            .insert(name.into(), (Arc::new(ctor), returned_features));
        self
    }

    pub fn register_target<F>(mut self, name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn() -> Box<dyn TableTransformer> + Send + Sync + 'static,
    {
        self.target_transformers.insert(name.into(), Arc::new(ctor));
        self
    }

    /// Registered feature/confound step names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transformers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("transformers", &self.names())
            .field("target_transformers", &self.target_transformers.len())
            .finish()
    }
}

impl TransformerFactory for TransformerRegistry {
    fn get_transformer(&self, name: &str) -> Result<(Box<dyn TableTransformer>, ReturnedFeatures)> {
        self.transformers
            .get(name)
            .map(|(ctor, returned_features)| (ctor(), *returned_features))
            .ok_or_else(|| PrepError::InvalidConfig(format!("unknown transformer '{name}'")))
    }

    fn get_target_transformer(&self, name: &str) -> Result<Box<dyn TableTransformer>> {
        self.target_transformers
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| PrepError::InvalidConfig(format!("unknown target transformer '{name}'")))
    }
}

/// A fully resolved preprocessing step.
#[derive(Debug, Clone)]
pub struct TransformStep {
    pub name: String,
    pub transformer: Box<dyn TableTransformer>,
    pub returned_features: ReturnedFeatures,
    pub target_columns: ColumnSelector,
}

impl TransformStep {
    /// Step targeting the default columns for its name.
    pub fn new(
        name: impl Into<String>,
        transformer: Box<dyn TableTransformer>,
        returned_features: ReturnedFeatures,
    ) -> Self {
        let name = name.into();
        let target_columns = default_target_columns(&name);
        Self {
            name,
            transformer,
            returned_features,
            target_columns,
        }
    }

    pub fn with_target_columns(mut self, selector: impl Into<ColumnSelector>) -> Self {
        self.target_columns = selector.into();
        self
    }

    /// The column wrapper this step configures.
    pub fn to_wrapper(&self) -> ColumnTransformer {
        ColumnTransformer::new(self.transformer.clone())
            .with_columns(self.target_columns.clone())
            .with_returned_features(self.returned_features)
    }
}

/// Continuous and confound columns for `remove_confound`, continuous otherwise.
pub fn default_target_columns(name: &str) -> ColumnSelector {
    if name == REMOVE_CONFOUND {
        ColumnSelector::types([TypeSelector::Continuous, TypeSelector::Confound])
    } else {
        ColumnSelector::from(TypeSelector::Continuous)
    }
}

/// A user-supplied preprocessing step.
#[derive(Debug, Clone)]
pub enum StepSpec {
    /// Resolved through a [`TransformerFactory`].
    Name(String),
    /// Used as is; named by its kind.
    Transformer(Box<dyn TableTransformer>),
    /// Already built; passed through unchanged.
    Step(TransformStep),
}

impl From<&str> for StepSpec {
    fn from(name: &str) -> Self {
        StepSpec::Name(name.to_string())
    }
}

impl From<String> for StepSpec {
    fn from(name: String) -> Self {
        StepSpec::Name(name)
    }
}

impl From<Box<dyn TableTransformer>> for StepSpec {
    fn from(transformer: Box<dyn TableTransformer>) -> Self {
        StepSpec::Transformer(transformer)
    }
}

impl From<TransformStep> for StepSpec {
    fn from(step: TransformStep) -> Self {
        StepSpec::Step(step)
    }
}

/// A user-supplied target step.
#[derive(Debug, Clone)]
pub enum TargetStepSpec {
    Name(String),
    Transformer(Box<dyn TableTransformer>),
}

impl From<&str> for TargetStepSpec {
    fn from(name: &str) -> Self {
        TargetStepSpec::Name(name.to_string())
    }
}

impl From<Box<dyn TableTransformer>> for TargetStepSpec {
    fn from(transformer: Box<dyn TableTransformer>) -> Self {
        TargetStepSpec::Transformer(transformer)
    }
}

fn require_factory<'a>(
    factory: Option<&'a dyn TransformerFactory>,
    name: &str,
) -> Result<&'a dyn TransformerFactory> {
    factory.ok_or_else(|| {
        PrepError::InvalidConfig(format!(
            "step '{name}' is given by name but no transformer factory is configured"
        ))
    })
}

fn resolve_step(spec: StepSpec, factory: Option<&dyn TransformerFactory>) -> Result<TransformStep> {
    match spec {
        StepSpec::Name(name) => {
            let (transformer, returned_features) = require_factory(factory, &name)?
                .get_transformer(&name)
                .context(format!("resolving step '{name}'"))?;
            Ok(TransformStep::new(name, transformer, returned_features))
        }
        StepSpec::Transformer(transformer) => {
            let name = transformer.kind();
            Ok(TransformStep::new(name, transformer, ReturnedFeatures::Unknown))
        }
        StepSpec::Step(step) => Ok(step),
    }
}

/// Resolve feature-branch steps in order.
pub fn build_feature_steps(
    specs: Vec<StepSpec>,
    factory: Option<&dyn TransformerFactory>,
) -> Result<Vec<TransformStep>> {
    specs
        .into_iter()
        .map(|spec| resolve_step(spec, factory))
        .collect()
}

/// Resolve confound-branch steps.
///
/// Confounds form a single type group, so every step must end up with the
/// same returned-features policy. `unknown` counts as `unknown_same_type`
/// here, and transformer instances default to `unknown_same_type`. Steps
/// given by name or instance target the `confound` columns.
pub fn build_confound_steps(
    specs: Vec<StepSpec>,
    factory: Option<&dyn TransformerFactory>,
) -> Result<Vec<TransformStep>> {
    let mut steps = Vec::with_capacity(specs.len());
    for spec in specs {
        let step = match spec {
            StepSpec::Step(step) => step,
            spec => resolve_step(spec, factory)?.with_target_columns(TypeSelector::Confound),
        };
        steps.push(step);
    }

    let mut agreed: Option<ReturnedFeatures> = None;
    for step in &steps {
        let policy = match step.returned_features {
            ReturnedFeatures::Unknown => ReturnedFeatures::UnknownSameType,
            other => other,
        };
        match agreed {
            Some(previous) if previous != policy => {
                return Err(PrepError::UnsupportedPolicy(format!(
                    "confound steps must agree on one returned features policy, found \
                     '{previous}' and '{policy}' (step '{}')",
                    step.name
                )));
            }
            _ => agreed = Some(policy),
        }
    }

    if let Some(policy) = agreed {
        debug!("Confound steps use returned features '{}'", policy);
        for step in &mut steps {
            step.returned_features = policy;
        }
    }
    Ok(steps)
}

/// Transformer applied to the target as a single-column table.
#[derive(Debug, Clone)]
pub struct TargetStep {
    pub name: String,
    pub transformer: Box<dyn TableTransformer>,
}

impl TargetStep {
    pub fn build(spec: TargetStepSpec, factory: Option<&dyn TransformerFactory>) -> Result<Self> {
        match spec {
            TargetStepSpec::Name(name) => {
                let transformer = require_factory(factory, &name)?
                    .get_target_transformer(&name)
                    .context(format!("resolving target step '{name}'"))?;
                Ok(Self { name, transformer })
            }
            TargetStepSpec::Transformer(transformer) => Ok(Self {
                name: transformer.kind(),
                transformer,
            }),
        }
    }

    pub fn fit(&self, target: &Series) -> Result<FittedTargetStep> {
        let mut transformer = self.transformer.clone_box();
        let table = DataFrame::new(vec![target.clone().into_column()])?;
        transformer
            .fit(&table, Some(target))
            .context(format!("fitting target step '{}'", self.name))?;
        Ok(FittedTargetStep {
            name: self.name.clone(),
            transformer,
        })
    }
}

/// A fitted target step.
#[derive(Debug, Clone)]
pub struct FittedTargetStep {
    name: String,
    transformer: Box<dyn TableTransformer>,
}

impl FittedTargetStep {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transform the target; the result keeps the target's name.
    pub fn transform(&self, target: &Series) -> Result<Series> {
        let table = DataFrame::new(vec![target.clone().into_column()])?;
        let output = self
            .transformer
            .transform(&table)
            .context(format!("transforming target with '{}'", self.name))?;

        if output.width() != 1 || output.height() != target.len() {
            return Err(PrepError::InvalidInputShape(format!(
                "target step '{}' must return one column of {} rows, got shape {:?}",
                self.name,
                target.len(),
                output.shape()
            )));
        }
        let column = output.get_columns()[0].clone();
        Ok(column
            .as_materialized_series()
            .clone()
            .with_name(target.name().clone()))
    }
}

/// Resolved steps of the three preprocessing branches.
#[derive(Debug, Clone, Default)]
pub struct PreprocessingPlan {
    pub features: Vec<TransformStep>,
    pub confounds: Vec<TransformStep>,
    pub target: Option<TargetStep>,
}

impl PreprocessingPlan {
    pub fn build(
        features: Vec<StepSpec>,
        confounds: Vec<StepSpec>,
        target: Option<TargetStepSpec>,
        factory: Option<&dyn TransformerFactory>,
    ) -> Result<Self> {
        let features = build_feature_steps(features, factory)?;
        let confounds = build_confound_steps(confounds, factory)?;
        let target = target
            .map(|spec| TargetStep::build(spec, factory))
            .transpose()?;

        info!(
            "Preprocessing: {} feature step(s), {} confound step(s), target step: {}",
            features.len(),
            confounds.len(),
            target.as_ref().map_or("none", |t| t.name.as_str())
        );
        Ok(Self {
            features,
            confounds,
            target,
        })
    }

    pub fn has_target_transform(&self) -> bool {
        self.target.is_some()
    }

    pub fn feature_chain(&self) -> TransformerChain {
        chain_of(&self.features)
    }

    pub fn confound_chain(&self) -> TransformerChain {
        chain_of(&self.confounds)
    }
}

fn chain_of(steps: &[TransformStep]) -> TransformerChain {
    steps
        .iter()
        .fold(TransformerChain::new(), |chain, step| {
            chain.with_step(step.name.clone(), step.to_wrapper())
        })
}

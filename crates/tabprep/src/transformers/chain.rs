//! Sequential chain of column transformers.

use super::wrapper::{ColumnTransformer, FittedColumnTransformer};
use crate::error::{Result, ResultExt};
use polars::prelude::{DataFrame, Series};
use tracing::{debug, info};

/// Ordered, named wrappers. Each step is fitted on the previous step's output.
#[derive(Debug, Clone, Default)]
pub struct TransformerChain {
    steps: Vec<(String, ColumnTransformer)>,
}

impl TransformerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, name: impl Into<String>, step: ColumnTransformer) -> Self {
        self.steps.push((name.into(), step));
        self
    }

    pub fn push(&mut self, name: impl Into<String>, step: ColumnTransformer) {
        self.steps.push((name.into(), step));
    }

    pub fn steps(&self) -> &[(String, ColumnTransformer)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Fit every step in order on a working copy of `table`.
    pub fn fit(&self, table: &DataFrame, target: Option<&Series>) -> Result<FittedTransformerChain> {
        self.fit_transform(table, target).map(|(fitted, _)| fitted)
    }

    /// Fit every step and return the output of the last one.
    pub fn fit_transform(
        &self,
        table: &DataFrame,
        target: Option<&Series>,
    ) -> Result<(FittedTransformerChain, DataFrame)> {
        info!("Fitting transformer chain with {} step(s)", self.steps.len());

        let mut current = table.clone();
        let mut fitted = Vec::with_capacity(self.steps.len());
        for (name, step) in &self.steps {
            let (fitted_step, output) = step
                .fit_transform(&current, target)
                .context(format!("fitting step '{name}'"))?;
            debug!("Step '{}' produced {} column(s)", name, output.width());
            fitted.push((name.clone(), fitted_step));
            current = output;
        }
        Ok((FittedTransformerChain { steps: fitted }, current))
    }
}

/// A fitted chain; transforms apply the fitted steps in order.
#[derive(Debug, Clone)]
pub struct FittedTransformerChain {
    steps: Vec<(String, FittedColumnTransformer)>,
}

impl FittedTransformerChain {
    pub fn steps(&self) -> &[(String, FittedColumnTransformer)] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&FittedColumnTransformer> {
        self.steps
            .iter()
            .find(|(step_name, _)| step_name == name)
            .map(|(_, step)| step)
    }

    pub fn transform(&self, table: &DataFrame) -> Result<DataFrame> {
        let mut current = table.clone();
        for (name, step) in &self.steps {
            current = step
                .transform(&current)
                .context(format!("transforming with step '{name}'"))?;
        }
        Ok(current)
    }
}

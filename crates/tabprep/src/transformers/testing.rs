//! Minimal transformers used by the unit tests.

use super::traits::{Params, Support, TableTransformer};
use crate::error::{PrepError, Result};
use polars::prelude::*;

fn f64_values(column: &Column) -> Result<Vec<f64>> {
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Multiplies every column by `factor`; shape preserving.
#[derive(Debug, Clone)]
pub struct Scale {
    pub factor: f64,
    pub fitted: bool,
}

impl Scale {
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            fitted: false,
        }
    }
}

impl TableTransformer for Scale {
    fn kind(&self) -> String {
        "scale".to_string()
    }

    fn fit(&mut self, _table: &DataFrame, _target: Option<&Series>) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn transform(&self, table: &DataFrame) -> Result<DataFrame> {
        let columns = table
            .get_columns()
            .iter()
            .map(|c| {
                let values: Vec<f64> = f64_values(c)?
                    .into_iter()
                    .map(|v| v * self.factor)
                    .collect();
                Ok(Column::new(c.name().clone(), values))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame::new(columns)?)
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert("factor".to_string(), serde_json::json!(self.factor));
        params
    }

    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (key, value) in params {
            match (key.as_str(), value.as_f64()) {
                ("factor", Some(factor)) => self.factor = factor,
                _ => return Err(PrepError::transformer("scale", format!("invalid param '{key}'"))),
            }
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TableTransformer> {
        Box::new(self.clone())
    }
}

/// Keeps only the first input column and reports it through its support mask.
#[derive(Debug, Clone, Default)]
pub struct SelectFirst {
    n_inputs: usize,
}

impl TableTransformer for SelectFirst {
    fn kind(&self) -> String {
        "selectfirst".to_string()
    }

    fn fit(&mut self, table: &DataFrame, _target: Option<&Series>) -> Result<()> {
        self.n_inputs = table.width();
        Ok(())
    }

    fn transform(&self, table: &DataFrame) -> Result<DataFrame> {
        Ok(DataFrame::new(table.get_columns()[..1].to_vec())?)
    }

    fn get_params(&self) -> Params {
        Params::new()
    }

    fn set_params(&mut self, _params: &Params) -> Result<()> {
        Ok(())
    }

    fn support(&self) -> Option<Support> {
        Some(Support::Mask(
            (0..self.n_inputs).map(|i| i == 0).collect(),
        ))
    }

    fn clone_box(&self) -> Box<dyn TableTransformer> {
        Box::new(self.clone())
    }
}

/// Collapses its input into a single `sum` column.
#[derive(Debug, Clone, Default)]
pub struct SumColumns;

impl TableTransformer for SumColumns {
    fn kind(&self) -> String {
        "sumcolumns".to_string()
    }

    fn fit(&mut self, _table: &DataFrame, _target: Option<&Series>) -> Result<()> {
        Ok(())
    }

    fn transform(&self, table: &DataFrame) -> Result<DataFrame> {
        let mut sums = vec![0.0; table.height()];
        for column in table.get_columns() {
            for (sum, value) in sums.iter_mut().zip(f64_values(column)?) {
                *sum += value;
            }
        }
        Ok(DataFrame::new(vec![Column::new("sum".into(), sums)])?)
    }

    fn get_params(&self) -> Params {
        Params::new()
    }

    fn set_params(&mut self, _params: &Params) -> Result<()> {
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TableTransformer> {
        Box::new(self.clone())
    }
}

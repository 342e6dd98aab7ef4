//! Re-tag columns with a new semantic type.

use super::traits::{Params, TableTransformer};
use crate::columns::{ColumnType, change_column_type, pick_columns};
use crate::error::{PrepError, Result};
use crate::utils::column_names;
use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Renames every column whose name fully matches one of `columns_match` so
/// that it carries `new_type`. Values are left untouched.
///
/// Meant to be wrapped with the `from_transformer` policy, since the output
/// already carries its final names.
#[derive(Debug, Clone)]
pub struct ChangeColumnTypes {
    columns_match: Vec<String>,
    new_type: ColumnType,
    picked: Vec<String>,
}

impl ChangeColumnTypes {
    pub fn new<I, S>(columns_match: I, new_type: ColumnType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns_match: columns_match.into_iter().map(Into::into).collect(),
            new_type,
            picked: Vec::new(),
        }
    }

    /// Columns picked at fit time.
    pub fn picked_columns(&self) -> &[String] {
        &self.picked
    }
}

impl TableTransformer for ChangeColumnTypes {
    fn kind(&self) -> String {
        "changecolumntypes".to_string()
    }

    fn fit(&mut self, table: &DataFrame, _target: Option<&Series>) -> Result<()> {
        self.picked = pick_columns(&self.columns_match, &column_names(table))?;
        debug!(
            "Re-tagging {} column(s) as '{}'",
            self.picked.len(),
            self.new_type
        );
        Ok(())
    }

    fn transform(&self, table: &DataFrame) -> Result<DataFrame> {
        let picked: HashSet<&str> = self.picked.iter().map(String::as_str).collect();
        let columns: Vec<Column> = table
            .get_columns()
            .iter()
            .map(|c| {
                let name = c.name().as_str();
                if picked.contains(name) {
                    c.clone()
                        .with_name(change_column_type(name, &self.new_type).into())
                } else {
                    c.clone()
                }
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    fn get_params(&self) -> Params {
        let mut params = Params::new();
        params.insert(
            "columns_match".to_string(),
            serde_json::Value::from(self.columns_match.clone()),
        );
        params.insert(
            "new_type".to_string(),
            serde_json::Value::String(self.new_type.to_string()),
        );
        params
    }

    fn set_params(&mut self, params: &Params) -> Result<()> {
        for (key, value) in params {
            match key.as_str() {
                "columns_match" => self.columns_match = serde_json::from_value(value.clone())?,
                "new_type" => self.new_type = serde_json::from_value(value.clone())?,
                other => {
                    return Err(PrepError::transformer(
                        self.kind(),
                        format!("unknown parameter '{other}'"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TableTransformer> {
        Box::new(self.clone())
    }
}

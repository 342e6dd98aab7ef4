//! Typed-Column Preparation Library
//!
//! Prepares tabular data and configuration for a machine-learning pipeline
//! executor, built with Rust and Polars.
//!
//! # Overview
//!
//! - **Typed Columns**: every column name carries a semantic type tag
//!   (`age__:type:__confound`); untagged names are continuous
//! - **Column Transformers**: wrap any [`TableTransformer`] so it only sees the
//!   selected columns, and reassemble its output under one of five
//!   returned-features policies
//! - **Input Normalization**: arrays or a table plus column names become one
//!   typed table, a target and optional groups
//! - **Configuration**: flat hyperparameter names are rewritten into nested
//!   pipeline addresses, CV strings are parsed and the target is checked
//!   against the problem type
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tabprep::{Preparation, PrepareConfig, RawInput, ReturnedFeatures, TransformerRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = TransformerRegistry::new()
//!     .register("zscore", ReturnedFeatures::Same, || Box::new(ZScore::default()));
//!
//! let config = PrepareConfig::builder()
//!     .model_name("svm")
//!     .cv("repeat:5_nfolds:5")
//!     .hyperparameter("svm__C", json!([0.1, 1.0, 10.0]))
//!     .preprocess_x(["zscore"])
//!     .build()?;
//!
//! let prepared = Preparation::builder()
//!     .config(config)
//!     .factory(Arc::new(registry))
//!     .on_warning(|warning| eprintln!("warning: {warning}"))
//!     .build()?
//!     .prepare(&RawInput::table(df, vec!["age", "income"], "label").with_confounds("site"))?;
//!
//! println!("CV: {}", prepared.cv);
//! ```
//!
//! # Column Transformers
//!
//! ```rust,ignore
//! use tabprep::{ColumnTransformer, ReturnedFeatures, TypeSelector};
//!
//! let fitted = ColumnTransformer::new(Box::new(Pca::new(2)))
//!     .with_columns(TypeSelector::Continuous)
//!     .with_returned_features(ReturnedFeatures::Unknown)
//!     .fit(&table, None)?;
//!
//! // pca_component:0__:type:__continuous, pca_component:1__:type:__continuous, ...rest
//! let output = fitted.transform(&table)?;
//! ```

pub mod columns;
pub mod config;
pub mod consistency;
pub mod cv;
pub mod diagnostics;
pub mod error;
pub mod hyperparams;
pub mod input;
pub mod prepare;
pub mod preprocessing;
pub mod transformers;
pub mod utils;

// Re-exports for convenient access
pub use columns::{
    COLUMN_TYPE_SEP, ColumnSelector, ColumnType, TypeSelector, TypedColumnName,
    change_column_type, column_type_of, decode, encode, has_type_tag, pick_columns,
};
pub use config::{ConfigValidationError, PrepareConfig, PrepareConfigBuilder, ProblemType};
pub use consistency::{ConsistencyInput, check_consistency};
pub use cv::{CvScheme, CvSpec, parse_cv};
pub use diagnostics::{
    ClosureWarningSink, CollectingSink, PrepWarning, TracingSink, WarningKind, WarningSink,
};
pub use error::{PrepError, Result as PrepResult, ResultExt};
pub use hyperparams::{
    HyperparameterPlan, Hyperparameters, ModelSelection, ModelSelectionSpec, SearchPlan,
    prepare_model_selection, rewrite_hyperparameters, rewrite_name,
};
pub use input::{DataRef, Label, NormalizedInput, PosLabels, RawInput, binarize_target, normalize};
pub use prepare::{Preparation, PreparationBuilder, PreparationSummary, PreparedExperiment};
pub use preprocessing::{
    FittedTargetStep, PreprocessingPlan, StepSpec, TargetStep, TargetStepSpec, TransformStep,
    TransformerFactory, TransformerRegistry,
};
pub use transformers::{
    ChangeColumnTypes, ColumnTransformer, FittedColumnTransformer, FittedColumns,
    FittedTransformerChain, Params, ReturnedFeatures, Support, TableTransformer, TransformerChain,
};
pub use utils::{DtypeCategory, get_dtype_category, is_numeric_dtype};

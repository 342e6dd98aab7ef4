//! Column-subset transformers.
//!
//! - [`traits`]: capability contract external transformers implement
//! - [`wrapper`]: typed wrapper with the five returned-features policies
//! - [`chain`]: sequential chain of wrappers
//! - [`change_types`]: re-tag columns with a new semantic type

pub mod chain;
pub mod change_types;
pub mod traits;
pub mod wrapper;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{FittedTransformerChain, TransformerChain};
pub use change_types::ChangeColumnTypes;
pub use traits::{Params, Support, TableTransformer};
pub use wrapper::{ColumnTransformer, FittedColumnTransformer, FittedColumns, ReturnedFeatures};

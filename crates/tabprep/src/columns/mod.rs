//! Typed column names and column selection.
//!
//! - [`codec`]: encode/decode the semantic type tag embedded in a column name
//! - [`selector`]: resolve a selector spec against a table's columns

pub mod codec;
pub mod selector;

pub use codec::{
    COLUMN_TYPE_SEP, ColumnType, TypedColumnName, change_column_type, column_type_of, decode,
    encode, has_type_tag,
};
pub use selector::{ColumnSelector, TypeSelector, pick_columns};

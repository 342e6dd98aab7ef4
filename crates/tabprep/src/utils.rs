//! Shared utilities for tables, series and raw arrays.
//!
//! Small helpers used across the normalizer, the wrapper and the consistency
//! checks so that dtype handling stays in one place.

use crate::error::{PrepError, Result};
use ndarray::{ArrayD, Axis};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a data type for label handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Table Utilities
// =============================================================================

/// Owned column names of a table, in table order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Number of distinct non-null values in a series.
pub fn n_distinct(series: &Series) -> Result<usize> {
    Ok(series.drop_nulls().n_unique()?)
}

// =============================================================================
// Array Utilities
// =============================================================================

/// Number of samples (first axis) of a raw array. Scalars have none.
pub fn n_samples(array: &ArrayD<f64>) -> Option<usize> {
    array.shape().first().copied()
}

/// Split a rank-1 or rank-2 array into per-column value vectors.
///
/// A rank-1 array is a single column.
pub fn array_columns(array: &ArrayD<f64>, what: &str) -> Result<Vec<Vec<f64>>> {
    match array.ndim() {
        1 => Ok(vec![array.iter().copied().collect()]),
        2 => Ok(array
            .axis_iter(Axis(1))
            .map(|column| column.iter().copied().collect())
            .collect()),
        n => Err(PrepError::InvalidInputShape(format!(
            "{what} must be a 1D or 2D array, but is {n}D"
        ))),
    }
}

/// Values of a rank-1 array. Column vectors of shape `[n, 1]` are rejected.
pub fn array_vector(array: &ArrayD<f64>, what: &str) -> Result<Vec<f64>> {
    match array.shape() {
        [_] => Ok(array.iter().copied().collect()),
        shape => Err(PrepError::InvalidInputShape(format!(
            "{what} must be a 1D array, but has shape {shape:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float32));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_dtype_category() {
        assert_eq!(get_dtype_category(&DataType::UInt8), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::String);
    }

    #[test]
    fn test_n_distinct_ignores_nulls() {
        let series = Series::new("y".into(), &[Some(1i64), Some(2), None, Some(1)]);
        assert_eq!(n_distinct(&series).unwrap(), 2);
    }

    #[test]
    fn test_array_columns() {
        let array = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let columns = array_columns(&array, "X").unwrap();
        assert_eq!(columns, vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]);
    }

    #[test]
    fn test_array_columns_rejects_3d() {
        let array = ArrayD::<f64>::zeros(IxDyn(&[2, 2, 2]));
        assert!(matches!(
            array_columns(&array, "X"),
            Err(PrepError::InvalidInputShape(_))
        ));
    }

    #[test]
    fn test_array_vector() {
        let vector = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(array_vector(&vector, "y").unwrap(), vec![1.0, 2.0, 3.0]);
        let wide = ArrayD::<f64>::zeros(IxDyn(&[3, 2]));
        assert!(array_vector(&wide, "y").is_err());
    }

    #[test]
    fn test_array_vector_rejects_column_vector() {
        let column = ArrayD::<f64>::zeros(IxDyn(&[3, 1]));
        assert!(matches!(
            array_vector(&column, "y"),
            Err(PrepError::InvalidInputShape(_))
        ));
    }
}

//! Column type codec.
//!
//! A typed column name is `<base>__:type:__<tag>`. The tag is decoded eagerly
//! into a [`ColumnType`]; nothing outside this module looks at the raw
//! separator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved separator between a base column name and its type tag.
///
/// Base names must not contain it: decoding splits on its last occurrence.
pub const COLUMN_TYPE_SEP: &str = "__:type:__";

/// Semantic type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    /// Column controlled for rather than used as a feature.
    Confound,
    /// Continuous feature (the default when no tag is present).
    #[default]
    Continuous,
    /// Categorical feature.
    Categorical,
    /// Any other user-defined tag, kept verbatim.
    Other(String),
}

impl ColumnType {
    /// Parse a tag string. Unknown tags are preserved as [`ColumnType::Other`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "confound" => Self::Confound,
            "continuous" => Self::Continuous,
            "categorical" => Self::Categorical,
            other => Self::Other(other.to_string()),
        }
    }

    /// The tag as written into column names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Confound => "confound",
            Self::Continuous => "continuous",
            Self::Categorical => "categorical",
            Self::Other(tag) => tag,
        }
    }

    pub fn is_confound(&self) -> bool {
        matches!(self, Self::Confound)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ColumnType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        column_type.as_str().to_string()
    }
}

/// A column name split into its base name and semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedColumnName {
    pub base: String,
    pub column_type: ColumnType,
}

impl TypedColumnName {
    pub fn new(base: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            base: base.into(),
            column_type,
        }
    }

    /// Decode a raw column name. See [`decode`].
    pub fn parse(column: &str) -> Self {
        let (base, column_type) = decode(column);
        Self {
            base: base.to_string(),
            column_type,
        }
    }

    /// Encode back into the `<base>__:type:__<tag>` wire format.
    pub fn encode(&self) -> String {
        encode(&self.base, &self.column_type)
    }
}

impl fmt::Display for TypedColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.base, COLUMN_TYPE_SEP, self.column_type)
    }
}

/// Join a base name and a type tag.
pub fn encode(base: &str, column_type: &ColumnType) -> String {
    format!("{base}{COLUMN_TYPE_SEP}{column_type}")
}

/// Split a column name on the last separator occurrence.
///
/// Without a separator the whole name is the base and the type is
/// [`ColumnType::Continuous`].
pub fn decode(column: &str) -> (&str, ColumnType) {
    match column.rsplit_once(COLUMN_TYPE_SEP) {
        Some((base, tag)) => (base, ColumnType::from_tag(tag)),
        None => (column, ColumnType::Continuous),
    }
}

/// Semantic type of a raw column name.
pub fn column_type_of(column: &str) -> ColumnType {
    decode(column).1
}

/// Whether the column name carries an explicit tag.
pub fn has_type_tag(column: &str) -> bool {
    column.contains(COLUMN_TYPE_SEP)
}

/// Replace the tag of a column (adding one if absent).
pub fn change_column_type(column: &str, new_type: &ColumnType) -> String {
    let (base, _) = decode(column);
    encode(base, new_type)
}

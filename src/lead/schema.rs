//! Output column schema derived from the service's field metadata.
//!
//! Used only for schema discovery (the `guess` flow), never for row
//! fetching.

use serde::{Deserialize, Serialize};

/// One queryable/describable field of the remote lead object.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FieldMetadata {
    pub name: String,
    #[serde(rename = "dataType")]
    pub data_type: String,
    #[serde(rename = "isCustom", default)]
    pub is_custom: bool,
    #[serde(rename = "isDynamic", default)]
    pub is_dynamic: bool,
}

/// Target type of one output column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Long,
    Double,
    Boolean,
    Timestamp,
    String,
}

/// One output column: name plus target type.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Map a declared service data type to an output column type.
///
/// Unrecognized types fall back to `string`.
fn map_data_type(data_type: &str) -> ColumnType {
    match data_type {
        "datetime" => ColumnType::Timestamp,
        "integer" => ColumnType::Long,
        "boolean" => ColumnType::Boolean,
        "float" => ColumnType::Double,
        "string" => ColumnType::String,
        _ => ColumnType::String,
    }
}

/// Build the output column schema from the described field list.
///
/// Always begins with the two fixed identity columns `id:long` and
/// `email:string`, then one column per field in the given order.
pub fn generate_columns(fields: &[FieldMetadata]) -> Vec<Column> {
    let mut columns = vec![
        Column::new("id", ColumnType::Long),
        Column::new("email", ColumnType::String),
    ];
    columns.extend(
        fields
            .iter()
            .map(|field| Column::new(&field.name, map_data_type(&field.data_type))),
    );
    columns
}

//! Lead record normalization.
//!
//! The service returns leads as two fixed identity fields plus a dynamic,
//! ordered attribute list. Normalization flattens that into a stable
//! insertion-ordered mapping of field name to `{type, value}`, with `id`
//! and `email` always first and dynamic attributes appended in
//! server-returned order. A later attribute with an existing name
//! overwrites the value and keeps the original position.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// One dynamic attribute as returned by the service.
#[derive(Clone, Debug, PartialEq)]
pub struct LeadAttribute {
    pub name: String,
    pub attr_type: String,
    pub value: String,
}

/// One raw lead as extracted from a page response. Transient; normalized
/// immediately.
#[derive(Clone, Debug, PartialEq)]
pub struct RawLeadRecord {
    pub id: i64,
    pub email: String,
    pub attributes: Vec<LeadAttribute>,
}

/// Declared type plus raw value for one normalized field.
///
/// Values stay in their source string representation at this layer;
/// coercion to an output schema type is a downstream concern.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeadField {
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: Value,
}

/// Insertion-ordered field-name-to-field mapping for one lead.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: IndexMap<String, LeadField>,
}

impl RawLeadRecord {
    /// Parse a lead from the transport's structured response shape.
    ///
    /// Missing pieces default to id 0 and empty strings; a partially
    /// filled record is still a record.
    pub fn from_value(value: &Value) -> Self {
        let attributes = value["leadAttributeList"]
            .as_array()
            .map(|list| {
                list.iter()
                    .map(|attr| LeadAttribute {
                        name: attr["attrName"].as_str().unwrap_or_default().to_string(),
                        attr_type: attr["attrType"].as_str().unwrap_or_default().to_string(),
                        value: attr["attrValue"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: value["Id"].as_i64().unwrap_or_default(),
            email: value["Email"].as_str().unwrap_or_default().to_string(),
            attributes,
        }
    }

    /// Flatten into the normalized `{name -> {type, value}}` shape.
    pub fn normalize(&self) -> NormalizedRecord {
        let mut fields = IndexMap::new();
        fields.insert(
            "id".to_string(),
            LeadField {
                field_type: "integer".to_string(),
                value: Value::from(self.id),
            },
        );
        fields.insert(
            "email".to_string(),
            LeadField {
                field_type: "string".to_string(),
                value: Value::from(self.email.clone()),
            },
        );

        for attribute in &self.attributes {
            // IndexMap keeps the first-seen position on overwrite,
            // matching last-write-wins on the value only
            fields.insert(
                attribute.name.clone(),
                LeadField {
                    field_type: attribute.attr_type.clone(),
                    value: Value::from(attribute.value.clone()),
                },
            );
        }

        NormalizedRecord { fields }
    }
}

impl NormalizedRecord {
    pub fn get(&self, name: &str) -> Option<&LeadField> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LeadField)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

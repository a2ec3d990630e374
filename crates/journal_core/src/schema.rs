//! crates/journal_core/src/schema.rs
//!
//! Statically declared description of the structured completion the weekly
//! summary expects. The table is checked once at startup and rendered into a
//! strict JSON Schema for whichever text generator sits behind the port.

use serde_json::{json, Map, Value};

use crate::ports::{PortError, PortResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// A string restricted to the listed values.
    Enum(&'static [&'static str]),
    StringArray { min_items: usize, max_items: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarySchema {
    pub name: &'static str,
    pub fields: &'static [SchemaField],
}

pub const TREND_VALUES: &[&str] = &["improving", "stable", "challenging"];

/// The five-field shape of a weekly summary completion. Every field is required.
pub const WEEKLY_SUMMARY_SCHEMA: SummarySchema = SummarySchema {
    name: "weekly_summary",
    fields: &[
        SchemaField {
            name: "summary",
            kind: FieldKind::String,
            description: "A warm 3-4 sentence letter summarising the week's writing",
        },
        SchemaField {
            name: "dominant_emotion",
            kind: FieldKind::String,
            description: "The emotion that appeared most across the week",
        },
        SchemaField {
            name: "secondary_emotions",
            kind: FieldKind::StringArray { min_items: 0, max_items: 3 },
            description: "Other emotions that showed up, at most three",
        },
        SchemaField {
            name: "trend",
            kind: FieldKind::Enum(TREND_VALUES),
            description: "How the mood moved over the week",
        },
        SchemaField {
            name: "insights",
            kind: FieldKind::StringArray { min_items: 1, max_items: 3 },
            description: "One to three short observations about the week",
        },
        SchemaField {
            name: "encouragement",
            kind: FieldKind::String,
            description: "One encouraging sentence for the coming week",
        },
    ],
};

impl SummarySchema {
    /// Checks the declaration itself: names unique and non-empty, array bounds
    /// ordered, enums non-empty.
    pub fn validate(&self) -> PortResult<()> {
        if self.name.is_empty() || self.fields.is_empty() {
            return Err(PortError::Validation(format!(
                "schema '{}' must have a name and at least one field",
                self.name
            )));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(PortError::Validation(format!(
                    "schema '{}' has an unnamed field at position {}",
                    self.name, i
                )));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(PortError::Validation(format!(
                    "schema '{}' declares '{}' twice",
                    self.name, field.name
                )));
            }
            match field.kind {
                FieldKind::Enum(values) if values.is_empty() => {
                    return Err(PortError::Validation(format!(
                        "enum field '{}' lists no values",
                        field.name
                    )));
                }
                FieldKind::StringArray { min_items, max_items } if min_items > max_items => {
                    return Err(PortError::Validation(format!(
                        "array field '{}' has min_items {} above max_items {}",
                        field.name, min_items, max_items
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Renders a strict JSON Schema object (`additionalProperties: false`,
    /// every field required).
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.fields {
            let property = match field.kind {
                FieldKind::String => json!({
                    "type": "string",
                    "description": field.description,
                }),
                FieldKind::Enum(values) => json!({
                    "type": "string",
                    "enum": values,
                    "description": field.description,
                }),
                FieldKind::StringArray { min_items, max_items } => json!({
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": min_items,
                    "maxItems": max_items,
                    "description": field.description,
                }),
            };
            properties.insert(field.name.to_string(), property);
        }
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekly_schema_is_valid() {
        WEEKLY_SUMMARY_SCHEMA.validate().unwrap();
    }

    #[test]
    fn test_json_rendering_is_strict() {
        let rendered = WEEKLY_SUMMARY_SCHEMA.to_json_schema();
        assert_eq!(rendered["additionalProperties"], json!(false));
        assert_eq!(rendered["required"].as_array().unwrap().len(), 6);
        assert_eq!(rendered["properties"]["trend"]["enum"], json!(TREND_VALUES));
        assert_eq!(rendered["properties"]["insights"]["minItems"], json!(1));
        assert_eq!(rendered["properties"]["secondary_emotions"]["maxItems"], json!(3));
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        const DUPLICATED: SummarySchema = SummarySchema {
            name: "broken",
            fields: &[
                SchemaField { name: "a", kind: FieldKind::String, description: "" },
                SchemaField { name: "a", kind: FieldKind::String, description: "" },
            ],
        };
        assert!(matches!(DUPLICATED.validate(), Err(PortError::Validation(_))));
    }

    #[test]
    fn test_inverted_array_bounds_are_rejected() {
        const INVERTED: SummarySchema = SummarySchema {
            name: "broken",
            fields: &[SchemaField {
                name: "list",
                kind: FieldKind::StringArray { min_items: 4, max_items: 2 },
                description: "",
            }],
        };
        assert!(INVERTED.validate().is_err());
    }
}

use serde::{Deserialize, Serialize};

/// Schema of a table, in the shape of the REST API `TableSchema` resource.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,
    /// `STRING`, `INTEGER`, `RECORD`, ...
    #[serde(rename = "type")]
    pub field_type: String,
    /// `NULLABLE`, `REQUIRED` or `REPEATED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sub-fields of a `RECORD` field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<TableFieldSchema>,
}

impl TableFieldSchema {
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            mode: None,
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn mode(mut self, mode: &str) -> Self {
        self.mode = Some(mode.to_string());
        self
    }

    pub fn record(name: &str, fields: Vec<TableFieldSchema>) -> Self {
        Self {
            fields,
            ..Self::new(name, "RECORD")
        }
    }
}

impl TableSchema {
    pub fn new(fields: Vec<TableFieldSchema>) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_like_the_rest_api() {
        let schema = TableSchema::new(vec![
            TableFieldSchema::new("id", "INTEGER").mode("REQUIRED"),
            TableFieldSchema::record("location", vec![TableFieldSchema::new("lat", "FLOAT")]),
        ]);
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({
                "fields": [
                    {"name": "id", "type": "INTEGER", "mode": "REQUIRED"},
                    {"name": "location", "type": "RECORD", "fields": [{"name": "lat", "type": "FLOAT"}]}
                ]
            })
        );
    }
}

//! Response envelopes, one per endpoint family
//!
//! List endpoints answer with a bare array, `{data: [...]}`, a named key such
//! as `{materials: [...]}`, or the named key nested under `data`. Each
//! endpoint declares which keys it may use; anything else is a shape error
//! raised here, at the transport boundary, instead of in the callers.

use serde_json::{Map, Value};

use crate::error::{DeskError, Result};

pub type RawRow = Map<String, Value>;

/// Accepted layouts for one endpoint's list responses
#[derive(Debug, Clone, Copy)]
pub struct ListEnvelope {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub const MATERIALS: ListEnvelope = ListEnvelope {
    name: "study materials",
    keys: &["materials", "study_materials", "data"],
};

pub const SUBJECTS: ListEnvelope = ListEnvelope {
    name: "subjects",
    keys: &["subjects", "data"],
};

pub const PROGRAMS: ListEnvelope = ListEnvelope {
    name: "programs",
    keys: &["programs", "data"],
};

pub const COURSES: ListEnvelope = ListEnvelope {
    name: "courses",
    keys: &["courses", "data"],
};

pub const SYLLABUSES: ListEnvelope = ListEnvelope {
    name: "syllabuses",
    keys: &["syllabuses", "syllabi", "data"],
};

impl ListEnvelope {
    /// Extract the object rows of a list response. Non-object rows are
    /// dropped and logged.
    pub fn rows(&self, body: Value) -> Result<Vec<RawRow>> {
        let items = self.locate(body)?;
        let total = items.len();

        let rows: Vec<RawRow> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();

        if rows.len() < total {
            tracing::debug!(
                "Dropped {} non-object rows from {} response",
                total - rows.len(),
                self.name
            );
        }
        Ok(rows)
    }

    fn locate(&self, body: Value) -> Result<Vec<Value>> {
        match body {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => {
                reject_unsuccessful(&map, self.name)?;

                for key in self.keys {
                    match map.remove(*key) {
                        Some(Value::Array(items)) => return Ok(items),
                        Some(Value::Object(inner)) if *key == "data" => {
                            return self.locate(Value::Object(inner));
                        }
                        _ => {}
                    }
                }

                Err(DeskError::invalid_response(format!(
                    "{} response has none of the expected keys ({})",
                    self.name,
                    self.keys.join(", ")
                )))
            }
            Value::Null => Ok(Vec::new()),
            other => Err(DeskError::invalid_response(format!(
                "{} response is a {} instead of a list",
                self.name,
                json_kind(&other)
            ))),
        }
    }
}

/// Extract a single record from `{...}`, `{data: {...}}` or `{<key>: {...}}`
pub fn single(body: Value, key: &str) -> Result<RawRow> {
    match body {
        Value::Object(mut map) => {
            reject_unsuccessful(&map, key)?;
            for candidate in [key, "data"] {
                if let Some(Value::Object(inner)) = map.get(candidate) {
                    if inner.contains_key("id") || inner.contains_key("_id") {
                        if let Some(Value::Object(inner)) = map.remove(candidate) {
                            return Ok(inner);
                        }
                    }
                }
            }
            Ok(map)
        }
        other => Err(DeskError::invalid_response(format!(
            "{} response is a {} instead of an object",
            key,
            json_kind(&other)
        ))),
    }
}

/// `{success: false, message}` envelopes become shape errors
fn reject_unsuccessful(map: &RawRow, name: &str) -> Result<()> {
    if let Some(Value::Bool(false)) = map.get("success") {
        let message = map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(DeskError::invalid_response(format!(
            "{} request reported failure: {}",
            name, message
        )));
    }
    Ok(())
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_every_list_layout() {
        let layouts = vec![
            json!([{"id": 1}]),
            json!({"data": [{"id": 1}]}),
            json!({"success": true, "materials": [{"id": 1}]}),
            json!({"data": {"materials": [{"id": 1}], "total": 1}}),
        ];
        for body in layouts {
            let rows = MATERIALS.rows(body.clone()).unwrap();
            assert_eq!(rows.len(), 1, "layout {}", body);
        }
    }

    #[test]
    fn unexpected_layouts_are_shape_errors() {
        let err = COURSES.rows(json!({"items": []})).unwrap_err();
        assert!(err.is_shape_error());

        let err = COURSES.rows(json!("oops")).unwrap_err();
        assert!(err.is_shape_error());

        let err = COURSES
            .rows(json!({"success": false, "message": "db down"}))
            .unwrap_err();
        assert!(err.to_string().contains("db down"));
    }

    #[test]
    fn null_body_is_an_empty_list() {
        assert!(PROGRAMS.rows(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn non_object_rows_are_dropped() {
        let rows = SUBJECTS.rows(json!([{"id": 1}, 7, "x", null])).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn single_unwraps_data_and_named_keys() {
        let row = single(json!({"data": {"id": 3, "title": "T"}}), "syllabus").unwrap();
        assert_eq!(row["title"], json!("T"));

        let row = single(json!({"syllabus": {"id": 3}, "success": true}), "syllabus").unwrap();
        assert_eq!(row["id"], json!(3));

        let row = single(json!({"id": 4, "title": "flat"}), "syllabus").unwrap();
        assert_eq!(row["title"], json!("flat"));

        assert!(single(json!([1, 2]), "syllabus").is_err());
    }
}

//! Turns the extraction webhook's response body into a [`Table`].
//!
//! The webhook is an external workflow whose output shape is not fixed. The
//! body is matched against a fixed cascade of shapes and the first one that
//! applies decides the result:
//!
//! 1. not JSON: no table
//! 2. an array of arrays (used as-is) or an array of objects (headers from
//!    the first object's keys)
//! 3. an object carrying the table in a well-known field, a CSV string, or
//!    failing both, the object itself flattened into `Field`/`Value` rows
//! 4. anything else: no table
//!
//! Array-of-arrays output keeps its row lengths; callers pad with
//! [`Table::rectangularize`] before storing it.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::debug;

use crate::models::Table;

/// Fields that may hold the finished table, in priority order.
const TABLE_FIELDS: &[&str] = &[
    "excelData",
    "data",
    "result",
    "output",
    "extractedData",
    "table",
    "rows",
    "tableData",
    "spreadsheet",
];

/// Row-like fields checked again when no direct field matched.
const ROW_FIELDS: &[&str] = &["table", "rows", "tableData", "spreadsheet"];

const CSV_FIELDS: &[&str] = &["csv", "csvData"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Response array is empty")]
    EmptyArray,
    #[error("Response array holds neither rows nor objects")]
    UnsupportedArray,
    #[error("Field '{field}' does not hold a non-empty array")]
    NotATable { field: String },
    #[error("Response object has no fields")]
    NoFields,
    #[error("Response is a bare {0}")]
    UnsupportedShape(&'static str),
    #[error("Header row has no columns")]
    NoColumns,
}

/// Parses `body` and derives a table from it.
pub fn normalize(body: &str) -> Result<Table, NormalizationError> {
    let value: Value = serde_json::from_str(body).map_err(|e| NormalizationError::InvalidJson(e.to_string()))?;
    normalize_value(&value)
}

/// A table whose header row is empty would lose every cell once made
/// rectangular, so it counts as no table at all.
pub fn normalize_value(value: &Value) -> Result<Table, NormalizationError> {
    let table = shape_table(value)?;
    if table.width() == 0 {
        return Err(NormalizationError::NoColumns);
    }
    Ok(table)
}

fn shape_table(value: &Value) -> Result<Table, NormalizationError> {
    match value {
        Value::Array(items) => {
            debug!("Normalizing array response with {} items", items.len());
            table_from_array(items)
        }
        Value::Object(object) => {
            debug!("Normalizing object response with keys: {:?}", object.keys().collect::<Vec<_>>());
            table_from_object(object)
        }
        Value::Null => Err(NormalizationError::UnsupportedShape("null")),
        Value::Bool(_) => Err(NormalizationError::UnsupportedShape("boolean")),
        Value::Number(_) => Err(NormalizationError::UnsupportedShape("number")),
        Value::String(_) => Err(NormalizationError::UnsupportedShape("string")),
    }
}

fn table_from_array(items: &[Value]) -> Result<Table, NormalizationError> {
    match items.first() {
        None => Err(NormalizationError::EmptyArray),
        Some(_) if items.iter().all(Value::is_array) => Ok(rows_from_arrays(items)),
        Some(Value::Object(first)) => Ok(rows_from_objects(first, items)),
        Some(_) => Err(NormalizationError::UnsupportedArray),
    }
}

fn rows_from_arrays(items: &[Value]) -> Table {
    let rows = items
        .iter()
        .filter_map(Value::as_array)
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    Table::new(rows)
}

/// Header order comes from the first object only. Keys that appear later
/// are dropped and missing keys become empty cells.
fn rows_from_objects(first: &Map<String, Value>, items: &[Value]) -> Table {
    let headers: Vec<String> = first.keys().cloned().collect();

    let mut rows = Vec::with_capacity(items.len() + 1);
    rows.push(headers.clone());
    for item in items {
        let row = headers
            .iter()
            .map(|header| match item.get(header) {
                None | Some(Value::Null) => String::new(),
                Some(value @ (Value::Object(_) | Value::Array(_))) => value.to_string(),
                Some(value) => cell_text(value).trim().to_string(),
            })
            .collect();
        rows.push(row);
    }

    Table::new(rows)
}

fn table_from_object(object: &Map<String, Value>) -> Result<Table, NormalizationError> {
    let direct = TABLE_FIELDS
        .iter()
        .find_map(|&field| object.get(field).filter(|v| !v.is_null()).map(|v| (field, v)));

    let found = direct.or_else(|| {
        ROW_FIELDS.iter().find_map(|&field| {
            object
                .get(field)
                .filter(|v| v.as_array().is_some_and(|rows| !rows.is_empty()))
                .map(|v| (field, v))
        })
    });

    if let Some((field, value)) = found {
        debug!("Using table field '{}'", field);
        return match value {
            Value::Array(items) if !items.is_empty() => {
                table_from_array(items).map_err(|_| NormalizationError::NotATable { field: field.to_string() })
            }
            _ => Err(NormalizationError::NotATable { field: field.to_string() }),
        };
    }

    if let Some(table) = table_from_csv_field(object) {
        return Ok(table);
    }

    flatten_to_field_table(object)
}

fn table_from_csv_field(object: &Map<String, Value>) -> Option<Table> {
    let csv = CSV_FIELDS.iter().find_map(|&field| object.get(field).filter(|v| !v.is_null()))?;
    let text = csv.as_str()?;

    // No quoted-comma support: cells are split on every comma.
    let rows: Vec<Vec<String>> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(',').map(|cell| cell.trim().to_string()).collect())
        .collect();

    if rows.is_empty() {
        return None;
    }

    debug!("Parsed CSV field into {} rows", rows.len());
    Some(Table::new(rows))
}

fn flatten_to_field_table(object: &Map<String, Value>) -> Result<Table, NormalizationError> {
    let mut fields = Vec::new();
    flatten_into(object, None, &mut fields);

    if fields.is_empty() {
        return Err(NormalizationError::NoFields);
    }

    debug!("No table field found, flattened {} fields", fields.len());

    let mut rows = Vec::with_capacity(fields.len() + 1);
    rows.push(vec!["Field".to_string(), "Value".to_string()]);
    rows.extend(fields.into_iter().map(|(path, value)| vec![humanize(&path), value]));
    Ok(Table::new(rows))
}

fn flatten_into(object: &Map<String, Value>, prefix: Option<&str>, out: &mut Vec<(String, String)>) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{}_{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(nested, Some(&path), out),
            Value::Array(items) => {
                let joined = items.iter().map(cell_text).collect::<Vec<_>>().join(", ");
                out.push((path, joined));
            }
            other => out.push((path, cell_text(other))),
        }
    }
}

/// Text of a single JSON value: strings verbatim, null empty, containers as
/// compact JSON.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => number_text(n),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Whole floats print without a fractional part (`2.0` becomes `2`).
fn number_text(n: &Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}

/// `po_number` → `Po Number`, `buyerGstNo` → `Buyer Gst No`.
pub fn humanize(key: &str) -> String {
    let mut spaced = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        match ch {
            '_' => spaced.push(' '),
            c if c.is_ascii_uppercase() => {
                spaced.push(' ');
                spaced.push(c);
            }
            c => spaced.push(c),
        }
    }

    let mut out = String::with_capacity(spaced.len());
    let mut in_word = false;
    for ch in spaced.chars() {
        let is_word = ch.is_alphanumeric();
        if is_word && !in_word {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        in_word = is_word;
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Table {
        Table::new(rows.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect())
    }

    #[test]
    fn test_non_json_body() {
        assert!(matches!(normalize("<html>Bad Gateway</html>"), Err(NormalizationError::InvalidJson(_))));
        assert!(matches!(normalize(""), Err(NormalizationError::InvalidJson(_))));
    }

    #[test]
    fn test_array_of_arrays_passes_through() {
        let table = normalize(r#"[["a","b"],["1",2,null],[true]]"#).unwrap();
        assert_eq!(table, grid(&[&["a", "b"], &["1", "2", ""], &["true"]]));
        assert!(!table.is_rectangular());
    }

    #[test]
    fn test_array_of_objects() {
        let table = normalize(r#"[{"x":"1","y":"2"},{"x":"3","y":"4"}]"#).unwrap();
        assert_eq!(table, grid(&[&["x", "y"], &["1", "2"], &["3", "4"]]));
    }

    #[test]
    fn test_array_of_objects_uses_first_object_keys() {
        let body = r#"[
            {"code":" A1 ","qty":2,"meta":{"k":1},"tags":["x"]},
            {"qty":null,"extra":"dropped"},
            "not an object"
        ]"#;
        let table = normalize(body).unwrap();

        assert_eq!(
            table,
            grid(&[
                &["code", "qty", "meta", "tags"],
                &["A1", "2", r#"{"k":1}"#, r#"["x"]"#],
                &["", "", "", ""],
                &["", "", "", ""],
            ])
        );
        assert!(table.is_rectangular());
    }

    #[test]
    fn test_unusable_arrays() {
        assert_eq!(normalize("[]"), Err(NormalizationError::EmptyArray));
        assert_eq!(normalize(r#"["a","b"]"#), Err(NormalizationError::UnsupportedArray));
        assert_eq!(normalize(r#"[["a"],"b"]"#), Err(NormalizationError::UnsupportedArray));
    }

    #[test]
    fn test_scalars_are_unusable() {
        assert_eq!(normalize("null"), Err(NormalizationError::UnsupportedShape("null")));
        assert_eq!(normalize("42"), Err(NormalizationError::UnsupportedShape("number")));
        assert_eq!(normalize(r#""text""#), Err(NormalizationError::UnsupportedShape("string")));
    }

    #[test]
    fn test_direct_field_priority() {
        let table = normalize(r#"{"data":[["A"]],"table":[["B"]]}"#).unwrap();
        assert_eq!(table, grid(&[&["A"]]));

        let table = normalize(r#"{"table":[["B"]],"excelData":[["E"]]}"#).unwrap();
        assert_eq!(table, grid(&[&["E"]]));
    }

    #[test]
    fn test_direct_field_skips_null() {
        let table = normalize(r#"{"data":null,"rows":[["r"]]}"#).unwrap();
        assert_eq!(table, grid(&[&["r"]]));
    }

    #[test]
    fn test_direct_field_with_objects() {
        let table = normalize(r#"{"output":[{"item":"bolt","qty":"4"}]}"#).unwrap();
        assert_eq!(table, grid(&[&["item", "qty"], &["bolt", "4"]]));
    }

    #[test]
    fn test_direct_field_that_is_not_a_table() {
        assert_eq!(
            normalize(r#"{"result":"done"}"#),
            Err(NormalizationError::NotATable { field: "result".to_string() })
        );
        assert_eq!(
            normalize(r#"{"data":[]}"#),
            Err(NormalizationError::NotATable { field: "data".to_string() })
        );
        assert_eq!(
            normalize(r#"{"rows":[1,2]}"#),
            Err(NormalizationError::NotATable { field: "rows".to_string() })
        );
    }

    #[test]
    fn test_csv_fallback() {
        let table = normalize(r#"{"csv":"a,b\n1,2"}"#).unwrap();
        assert_eq!(table, grid(&[&["a", "b"], &["1", "2"]]));

        let table = normalize(r#"{"csvData":" a , b \r\n1,2\n\n"}"#).unwrap();
        assert_eq!(table, grid(&[&["a", "b"], &["1", "2"]]));
    }

    #[test]
    fn test_non_string_csv_falls_through_to_flatten() {
        let table = normalize(r#"{"csv":5}"#).unwrap();
        assert_eq!(table, grid(&[&["Field", "Value"], &["Csv", "5"]]));
    }

    #[test]
    fn test_flatten_fallback() {
        let table = normalize(r#"{"foo":{"bar":1},"baz":[1,2]}"#).unwrap();
        assert_eq!(table, grid(&[&["Field", "Value"], &["Foo Bar", "1"], &["Baz", "1, 2"]]));
        assert!(table.is_rectangular());
    }

    #[test]
    fn test_flatten_handles_null_and_nesting() {
        let body = r#"{"invoice":{"poNumber":"25906562","buyer":{"gst_no":null}},"total":745.0,"paid":false}"#;
        let table = normalize(body).unwrap();

        assert_eq!(
            table,
            grid(&[
                &["Field", "Value"],
                &["Invoice Po Number", "25906562"],
                &["Invoice Buyer Gst No", ""],
                &["Total", "745"],
                &["Paid", "false"],
            ])
        );
    }

    #[test]
    fn test_empty_object_has_no_fields() {
        assert_eq!(normalize("{}"), Err(NormalizationError::NoFields));
        assert_eq!(normalize(r#"{"nested":{}}"#), Err(NormalizationError::NoFields));
    }

    #[test]
    fn test_empty_header_is_unusable() {
        assert_eq!(normalize(r#"[[],["Item","Qty"],["Bolt","4"]]"#), Err(NormalizationError::NoColumns));
        assert_eq!(normalize(r#"[{},{"a":"1"}]"#), Err(NormalizationError::NoColumns));
        assert_eq!(normalize(r#"{"data":[[]]}"#), Err(NormalizationError::NoColumns));
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("foo_bar"), "Foo Bar");
        assert_eq!(humanize("baz"), "Baz");
        assert_eq!(humanize("buyerGstNo"), "Buyer Gst No");
        assert_eq!(humanize("item_2_code"), "Item 2 Code");
        assert_eq!(humanize("_leading"), "Leading");
    }

    #[test]
    fn test_number_text() {
        assert_eq!(cell_text(&serde_json::json!(3)), "3");
        assert_eq!(cell_text(&serde_json::json!(2.0)), "2");
        assert_eq!(cell_text(&serde_json::json!(39.24)), "39.24");
        assert_eq!(cell_text(&serde_json::json!(-7)), "-7");
    }
}

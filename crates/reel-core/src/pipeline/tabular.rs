//! Eager tabular-data parsing for the pipeline's `.csv` rule.
//!
//! Comma-separated input becomes structured records at build time: the header
//! row names the fields, blank lines are discarded, and scalar values are
//! typed by inference so `1` arrives as a number, not a string.

use crate::error::Error;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Options mirrored into the rule table and across the bundler boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularOptions {
    /// Infer numbers, booleans, and null from scalar text.
    pub dynamic_typing: bool,
    /// Treat the first row as field names and emit records as objects.
    pub header: bool,
    /// Discard blank lines instead of producing empty records.
    pub skip_empty_lines: bool,
}

impl Default for TabularOptions {
    fn default() -> Self {
        Self {
            dynamic_typing: true,
            header: true,
            skip_empty_lines: true,
        }
    }
}

/// Parse comma-separated text into records.
///
/// With `header`, each record is an object keyed by the header row; without
/// it, each record is an array. A data row whose field count differs from the
/// header is an error carrying its 1-based line number.
pub fn parse_records(input: &str, options: &TabularOptions) -> Result<Vec<Value>, Error> {
    let rows = split_rows(input, options.skip_empty_lines);

    let mut rows = rows.into_iter();
    let header: Option<(usize, Vec<String>)> = if options.header {
        rows.next()
    } else {
        None
    };

    let mut records = Vec::new();
    for (line, fields) in rows {
        let values: Vec<Value> = fields
            .into_iter()
            .map(|field| typed_value(field, options.dynamic_typing))
            .collect();

        match &header {
            Some((_, names)) => {
                if values.len() != names.len() {
                    return Err(Error::Tabular {
                        line,
                        message: format!(
                            "expected {} fields, found {}",
                            names.len(),
                            values.len()
                        ),
                    });
                }
                let mut record = Map::new();
                for (name, value) in names.iter().zip(values) {
                    record.insert(name.clone(), value);
                }
                records.push(Value::Object(record));
            }
            None => records.push(Value::Array(values)),
        }
    }

    Ok(records)
}

/// Split input into rows of raw fields, tracking 1-based line numbers.
///
/// Quoted fields may contain commas, doubled quotes, and newlines.
fn split_rows(input: &str, skip_empty_lines: bool) -> Vec<(usize, Vec<String>)> {
    let mut rows = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut row_empty = true;

    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    field.push(ch);
                }
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' => {
                in_quotes = true;
                row_empty = false;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                row_empty = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                line += 1;
                if !(row_empty && field.is_empty() && fields.is_empty() && skip_empty_lines) {
                    fields.push(std::mem::take(&mut field));
                    rows.push((row_line, std::mem::take(&mut fields)));
                }
                field.clear();
                fields.clear();
                row_empty = true;
                row_line = line;
            }
            _ => {
                field.push(ch);
                row_empty = false;
            }
        }
    }

    if !(row_empty && field.is_empty() && fields.is_empty()) {
        fields.push(field);
        rows.push((row_line, fields));
    }

    rows
}

/// Type a scalar field: integer, float, boolean, null, else string.
fn typed_value(field: String, dynamic_typing: bool) -> Value {
    if !dynamic_typing {
        return Value::String(field);
    }

    let trimmed = field.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => Value::String(field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_row_names_fields_with_numeric_values() {
        let records = parse_records("a,b\n1,2\n", &TabularOptions::default()).unwrap();
        assert_eq!(records, vec![json!({"a": 1, "b": 2})]);
    }

    #[test]
    fn test_blank_lines_discarded() {
        let records = parse_records("a,b\n\n1,2\n\n\n3,4\n", &TabularOptions::default()).unwrap();
        assert_eq!(records, vec![json!({"a": 1, "b": 2}), json!({"a": 3, "b": 4})]);
    }

    #[test]
    fn test_type_inference() {
        let records =
            parse_records("n,f,t,s,e\n7,2.5,true,word,null\n", &TabularOptions::default())
                .unwrap();
        assert_eq!(
            records,
            vec![json!({"n": 7, "f": 2.5, "t": true, "s": "word", "e": null})]
        );
    }

    #[test]
    fn test_dynamic_typing_off_keeps_strings() {
        let options = TabularOptions {
            dynamic_typing: false,
            ..TabularOptions::default()
        };
        let records = parse_records("a,b\n1,true\n", &options).unwrap();
        assert_eq!(records, vec![json!({"a": "1", "b": "true"})]);
    }

    #[test]
    fn test_quoted_fields() {
        let records =
            parse_records("name,note\nclip,\"a, b\"\ntake,\"say \"\"hi\"\"\"\n", &TabularOptions::default())
                .unwrap();
        assert_eq!(
            records,
            vec![
                json!({"name": "clip", "note": "a, b"}),
                json!({"name": "take", "note": "say \"hi\""}),
            ]
        );
    }

    #[test]
    fn test_no_header_emits_arrays() {
        let options = TabularOptions {
            header: false,
            ..TabularOptions::default()
        };
        let records = parse_records("1,2\n3,4\n", &options).unwrap();
        assert_eq!(records, vec![json!([1, 2]), json!([3, 4])]);
    }

    #[test]
    fn test_field_count_mismatch_reports_line() {
        let err = parse_records("a,b\n1,2\n1,2,3\n", &TabularOptions::default()).unwrap_err();
        match err {
            Error::Tabular { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_crlf_input() {
        let records = parse_records("a,b\r\n1,2\r\n", &TabularOptions::default()).unwrap();
        assert_eq!(records, vec![json!({"a": 1, "b": 2})]);
    }
}

//! JSON and XML projections of record fields
//!
//! Column metadata decides how each value is written: boolean columns become
//! true/false (or 1/0), numeric columns are left unquoted, and date columns
//! are reformatted for XML.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::models::normalize::date_time_value;
use crate::schema::types::TableSchema;
use crate::value::FieldValue;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid tag pattern"));

/// Render fields as a flat JSON object in insertion order
///
/// Returns `None` when there are no fields. Keys and text go through
/// serde_json, with CRLF line breaks folded to LF first.
pub fn to_json(fields: &IndexMap<String, FieldValue>, schema: &TableSchema) -> Result<Option<String>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let mut members = Vec::with_capacity(fields.len());
    for (field, value) in fields {
        let column = schema.get(field);
        let rendered = match column {
            Some(c) if c.is_boolean() => value.is_truthy().to_string(),
            _ if value.is_null() => "null".to_string(),
            Some(c) if c.is_numeric() => match value.render() {
                r if r.is_empty() => "null".to_string(),
                r if r.parse::<f64>().map_or(false, f64::is_finite) => r,
                r => json_string(&r)?,
            },
            _ => json_string(&value.render())?,
        };
        members.push(format!("{}: {}", serde_json::to_string(field)?, rendered));
    }

    Ok(Some(format!("{{{}}}", members.join(", "))))
}

fn json_string(text: &str) -> Result<String> {
    Ok(serde_json::to_string(&text.replace("\r\n", "\n"))?)
}

/// Render fields as an XML fragment under a root element named `root`
pub fn to_xml(root: &str, fields: &IndexMap<String, FieldValue>, schema: &TableSchema) -> String {
    let mut xml = format!("<{}>", root);

    for (field, value) in fields {
        let mut text = value.render();

        if let Some(column) = schema.get(field) {
            if column.is_boolean() {
                text = if value.is_truthy() { "1" } else { "0" }.to_string();
            } else if column.is_date() {
                if let Some(dt) = date_time_value(value) {
                    let format = if column.is_date_time() {
                        "%Y-%m-%dT%H:%M:%S+00:00"
                    } else if column.is_time() {
                        "%H:%M:%S"
                    } else {
                        "%Y-%m-%d"
                    };
                    text = dt.format(format).to_string();
                }
            }
        }

        if text.contains('&') || text.contains('<') || text.contains('>') {
            text = format!("<![CDATA[{}]]>", text);
        }

        let tag = NON_WORD.replace_all(field, "");
        xml.push_str(&format!("<{tag}>{text}</{tag}>"));
    }

    xml.push_str(&format!("</{}>", root));
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::Column;
    use pretty_assertions::assert_eq;

    fn schema() -> TableSchema {
        TableSchema::from_columns(vec![
            Column::new("id", "INT"),
            Column::new("active", "ENUM").with_length("0,1"),
            Column::new("name", "VARCHAR").with_length("50"),
            Column::new("created", "DATETIME"),
            Column::new("opens", "TIME"),
            Column::new("born", "DATE").with_nullable(true),
        ])
        .unwrap()
    }

    fn fields(pairs: &[(&str, FieldValue)]) -> IndexMap<String, FieldValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn json_follows_column_types() {
        let record = fields(&[
            ("active", FieldValue::from("1")),
            ("name", FieldValue::from("Line1\r\nLine2")),
        ]);
        assert_eq!(
            to_json(&record, &schema()).unwrap().as_deref(),
            Some(r#"{"active": true, "name": "Line1\nLine2"}"#)
        );
    }

    #[test]
    fn json_numbers_quotes_and_nulls() {
        let record = fields(&[
            ("id", FieldValue::Int(7)),
            ("name", FieldValue::from("say \"hi\"")),
            ("born", FieldValue::Null),
            ("extra", FieldValue::from("x")),
        ]);
        assert_eq!(
            to_json(&record, &schema()).unwrap().as_deref(),
            Some(r#"{"id": 7, "name": "say \"hi\"", "born": null, "extra": "x"}"#)
        );
        assert_eq!(to_json(&IndexMap::new(), &schema()).unwrap(), None);
    }

    #[test]
    fn json_escapes_control_characters() {
        let record = fields(&[
            ("name", FieldValue::from("a\tb\rc\u{1}d\\e")),
            ("id", FieldValue::from("n/a")),
            ("we\"ird", FieldValue::from("x")),
        ]);
        let json = to_json(&record, &schema()).unwrap().unwrap();
        assert_eq!(
            json,
            r#"{"name": "a\tb\rc\u0001d\\e", "id": "n/a", "we\"ird": "x"}"#
        );

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["name"], "a\tb\rc\u{1}d\\e");
        assert_eq!(parsed["we\"ird"], "x");
    }

    #[test]
    fn xml_formats_dates_and_wraps_markup() {
        let record = fields(&[
            ("active", FieldValue::from("0")),
            ("name", FieldValue::from("<tag>")),
            ("created", FieldValue::from("2020-01-02 03:04:05")),
            ("opens", FieldValue::from("09:30:00")),
            ("born", FieldValue::from("not a date")),
            ("odd-name", FieldValue::from("v")),
        ]);
        assert_eq!(
            to_xml("Record", &record, &schema()),
            "<Record><active>0</active><name><![CDATA[<tag>]]></name>\
             <created>2020-01-02T03:04:05+00:00</created><opens>09:30:00</opens>\
             <born>not a date</born><oddname>v</oddname></Record>"
        );
    }
}

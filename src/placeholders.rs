//! Client-side handling of `:name` placeholders.
//!
//! SQL carrying named parameters is rewritten to positional `?` form and
//! executed as a prepared statement. When the quote-aware scan finds no
//! placeholder at all, the values are instead substituted directly into the
//! statement text as escaped SQL literals and sent over the text protocol.

use std::collections::HashMap;

use crate::error::{ClientError, Error, Result};
use crate::value::Value;

#[derive(Debug, PartialEq)]
pub(crate) enum Expanded {
    /// `:name` placeholders rewritten to `?`, values listed in order.
    Positional { sql: String, values: Vec<Value> },

    /// No placeholder found outside a string literal; values substituted
    /// client-side.
    Literal(String),
}

pub(crate) fn expand_named(sql: &str, params: &HashMap<String, Value>) -> Result<Expanded> {
    let matches = scan_placeholders(sql);

    if matches.is_empty() {
        return Ok(Expanded::Literal(substitute_literals(sql, params)));
    }

    let mut rewritten = String::with_capacity(sql.len());
    let mut values = Vec::with_capacity(matches.len());
    let mut tail = 0;

    for (start, end) in matches {
        let name = &sql[start + 1..end];

        let value = params.get(name).ok_or_else(|| {
            Error::Client(ClientError::UnknownParameter(name.to_owned()))
        })?;

        rewritten.push_str(&sql[tail..start]);
        rewritten.push('?');
        values.push(value.clone());

        tail = end;
    }

    rewritten.push_str(&sql[tail..]);

    Ok(Expanded::Positional {
        sql: rewritten,
        values,
    })
}

// Byte ranges of every `:name` occurrence that is not inside a single- or
// double-quoted literal.
fn scan_placeholders(sql: &str) -> Vec<(usize, usize)> {
    let bytes = sql.as_bytes();
    let mut matches = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        match quote {
            Some(q) => {
                if b == b'\\' {
                    // skip the escaped character
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }

            None => match b {
                b'\'' | b'"' => quote = Some(b),

                b':' => {
                    let end = placeholder_end(bytes, i + 1);
                    if end > i + 1 {
                        matches.push((i, end));
                        i = end;
                        continue;
                    }
                }

                _ => {}
            },
        }

        i += 1;
    }

    matches
}

fn placeholder_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;

    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }

    // a placeholder must start with a letter or underscore
    if end == start || bytes[start].is_ascii_digit() {
        return start;
    }

    end
}

// Quote-blind `:name` replacement used by the literal fallback path.
// Names without a supplied value are left untouched.
fn substitute_literals(sql: &str, params: &HashMap<String, Value>) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b':' {
            let end = placeholder_end(bytes, i + 1);

            if end > i + 1 {
                if let Some(value) = params.get(&sql[i + 1..end]) {
                    out.push_str(&quote_literal(value));
                    i = end;
                    continue;
                }
            }
        }

        // `i` walks byte-wise but always lands on char boundaries: ':' and
        // placeholder names are ASCII
        let ch_len = next_char_len(bytes, i);
        out.push_str(&sql[i..i + ch_len]);
        i += ch_len;
    }

    out
}

fn next_char_len(bytes: &[u8], i: usize) -> usize {
    let b = bytes[i];

    if b < 0x80 {
        1
    } else if b < 0xE0 {
        2
    } else if b < 0xF0 {
        3
    } else {
        4
    }
}

/// Renders a value as a SQL literal.
pub(crate) fn quote_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::Bool(true) => "TRUE".to_owned(),
        Value::Bool(false) => "FALSE".to_owned(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Text(s) => quote_string(s),
        Value::Bytes(b) => format!("X'{}'", hex::encode(b)),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');

    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("''"),
            _ => out.push(c),
        }
    }

    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::{expand_named, quote_literal, Expanded};
    use crate::value::Value;
    use std::collections::HashMap;

    fn params(entries: &[(&str, Value)]) -> HashMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn it_rewrites_named_placeholders_in_order() {
        let expanded = expand_named(
            "UPDATE t SET v = :v WHERE id = :id",
            &params(&[("v", Value::Int(5)), ("id", Value::Int(1))]),
        )
        .unwrap();

        assert_eq!(
            expanded,
            Expanded::Positional {
                sql: "UPDATE t SET v = ? WHERE id = ?".to_owned(),
                values: vec![Value::Int(5), Value::Int(1)],
            }
        );
    }

    #[test]
    fn it_reuses_a_value_for_repeated_names() {
        let expanded = expand_named(
            "SELECT * FROM t WHERE a = :x OR b = :x",
            &params(&[("x", Value::Int(3))]),
        )
        .unwrap();

        assert_eq!(
            expanded,
            Expanded::Positional {
                sql: "SELECT * FROM t WHERE a = ? OR b = ?".to_owned(),
                values: vec![Value::Int(3), Value::Int(3)],
            }
        );
    }

    #[test]
    fn it_ignores_placeholders_inside_string_literals() {
        let expanded = expand_named(
            "SELECT ':skip' AS a, \":also\" AS b, :real AS c",
            &params(&[("real", Value::Int(1))]),
        )
        .unwrap();

        assert_eq!(
            expanded,
            Expanded::Positional {
                sql: "SELECT ':skip' AS a, \":also\" AS b, ? AS c".to_owned(),
                values: vec![Value::Int(1)],
            }
        );
    }

    #[test]
    fn it_errors_on_a_missing_parameter() {
        assert!(expand_named("SELECT :nope", &params(&[])).is_err());
    }

    #[test]
    fn it_falls_back_to_literal_substitution() {
        let expanded = expand_named(
            "SELECT 'prefix :name suffix'",
            &params(&[("name", Value::Text("bob".to_owned()))]),
        )
        .unwrap();

        assert_eq!(
            expanded,
            Expanded::Literal("SELECT 'prefix 'bob' suffix'".to_owned())
        );
    }

    #[test]
    fn it_skips_bare_colons_and_numeric_suffixes() {
        let expanded = expand_named("SELECT a FROM t WHERE ts = '12:30'", &params(&[])).unwrap();

        assert_eq!(
            expanded,
            Expanded::Literal("SELECT a FROM t WHERE ts = '12:30'".to_owned())
        );
    }

    #[test]
    fn it_quotes_literals() {
        assert_eq!(quote_literal(&Value::Null), "NULL");
        assert_eq!(quote_literal(&Value::Bool(true)), "TRUE");
        assert_eq!(quote_literal(&Value::Int(-3)), "-3");
        assert_eq!(
            quote_literal(&Value::Text("it's a \\ test".to_owned())),
            "'it''s a \\\\ test'"
        );
        assert_eq!(
            quote_literal(&Value::Bytes(vec![0x01, 0x02, 0x03])),
            "X'010203'"
        );
    }
}

use std::fmt;

use chrono::NaiveDateTime;

/// A backend-typed scalar as held in a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
}

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render for display and editing; NULL becomes `null_glyph`.
    pub fn format(&self, null_glyph: &str) -> String {
        match self {
            Value::Null => null_glyph.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => {
                f.write_str("\\x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Coarse classification of a declared column type, used for coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    Integer,
    Float,
    Decimal,
    Bool,
    Bytes,
    Timestamp,
    Text,
}

impl TypeClass {
    pub fn of(declared_type: &str) -> Self {
        let t = declared_type.trim().to_ascii_lowercase();
        let base = t
            .split(['(', ' '])
            .next()
            .unwrap_or("")
            .trim();
        // MySQL spells booleans as tinyint(1)
        if t.starts_with("tinyint(1)") || base == "bool" || base == "boolean" {
            return TypeClass::Bool;
        }
        let is_int = base.ends_with("int")
            || base.ends_with("integer")
            || base.ends_with("serial")
            || (base.starts_with("int") && base[3..].chars().all(|c| c.is_ascii_digit()));
        if is_int {
            return TypeClass::Integer;
        }
        if base == "numeric" || base == "decimal" {
            return TypeClass::Decimal;
        }
        if base == "real" || base.starts_with("float") || base == "double" {
            return TypeClass::Float;
        }
        if base.contains("blob") || base == "bytea" || base.ends_with("binary") {
            return TypeClass::Bytes;
        }
        if (base == "timestamp" && !t.contains("with time zone")) || base == "datetime" {
            return TypeClass::Timestamp;
        }
        TypeClass::Text
    }
}

/// Coerce user-entered text to a scalar suitable for binding against a
/// column of `declared_type`.
///
/// Unparseable numbers and booleans fall back to the raw string so the
/// backend reports the error.
pub fn coerce(text: &str, declared_type: &str, null_glyph: &str) -> Value {
    if text == null_glyph {
        return Value::Null;
    }
    match TypeClass::of(declared_type) {
        TypeClass::Bool => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" => Value::Bool(true),
            "0" | "false" | "f" => Value::Bool(false),
            _ => Value::Text(text.to_string()),
        },
        TypeClass::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(text.to_string())),
        TypeClass::Float => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Text(text.to_string())),
        TypeClass::Bytes => match text.strip_prefix("\\x").and_then(decode_hex) {
            Some(bytes) => Value::Bytes(bytes),
            None => Value::Bytes(text.as_bytes().to_vec()),
        },
        TypeClass::Timestamp => TIMESTAMP_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::Text(text.to_string())),
        TypeClass::Decimal | TypeClass::Text => Value::Text(text.to_string()),
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Render `pairs` as a single logfmt line.
pub fn logfmt<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a Value)>, null_glyph: &str) -> String {
    pairs
        .into_iter()
        .map(|(name, value)| {
            let raw = value.format(null_glyph);
            if raw.is_empty() || raw.contains([' ', '=', '"']) {
                format!("{name}=\"{}\"", raw.replace('"', "\\\""))
            } else {
                format!("{name}={raw}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

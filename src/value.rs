use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::shape::FieldType;

/// A typed scalar constant embedded in a predicate or echoed back on the
/// default record.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Str(String),
    I64(i64),
    I32(i32),
    Bool(bool),
    DateTime(DateTime<Utc>),
    F64(f64),
    Enum { variant: String, ordinal: usize },
    Null,
}

impl Literal {
    /// Probe-style conversion of a raw query value into the field's type.
    /// `Optional` unwraps to the underlying type first. Returns `None` when
    /// the value cannot convert; callers skip the key rather than fail.
    pub fn coerce(ty: &FieldType, raw: &str) -> Option<Literal> {
        if raw.is_empty() {
            return None;
        }
        match ty.unwrapped() {
            FieldType::Str => Some(Literal::Str(raw.to_string())),
            FieldType::Int64 => raw.trim().parse::<i64>().ok().map(Literal::I64),
            FieldType::Int32 => raw.trim().parse::<i32>().ok().map(Literal::I32),
            FieldType::Bool => parse_bool(raw.trim()).map(Literal::Bool),
            FieldType::DateTime => parse_datetime(raw.trim()).map(Literal::DateTime),
            FieldType::Double => raw.trim().parse::<f64>().ok().map(Literal::F64),
            FieldType::Enum(variants) => variants
                .iter()
                .position(|v| v.eq_ignore_ascii_case(raw.trim()))
                .map(|ordinal| Literal::Enum {
                    variant: variants[ordinal].clone(),
                    ordinal,
                }),
            FieldType::Nested(_) | FieldType::Optional(_) => None,
        }
    }

    /// JSON rendering for the echo record.
    pub(crate) fn to_json(&self) -> Value {
        match self {
            Literal::Str(s) => Value::from(s.clone()),
            Literal::I64(n) => Value::from(*n),
            Literal::I32(n) => Value::from(*n),
            Literal::Bool(b) => Value::from(*b),
            Literal::DateTime(dt) => Value::from(dt.to_rfc3339()),
            Literal::F64(x) => Value::from(*x),
            Literal::Enum { variant, .. } => Value::from(variant.clone()),
            Literal::Null => Value::Null,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and bare dates.
pub(crate) fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

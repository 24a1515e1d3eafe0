//! Filter handlers: equality-style, containment, not-in and range keys.

use serde_json::Value;

use super::{keyword, Cx, TARGET};
use crate::metrics;
use crate::path::{resolve, Resolution, ResolvedField};
use crate::predicate::Predicate;
use crate::shape::FieldType;
use crate::value::Literal;
use crate::Result;

/// `filters[=field]`. Single field, no compound syntax.
pub(super) fn equals(cx: &mut Cx<'_>, inner: Option<&str>, value: &str) -> Result<()> {
    let Some(raw_key) = inner else {
        return Ok(());
    };
    apply_equality(cx, raw_key, value, false);
    Ok(())
}

/// `filters[field]`: the default containment operator. Supports `+`-compound
/// keys OR'd together and triggers keyword expansion for `keywordsearch`.
pub(super) fn contains(cx: &mut Cx<'_>, inner: Option<&str>, value: &str) -> Result<()> {
    let Some(raw_key) = inner else {
        return Ok(());
    };
    apply_equality(cx, raw_key, value, true);
    if raw_key.eq_ignore_ascii_case("keywordsearch") {
        keyword::expand(cx, value);
    }
    Ok(())
}

/// Shared core of the equals and contains handlers. The two differ only in
/// compound-key support; both compile string fields to null-guarded
/// case-insensitive containment and carry the numeric/boolean drop rules.
fn apply_equality(cx: &mut Cx<'_>, raw_key: &str, value: &str, compound: bool) {
    let parts: Vec<&str> = if compound {
        raw_key.split('+').collect()
    } else {
        vec![raw_key]
    };

    let mut combined: Option<Predicate> = None;
    for part in parts {
        let dotted = part.contains('.');
        let field = match resolve(cx.shapes, cx.root, part, cx.exclusions) {
            Resolution::Resolved(field) => field,
            Resolution::Excluded | Resolution::Unknown => {
                tracing::debug!(target: TARGET, field = part, "filter field unavailable; dropping");
                metrics::record_key_skipped();
                if dotted {
                    // A broken nested path drops the whole key, alternatives
                    // included.
                    return;
                }
                continue;
            }
        };

        let Some(literal) = Literal::coerce(&field.leaf, value) else {
            tracing::debug!(target: TARGET, field = part, "filter value failed coercion; dropping");
            metrics::record_key_skipped();
            continue;
        };

        if field.path.is_simple() {
            echo(cx, &field, &literal);
        }

        let Some(leaf) = equality_leaf(&field, &literal) else {
            continue;
        };
        let branch = Predicate::guarded(&field.guards, leaf);
        combined = Some(match combined {
            None => branch,
            Some(existing) => existing.or(branch),
        });
    }

    if let Some(predicate) = combined {
        cx.spec.and_filter(predicate);
    }
}

/// Leaf predicate for an equality-style comparison, or `None` when the drop
/// rules apply: integer filters only for values above zero, boolean filters
/// only for `false`, and no equality form for the remaining types.
fn equality_leaf(field: &ResolvedField, literal: &Literal) -> Option<Predicate> {
    match (field.leaf.unwrapped(), literal) {
        (FieldType::Str, Literal::Str(raw)) => {
            let needle = raw.trim().to_lowercase();
            Some(
                Predicate::not_null(field.path.clone())
                    .and(Predicate::contains(field.path.clone(), needle)),
            )
        }
        (FieldType::Int64, Literal::I64(n)) if *n > 0 => {
            Some(Predicate::eq(field.path.clone(), literal.clone()))
        }
        (FieldType::Int32, Literal::I32(n)) if *n > 0 => {
            Some(Predicate::eq(field.path.clone(), literal.clone()))
        }
        (FieldType::Bool, Literal::Bool(b)) if !*b => {
            Some(Predicate::eq(field.path.clone(), literal.clone()))
        }
        _ => None,
    }
}

/// Commits a coerced top-level filter value onto the echo record. A later
/// filter on the same field overwrites the echoed scalar.
fn echo(cx: &mut Cx<'_>, field: &ResolvedField, literal: &Literal) {
    if let Value::Object(map) = cx.spec.echo_mut() {
        map.insert(field.path.leaf().to_string(), literal.to_json());
    }
}

/// `filters[-field]`: not-in over a comma-separated integer list. Any
/// malformed element drops the whole filter.
pub(super) fn not_in(cx: &mut Cx<'_>, inner: Option<&str>, value: &str) -> Result<()> {
    let Some(raw_key) = inner else {
        return Ok(());
    };
    let field = match resolve(cx.shapes, cx.root, raw_key, cx.exclusions) {
        Resolution::Resolved(field) => field,
        Resolution::Excluded | Resolution::Unknown => {
            tracing::debug!(target: TARGET, field = raw_key, "not-in field unavailable; dropping");
            metrics::record_key_skipped();
            return Ok(());
        }
    };
    if !field.leaf.is_integer() {
        tracing::debug!(target: TARGET, field = raw_key, "not-in requires an integer field; dropping");
        metrics::record_key_skipped();
        return Ok(());
    }

    let mut values = Vec::new();
    for token in value.split(',') {
        match token.trim().parse::<i64>() {
            Ok(n) => values.push(n),
            Err(_) => {
                tracing::debug!(target: TARGET, field = raw_key, "malformed not-in list; dropping");
                metrics::record_key_skipped();
                return Ok(());
            }
        }
    }
    if values.is_empty() {
        return Ok(());
    }

    let leaf = Predicate::not_in(field.path.clone(), values);
    cx.spec.and_filter(Predicate::guarded(&field.guards, leaf));
    Ok(())
}

#[derive(Clone, Copy)]
enum RangeOp {
    Le,
    Ge,
}

pub(super) fn less_or_equal(cx: &mut Cx<'_>, inner: Option<&str>, value: &str) -> Result<()> {
    range(cx, inner, value, RangeOp::Le)
}

pub(super) fn greater_or_equal(cx: &mut Cx<'_>, inner: Option<&str>, value: &str) -> Result<()> {
    range(cx, inner, value, RangeOp::Ge)
}

/// Range comparisons pick the typed literal from the leaf: date-time, 64-bit
/// integer and double parse; everything else compares as raw text. The
/// literal string `"null"` becomes a typed null constant.
fn range(cx: &mut Cx<'_>, inner: Option<&str>, value: &str, op: RangeOp) -> Result<()> {
    let Some(raw_key) = inner else {
        return Ok(());
    };
    let field = match resolve(cx.shapes, cx.root, raw_key, cx.exclusions) {
        Resolution::Resolved(field) => field,
        Resolution::Excluded | Resolution::Unknown => {
            tracing::debug!(target: TARGET, field = raw_key, "range field unavailable; dropping");
            metrics::record_key_skipped();
            return Ok(());
        }
    };

    if value.is_empty() || field.leaf.is_nested() {
        tracing::debug!(target: TARGET, field = raw_key, "range filter not applicable; dropping");
        metrics::record_key_skipped();
        return Ok(());
    }

    let literal = if value.trim() == "null" {
        Some(Literal::Null)
    } else {
        match field.leaf.unwrapped() {
            FieldType::DateTime => Literal::coerce(&FieldType::DateTime, value),
            FieldType::Int64 => Literal::coerce(&FieldType::Int64, value),
            FieldType::Double => Literal::coerce(&FieldType::Double, value),
            _ => Some(Literal::Str(value.to_string())),
        }
    };
    let Some(literal) = literal else {
        tracing::debug!(target: TARGET, field = raw_key, "range value failed coercion; dropping");
        metrics::record_key_skipped();
        return Ok(());
    };

    let leaf = match op {
        RangeOp::Le => Predicate::le(field.path.clone(), literal),
        RangeOp::Ge => Predicate::ge(field.path.clone(), literal),
    };
    cx.spec.and_filter(Predicate::guarded(&field.guards, leaf));
    Ok(())
}

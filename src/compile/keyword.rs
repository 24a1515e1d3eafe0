//! Keyword search: expands one value into an OR across every string field
//! of the root shape and one level of nested string fields, each leaf
//! null-guarded. Traversed relations become implied include paths.

use super::{Cx, TARGET};
use crate::path::FieldPath;
use crate::predicate::Predicate;

pub(super) fn expand(cx: &mut Cx<'_>, value: &str) {
    let needle = value.trim().to_lowercase();
    let mut expression: Option<Predicate> = None;

    for field in cx.root.string_fields() {
        if cx.exclusions.contains(field.name()) {
            continue;
        }
        let path = FieldPath::single(field.name());
        let leaf = Predicate::not_null(path.clone()).and(Predicate::contains(path, needle.clone()));
        expression = Some(match expression {
            None => leaf,
            Some(existing) => existing.or(leaf),
        });
    }

    // One level into nested records; a child within a child is not searched.
    let nested: Vec<(String, String)> = cx
        .root
        .nested_fields()
        .map(|(field, shape)| (field.name().to_string(), shape.to_string()))
        .collect();
    for (relation, shape_name) in nested {
        if cx.exclusions.contains(&relation) {
            continue;
        }
        let Some(child) = cx.shapes.get(&shape_name) else {
            continue;
        };
        let parent = FieldPath::single(relation.clone());

        let mut child_expression: Option<Predicate> = None;
        for field in child.string_fields() {
            let dotted = format!("{relation}.{}", field.name());
            if cx.exclusions.contains(&dotted) {
                continue;
            }
            let path =
                FieldPath::from_segments(vec![relation.clone(), field.name().to_string()]);
            let leaf = Predicate::not_null(parent.clone()).and(
                Predicate::not_null(path.clone()).and(Predicate::contains(path, needle.clone())),
            );
            child_expression = Some(match child_expression {
                None => leaf,
                Some(existing) => existing.or(leaf),
            });
        }
        if let Some(child_expression) = child_expression {
            expression = Some(match expression {
                None => child_expression,
                Some(existing) => existing.or(child_expression),
            });
        }

        // The executor must eager-load what the filter dereferences.
        cx.imply_include(parent);
    }

    match expression {
        Some(expression) => cx.spec.and_filter(expression),
        None => {
            tracing::debug!(target: TARGET, "keyword search found no searchable fields");
        }
    }
}

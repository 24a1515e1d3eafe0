use std::collections::HashSet;
use std::fmt;

use crate::shape::{FieldType, RecordShape, ShapeRegistry};

/// A resolved, possibly nested, reference to a field on a record shape.
/// Segments carry the casing they were registered with.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub(crate) fn single(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_simple(&self) -> bool {
        self.0.len() == 1
    }

    pub fn leaf(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or_default()
    }

    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// Caller-supplied field paths that must never be used for filtering,
/// inclusion or keyword expansion. Compared case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct Exclusions(HashSet<String>);

impl Exclusions {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            paths
                .into_iter()
                .map(|p| p.into().to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(&path.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ResolvedField {
    pub(crate) path: FieldPath,
    pub(crate) leaf: FieldType,
    /// Path prefixes that traverse a nested record, in traversal order. Each
    /// one must be null-guarded before the leaf is dereferenced.
    pub(crate) guards: Vec<FieldPath>,
}

#[derive(Debug)]
pub(crate) enum Resolution {
    Resolved(ResolvedField),
    Excluded,
    Unknown,
}

/// Walks a dotted path segment-by-segment against the registry. Exclusion of
/// any cumulative prefix aborts immediately; an unknown segment resolves
/// soft, never fatally.
pub(crate) fn resolve(
    shapes: &ShapeRegistry,
    root: &RecordShape,
    raw: &str,
    exclusions: &Exclusions,
) -> Resolution {
    let mut current = root;
    let mut segments: Vec<String> = Vec::new();
    let mut guards: Vec<FieldPath> = Vec::new();
    let mut leaf: Option<FieldType> = None;

    let raw_segments: Vec<&str> = raw.split('.').map(str::trim).collect();
    if raw_segments.iter().any(|s| s.is_empty()) {
        return Resolution::Unknown;
    }

    for (index, raw_segment) in raw_segments.iter().enumerate() {
        // A previous segment must have been a nested record to descend.
        if index > 0 {
            let Some(FieldType::Nested(target)) = leaf.as_ref().map(FieldType::unwrapped) else {
                return Resolution::Unknown;
            };
            let Some(next) = shapes.get(target) else {
                return Resolution::Unknown;
            };
            current = next;
        }

        let mut prefix = segments.join(".");
        if !prefix.is_empty() {
            prefix.push('.');
        }
        prefix.push_str(raw_segment);
        if exclusions.contains(&prefix) {
            return Resolution::Excluded;
        }

        let Some(field) = current.lookup(raw_segment) else {
            return Resolution::Unknown;
        };
        segments.push(field.name().to_string());
        if field.ty().is_nested() {
            guards.push(FieldPath::from_segments(segments.clone()));
        }
        leaf = Some(field.ty().clone());
    }

    match leaf {
        Some(leaf) => Resolution::Resolved(ResolvedField {
            path: FieldPath::from_segments(segments),
            leaf,
            guards,
        }),
        None => Resolution::Unknown,
    }
}

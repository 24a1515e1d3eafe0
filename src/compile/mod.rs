//! Key-pattern dispatch: classifies each incoming query key against an
//! ordered pattern table and routes it to the matching builder.

mod filters;
mod keyword;

use std::sync::LazyLock;

use regex::Regex;

use crate::metrics;
use crate::path::{resolve, Exclusions, FieldPath, Resolution};
use crate::shape::{FieldType, RecordShape, ShapeRegistry};
use crate::spec::{OrderSpec, Paging, QuerySpec, SortDirection};
use crate::{Error, Result};

pub(crate) const TARGET: &str = "keysift::compile";

/// Compiles raw key/value pairs into a [`QuerySpec`] for a registered root
/// shape. Pure and synchronous; safe to share across threads.
#[derive(Clone, Debug)]
pub struct Compiler {
    shapes: ShapeRegistry,
    default_page_number: i64,
    default_page_size: i64,
}

impl Compiler {
    pub fn new(shapes: ShapeRegistry) -> Self {
        Self {
            shapes,
            default_page_number: 1,
            default_page_size: 10,
        }
    }

    pub fn builder(shapes: ShapeRegistry) -> CompilerBuilder {
        CompilerBuilder {
            compiler: Self::new(shapes),
        }
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    /// Classifies every pair in presentation order. Recognized keys with
    /// malformed paging values abort with `InvalidPageNumber`/
    /// `InvalidPageSize`; every other failure skips just its own key.
    pub fn compile(
        &self,
        root: &str,
        params: &[(String, String)],
        exclusions: &Exclusions,
    ) -> Result<QuerySpec> {
        let root_shape = self
            .shapes
            .get(root)
            .ok_or_else(|| Error::UnknownShape(root.to_string()))?;

        let mut cx = Cx {
            shapes: &self.shapes,
            root: root_shape,
            exclusions,
            spec: QuerySpec::new(
                Paging::new(self.default_page_number, self.default_page_size),
                root_shape.empty_record(),
            ),
            explicit_includes: Vec::new(),
            implied_includes: Vec::new(),
        };

        for (key, value) in params {
            match KEY_PATTERNS.iter().find(|p| p.regex.is_match(key)) {
                Some(pattern) => {
                    let inner = pattern
                        .regex
                        .captures(key)
                        .and_then(|caps| caps.get(1))
                        .map(|m| m.as_str().to_string());
                    (pattern.handler)(&mut cx, inner.as_deref(), value).inspect_err(|_| {
                        metrics::record_compile_failure();
                    })?;
                    metrics::record_key_matched();
                }
                None => {
                    tracing::debug!(target: TARGET, key = %key, "unrecognized query key; skipping");
                    metrics::record_key_skipped();
                }
            }
        }

        let mut includes = cx.explicit_includes;
        for path in cx.implied_includes {
            if !includes.contains(&path) {
                includes.push(path);
            }
        }
        cx.spec.set_includes(includes);

        metrics::record_compile();
        Ok(cx.spec)
    }
}

#[derive(Debug)]
pub struct CompilerBuilder {
    compiler: Compiler,
}

impl CompilerBuilder {
    pub fn default_page_number(mut self, page_number: i64) -> Self {
        self.compiler.default_page_number = page_number;
        self
    }

    pub fn default_page_size(mut self, page_size: i64) -> Self {
        self.compiler.default_page_size = page_size;
        self
    }

    pub fn build(self) -> Compiler {
        self.compiler
    }
}

/// Per-compilation state threaded through the handlers.
pub(crate) struct Cx<'a> {
    pub(crate) shapes: &'a ShapeRegistry,
    pub(crate) root: &'a RecordShape,
    pub(crate) exclusions: &'a Exclusions,
    pub(crate) spec: QuerySpec,
    pub(crate) explicit_includes: Vec<FieldPath>,
    pub(crate) implied_includes: Vec<FieldPath>,
}

type Handler = fn(&mut Cx<'_>, Option<&str>, &str) -> Result<()>;

struct KeyPattern {
    regex: Regex,
    handler: Handler,
}

fn pattern(re: &str, handler: Handler) -> KeyPattern {
    KeyPattern {
        regex: Regex::new(re).expect("static key pattern"),
        handler,
    }
}

// Order is load-bearing: first match wins, so the operator-prefixed filter
// forms must precede the bare `filters[...]` fallback.
static KEY_PATTERNS: LazyLock<Vec<KeyPattern>> = LazyLock::new(|| {
    vec![
        pattern(r"(?i)^page\[number\]$", page_number),
        pattern(r"(?i)^page\[size\]$", page_size),
        pattern(r"(?i)^filters\[-(\S*)\]$", filters::not_in),
        pattern(r"(?i)^filters\[=(\S*)\]$", filters::equals),
        pattern(r"(?i)^filters\[<=(\S*)\]$", filters::less_or_equal),
        pattern(r"(?i)^filters\[>=(\S*)\]$", filters::greater_or_equal),
        pattern(r"(?i)^filters\[(\S*)\]$", filters::contains),
        pattern(r"(?i)^sort$", sort),
        pattern(r"(?i)^includes$", includes),
    ]
});

fn page_number(cx: &mut Cx<'_>, _inner: Option<&str>, value: &str) -> Result<()> {
    let number: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidPageNumber(value.to_string()))?;
    cx.spec.paging_mut().set_page_number(number);
    Ok(())
}

fn page_size(cx: &mut Cx<'_>, _inner: Option<&str>, value: &str) -> Result<()> {
    let size: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidPageSize(value.to_string()))?;
    cx.spec.paging_mut().set_page_size(size);
    Ok(())
}

/// Only the first comma token is honored; multi-key sort is declared by the
/// grammar but not implemented.
fn sort(cx: &mut Cx<'_>, _inner: Option<&str>, value: &str) -> Result<()> {
    let token = value.split(',').next().unwrap_or_default().trim();
    if token.is_empty() {
        return Ok(());
    }

    let (name, requested) = if let Some(rest) = token.strip_prefix('-') {
        (rest, SortDirection::Desc)
    } else if let Some(rest) = token.strip_prefix('+') {
        (rest, SortDirection::Asc)
    } else {
        (token, SortDirection::Asc)
    };

    match resolve(cx.shapes, cx.root, name, cx.exclusions) {
        Resolution::Resolved(field) => {
            let kind = field.leaf.unwrapped().clone();
            if matches!(kind, FieldType::Nested(_)) {
                tracing::debug!(target: TARGET, field = name, "cannot sort by a nested record; skipping");
                return Ok(());
            }
            // Boolean and enum comparisons sort inverted.
            let direction = if matches!(kind, FieldType::Bool | FieldType::Enum(_)) {
                requested.flipped()
            } else {
                requested
            };
            cx.spec.set_order(OrderSpec::new(field.path, direction, kind));
        }
        Resolution::Excluded | Resolution::Unknown => {
            tracing::debug!(target: TARGET, field = name, "sort field unavailable; skipping");
        }
    }
    Ok(())
}

/// Comma-separated relation names, resolved one level against the root. A
/// leading `-` is tolerated and stripped. The parsed set replaces any prior
/// `includes` key; keyword-implied includes are unioned in afterwards.
fn includes(cx: &mut Cx<'_>, _inner: Option<&str>, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Ok(());
    }

    let mut parsed: Vec<FieldPath> = Vec::new();
    for name in value.split(',') {
        let name = name.trim();
        let name = name.strip_prefix('-').unwrap_or(name);
        if name.is_empty() || name.contains('.') {
            continue;
        }
        match resolve(cx.shapes, cx.root, name, cx.exclusions) {
            Resolution::Resolved(field) => {
                if !parsed.contains(&field.path) {
                    parsed.push(field.path);
                }
            }
            Resolution::Excluded | Resolution::Unknown => {
                tracing::debug!(target: TARGET, field = name, "include unavailable; dropping");
            }
        }
    }

    if !parsed.is_empty() {
        cx.explicit_includes = parsed;
    }
    Ok(())
}

impl Cx<'_> {
    pub(crate) fn imply_include(&mut self, path: FieldPath) {
        if !self.implied_includes.contains(&path) {
            self.implied_includes.push(path);
        }
    }
}

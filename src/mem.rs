//! Reference in-memory executor: evaluates a compiled spec against a
//! collection of JSON documents. This is the executable semantics the
//! compiler is tested against; storage-backed executors must agree with it.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;

use crate::exec::{Executor, Page};
use crate::metrics;
use crate::path::FieldPath;
use crate::predicate::Predicate;
use crate::shape::{FieldType, RecordShape};
use crate::spec::{OrderSpec, QuerySpec, SortDirection};
use crate::value::{parse_datetime, Literal};
use crate::Result;

pub struct MemRecords {
    shape: RecordShape,
    docs: Vec<Value>,
}

impl MemRecords {
    pub fn new(shape: RecordShape) -> Self {
        Self {
            shape,
            docs: Vec::new(),
        }
    }

    pub fn with_docs(shape: RecordShape, docs: Vec<Value>) -> Self {
        Self { shape, docs }
    }

    pub fn push(&mut self, doc: Value) {
        self.docs.push(doc);
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn default_order(&self) -> Option<OrderSpec> {
        let identity = self.shape.lookup(self.shape.identity())?;
        Some(OrderSpec::new(
            FieldPath::single(identity.name()),
            SortDirection::Asc,
            identity.ty().unwrapped().clone(),
        ))
    }
}

#[async_trait]
impl Executor for MemRecords {
    async fn execute(&self, spec: &QuerySpec) -> Result<Page> {
        let mut hits: Vec<&Value> = self
            .docs
            .iter()
            .filter(|doc| eval(spec.filter(), doc))
            .collect();

        let order = spec.order().cloned().or_else(|| self.default_order());
        if let Some(order) = order {
            hits.sort_by(|a, b| compare_docs(a, b, &order));
        }

        let total_count = hits.len() as i64;
        let paging = spec.paging();
        let offset = paging.offset().max(0) as usize;
        let size = paging.page_size() as usize;
        let items: Vec<Value> = hits
            .into_iter()
            .skip(offset)
            .take(size)
            .cloned()
            .collect();

        metrics::record_fetch();
        Ok(Page {
            items,
            total_count,
            page_number: paging.page_number(),
            page_size: paging.page_size(),
        })
    }
}

/// Walks a field path through nested objects. Keys match exactly: compiled
/// paths carry registered casing, and documents are expected to match.
fn lookup<'a>(doc: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.segments() {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn eval(predicate: &Predicate, doc: &Value) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::And(l, r) => eval(l, doc) && eval(r, doc),
        Predicate::Or(l, r) => eval(l, doc) || eval(r, doc),
        Predicate::NotNull(path) => lookup(doc, path).is_some_and(|v| !v.is_null()),
        Predicate::Contains { path, needle } => lookup(doc, path)
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_lowercase().contains(needle)),
        Predicate::Eq { path, value } => {
            lookup(doc, path).is_some_and(|v| literal_eq(v, value))
        }
        Predicate::NotIn { path, values } => lookup(doc, path)
            .and_then(Value::as_i64)
            .is_some_and(|n| !values.contains(&n)),
        Predicate::Le { path, value } => lookup(doc, path)
            .and_then(|v| compare_literal(v, value))
            .is_some_and(|ordering| ordering != Ordering::Greater),
        Predicate::Ge { path, value } => lookup(doc, path)
            .and_then(|v| compare_literal(v, value))
            .is_some_and(|ordering| ordering != Ordering::Less),
    }
}

fn literal_eq(doc: &Value, literal: &Literal) -> bool {
    match literal {
        Literal::I64(n) => doc.as_i64() == Some(*n),
        Literal::I32(n) => doc.as_i64() == Some(i64::from(*n)),
        Literal::Bool(b) => doc.as_bool() == Some(*b),
        Literal::F64(x) => doc.as_f64() == Some(*x),
        Literal::Str(s) => doc.as_str() == Some(s.as_str()),
        Literal::DateTime(dt) => doc
            .as_str()
            .and_then(parse_datetime)
            .is_some_and(|d| d == *dt),
        Literal::Enum { variant, .. } => doc
            .as_str()
            .is_some_and(|s| s.eq_ignore_ascii_case(variant)),
        Literal::Null => doc.is_null(),
    }
}

/// Comparison against a typed literal; `None` means not comparable, which
/// makes the range predicate false. A null constant compares with nothing.
fn compare_literal(doc: &Value, literal: &Literal) -> Option<Ordering> {
    match literal {
        Literal::Null => None,
        Literal::I64(n) => doc.as_i64().map(|d| d.cmp(n)),
        Literal::I32(n) => doc.as_i64().map(|d| d.cmp(&i64::from(*n))),
        Literal::F64(x) => doc.as_f64().and_then(|d| d.partial_cmp(x)),
        Literal::DateTime(dt) => doc.as_str().and_then(parse_datetime).map(|d| d.cmp(dt)),
        Literal::Str(s) => doc.as_str().map(|d| d.cmp(s.as_str())),
        Literal::Bool(b) => doc.as_bool().map(|d| d.cmp(b)),
        Literal::Enum { variant, .. } => doc.as_str().map(|d| d.cmp(variant.as_str())),
    }
}

fn compare_docs(a: &Value, b: &Value, order: &OrderSpec) -> Ordering {
    let ordering = compare_values(
        lookup(a, order.path()),
        lookup(b, order.path()),
        order.kind(),
    );
    match order.direction() {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Missing and null values sort first; unknown enum variants sort last.
fn compare_values(a: Option<&Value>, b: Option<&Value>, kind: &FieldType) -> Ordering {
    let (a, b) = match (present(a), present(b)) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(a), Some(b)) => (a, b),
    };
    match kind {
        FieldType::Str => cmp_option(a.as_str(), b.as_str()),
        FieldType::Int64 | FieldType::Int32 => cmp_option(a.as_i64(), b.as_i64()),
        FieldType::Double => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (x, y) => cmp_option(x.map(|_| ()), y.map(|_| ())),
        },
        FieldType::Bool => cmp_option(a.as_bool(), b.as_bool()),
        FieldType::DateTime => cmp_option(
            a.as_str().and_then(parse_datetime),
            b.as_str().and_then(parse_datetime),
        ),
        FieldType::Enum(variants) => cmp_option(ordinal(a, variants), ordinal(b, variants)),
        FieldType::Nested(_) | FieldType::Optional(_) => Ordering::Equal,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn cmp_option<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn ordinal(value: &Value, variants: &[String]) -> Option<usize> {
    let name = value.as_str()?;
    Some(
        variants
            .iter()
            .position(|v| v.eq_ignore_ascii_case(name))
            .unwrap_or(usize::MAX),
    )
}

use serde_json::Value;

use crate::path::FieldPath;
use crate::predicate::Predicate;
use crate::shape::FieldType;

/// Direction for sorting results.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub(crate) fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Ordering descriptor: resolved field path, effective direction and the
/// comparison kind executors dispatch on.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderSpec {
    path: FieldPath,
    direction: SortDirection,
    kind: FieldType,
}

impl OrderSpec {
    pub(crate) fn new(path: FieldPath, direction: SortDirection, kind: FieldType) -> Self {
        Self {
            path,
            direction,
            kind,
        }
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn kind(&self) -> &FieldType {
        &self.kind
    }
}

/// Pagination window. Raw values are kept as supplied; the accessors clamp
/// to a minimum of 1, and `total_count` is populated by the executor.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Paging {
    page_number: i64,
    page_size: i64,
    total_count: Option<i64>,
}

impl Paging {
    pub(crate) fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            page_number,
            page_size,
            total_count: None,
        }
    }

    pub fn page_number(&self) -> i64 {
        self.page_number.max(1)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size.max(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page_number() - 1) * self.page_size()
    }

    pub fn total_count(&self) -> Option<i64> {
        self.total_count
    }

    pub fn total_pages(&self) -> Option<i64> {
        self.total_count
            .map(|total| (total + self.page_size() - 1) / self.page_size())
    }

    pub(crate) fn set_page_number(&mut self, page_number: i64) {
        self.page_number = page_number;
    }

    pub(crate) fn set_page_size(&mut self, page_size: i64) {
        self.page_size = page_size;
    }
}

/// The compiled, backend-agnostic description of a filter + sort + page +
/// include request. Built fresh per compilation and handed to an executor.
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySpec {
    filter: Predicate,
    order: Option<OrderSpec>,
    paging: Paging,
    includes: Vec<FieldPath>,
    echo: Value,
}

impl QuerySpec {
    pub(crate) fn new(paging: Paging, echo: Value) -> Self {
        Self {
            filter: Predicate::True,
            order: None,
            paging,
            includes: Vec::new(),
            echo,
        }
    }

    pub fn filter(&self) -> &Predicate {
        &self.filter
    }

    pub fn order(&self) -> Option<&OrderSpec> {
        self.order.as_ref()
    }

    pub fn paging(&self) -> &Paging {
        &self.paging
    }

    pub fn includes(&self) -> &[FieldPath] {
        &self.includes
    }

    /// The default record with coerced top-level filter values echoed back.
    pub fn echo(&self) -> &Value {
        &self.echo
    }

    pub(crate) fn and_filter(&mut self, predicate: Predicate) {
        let current = std::mem::replace(&mut self.filter, Predicate::True);
        self.filter = current.and(predicate);
    }

    pub(crate) fn set_order(&mut self, order: OrderSpec) {
        self.order = Some(order);
    }

    pub(crate) fn set_includes(&mut self, includes: Vec<FieldPath>) {
        self.includes = includes;
    }

    pub(crate) fn paging_mut(&mut self) -> &mut Paging {
        &mut self.paging
    }

    pub(crate) fn echo_mut(&mut self) -> &mut Value {
        &mut self.echo
    }
}

use async_trait::async_trait;
use serde_json::Value;

use crate::spec::QuerySpec;
use crate::Result;

/// One fetched page: the matching documents plus the totals the paging
/// window was resolved against. Serializes directly into an API response
/// body.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    pub total_count: i64,
    pub page_number: i64,
    pub page_size: i64,
}

impl Page {
    pub fn total_pages(&self) -> i64 {
        (self.total_count + self.page_size - 1) / self.page_size
    }
}

/// Runs a compiled specification against a data source. Implementations own
/// their concurrency and transaction discipline; the compiler guarantees
/// nothing beyond the single spec it produced.
#[async_trait]
pub trait Executor {
    async fn execute(&self, spec: &QuerySpec) -> Result<Page>;
}

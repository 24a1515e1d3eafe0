//! keysift — compiles JSON:API-style query strings into typed,
//! backend-agnostic query specifications.

pub mod compile;
mod error;
pub mod exec;
pub mod mem;
pub mod metrics;
pub mod path;
pub mod pg;
pub mod predicate;
pub mod shape;
pub mod spec;
pub mod value;

pub use compile::Compiler;
pub use error::{Error, Result, WithContext};
pub use exec::{Executor, Page};
pub use path::{Exclusions, FieldPath};
pub use predicate::Predicate;
pub use shape::{FieldType, RecordShape, ShapeRegistry};
pub use spec::{OrderSpec, Paging, QuerySpec, SortDirection};

pub mod prelude {
    pub use crate::{
        Compiler, Exclusions, Executor, FieldType, Page, RecordShape, Result, ShapeRegistry,
    };
}

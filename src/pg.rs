//! Postgres executor: records live in a `records` table with a `jsonb` doc
//! column; the predicate tree renders through `sqlx::QueryBuilder`. Include
//! paths are advisory here since documents embed their nested records.

use async_trait::async_trait;
use indoc::formatdoc;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::exec::{Executor, Page};
use crate::metrics;
use crate::path::FieldPath;
use crate::predicate::Predicate;
use crate::shape::{FieldType, RecordShape};
use crate::spec::{OrderSpec, QuerySpec, SortDirection};
use crate::value::Literal;
use crate::Result;

pub struct PgRecords {
    pool: PgPool,
    shape: RecordShape,
}

impl PgRecords {
    pub fn new(pool: PgPool, shape: RecordShape) -> Self {
        Self { pool, shape }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let ddl = formatdoc!(
            r#"
            create table if not exists records (
                id uuid primary key,
                doc jsonb not null,
                created_at timestamptz not null default now(),
                updated_at timestamptz not null default now()
            )
            "#
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn upsert(&self, id: &Uuid, doc: &Value) -> Result<()> {
        sqlx::query(
            r#"
            insert into records (id, doc)
            values ($1, $2)
            on conflict (id) do update
              set doc = excluded.doc,
                  updated_at = now()
            "#,
        )
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn count_query(&self, spec: &QuerySpec) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("select count(*) from records where ");
        push_predicate(&mut builder, spec.filter());
        builder
    }

    fn select_query(&self, spec: &QuerySpec) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("select doc from records where ");
        push_predicate(&mut builder, spec.filter());

        let order = spec.order().cloned().or_else(|| self.default_order());
        if let Some(order) = order {
            builder.push(" order by ");
            push_order_expr(&mut builder, &order);
            builder.push(" ");
            builder.push(order.direction().as_str());
        }

        let paging = spec.paging();
        builder.push(" limit ");
        builder.push_bind(paging.page_size());
        builder.push(" offset ");
        builder.push_bind(paging.offset());
        builder
    }

    /// Rendered SQL of the page query, for logging and assertions.
    pub fn select_sql(&self, spec: &QuerySpec) -> String {
        self.select_query(spec).sql().to_string()
    }

    pub fn count_sql(&self, spec: &QuerySpec) -> String {
        self.count_query(spec).sql().to_string()
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
impl Executor for PgRecords {
    async fn execute(&self, spec: &QuerySpec) -> Result<Page> {
        let start = std::time::Instant::now();

        let total_count: i64 = self
            .count_query(spec)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut select = self.select_query(spec);
        let sql_captured = select.sql().to_string();
        let rows: Vec<(Value,)> = select.build_query_as().fetch_all(&self.pool).await?;

        if start.elapsed() > std::time::Duration::from_millis(500) {
            tracing::warn!(
                target: "keysift::slow_query",
                elapsed_ms = start.elapsed().as_millis() as u64,
                sql = %sql_captured,
                "slow record query"
            );
        }

        metrics::record_fetch();
        let paging = spec.paging();
        Ok(Page {
            items: rows.into_iter().map(|(doc,)| doc).collect(),
            total_count,
            page_number: paging.page_number(),
            page_size: paging.page_size(),
        })
    }
}

fn path_parts(path: &FieldPath) -> Vec<String> {
    path.segments().to_vec()
}

fn push_text_expr(builder: &mut QueryBuilder<'_, Postgres>, path: &FieldPath) {
    builder.push("doc #>> ");
    builder.push_bind(path_parts(path));
}

fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::True => {
            builder.push("true");
        }
        Predicate::And(l, r) => {
            builder.push("(");
            push_predicate(builder, l);
            builder.push(" and ");
            push_predicate(builder, r);
            builder.push(")");
        }
        Predicate::Or(l, r) => {
            builder.push("(");
            push_predicate(builder, l);
            builder.push(" or ");
            push_predicate(builder, r);
            builder.push(")");
        }
        Predicate::NotNull(path) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(") is not null)");
        }
        Predicate::Contains { path, needle } => {
            builder.push("(position(");
            builder.push_bind(needle.clone());
            builder.push(" in lower(");
            push_text_expr(builder, path);
            builder.push(")) > 0)");
        }
        Predicate::Eq { path, value } => push_eq(builder, path, value),
        Predicate::NotIn { path, values } => {
            if values.is_empty() {
                builder.push("true");
            } else {
                builder.push("(not ((");
                push_text_expr(builder, path);
                builder.push(")::bigint in (");
                let mut separated = builder.separated(", ");
                for value in values {
                    separated.push_bind(*value);
                }
                builder.push(")))");
            }
        }
        Predicate::Le { path, value } => push_cmp(builder, path, value, "<="),
        Predicate::Ge { path, value } => push_cmp(builder, path, value, ">="),
    }
}

fn push_eq(builder: &mut QueryBuilder<'_, Postgres>, path: &FieldPath, value: &Literal) {
    match value {
        Literal::I64(n) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::bigint = ");
            builder.push_bind(*n);
            builder.push(")");
        }
        Literal::I32(n) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::bigint = ");
            builder.push_bind(i64::from(*n));
            builder.push(")");
        }
        Literal::Bool(b) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::boolean = ");
            builder.push_bind(*b);
            builder.push(")");
        }
        Literal::F64(x) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::double precision = ");
            builder.push_bind(*x);
            builder.push(")");
        }
        Literal::DateTime(dt) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::timestamptz = ");
            builder.push_bind(*dt);
            builder.push(")");
        }
        Literal::Str(s) | Literal::Enum { variant: s, .. } => {
            builder.push("(lower(");
            push_text_expr(builder, path);
            builder.push(") = ");
            builder.push_bind(s.to_lowercase());
            builder.push(")");
        }
        Literal::Null => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(") is null)");
        }
    }
}

/// Typed cast chosen by the literal the compiler embedded; a null constant
/// renders as a comparison with SQL null, which matches nothing.
fn push_cmp(builder: &mut QueryBuilder<'_, Postgres>, path: &FieldPath, value: &Literal, op: &str) {
    match value {
        Literal::I64(n) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::bigint ");
            builder.push(op);
            builder.push(" ");
            builder.push_bind(*n);
            builder.push(")");
        }
        Literal::F64(x) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::double precision ");
            builder.push(op);
            builder.push(" ");
            builder.push_bind(*x);
            builder.push(")");
        }
        Literal::DateTime(dt) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::timestamptz ");
            builder.push(op);
            builder.push(" ");
            builder.push_bind(*dt);
            builder.push(")");
        }
        Literal::Null => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(") ");
            builder.push(op);
            builder.push(" null)");
        }
        Literal::I32(n) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::bigint ");
            builder.push(op);
            builder.push(" ");
            builder.push_bind(i64::from(*n));
            builder.push(")");
        }
        Literal::Str(s) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(") ");
            builder.push(op);
            builder.push(" ");
            builder.push_bind(s.clone());
            builder.push(")");
        }
        Literal::Bool(b) => {
            builder.push("((");
            push_text_expr(builder, path);
            builder.push(")::boolean ");
            builder.push(op);
            builder.push(" ");
            builder.push_bind(*b);
            builder.push(")");
        }
        Literal::Enum { variant, .. } => {
            builder.push("(lower(");
            push_text_expr(builder, path);
            builder.push(") ");
            builder.push(op);
            builder.push(" ");
            builder.push_bind(variant.to_lowercase());
            builder.push(")");
        }
    }
}

fn push_order_expr(builder: &mut QueryBuilder<'_, Postgres>, order: &OrderSpec) {
    match order.kind() {
        FieldType::Int64 | FieldType::Int32 => {
            builder.push("(");
            push_text_expr(builder, order.path());
            builder.push(")::bigint");
        }
        FieldType::Double => {
            builder.push("(");
            push_text_expr(builder, order.path());
            builder.push(")::double precision");
        }
        FieldType::DateTime => {
            builder.push("(");
            push_text_expr(builder, order.path());
            builder.push(")::timestamptz");
        }
        FieldType::Bool => {
            builder.push("(");
            push_text_expr(builder, order.path());
            builder.push(")::boolean");
        }
        FieldType::Enum(variants) => {
            // Variant declaration order, unknown variants last.
            builder.push("case ");
            for (ordinal, variant) in variants.iter().enumerate() {
                builder.push("when lower(");
                push_text_expr(builder, order.path());
                builder.push(") = ");
                builder.push_bind(variant.to_lowercase());
                builder.push(format!(" then {ordinal} "));
            }
            builder.push(format!("else {} end", variants.len()));
        }
        _ => {
            push_text_expr(builder, order.path());
        }
    }
}

use anyhow::Result;
use keysift::mem::MemRecords;
use keysift::{Compiler, Exclusions, Executor, FieldType, RecordShape, ShapeRegistry};
use serde_json::json;

fn registry() -> ShapeRegistry {
    ShapeRegistry::builder()
        .shape(
            RecordShape::new("order")
                .field("id", FieldType::Int64)
                .field("note", FieldType::Str)
                .field("amount", FieldType::Double)
                .field("open", FieldType::Bool)
                .field("created_on", FieldType::DateTime)
                .field("customer", FieldType::nested("customer")),
        )
        .shape(
            RecordShape::new("customer")
                .field("id", FieldType::Int64)
                .field("name", FieldType::Str),
        )
        .build()
        .expect("registry")
}

fn order_shape() -> RecordShape {
    registry().get("order").expect("order shape").clone()
}

fn records() -> MemRecords {
    MemRecords::with_docs(
        order_shape(),
        vec![
            json!({"id": 1, "note": "rush delivery", "amount": 10.0, "open": true,
                   "created_on": "2024-01-10T00:00:00Z",
                   "customer": {"id": 1, "name": "Alice Smith"}}),
            json!({"id": 2, "note": "standard", "amount": 55.0, "open": false,
                   "created_on": "2024-02-20T00:00:00Z",
                   "customer": {"id": 2, "name": "Bob"}}),
            json!({"id": 3, "note": "RUSH order", "amount": 20.0, "open": true,
                   "created_on": "2024-03-05T00:00:00Z",
                   "customer": null}),
            json!({"id": 4, "note": null, "amount": 5.0, "open": false,
                   "created_on": "2024-04-01T00:00:00Z",
                   "customer": {"id": 4, "name": "Cara Smithson"}}),
            json!({"id": 5, "note": "rush", "amount": 40.0, "open": true,
                   "created_on": "2024-05-15T00:00:00Z",
                   "customer": {"id": 5, "name": "Dan"}}),
        ],
    )
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn filters_sorts_and_pages_with_totals() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[
            ("filters[note]", "rush"),
            ("sort", "-amount"),
            ("page[number]", "1"),
            ("page[size]", "2"),
        ]),
        &Exclusions::default(),
    )?;

    let page = records().execute(&spec).await?;
    assert_eq!(page.total_count, 3);
    assert_eq!(page.total_pages(), 2);
    let amounts: Vec<f64> = page
        .items
        .iter()
        .map(|d| d["amount"].as_f64().unwrap())
        .collect();
    assert_eq!(amounts, [40.0, 20.0]);
    Ok(())
}

#[tokio::test]
async fn second_page_returns_the_remainder() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[
            ("filters[note]", "rush"),
            ("sort", "-amount"),
            ("page[number]", "2"),
            ("page[size]", "2"),
        ]),
        &Exclusions::default(),
    )?;

    let page = records().execute(&spec).await?;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0]["amount"], 10.0);
    Ok(())
}

#[tokio::test]
async fn paging_clamp_produces_a_one_row_first_page() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[("page[number]", "0"), ("page[size]", "-3")]),
        &Exclusions::default(),
    )?;

    let page = records().execute(&spec).await?;
    assert_eq!(page.page_number, 1);
    assert_eq!(page.page_size, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_count, 5);
    assert_eq!(page.total_pages(), 5);
    Ok(())
}

#[tokio::test]
async fn default_ordering_uses_the_identity_field_ascending() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile("order", &[], &Exclusions::default())?;
    let page = records().execute(&spec).await?;
    let ids: Vec<i64> = page
        .items
        .iter()
        .map(|d| d["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [1, 2, 3, 4, 5]);
    Ok(())
}

#[tokio::test]
async fn nested_filters_skip_absent_relations_via_the_guard() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[("filters[customer.name]", "smith")]),
        &Exclusions::default(),
    )?;

    // Order 3 has a null customer; the guard keeps it out without faulting.
    let page = records().execute(&spec).await?;
    let ids: Vec<i64> = page
        .items
        .iter()
        .map(|d| d["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [1, 4]);
    Ok(())
}

#[tokio::test]
async fn boolean_false_filter_applies() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[("filters[=open]", "false")]),
        &Exclusions::default(),
    )?;
    let page = records().execute(&spec).await?;
    let ids: Vec<i64> = page
        .items
        .iter()
        .map(|d| d["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [2, 4]);
    Ok(())
}

#[tokio::test]
async fn datetime_range_filters_compare_chronologically() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[
            ("filters[>=created_on]", "2024-02-01"),
            ("filters[<=created_on]", "2024-04-30"),
        ]),
        &Exclusions::default(),
    )?;
    let page = records().execute(&spec).await?;
    let ids: Vec<i64> = page
        .items
        .iter()
        .map(|d| d["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn not_in_excludes_listed_identities() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[("filters[-id]", "1,2,3")]),
        &Exclusions::default(),
    )?;
    let page = records().execute(&spec).await?;
    let ids: Vec<i64> = page
        .items
        .iter()
        .map(|d| d["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [4, 5]);
    Ok(())
}

#[tokio::test]
async fn keyword_search_reaches_nested_records() -> Result<()> {
    let compiler = Compiler::new(registry());
    let spec = compiler.compile(
        "order",
        &params(&[("filters[keywordsearch]", "smith")]),
        &Exclusions::default(),
    )?;
    let page = records().execute(&spec).await?;
    let ids: Vec<i64> = page
        .items
        .iter()
        .map(|d| d["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [1, 4]);
    Ok(())
}

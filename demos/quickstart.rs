//! Compile a query string into a spec and run it against in-memory records.
//!
//! ```sh
//! cargo run --example quickstart
//! ```

use keysift::mem::MemRecords;
use keysift::{Compiler, Exclusions, Executor, FieldType, RecordShape, ShapeRegistry};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let shapes = ShapeRegistry::builder()
        .shape(
            RecordShape::new("order")
                .field("id", FieldType::Int64)
                .field("note", FieldType::Str)
                .field("amount", FieldType::Double)
                .field("customer", FieldType::nested("customer")),
        )
        .shape(
            RecordShape::new("customer")
                .field("id", FieldType::Int64)
                .field("name", FieldType::Str),
        )
        .build()?;

    let compiler = Compiler::new(shapes.clone());
    let params: Vec<(String, String)> = [
        ("filters[customer.name]", "smith"),
        ("sort", "-amount"),
        ("page[number]", "1"),
        ("page[size]", "10"),
        ("includes", "customer"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    // Callers decide which paths are off limits.
    let exclusions = Exclusions::new(["customer.email"]);
    let spec = compiler.compile("order", &params, &exclusions)?;
    println!("filter: {:?}", spec.filter());
    println!(
        "includes: {:?}",
        spec.includes().iter().map(|p| p.dotted()).collect::<Vec<_>>()
    );

    let records = MemRecords::with_docs(
        shapes.get("order").expect("order shape").clone(),
        vec![
            json!({"id": 1, "note": "rush", "amount": 12.5,
                   "customer": {"id": 1, "name": "Alice Smith"}}),
            json!({"id": 2, "note": "standard", "amount": 80.0,
                   "customer": {"id": 2, "name": "Bob"}}),
            json!({"id": 3, "note": "gift wrap", "amount": 33.0,
                   "customer": {"id": 3, "name": "Smithers"}}),
        ],
    );

    let page = records.execute(&spec).await?;
    println!(
        "page {}/{} ({} total)",
        page.page_number,
        page.total_pages(),
        page.total_count
    );
    for item in &page.items {
        println!("  {} -> {}", item["id"], item["customer"]["name"]);
    }
    Ok(())
}

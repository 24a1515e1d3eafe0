use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keysift::{Compiler, Exclusions, FieldType, RecordShape, ShapeRegistry};

fn build_compiler() -> Compiler {
    let shapes = ShapeRegistry::builder()
        .shape(
            RecordShape::new("order")
                .field("id", FieldType::Int64)
                .field("note", FieldType::Str)
                .field("reference", FieldType::Str)
                .field("amount", FieldType::Double)
                .field("open", FieldType::Bool)
                .field("created_on", FieldType::DateTime)
                .field("customer", FieldType::nested("customer")),
        )
        .shape(
            RecordShape::new("customer")
                .field("id", FieldType::Int64)
                .field("name", FieldType::Str)
                .field("email", FieldType::Str),
        )
        .build()
        .expect("registry");
    Compiler::new(shapes)
}

fn bench_compile(c: &mut Criterion) {
    let compiler = build_compiler();
    let exclusions = Exclusions::default();
    let params: Vec<(String, String)> = [
        ("page[number]", "2"),
        ("page[size]", "25"),
        ("filters[note+reference]", "rush"),
        ("filters[customer.name]", "smith"),
        ("filters[>=created_on]", "2024-03-01"),
        ("filters[-id]", "4,5,6"),
        ("sort", "-created_on"),
        ("includes", "customer"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let mut group = c.benchmark_group("compile");
    group.throughput(Throughput::Elements(1));
    group.bench_function(BenchmarkId::new("mixed_keys", params.len()), |b| {
        b.iter(|| {
            compiler
                .compile("order", &params, &exclusions)
                .expect("compile")
        })
    });

    let keyword: Vec<(String, String)> =
        vec![("filters[keywordsearch]".to_string(), "smith".to_string())];
    group.bench_function(BenchmarkId::new("keyword_search", 1), |b| {
        b.iter(|| {
            compiler
                .compile("order", &keyword, &exclusions)
                .expect("compile")
        })
    });
    group.finish();
}

criterion_group!(benches, bench_compile);
criterion_main!(benches);

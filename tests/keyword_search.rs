use anyhow::Result;
use keysift::{Compiler, Exclusions, FieldType, Predicate, RecordShape, ShapeRegistry};

fn registry() -> ShapeRegistry {
    ShapeRegistry::builder()
        .shape(
            RecordShape::new("order")
                .field("id", FieldType::Int64)
                .field("note", FieldType::Str)
                .field("reference", FieldType::Str)
                .field("customer", FieldType::nested("customer")),
        )
        .shape(
            RecordShape::new("customer")
                .field("id", FieldType::Int64)
                .field("name", FieldType::Str)
                .field("email", FieldType::Str)
                .field("billing", FieldType::nested("address")),
        )
        .shape(
            RecordShape::new("address")
                .field("id", FieldType::Int64)
                .field("city", FieldType::Str),
        )
        .build()
        .expect("registry")
}

fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn leaf_paths(predicate: &Predicate, out: &mut Vec<String>) {
    match predicate {
        Predicate::Contains { path, .. } => out.push(path.dotted()),
        Predicate::And(l, r) | Predicate::Or(l, r) => {
            leaf_paths(l, out);
            leaf_paths(r, out);
        }
        _ => {}
    }
}

#[test]
fn expands_across_root_and_one_level_of_nested_strings() -> Result<()> {
    let spec = Compiler::new(registry()).compile(
        "order",
        &params(&[("filters[keywordsearch]", "Smith")]),
        &Exclusions::default(),
    )?;

    let mut paths = Vec::new();
    leaf_paths(spec.filter(), &mut paths);
    assert_eq!(
        paths,
        ["note", "reference", "customer.name", "customer.email"]
    );

    // The traversed relation is registered for eager loading; the nested
    // record's own relations are not descended into.
    let includes: Vec<String> = spec.includes().iter().map(|p| p.dotted()).collect();
    assert_eq!(includes, ["customer"]);
    assert!(!paths.iter().any(|p| p.contains("billing")));
    Ok(())
}

#[test]
fn nested_leaves_carry_both_guards() -> Result<()> {
    let spec = Compiler::new(registry()).compile(
        "order",
        &params(&[("filters[keywordsearch]", "x")]),
        &Exclusions::new(["note", "reference", "customer.email"]),
    )?;

    // Only customer.name survives, so the whole filter is its guarded leaf.
    let Predicate::And(parent_guard, rest) = spec.filter() else {
        panic!("expected parent guard, got {:?}", spec.filter());
    };
    assert!(matches!(parent_guard.as_ref(), Predicate::NotNull(p) if p.dotted() == "customer"));
    let Predicate::And(own_guard, contains) = rest.as_ref() else {
        panic!("expected leaf guard");
    };
    assert!(matches!(own_guard.as_ref(), Predicate::NotNull(p) if p.dotted() == "customer.name"));
    assert!(
        matches!(contains.as_ref(), Predicate::Contains { path, needle } if path.dotted() == "customer.name" && needle == "x")
    );
    Ok(())
}

#[test]
fn excluded_fields_and_relations_are_skipped() -> Result<()> {
    let compiler = Compiler::new(registry());

    let spec = compiler.compile(
        "order",
        &params(&[("filters[keywordsearch]", "x")]),
        &Exclusions::new(["customer"]),
    )?;
    let mut paths = Vec::new();
    leaf_paths(spec.filter(), &mut paths);
    assert_eq!(paths, ["note", "reference"]);
    assert!(spec.includes().is_empty());

    let spec = compiler.compile(
        "order",
        &params(&[("filters[keywordsearch]", "x")]),
        &Exclusions::new(["customer.email"]),
    )?;
    let mut paths = Vec::new();
    leaf_paths(spec.filter(), &mut paths);
    assert_eq!(paths, ["note", "reference", "customer.name"]);
    Ok(())
}

#[test]
fn keyword_needle_is_lowercased() -> Result<()> {
    let spec = Compiler::new(registry()).compile(
        "order",
        &params(&[("filters[keywordsearch]", "SMITH")]),
        &Exclusions::default(),
    )?;
    let mut needles = Vec::new();
    collect_needles(spec.filter(), &mut needles);
    assert!(!needles.is_empty());
    assert!(needles.iter().all(|n| n == "smith"));
    Ok(())
}

fn collect_needles(predicate: &Predicate, out: &mut Vec<String>) {
    match predicate {
        Predicate::Contains { needle, .. } => out.push(needle.clone()),
        Predicate::And(l, r) | Predicate::Or(l, r) => {
            collect_needles(l, out);
            collect_needles(r, out);
        }
        _ => {}
    }
}

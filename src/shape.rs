use std::collections::HashMap;

use serde_json::{Map as JsonMap, Value};

use crate::{Error, Result};

/// Closed type tag attached to every registered field. All coercion and
/// comparison dispatch switches on this tag.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Str,
    Int64,
    Int32,
    Bool,
    DateTime,
    Double,
    Enum(Vec<String>),
    Nested(String),
    Optional(Box<FieldType>),
}

impl FieldType {
    pub fn nested(shape: impl Into<String>) -> Self {
        Self::Nested(shape.into())
    }

    pub fn optional(inner: FieldType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(variants.into_iter().map(Into::into).collect())
    }

    /// The tag with any `Optional` wrapper stripped.
    pub fn unwrapped(&self) -> &FieldType {
        match self {
            Self::Optional(inner) => inner.unwrapped(),
            other => other,
        }
    }

    pub fn is_nested(&self) -> bool {
        matches!(self.unwrapped(), Self::Nested(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.unwrapped(), Self::Str)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.unwrapped(), Self::Int64 | Self::Int32)
    }

    fn default_value(&self) -> Value {
        match self {
            Self::Int64 | Self::Int32 => Value::from(0),
            Self::Double => Value::from(0.0),
            Self::Bool => Value::from(false),
            _ => Value::Null,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    name: String,
    ty: FieldType,
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }
}

/// A registered record shape: named fields with type tags plus the identity
/// field used for default ordering and not-in filters.
#[derive(Clone, Debug)]
pub struct RecordShape {
    name: String,
    identity: String,
    fields: Vec<FieldDef>,
}

impl RecordShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: "id".to_string(),
            fields: Vec::new(),
        }
    }

    pub fn identity_field(mut self, name: impl Into<String>) -> Self {
        self.identity = name.into();
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Case-insensitive field lookup.
    pub fn lookup(&self, name: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn string_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.ty.is_string())
    }

    /// Nested-record fields paired with the target shape name.
    pub fn nested_fields(&self) -> impl Iterator<Item = (&FieldDef, &str)> {
        self.fields.iter().filter_map(|f| match f.ty.unwrapped() {
            FieldType::Nested(shape) => Some((f, shape.as_str())),
            _ => None,
        })
    }

    /// Default record used as the echo value of a compilation: numeric fields
    /// zero, booleans false, everything else null.
    pub fn empty_record(&self) -> Value {
        let mut map = JsonMap::new();
        for field in &self.fields {
            map.insert(field.name.clone(), field.ty.default_value());
        }
        Value::Object(map)
    }
}

/// Immutable set of record shapes, resolved by name case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct ShapeRegistry {
    shapes: HashMap<String, RecordShape>,
}

impl ShapeRegistry {
    pub fn builder() -> ShapeRegistryBuilder {
        ShapeRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&RecordShape> {
        self.shapes.get(&name.to_ascii_lowercase())
    }
}

#[derive(Default)]
pub struct ShapeRegistryBuilder {
    shapes: Vec<RecordShape>,
}

impl ShapeRegistryBuilder {
    pub fn shape(mut self, shape: RecordShape) -> Self {
        self.shapes.push(shape);
        self
    }

    /// Finalizes the registry, verifying that every `Nested` target names a
    /// registered shape.
    pub fn build(self) -> Result<ShapeRegistry> {
        let mut shapes = HashMap::with_capacity(self.shapes.len());
        for shape in &self.shapes {
            shapes.insert(shape.name.to_ascii_lowercase(), shape.clone());
        }
        for shape in &self.shapes {
            for (_, target) in shape.nested_fields() {
                if !shapes.contains_key(&target.to_ascii_lowercase()) {
                    return Err(Error::UnknownShape(target.to_string()));
                }
            }
        }
        Ok(ShapeRegistry { shapes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let shape = RecordShape::new("order").field("CreatedOn", FieldType::DateTime);
        assert!(shape.lookup("createdon").is_some());
        assert!(shape.lookup("missing").is_none());
    }

    #[test]
    fn build_rejects_dangling_nested_shape() {
        let result = ShapeRegistry::builder()
            .shape(RecordShape::new("order").field("customer", FieldType::nested("customer")))
            .build();
        assert!(matches!(result, Err(Error::UnknownShape(name)) if name == "customer"));
    }

    #[test]
    fn empty_record_zeroes_value_types() {
        let shape = RecordShape::new("order")
            .field("id", FieldType::Int64)
            .field("name", FieldType::Str)
            .field("open", FieldType::Bool);
        let record = shape.empty_record();
        assert_eq!(record["id"], 0);
        assert_eq!(record["name"], Value::Null);
        assert_eq!(record["open"], false);
    }
}

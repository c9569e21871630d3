use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::schema::{Catalog, ElementType, FieldDecl, FieldType, RandGenerator};
use crate::types::{HostType, ScalarKind};
use crate::value::{RecordInstance, Value};

/// Validate internal consistency of a catalog.
///
/// This checks:
/// - enums are non-empty with members unique by name and by value
/// - parents exist, inheritance is acyclic and no record declares a field twice
/// - field types reference known enums/records
/// - array lookups, pack directives and randomization targets are usable
/// - declared defaults match their field types
pub fn validate_catalog(catalog: &Catalog) -> Result<()> {
    for definition in catalog.enums() {
        if definition.members.is_empty() {
            return Err(Error::Schema(format!("enum has no members: {}", definition.name)));
        }
        let mut names = BTreeSet::new();
        let mut values = BTreeSet::new();
        for (name, value) in &definition.members {
            if !names.insert(name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate enum member: {}.{}",
                    definition.name, name
                )));
            }
            if !values.insert(*value) {
                return Err(Error::Schema(format!(
                    "duplicate enum value {} in {}",
                    value, definition.name
                )));
            }
        }
    }

    for record in catalog.records() {
        if record.pack == Some(0) {
            return Err(Error::Schema(format!(
                "pack directive must be positive: {}",
                record.name
            )));
        }

        let mut seen = BTreeSet::new();
        for field in &record.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Schema(format!(
                    "field declared twice: {}.{}",
                    record.name, field.name
                )));
            }
        }

        let fields = catalog.fields(&record.name)?;
        for field in &fields {
            check_field_type(catalog, &record.name, field)?;
            coerce_value(catalog, &record.name, field, field.default.clone())?;
        }

        for rand_field in &record.randomize {
            let target = fields
                .iter()
                .find(|field| field.name == rand_field.target)
                .ok_or_else(|| {
                    Error::Schema(format!(
                        "randomized field not found: {}.{}",
                        record.name, rand_field.target
                    ))
                })?;
            check_generator(&record.name, target, &rand_field.generator)?;
            if let RandGenerator::Choice(values) = &rand_field.generator {
                for value in values {
                    coerce_value(catalog, &record.name, target, value.clone())?;
                }
            }
        }
    }

    Ok(())
}

fn check_field_type(catalog: &Catalog, record: &str, field: &FieldDecl) -> Result<()> {
    let known = match &field.ty {
        FieldType::Scalar(_) => true,
        FieldType::Enum(name) | FieldType::Array(ElementType::Enum(name)) => {
            catalog.enum_def(name).is_some()
        }
        FieldType::Record(name) => catalog.record(name).is_some(),
        FieldType::Array(ElementType::Scalar(_)) => true,
    };
    if known {
        Ok(())
    } else {
        Err(Error::Schema(format!(
            "unknown type '{}' for field {}.{}",
            field.ty, record, field.name
        )))
    }
}

fn check_generator(record: &str, target: &FieldDecl, generator: &RandGenerator) -> Result<()> {
    let fits = match (generator, &target.ty) {
        (RandGenerator::IntRange { min, max }, FieldType::Scalar(kind)) => {
            min <= max && kind.host_type() == HostType::Int
        }
        (RandGenerator::FloatRange { min, max }, FieldType::Scalar(kind)) => {
            min <= max
                && min.is_finite()
                && max.is_finite()
                && (max - min).is_finite()
                && kind.host_type() == HostType::Float
        }
        (RandGenerator::Bool, FieldType::Scalar(ScalarKind::Bool)) => true,
        (RandGenerator::Choice(values), _) => !values.is_empty(),
        (RandGenerator::EnumMember, FieldType::Enum(_)) => true,
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(Error::Schema(format!(
            "generator {:?} cannot drive field {}.{} of type {}",
            generator, record, target.name, target.ty
        )))
    }
}

/// Validate a reconstructed instance against its record schema.
///
/// Returns the instance with enum member names coerced to members. Any other
/// value must already have the field's host type. Fields missing from the
/// instance are filled with null.
pub fn validate_instance(catalog: &Catalog, instance: RecordInstance) -> Result<RecordInstance> {
    let record = instance.type_name().to_string();
    let fields = catalog.fields(&record)?;

    for (name, _) in instance.fields() {
        if !fields.iter().any(|field| field.name == name) {
            return Err(Error::Validation(format!(
                "{record}: unexpected field '{name}'"
            )));
        }
    }

    let mut instance = instance;
    let mut validated = RecordInstance::new(record.clone());
    for field in fields {
        let value = instance.remove(&field.name).unwrap_or(Value::Null);
        let value = coerce_value(catalog, &record, field, value)?;
        validated.set(field.name.clone(), value);
    }
    Ok(validated)
}

/// Coerce a single value to a field's declared type.
pub fn coerce_value(
    catalog: &Catalog,
    record: &str,
    field: &FieldDecl,
    value: Value,
) -> Result<Value> {
    let ctx = FieldCtx { record, field };
    match &field.ty {
        FieldType::Scalar(kind) => coerce_scalar(&ctx, *kind, value),
        FieldType::Enum(name) => coerce_enum(catalog, &ctx, name, value),
        FieldType::Record(name) => coerce_record(catalog, &ctx, name, value),
        FieldType::Array(element) => match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match element {
                    ElementType::Scalar(kind) => coerce_scalar(&ctx, *kind, item),
                    ElementType::Enum(name) => coerce_enum(catalog, &ctx, name, item),
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Err(ctx.mismatch("list", &other)),
        },
    }
}

struct FieldCtx<'a> {
    record: &'a str,
    field: &'a FieldDecl,
}

impl FieldCtx<'_> {
    fn mismatch(&self, expected: impl std::fmt::Display, value: &Value) -> Error {
        Error::Validation(format!(
            "{}: expected {} to be {}, got {}",
            self.record,
            self.field.name,
            expected,
            value.type_name()
        ))
    }
}

fn coerce_scalar(ctx: &FieldCtx<'_>, kind: ScalarKind, value: Value) -> Result<Value> {
    let expected = format!("{} ({})", kind.host_type(), kind.native_name());
    match (kind.host_type(), value) {
        (_, Value::Null) => Ok(Value::Null),
        (HostType::Bool, Value::Bool(flag)) => Ok(Value::Bool(flag)),
        (HostType::Int, Value::Int(number)) => {
            if let Some((min, max)) = kind.int_bounds()
                && (number < min || number > max)
            {
                return Err(Error::Validation(format!(
                    "{}: {} value {} out of range for {}",
                    ctx.record,
                    ctx.field.name,
                    number,
                    kind.native_name()
                )));
            }
            Ok(Value::Int(number))
        }
        (HostType::Float, Value::Float(number)) => Ok(Value::Float(number)),
        (HostType::Str, Value::Str(text)) => Ok(Value::Str(text)),
        (_, other) => Err(ctx.mismatch(expected, &other)),
    }
}

fn coerce_enum(catalog: &Catalog, ctx: &FieldCtx<'_>, name: &str, value: Value) -> Result<Value> {
    let definition = catalog.enum_def(name).ok_or_else(|| {
        Error::Schema(format!(
            "unknown enum '{}' for field {}.{}",
            name, ctx.record, ctx.field.name
        ))
    })?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Str(member) => definition.by_name(&member).map(Value::Enum).ok_or_else(|| {
            Error::Validation(format!(
                "{}: '{}' is not a member of {} (field {})",
                ctx.record, member, name, ctx.field.name
            ))
        }),
        Value::Enum(member) if member.enum_name == name => {
            if definition.by_name(&member.name).as_ref() == Some(&member) {
                Ok(Value::Enum(member))
            } else {
                Err(Error::Validation(format!(
                    "{}: stale member {}.{} (field {})",
                    ctx.record, name, member.name, ctx.field.name
                )))
            }
        }
        other => Err(ctx.mismatch(name, &other)),
    }
}

fn coerce_record(catalog: &Catalog, ctx: &FieldCtx<'_>, name: &str, value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Record(inner) if catalog.is_subtype(inner.type_name(), name) => {
            validate_instance(catalog, inner).map(Value::Record)
        }
        other => Err(ctx.mismatch(name, &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArraySizes, Direction, EnumDefinition, RecordSchema};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .add_enum(EnumDefinition::new("Color").member("RED", 0).member("GREEN", 1))
            .unwrap();
        catalog
            .add_record(
                RecordSchema::new("Pixel")
                    .field(
                        FieldDecl::new("count", FieldType::Scalar(ScalarKind::UInt32))
                            .default_value(0u32),
                    )
                    .field(FieldDecl::new("label", FieldType::Enum("Color".to_string())))
                    .field(FieldDecl::new("gain", FieldType::Scalar(ScalarKind::Float)))
                    .field(FieldDecl::new(
                        "palette",
                        FieldType::Array(ElementType::Enum("Color".to_string())),
                    ))
                    .field(
                        FieldDecl::new("name", FieldType::Scalar(ScalarKind::CStr))
                            .direction(Direction::In),
                    ),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn coerces_enum_strings_and_arrays() {
        let catalog = catalog();
        let instance = RecordInstance::new("Pixel")
            .with("count", 5u32)
            .with("label", "RED")
            .with("palette", vec![Value::from("GREEN"), Value::from("RED")]);
        let validated = validate_instance(&catalog, instance).expect("valid instance");

        let color = catalog.enum_def("Color").unwrap();
        assert_eq!(validated.get("label"), Some(&Value::Enum(color.by_name("RED").unwrap())));
        assert_eq!(
            validated.get("palette"),
            Some(&Value::Array(vec![
                Value::Enum(color.by_name("GREEN").unwrap()),
                Value::Enum(color.by_name("RED").unwrap()),
            ]))
        );
        assert_eq!(validated.get("gain"), Some(&Value::Null));
    }

    #[test]
    fn rejects_unknown_enum_member() {
        let catalog = catalog();
        let instance = RecordInstance::new("Pixel").with("label", "PURPLE");
        assert!(matches!(
            validate_instance(&catalog, instance),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_host_type_mismatch_and_out_of_range() {
        let catalog = catalog();
        let wrong = RecordInstance::new("Pixel").with("count", "five");
        assert!(matches!(
            validate_instance(&catalog, wrong),
            Err(Error::Validation(_))
        ));
        let overflow = RecordInstance::new("Pixel").with("count", -1);
        assert!(matches!(
            validate_instance(&catalog, overflow),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn integers_are_not_floats_or_enum_members() {
        let catalog = catalog();
        for instance in [
            RecordInstance::new("Pixel").with("gain", 2),
            RecordInstance::new("Pixel").with("label", 1),
            RecordInstance::new("Pixel").with("palette", vec![Value::from(0)]),
        ] {
            assert!(matches!(
                validate_instance(&catalog, instance),
                Err(Error::Validation(_))
            ));
        }

        let instance = RecordInstance::new("Pixel").with("gain", 2.0);
        let validated = validate_instance(&catalog, instance).unwrap();
        assert_eq!(validated.get("gain"), Some(&Value::Float(2.0)));
    }

    #[test]
    fn float_range_must_have_a_finite_span() {
        for (min, max) in [(-1.7e308, 1.7e308), (0.0, f64::INFINITY), (f64::NAN, 1.0)] {
            let mut catalog = Catalog::new();
            catalog
                .add_record(
                    RecordSchema::new("Wide")
                        .field(FieldDecl::new("gain", FieldType::Scalar(ScalarKind::Float)))
                        .randomize("gain", RandGenerator::FloatRange { min, max }),
                )
                .unwrap();
            assert!(matches!(validate_catalog(&catalog), Err(Error::Schema(_))));
        }

        let mut catalog = Catalog::new();
        catalog
            .add_record(
                RecordSchema::new("Narrow")
                    .field(FieldDecl::new("gain", FieldType::Scalar(ScalarKind::Float)))
                    .randomize("gain", RandGenerator::FloatRange { min: -1.0, max: 1.0 }),
            )
            .unwrap();
        assert!(validate_catalog(&catalog).is_ok());
    }

    #[test]
    fn redeclared_field_replaces_inherited_one() {
        let mut catalog = catalog();
        catalog
            .add_record(
                RecordSchema::new("Tile").extends("Pixel").field(
                    FieldDecl::new("count", FieldType::Scalar(ScalarKind::UInt8))
                        .default_value(3u8),
                ),
            )
            .unwrap();
        validate_catalog(&catalog).expect("redeclaration is allowed");

        let validated = validate_instance(&catalog, RecordInstance::new("Tile")).unwrap();
        let names: Vec<&str> = validated.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["count", "label", "gain", "palette", "name"]);

        let overflow = RecordInstance::new("Tile").with("count", 300u32);
        assert!(matches!(
            validate_instance(&catalog, overflow),
            Err(Error::Validation(_))
        ));

        catalog
            .add_record(
                RecordSchema::new("Twice")
                    .field(FieldDecl::new("x", FieldType::Scalar(ScalarKind::Int32)))
                    .field(FieldDecl::new("x", FieldType::Scalar(ScalarKind::Int32))),
            )
            .unwrap();
        assert!(matches!(validate_catalog(&catalog), Err(Error::Schema(_))));
    }

    #[test]
    fn catalog_rejects_bad_generator_and_unknown_type() {
        let mut catalog = catalog();
        catalog
            .add_record(
                RecordSchema::new("Broken")
                    .field(FieldDecl::new("flag", FieldType::Scalar(ScalarKind::Bool)))
                    .randomize("flag", RandGenerator::IntRange { min: 0, max: 3 }),
            )
            .unwrap();
        assert!(matches!(validate_catalog(&catalog), Err(Error::Schema(_))));

        let mut catalog = Catalog::new();
        catalog
            .add_record(
                RecordSchema::new("Dangling")
                    .field(FieldDecl::new("inner", FieldType::Record("Missing".to_string())))
                    .array_sizes(ArraySizes::new()),
            )
            .unwrap();
        assert!(matches!(validate_catalog(&catalog), Err(Error::Schema(_))));
    }
}

use std::collections::HashMap;

use rand::distr::Uniform;
use rand::distr::uniform::SampleUniform;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use datagen_core::{
    Catalog, FieldDecl, FieldType, RandGenerator, RecordInstance, Value, coerce_value,
};

use crate::errors::{GenerationError, Result};

/// Fills unset randomizable fields and checks set ones against their generator.
///
/// Every record instance gets its own stream, seeded from the run seed and
/// the key `<Type>#<n>`, where `n` counts instances of that type in visit
/// order. Two runs with the same seed over the same document agree.
#[derive(Debug, Clone)]
pub struct Randomizer {
    seed: u64,
    counters: HashMap<String, u64>,
}

impl Randomizer {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counters: HashMap::new(),
        }
    }

    /// Seed from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(rand::rng().random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Randomize `instance` and every nested record it holds.
    pub fn apply(&mut self, catalog: &Catalog, instance: &mut RecordInstance) -> Result<()> {
        let record = instance.type_name().to_string();
        let index = self.counters.entry(record.clone()).or_insert(0);
        let key = format!("{record}#{index}");
        *index += 1;
        let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(self.seed, &key));

        for level in catalog.lineage(&record)? {
            for rand_field in &level.randomize {
                let field = catalog.field(&record, &rand_field.target)?.ok_or_else(|| {
                    GenerationError::Randomize(format!(
                        "{record}: randomized field '{}' not declared",
                        rand_field.target
                    ))
                })?;
                let current = instance.get(&field.name).cloned().unwrap_or(Value::Null);
                if current.is_null() {
                    let generator = &rand_field.generator;
                    let generated = generate(catalog, &record, field, generator, &mut rng)?;
                    let value = coerce_value(catalog, &record, field, generated)?;
                    debug!(record = %record, field = %field.name, key = %key, "field randomized");
                    instance.set(field.name.clone(), value);
                } else {
                    tie(catalog, &record, field, &rand_field.generator, &current)?;
                }
            }
        }

        for (_, value) in instance.fields_mut() {
            if let Value::Record(nested) = value {
                self.apply(catalog, nested)?;
            }
        }
        Ok(())
    }
}

fn generate(
    catalog: &Catalog,
    record: &str,
    field: &FieldDecl,
    generator: &RandGenerator,
    rng: &mut ChaCha8Rng,
) -> Result<Value> {
    let value = match generator {
        RandGenerator::IntRange { min, max } => {
            Value::Int(sample_range(record, field, *min, *max, rng)?)
        }
        RandGenerator::FloatRange { min, max } => {
            Value::Float(sample_range(record, field, *min, *max, rng)?)
        }
        RandGenerator::Bool => Value::Bool(rng.random_bool(0.5)),
        RandGenerator::Choice(values) => {
            if values.is_empty() {
                return Err(GenerationError::Randomize(format!(
                    "{record}.{}: choice has no values",
                    field.name
                )));
            }
            values[rng.random_range(0..values.len())].clone()
        }
        RandGenerator::EnumMember => {
            let members = enum_members(catalog, record, field)?;
            Value::Enum(members[rng.random_range(0..members.len())].clone())
        }
    };
    Ok(value)
}

fn sample_range<T: SampleUniform>(
    record: &str,
    field: &FieldDecl,
    min: T,
    max: T,
    rng: &mut ChaCha8Rng,
) -> Result<T> {
    let range = Uniform::new_inclusive(min, max).map_err(|err| {
        GenerationError::Randomize(format!("{record}.{}: unusable range: {err}", field.name))
    })?;
    Ok(rng.sample(range))
}

fn tie(
    catalog: &Catalog,
    record: &str,
    field: &FieldDecl,
    generator: &RandGenerator,
    current: &Value,
) -> Result<()> {
    let satisfied = match generator {
        RandGenerator::IntRange { min, max } => {
            matches!(current, Value::Int(number) if number >= min && number <= max)
        }
        RandGenerator::FloatRange { min, max } => {
            matches!(current, Value::Float(number) if number >= min && number <= max)
        }
        RandGenerator::Bool => matches!(current, Value::Bool(_)),
        RandGenerator::Choice(values) => {
            let mut satisfied = false;
            for choice in values {
                if coerce_value(catalog, record, field, choice.clone())? == *current {
                    satisfied = true;
                    break;
                }
            }
            satisfied
        }
        RandGenerator::EnumMember => {
            let members = enum_members(catalog, record, field)?;
            matches!(current, Value::Enum(member) if members.contains(member))
        }
    };
    if satisfied {
        Ok(())
    } else {
        Err(GenerationError::Randomize(format!(
            "{record}.{}: value {current:?} does not satisfy {generator:?}",
            field.name
        )))
    }
}

fn enum_members(
    catalog: &Catalog,
    record: &str,
    field: &FieldDecl,
) -> Result<Vec<datagen_core::EnumMember>> {
    let FieldType::Enum(name) = &field.ty else {
        return Err(GenerationError::Randomize(format!(
            "{record}.{}: enum generator needs an enum field, found {}",
            field.name, field.ty
        )));
    };
    let members = catalog
        .enum_def(name)
        .map(|definition| definition.all())
        .unwrap_or_default();
    if members.is_empty() {
        return Err(GenerationError::Randomize(format!(
            "{record}.{}: enum {name} has no members",
            field.name
        )));
    }
    Ok(members)
}

/// Hash an arbitrary seed string into a `u64` run seed.
pub fn seed_from_str(seed: &str) -> u64 {
    seed.parse::<u64>().unwrap_or_else(|_| hash_seed(0, seed))
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use datagen_core::{EnumDefinition, RecordSchema, ScalarKind};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .add_enum(
                EnumDefinition::new("Color")
                    .member("RED", 0)
                    .member("GREEN", 1)
                    .member("BLUE", 2),
            )
            .unwrap();
        catalog
            .add_record(
                RecordSchema::new("Inner")
                    .field(FieldDecl::new("gain", FieldType::Scalar(ScalarKind::Float)))
                    .randomize("gain", RandGenerator::FloatRange { min: 0.5, max: 1.5 }),
            )
            .unwrap();
        catalog
            .add_record(
                RecordSchema::new("Frame")
                    .field(FieldDecl::new("count", FieldType::Scalar(ScalarKind::UInt16)))
                    .field(FieldDecl::new("tint", FieldType::Enum("Color".to_string())))
                    .field(FieldDecl::new("enabled", FieldType::Scalar(ScalarKind::Bool)))
                    .field(FieldDecl::new("mode", FieldType::Scalar(ScalarKind::CStr)))
                    .field(FieldDecl::new("inner", FieldType::Record("Inner".to_string())))
                    .randomize("count", RandGenerator::IntRange { min: 10, max: 20 })
                    .randomize("tint", RandGenerator::EnumMember)
                    .randomize("enabled", RandGenerator::Bool)
                    .randomize(
                        "mode",
                        RandGenerator::Choice(vec![Value::from("fast"), Value::from("slow")]),
                    ),
            )
            .unwrap();
        catalog
    }

    fn frame() -> RecordInstance {
        RecordInstance::new("Frame")
            .with("count", Value::Null)
            .with("tint", Value::Null)
            .with("enabled", Value::Null)
            .with("mode", Value::Null)
            .with("inner", RecordInstance::new("Inner").with("gain", Value::Null))
    }

    #[test]
    fn fills_null_targets_within_constraints() {
        let catalog = catalog();
        let mut instance = frame();
        Randomizer::new(7).apply(&catalog, &mut instance).unwrap();

        let count = instance.get("count").and_then(Value::as_i128).unwrap();
        assert!((10..=20).contains(&count));
        assert!(matches!(
            instance.get("tint"),
            Some(Value::Enum(member)) if member.enum_name == "Color"
        ));
        assert!(matches!(instance.get("enabled"), Some(Value::Bool(_))));
        assert!(matches!(
            instance.get("mode"),
            Some(Value::Str(mode)) if mode == "fast" || mode == "slow"
        ));

        let Some(Value::Record(inner)) = instance.get("inner") else {
            panic!("inner record missing");
        };
        let gain = inner.get("gain").and_then(Value::as_f64).unwrap();
        assert!((0.5..=1.5).contains(&gain));
    }

    #[test]
    fn same_seed_is_deterministic() {
        let catalog = catalog();
        let mut first = frame();
        let mut second = frame();
        Randomizer::new(42).apply(&catalog, &mut first).unwrap();
        Randomizer::new(42).apply(&catalog, &mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn instances_of_one_type_get_distinct_streams() {
        let catalog = catalog();
        let mut randomizer = Randomizer::new(1);
        let draws: Vec<Value> = (0..16)
            .map(|_| {
                let mut instance = frame();
                randomizer.apply(&catalog, &mut instance).unwrap();
                instance.get("count").cloned().unwrap()
            })
            .collect();
        assert!(draws.iter().any(|draw| *draw != draws[0]));
    }

    #[test]
    fn set_values_are_tied_to_the_generator() {
        let catalog = catalog();
        let mut instance = frame().with("count", 15u16).with("mode", "slow");
        Randomizer::new(3).apply(&catalog, &mut instance).unwrap();
        assert_eq!(instance.get("count"), Some(&Value::Int(15)));
        assert_eq!(instance.get("mode"), Some(&Value::from("slow")));

        let mut instance = frame().with("count", 99u16);
        let err = Randomizer::new(3).apply(&catalog, &mut instance).unwrap_err();
        assert!(matches!(err, GenerationError::Randomize(_)));

        let mut instance = frame().with("mode", "turbo");
        let err = Randomizer::new(3).apply(&catalog, &mut instance).unwrap_err();
        assert!(matches!(err, GenerationError::Randomize(_)));
    }

    #[test]
    fn unusable_float_range_is_an_error() {
        let mut catalog = Catalog::new();
        catalog
            .add_record(
                RecordSchema::new("Wide")
                    .field(FieldDecl::new("gain", FieldType::Scalar(ScalarKind::Float)))
                    .randomize(
                        "gain",
                        RandGenerator::FloatRange {
                            min: -1.7e308,
                            max: 1.7e308,
                        },
                    ),
            )
            .unwrap();
        let mut instance = RecordInstance::new("Wide").with("gain", Value::Null);
        let err = Randomizer::new(1).apply(&catalog, &mut instance).unwrap_err();
        assert!(matches!(err, GenerationError::Randomize(_)));
    }

    #[test]
    fn integer_does_not_satisfy_float_range() {
        let catalog = catalog();
        let mut instance = frame().with("inner", RecordInstance::new("Inner").with("gain", 1));
        let err = Randomizer::new(5).apply(&catalog, &mut instance).unwrap_err();
        assert!(matches!(err, GenerationError::Randomize(_)));
    }

    #[test]
    fn numeric_seed_strings_parse_directly() {
        assert_eq!(seed_from_str("1234"), 1234);
        assert_eq!(seed_from_str("nightly"), seed_from_str("nightly"));
        assert_ne!(seed_from_str("nightly"), seed_from_str("weekly"));
    }
}

use serde_yaml::{Mapping, Number, Value as Yaml};

use datagen_core::{
    Catalog, FieldDecl, FieldType, RecordInstance, TYPE_TAG_KEY, Value, validate_instance,
};

use crate::errors::{ConfigError, Result};

/// Whether dumped records carry the `DatagenClass` tag key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagPolicy {
    /// Write untagged mappings, the format downstream scripts expect.
    #[default]
    Strip,
    /// Write the tag first so the output can be loaded again as-is.
    Preserve,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SerializeOptions {
    pub tag: TagPolicy,
}

/// Project a record instance onto a YAML mapping.
///
/// Null values, private names, fields not dumped by their direction and
/// empty arrays are left out. Enums are written by member name.
pub fn serialize(
    catalog: &Catalog,
    instance: &RecordInstance,
    options: &SerializeOptions,
) -> Result<Mapping> {
    let record = instance.type_name();
    let fields = catalog.fields(record)?;
    let mut mapping = Mapping::new();
    if options.tag == TagPolicy::Preserve {
        mapping.insert(Yaml::from(TYPE_TAG_KEY), Yaml::from(record));
    }

    for (name, value) in instance.fields() {
        let field = fields
            .iter()
            .find(|field| field.name == name)
            .ok_or_else(|| {
                ConfigError::InvalidNode(format!("{record}: field '{name}' is not declared"))
            })?;
        if !field.is_dumped() || value.is_null() {
            continue;
        }
        if matches!(value, Value::Array(items) if items.is_empty()) {
            continue;
        }
        mapping.insert(Yaml::from(name), to_yaml(catalog, value, options)?);
    }
    Ok(mapping)
}

fn to_yaml(catalog: &Catalog, value: &Value, options: &SerializeOptions) -> Result<Yaml> {
    let yaml = match value {
        Value::Null => Yaml::Null,
        Value::Bool(flag) => Yaml::Bool(*flag),
        Value::Int(number) => Yaml::Number(int_number(*number)?),
        Value::Float(number) => Yaml::Number(Number::from(*number)),
        Value::Str(text) => Yaml::String(text.clone()),
        Value::Enum(member) => Yaml::String(member.name.clone()),
        Value::Array(items) => Yaml::Sequence(
            items
                .iter()
                .map(|item| to_yaml(catalog, item, options))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Record(inner) => Yaml::Mapping(serialize(catalog, inner, options)?),
    };
    Ok(yaml)
}

fn int_number(number: i128) -> Result<Number> {
    if let Ok(signed) = i64::try_from(number) {
        return Ok(Number::from(signed));
    }
    u64::try_from(number)
        .map(Number::from)
        .map_err(|_| ConfigError::InvalidNode(format!("integer {number} does not fit 64 bits")))
}

/// Reconstruct a record from a mapping tagged with `DatagenClass`.
pub fn deserialize(catalog: &Catalog, mapping: Mapping) -> Result<RecordInstance> {
    let tag = type_tag(&mapping)?.ok_or_else(|| {
        ConfigError::InvalidNode(format!("mapping has no {TYPE_TAG_KEY} key"))
    })?;
    deserialize_as(catalog, &tag, mapping)
}

/// Reconstruct a record of type `record` from a mapping.
///
/// A tag, when present, must name `record` or a subtype of it. Keys must be
/// fields accepted on load; absent fields take their declared defaults.
pub fn deserialize_as(catalog: &Catalog, record: &str, mapping: Mapping) -> Result<RecordInstance> {
    let instance = construct(catalog, record, mapping)?;
    Ok(validate_instance(catalog, instance)?)
}

/// Read the tag key of a mapping, if any.
pub fn type_tag(mapping: &Mapping) -> Result<Option<String>> {
    match mapping.get(TYPE_TAG_KEY) {
        None => Ok(None),
        Some(Yaml::String(tag)) => Ok(Some(tag.clone())),
        Some(other) => Err(ConfigError::InvalidNode(format!(
            "{TYPE_TAG_KEY} must be a string, got {other:?}"
        ))),
    }
}

fn construct(catalog: &Catalog, declared: &str, mapping: Mapping) -> Result<RecordInstance> {
    let record = match type_tag(&mapping)? {
        Some(tag) if tag == declared || catalog.is_subtype(&tag, declared) => tag,
        Some(tag) => {
            return Err(ConfigError::InvalidNode(format!(
                "tag {tag} conflicts with declared type {declared}"
            )));
        }
        None => declared.to_string(),
    };
    let fields = catalog.fields(&record)?;

    let mut supplied = Vec::new();
    for (key, value) in mapping {
        let Yaml::String(key) = key else {
            return Err(ConfigError::InvalidNode(format!(
                "{record}: mapping keys must be strings, got {key:?}"
            )));
        };
        if key == TYPE_TAG_KEY {
            continue;
        }
        let field = fields
            .iter()
            .find(|field| field.name == key && field.is_loaded())
            .ok_or_else(|| {
                datagen_core::Error::Validation(format!(
                    "{record}: unexpected field '{key}'"
                ))
            })?;
        supplied.push((key, from_yaml(catalog, &record, field, value)?));
    }

    let mut instance = RecordInstance::new(record.as_str());
    for field in &fields {
        let value = match supplied.iter().position(|(name, _)| *name == field.name) {
            Some(index) => supplied.swap_remove(index).1,
            None => field.default.clone(),
        };
        instance.set(field.name.clone(), value);
    }
    Ok(instance)
}

fn from_yaml(catalog: &Catalog, record: &str, field: &FieldDecl, value: Yaml) -> Result<Value> {
    match (&field.ty, value) {
        (FieldType::Record(declared), Yaml::Mapping(mapping)) => {
            construct(catalog, declared, mapping).map(Value::Record)
        }
        (_, value) => plain_value(record, field, value),
    }
}

fn plain_value(record: &str, field: &FieldDecl, value: Yaml) -> Result<Value> {
    let value = match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(flag) => Value::Bool(flag),
        Yaml::Number(number) => {
            if let Some(signed) = number.as_i64() {
                Value::Int(i128::from(signed))
            } else if let Some(unsigned) = number.as_u64() {
                Value::Int(i128::from(unsigned))
            } else {
                Value::Float(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        Yaml::String(text) => Value::Str(text),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(|item| plain_value(record, field, item))
                .collect::<Result<Vec<_>>>()?,
        ),
        Yaml::Mapping(_) | Yaml::Tagged(_) => {
            return Err(datagen_core::Error::Validation(format!(
                "{record}: expected {} to be {}, got mapping",
                field.name, field.ty
            ))
            .into());
        }
    };
    Ok(value)
}

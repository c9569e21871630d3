use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{
    ArraySizes, Catalog, Direction, ElementType, EnumDefinition, FieldDecl, FieldType,
    NamedConstant, RandGenerator, RecordSchema,
};
use crate::types::ScalarKind;
use crate::validation::validate_catalog;
use crate::value::Value;

/// TOML document declaring constants, enums and record types.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDocument {
    /// `#define` constants emitted at the top of the header.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<ConstantDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<EnumDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConstantDoc {
    pub name: String,
    pub value: ConstantValue,
}

/// Constant value; strings are emitted verbatim as C expressions.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ConstantValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(value) => write!(f, "{value}"),
            ConstantValue::Float(value) => write!(f, "{value:?}"),
            ConstantValue::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnumDoc {
    pub name: String,
    pub members: Vec<EnumMemberDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnumMemberDoc {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecordDoc {
    pub name: String,
    /// Parent record whose fields precede this record's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Byte boundary for `#pragma pack` and binary packing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<u32>,
    /// Write a flat binary dump for each instance of this record.
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub fields: Vec<FieldDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub random: Vec<RandomDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldDoc {
    pub name: String,
    /// Scalar name (`uint32`, `unsigned int`), enum/record name, or `T[]`.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub direction: DirectionDoc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Fixed element count for array fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DirectionDoc {
    #[default]
    InOut,
    In,
    Out,
    Internal,
}

impl From<DirectionDoc> for Direction {
    fn from(direction: DirectionDoc) -> Self {
        match direction {
            DirectionDoc::InOut => Direction::InOut,
            DirectionDoc::In => Direction::In,
            DirectionDoc::Out => Direction::Out,
            DirectionDoc::Internal => Direction::Internal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RandomDoc {
    /// Field that receives the generated value when unset.
    pub field: String,
    #[serde(flatten)]
    pub generator: GeneratorDoc,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorDoc {
    IntRange { min: i64, max: i64 },
    FloatRange { min: f64, max: f64 },
    Bool,
    Choice { values: Vec<serde_json::Value> },
    Enum,
}

impl TryFrom<&GeneratorDoc> for RandGenerator {
    type Error = Error;

    fn try_from(doc: &GeneratorDoc) -> Result<Self> {
        Ok(match doc {
            GeneratorDoc::IntRange { min, max } => RandGenerator::IntRange {
                min: *min as i128,
                max: *max as i128,
            },
            GeneratorDoc::FloatRange { min, max } => RandGenerator::FloatRange {
                min: *min,
                max: *max,
            },
            GeneratorDoc::Bool => RandGenerator::Bool,
            GeneratorDoc::Choice { values } => RandGenerator::Choice(
                values
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            GeneratorDoc::Enum => RandGenerator::EnumMember,
        })
    }
}

impl SchemaDocument {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| Error::Document(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve type names and build a validated catalog.
    pub fn into_catalog(self) -> Result<Catalog> {
        let enum_names: BTreeSet<&str> = self.enums.iter().map(|doc| doc.name.as_str()).collect();
        let record_names: BTreeSet<&str> =
            self.records.iter().map(|doc| doc.name.as_str()).collect();
        let names = TypeNames {
            enums: &enum_names,
            records: &record_names,
        };

        let mut catalog = Catalog::new();

        for constant in &self.constants {
            check_identifier(&constant.name)?;
            catalog.add_constant(NamedConstant::new(&constant.name, &constant.value))?;
        }

        for doc in &self.enums {
            check_identifier(&doc.name)?;
            let mut definition = EnumDefinition::new(&doc.name);
            for member in &doc.members {
                check_identifier(&member.name)?;
                definition = definition.member(&member.name, member.value);
            }
            catalog.add_enum(definition)?;
        }

        for doc in &self.records {
            catalog.add_record(record_from_doc(doc, &names)?)?;
        }

        validate_catalog(&catalog)?;
        Ok(catalog)
    }
}

struct TypeNames<'a> {
    enums: &'a BTreeSet<&'a str>,
    records: &'a BTreeSet<&'a str>,
}

fn record_from_doc(doc: &RecordDoc, names: &TypeNames<'_>) -> Result<RecordSchema> {
    check_identifier(&doc.name)?;
    let mut record = RecordSchema::new(&doc.name).binary(doc.binary);
    if let Some(parent) = &doc.extends {
        record = record.extends(parent);
    }
    if let Some(pack) = doc.pack {
        record = record.pack(pack);
    }

    let mut sizes = ArraySizes::new();
    for field in &doc.fields {
        check_identifier(&field.name)?;
        let ty = parse_field_type(&field.ty, names).map_err(|err| {
            Error::Document(format!("{}.{}: {}", doc.name, field.name, err))
        })?;
        if let (FieldType::Array(element), Some(size)) = (&ty, field.size) {
            sizes.insert(&field.name, element.clone(), size);
        }
        let default = match &field.default {
            Some(literal) => Value::from_json(literal)
                .map_err(|err| Error::Document(format!("{}.{}: {}", doc.name, field.name, err)))?,
            None => Value::Null,
        };
        record = record.field(
            FieldDecl::new(&field.name, ty)
                .direction(field.direction.into())
                .default_value(default),
        );
    }

    for random in &doc.random {
        let generator = RandGenerator::try_from(&random.generator)
            .map_err(|err| Error::Document(format!("{}.{}: {}", doc.name, random.field, err)))?;
        record = record.randomize(&random.field, generator);
    }

    Ok(record.array_sizes(sizes))
}

/// Parse a declared type name (`uint8`, `unsigned int`, `Color`, `Color[]`).
fn parse_field_type(raw: &str, names: &TypeNames<'_>) -> Result<FieldType> {
    let raw = raw.trim();
    if let Some(element) = raw.strip_suffix("[]") {
        let element = element.trim();
        if let Ok(kind) = element.parse::<ScalarKind>() {
            return Ok(FieldType::Array(ElementType::Scalar(kind)));
        }
        if names.enums.contains(element) {
            return Ok(FieldType::Array(ElementType::Enum(element.to_string())));
        }
        return Err(Error::Document(format!(
            "unsupported array element type '{element}'"
        )));
    }

    if let Ok(kind) = raw.parse::<ScalarKind>() {
        return Ok(FieldType::Scalar(kind));
    }
    if names.enums.contains(raw) {
        return Ok(FieldType::Enum(raw.to_string()));
    }
    if names.records.contains(raw) {
        return Ok(FieldType::Record(raw.to_string()));
    }
    Err(Error::Document(format!("unknown type '{raw}'")))
}

fn identifier_regex() -> Option<&'static Regex> {
    static IDENTIFIER: OnceLock<Option<Regex>> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
}

fn check_identifier(name: &str) -> Result<()> {
    if identifier_regex().is_some_and(|re| re.is_match(name)) {
        Ok(())
    } else {
        Err(Error::Document(format!("'{name}' is not a valid C identifier")))
    }
}

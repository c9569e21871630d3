use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::types::ScalarKind;
use crate::value::{EnumMember, Value};

/// Prefix marking fields that never leave the process.
pub const PRIVATE_PREFIX: char = '_';

/// Named enumeration with explicit member values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDefinition {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, value: i64) -> Self {
        self.members.push((name.into(), value));
        self
    }

    pub fn by_name(&self, name: &str) -> Option<EnumMember> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(member, value)| self.to_member(member, *value))
    }

    pub fn by_value(&self, value: i64) -> Option<EnumMember> {
        self.members
            .iter()
            .find(|(_, member_value)| *member_value == value)
            .map(|(member, value)| self.to_member(member, *value))
    }

    pub fn all(&self) -> Vec<EnumMember> {
        self.members
            .iter()
            .map(|(member, value)| self.to_member(member, *value))
            .collect()
    }

    fn to_member(&self, name: &str, value: i64) -> EnumMember {
        EnumMember {
            enum_name: self.name.clone(),
            name: name.to_string(),
            value,
        }
    }
}

/// Element type of a fixed-size array field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Scalar(ScalarKind),
    Enum(String),
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Scalar(kind) => write!(f, "{kind}"),
            ElementType::Enum(name) => f.write_str(name),
        }
    }
}

/// Declared type of a record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarKind),
    Enum(String),
    Record(String),
    /// Array length is supplied by the array-size lookup at layout time.
    Array(ElementType),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(kind) => write!(f, "{kind}"),
            FieldType::Enum(name) | FieldType::Record(name) => f.write_str(name),
            FieldType::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Per-field participation in configuration input, output and layouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    InOut,
    In,
    Out,
    Internal,
}

/// A field declaration on a record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: FieldType,
    pub direction: Direction,
    pub default: Value,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            direction: Direction::InOut,
            default: Value::Null,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn is_private(&self) -> bool {
        self.name.starts_with(PRIVATE_PREFIX)
    }

    /// Accepted as a key when reconstructing from configuration.
    pub fn is_loaded(&self) -> bool {
        !self.is_private() && matches!(self.direction, Direction::InOut | Direction::In)
    }

    /// Written when serializing to configuration.
    pub fn is_dumped(&self) -> bool {
        !self.is_private() && matches!(self.direction, Direction::InOut | Direction::Out)
    }

    /// Projected into native layouts and binary dumps.
    pub fn in_layout(&self) -> bool {
        self.is_dumped()
    }
}

/// Array-size lookup: field name to element type and fixed length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArraySizes {
    entries: IndexMap<String, (ElementType, usize)>,
}

impl ArraySizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, element: ElementType, len: usize) -> Self {
        self.insert(field, element, len);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, element: ElementType, len: usize) {
        self.entries.insert(field.into(), (element, len));
    }

    pub fn get(&self, field: &str) -> Option<&(ElementType, usize)> {
        self.entries.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Value generator attached to a randomizable field.
#[derive(Debug, Clone, PartialEq)]
pub enum RandGenerator {
    IntRange { min: i128, max: i128 },
    FloatRange { min: f64, max: f64 },
    Bool,
    Choice(Vec<Value>),
    /// Any member of the target field's enum.
    EnumMember,
}

/// Side-table entry: generate into `target` when it is unset.
#[derive(Debug, Clone, PartialEq)]
pub struct RandField {
    pub target: String,
    pub generator: RandGenerator,
}

/// Declared shape of a record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub extends: Option<String>,
    /// Own fields only; inherited fields are resolved through the catalog.
    pub fields: Vec<FieldDecl>,
    pub pack: Option<u32>,
    pub array_sizes: ArraySizes,
    /// Eligible for flat binary dumps.
    pub binary: bool,
    pub randomize: Vec<RandField>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn pack(mut self, pack: u32) -> Self {
        self.pack = Some(pack);
        self
    }

    pub fn array_sizes(mut self, sizes: ArraySizes) -> Self {
        self.array_sizes = sizes;
        self
    }

    pub fn binary(mut self, binary: bool) -> Self {
        self.binary = binary;
        self
    }

    pub fn randomize(mut self, target: impl Into<String>, generator: RandGenerator) -> Self {
        self.randomize.push(RandField {
            target: target.into(),
            generator,
        });
        self
    }
}

/// `#define` constant rendered into generated headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedConstant {
    pub name: String,
    pub value: String,
}

impl NamedConstant {
    pub fn new(name: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }
}

/// All enums, records and constants known to a run, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    constants: Vec<NamedConstant>,
    enums: IndexMap<String, EnumDefinition>,
    records: IndexMap<String, RecordSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_constant(&mut self, constant: NamedConstant) -> Result<()> {
        if self.constants.iter().any(|existing| existing.name == constant.name) {
            return Err(Error::Schema(format!(
                "duplicate constant name: {}",
                constant.name
            )));
        }
        self.constants.push(constant);
        Ok(())
    }

    pub fn add_enum(&mut self, definition: EnumDefinition) -> Result<()> {
        if self.is_type_name(&definition.name) {
            return Err(Error::Schema(format!(
                "duplicate type name: {}",
                definition.name
            )));
        }
        self.enums.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn add_record(&mut self, record: RecordSchema) -> Result<()> {
        if self.is_type_name(&record.name) {
            return Err(Error::Schema(format!("duplicate type name: {}", record.name)));
        }
        self.records.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn constants(&self) -> &[NamedConstant] {
        &self.constants
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDefinition> {
        self.enums.values()
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordSchema> {
        self.records.values()
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.get(name)
    }

    pub fn record(&self, name: &str) -> Option<&RecordSchema> {
        self.records.get(name)
    }

    pub fn record_or_err(&self, name: &str) -> Result<&RecordSchema> {
        self.record(name)
            .ok_or_else(|| Error::Schema(format!("unknown record type: {name}")))
    }

    fn is_type_name(&self, name: &str) -> bool {
        self.enums.contains_key(name) || self.records.contains_key(name)
    }

    /// Inheritance chain from the root ancestor down to `name`.
    pub fn lineage(&self, name: &str) -> Result<Vec<&RecordSchema>> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(record_name) = current {
            let record = self.record_or_err(record_name)?;
            if chain.iter().any(|seen: &&RecordSchema| seen.name == record.name) {
                return Err(Error::Schema(format!(
                    "inheritance cycle through record: {}",
                    record.name
                )));
            }
            chain.push(record);
            current = record.extends.as_deref();
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every field of a record, inherited fields first.
    ///
    /// A field redeclared by a descendant keeps the position of the inherited
    /// one and takes the descendant's declaration.
    pub fn fields(&self, name: &str) -> Result<Vec<&FieldDecl>> {
        let mut fields: Vec<&FieldDecl> = Vec::new();
        for record in self.lineage(name)? {
            for decl in &record.fields {
                match fields.iter_mut().find(|seen| seen.name == decl.name) {
                    Some(slot) => *slot = decl,
                    None => fields.push(decl),
                }
            }
        }
        Ok(fields)
    }

    pub fn field(&self, record: &str, field: &str) -> Result<Option<&FieldDecl>> {
        Ok(self
            .fields(record)?
            .into_iter()
            .find(|decl| decl.name == field))
    }

    /// True when `name` is `ancestor` or inherits from it.
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        self.lineage(name)
            .map(|chain| chain.iter().any(|record| record.name == ancestor))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .add_record(
                RecordSchema::new("Base")
                    .field(FieldDecl::new("id", FieldType::Scalar(ScalarKind::UInt32))),
            )
            .unwrap();
        catalog
            .add_record(
                RecordSchema::new("Frame")
                    .extends("Base")
                    .field(FieldDecl::new("gain", FieldType::Scalar(ScalarKind::Float))),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn inherited_fields_come_first() {
        let catalog = catalog();
        let names: Vec<&str> = catalog
            .fields("Frame")
            .unwrap()
            .into_iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "gain"]);
        assert!(catalog.is_subtype("Frame", "Base"));
        assert!(!catalog.is_subtype("Base", "Frame"));
    }

    #[test]
    fn redeclared_field_keeps_inherited_position() {
        let mut catalog = catalog();
        catalog
            .add_record(
                RecordSchema::new("Tagged")
                    .extends("Frame")
                    .field(FieldDecl::new("label", FieldType::Scalar(ScalarKind::CStr)))
                    .field(
                        FieldDecl::new("id", FieldType::Scalar(ScalarKind::UInt64))
                            .default_value(7u64),
                    ),
            )
            .unwrap();

        let fields = catalog.fields("Tagged").unwrap();
        let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
        assert_eq!(names, vec!["id", "gain", "label"]);
        assert_eq!(fields[0].ty, FieldType::Scalar(ScalarKind::UInt64));
        assert_eq!(fields[0].default, Value::from(7u64));

        let id = catalog.field("Tagged", "id").unwrap().unwrap();
        assert_eq!(id.ty, FieldType::Scalar(ScalarKind::UInt64));
    }

    #[test]
    fn rejects_duplicate_type_names() {
        let mut catalog = catalog();
        let err = catalog.add_enum(EnumDefinition::new("Frame")).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn detects_inheritance_cycles() {
        let mut catalog = Catalog::new();
        catalog.add_record(RecordSchema::new("A").extends("B")).unwrap();
        catalog.add_record(RecordSchema::new("B").extends("A")).unwrap();
        assert!(matches!(catalog.fields("A"), Err(Error::Schema(_))));
    }

    #[test]
    fn direction_flags() {
        let field = FieldDecl::new("x", FieldType::Scalar(ScalarKind::Int32));
        assert!(field.is_loaded() && field.is_dumped() && field.in_layout());

        let input = field.clone().direction(Direction::In);
        assert!(input.is_loaded() && !input.is_dumped() && !input.in_layout());

        let output = field.clone().direction(Direction::Out);
        assert!(!output.is_loaded() && output.is_dumped() && output.in_layout());

        let private = FieldDecl::new("_cache", FieldType::Scalar(ScalarKind::Int32));
        assert!(!private.is_loaded() && !private.is_dumped());
    }

    #[test]
    fn enum_lookup_by_name_and_value() {
        let color = EnumDefinition::new("Color").member("RED", 0).member("BLUE", 4);
        assert_eq!(color.by_name("BLUE").map(|m| m.value), Some(4));
        assert_eq!(color.by_value(0).map(|m| m.name), Some("RED".to_string()));
        assert!(color.by_name("GREEN").is_none());
    }
}

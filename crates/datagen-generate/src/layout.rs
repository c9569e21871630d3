use indexmap::IndexMap;
use tracing::debug;

use datagen_core::{
    ArraySizes, Catalog, ElementType, FieldDecl, FieldType, RecordSchema, ScalarKind,
};

use crate::errors::{GenerationError, Result};

/// Native storage used for enum-typed fields and array elements.
pub const ENUM_STORAGE: ScalarKind = ScalarKind::UInt32;

/// Resolved native type of a layout field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    Scalar(ScalarKind),
    /// Declared with the enum's name, stored as [`ENUM_STORAGE`].
    Enum(String),
    /// Nested struct referenced by name.
    Record(String),
}

impl NativeType {
    /// Type name written into generated declarations.
    pub fn type_name(&self) -> &str {
        match self {
            NativeType::Scalar(kind) => kind.native_name(),
            NativeType::Enum(name) | NativeType::Record(name) => name,
        }
    }

    /// Scalar storage of the type, `None` for nested records.
    pub fn storage(&self) -> Option<ScalarKind> {
        match self {
            NativeType::Scalar(kind) => Some(*kind),
            NativeType::Enum(_) => Some(ENUM_STORAGE),
            NativeType::Record(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: NativeType,
    pub array_len: Option<usize>,
}

/// Ordered native layout of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub pack: Option<u32>,
}

impl RecordLayout {
    pub fn new(name: impl Into<String>, pack: Option<u32>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            pack,
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|descriptor| descriptor.name == field)
    }
}

/// Append the layout-eligible `fields` to `layout`.
///
/// Fields already present are skipped, so the call can be repeated without
/// duplicating names.
pub fn extend_layout<'f>(
    layout: &mut RecordLayout,
    catalog: &Catalog,
    fields: impl IntoIterator<Item = &'f FieldDecl>,
    sizes: &ArraySizes,
) -> Result<()> {
    for field in fields {
        if layout.contains(&field.name) || !field.in_layout() {
            continue;
        }
        let descriptor = resolve_field(catalog, &layout.name, field, sizes)?;
        layout.fields.push(descriptor);
    }
    Ok(())
}

fn resolve_field(
    catalog: &Catalog,
    record: &str,
    field: &FieldDecl,
    sizes: &ArraySizes,
) -> Result<FieldDescriptor> {
    let (ty, array_len) = match &field.ty {
        FieldType::Scalar(kind) => (NativeType::Scalar(*kind), None),
        FieldType::Enum(name) => (resolve_enum(catalog, record, field, name)?, None),
        FieldType::Record(name) => {
            if catalog.record(name).is_none() {
                return Err(unresolved(record, field));
            }
            (NativeType::Record(name.clone()), None)
        }
        FieldType::Array(declared) => {
            let (element, len) = sizes.get(&field.name).ok_or_else(|| {
                GenerationError::Schema(format!(
                    "{record}.{} not found in array size lookup; declare its element type and size before building the layout",
                    field.name
                ))
            })?;
            if element != declared {
                return Err(GenerationError::Schema(format!(
                    "{record}.{}: array size lookup names element {element}, field declares {declared}",
                    field.name
                )));
            }
            if *len == 0 {
                return Err(GenerationError::Schema(format!(
                    "{record}.{}: array length must be positive",
                    field.name
                )));
            }
            let ty = match element {
                ElementType::Scalar(kind) => NativeType::Scalar(*kind),
                ElementType::Enum(name) => resolve_enum(catalog, record, field, name)?,
            };
            (ty, Some(*len))
        }
    };

    Ok(FieldDescriptor {
        name: field.name.clone(),
        ty,
        array_len,
    })
}

fn resolve_enum(
    catalog: &Catalog,
    record: &str,
    field: &FieldDecl,
    name: &str,
) -> Result<NativeType> {
    catalog
        .enum_def(name)
        .map(|_| NativeType::Enum(name.to_string()))
        .ok_or_else(|| unresolved(record, field))
}

fn unresolved(record: &str, field: &FieldDecl) -> GenerationError {
    GenerationError::Schema(format!(
        "failed to resolve native type '{}' for {record}.{}",
        field.ty, field.name
    ))
}

/// Builds and caches record layouts by record name.
#[derive(Debug, Clone, Default)]
pub struct LayoutBuilder {
    cache: IndexMap<String, RecordLayout>,
}

impl LayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the layout of `record` from its inherited fields, root first.
    ///
    /// A redeclared field keeps its inherited position with the descendant's
    /// type. Array sizes come from `sizes`, falling back to the nearest
    /// lookup in the inheritance chain that names the field. A record built
    /// once is served from the cache on later calls.
    pub fn build(
        &mut self,
        catalog: &Catalog,
        record: &str,
        sizes: &ArraySizes,
    ) -> Result<&RecordLayout> {
        if self.cache.contains_key(record) {
            return Ok(&self.cache[record]);
        }

        let lineage = catalog.lineage(record)?;
        let pack = lineage.iter().rev().find_map(|schema| schema.pack);
        let fields = catalog.fields(record)?;
        let merged = merge_sizes(sizes, &lineage, &fields);
        let mut layout = RecordLayout::new(record, pack);
        extend_layout(&mut layout, catalog, fields, &merged)?;

        debug!(
            record = %record,
            fields = layout.fields.len(),
            pack = ?layout.pack,
            "layout built"
        );
        Ok(self.cache.entry(record.to_string()).or_insert(layout))
    }

    /// Build every catalog record, returning layouts in declaration order.
    pub fn build_all(&mut self, catalog: &Catalog) -> Result<Vec<&RecordLayout>> {
        let empty = ArraySizes::new();
        for record in catalog.records() {
            self.build(catalog, &record.name, &empty)?;
        }
        Ok(catalog
            .records()
            .filter_map(|record| self.cache.get(&record.name))
            .collect())
    }

    pub fn layout(&self, record: &str) -> Option<&RecordLayout> {
        self.cache.get(record)
    }

    pub fn layouts(&self) -> impl Iterator<Item = &RecordLayout> {
        self.cache.values()
    }
}

fn merge_sizes(
    primary: &ArraySizes,
    lineage: &[&RecordSchema],
    fields: &[&FieldDecl],
) -> ArraySizes {
    let mut merged = ArraySizes::new();
    for field in fields {
        let declared = lineage
            .iter()
            .rev()
            .find_map(|level| level.array_sizes.get(&field.name));
        if let Some((element, len)) = primary.get(&field.name).or(declared) {
            merged.insert(field.name.clone(), element.clone(), *len);
        }
    }
    merged
}

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value as Yaml};
use tracing::debug;

use datagen_core::{Catalog, RecordInstance, validate_instance};

use crate::errors::{ConfigError, Result};
use crate::projection::{SerializeOptions, deserialize_as, serialize, type_tag};

/// Builds a typed record from a tagged mapping.
pub type Constructor = Box<dyn Fn(&Catalog, Mapping) -> Result<RecordInstance>>;

/// Maps declared type names to their constructors.
#[derive(Default)]
pub struct ConstructorRegistry {
    constructors: IndexMap<String, Constructor>,
}

impl ConstructorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the schema-driven constructor for every catalog record.
    pub fn register_catalog(&mut self, catalog: &Catalog) {
        for record in catalog.records() {
            let name = record.name.clone();
            self.constructors.insert(
                record.name.clone(),
                Box::new(move |catalog: &Catalog, mapping: Mapping| {
                    deserialize_as(catalog, &name, mapping)
                }),
            );
        }
    }

    /// Register or replace the constructor for one type name.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&Catalog, Mapping) -> Result<RecordInstance> + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Build a record of type `name` from `mapping`.
    ///
    /// Field values that are tagged mappings themselves are built first by
    /// their own registered constructors and placed on the record returned by
    /// the constructor for `name`.
    pub fn construct(
        &self,
        catalog: &Catalog,
        name: &str,
        mapping: Mapping,
    ) -> Result<RecordInstance> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ConfigError::UnregisteredType(name.to_string()))?;
        let (mapping, nested) = self.construct_nested(catalog, mapping)?;
        let mut record = constructor(catalog, mapping)?;
        if nested.is_empty() {
            return Ok(record);
        }

        for (field, child) in nested {
            let loaded = catalog
                .field(record.type_name(), &field)?
                .is_some_and(|decl| decl.is_loaded());
            if !loaded {
                return Err(datagen_core::Error::Validation(format!(
                    "{}: unexpected field '{field}'",
                    record.type_name()
                ))
                .into());
            }
            debug!(
                record = %record.type_name(),
                field = %field,
                child = %child.type_name(),
                "nested record constructed"
            );
            record.set(field, child);
        }
        Ok(validate_instance(catalog, record)?)
    }

    fn construct_nested(
        &self,
        catalog: &Catalog,
        mapping: Mapping,
    ) -> Result<(Mapping, Vec<(String, RecordInstance)>)> {
        let mut rest = Mapping::new();
        let mut nested = Vec::new();
        for (key, value) in mapping {
            let tag = match &value {
                Yaml::Mapping(inner) => type_tag(inner)?,
                _ => None,
            };
            match (key, value, tag) {
                (Yaml::String(field), Yaml::Mapping(inner), Some(tag)) => {
                    nested.push((field, self.construct(catalog, &tag, inner)?));
                }
                (key, value, _) => {
                    rest.insert(key, value);
                }
            }
        }
        Ok((rest, nested))
    }
}

impl std::fmt::Debug for ConstructorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstructorRegistry")
            .field("types", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A loaded configuration document.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Scalar(Yaml),
    Sequence(Vec<ConfigNode>),
    Mapping(IndexMap<Yaml, ConfigNode>),
    Record(RecordInstance),
}

impl ConfigNode {
    /// Top-level record instances in document order.
    pub fn records(&self) -> Vec<&RecordInstance> {
        let mut out = Vec::new();
        collect_records(self, &mut out);
        out
    }

    pub fn records_mut(&mut self) -> Vec<&mut RecordInstance> {
        let mut out = Vec::new();
        collect_records_mut(self, &mut out);
        out
    }
}

fn collect_records<'a>(node: &'a ConfigNode, out: &mut Vec<&'a RecordInstance>) {
    match node {
        ConfigNode::Record(record) => out.push(record),
        ConfigNode::Sequence(items) => items.iter().for_each(|item| collect_records(item, out)),
        ConfigNode::Mapping(entries) => entries
            .values()
            .for_each(|item| collect_records(item, out)),
        ConfigNode::Scalar(_) => {}
    }
}

fn collect_records_mut<'a>(node: &'a mut ConfigNode, out: &mut Vec<&'a mut RecordInstance>) {
    match node {
        ConfigNode::Record(record) => out.push(record),
        ConfigNode::Sequence(items) => items
            .iter_mut()
            .for_each(|item| collect_records_mut(item, out)),
        ConfigNode::Mapping(entries) => entries
            .values_mut()
            .for_each(|item| collect_records_mut(item, out)),
        ConfigNode::Scalar(_) => {}
    }
}

/// Reads and writes YAML configuration documents against a catalog.
#[derive(Debug)]
pub struct Loader<'a> {
    catalog: &'a Catalog,
    registry: ConstructorRegistry,
    options: SerializeOptions,
}

impl<'a> Loader<'a> {
    /// Loader with every catalog record registered.
    pub fn new(catalog: &'a Catalog) -> Self {
        let mut registry = ConstructorRegistry::new();
        registry.register_catalog(catalog);
        Self::with_registry(catalog, registry)
    }

    pub fn with_registry(catalog: &'a Catalog, registry: ConstructorRegistry) -> Self {
        Self {
            catalog,
            registry,
            options: SerializeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SerializeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry_mut(&mut self) -> &mut ConstructorRegistry {
        &mut self.registry
    }

    pub fn load_str(&self, text: &str) -> Result<ConfigNode> {
        let document: Yaml = serde_yaml::from_str(text)?;
        let node = self.build(document)?;
        debug!(records = node.records().len(), "configuration loaded");
        Ok(node)
    }

    pub fn load_path(&self, path: &Path) -> Result<ConfigNode> {
        let text = fs::read_to_string(path)?;
        self.load_str(&text)
    }

    pub fn dump_str(&self, node: &ConfigNode) -> Result<String> {
        let document = self.project(node)?;
        Ok(serde_yaml::to_string(&document)?)
    }

    pub fn dump_path(&self, node: &ConfigNode, path: &Path) -> Result<()> {
        let text = self.dump_str(node)?;
        fs::write(path, text)?;
        Ok(())
    }

    fn build(&self, value: Yaml) -> Result<ConfigNode> {
        match value {
            Yaml::Mapping(mapping) => match type_tag(&mapping)? {
                Some(tag) => self
                    .registry
                    .construct(self.catalog, &tag, mapping)
                    .map(ConfigNode::Record),
                None => mapping
                    .into_iter()
                    .map(|(key, value)| Ok((key, self.build(value)?)))
                    .collect::<Result<IndexMap<_, _>>>()
                    .map(ConfigNode::Mapping),
            },
            Yaml::Sequence(items) => items
                .into_iter()
                .map(|item| self.build(item))
                .collect::<Result<Vec<_>>>()
                .map(ConfigNode::Sequence),
            Yaml::Tagged(tagged) => Err(ConfigError::InvalidNode(format!(
                "native YAML tag {} is not supported; use a DatagenClass key",
                tagged.tag
            ))),
            scalar => Ok(ConfigNode::Scalar(scalar)),
        }
    }

    fn project(&self, node: &ConfigNode) -> Result<Yaml> {
        let value = match node {
            ConfigNode::Scalar(value) => value.clone(),
            ConfigNode::Sequence(items) => Yaml::Sequence(
                items
                    .iter()
                    .map(|item| self.project(item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ConfigNode::Mapping(entries) => {
                let mut mapping = Mapping::new();
                for (key, item) in entries {
                    mapping.insert(key.clone(), self.project(item)?);
                }
                Yaml::Mapping(mapping)
            }
            ConfigNode::Record(record) => {
                Yaml::Mapping(serialize(self.catalog, record, &self.options)?)
            }
        };
        Ok(value)
    }
}

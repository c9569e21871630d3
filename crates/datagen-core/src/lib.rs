//! Core contracts and helpers for datagen.
//!
//! This crate defines the scalar type registry, the record/enum schema model,
//! record values, and the validation applied to reconstructed instances.

pub mod document;
pub mod error;
pub mod schema;
pub mod types;
pub mod validation;
pub mod value;

pub use document::SchemaDocument;
pub use error::{Error, Result};
pub use schema::{
    ArraySizes, Catalog, Direction, ElementType, EnumDefinition, FieldDecl, FieldType,
    NamedConstant, PRIVATE_PREFIX, RandField, RandGenerator, RecordSchema,
};
pub use types::{
    HostType, NativeName, ScalarKind, default_kind_for, host_runtime_type, is_default_coercible,
    resolve_native_name, to_native_name, to_scalar_kind,
};
pub use validation::{coerce_value, validate_catalog, validate_instance};
pub use value::{EnumMember, RecordInstance, Value};

/// Reserved configuration key naming the declared record type of a mapping.
pub const TYPE_TAG_KEY: &str = "DatagenClass";

/// Default file name of the generated header.
pub const HEADER_FILE_NAME: &str = "datagen_types.h";

//! YAML configuration support for datagen.
//!
//! Records appear in configuration files as mappings carrying a
//! `DatagenClass` key. The loader turns them into typed record instances
//! through a constructor registry, and the projection writes them back with
//! direction filters and enum names applied.

pub mod errors;
pub mod loader;
pub mod projection;

pub use errors::{ConfigError, Result};
pub use loader::{ConfigNode, Constructor, ConstructorRegistry, Loader};
pub use projection::{
    SerializeOptions, TagPolicy, deserialize, deserialize_as, serialize, type_tag,
};

//! Native layout generation for datagen records.
//!
//! This crate turns catalog records into ordered C layouts, renders them as a
//! header, packs record instances into flat binaries, and randomizes fields
//! declared in a record's randomization table.

pub mod errors;
pub mod layout;
pub mod output;
pub mod random;

pub use errors::{GenerationError, Result};
pub use layout::{
    ENUM_STORAGE, FieldDescriptor, LayoutBuilder, NativeType, RecordLayout, extend_layout,
};
pub use output::{BinaryPacker, emit, pack, write_binary, write_header};
pub use random::{Randomizer, seed_from_str};

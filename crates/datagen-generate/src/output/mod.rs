//! Writers for generated artifacts.

pub mod binary;
pub mod header;

pub use binary::{BinaryPacker, pack, write_binary};
pub use header::{emit, write_header};

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Semantic scalar kinds that can appear in a native record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    /// Fixed-size opaque byte (`char`).
    Byte,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    /// Narrow string pointer (`const char*`).
    CStr,
    SizeT,
}

/// Host-side value type a scalar is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    Bool,
    Int,
    Float,
    Str,
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostType::Bool => "bool",
            HostType::Int => "int",
            HostType::Float => "float",
            HostType::Str => "str",
        };
        f.write_str(name)
    }
}

struct ScalarEntry {
    kind: ScalarKind,
    semantic: &'static str,
    native: &'static str,
    host: HostType,
    width: usize,
    default_coercible: bool,
}

const POINTER_WIDTH: usize = std::mem::size_of::<usize>();

const fn entry(
    kind: ScalarKind,
    semantic: &'static str,
    native: &'static str,
    host: HostType,
    width: usize,
    default_coercible: bool,
) -> ScalarEntry {
    ScalarEntry {
        kind,
        semantic,
        native,
        host,
        width,
        default_coercible,
    }
}

// Native names are unique so the reverse lookup is unambiguous.
const SCALAR_TABLE: [ScalarEntry; 13] = [
    entry(ScalarKind::Bool, "bool", "_Bool", HostType::Bool, 1, true),
    entry(ScalarKind::Byte, "byte", "char", HostType::Int, 1, false),
    entry(ScalarKind::Int8, "int8", "signed char", HostType::Int, 1, false),
    entry(ScalarKind::UInt8, "uint8", "unsigned char", HostType::Int, 1, false),
    entry(ScalarKind::Int16, "int16", "short", HostType::Int, 2, false),
    entry(ScalarKind::UInt16, "uint16", "unsigned short", HostType::Int, 2, false),
    entry(ScalarKind::Int32, "int32", "int", HostType::Int, 4, false),
    entry(ScalarKind::UInt32, "uint32", "unsigned int", HostType::Int, 4, false),
    entry(ScalarKind::Int64, "int64", "long", HostType::Int, 8, true),
    entry(ScalarKind::UInt64, "uint64", "unsigned long", HostType::Int, 8, false),
    entry(ScalarKind::Float, "float", "float", HostType::Float, 4, true),
    entry(ScalarKind::CStr, "cstr", "const char*", HostType::Str, POINTER_WIDTH, true),
    entry(ScalarKind::SizeT, "size_t", "size_t", HostType::Int, POINTER_WIDTH, false),
];

impl ScalarKind {
    /// Every registered kind in table order.
    pub const ALL: [ScalarKind; 13] = [
        ScalarKind::Bool,
        ScalarKind::Byte,
        ScalarKind::Int8,
        ScalarKind::UInt8,
        ScalarKind::Int16,
        ScalarKind::UInt16,
        ScalarKind::Int32,
        ScalarKind::UInt32,
        ScalarKind::Int64,
        ScalarKind::UInt64,
        ScalarKind::Float,
        ScalarKind::CStr,
        ScalarKind::SizeT,
    ];

    fn entry(self) -> &'static ScalarEntry {
        // Table rows follow declaration order of the enum.
        &SCALAR_TABLE[self as usize]
    }

    /// Name used in schema documents (e.g. `uint32`).
    pub fn semantic_name(self) -> &'static str {
        self.entry().semantic
    }

    /// C type name written into generated headers.
    pub fn native_name(self) -> &'static str {
        self.entry().native
    }

    pub fn host_type(self) -> HostType {
        self.entry().host
    }

    /// Storage width in bytes; natural alignment equals the width.
    pub fn width(self) -> usize {
        self.entry().width
    }

    pub fn alignment(self) -> usize {
        self.entry().width
    }

    pub fn is_pointer(self) -> bool {
        matches!(self, ScalarKind::CStr)
    }

    /// Inclusive integer range representable by the kind.
    pub fn int_bounds(self) -> Option<(i128, i128)> {
        let bounds = match self {
            ScalarKind::Byte | ScalarKind::Int8 => (i8::MIN as i128, i8::MAX as i128),
            ScalarKind::UInt8 => (0, u8::MAX as i128),
            ScalarKind::Int16 => (i16::MIN as i128, i16::MAX as i128),
            ScalarKind::UInt16 => (0, u16::MAX as i128),
            ScalarKind::Int32 => (i32::MIN as i128, i32::MAX as i128),
            ScalarKind::UInt32 => (0, u32::MAX as i128),
            ScalarKind::Int64 => (i64::MIN as i128, i64::MAX as i128),
            ScalarKind::UInt64 => (0, u64::MAX as i128),
            ScalarKind::SizeT => (0, usize::MAX as i128),
            ScalarKind::Bool | ScalarKind::Float | ScalarKind::CStr => return None,
        };
        Some(bounds)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.semantic_name())
    }
}

impl FromStr for ScalarKind {
    type Err = Error;

    /// Accepts semantic names, native C names and the `integer`/`string`
    /// host aliases (resolved through the default-coercion table).
    fn from_str(name: &str) -> Result<Self> {
        let name = name.trim();
        if let Some(entry) = SCALAR_TABLE.iter().find(|entry| entry.semantic == name) {
            return Ok(entry.kind);
        }
        if let Ok(kind) = to_scalar_kind(name) {
            return Ok(kind);
        }
        let host = match name {
            "integer" => Some(HostType::Int),
            "string" | "str" => Some(HostType::Str),
            _ => None,
        };
        host.and_then(default_kind_for)
            .ok_or_else(|| Error::Lookup(name.to_string()))
    }
}

/// Result of resolving a type name that may not be a registered scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeName<'a> {
    Scalar(ScalarKind),
    /// Externally defined struct/typedef/enum name, passed through unchanged.
    Opaque(&'a str),
}

pub fn to_native_name(kind: ScalarKind) -> &'static str {
    kind.native_name()
}

/// Reverse lookup from a C type name to its scalar kind.
pub fn to_scalar_kind(native_name: &str) -> Result<ScalarKind> {
    SCALAR_TABLE
        .iter()
        .find(|entry| entry.native == native_name)
        .map(|entry| entry.kind)
        .ok_or_else(|| Error::Lookup(native_name.to_string()))
}

/// Resolve a native name, treating unregistered names as opaque.
pub fn resolve_native_name(native_name: &str) -> NativeName<'_> {
    match to_scalar_kind(native_name) {
        Ok(kind) => NativeName::Scalar(kind),
        Err(_) => NativeName::Opaque(native_name),
    }
}

/// Whether a bare host literal may be coerced into this kind without a cast.
pub fn is_default_coercible(kind: ScalarKind) -> bool {
    kind.entry().default_coercible
}

pub fn host_runtime_type(kind: ScalarKind) -> HostType {
    kind.host_type()
}

/// Scalar kind a bare host value of the given type maps to by default.
pub fn default_kind_for(host: HostType) -> Option<ScalarKind> {
    SCALAR_TABLE
        .iter()
        .find(|entry| entry.default_coercible && entry.host == host)
        .map(|entry| entry.kind)
}

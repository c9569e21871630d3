use std::fs::File;
use std::io::Write;
use std::path::Path;

use datagen_core::{RecordInstance, ScalarKind, Value};

use crate::errors::{GenerationError, Result};
use crate::layout::{LayoutBuilder, NativeType, RecordLayout};

/// Packs record instances against layouts cached by a [`LayoutBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct BinaryPacker<'a> {
    layouts: &'a LayoutBuilder,
}

impl<'a> BinaryPacker<'a> {
    pub fn new(layouts: &'a LayoutBuilder) -> Self {
        Self { layouts }
    }

    /// Pack an instance whose record type has already been built.
    pub fn pack(&self, instance: &RecordInstance) -> Result<Vec<u8>> {
        let layout = self
            .layouts
            .layout(instance.type_name())
            .ok_or_else(|| GenerationError::LayoutNotBuilt(instance.type_name().to_string()))?;
        pack(instance, layout)
    }

    /// Pack an instance and write it to `path`, returning the byte count.
    pub fn write(&self, instance: &RecordInstance, path: &Path) -> Result<usize> {
        let bytes = self.pack(instance)?;
        write_binary(path, &bytes)?;
        Ok(bytes.len())
    }
}

/// Serialize `instance` into the flat native layout described by `layout`.
///
/// Fields are laid out in declaration order with native endianness. Each
/// field is aligned to `min(width, pack)` and the total size is padded to the
/// largest such alignment.
pub fn pack(instance: &RecordInstance, layout: &RecordLayout) -> Result<Vec<u8>> {
    if instance.type_name() != layout.name {
        return Err(GenerationError::Pack(format!(
            "instance of {} cannot be packed with layout {}",
            instance.type_name(),
            layout.name
        )));
    }

    let pack = layout.pack.map(|pack| pack as usize);
    let mut buf = Vec::new();
    let mut struct_align = 1;

    for field in &layout.fields {
        let ctx = PackCtx {
            record: &layout.name,
            field: &field.name,
        };
        let kind = match &field.ty {
            NativeType::Scalar(kind) if kind.is_pointer() => {
                return Err(ctx.error("pointer fields cannot be packed"));
            }
            NativeType::Record(name) => {
                return Err(ctx.error(format!("nested record {name} cannot be packed")));
            }
            other => other
                .storage()
                .ok_or_else(|| ctx.error("field has no scalar storage"))?,
        };

        let align = pack.map_or(kind.alignment(), |pack| kind.alignment().min(pack));
        struct_align = struct_align.max(align);
        pad_to(&mut buf, align);

        let value = instance
            .get(&field.name)
            .ok_or_else(|| ctx.error("field missing from instance"))?;

        match field.array_len {
            None => write_scalar(&mut buf, &ctx, kind, value)?,
            Some(len) => {
                let Value::Array(items) = value else {
                    return Err(ctx.error(format!("expected list, got {}", value.type_name())));
                };
                if items.len() > len {
                    return Err(ctx.error(format!(
                        "{} elements exceed array length {len}",
                        items.len()
                    )));
                }
                for item in items {
                    write_scalar(&mut buf, &ctx, kind, item)?;
                }
                buf.resize(buf.len() + (len - items.len()) * kind.width(), 0);
            }
        }
    }

    pad_to(&mut buf, struct_align);
    Ok(buf)
}

/// Write bytes to `path`, truncating any existing file.
pub fn write_binary(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.flush()
}

struct PackCtx<'a> {
    record: &'a str,
    field: &'a str,
}

impl PackCtx<'_> {
    fn error(&self, message: impl std::fmt::Display) -> GenerationError {
        GenerationError::Pack(format!("{}.{}: {message}", self.record, self.field))
    }
}

fn pad_to(buf: &mut Vec<u8>, align: usize) {
    let rem = buf.len() % align;
    if rem != 0 {
        buf.resize(buf.len() + align - rem, 0);
    }
}

fn write_scalar(
    buf: &mut Vec<u8>,
    ctx: &PackCtx<'_>,
    kind: ScalarKind,
    value: &Value,
) -> Result<()> {
    match value {
        Value::Null => Err(ctx.error("field has no value")),
        Value::Bool(flag) if kind == ScalarKind::Bool => {
            buf.push(u8::from(*flag));
            Ok(())
        }
        Value::Float(number) if kind == ScalarKind::Float => {
            let single = *number as f32;
            if single.is_infinite() && number.is_finite() {
                return Err(ctx.error(format!("value {number} out of range for float")));
            }
            buf.extend_from_slice(&single.to_ne_bytes());
            Ok(())
        }
        Value::Enum(member) if kind == ScalarKind::UInt32 => {
            if member.value < i32::MIN as i64 || member.value > u32::MAX as i64 {
                return Err(ctx.error(format!(
                    "enum value {} does not fit 32 bits",
                    member.value
                )));
            }
            buf.extend_from_slice(&(member.value as u32).to_ne_bytes());
            Ok(())
        }
        Value::Int(number) => write_int(buf, ctx, kind, *number),
        other => Err(ctx.error(format!(
            "cannot pack {} as {}",
            other.type_name(),
            kind.native_name()
        ))),
    }
}

fn write_int(buf: &mut Vec<u8>, ctx: &PackCtx<'_>, kind: ScalarKind, number: i128) -> Result<()> {
    let (min, max) = kind
        .int_bounds()
        .ok_or_else(|| ctx.error(format!("cannot pack int as {}", kind.native_name())))?;
    if number < min || number > max {
        return Err(ctx.error(format!(
            "value {number} out of range for {}",
            kind.native_name()
        )));
    }
    match kind {
        ScalarKind::Byte | ScalarKind::Int8 => buf.extend_from_slice(&(number as i8).to_ne_bytes()),
        ScalarKind::UInt8 => buf.extend_from_slice(&(number as u8).to_ne_bytes()),
        ScalarKind::Int16 => buf.extend_from_slice(&(number as i16).to_ne_bytes()),
        ScalarKind::UInt16 => buf.extend_from_slice(&(number as u16).to_ne_bytes()),
        ScalarKind::Int32 => buf.extend_from_slice(&(number as i32).to_ne_bytes()),
        ScalarKind::UInt32 => buf.extend_from_slice(&(number as u32).to_ne_bytes()),
        ScalarKind::Int64 => buf.extend_from_slice(&(number as i64).to_ne_bytes()),
        ScalarKind::UInt64 => buf.extend_from_slice(&(number as u64).to_ne_bytes()),
        ScalarKind::SizeT => buf.extend_from_slice(&(number as usize).to_ne_bytes()),
        ScalarKind::Bool | ScalarKind::Float | ScalarKind::CStr => {
            return Err(ctx.error(format!("cannot pack int as {}", kind.native_name())));
        }
    }
    Ok(())
}

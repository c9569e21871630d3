use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use datagen_core::{EnumDefinition, NamedConstant, HEADER_FILE_NAME};

use crate::layout::RecordLayout;

const GUARD: &str = "__DATAGEN_TYPES_H__";
const BANNER: &str = "//\n// Auto-generated file - do not hand-edit\n//\n";

/// Render constants, enums and struct layouts as a guarded C header.
///
/// Output order follows the input order exactly.
pub fn emit<'a>(
    layouts: impl IntoIterator<Item = &'a RecordLayout>,
    enums: impl IntoIterator<Item = &'a EnumDefinition>,
    constants: &[NamedConstant],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "#ifndef {GUARD}");
    let _ = writeln!(out, "#define {GUARD}");
    out.push_str(BANNER);

    write_defines(&mut out, constants);
    for definition in enums {
        write_enum(&mut out, definition);
    }
    for layout in layouts {
        write_struct(&mut out, layout);
    }

    let _ = writeln!(out, "\n#endif // {GUARD}");
    out
}

fn write_defines(out: &mut String, constants: &[NamedConstant]) {
    if constants.is_empty() {
        return;
    }
    out.push('\n');
    for constant in constants {
        let _ = writeln!(out, "#define {} ( {} )", constant.name, constant.value);
    }
}

fn write_enum(out: &mut String, definition: &EnumDefinition) {
    out.push_str("\ntypedef enum {\n");
    let members: Vec<String> = definition
        .members
        .iter()
        .map(|(name, value)| format!("  {name} = {value}"))
        .collect();
    out.push_str(&members.join(",\n"));
    let _ = writeln!(out, "\n}} {};", definition.name);
}

fn write_struct(out: &mut String, layout: &RecordLayout) {
    out.push('\n');
    if let Some(pack) = layout.pack {
        let _ = writeln!(out, "#pragma pack(push, {pack})");
    }
    let _ = writeln!(out, "typedef struct {} {{", layout.name);
    for field in &layout.fields {
        let declarator = match field.array_len {
            Some(len) => format!("{}[{len}]", field.name),
            None => field.name.clone(),
        };
        let _ = writeln!(out, "   {:<15} {};", field.ty.type_name(), declarator);
    }
    let _ = writeln!(out, "}} {0}, *P{0};", layout.name);
    if layout.pack.is_some() {
        out.push_str("#pragma pack(pop)\n");
    }
}

/// Write header text to `<dir>/datagen_types.h`, returning the path.
pub fn write_header(dir: &Path, text: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(HEADER_FILE_NAME);
    let mut file = File::create(&path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FieldDescriptor, NativeType};
    use datagen_core::ScalarKind;

    #[test]
    fn empty_input_is_a_guarded_header() {
        let text = emit(Vec::<&RecordLayout>::new(), Vec::<&EnumDefinition>::new(), &[]);
        assert_eq!(
            text,
            "#ifndef __DATAGEN_TYPES_H__\n#define __DATAGEN_TYPES_H__\n//\n// Auto-generated file - do not hand-edit\n//\n\n#endif // __DATAGEN_TYPES_H__\n"
        );
    }

    #[test]
    fn renders_struct_with_pack_and_arrays() {
        let layout = RecordLayout {
            name: "Frame".to_string(),
            fields: vec![
                FieldDescriptor {
                    name: "a".to_string(),
                    ty: NativeType::Scalar(ScalarKind::UInt8),
                    array_len: None,
                },
                FieldDescriptor {
                    name: "lanes".to_string(),
                    ty: NativeType::Enum("Color".to_string()),
                    array_len: Some(4),
                },
            ],
            pack: Some(1),
        };
        let color = EnumDefinition::new("Color").member("RED", 0).member("BLUE", 2);
        let constants = [NamedConstant::new("LANES", 4)];

        let text = emit([&layout], [&color], &constants);
        let body = text
            .split_once("//\n// Auto-generated file - do not hand-edit\n//\n")
            .map(|(_, body)| body)
            .unwrap();
        assert_eq!(
            body,
            "\n#define LANES ( 4 )\n\
             \ntypedef enum {\n  RED = 0,\n  BLUE = 2\n} Color;\n\
             \n#pragma pack(push, 1)\n\
             typedef struct Frame {\n   unsigned char   a;\n   Color           lanes[4];\n} Frame, *PFrame;\n\
             #pragma pack(pop)\n\
             \n#endif // __DATAGEN_TYPES_H__\n"
        );
    }
}

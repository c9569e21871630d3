use std::fs;
use std::path::PathBuf;

use datagen_core::{Catalog, RecordInstance, SchemaDocument, Value, validate_instance};
use datagen_generate::{BinaryPacker, LayoutBuilder, Randomizer, emit, write_header};

const DOCUMENT: &str = r#"
[[constants]]
name = "MAX_LANES"
value = 4

[[enums]]
name = "Color"
members = [{ name = "RED", value = 0 }, { name = "GREEN", value = 1 }]

[[records]]
name = "Frame"
pack = 1
binary = true

[[records.fields]]
name = "count"
type = "uint32"

[[records.fields]]
name = "lanes"
type = "Color[]"
size = 4

[[records.fields]]
name = "label"
type = "string"
direction = "in"

[[records.random]]
field = "count"
kind = "int_range"
min = 1
max = 8
"#;

const EXPECTED_HEADER: &str = "#ifndef __DATAGEN_TYPES_H__
#define __DATAGEN_TYPES_H__
//
// Auto-generated file - do not hand-edit
//

#define MAX_LANES ( 4 )

typedef enum {
  RED = 0,
  GREEN = 1
} Color;

#pragma pack(push, 1)
typedef struct Frame {
   unsigned int    count;
   Color           lanes[4];
} Frame, *PFrame;
#pragma pack(pop)

#endif // __DATAGEN_TYPES_H__
";

fn catalog() -> Catalog {
    SchemaDocument::from_toml_str(DOCUMENT)
        .and_then(SchemaDocument::into_catalog)
        .expect("catalog")
}

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "datagen_generate_{label}_{}",
        uuid::Uuid::new_v4()
    ));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}

#[test]
fn header_matches_golden_text() {
    let catalog = catalog();
    let mut builder = LayoutBuilder::new();
    let layouts = builder.build_all(&catalog).expect("layouts");
    let text = emit(layouts, catalog.enums(), catalog.constants());
    assert_eq!(text, EXPECTED_HEADER);

    let dir = temp_out_dir("header");
    let path = write_header(&dir, &text).expect("write header");
    assert!(path.ends_with("datagen_types.h"));
    assert_eq!(fs::read_to_string(path).expect("read header"), EXPECTED_HEADER);
}

#[test]
fn header_is_deterministic_across_builders() {
    let catalog = catalog();
    let mut first = LayoutBuilder::new();
    let mut second = LayoutBuilder::new();
    let a = emit(first.build_all(&catalog).unwrap(), catalog.enums(), catalog.constants());
    let b = emit(second.build_all(&catalog).unwrap(), catalog.enums(), catalog.constants());
    assert_eq!(a, b);
}

#[test]
fn randomized_instance_packs_to_layout_size() {
    let catalog = catalog();
    let raw = RecordInstance::new("Frame").with("lanes", vec![Value::from("GREEN")]);
    let mut instance = validate_instance(&catalog, raw).expect("valid instance");
    Randomizer::new(11)
        .apply(&catalog, &mut instance)
        .expect("randomize");

    let mut builder = LayoutBuilder::new();
    builder.build_all(&catalog).expect("layouts");
    let packer = BinaryPacker::new(&builder);
    let bytes = packer.pack(&instance).expect("pack");
    assert_eq!(bytes.len(), 4 + 4 * 4);

    let count = u32::from_ne_bytes(bytes[0..4].try_into().unwrap());
    assert!((1..=8).contains(&count));
    assert_eq!(u32::from_ne_bytes(bytes[4..8].try_into().unwrap()), 1);
    assert!(bytes[8..].iter().all(|byte| *byte == 0));

    let dir = temp_out_dir("binary");
    let path = dir.join("Frame_0.bin");
    let written = packer.write(&instance, &path).expect("write binary");
    assert_eq!(fs::read(&path).expect("read binary"), bytes);
    assert_eq!(written, bytes.len());
}

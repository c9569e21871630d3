use datagen_core::SchemaDocument;
use jsonschema::JSONSchema;
use schemars::schema_for;

const SAMPLE: &str = r#"
[[constants]]
name = "FRAME_COUNT"
value = "(4 * 2)"

[[enums]]
name = "Mode"
members = [{ name = "IDLE", value = 0 }, { name = "RUN", value = 7 }]

[[records]]
name = "Header"
pack = 4

[[records.fields]]
name = "mode"
type = "Mode"
default = "IDLE"

[[records.fields]]
name = "taps"
type = "int16[]"
size = 8
direction = "out"

[[records.random]]
field = "mode"
kind = "enum"
"#;

fn compiled_schema() -> JSONSchema {
    let schema = serde_json::to_value(schema_for!(SchemaDocument)).expect("serialize schema");
    JSONSchema::compile(&schema).expect("compile schema")
}

#[test]
fn sample_document_matches_json_schema() {
    let document = SchemaDocument::from_toml_str(SAMPLE).expect("parse sample");
    let instance = serde_json::to_value(&document).expect("document to json");
    assert!(compiled_schema().is_valid(&instance));
}

#[test]
fn json_schema_rejects_unknown_direction() {
    let instance = serde_json::json!({
        "records": [{
            "name": "Header",
            "fields": [{ "name": "mode", "type": "uint8", "direction": "sideways" }]
        }]
    });
    assert!(!compiled_schema().is_valid(&instance));
}

#[test]
fn sample_document_builds_catalog() {
    let catalog = SchemaDocument::from_toml_str(SAMPLE)
        .and_then(SchemaDocument::into_catalog)
        .expect("catalog");
    assert_eq!(catalog.constants()[0].value, "(4 * 2)");
    assert_eq!(catalog.enums().count(), 1);
    assert_eq!(catalog.fields("Header").expect("fields").len(), 2);
}

use datagen_core::SchemaDocument;
use schemars::schema_for;

fn main() -> Result<(), serde_json::Error> {
    let schema = schema_for!(SchemaDocument);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

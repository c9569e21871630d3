use std::collections::HashMap;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use datagen_config::ConfigNode;
use datagen_core::Catalog;
use datagen_generate::{BinaryPacker, LayoutBuilder, emit, write_header};

use super::RunResult;

/// Build every record layout and write `datagen_types.h` into `dir`.
///
/// Nothing is written when the catalog declares no constants, enums or
/// records.
pub fn write_header_artifact(
    catalog: &Catalog,
    builder: &mut LayoutBuilder,
    dir: &Path,
) -> RunResult<Option<PathBuf>> {
    let layouts = builder.build_all(catalog)?;
    if catalog.constants().is_empty() && catalog.enums().next().is_none() && layouts.is_empty() {
        return Ok(None);
    }
    let text = emit(layouts, catalog.enums(), catalog.constants());
    create_dir_all(dir)?;
    let path = write_header(dir, &text)?;
    tracing::info!(event = "header_written", path = %path.display());
    Ok(Some(path))
}

/// Pack every loaded record whose type is flagged `binary` into
/// `<dir>/<Type>_<n>.bin`, numbering instances per type in document order.
pub fn write_binary_artifacts(
    catalog: &Catalog,
    builder: &LayoutBuilder,
    node: &ConfigNode,
    dir: &Path,
) -> RunResult<Vec<PathBuf>> {
    create_dir_all(dir)?;
    let packer = BinaryPacker::new(builder);
    let mut counters: HashMap<&str, usize> = HashMap::new();
    let mut written = Vec::new();

    for record in node.records() {
        let eligible = catalog
            .record(record.type_name())
            .is_some_and(|schema| schema.binary);
        if !eligible {
            continue;
        }
        let index = counters.entry(record.type_name()).or_insert(0);
        let path = dir.join(format!("{}_{index}.bin", record.type_name()));
        *index += 1;
        let bytes = packer.write(record, &path)?;
        tracing::info!(
            event = "binary_written",
            record = %record.type_name(),
            bytes,
            path = %path.display()
        );
        written.push(path);
    }
    Ok(written)
}

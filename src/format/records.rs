//! CSV persistence of point annotations.
//!
//! One file per image with the header `X,Y,Label`, where `Label` is the
//! catalog display name:
//!
//! ```text
//! X,Y,Label
//! 120,45,Positivo
//! 300,210,Negativo
//! ```

use std::io::Read;
use std::path::Path;

use crate::constants::CSV_HEADER;
use crate::error::{AnnotationError, Result};
use crate::model::{LabelCatalog, Point};
use crate::store::PointStore;

/// One exported row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub x: i32,
    pub y: i32,
    pub label: String,
}

/// Encode rows as CSV bytes, newline terminated.
pub fn write_rows(rows: &[ExportRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([row.x.to_string(), row.y.to_string(), row.label.clone()])?;
    }

    writer
        .into_inner()
        .map_err(|e| AnnotationError::Io(e.into_error()))
}

/// Rebuild a store from CSV content.
///
/// Columns are located by header name, so column order does not matter.
/// When the same coordinates appear twice the later row wins. An empty
/// input yields an empty store.
pub fn read_store(reader: impl Read, catalog: &LabelCatalog) -> Result<PointStore> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut store = PointStore::new(catalog.clone());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(store);
    }
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AnnotationError::malformed_record(1, format!("missing column {name}")))
    };
    let [x_col, y_col, label_col] = [
        column(CSV_HEADER[0])?,
        column(CSV_HEADER[1])?,
        column(CSV_HEADER[2])?,
    ];

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map_or(idx + 2, |p| usize::try_from(p.line()).unwrap_or(idx + 2));

        let field = |col: usize, name: &str| {
            record
                .get(col)
                .ok_or_else(|| AnnotationError::malformed_record(line, format!("missing {name}")))
        };
        let coordinate = |col: usize, name: &str| -> Result<i32> {
            let raw = field(col, name)?;
            raw.parse().map_err(|_| {
                AnnotationError::malformed_record(line, format!("{name} is not an integer: {raw:?}"))
            })
        };

        let x = coordinate(x_col, "X")?;
        let y = coordinate(y_col, "Y")?;
        let name = field(label_col, "Label")?;
        let label = catalog
            .index_of(name)
            .ok_or_else(|| AnnotationError::invalid_label(name))?;

        store.relabel(Point::new(x, y), label)?;
    }

    log::debug!("Read {} annotated points from CSV", store.len());
    Ok(store)
}

/// Rebuild a store from a CSV file on disk.
///
/// Fails with `MissingResource` when the file does not exist.
pub fn read_store_from_path(path: &Path, catalog: &LabelCatalog) -> Result<PointStore> {
    if !path.is_file() {
        return Err(AnnotationError::missing(path));
    }
    let file = std::fs::File::open(path)?;
    let store = read_store(file, catalog)?;
    log::info!("Recovered {} points from {:?}", store.len(), path);
    Ok(store)
}

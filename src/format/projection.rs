//! Read-only projection of a point store into exportable forms.

use crate::error::{AnnotationError, Result};
use crate::format::records::{ExportRow, write_rows};
use crate::model::LabelId;
use crate::store::PointStore;

/// Count and share of one label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelCount {
    pub label: LabelId,
    pub name: String,
    pub count: usize,
    /// Percentage of all points, 0.0 when there are none.
    pub percentage: f64,
}

/// Per-label statistics over a store.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStats {
    counts: Vec<LabelCount>,
    total: usize,
}

impl LabelStats {
    /// Compute statistics for every catalog label.
    pub fn from_store(store: &PointStore) -> Self {
        let raw = store.counts();
        let total = raw.iter().sum();
        let counts = store
            .catalog()
            .iter()
            .map(|(label, category)| {
                let count = raw[label];
                LabelCount {
                    label,
                    name: category.name.clone(),
                    count,
                    percentage: percentage(count, total),
                }
            })
            .collect();
        Self { counts, total }
    }

    /// Total number of points.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Statistics for one label.
    pub fn get(&self, label: LabelId) -> Option<&LabelCount> {
        self.counts.get(label)
    }

    /// Statistics in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &LabelCount> {
        self.counts.iter()
    }
}

/// `100 * part / total`, or 0.0 for an empty total.
pub(crate) fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Deterministic export of a store: rows in raster order plus statistics.
///
/// Building a projection never mutates the store, and projecting the same
/// store twice yields identical output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProjection {
    rows: Vec<ExportRow>,
    stats: LabelStats,
}

impl ExportProjection {
    /// Project `store`.
    pub fn from_store(store: &PointStore) -> Result<Self> {
        let catalog = store.catalog();
        let rows = store
            .sorted()
            .into_iter()
            .map(|(point, label)| {
                let name = catalog
                    .name(label)
                    .ok_or_else(|| AnnotationError::invalid_label(label))?;
                Ok(ExportRow {
                    x: point.x,
                    y: point.y,
                    label: name.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rows,
            stats: LabelStats::from_store(store),
        })
    }

    /// Rows sorted by `(y, x)`.
    pub fn rows(&self) -> &[ExportRow] {
        &self.rows
    }

    /// Per-label statistics.
    pub fn stats(&self) -> &LabelStats {
        &self.stats
    }

    /// CSV bytes with the `X,Y,Label` header.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        write_rows(&self.rows)
    }
}

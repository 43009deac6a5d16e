//! Viewport reconciliation.
//!
//! The annotation widget does not send edits. Each interaction it reports
//! the full list of points it currently shows for a region, and the store
//! is brought in line with that list:
//!
//! 1. reported points that are not stored are added with their reported
//!    label; reported points that are stored keep their stored label,
//! 2. stored points inside the region that are missing from the report
//!    are removed,
//! 3. stored points outside the region are never touched.
//!
//! Coordinates are compared exactly. A report is validated completely
//! before the store is modified, so a bad entry never leaves the store
//! half-updated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{AnnotationError, Result};
use crate::geometry::{Patch, Region};
use crate::model::{LabelCatalog, LabelId, Point};
use crate::store::PointStore;

/// One point as reported by the widget.
///
/// Fields are optional so that incomplete entries survive deserialization
/// and are rejected by reconciliation with a precise error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    #[serde(default)]
    pub point: Option<[f64; 2]>,
    #[serde(default)]
    pub label_id: Option<i64>,
}

impl ReportEntry {
    /// Entry for an integer point.
    pub fn new(x: i32, y: i32, label: LabelId) -> Self {
        Self {
            point: Some([f64::from(x), f64::from(y)]),
            label_id: i64::try_from(label).ok(),
        }
    }

    /// Validate the entry and truncate its coordinates toward zero.
    fn resolve(&self, index: usize, catalog: &LabelCatalog) -> Result<(Point, LabelId)> {
        let [x, y] = self
            .point
            .ok_or_else(|| AnnotationError::malformed_report(index, "missing point"))?;
        let label = self
            .label_id
            .ok_or_else(|| AnnotationError::malformed_report(index, "missing label_id"))?;

        let x = truncate_coordinate(x)
            .ok_or_else(|| AnnotationError::malformed_report(index, format!("bad x {x}")))?;
        let y = truncate_coordinate(y)
            .ok_or_else(|| AnnotationError::malformed_report(index, format!("bad y {y}")))?;

        let label = usize::try_from(label)
            .ok()
            .filter(|l| catalog.contains(*l))
            .ok_or_else(|| AnnotationError::invalid_label(label))?;

        Ok((Point::new(x, y), label))
    }
}

fn truncate_coordinate(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated < f64::from(i32::MIN) || truncated > f64::from(i32::MAX) {
        return None;
    }
    Some(truncated as i32)
}

/// The complete list of points a widget shows for one region.
///
/// An empty report means every point in the region was deleted. The
/// absence of a report (no interaction) is modeled as `Option::None` by
/// callers and must not be turned into an empty report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewportReport {
    entries: Vec<ReportEntry>,
}

impl ViewportReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the widget's JSON payload: `[{"point": [x, y], "label_id": n}, ...]`.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a report from integer points.
    pub fn from_points(points: impl IntoIterator<Item = (Point, LabelId)>) -> Self {
        Self {
            entries: points
                .into_iter()
                .map(|(p, label)| ReportEntry::new(p.x, p.y, label))
                .collect(),
        }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the report is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in widget order.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    fn resolve(&self, catalog: &LabelCatalog) -> Result<Vec<(Point, LabelId)>> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.resolve(i, catalog))
            .collect()
    }
}

impl FromIterator<ReportEntry> for ViewportReport {
    fn from_iter<I: IntoIterator<Item = ReportEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Points added, in raster order.
    pub added: Vec<Point>,
    /// Points removed, in raster order.
    pub removed: Vec<Point>,
    /// Region points that were already stored and are still present.
    pub retained: usize,
}

impl ReconcileOutcome {
    /// Check if the store was left unchanged.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Reconcile a report whose points are in global coordinates.
///
/// With [`Region::WholeImage`] every stored point is a removal candidate.
/// With [`Region::Patch`] only points inside the patch are, and every
/// reported point must lie inside it.
pub fn reconcile(
    store: &mut PointStore,
    region: &Region,
    report: &ViewportReport,
) -> Result<ReconcileOutcome> {
    let entries = report.resolve(store.catalog())?;
    if let Some((point, _)) = entries.iter().find(|(p, _)| !region.contains(p)) {
        return Err(AnnotationError::RegionMismatch {
            x: i64::from(point.x),
            y: i64::from(point.y),
            region: region.to_string(),
        });
    }
    apply(store, region, entries)
}

/// Reconcile a report whose points are local to `patch`.
///
/// Points are shifted by the patch origin before the usual rules apply,
/// restricted to the patch. A local point outside the patch extent fails
/// the call with `RegionMismatch`.
pub fn reconcile_patch(
    store: &mut PointStore,
    patch: &Patch,
    local_report: &ViewportReport,
) -> Result<ReconcileOutcome> {
    let entries = local_report
        .resolve(store.catalog())?
        .into_iter()
        .map(|(local, label)| patch.to_global(local).map(|global| (global, label)))
        .collect::<Result<Vec<_>>>()?;
    apply(store, &Region::Patch(*patch), entries)
}

fn apply(
    store: &mut PointStore,
    region: &Region,
    entries: Vec<(Point, LabelId)>,
) -> Result<ReconcileOutcome> {
    let reported: HashSet<Point> = entries.iter().map(|(p, _)| *p).collect();
    let mut outcome = ReconcileOutcome::default();

    for (point, label) in entries {
        if store.upsert(point, label)? {
            outcome.added.push(point);
        }
    }

    for point in store.points_in(region) {
        if reported.contains(&point) {
            continue;
        }
        store.remove(&point);
        outcome.removed.push(point);
    }

    outcome.added.sort_by_key(Point::raster_key);
    outcome.retained = reported.len() - outcome.added.len();

    log::debug!(
        "Reconciled {} reported points over {}: {} added, {} removed, {} retained",
        reported.len(),
        region,
        outcome.added.len(),
        outcome.removed.len(),
        outcome.retained
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PatchGrid;

    fn empty_store() -> PointStore {
        PointStore::new(LabelCatalog::default())
    }

    fn report(points: &[((i32, i32), LabelId)]) -> ViewportReport {
        ViewportReport::from_points(points.iter().map(|(p, l)| (Point::from(*p), *l)))
    }

    #[test]
    fn test_whole_image_scenario() {
        let mut store = empty_store();

        let outcome = reconcile(
            &mut store,
            &Region::WholeImage,
            &report(&[((10, 10), 0), ((20, 20), 1)]),
        )
        .unwrap();
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(store.len(), 2);

        let outcome =
            reconcile(&mut store, &Region::WholeImage, &report(&[((10, 10), 0)])).unwrap();
        assert_eq!(outcome.removed, vec![Point::new(20, 20)]);
        assert_eq!(store.label_of(&Point::new(10, 10)), Some(0));
        assert!(!store.contains(&Point::new(20, 20)));

        let outcome = reconcile(
            &mut store,
            &Region::WholeImage,
            &report(&[((10, 10), 2), ((30, 30), 2)]),
        )
        .unwrap();
        assert_eq!(outcome.added, vec![Point::new(30, 30)]);
        assert_eq!(outcome.retained, 1);
        assert_eq!(store.label_of(&Point::new(10, 10)), Some(0));
        assert_eq!(store.label_of(&Point::new(30, 30)), Some(2));
    }

    #[test]
    fn test_idempotent() {
        let mut store = empty_store();
        let r = report(&[((1, 2), 0), ((3, 4), 1), ((5, 6), 2)]);
        reconcile(&mut store, &Region::WholeImage, &r).unwrap();
        let after_first = store.clone();

        let outcome = reconcile(&mut store, &Region::WholeImage, &r).unwrap();
        assert!(outcome.is_unchanged());
        assert_eq!(store, after_first);
    }

    #[test]
    fn test_add_only_report() {
        let mut store = empty_store();
        store.upsert(Point::new(1, 1), 0).unwrap();
        store.upsert(Point::new(2, 2), 1).unwrap();

        let outcome = reconcile(
            &mut store,
            &Region::WholeImage,
            &report(&[((1, 1), 2), ((2, 2), 2), ((3, 3), 1)]),
        )
        .unwrap();

        assert_eq!(outcome.added, vec![Point::new(3, 3)]);
        assert!(outcome.removed.is_empty());
        assert_eq!(store.label_of(&Point::new(1, 1)), Some(0));
        assert_eq!(store.label_of(&Point::new(2, 2)), Some(1));
    }

    #[test]
    fn test_empty_report_clears_only_region() {
        let mut store = empty_store();
        store.upsert(Point::new(5, 5), 0).unwrap();
        store.upsert(Point::new(15, 15), 0).unwrap();
        store.upsert(Point::new(80, 80), 1).unwrap();

        let patch = Patch::new(0, 0, 20, 20);
        let outcome = reconcile_patch(&mut store, &patch, &ViewportReport::new()).unwrap();

        assert_eq!(outcome.removed, vec![Point::new(5, 5), Point::new(15, 15)]);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&Point::new(80, 80)));
    }

    #[test]
    fn test_region_isolation_between_patches() {
        let grid = PatchGrid::new(100, 100, 60, 60, 0.5).unwrap();
        let a = grid.patch(0).unwrap(); // [0,60) x [0,60)
        let b = grid.patch(8).unwrap(); // [40,100) x [40,100)

        let mut store = empty_store();
        store.upsert(Point::new(10, 10), 0).unwrap();
        store.upsert(Point::new(90, 90), 1).unwrap();
        store.upsert(Point::new(95, 70), 2).unwrap();

        // Delete (10, 10) and add (20, 20) through patch A
        reconcile_patch(&mut store, &a, &report(&[((20, 20), 1)])).unwrap();

        assert!(!store.contains(&Point::new(10, 10)));
        assert_eq!(store.label_of(&Point::new(20, 20)), Some(1));
        for p in [Point::new(90, 90), Point::new(95, 70)] {
            assert!(b.contains(&p));
            assert!(store.contains(&p));
        }
    }

    #[test]
    fn test_patch_local_coordinates_are_shifted() {
        let mut store = empty_store();
        let patch = Patch::new(30, 40, 60, 60);
        let outcome = reconcile_patch(&mut store, &patch, &report(&[((5, 6), 1)])).unwrap();
        assert_eq!(outcome.added, vec![Point::new(35, 46)]);
        assert_eq!(store.label_of(&Point::new(35, 46)), Some(1));
    }

    #[test]
    fn test_overlap_point_reported_by_neighbor_survives() {
        let grid = PatchGrid::new(100, 100, 60, 60, 0.5).unwrap();
        let mut store = empty_store();
        let a = grid.patch(0).unwrap();
        let b = grid.patch(1).unwrap(); // starts at x = 30

        reconcile_patch(&mut store, &a, &report(&[((45, 10), 0)])).unwrap();
        // Patch B shows the same global point at local (15, 10)
        let view = grid.local_view(&store, 1).unwrap();
        assert_eq!(view, vec![(Point::new(15, 10), 0)]);

        let outcome =
            reconcile_patch(&mut store, &b, &ViewportReport::from_points(view)).unwrap();
        assert!(outcome.is_unchanged());
        assert_eq!(store.len(), 1);
        assert!(b.contains(&Point::new(45, 10)));
    }

    #[test]
    fn test_out_of_patch_point_rejected_without_mutation() {
        let mut store = empty_store();
        store.upsert(Point::new(1, 1), 0).unwrap();
        let before = store.clone();

        let patch = Patch::new(0, 0, 10, 10);
        let err = reconcile_patch(&mut store, &patch, &report(&[((2, 2), 0), ((10, 3), 0)]))
            .unwrap_err();
        assert!(matches!(err, AnnotationError::RegionMismatch { .. }));
        assert_eq!(store, before);

        let err = reconcile(
            &mut store,
            &Region::Patch(patch),
            &report(&[((50, 50), 0)]),
        )
        .unwrap_err();
        assert!(matches!(err, AnnotationError::RegionMismatch { .. }));
        assert_eq!(store, before);
    }

    #[test]
    fn test_malformed_entry_fails_whole_call() {
        let mut store = empty_store();
        store.upsert(Point::new(1, 1), 0).unwrap();
        let before = store.clone();

        let json = r#"[{"point": [3, 3], "label_id": 1}, {"label_id": 0}]"#;
        let parsed = ViewportReport::from_json(json).unwrap();
        let err = reconcile(&mut store, &Region::WholeImage, &parsed).unwrap_err();
        assert!(matches!(err, AnnotationError::MalformedReport { index: 1, .. }));
        assert_eq!(store, before);

        let json = r#"[{"point": [3, 3]}]"#;
        let parsed = ViewportReport::from_json(json).unwrap();
        let err = reconcile(&mut store, &Region::WholeImage, &parsed).unwrap_err();
        assert!(matches!(err, AnnotationError::MalformedReport { index: 0, .. }));

        let json = r#"[{"point": [3, 3], "label_id": 9}]"#;
        let parsed = ViewportReport::from_json(json).unwrap();
        let err = reconcile(&mut store, &Region::WholeImage, &parsed).unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidLabel { .. }));
        assert_eq!(store, before);
    }

    #[test]
    fn test_fractional_coordinates_truncate() {
        let mut store = empty_store();
        let json = r#"[{"point": [10.9, 20.2], "label_id": 0}]"#;
        let parsed = ViewportReport::from_json(json).unwrap();
        reconcile(&mut store, &Region::WholeImage, &parsed).unwrap();
        assert!(store.contains(&Point::new(10, 20)));

        // Same pixel, reported again with a different fraction
        let json = r#"[{"point": [10.1, 20.7], "label_id": 2}]"#;
        let parsed = ViewportReport::from_json(json).unwrap();
        let outcome = reconcile(&mut store, &Region::WholeImage, &parsed).unwrap();
        assert!(outcome.is_unchanged());
        assert_eq!(store.label_of(&Point::new(10, 20)), Some(0));
    }
}

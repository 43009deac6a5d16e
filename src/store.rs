//! Canonical set of labeled points for one working image.

use std::collections::HashMap;

use crate::error::Result;
use crate::geometry::Region;
use crate::model::{LabelCatalog, LabelId, Point};

/// Deduplicated point → label mapping, validated against a label catalog.
///
/// A single map holds both the point set and the per-point label, so the
/// two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointStore {
    catalog: LabelCatalog,
    labels: HashMap<Point, LabelId>,
}

impl PointStore {
    /// Create an empty store for a new image.
    pub fn new(catalog: LabelCatalog) -> Self {
        Self {
            catalog,
            labels: HashMap::new(),
        }
    }

    /// The catalog labels are validated against.
    pub fn catalog(&self) -> &LabelCatalog {
        &self.catalog
    }

    /// Insert `point` with `label` unless it is already present.
    ///
    /// An existing point keeps its stored label. Returns `true` when the
    /// point was inserted.
    pub fn upsert(&mut self, point: Point, label: LabelId) -> Result<bool> {
        self.catalog.validate(label)?;
        if self.labels.contains_key(&point) {
            return Ok(false);
        }
        self.labels.insert(point, label);
        Ok(true)
    }

    /// Set the label of `point`, inserting it if absent.
    ///
    /// Returns the previous label, if any.
    pub fn relabel(&mut self, point: Point, label: LabelId) -> Result<Option<LabelId>> {
        self.catalog.validate(label)?;
        Ok(self.labels.insert(point, label))
    }

    /// Remove `point` and its label. Absent points are ignored.
    pub fn remove(&mut self, point: &Point) -> Option<LabelId> {
        self.labels.remove(point)
    }

    /// Label currently stored for `point`.
    pub fn label_of(&self, point: &Point) -> Option<LabelId> {
        self.labels.get(point).copied()
    }

    /// Check whether `point` is stored.
    pub fn contains(&self, point: &Point) -> bool {
        self.labels.contains_key(point)
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check whether the store holds no points.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All point-label pairs. Iteration order is unspecified.
    pub fn all(&self) -> impl Iterator<Item = (Point, LabelId)> + '_ {
        self.labels.iter().map(|(p, l)| (*p, *l))
    }

    /// All point-label pairs in raster order (by `y`, then `x`).
    pub fn sorted(&self) -> Vec<(Point, LabelId)> {
        let mut pairs: Vec<_> = self.all().collect();
        pairs.sort_by_key(|(p, _)| p.raster_key());
        pairs
    }

    /// Stored points lying inside `region`, in raster order.
    pub fn points_in(&self, region: &Region) -> Vec<Point> {
        let mut points: Vec<Point> = self
            .labels
            .keys()
            .filter(|p| region.contains(p))
            .copied()
            .collect();
        points.sort_by_key(Point::raster_key);
        points
    }

    /// Number of points per label, indexed by label.
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.catalog.len()];
        for label in self.labels.values() {
            counts[*label] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotationError;
    use crate::geometry::Patch;

    fn store() -> PointStore {
        PointStore::new(LabelCatalog::default())
    }

    #[test]
    fn test_upsert_keeps_existing_label() {
        let mut store = store();
        assert!(store.upsert(Point::new(1, 1), 0).unwrap());
        assert!(!store.upsert(Point::new(1, 1), 2).unwrap());
        assert_eq!(store.label_of(&Point::new(1, 1)), Some(0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_relabel_overwrites() {
        let mut store = store();
        store.upsert(Point::new(1, 1), 0).unwrap();
        assert_eq!(store.relabel(Point::new(1, 1), 2).unwrap(), Some(0));
        assert_eq!(store.label_of(&Point::new(1, 1)), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_label_rejected() {
        let mut store = store();
        let err = store.upsert(Point::new(0, 0), 7).unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidLabel { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = store();
        assert_eq!(store.remove(&Point::new(3, 3)), None);
        store.upsert(Point::new(3, 3), 1).unwrap();
        assert_eq!(store.remove(&Point::new(3, 3)), Some(1));
        assert!(!store.contains(&Point::new(3, 3)));
    }

    #[test]
    fn test_sorted_and_region_filter() {
        let mut store = store();
        store.upsert(Point::new(50, 5), 0).unwrap();
        store.upsert(Point::new(5, 50), 1).unwrap();
        store.upsert(Point::new(5, 5), 2).unwrap();

        let sorted: Vec<Point> = store.sorted().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            sorted,
            vec![Point::new(5, 5), Point::new(50, 5), Point::new(5, 50)]
        );

        let patch = Region::Patch(Patch::new(0, 0, 10, 60));
        assert_eq!(
            store.points_in(&patch),
            vec![Point::new(5, 5), Point::new(5, 50)]
        );
        assert_eq!(store.points_in(&Region::WholeImage).len(), 3);
        assert_eq!(store.counts(), vec![1, 1, 1]);
    }
}

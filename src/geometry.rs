//! Patch grid geometry.
//!
//! Large images are annotated tile by tile. A [`PatchGrid`] splits an image
//! into rectangles of a target size with a fractional overlap between
//! neighbors. The last row and column are pushed back so they end flush
//! with the image edge, which keeps every patch in bounds while covering
//! the whole image.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AnnotationError, Result};
use crate::model::{LabelCatalog, LabelId, Point};
use crate::store::PointStore;

/// A rectangle in global image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Patch {
    pub x_start: u32,
    pub y_start: u32,
    pub width: u32,
    pub height: u32,
}

impl Patch {
    pub fn new(x_start: u32, y_start: u32, width: u32, height: u32) -> Self {
        Self {
            x_start,
            y_start,
            width,
            height,
        }
    }

    /// Check if a global point lies in `[x_start, x_start+width) × [y_start, y_start+height)`.
    pub fn contains(&self, point: &Point) -> bool {
        let (x, y) = (i64::from(point.x), i64::from(point.y));
        let (x0, y0) = (i64::from(self.x_start), i64::from(self.y_start));
        x >= x0 && x < x0 + i64::from(self.width) && y >= y0 && y < y0 + i64::from(self.height)
    }

    /// Check if a patch-local point lies inside the patch extent.
    pub fn contains_local(&self, local: &Point) -> bool {
        local.x >= 0
            && local.y >= 0
            && i64::from(local.x) < i64::from(self.width)
            && i64::from(local.y) < i64::from(self.height)
    }

    /// Map a patch-local point to global coordinates.
    ///
    /// Fails with `RegionMismatch` when the local point is outside the patch.
    pub fn to_global(&self, local: Point) -> Result<Point> {
        if !self.contains_local(&local) {
            return Err(self.mismatch(local));
        }
        let x = i64::from(self.x_start) + i64::from(local.x);
        let y = i64::from(self.y_start) + i64::from(local.y);
        match (i32::try_from(x), i32::try_from(y)) {
            (Ok(x), Ok(y)) => Ok(Point::new(x, y)),
            _ => Err(self.mismatch(local)),
        }
    }

    /// Map a global point to patch-local coordinates, if it lies inside.
    pub fn to_local(&self, global: Point) -> Option<Point> {
        if !self.contains(&global) {
            return None;
        }
        let x = i64::from(global.x) - i64::from(self.x_start);
        let y = i64::from(global.y) - i64::from(self.y_start);
        Some(Point::new(i32::try_from(x).ok()?, i32::try_from(y).ok()?))
    }

    fn mismatch(&self, local: Point) -> AnnotationError {
        AnnotationError::RegionMismatch {
            x: i64::from(local.x),
            y: i64::from(local.y),
            region: format!("local extent of {self}"),
        }
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patch {}x{} at ({}, {})",
            self.width, self.height, self.x_start, self.y_start
        )
    }
}

/// The part of the image a viewport report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The whole image; every stored point belongs to it.
    WholeImage,
    /// One patch of a grid, in global coordinates.
    Patch(Patch),
}

impl Region {
    /// Check if a global point belongs to this region.
    pub fn contains(&self, point: &Point) -> bool {
        match self {
            Region::WholeImage => true,
            Region::Patch(patch) => patch.contains(point),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::WholeImage => write!(f, "whole image"),
            Region::Patch(patch) => write!(f, "{patch}"),
        }
    }
}

/// How a patch index is turned back into an origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingPolicy {
    /// `row = index / columns`, using the clamped patch origin.
    #[default]
    Corrected,
    /// `x = (index % columns) * stride_x`, `y = (index / rows) * stride_y`.
    ///
    /// Matches files produced by older tooling; only correct for square
    /// grids, and ignores the last-row/column clamp.
    Legacy,
}

/// Layout along one axis: stride, number of patches, patch extent.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Axis {
    image: u32,
    extent: u32,
    stride: f64,
    count: u32,
}

impl Axis {
    fn new(image: u32, patch: u32, overlap: f64) -> Self {
        let stride = f64::from(patch) * (1.0 - overlap);
        if image <= patch {
            return Self {
                image,
                extent: image,
                stride,
                count: 1,
            };
        }
        // ceil((image - patch*o) / (patch*(1-o))), tolerant to rounding noise
        let exact = (f64::from(image) - f64::from(patch) * overlap) / stride;
        let count = ((exact - 1e-9).ceil() as u32).max(1);
        Self {
            image,
            extent: patch,
            stride,
            count,
        }
    }

    /// Unclamped start of patch `i`: `floor(i * stride)`.
    fn raw_start(&self, i: u32) -> u32 {
        (f64::from(i) * self.stride).floor() as u32
    }

    fn start(&self, i: u32) -> u32 {
        let last = self.image - self.extent;
        if i + 1 >= self.count {
            last
        } else {
            self.raw_start(i).min(last)
        }
    }
}

/// A grid of overlapping patches covering an image.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchGrid {
    rows: Axis,
    columns: Axis,
    overlap: f64,
}

impl PatchGrid {
    /// Derive the grid for an image of `image_width × image_height`.
    pub fn new(
        image_width: u32,
        image_height: u32,
        patch_width: u32,
        patch_height: u32,
        overlap: f64,
    ) -> Result<Self> {
        if image_width == 0 || image_height == 0 {
            return Err(AnnotationError::invalid_geometry("image has zero extent"));
        }
        if patch_width == 0 || patch_height == 0 {
            return Err(AnnotationError::invalid_geometry("patch has zero extent"));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(AnnotationError::invalid_geometry(format!(
                "overlap {overlap} outside [0, 1)"
            )));
        }

        let grid = Self {
            rows: Axis::new(image_height, patch_height, overlap),
            columns: Axis::new(image_width, patch_width, overlap),
            overlap,
        };
        log::debug!(
            "Patch grid {}x{} for {}x{} image (stride {}x{}, overlap {})",
            grid.columns.count,
            grid.rows.count,
            image_width,
            image_height,
            grid.columns.stride,
            grid.rows.stride,
            overlap
        );
        Ok(grid)
    }

    /// Number of patch rows.
    pub fn rows(&self) -> u32 {
        self.rows.count
    }

    /// Number of patch columns.
    pub fn columns(&self) -> u32 {
        self.columns.count
    }

    /// Total number of patches.
    pub fn len(&self) -> usize {
        self.rows.count as usize * self.columns.count as usize
    }

    /// A grid always holds at least one patch.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Horizontal and vertical stride, `extent * (1 - overlap)`.
    pub fn stride(&self) -> (f64, f64) {
        (self.columns.stride, self.rows.stride)
    }

    /// Overlap fraction the grid was built with.
    pub fn overlap(&self) -> f64 {
        self.overlap
    }

    /// Patch at a row and column.
    pub fn patch_at(&self, row: u32, column: u32) -> Option<Patch> {
        if row >= self.rows.count || column >= self.columns.count {
            return None;
        }
        Some(Patch::new(
            self.columns.start(column),
            self.rows.start(row),
            self.columns.extent,
            self.rows.extent,
        ))
    }

    /// Patch at a row-major index (`row * columns + column`).
    pub fn patch(&self, index: usize) -> Option<Patch> {
        let columns = self.columns.count as usize;
        let row = u32::try_from(index / columns).ok()?;
        let column = u32::try_from(index % columns).ok()?;
        self.patch_at(row, column)
    }

    /// All patches in row-major order.
    pub fn patches(&self) -> impl Iterator<Item = Patch> + '_ {
        (0..self.len()).filter_map(|i| self.patch(i))
    }

    /// Reconstruct a patch origin `(x, y)` from its index.
    pub fn origin_of_index(&self, index: usize, policy: IndexingPolicy) -> Option<(u32, u32)> {
        if index >= self.len() {
            return None;
        }
        match policy {
            IndexingPolicy::Corrected => self.patch(index).map(|p| (p.x_start, p.y_start)),
            IndexingPolicy::Legacy => {
                let column = u32::try_from(index % self.columns.count as usize).ok()?;
                let row = u32::try_from(index / self.rows.count as usize).ok()?;
                Some((self.columns.raw_start(column), self.rows.raw_start(row)))
            }
        }
    }

    /// Patch whose origin is reconstructed from `index` under `policy`.
    ///
    /// Under [`IndexingPolicy::Legacy`] the origin may differ from the
    /// tiled patch at the same index; the extent is the grid's.
    pub fn patch_for_index(&self, index: usize, policy: IndexingPolicy) -> Option<Patch> {
        let (x, y) = self.origin_of_index(index, policy)?;
        Some(Patch::new(x, y, self.columns.extent, self.rows.extent))
    }

    /// Points of `store` inside patch `index`, in patch-local coordinates.
    ///
    /// This is what the widget is given when the patch is opened.
    pub fn local_view(&self, store: &PointStore, index: usize) -> Option<Vec<(Point, LabelId)>> {
        let patch = self.patch(index)?;
        let view = store
            .sorted()
            .into_iter()
            .filter_map(|(p, label)| patch.to_local(p).map(|local| (local, label)))
            .collect();
        Some(view)
    }

    /// Rebuild a global store from one local view per patch.
    ///
    /// Points in overlap areas show up in several views; they are counted
    /// once, keeping the label from the lowest patch index.
    pub fn merge_views(
        &self,
        views: &[Vec<(Point, LabelId)>],
        catalog: &LabelCatalog,
    ) -> Result<PointStore> {
        if views.len() != self.len() {
            return Err(AnnotationError::invalid_geometry(format!(
                "expected {} patch views, got {}",
                self.len(),
                views.len()
            )));
        }
        let mut store = PointStore::new(catalog.clone());
        for (patch, view) in self.patches().zip(views) {
            for (local, label) in view {
                store.upsert(patch.to_global(*local)?, *label)?;
            }
        }
        Ok(store)
    }
}

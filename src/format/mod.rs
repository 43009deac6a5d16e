//! Export and recovery of point annotations.
//!
//! This module turns a [`PointStore`](crate::store::PointStore) into the
//! artifacts handed to users and storage, and back:
//!
//! - **CSV** (`X,Y,Label`): the persisted form, readable by session recovery
//! - **Text report**: per-class counts and percentages for one image
//! - **Annotated PNG**: the image with one colored marker per point, over
//!   optional mask or cell-contour layers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pointanno::format::{AnnotationReport, ExportProjection, OverlayRenderer};
//!
//! let projection = ExportProjection::from_store(&store)?;
//! let csv = projection.to_csv()?;
//! let report = AnnotationReport::new("slide_01", &projection).to_text();
//! let png = OverlayRenderer::new().render_png(&image, &store)?;
//! ```

mod overlay;
mod projection;
mod records;
mod report;

#[cfg(test)]
mod tests;

pub use overlay::{ContourSet, OverlayLayer, OverlayRenderer, blend_layer, encode_png};
pub use projection::{ExportProjection, LabelCount, LabelStats};
pub use records::{ExportRow, read_store, read_store_from_path, write_rows};
pub use report::{AnnotationReport, ReportLine, SCORED_CLASSES};

//! pointanno - point annotation reconciliation core
//!
//! Keeps an authoritative set of labeled points per image in sync with
//! snapshots reported by an annotation widget, which may show either the
//! whole image or one patch of a larger one. The store is persisted as
//! an `X,Y,Label` CSV, exported as a text report and an annotated PNG,
//! and recovered from the CSV when the live session is lost.

pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod geometry;
pub mod model;
pub mod queue;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod workspace;

pub use error::{AnnotationError, Result};
pub use geometry::{IndexingPolicy, Patch, PatchGrid, Region};
pub use model::{Category, LabelCatalog, LabelId, Point};
pub use reconcile::{ReconcileOutcome, ReportEntry, ViewportReport, reconcile, reconcile_patch};
pub use session::{AnnotationSession, ImageSession, SessionState};
pub use store::PointStore;
pub use workspace::Workspace;

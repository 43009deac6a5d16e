//! Data models for point annotation.

mod category;
mod point;

pub use category::{Category, LabelCatalog, LabelId, default_categories};
pub use point::Point;

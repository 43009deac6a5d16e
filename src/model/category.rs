//! Label categories and the ordered catalog they form.

use serde::{Deserialize, Serialize};

use crate::error::{AnnotationError, Result};

/// Index of a category inside a [`LabelCatalog`].
pub type LabelId = usize;

/// An annotation category with a name and color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, also used as the label string in CSV files
    pub name: String,
    /// RGB color used when rendering markers
    pub color: [u8; 3],
}

impl Category {
    /// Create a new category with the given name and color.
    pub fn new(name: &str, color: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
        }
    }
}

/// Default categories for Ki-67 style positive/negative counting.
pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new("Positivo", [255, 0, 0]),
        Category::new("Negativo", [0, 255, 0]),
        Category::new("No importante", [0, 0, 255]),
    ]
}

/// Fixed, ordered list of categories. A label is a position in this list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    categories: Vec<Category>,
}

impl LabelCatalog {
    /// Build a catalog. Names must be non-empty and unique.
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        if categories.is_empty() {
            return Err(AnnotationError::invalid_label("<empty catalog>"));
        }
        for (idx, category) in categories.iter().enumerate() {
            if category.name.trim().is_empty() {
                return Err(AnnotationError::invalid_label(format!("<blank name at {idx}>")));
            }
            if categories[..idx].iter().any(|c| c.name == category.name) {
                return Err(AnnotationError::invalid_label(&category.name));
            }
        }
        Ok(Self { categories })
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// A catalog is never empty; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Check that `label` indexes a category.
    pub fn contains(&self, label: LabelId) -> bool {
        label < self.categories.len()
    }

    /// Fail with `InvalidLabel` unless `label` indexes a category.
    pub fn validate(&self, label: LabelId) -> Result<LabelId> {
        if self.contains(label) {
            Ok(label)
        } else {
            Err(AnnotationError::invalid_label(label))
        }
    }

    /// Look up a category by label.
    pub fn get(&self, label: LabelId) -> Option<&Category> {
        self.categories.get(label)
    }

    /// Display name of a label.
    pub fn name(&self, label: LabelId) -> Option<&str> {
        self.get(label).map(|c| c.name.as_str())
    }

    /// Marker color of a label.
    pub fn color(&self, label: LabelId) -> Option<[u8; 3]> {
        self.get(label).map(|c| c.color)
    }

    /// Resolve a display name to its label. Matching is exact.
    pub fn index_of(&self, name: &str) -> Option<LabelId> {
        self.categories.iter().position(|c| c.name == name)
    }

    /// Iterate over `(label, category)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (LabelId, &Category)> {
        self.categories.iter().enumerate()
    }
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self {
            categories: default_categories(),
        }
    }
}
